// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashSet;
use std::fmt::Display;
use std::ops::Deref;
use std::str::FromStr;

use itertools::Itertools;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_with::skip_serializing_none;

use crate::jwt::Jwt;
use crate::ClaimPath;
use crate::DecodedSdObject;
use crate::Disclosure;
use crate::Error;
use crate::Hasher;
use crate::JsonObject;
use crate::KeyBindingJwt;
use crate::RequiredKeyBinding;
use crate::Result;
use crate::SdObjectDecoder;
use crate::DEFAULT_ALG_NAME;

/// `typ` of the issuer-signed JWT header.
pub const HEADER_TYP: &str = "sd-jwt";

/// Media type of a combined-format SD-JWT.
pub const SD_JWT_MEDIA_TYPE: &str = "application/sd-jwt";
/// Media type of the JWS JSON serialization of an SD-JWT.
pub const SD_JWT_JSON_MEDIA_TYPE: &str = "application/sd-jwt+json";
/// Media type of a key binding JWT.
pub const KB_JWT_MEDIA_TYPE: &str = "application/kb+jwt";
/// Media type of an SD-JWT based digital credential.
pub const DC_SD_JWT_MEDIA_TYPE: &str = "application/dc+sd-jwt";

/// The claims of an issuer-signed JWT: the reserved SD-JWT keys plus
/// arbitrary flattened properties.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct SdJwtClaims {
  #[serde(skip_serializing_if = "Vec::is_empty", default)]
  pub _sd: Vec<String>,
  pub _sd_alg: Option<String>,
  pub cnf: Option<RequiredKeyBinding>,
  #[serde(flatten)]
  pub(crate) properties: JsonObject,
}

impl Deref for SdJwtClaims {
  type Target = JsonObject;
  fn deref(&self) -> &Self::Target {
    &self.properties
  }
}

/// Representation of an SD-JWT of the format
/// `<Issuer-signed JWT>~<Disclosure 1>~<Disclosure 2>~...~<Disclosure N>~<optional KB-JWT>`.
///
/// An issuance carries every disclosure and no key binding JWT; a
/// presentation carries the subset of disclosures the holder reveals and,
/// optionally, a key binding JWT.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SdJwt {
  /// The JWT part.
  jwt: Jwt<SdJwtClaims>,
  /// The disclosures part.
  disclosures: Vec<Disclosure>,
  /// The optional key binding JWT.
  key_binding_jwt: Option<KeyBindingJwt>,
}

impl SdJwt {
  /// Creates a new [`SdJwt`] from its components.
  pub(crate) fn new(jwt: Jwt<SdJwtClaims>, disclosures: Vec<Disclosure>, key_binding_jwt: Option<KeyBindingJwt>) -> Self {
    Self {
      jwt,
      disclosures,
      key_binding_jwt,
    }
  }

  /// Returns the issuer-signed JWT.
  pub fn jwt(&self) -> &Jwt<SdJwtClaims> {
    &self.jwt
  }

  /// Returns the decoded header of the issuer-signed JWT.
  pub fn header(&self) -> &JsonObject {
    &self.jwt.header
  }

  /// Returns the decoded claims of the issuer-signed JWT.
  pub fn claims(&self) -> &SdJwtClaims {
    &self.jwt.claims
  }

  /// Returns the disclosures carried by this SD-JWT.
  pub fn disclosures(&self) -> &[Disclosure] {
    &self.disclosures
  }

  /// Returns the holder key commitment of the `cnf` claim, if any.
  pub fn required_key_bind(&self) -> Option<&RequiredKeyBinding> {
    self.claims().cnf.as_ref()
  }

  /// Returns the attached key binding JWT, if any.
  pub fn key_binding_jwt(&self) -> Option<&KeyBindingJwt> {
    self.key_binding_jwt.as_ref()
  }

  /// Attaches a key binding JWT, turning this SD-JWT into a bound presentation.
  pub fn attach_key_binding_jwt(&mut self, kb_jwt: KeyBindingJwt) {
    self.key_binding_jwt = Some(kb_jwt);
  }

  /// Serializes the components into the combined format.
  pub fn presentation(&self) -> String {
    let mut segments: Vec<String> = Vec::with_capacity(self.disclosures.len() + 2);
    segments.push(self.jwt.to_string());
    segments.extend(self.disclosures.iter().map(ToString::to_string));
    segments.push(
      self
        .key_binding_jwt
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default(),
    );
    segments.join("~")
  }

  /// Parses a combined-format SD-JWT into its components as [`SdJwt`].
  pub fn parse(sd_jwt: &str) -> Result<Self> {
    let sd_segments: Vec<&str> = sd_jwt.split('~').collect();
    let num_of_segments = sd_segments.len();
    if num_of_segments < 2 {
      return Err(Error::Deserialization(
        "SD-JWT format is invalid, less than 2 segments".to_string(),
      ));
    }

    let includes_key_binding = sd_jwt.chars().next_back().is_some_and(|char| char != '~');
    if includes_key_binding && num_of_segments < 3 {
      return Err(Error::Deserialization(
        "SD-JWT format is invalid, less than 3 segments with key binding jwt".to_string(),
      ));
    }

    let jwt = sd_segments.first().unwrap().parse()?;

    let disclosures: Vec<Disclosure> = sd_segments[1..num_of_segments - 1]
      .iter()
      .map(|s| Disclosure::parse(s))
      .try_collect()?;

    let key_binding_jwt = includes_key_binding
      .then(|| sd_segments[num_of_segments - 1].parse())
      .transpose()?;

    Ok(Self {
      jwt,
      disclosures,
      key_binding_jwt,
    })
  }

  /// Returns the SD-JWT digest of this token: the digest of its combined
  /// serialization up to and including the last `~`.
  ///
  /// This is the value a key binding JWT carries as `sd_hash`. Any attached
  /// KB-JWT sits after the last `~` and therefore never digests itself.
  pub fn digest(&self, hasher: &dyn Hasher) -> String {
    let serialized = self.presentation();
    let end = serialized.rfind('~').map(|index| index + 1).unwrap_or(serialized.len());
    hasher.encoded_digest(&serialized[..end])
  }

  /// Returns the JSON object obtained by replacing all disclosures into their
  /// corresponding concealable claims.
  pub fn into_disclosed_object(self, hasher: &dyn Hasher) -> Result<JsonObject> {
    self.decode(hasher).map(|decoded| decoded.object)
  }

  /// Recreates the claim set of this SD-JWT together with the disclosures
  /// required to reveal each claim path.
  pub fn decode(&self, hasher: &dyn Hasher) -> Result<DecodedSdObject> {
    self.check_hasher(hasher)?;
    let object = self.claims_object();
    SdObjectDecoder::decode_with_hasher(hasher, &object, &self.disclosures)
  }

  /// Computes the disclosures revealing exactly the claims selected by
  /// `query`, including those of all their disclosed ancestors.
  ///
  /// A concrete claim path matches a query path iff both have the same
  /// length and agree on every step, where [`ClaimPathSegment::All`]
  /// (`*`) in the query matches any step.
  ///
  /// ## Error
  /// [`Error::PresentationUnsatisfiable`] if any query path matches no claim
  /// of this SD-JWT. An empty query is satisfied by the empty selection.
  ///
  /// [`ClaimPathSegment::All`]: crate::ClaimPathSegment::All
  pub fn select_disclosures(&self, query: &[ClaimPath], hasher: &dyn Hasher) -> Result<Vec<Disclosure>> {
    let decoded = self.decode(hasher)?;

    let mut keep: HashSet<&str> = HashSet::new();
    for queried in query {
      let mut matched = false;
      for (path, chain) in &decoded.disclosures_per_path {
        if path.matches(queried) {
          matched = true;
          keep.extend(chain.iter().map(Disclosure::as_str));
        }
      }
      if !matched {
        return Err(Error::PresentationUnsatisfiable);
      }
    }

    // Filtering the original list keeps issuance order and drops duplicates.
    Ok(
      self
        .disclosures
        .iter()
        .filter(|disclosure| keep.contains(disclosure.as_str()))
        .cloned()
        .collect(),
    )
  }

  /// Turns this SD-JWT into a presentation revealing only the claims selected
  /// by `query`. Any attached key binding JWT is dropped, since it was bound
  /// to the previous disclosure set.
  ///
  /// Presenting everything requires no selection: serialize the issuance
  /// unchanged.
  pub fn into_presentation(mut self, query: &[ClaimPath], hasher: &dyn Hasher) -> Result<SdJwt> {
    self.disclosures = self.select_disclosures(query, hasher)?;
    self.key_binding_jwt = None;
    Ok(self)
  }

  /// Returns the JWS JSON serialization of this SD-JWT (flattened syntax).
  pub fn to_json_serialization(&self) -> Result<SdJwtJson> {
    let (protected, payload, signature) = self
      .jwt
      .as_str()
      .split('.')
      .collect_tuple()
      .ok_or_else(|| Error::Deserialization("the issuer-signed JWT is not a compact JWS".to_string()))?;
    Ok(SdJwtJson {
      protected: Some(protected.to_owned()),
      payload: payload.to_owned(),
      signature: Some(signature.to_owned()),
      signatures: vec![],
      disclosures: self.disclosures.iter().map(ToString::to_string).collect(),
      kb_jwt: self.key_binding_jwt.as_ref().map(ToString::to_string),
    })
  }

  /// Rebuilds an [`SdJwt`] from its JWS JSON serialization, accepting both
  /// the flattened syntax and the general syntax with exactly one signature.
  pub fn from_json_serialization(json: &SdJwtJson) -> Result<Self> {
    let (protected, signature) = match (&json.protected, &json.signature, json.signatures.as_slice()) {
      (Some(protected), Some(signature), _) => (protected, signature),
      (None, None, [entry]) => (&entry.protected, &entry.signature),
      _ => {
        return Err(Error::Deserialization(
          "JWS JSON serialization must carry exactly one signature".to_string(),
        ))
      }
    };
    let jwt = format!("{protected}.{}.{signature}", json.payload).parse()?;
    let disclosures: Vec<Disclosure> = json.disclosures.iter().map(|s| Disclosure::parse(s)).try_collect()?;
    let key_binding_jwt = json.kb_jwt.as_deref().map(str::parse).transpose()?;
    Ok(Self::new(jwt, disclosures, key_binding_jwt))
  }

  pub(crate) fn claims_object(&self) -> JsonObject {
    match serde_json::to_value(self.claims()) {
      Ok(Value::Object(object)) => object,
      _ => unreachable!("SdJwtClaims serializes to an object"),
    }
  }

  fn check_hasher(&self, hasher: &dyn Hasher) -> Result<()> {
    let required_alg = self.claims()._sd_alg.as_deref().unwrap_or(DEFAULT_ALG_NAME);
    if required_alg != hasher.alg_name() {
      return Err(Error::InvalidHasher(hasher.alg_name().to_owned()));
    }
    Ok(())
  }
}

impl Display for SdJwt {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.presentation())
  }
}

impl FromStr for SdJwt {
  type Err = Error;
  fn from_str(s: &str) -> Result<Self> {
    Self::parse(s)
  }
}

/// The JWS JSON serialization of an SD-JWT: the JWS fields plus the
/// SD-JWT-specific `disclosures` and `kb_jwt` members.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdJwtJson {
  pub protected: Option<String>,
  pub payload: String,
  pub signature: Option<String>,
  #[serde(skip_serializing_if = "Vec::is_empty", default)]
  pub signatures: Vec<SdJwtJsonSignature>,
  #[serde(skip_serializing_if = "Vec::is_empty", default)]
  pub disclosures: Vec<String>,
  pub kb_jwt: Option<String>,
}

/// One entry of the `signatures` member of the general JWS JSON syntax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdJwtJsonSignature {
  pub protected: String,
  pub signature: String,
}
