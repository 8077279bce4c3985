// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Display;
use std::str::FromStr;

use anyhow::Context as _;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use serde_json::Value;

use crate::jwt::Jwt;
use crate::Error;
use crate::Hasher;
use crate::JsonObject;
use crate::JwsSigner;
use crate::Result;
use crate::SdJwt;
use crate::DEFAULT_ALG_NAME;

/// `typ` of the key binding JWT header.
pub const KB_JWT_HEADER_TYP: &str = "kb+jwt";

/// A commitment to the holder's key, carried in the `cnf` claim of an SD-JWT
/// as specified in [RFC7800](https://www.rfc-editor.org/rfc/rfc7800.html#section-3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredKeyBinding {
  /// The holder's public key as a JWK.
  Jwk(JsonObject),
  /// A reference to the holder's key by key identifier.
  Kid(String),
  /// Any other confirmation method, kept verbatim.
  #[serde(untagged)]
  Custom(Value),
}

/// Claims set for key binding JWT.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct KeyBindingJwtClaims {
  pub iat: i64,
  pub aud: String,
  pub nonce: String,
  /// Digest of the presentation this JWT is bound to.
  pub sd_hash: String,
  #[serde(flatten)]
  pub properties: JsonObject,
}

/// A JWT signed by the holder, binding a specific presentation to the
/// holder's key through its `sd_hash` claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBindingJwt(Jwt<KeyBindingJwtClaims>);

impl KeyBindingJwt {
  /// Returns a [`KeyBindingJwtBuilder`].
  pub fn builder() -> KeyBindingJwtBuilder {
    KeyBindingJwtBuilder::new()
  }

  /// Returns the decoded JOSE header.
  pub fn header(&self) -> &JsonObject {
    &self.0.header
  }

  /// Returns the decoded claims.
  pub fn claims(&self) -> &KeyBindingJwtClaims {
    &self.0.claims
  }

  /// Returns the compact JWS serialization.
  pub fn as_str(&self) -> &str {
    self.0.as_str()
  }
}

impl Display for KeyBindingJwt {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for KeyBindingJwt {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let jwt: Jwt<KeyBindingJwtClaims> = s.parse()?;
    let typ = jwt.header.get("typ").and_then(Value::as_str);
    if typ != Some(KB_JWT_HEADER_TYP) {
      return Err(Error::Deserialization(format!(
        "invalid KB-JWT: header `typ` must be \"{KB_JWT_HEADER_TYP}\""
      )));
    }
    Ok(Self(jwt))
  }
}

/// Builder structure to create a [`KeyBindingJwt`] for a given presentation.
#[derive(Debug, Default, Clone)]
pub struct KeyBindingJwtBuilder {
  header: JsonObject,
  iat: Option<i64>,
  aud: Option<String>,
  nonce: Option<String>,
  properties: JsonObject,
}

impl KeyBindingJwtBuilder {
  /// Creates a new [`KeyBindingJwtBuilder`].
  pub fn new() -> Self {
    Self::default()
  }

  /// Sets the issuance timestamp, in seconds since the Unix epoch.
  pub fn iat(mut self, iat: i64) -> Self {
    self.iat = Some(iat);
    self
  }

  /// Sets the intended audience of the presentation.
  pub fn aud(mut self, aud: impl Into<String>) -> Self {
    self.aud = Some(aud.into());
    self
  }

  /// Sets the verifier-provided nonce.
  pub fn nonce(mut self, nonce: impl Into<String>) -> Self {
    self.nonce = Some(nonce.into());
    self
  }

  /// Adds an additional property to the JOSE header.
  pub fn header_property(mut self, name: impl Into<String>, value: Value) -> Self {
    self.header.insert(name.into(), value);
    self
  }

  /// Adds an additional claim to the payload.
  pub fn insert_property(mut self, name: impl Into<String>, value: Value) -> Self {
    self.properties.insert(name.into(), value);
    self
  }

  /// Signs the key binding JWT for the presentation `sd_jwt`.
  ///
  /// The `sd_hash` claim is the digest of the presentation's serialization up
  /// to and including the last `~`, so an attached KB-JWT never contributes
  /// to its own hash.
  ///
  /// ## Error
  /// [`Error::MissingRequiredProperty`] if `iat`, `aud`, or `nonce` was not
  /// set, [`Error::InvalidHasher`] if `hasher` does not match the `_sd_alg`
  /// of `sd_jwt`, [`Error::JwsSignerFailure`] if signing fails.
  pub async fn finish<S: JwsSigner>(
    self,
    sd_jwt: &SdJwt,
    hasher: &dyn Hasher,
    alg: &str,
    signer: &S,
  ) -> Result<KeyBindingJwt> {
    let required_alg = sd_jwt.claims()._sd_alg.as_deref().unwrap_or(DEFAULT_ALG_NAME);
    if required_alg != hasher.alg_name() {
      return Err(Error::InvalidHasher(hasher.alg_name().to_owned()));
    }

    let claims = KeyBindingJwtClaims {
      iat: self
        .iat
        .ok_or_else(|| Error::MissingRequiredProperty("iat".to_owned()))?,
      aud: self
        .aud
        .ok_or_else(|| Error::MissingRequiredProperty("aud".to_owned()))?,
      nonce: self
        .nonce
        .ok_or_else(|| Error::MissingRequiredProperty("nonce".to_owned()))?,
      sd_hash: sd_jwt.digest(hasher),
      properties: self.properties,
    };

    let mut header = self.header;
    header.insert("typ".to_string(), json!(KB_JWT_HEADER_TYP));
    header.insert("alg".to_string(), json!(alg));

    let payload = match serde_json::to_value(&claims) {
      Ok(Value::Object(object)) => object,
      _ => unreachable!("KB-JWT claims serialize to an object"),
    };

    let jws = signer
      .sign(&header, &payload)
      .await
      .map_err(|e| anyhow::anyhow!("jws failed: {e}"))
      .and_then(|jws_bytes| String::from_utf8(jws_bytes).context("invalid JWS"))
      .map_err(|e| Error::JwsSignerFailure(e.to_string()))?;

    jws.parse()
  }
}
