// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;

use crate::DisclosuresPerPath;
use crate::Error;
use crate::Hasher;
use crate::JsonObject;
use crate::KeyBindingJwt;
use crate::Result;
use crate::SdJwt;
use crate::SdObjectDecoder;

/// JSON Web Signature (JWS) verifier.
///
/// The counterpart of [`JwsSigner`](crate::JwsSigner): implementations wrap a
/// concrete JOSE library and are injected wherever a signature has to be
/// checked. Key resolution (issuer metadata, `cnf` lookup, trust decisions)
/// happens inside the implementation.
#[async_trait]
pub trait JwsVerifier {
  type Error: std::error::Error;

  /// Verifies the signature of the compact JWS serialization `jws`.
  async fn verify(&self, jws: &str) -> std::result::Result<(), Self::Error>;
}

/// Policy applied to the key binding JWT of a presentation.
#[derive(Debug, Default, Clone)]
pub struct KeyBindingOptions {
  /// Demand a key binding JWT even if the payload carries no `cnf` claim.
  pub required: bool,
  /// Expected `aud` value of the KB-JWT claims.
  pub aud: Option<String>,
  /// Expected `nonce` value of the KB-JWT claims.
  pub nonce: Option<String>,
}

impl KeyBindingOptions {
  /// Constructor that sets all options to their defaults.
  pub fn new() -> Self {
    Self::default()
  }

  /// Demands a key binding JWT regardless of the `cnf` claim.
  pub fn required(mut self) -> Self {
    self.required = true;
    self
  }

  /// Sets the expected `aud` value.
  pub fn aud(mut self, aud: impl Into<String>) -> Self {
    self.aud = Some(aud.into());
    self
  }

  /// Sets the expected `nonce` value.
  pub fn nonce(mut self, nonce: impl Into<String>) -> Self {
    self.nonce = Some(nonce.into());
    self
  }
}

/// The outcome of a successful verification: the parsed token and its
/// recreated claims.
#[derive(Debug)]
pub struct VerifiedSdJwt {
  sd_jwt: SdJwt,
  claims: JsonObject,
  disclosures_per_path: DisclosuresPerPath,
}

impl VerifiedSdJwt {
  /// Returns the parsed SD-JWT.
  pub fn sd_jwt(&self) -> &SdJwt {
    &self.sd_jwt
  }

  /// Returns the recreated claim set, with every presented disclosure
  /// substituted in.
  pub fn claims(&self) -> &JsonObject {
    &self.claims
  }

  /// Returns the disclosures backing each recreated claim path.
  pub fn disclosures_per_path(&self) -> &DisclosuresPerPath {
    &self.disclosures_per_path
  }

  /// Consumes `self`, returning the recreated claim set.
  pub fn into_claims(self) -> JsonObject {
    self.claims
  }
}

/// Verifies serialized SD-JWTs end to end.
///
/// The verification proceeds through the fixed sequence parse → issuer
/// signature → disclosure validation and recreation → key binding, with the
/// signature checks delegated to injected [`JwsVerifier`]s.
pub struct SdJwtVerifier {
  decoder: SdObjectDecoder,
  kb_options: KeyBindingOptions,
}

impl SdJwtVerifier {
  /// Creates a verifier with a hasher registered for every algorithm
  /// available under the enabled crate features.
  pub fn new() -> Self {
    Self::with_decoder(SdObjectDecoder::new_with_default_hashers())
  }

  /// Creates a verifier with a custom decoder, e.g. one with externally
  /// provided hashers.
  pub fn with_decoder(decoder: SdObjectDecoder) -> Self {
    Self {
      decoder,
      kb_options: KeyBindingOptions::default(),
    }
  }

  /// Sets the key binding policy.
  pub fn key_binding_options(mut self, options: KeyBindingOptions) -> Self {
    self.kb_options = options;
    self
  }

  /// Verifies a serialized SD-JWT without checking key binding.
  ///
  /// ## Error
  /// Fails with [`Error::InvalidKeyBinding`] if the token requires or carries
  /// a key binding JWT; use [`verify_with_key_binding`](Self::verify_with_key_binding)
  /// for those.
  pub async fn verify<V: JwsVerifier>(&self, serialized: &str, issuer_verifier: &V) -> Result<VerifiedSdJwt> {
    self.verify_impl::<V, V>(serialized, issuer_verifier, None).await
  }

  /// Verifies a serialized SD-JWT including its key binding JWT, whose
  /// signature is checked by `holder_verifier`.
  pub async fn verify_with_key_binding<V, K>(
    &self,
    serialized: &str,
    issuer_verifier: &V,
    holder_verifier: &K,
  ) -> Result<VerifiedSdJwt>
  where
    V: JwsVerifier,
    K: JwsVerifier,
  {
    self.verify_impl(serialized, issuer_verifier, Some(holder_verifier)).await
  }

  async fn verify_impl<V, K>(
    &self,
    serialized: &str,
    issuer_verifier: &V,
    holder_verifier: Option<&K>,
  ) -> Result<VerifiedSdJwt>
  where
    V: JwsVerifier,
    K: JwsVerifier,
  {
    let sd_jwt = SdJwt::parse(serialized)?;

    issuer_verifier
      .verify(sd_jwt.jwt().as_str())
      .await
      .map_err(|e| Error::InvalidSignature(e.to_string()))?;

    let object = sd_jwt.claims_object();
    let decoded = self.decoder.decode(&object, sd_jwt.disclosures())?;

    let kb_required = self.kb_options.required || sd_jwt.required_key_bind().is_some();
    match sd_jwt.key_binding_jwt() {
      None if kb_required => {
        return Err(Error::InvalidKeyBinding(
          "a key binding JWT is required, but none was found".to_string(),
        ))
      }
      None => {}
      Some(kb_jwt) => {
        let hasher = self.decoder.determine_hasher(&object)?;
        self.verify_key_binding(&sd_jwt, kb_jwt, hasher, holder_verifier).await?;
      }
    }

    Ok(VerifiedSdJwt {
      sd_jwt,
      claims: decoded.object,
      disclosures_per_path: decoded.disclosures_per_path,
    })
  }

  async fn verify_key_binding<K: JwsVerifier>(
    &self,
    sd_jwt: &SdJwt,
    kb_jwt: &KeyBindingJwt,
    hasher: &dyn Hasher,
    holder_verifier: Option<&K>,
  ) -> Result<()> {
    let Some(holder_verifier) = holder_verifier else {
      return Err(Error::InvalidKeyBinding(
        "the token carries a key binding JWT, but no verifier for it was provided".to_string(),
      ));
    };

    holder_verifier
      .verify(kb_jwt.as_str())
      .await
      .map_err(|e| Error::InvalidKeyBinding(format!("invalid signature: {e}")))?;

    let digest = sd_jwt.digest(hasher);
    let claims = kb_jwt.claims();
    if claims.sd_hash != digest {
      return Err(Error::InvalidKeyBinding(
        "`sd_hash` does not match the presented SD-JWT".to_string(),
      ));
    }
    if let Some(nonce) = self.kb_options.nonce.as_deref() {
      if nonce != claims.nonce {
        return Err(Error::InvalidKeyBinding("unexpected `nonce` value".to_string()));
      }
    }
    if let Some(aud) = self.kb_options.aud.as_deref() {
      if aud != claims.aud {
        return Err(Error::InvalidKeyBinding("unexpected `aud` value".to_string()));
      }
    }
    Ok(())
  }
}

impl Default for SdJwtVerifier {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(all(test, feature = "sha"))]
mod test {
  use super::JwsVerifier;
  use super::KeyBindingOptions;
  use super::SdJwtVerifier;
  use crate::test_utils::sd_jwt_with_claims;
  use crate::Error;
  use async_trait::async_trait;
  use serde_json::json;

  #[derive(Debug, thiserror::Error)]
  #[error("signature rejected")]
  struct Rejected;

  /// Verifier accepting or rejecting everything.
  struct StubVerifier(bool);

  #[async_trait]
  impl JwsVerifier for StubVerifier {
    type Error = Rejected;
    async fn verify(&self, _jws: &str) -> Result<(), Self::Error> {
      if self.0 {
        Ok(())
      } else {
        Err(Rejected)
      }
    }
  }

  #[tokio::test]
  async fn rejected_issuer_signature() {
    let serialized = sd_jwt_with_claims(json!({ "iss": "https://i" })).presentation();
    let verifier = SdJwtVerifier::new();
    let result = verifier.verify(&serialized, &StubVerifier(false)).await;
    assert!(matches!(result.unwrap_err(), Error::InvalidSignature(_)));
  }

  #[tokio::test]
  async fn accepted_without_key_binding() {
    let serialized = sd_jwt_with_claims(json!({ "iss": "https://i" })).presentation();
    let verifier = SdJwtVerifier::new();
    let verified = verifier.verify(&serialized, &StubVerifier(true)).await.unwrap();
    assert_eq!(verified.claims().get("iss").unwrap(), "https://i");
  }

  #[tokio::test]
  async fn missing_required_key_binding() {
    // `cnf` commits to a holder key, so key binding becomes mandatory.
    let serialized = sd_jwt_with_claims(json!({ "cnf": { "kid": "did:example:h#k1" } })).presentation();
    let verifier = SdJwtVerifier::new();
    let result = verifier
      .verify_with_key_binding(&serialized, &StubVerifier(true), &StubVerifier(true))
      .await;
    assert!(matches!(result.unwrap_err(), Error::InvalidKeyBinding(_)));
  }

  #[tokio::test]
  async fn key_binding_demanded_by_policy() {
    let serialized = sd_jwt_with_claims(json!({ "iss": "https://i" })).presentation();
    let verifier = SdJwtVerifier::new().key_binding_options(KeyBindingOptions::new().required());
    let result = verifier
      .verify_with_key_binding(&serialized, &StubVerifier(true), &StubVerifier(true))
      .await;
    assert!(matches!(result.unwrap_err(), Error::InvalidKeyBinding(_)));
  }
}
