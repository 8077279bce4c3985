// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use anyhow::Context as _;
use serde_json::Value;

use crate::jwt::Jwt;
use crate::DisclosedClaims;
use crate::Error;
use crate::Hasher;
use crate::JwsSigner;
use crate::RandomSaltProvider;
use crate::RequiredKeyBinding;
use crate::Result;
use crate::SaltProvider;
use crate::SdElements;
use crate::SdJwt;
use crate::SdJwtClaims;
use crate::SdObjectEncoder;
#[cfg(feature = "sha")]
use crate::Sha256Hasher;
use crate::HEADER_TYP;

/// Builder structure to create an issuable SD-JWT from an element set.
#[cfg(not(feature = "sha"))]
#[derive(Debug)]
pub struct SdJwtBuilder<H, S = RandomSaltProvider> {
  encoder: SdObjectEncoder<H, S>,
  elements: SdElements,
  key_bind: Option<RequiredKeyBinding>,
}

/// Builder structure to create an issuable SD-JWT from an element set.
///
/// ## Example
/// ```rust,no_run
/// # use sd_jwt_core::{SdElements, SdJwtBuilder, JwsSigner, Result};
/// # use serde_json::json;
/// # async fn issue<S: JwsSigner>(signer: &S) -> Result<()> {
/// let elements = SdElements::new()
///   .plain(json!({ "iss": "https://issuer.example.com" }))?
///   .flat(json!({ "given_name": "Alice" }))?;
/// let sd_jwt = SdJwtBuilder::new(elements)
///   .add_decoys(2)
///   .finish(signer, "ES256")
///   .await?;
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "sha")]
#[derive(Debug)]
pub struct SdJwtBuilder<H = Sha256Hasher, S = RandomSaltProvider> {
  encoder: SdObjectEncoder<H, S>,
  elements: SdElements,
  key_bind: Option<RequiredKeyBinding>,
}

#[cfg(feature = "sha")]
impl SdJwtBuilder {
  /// Creates a new [`SdJwtBuilder`] with the `sha-256` hash function and
  /// random salts.
  pub fn new(elements: SdElements) -> Self {
    Self::new_with_hasher(elements, Sha256Hasher::new())
  }
}

impl<H: Hasher> SdJwtBuilder<H, RandomSaltProvider> {
  /// Creates a new [`SdJwtBuilder`] with a custom hash function to create
  /// digests.
  pub fn new_with_hasher(elements: SdElements, hasher: H) -> Self {
    Self::new_with_hasher_and_salt_provider(elements, hasher, RandomSaltProvider::new())
  }
}

impl<H: Hasher, S: SaltProvider> SdJwtBuilder<H, S> {
  /// Creates a new [`SdJwtBuilder`] with a custom hash function and salt
  /// provider.
  pub fn new_with_hasher_and_salt_provider(elements: SdElements, hasher: H, salt_provider: S) -> Self {
    Self {
      encoder: SdObjectEncoder::with_hasher_and_salt_provider(hasher, salt_provider),
      elements,
      key_bind: None,
    }
  }

  /// Mixes `number_of_decoys` decoy digests into the `_sd` array of every
  /// object level that carries one.
  pub fn add_decoys(mut self, number_of_decoys: usize) -> Self {
    self.encoder = self.encoder.with_decoys(number_of_decoys);
    self
  }

  /// Requires a proof of possession of a given key from the holder.
  ///
  /// This operation adds a JWT confirmation (`cnf`) claim as specified in
  /// [RFC7800](https://www.rfc-editor.org/rfc/rfc7800.html#section-3).
  pub fn require_key_binding(mut self, key_bind: RequiredKeyBinding) -> Self {
    self.key_bind = Some(key_bind);
    self
  }

  /// Creates an SD-JWT with the provided data.
  pub async fn finish<Signer>(self, signer: &Signer, alg: &str) -> Result<SdJwt>
  where
    Signer: JwsSigner,
  {
    let SdJwtBuilder {
      encoder,
      elements,
      key_bind,
    } = self;
    let DisclosedClaims {
      mut claim_set,
      disclosures,
    } = encoder.disclose(&elements)?;

    // Add key binding requirement as `cnf`.
    if let Some(key_bind) = key_bind {
      if claim_set.contains_key("cnf") {
        return Err(Error::KeyCollision("cnf".to_string()));
      }
      let key_bind = serde_json::to_value(key_bind).map_err(|e| Error::Deserialization(e.to_string()))?;
      claim_set.insert("cnf".to_string(), key_bind);
    }

    let Value::Object(header) = serde_json::json!({
      "typ": HEADER_TYP,
      "alg": alg,
    }) else {
      unreachable!();
    };

    let jws = signer
      .sign(&header, &claim_set)
      .await
      .map_err(|e| anyhow::anyhow!("jws failed: {e}"))
      .and_then(|jws_bytes| String::from_utf8(jws_bytes).context("invalid JWS"))
      .map_err(|e| Error::JwsSignerFailure(e.to_string()))?;

    let jwt: Jwt<SdJwtClaims> = jws
      .parse()
      .map_err(|e| Error::Deserialization(format!("invalid SD-JWT claims: {e}")))?;

    Ok(SdJwt::new(jwt, disclosures, None))
  }
}
