// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use std::error::Error;

use async_trait::async_trait;
use josekit::jws::JwsHeader;
use josekit::jws::HS256;
use sd_jwt_core::ClaimPath;
use sd_jwt_core::JsonObject;
use sd_jwt_core::JwsSigner;
use sd_jwt_core::JwsVerifier;
use sd_jwt_core::KeyBindingJwtBuilder;
use sd_jwt_core::KeyBindingOptions;
use sd_jwt_core::SdElements;
use sd_jwt_core::SdJwtBuilder;
use sd_jwt_core::SdJwtVerifier;
use sd_jwt_core::Sha256Hasher;
use serde_json::json;

const ISSUER_KEY: &[u8] = b"0123456789ABCDEF0123456789ABCDEF";
const HOLDER_KEY: &[u8] = b"FEDCBA9876543210FEDCBA9876543210";

// Creating and verifying JWTs is outside the scope of this library;
// josekit is used here as an example.
struct HmacSigner(&'static [u8]);

#[async_trait]
impl JwsSigner for HmacSigner {
  type Error = josekit::JoseError;

  async fn sign(&self, header: &JsonObject, payload: &JsonObject) -> Result<Vec<u8>, Self::Error> {
    let signer = HS256.signer_from_bytes(self.0)?;
    let header = JwsHeader::from_map(header.clone())?;
    let payload = serde_json::to_vec(payload).expect("claims are serializable");
    josekit::jws::serialize_compact(&payload, &header, &signer).map(String::into_bytes)
  }
}

struct HmacVerifier(&'static [u8]);

#[async_trait]
impl JwsVerifier for HmacVerifier {
  type Error = josekit::JoseError;

  async fn verify(&self, jws: &str) -> Result<(), Self::Error> {
    let verifier = HS256.verifier_from_bytes(self.0)?;
    josekit::jws::deserialize_compact(jws, &verifier).map(|_| ())
  }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
  // The issuer describes which claims are plain and which are disclosable.
  let elements = SdElements::new()
    .plain(json!({
      "iss": "https://issuer.example.com",
      "iat": 1683000000,
    }))?
    .flat(json!({
      "given_name": "John",
      "family_name": "Doe",
      "email": "johndoe@example.com",
    }))?
    .structured(
      "address",
      SdElements::new()
        .plain(json!({ "country": "US" }))?
        .flat(json!({
          "street_address": "123 Main St",
          "locality": "Anytown",
        }))?,
    )?;

  let sd_jwt = SdJwtBuilder::new(elements)
    .add_decoys(2)
    .finish(&HmacSigner(ISSUER_KEY), "HS256")
    .await?;
  println!("issued SD-JWT: {sd_jwt}");

  // The holder presents a subset of the received claims, bound to its key.
  let hasher = Sha256Hasher::new();
  let query: Vec<ClaimPath> = vec!["/email".parse()?, "/address/locality".parse()?];
  let mut presentation = sd_jwt.into_presentation(&query, &hasher)?;

  let kb_jwt = KeyBindingJwtBuilder::new()
    .iat(1683000060)
    .aud("https://verifier.example.com")
    .nonce("nonce-42")
    .finish(&presentation, &hasher, "HS256", &HmacSigner(HOLDER_KEY))
    .await?;
  presentation.attach_key_binding_jwt(kb_jwt);
  let serialized = presentation.presentation();
  println!("presented SD-JWT: {serialized}");

  // The verifier checks both signatures and recreates the claims.
  let verifier = SdJwtVerifier::new().key_binding_options(
    KeyBindingOptions::new()
      .required()
      .aud("https://verifier.example.com")
      .nonce("nonce-42"),
  );
  let verified = verifier
    .verify_with_key_binding(&serialized, &HmacVerifier(ISSUER_KEY), &HmacVerifier(HOLDER_KEY))
    .await?;
  println!(
    "verified claims: {}",
    serde_json::to_string_pretty(verified.claims())?
  );
  Ok(())
}
