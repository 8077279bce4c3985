// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! Helpers shared by the unit tests. Signatures produced here are
//! placeholders; signature verification is exercised in `tests/api_test.rs`
//! with a real JWS implementation.

use serde_json::json;
use serde_json::Value;

use crate::Disclosure;
use crate::Jwt;
use crate::SdJwt;
use crate::SdJwtClaims;

/// Builds an [`SdJwt`] carrying `claims` behind a placeholder signature.
pub(crate) fn sd_jwt_with(claims: Value, disclosures: Vec<Disclosure>) -> SdJwt {
  let encode = |value: &Value| multibase::Base::Base64Url.encode(serde_json::to_vec(value).unwrap());
  let header = encode(&json!({ "alg": "HS256", "typ": crate::HEADER_TYP }));
  let payload = encode(&claims);
  let jwt: Jwt<SdJwtClaims> = format!("{header}.{payload}.cGxhY2Vob2xkZXI")
    .parse()
    .expect("placeholder JWT is well-formed");
  SdJwt::new(jwt, disclosures, None)
}

/// Builds an [`SdJwt`] with `claims` and no disclosures.
pub(crate) fn sd_jwt_with_claims(claims: Value) -> SdJwt {
  sd_jwt_with(claims, vec![])
}
