// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use std::error::Error;

use async_trait::async_trait;
use serde_json::Map;
use serde_json::Value;

/// A JSON object with insertion-ordered keys.
pub type JsonObject = Map<String, Value>;

/// JSON Web Signature (JWS) Signer.
///
/// Signing is one of the two suspension points of this crate; everything else
/// is pure and synchronous. Implementations wrap a concrete JOSE library and
/// are injected where an SD-JWT or a key binding JWT is created.
#[async_trait]
pub trait JwsSigner {
  type Error: Error;

  /// Creates a JWS over `payload`, returning the UTF-8 bytes of the compact
  /// JWS serialization. The algorithm used for signing must be read from the
  /// `header.alg` property.
  async fn sign(&self, header: &JsonObject, payload: &JsonObject) -> Result<Vec<u8>, Self::Error>;
}
