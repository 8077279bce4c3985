// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

/// Alias for a `Result` with the error type [`Error`].
pub type Result<T> = ::core::result::Result<T, Error>;

#[derive(Debug, thiserror::Error, strum::IntoStaticStr)]
#[non_exhaustive]
pub enum Error {
  #[error("claim name is invalid or reserved: {0}")]
  InvalidClaimName(String),

  #[error("claim value is not disclosable: {0}")]
  InvalidClaimValue(String),

  #[error("malformed disclosure: {0}")]
  MalformedDisclosure(String),

  #[error("multiple disclosures digest to {0}")]
  DuplicateDisclosure(String),

  #[error("{0} of the provided disclosures were not used")]
  UnusedDisclosure(usize),

  #[error("claim {0} appears more than once at the same level")]
  DuplicateClaim(String),

  #[error("conflicting elements produce the key {0} at the same level")]
  KeyCollision(String),

  #[error("claim {0} of disclosure already exists")]
  ClaimCollision(String),

  #[error("digest {0} appears multiple times")]
  DuplicateDigest(String),

  #[error("array disclosure object contains keys other than `...`")]
  InvalidArrayDisclosureObject,

  #[error("payload violates the SD-JWT structure: {0}")]
  MalformedPayload(String),

  #[error("hash algorithm {0} is not supported")]
  UnsupportedAlgorithm(String),

  #[error("no hasher can be specified for the hashing algorithm {0}")]
  MissingHasher(String),

  #[error("the provided hasher uses algorithm {0}, which is not the algorithm of this SD-JWT")]
  InvalidHasher(String),

  #[error("issuer signature verification failed: {0}")]
  InvalidSignature(String),

  #[error("key binding verification failed: {0}")]
  InvalidKeyBinding(String),

  #[error("no combination of the available disclosures satisfies the query")]
  PresentationUnsatisfiable,

  #[error("invalid input: {0}")]
  Deserialization(String),

  #[error("data type is not expected: {0}")]
  DataTypeMismatch(String),

  #[error("jws signer failure: {0}")]
  JwsSignerFailure(String),

  #[error("the property {0} is required but was not provided")]
  MissingRequiredProperty(String),

  #[error("salt size must be greater or equal 16")]
  InvalidSaltSize,
}
