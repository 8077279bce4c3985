// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

#[cfg(feature = "sha")]
use crypto::hashes::sha::SHA256;
#[cfg(feature = "sha")]
use crypto::hashes::sha::SHA256_LEN;
#[cfg(feature = "sha")]
use crypto::hashes::sha::SHA384;
#[cfg(feature = "sha")]
use crypto::hashes::sha::SHA384_LEN;
#[cfg(feature = "sha")]
use crypto::hashes::sha::SHA512;
#[cfg(feature = "sha")]
use crypto::hashes::sha::SHA512_LEN;
use rand::Rng;

use crate::Error;
use crate::Result;

/// Alias of the hash algorithm used when `_sd_alg` is absent.
pub const DEFAULT_ALG_NAME: &str = "sha-256";

/// The closed set of hash algorithms usable for disclosure digests.
///
/// Identifiers are the lowercase aliases from the IANA
/// "Named Information Hash Algorithm" registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::EnumIter)]
pub enum HashAlgorithm {
  #[strum(serialize = "sha-256")]
  Sha256,
  #[strum(serialize = "sha-384")]
  Sha384,
  #[strum(serialize = "sha-512")]
  Sha512,
  #[strum(serialize = "sha3-256")]
  Sha3_256,
  #[strum(serialize = "sha3-384")]
  Sha3_384,
  #[strum(serialize = "sha3-512")]
  Sha3_512,
}

impl HashAlgorithm {
  /// Parses an IANA alias into a [`HashAlgorithm`].
  ///
  /// ## Error
  /// Returns [`Error::UnsupportedAlgorithm`] for identifiers outside the closed set.
  pub fn from_alias(alias: &str) -> Result<Self> {
    alias
      .parse()
      .map_err(|_| Error::UnsupportedAlgorithm(alias.to_owned()))
  }

  /// Returns the IANA alias of this algorithm.
  pub const fn alias(&self) -> &'static str {
    match self {
      Self::Sha256 => "sha-256",
      Self::Sha384 => "sha-384",
      Self::Sha512 => "sha-512",
      Self::Sha3_256 => "sha3-256",
      Self::Sha3_384 => "sha3-384",
      Self::Sha3_512 => "sha3-512",
    }
  }

  /// Length in bytes of a digest produced with this algorithm.
  pub const fn digest_len(&self) -> usize {
    match self {
      Self::Sha256 | Self::Sha3_256 => 32,
      Self::Sha384 | Self::Sha3_384 => 48,
      Self::Sha512 | Self::Sha3_512 => 64,
    }
  }
}

/// Used to implement hash functions to be used for disclosure digests.
///
/// ## Note
///
/// Implementations of this trait are expected only for the algorithms of
/// [`HashAlgorithm`], i.e. those listed in the IANA "Named Information
/// Hash Algorithm" registry.
pub trait Hasher: Sync + Send {
  /// Digests input to produce a unique fixed-size hash value in bytes.
  fn digest(&self, input: &[u8]) -> Vec<u8>;

  /// Returns the IANA alias of the hash function used.
  fn alg_name(&self) -> &'static str;

  /// Returns the base64url-encoded digest of a `disclosure`.
  ///
  /// The digest is taken over the US-ASCII bytes of the encoded disclosure,
  /// never over a re-serialization.
  fn encoded_digest(&self, disclosure: &str) -> String {
    let hash = self.digest(disclosure.as_bytes());
    multibase::Base::Base64Url.encode(hash)
  }
}

/// Returns a decoy digest: the digest of freshly drawn random bytes.
///
/// Its encoded form has exactly the length of a real digest and is
/// indistinguishable from one.
pub fn decoy_digest(hasher: &dyn Hasher) -> String {
  let mut rng = rand::thread_rng();
  let entropy: Vec<u8> = (0..32).map(|_| rng.gen()).collect();
  multibase::Base::Base64Url.encode(hasher.digest(&entropy))
}

/// Returns `count` decoy digests.
pub fn decoy_digests(hasher: &dyn Hasher, count: usize) -> Vec<String> {
  (0..count).map(|_| decoy_digest(hasher)).collect()
}

/// An implementation of [`Hasher`] that uses the `sha-256` hash function.
#[cfg(feature = "sha")]
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Hasher;

#[cfg(feature = "sha")]
impl Sha256Hasher {
  pub const ALG_NAME: &'static str = "sha-256";

  /// Creates a new [`Sha256Hasher`].
  pub fn new() -> Self {
    Sha256Hasher {}
  }
}

#[cfg(feature = "sha")]
impl Hasher for Sha256Hasher {
  fn digest(&self, input: &[u8]) -> Vec<u8> {
    let mut digest: [u8; SHA256_LEN] = Default::default();
    SHA256(input, &mut digest);
    digest.to_vec()
  }

  fn alg_name(&self) -> &'static str {
    Sha256Hasher::ALG_NAME
  }
}

/// An implementation of [`Hasher`] that uses the `sha-384` hash function.
#[cfg(feature = "sha")]
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha384Hasher;

#[cfg(feature = "sha")]
impl Sha384Hasher {
  pub const ALG_NAME: &'static str = "sha-384";

  /// Creates a new [`Sha384Hasher`].
  pub fn new() -> Self {
    Sha384Hasher {}
  }
}

#[cfg(feature = "sha")]
impl Hasher for Sha384Hasher {
  fn digest(&self, input: &[u8]) -> Vec<u8> {
    let mut digest: [u8; SHA384_LEN] = [0u8; SHA384_LEN];
    SHA384(input, &mut digest);
    digest.to_vec()
  }

  fn alg_name(&self) -> &'static str {
    Sha384Hasher::ALG_NAME
  }
}

/// An implementation of [`Hasher`] that uses the `sha-512` hash function.
#[cfg(feature = "sha")]
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha512Hasher;

#[cfg(feature = "sha")]
impl Sha512Hasher {
  pub const ALG_NAME: &'static str = "sha-512";

  /// Creates a new [`Sha512Hasher`].
  pub fn new() -> Self {
    Sha512Hasher {}
  }
}

#[cfg(feature = "sha")]
impl Hasher for Sha512Hasher {
  fn digest(&self, input: &[u8]) -> Vec<u8> {
    let mut digest: [u8; SHA512_LEN] = [0u8; SHA512_LEN];
    SHA512(input, &mut digest);
    digest.to_vec()
  }

  fn alg_name(&self) -> &'static str {
    Sha512Hasher::ALG_NAME
  }
}

/// An implementation of [`Hasher`] that uses the `sha3-256` hash function.
#[cfg(feature = "sha3")]
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha3_256Hasher;

#[cfg(feature = "sha3")]
impl Sha3_256Hasher {
  pub const ALG_NAME: &'static str = "sha3-256";

  /// Creates a new [`Sha3_256Hasher`].
  pub fn new() -> Self {
    Sha3_256Hasher {}
  }
}

#[cfg(feature = "sha3")]
impl Hasher for Sha3_256Hasher {
  fn digest(&self, input: &[u8]) -> Vec<u8> {
    use sha3::Digest;
    sha3::Sha3_256::digest(input).to_vec()
  }

  fn alg_name(&self) -> &'static str {
    Sha3_256Hasher::ALG_NAME
  }
}

/// An implementation of [`Hasher`] that uses the `sha3-384` hash function.
#[cfg(feature = "sha3")]
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha3_384Hasher;

#[cfg(feature = "sha3")]
impl Sha3_384Hasher {
  pub const ALG_NAME: &'static str = "sha3-384";

  /// Creates a new [`Sha3_384Hasher`].
  pub fn new() -> Self {
    Sha3_384Hasher {}
  }
}

#[cfg(feature = "sha3")]
impl Hasher for Sha3_384Hasher {
  fn digest(&self, input: &[u8]) -> Vec<u8> {
    use sha3::Digest;
    sha3::Sha3_384::digest(input).to_vec()
  }

  fn alg_name(&self) -> &'static str {
    Sha3_384Hasher::ALG_NAME
  }
}

/// An implementation of [`Hasher`] that uses the `sha3-512` hash function.
#[cfg(feature = "sha3")]
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha3_512Hasher;

#[cfg(feature = "sha3")]
impl Sha3_512Hasher {
  pub const ALG_NAME: &'static str = "sha3-512";

  /// Creates a new [`Sha3_512Hasher`].
  pub fn new() -> Self {
    Sha3_512Hasher {}
  }
}

#[cfg(feature = "sha3")]
impl Hasher for Sha3_512Hasher {
  fn digest(&self, input: &[u8]) -> Vec<u8> {
    use sha3::Digest;
    sha3::Sha3_512::digest(input).to_vec()
  }

  fn alg_name(&self) -> &'static str {
    Sha3_512Hasher::ALG_NAME
  }
}
