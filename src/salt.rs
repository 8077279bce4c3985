// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use rand::Rng;

use crate::Error;
use crate::Result;

/// Default size of the random data used to generate salts, in bytes.
pub const DEFAULT_SALT_SIZE: usize = 30;

/// Source of the salts embedded in disclosures.
///
/// Salts are drawn once per disclosure and never reused. Implementations
/// must be thread-safe; the default [`RandomSaltProvider`] draws from the
/// platform CSPRNG. Deterministic implementations are useful in tests.
pub trait SaltProvider: Sync + Send {
  /// Returns a fresh salt encoded as base64url without padding.
  fn salt(&self) -> String;
}

/// A [`SaltProvider`] producing random salts of a fixed size.
#[derive(Debug, Clone)]
pub struct RandomSaltProvider {
  salt_size: usize,
}

impl RandomSaltProvider {
  /// Creates a new [`RandomSaltProvider`] with the default salt size.
  pub fn new() -> Self {
    Self {
      salt_size: DEFAULT_SALT_SIZE,
    }
  }

  /// Creates a new [`RandomSaltProvider`] with a custom salt size in bytes.
  ///
  /// ## Error
  /// Returns [`Error::InvalidSaltSize`] if `salt_size` is smaller than 16,
  /// the minimum required 128 bits of entropy.
  pub fn with_salt_size(salt_size: usize) -> Result<Self> {
    if salt_size < 16 {
      Err(Error::InvalidSaltSize)
    } else {
      Ok(Self { salt_size })
    }
  }

  /// Returns the used salt size in bytes.
  pub fn salt_size(&self) -> usize {
    self.salt_size
  }
}

impl Default for RandomSaltProvider {
  fn default() -> Self {
    Self::new()
  }
}

impl SaltProvider for RandomSaltProvider {
  fn salt(&self) -> String {
    let mut rng = rand::thread_rng();
    let random_bytes: Vec<u8> = (0..self.salt_size).map(|_| rng.gen()).collect();
    multibase::Base::Base64Url.encode(random_bytes)
  }
}

#[cfg(test)]
mod test {
  use super::RandomSaltProvider;
  use super::SaltProvider;
  use crate::Error;

  #[test]
  fn salt_size_lower_bound() {
    assert!(matches!(
      RandomSaltProvider::with_salt_size(15).unwrap_err(),
      Error::InvalidSaltSize
    ));
    assert!(RandomSaltProvider::with_salt_size(16).is_ok());
  }

  #[test]
  fn salts_are_unique() {
    let provider = RandomSaltProvider::new();
    let first = provider.salt();
    let second = provider.salt();
    assert_ne!(first, second);
  }
}
