// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use serde_json::json;
use serde_json::Value;

use crate::decoy_digests;
use crate::ArrayElement;
use crate::Disclosure;
use crate::Error;
use crate::Hasher;
use crate::JsonObject;
use crate::RandomSaltProvider;
use crate::Result;
use crate::SaltProvider;
use crate::SdElements;
use crate::SdJwtElement;
#[cfg(feature = "sha")]
use crate::Sha256Hasher;

pub(crate) const DIGESTS_KEY: &str = "_sd";
pub(crate) const ARRAY_DIGEST_KEY: &str = "...";
pub(crate) const SD_ALG: &str = "_sd_alg";

/// The claim set and disclosures produced by disclosing an element set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisclosedClaims {
  /// The payload object carrying `_sd` arrays, `...` markers and, when any
  /// disclosure exists, the root `_sd_alg` claim.
  pub claim_set: JsonObject,
  /// The disclosures backing the digests of `claim_set`.
  pub disclosures: Vec<Disclosure>,
}

/// Transforms an element set into an SD-JWT claim set by substituting
/// selected values with their corresponding disclosure digests.
#[cfg(not(feature = "sha"))]
#[derive(Debug, Clone)]
pub struct SdObjectEncoder<H, S = RandomSaltProvider> {
  /// The hash function used to create digests.
  hasher: H,
  /// Source of one-time salts, one per disclosure.
  salt_provider: S,
  /// Number of decoy digests added per object level.
  num_decoys: usize,
}

/// Transforms an element set into an SD-JWT claim set by substituting
/// selected values with their corresponding disclosure digests.
#[cfg(feature = "sha")]
#[derive(Debug, Clone)]
pub struct SdObjectEncoder<H = Sha256Hasher, S = RandomSaltProvider> {
  /// The hash function used to create digests.
  hasher: H,
  /// Source of one-time salts, one per disclosure.
  salt_provider: S,
  /// Number of decoy digests added per object level.
  num_decoys: usize,
}

#[cfg(feature = "sha")]
impl SdObjectEncoder {
  /// Creates a new [`SdObjectEncoder`] with the `sha-256` hash function and
  /// random salts.
  pub fn new() -> SdObjectEncoder<Sha256Hasher> {
    Self::with_hasher(Sha256Hasher::new())
  }
}

#[cfg(feature = "sha")]
impl Default for SdObjectEncoder {
  fn default() -> Self {
    Self::new()
  }
}

impl<H: Hasher> SdObjectEncoder<H, RandomSaltProvider> {
  /// Creates a new [`SdObjectEncoder`] with a custom hash function and random
  /// salts.
  pub fn with_hasher(hasher: H) -> Self {
    Self {
      hasher,
      salt_provider: RandomSaltProvider::new(),
      num_decoys: 0,
    }
  }
}

impl<H: Hasher, S: SaltProvider> SdObjectEncoder<H, S> {
  /// Creates a new [`SdObjectEncoder`] with custom hash function and salt
  /// provider.
  pub fn with_hasher_and_salt_provider(hasher: H, salt_provider: S) -> Self {
    Self {
      hasher,
      salt_provider,
      num_decoys: 0,
    }
  }

  /// Sets the number of decoy digests mixed into each `_sd` array.
  ///
  /// Decoys make the total digest count independent of the number of claims
  /// actually concealed at a level.
  pub fn with_decoys(mut self, number_of_decoys: usize) -> Self {
    self.num_decoys = number_of_decoys;
    self
  }

  /// Returns a reference to the used hasher.
  pub fn hasher(&self) -> &H {
    &self.hasher
  }

  /// Discloses an element set, producing the claim set and its disclosures.
  ///
  /// Digests of each level are written to the level's `_sd` array in
  /// ascending lexicographic order, so the payload never leaks how many of
  /// them are decoys or in which order claims were declared. `_sd_alg` is
  /// injected at the root if and only if at least one disclosure exists.
  ///
  /// ## Error
  /// [`Error::KeyCollision`] if two elements produce the same key at one
  /// level, [`Error::InvalidClaimName`]/[`Error::InvalidClaimValue`] for
  /// claims that cannot be disclosed.
  pub fn disclose(&self, elements: &SdElements) -> Result<DisclosedClaims> {
    let (mut claim_set, disclosures) = self.disclose_level(elements.elements())?;
    if !disclosures.is_empty() {
      claim_set.insert(SD_ALG.to_string(), Value::String(self.hasher.alg_name().to_string()));
    }
    Ok(DisclosedClaims { claim_set, disclosures })
  }

  fn disclose_level(&self, elements: &[SdJwtElement]) -> Result<(JsonObject, Vec<Disclosure>)> {
    let mut object = JsonObject::new();
    let mut disclosures: Vec<Disclosure> = vec![];
    let mut digests: Vec<String> = vec![];

    for element in elements {
      match element {
        SdJwtElement::Plain(claims) => {
          for (name, value) in claims.iter() {
            Self::insert_claim(&mut object, name.clone(), value.clone())?;
          }
        }
        SdJwtElement::FlatDisclosed(claims) => {
          for (name, value) in claims.iter() {
            let disclosure = Disclosure::property(self.salt_provider.salt(), name.clone(), value.clone())?;
            digests.push(self.hasher.encoded_digest(disclosure.as_str()));
            disclosures.push(disclosure);
          }
        }
        SdJwtElement::StructuredDisclosed(name, children) => {
          let (sub_object, sub_disclosures) = self.disclose_level(children.elements())?;
          Self::insert_claim(&mut object, name.clone(), Value::Object(sub_object))?;
          disclosures.extend(sub_disclosures);
        }
        SdJwtElement::DisclosedArray(name, entries) => {
          let mut array: Vec<Value> = Vec::with_capacity(entries.len());
          for entry in entries {
            match entry {
              ArrayElement::Plain(value) => array.push(value.clone()),
              ArrayElement::Disclosed(value) => {
                let disclosure = Disclosure::array_element(self.salt_provider.salt(), value.clone())?;
                let digest = self.hasher.encoded_digest(disclosure.as_str());
                array.push(json!({ ARRAY_DIGEST_KEY: digest }));
                disclosures.push(disclosure);
              }
            }
          }
          Self::insert_claim(&mut object, name.clone(), Value::Array(array))?;
        }
      }
    }

    digests.extend(decoy_digests(&self.hasher, self.num_decoys));
    if !digests.is_empty() {
      digests.sort_unstable();
      object.insert(
        DIGESTS_KEY.to_owned(),
        Value::Array(digests.into_iter().map(Value::String).collect()),
      );
    }

    Ok((object, disclosures))
  }

  fn insert_claim(object: &mut JsonObject, name: String, value: Value) -> Result<()> {
    if object.contains_key(&name) {
      return Err(Error::KeyCollision(name));
    }
    object.insert(name, value);
    Ok(())
  }
}

#[cfg(all(test, feature = "sha"))]
mod test {
  use super::SdObjectEncoder;
  use crate::ArrayElement;
  use crate::SaltProvider;
  use crate::SdElements;
  use crate::Sha256Hasher;
  use serde_json::json;
  use serde_json::Value;
  use std::sync::Mutex;

  /// Deterministic salt source: `salt-1`, `salt-2`, ...
  struct SequenceSalts(Mutex<usize>);

  impl SequenceSalts {
    fn new() -> Self {
      Self(Mutex::new(0))
    }
  }

  impl SaltProvider for SequenceSalts {
    fn salt(&self) -> String {
      let mut count = self.0.lock().unwrap();
      *count += 1;
      format!("salt-{count}")
    }
  }

  fn flat_elements() -> SdElements {
    SdElements::new()
      .plain(json!({ "iss": "https://i" }))
      .unwrap()
      .flat(json!({ "name": "Alice", "age": 30 }))
      .unwrap()
  }

  #[test]
  fn flat_only() {
    let encoder = SdObjectEncoder::with_hasher_and_salt_provider(Sha256Hasher::new(), SequenceSalts::new());
    let disclosed = encoder.disclose(&flat_elements()).unwrap();

    assert_eq!(disclosed.claim_set.get("iss").unwrap(), "https://i");
    assert_eq!(disclosed.claim_set.get("_sd_alg").unwrap(), "sha-256");
    let sd = disclosed.claim_set.get("_sd").unwrap().as_array().unwrap();
    assert_eq!(sd.len(), 2);
    assert_eq!(disclosed.disclosures.len(), 2);
  }

  #[test]
  fn structured_keeps_root_clean() {
    let elements = SdElements::new()
      .structured(
        "address",
        SdElements::new()
          .plain(json!({ "country": "GR" }))
          .unwrap()
          .flat(json!({ "city": "Athens" }))
          .unwrap(),
      )
      .unwrap();
    let encoder = SdObjectEncoder::new();
    let disclosed = encoder.disclose(&elements).unwrap();

    assert!(disclosed.claim_set.get("_sd").is_none());
    assert_eq!(disclosed.claim_set.get("_sd_alg").unwrap(), "sha-256");
    let address = disclosed.claim_set.get("address").unwrap().as_object().unwrap();
    assert_eq!(address.get("country").unwrap(), "GR");
    assert_eq!(address.get("_sd").unwrap().as_array().unwrap().len(), 1);
    assert_eq!(disclosed.disclosures.len(), 1);
  }

  #[test]
  fn decoys_extend_digest_array() {
    let encoder = SdObjectEncoder::new().with_decoys(3);
    let disclosed = encoder.disclose(&flat_elements()).unwrap();

    assert_eq!(disclosed.claim_set.get("_sd").unwrap().as_array().unwrap().len(), 5);
    assert_eq!(disclosed.disclosures.len(), 2);
  }

  #[test]
  fn digest_arrays_are_sorted() {
    let elements = SdElements::new()
      .flat(json!({ "a": 1, "b": 2, "c": 3, "d": 4, "e": 5 }))
      .unwrap();
    let encoder = SdObjectEncoder::new().with_decoys(5);
    let disclosed = encoder.disclose(&elements).unwrap();

    let sd: Vec<&str> = disclosed
      .claim_set
      .get("_sd")
      .unwrap()
      .as_array()
      .unwrap()
      .iter()
      .map(|digest| digest.as_str().unwrap())
      .collect();
    let mut sorted = sd.clone();
    sorted.sort_unstable();
    assert_eq!(sd, sorted);
  }

  #[test]
  fn sd_alg_absent_without_disclosures() {
    let elements = SdElements::new().plain(json!({ "iss": "https://i" })).unwrap();
    let encoder = SdObjectEncoder::new().with_decoys(2);
    let disclosed = encoder.disclose(&elements).unwrap();

    assert!(disclosed.claim_set.get("_sd_alg").is_none());
    assert!(disclosed.disclosures.is_empty());
    // decoys still pad the level
    assert_eq!(disclosed.claim_set.get("_sd").unwrap().as_array().unwrap().len(), 2);
  }

  #[test]
  fn array_elements_become_markers() {
    let elements = SdElements::new()
      .array(
        "nationalities",
        [ArrayElement::Plain(json!("US")), ArrayElement::Disclosed(json!("DE"))],
      )
      .unwrap();
    let encoder = SdObjectEncoder::new();
    let disclosed = encoder.disclose(&elements).unwrap();

    let array = disclosed.claim_set.get("nationalities").unwrap().as_array().unwrap();
    assert_eq!(array[0], json!("US"));
    let marker = array[1].as_object().unwrap();
    assert!(marker.get("...").unwrap().is_string());
    assert_eq!(marker.len(), 1);
    assert_eq!(disclosed.disclosures.len(), 1);
  }

  #[test]
  fn deterministic_under_fixed_salts() {
    let disclose = || {
      let encoder = SdObjectEncoder::with_hasher_and_salt_provider(Sha256Hasher::new(), SequenceSalts::new());
      encoder.disclose(&flat_elements()).unwrap()
    };
    let first = disclose();
    let second = disclose();
    assert_eq!(Value::Object(first.claim_set), Value::Object(second.claim_set));
    let strings = |disclosures: &[crate::Disclosure]| {
      disclosures.iter().map(ToString::to_string).collect::<Vec<String>>()
    };
    assert_eq!(strings(&first.disclosures), strings(&second.disclosures));
  }
}
