// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde_json::Value;

use crate::ClaimPath;
use crate::ClaimPathSegment;
use crate::Disclosure;
use crate::Error;
use crate::HashAlgorithm;
use crate::Hasher;
use crate::JsonObject;
use crate::Result;
#[cfg(feature = "sha")]
use crate::Sha256Hasher;
#[cfg(feature = "sha")]
use crate::Sha384Hasher;
#[cfg(feature = "sha")]
use crate::Sha512Hasher;
use crate::ARRAY_DIGEST_KEY;
use crate::DEFAULT_ALG_NAME;
use crate::DIGESTS_KEY;
use crate::SD_ALG;

/// The disclosures required to reveal each claim path.
///
/// For any recorded path the list contains the disclosures of all its
/// disclosed ancestors followed by its own triggering disclosure, in
/// outermost-first order. Claims that are always present carry only their
/// ancestors' disclosures. Iteration order is document order.
pub type DisclosuresPerPath = IndexMap<ClaimPath, Vec<Disclosure>>;

/// The result of recreating a claim set from an SD-JWT payload.
#[derive(Debug, Clone)]
pub struct DecodedSdObject {
  /// The recreated claim set, free of `_sd`, `_sd_alg` and `...` markers.
  pub object: JsonObject,
  /// Which disclosures reveal which claim path.
  pub disclosures_per_path: DisclosuresPerPath,
}

/// Substitutes digests in an SD-JWT payload by their corresponding plain
/// text values provided by disclosures.
pub struct SdObjectDecoder {
  hashers: BTreeMap<String, Box<dyn Hasher>>,
}

impl SdObjectDecoder {
  /// Creates a new [`SdObjectDecoder`] without any hashers.
  pub fn new() -> Self {
    Self {
      hashers: BTreeMap::new(),
    }
  }

  /// Creates a new [`SdObjectDecoder`] with a hasher registered for every
  /// algorithm available under the enabled crate features.
  pub fn new_with_default_hashers() -> Self {
    #[allow(unused_mut)]
    let mut decoder = Self::new();
    #[cfg(feature = "sha")]
    {
      decoder.add_hasher(Box::new(Sha256Hasher::new()));
      decoder.add_hasher(Box::new(Sha384Hasher::new()));
      decoder.add_hasher(Box::new(Sha512Hasher::new()));
    }
    #[cfg(feature = "sha3")]
    {
      decoder.add_hasher(Box::new(crate::Sha3_256Hasher::new()));
      decoder.add_hasher(Box::new(crate::Sha3_384Hasher::new()));
      decoder.add_hasher(Box::new(crate::Sha3_512Hasher::new()));
    }
    decoder
  }

  /// Adds a hasher.
  ///
  /// If a hasher for the same algorithm [`Hasher::alg_name`] already exists, it will be replaced and
  /// the existing hasher will be returned, otherwise `None`.
  pub fn add_hasher(&mut self, hasher: Box<dyn Hasher>) -> Option<Box<dyn Hasher>> {
    let alg_name = hasher.as_ref().alg_name().to_string();
    self.hashers.insert(alg_name, hasher)
  }

  /// Removes a hasher.
  ///
  /// If the hasher for that algorithm exists, it will be removed and returned, otherwise `None`.
  pub fn remove_hasher(&mut self, hash_alg: String) -> Option<Box<dyn Hasher>> {
    self.hashers.remove(&hash_alg)
  }

  /// Selects the hasher mandated by the `_sd_alg` claim of `object`,
  /// defaulting to `sha-256` when the claim is absent.
  ///
  /// ## Error
  /// [`Error::UnsupportedAlgorithm`] if the alias is outside the closed set,
  /// [`Error::MissingHasher`] if no hasher is registered for it.
  pub fn determine_hasher(&self, object: &JsonObject) -> Result<&dyn Hasher> {
    let alg: &str = if let Some(alg) = object.get(SD_ALG) {
      alg
        .as_str()
        .ok_or_else(|| Error::MalformedPayload(format!("the value of `{SD_ALG}` is not a string")))?
    } else {
      DEFAULT_ALG_NAME
    };
    let alg = HashAlgorithm::from_alias(alg)?;
    self
      .hashers
      .get(alg.alias())
      .map(AsRef::as_ref)
      .ok_or_else(|| Error::MissingHasher(alg.alias().to_string()))
  }

  /// Decodes an SD-JWT payload by substituting the digests with their
  /// corresponding plain text values provided by `disclosures`.
  ///
  /// The hasher is determined by the `_sd_alg` property and used for all
  /// digests at every nesting level; `_sd_alg` is removed from the output.
  /// Claims like `exp` or `iat` are not validated in the process of decoding.
  pub fn decode(&self, object: &JsonObject, disclosures: &[Disclosure]) -> Result<DecodedSdObject> {
    let hasher = self.determine_hasher(object)?;
    Self::decode_with_hasher(hasher, object, disclosures)
  }

  /// [`decode`](Self::decode) with an explicitly chosen hasher, bypassing the
  /// registry. The hasher must match the payload's `_sd_alg`.
  pub fn decode_with_hasher(
    hasher: &dyn Hasher,
    object: &JsonObject,
    disclosures: &[Disclosure],
  ) -> Result<DecodedSdObject> {
    // Create a map of (disclosure digest) → (disclosure).
    let mut index: BTreeMap<String, Disclosure> = BTreeMap::new();
    for disclosure in disclosures {
      let digest = hasher.encoded_digest(disclosure.as_str());
      if index.insert(digest.clone(), disclosure.clone()).is_some() {
        return Err(Error::DuplicateDisclosure(digest));
      }
    }

    // `processed_digests` are kept track of so that a digest appearing more
    // than once, which renders the SD-JWT invalid, is detected.
    let mut processed_digests: Vec<String> = vec![];
    let mut disclosures_per_path = DisclosuresPerPath::new();

    let mut decoded = decode_object(
      object,
      &index,
      &mut processed_digests,
      &ClaimPath::root(),
      &[],
      &mut disclosures_per_path,
    )?;

    if processed_digests.len() != disclosures.len() {
      return Err(Error::UnusedDisclosure(
        disclosures.len().saturating_sub(processed_digests.len()),
      ));
    }

    // Remove `_sd_alg` in case it exists.
    if decoded.remove(SD_ALG).is_some() {
      disclosures_per_path.shift_remove(&ClaimPath::root().join(ClaimPathSegment::Name(SD_ALG.to_owned())));
    }

    Ok(DecodedSdObject {
      object: decoded,
      disclosures_per_path,
    })
  }
}

impl Default for SdObjectDecoder {
  fn default() -> Self {
    Self::new_with_default_hashers()
  }
}

fn decode_object(
  object: &JsonObject,
  index: &BTreeMap<String, Disclosure>,
  processed_digests: &mut Vec<String>,
  path: &ClaimPath,
  inherited: &[Disclosure],
  disclosures_per_path: &mut DisclosuresPerPath,
) -> Result<JsonObject> {
  let mut output: JsonObject = object.clone();

  // Splice every matched digest of the `_sd` array into the object.
  let mut revealed: Vec<(String, Disclosure)> = vec![];
  if let Some(sd_value) = object.get(DIGESTS_KEY) {
    let sd_array = sd_value
      .as_array()
      .ok_or_else(|| Error::MalformedPayload(format!("`{DIGESTS_KEY}` is not an array")))?;
    for digest in sd_array {
      let digest = digest
        .as_str()
        .ok_or_else(|| Error::MalformedPayload(format!("`{DIGESTS_KEY}` contains a non-string entry")))?;

      // Reject if any digest was found more than once.
      if processed_digests.iter().any(|processed| processed == digest) {
        return Err(Error::DuplicateDigest(digest.to_owned()));
      }

      // Check if a disclosure of this digest is available and insert its
      // claim name and value in the object. Unmatched digests are decoys or
      // withheld claims and are silently dropped.
      if let Some(disclosure) = index.get(digest) {
        let claim_name = disclosure.claim_name.clone().ok_or_else(|| {
          Error::MalformedPayload(format!(
            "array element disclosure referenced from the `{DIGESTS_KEY}` array of an object"
          ))
        })?;
        if output.contains_key(&claim_name) {
          return Err(Error::ClaimCollision(claim_name));
        }
        processed_digests.push(digest.to_owned());
        output.insert(claim_name.clone(), disclosure.claim_value.clone());
        revealed.push((claim_name, disclosure.clone()));
      }
    }
    output.remove(DIGESTS_KEY);
  }

  // Record each claim's path and recurse, so newly revealed values are
  // themselves subject to resolution.
  let mut result = JsonObject::new();
  for (key, value) in output.iter() {
    let child_path = path.join(ClaimPathSegment::Name(key.clone()));
    let mut chain: Vec<Disclosure> = inherited.to_vec();
    if let Some((_, disclosure)) = revealed.iter().find(|(name, _)| name == key) {
      chain.push(disclosure.clone());
    }
    disclosures_per_path.insert(child_path.clone(), chain.clone());
    let decoded_value = match value {
      Value::Object(sub_object) => Value::Object(decode_object(
        sub_object,
        index,
        processed_digests,
        &child_path,
        &chain,
        disclosures_per_path,
      )?),
      Value::Array(sub_array) => Value::Array(decode_array(
        sub_array,
        index,
        processed_digests,
        &child_path,
        &chain,
        disclosures_per_path,
      )?),
      other => other.clone(),
    };
    result.insert(key.clone(), decoded_value);
  }
  Ok(result)
}

fn decode_array(
  array: &[Value],
  index: &BTreeMap<String, Disclosure>,
  processed_digests: &mut Vec<String>,
  path: &ClaimPath,
  inherited: &[Disclosure],
  disclosures_per_path: &mut DisclosuresPerPath,
) -> Result<Vec<Value>> {
  // Resolve `{"...": <digest>}` markers; unmatched markers are dropped.
  let mut entries: Vec<(Value, Option<Disclosure>)> = vec![];
  for value in array {
    if let Some(marker) = value.as_object().and_then(|object| object.get(ARRAY_DIGEST_KEY)) {
      if value.as_object().map(JsonObject::len) != Some(1) {
        return Err(Error::InvalidArrayDisclosureObject);
      }
      let digest = marker
        .as_str()
        .ok_or_else(|| Error::MalformedPayload(format!("the value of `{ARRAY_DIGEST_KEY}` is not a string")))?;

      if processed_digests.iter().any(|processed| processed == digest) {
        return Err(Error::DuplicateDigest(digest.to_owned()));
      }

      if let Some(disclosure) = index.get(digest) {
        if disclosure.claim_name.is_some() {
          return Err(Error::MalformedDisclosure(
            "object property disclosure referenced from an array element".to_string(),
          ));
        }
        processed_digests.push(digest.to_owned());
        entries.push((disclosure.claim_value.clone(), Some(disclosure.clone())));
      }
      continue;
    }
    entries.push((value.clone(), None));
  }

  // Record paths against post-substitution indices and recurse.
  let mut output: Vec<Value> = Vec::with_capacity(entries.len());
  for (position, (value, disclosure)) in entries.into_iter().enumerate() {
    let child_path = path.join(ClaimPathSegment::Index(position));
    let mut chain: Vec<Disclosure> = inherited.to_vec();
    if let Some(disclosure) = disclosure {
      chain.push(disclosure);
    }
    disclosures_per_path.insert(child_path.clone(), chain.clone());
    let decoded_value = match value {
      Value::Object(sub_object) => Value::Object(decode_object(
        &sub_object,
        index,
        processed_digests,
        &child_path,
        &chain,
        disclosures_per_path,
      )?),
      Value::Array(sub_array) => Value::Array(decode_array(
        &sub_array,
        index,
        processed_digests,
        &child_path,
        &chain,
        disclosures_per_path,
      )?),
      other => other,
    };
    output.push(decoded_value);
  }
  Ok(output)
}

#[cfg(all(test, feature = "sha"))]
mod test {
  use super::SdObjectDecoder;
  use crate::ArrayElement;
  use crate::ClaimPath;
  use crate::Disclosure;
  use crate::Error;
  use crate::Hasher;
  use crate::SdElements;
  use crate::SdObjectEncoder;
  use crate::Sha256Hasher;
  use serde_json::json;
  use serde_json::Value;

  #[test]
  fn round_trip() {
    let elements = SdElements::new()
      .plain(json!({ "iss": "https://i" }))
      .unwrap()
      .flat(json!({ "name": "Alice", "age": 30 }))
      .unwrap()
      .structured_with_flat("address", json!({ "city": "Athens" }))
      .unwrap()
      .array(
        "nationalities",
        [ArrayElement::Plain(json!("US")), ArrayElement::Disclosed(json!("DE"))],
      )
      .unwrap();
    let disclosed = SdObjectEncoder::new().disclose(&elements).unwrap();

    let decoder = SdObjectDecoder::new_with_default_hashers();
    let decoded = decoder.decode(&disclosed.claim_set, &disclosed.disclosures).unwrap();
    assert_eq!(
      Value::Object(decoded.object),
      json!({
        "iss": "https://i",
        "nationalities": ["US", "DE"],
        "name": "Alice",
        "age": 30,
        "address": { "city": "Athens" },
      })
    );
  }

  #[test]
  fn decoys_never_become_claims() {
    let elements = SdElements::new().flat(json!({ "age": 30 })).unwrap();
    let disclosed = SdObjectEncoder::new().with_decoys(4).disclose(&elements).unwrap();

    let decoder = SdObjectDecoder::new_with_default_hashers();
    let decoded = decoder.decode(&disclosed.claim_set, &disclosed.disclosures).unwrap();
    assert_eq!(Value::Object(decoded.object), json!({ "age": 30 }));
  }

  #[test]
  fn claim_collision() {
    let hasher = Sha256Hasher::new();
    let disclosure = Disclosure::property("salt".to_owned(), "x".to_owned(), json!(2)).unwrap();
    let payload = json!({
      "x": 1,
      "_sd": [hasher.encoded_digest(disclosure.as_str())],
    });
    let decoder = SdObjectDecoder::new_with_default_hashers();
    let result = decoder.decode(payload.as_object().unwrap(), &[disclosure]);
    assert!(matches!(result.unwrap_err(), Error::ClaimCollision(name) if name == "x"));
  }

  #[test]
  fn duplicate_digest() {
    let hasher = Sha256Hasher::new();
    let disclosure = Disclosure::property("salt".to_owned(), "age".to_owned(), json!(30)).unwrap();
    let digest = hasher.encoded_digest(disclosure.as_str());
    let payload = json!({ "_sd": [digest.clone(), digest] });
    let decoder = SdObjectDecoder::new_with_default_hashers();
    let result = decoder.decode(payload.as_object().unwrap(), &[disclosure]);
    assert!(matches!(result.unwrap_err(), Error::DuplicateDigest(_)));
  }

  #[test]
  fn duplicate_disclosure() {
    let disclosure = Disclosure::property("salt".to_owned(), "age".to_owned(), json!(30)).unwrap();
    let payload = json!({ "_sd": [] });
    let decoder = SdObjectDecoder::new_with_default_hashers();
    let result = decoder.decode(payload.as_object().unwrap(), &[disclosure.clone(), disclosure]);
    assert!(matches!(result.unwrap_err(), Error::DuplicateDisclosure(_)));
  }

  #[test]
  fn unused_disclosure() {
    let hasher = Sha256Hasher::new();
    let used = Disclosure::property("salt".to_owned(), "age".to_owned(), json!(30)).unwrap();
    let unused = Disclosure::property("salt".to_owned(), "name".to_owned(), json!("Alice")).unwrap();
    let payload = json!({ "_sd": [hasher.encoded_digest(used.as_str())] });
    let decoder = SdObjectDecoder::new_with_default_hashers();
    let result = decoder.decode(payload.as_object().unwrap(), &[used, unused]);
    assert!(matches!(result.unwrap_err(), Error::UnusedDisclosure(1)));
  }

  #[test]
  fn tampered_disclosure_is_unused() {
    let elements = SdElements::new().flat(json!({ "age": 30 })).unwrap();
    let disclosed = SdObjectEncoder::new().disclose(&elements).unwrap();

    let tampered = {
      let encoded = disclosed.disclosures[0].to_string();
      let mut bytes = encoded.into_bytes();
      bytes[0] = if bytes[0] == b'W' { b'X' } else { b'W' };
      String::from_utf8(bytes).unwrap()
    };
    // The tampered string either fails to decode or digests differently.
    let Ok(parsed) = Disclosure::parse(&tampered) else {
      return;
    };
    let decoder = SdObjectDecoder::new_with_default_hashers();
    let result = decoder.decode(&disclosed.claim_set, &[parsed]);
    assert!(matches!(result.unwrap_err(), Error::UnusedDisclosure(1)));
  }

  #[test]
  fn malformed_sd_array() {
    let payload = json!({ "_sd": "not-an-array" });
    let decoder = SdObjectDecoder::new_with_default_hashers();
    let result = decoder.decode(payload.as_object().unwrap(), &[]);
    assert!(matches!(result.unwrap_err(), Error::MalformedPayload(_)));

    let payload = json!({ "_sd": [42] });
    let result = decoder.decode(payload.as_object().unwrap(), &[]);
    assert!(matches!(result.unwrap_err(), Error::MalformedPayload(_)));
  }

  #[test]
  fn unsupported_and_missing_algorithms() {
    let decoder = SdObjectDecoder::new_with_default_hashers();
    let payload = json!({ "_sd_alg": "md5" });
    assert!(matches!(
      decoder.decode(payload.as_object().unwrap(), &[]).unwrap_err(),
      Error::UnsupportedAlgorithm(_)
    ));

    // Inside the closed set, but no backend registered.
    let empty = SdObjectDecoder::new();
    let payload = json!({ "_sd_alg": "sha3-256" });
    assert!(matches!(
      empty.decode(payload.as_object().unwrap(), &[]).unwrap_err(),
      Error::MissingHasher(_)
    ));
  }

  #[test]
  fn sd_alg_removed() {
    let payload = json!({ "id": "did:value", "_sd_alg": "sha-256" });
    let decoder = SdObjectDecoder::new_with_default_hashers();
    let decoded = decoder.decode(payload.as_object().unwrap(), &[]).unwrap();
    assert!(decoded.object.get("_sd_alg").is_none());
    assert!(decoded
      .disclosures_per_path
      .contains_key(&"/id".parse::<ClaimPath>().unwrap()));
  }

  #[test]
  fn disclosure_chains_are_outermost_first() {
    let hasher = Sha256Hasher::new();
    // An array claim that is itself disclosed, with one disclosed element.
    let element = Disclosure::array_element("s1".to_owned(), json!("pipp")).unwrap();
    let evidence = Disclosure::property(
      "s2".to_owned(),
      "evidence".to_owned(),
      json!([{ "...": hasher.encoded_digest(element.as_str()) }]),
    )
    .unwrap();
    let payload = json!({
      "_sd": [hasher.encoded_digest(evidence.as_str())],
      "_sd_alg": "sha-256",
    });

    let decoder = SdObjectDecoder::new_with_default_hashers();
    let decoded = decoder
      .decode(payload.as_object().unwrap(), &[element.clone(), evidence.clone()])
      .unwrap();

    assert_eq!(Value::Object(decoded.object), json!({ "evidence": ["pipp"] }));
    let chain = decoded
      .disclosures_per_path
      .get(&"/evidence/0".parse::<ClaimPath>().unwrap())
      .unwrap();
    assert_eq!(chain.as_slice(), &[evidence.clone(), element]);
    let parent_chain = decoded
      .disclosures_per_path
      .get(&"/evidence".parse::<ClaimPath>().unwrap())
      .unwrap();
    assert_eq!(parent_chain.as_slice(), &[evidence]);
  }
}
