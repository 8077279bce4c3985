// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use serde::Serialize;
use serde_json::Value;

use crate::Error;
use crate::JsonObject;
use crate::Result;
use crate::ARRAY_DIGEST_KEY;
use crate::DIGESTS_KEY;
use crate::SD_ALG;

/// One element of the declarative description an issuer writes.
///
/// An SD-JWT payload is composed from a set of elements per object level;
/// the variant decides whether the claims it carries end up verbatim in the
/// payload or behind disclosure digests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdJwtElement {
  /// Claims copied verbatim into the payload, never disclosable.
  Plain(JsonObject),
  /// Claims turned into one disclosure each; their digests are placed in the
  /// enclosing `_sd` array.
  FlatDisclosed(JsonObject),
  /// A named object whose contents are the recursive disclosure of its
  /// children. The name itself is not selectively disclosable.
  StructuredDisclosed(String, SdElements),
  /// A named array whose elements are individually plain or disclosed.
  DisclosedArray(String, Vec<ArrayElement>),
}

/// An element of a [`SdJwtElement::DisclosedArray`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArrayElement {
  /// The value appears verbatim at its position.
  Plain(Value),
  /// The value is replaced by a `{"...": <digest>}` marker and carried in a
  /// disclosure.
  Disclosed(Value),
}

/// The element set describing one object level of a credential.
///
/// Duplicate and collision rules are enforced while building:
///
/// * claim names across [`plain`](Self::plain) and [`flat`](Self::flat) calls
///   must be disjoint,
/// * [`structured`](Self::structured) and [`array`](Self::array) names must
///   not clash with any other key of the level,
/// * the reserved keys `_sd`, `_sd_alg` and `...` are rejected outright.
///
/// ## Example
/// ```rust
/// use sd_jwt_core::SdElements;
/// use serde_json::json;
///
/// let elements = SdElements::new()
///   .plain(json!({ "iss": "https://issuer.example.com" }))?
///   .flat(json!({ "given_name": "Alice", "age": 30 }))?
///   .structured(
///     "address",
///     SdElements::new()
///       .plain(json!({ "country": "DE" }))?
///       .flat(json!({ "locality": "Maxstadt" }))?,
///   )?;
/// # Ok::<(), sd_jwt_core::Error>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SdElements {
  elements: Vec<SdJwtElement>,
}

/// How a key is produced at a level; decides which collision error applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyKind {
  Claim,
  Container,
}

impl SdElements {
  /// Creates an empty element set.
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds claims that appear verbatim in the payload.
  ///
  /// ## Error
  /// [`Error::DataTypeMismatch`] if `claims` does not serialize to a JSON object,
  /// [`Error::DuplicateClaim`]/[`Error::KeyCollision`] on a clash with an
  /// existing key, [`Error::InvalidClaimName`] on a reserved key.
  pub fn plain<T: Serialize>(mut self, claims: T) -> Result<Self> {
    let claims = to_object(claims)?;
    for (name, value) in claims.iter() {
      self.check_new_key(name, KeyKind::Claim)?;
      check_no_reserved_keys(value)?;
    }
    self.elements.push(SdJwtElement::Plain(claims));
    Ok(self)
  }

  /// Adds claims that each become their own disclosure, leaving only digests
  /// in the payload.
  ///
  /// Claim values are validated when the disclosures are minted, where a
  /// `null` or a nested `_sd` key fails the disclosure.
  ///
  /// ## Error
  /// [`Error::DataTypeMismatch`] if `claims` does not serialize to a JSON object,
  /// [`Error::DuplicateClaim`]/[`Error::KeyCollision`] on a clash with an
  /// existing key, [`Error::InvalidClaimName`] on a reserved key.
  pub fn flat<T: Serialize>(mut self, claims: T) -> Result<Self> {
    let claims = to_object(claims)?;
    for name in claims.keys() {
      self.check_new_key(name, KeyKind::Claim)?;
    }
    self.elements.push(SdJwtElement::FlatDisclosed(claims));
    Ok(self)
  }

  /// Adds a named object whose contents are the recursive disclosure of
  /// `children`. The name itself stays visible in the payload.
  ///
  /// ## Error
  /// [`Error::KeyCollision`] if `name` clashes with any existing key,
  /// [`Error::InvalidClaimName`] if `name` is reserved.
  pub fn structured(mut self, name: impl Into<String>, children: SdElements) -> Result<Self> {
    let name = name.into();
    self.check_new_key(&name, KeyKind::Container)?;
    self.elements.push(SdJwtElement::StructuredDisclosed(name, children));
    Ok(self)
  }

  /// Shorthand for a [`structured`](Self::structured) object containing only
  /// flat disclosed claims.
  pub fn structured_with_flat<T: Serialize>(self, name: impl Into<String>, claims: T) -> Result<Self> {
    self.structured(name, SdElements::new().flat(claims)?)
  }

  /// Adds a named array with element-level disclosure.
  ///
  /// ## Error
  /// [`Error::KeyCollision`] if `name` clashes with any existing key,
  /// [`Error::InvalidClaimName`] if `name` is reserved.
  pub fn array(mut self, name: impl Into<String>, entries: impl IntoIterator<Item = ArrayElement>) -> Result<Self> {
    let name = name.into();
    self.check_new_key(&name, KeyKind::Container)?;
    let entries: Vec<ArrayElement> = entries.into_iter().collect();
    for entry in &entries {
      if let ArrayElement::Plain(value) = entry {
        check_no_reserved_keys(value)?;
      }
    }
    self.elements.push(SdJwtElement::DisclosedArray(name, entries));
    Ok(self)
  }

  /// Returns the elements of this set.
  pub fn elements(&self) -> &[SdJwtElement] {
    &self.elements
  }

  /// Returns whether this set contains no elements.
  pub fn is_empty(&self) -> bool {
    self.elements.is_empty()
  }

  fn check_new_key(&self, name: &str, kind: KeyKind) -> Result<()> {
    if name == DIGESTS_KEY || name == SD_ALG || name == ARRAY_DIGEST_KEY {
      return Err(Error::InvalidClaimName(name.to_owned()));
    }
    for (existing, existing_kind) in self.level_keys() {
      if existing == name {
        return if kind == KeyKind::Claim && existing_kind == KeyKind::Claim {
          Err(Error::DuplicateClaim(name.to_owned()))
        } else {
          Err(Error::KeyCollision(name.to_owned()))
        };
      }
    }
    Ok(())
  }

  fn level_keys(&self) -> impl Iterator<Item = (&str, KeyKind)> {
    self.elements.iter().flat_map(|element| {
      let keys: Box<dyn Iterator<Item = (&str, KeyKind)> + '_> = match element {
        SdJwtElement::Plain(claims) | SdJwtElement::FlatDisclosed(claims) => {
          Box::new(claims.keys().map(|key| (key.as_str(), KeyKind::Claim)))
        }
        SdJwtElement::StructuredDisclosed(name, _) | SdJwtElement::DisclosedArray(name, _) => {
          Box::new(std::iter::once((name.as_str(), KeyKind::Container)))
        }
      };
      keys
    })
  }
}

fn to_object<T: Serialize>(claims: T) -> Result<JsonObject> {
  let value = serde_json::to_value(claims).map_err(|e| Error::Deserialization(e.to_string()))?;
  match value {
    Value::Object(object) => Ok(object),
    _ => Err(Error::DataTypeMismatch("expected object".to_owned())),
  }
}

fn check_no_reserved_keys(value: &Value) -> Result<()> {
  match value {
    Value::Object(object) => {
      if object.contains_key(DIGESTS_KEY) {
        return Err(Error::InvalidClaimName(DIGESTS_KEY.to_owned()));
      }
      object.values().try_for_each(check_no_reserved_keys)
    }
    Value::Array(array) => array.iter().try_for_each(check_no_reserved_keys),
    _ => Ok(()),
  }
}

#[cfg(test)]
mod test {
  use super::ArrayElement;
  use super::SdElements;
  use crate::Error;
  use serde_json::json;

  #[test]
  fn duplicate_claim_across_plain_and_flat() {
    let result = SdElements::new()
      .plain(json!({ "age": 30 }))
      .unwrap()
      .flat(json!({ "age": 31 }));
    assert!(matches!(result.unwrap_err(), Error::DuplicateClaim(name) if name == "age"));
  }

  #[test]
  fn structured_name_collides_with_plain() {
    let result = SdElements::new()
      .plain(json!({ "address": "somewhere" }))
      .unwrap()
      .structured("address", SdElements::new());
    assert!(matches!(result.unwrap_err(), Error::KeyCollision(name) if name == "address"));
  }

  #[test]
  fn plain_claim_collides_with_array() {
    let result = SdElements::new()
      .array("nationalities", [ArrayElement::Plain(json!("DE"))])
      .unwrap()
      .plain(json!({ "nationalities": [] }));
    assert!(matches!(result.unwrap_err(), Error::KeyCollision(name) if name == "nationalities"));
  }

  #[test]
  fn reserved_keys_rejected() {
    assert!(matches!(
      SdElements::new().flat(json!({ "_sd": [] })).unwrap_err(),
      Error::InvalidClaimName(_)
    ));
    assert!(matches!(
      SdElements::new().plain(json!({ "_sd_alg": "sha-256" })).unwrap_err(),
      Error::InvalidClaimName(_)
    ));
    assert!(matches!(
      SdElements::new().structured("...", SdElements::new()).unwrap_err(),
      Error::InvalidClaimName(_)
    ));
  }

  #[test]
  fn nested_reserved_key_in_plain_value() {
    let result = SdElements::new().plain(json!({ "claim": { "_sd": ["digest"] } }));
    assert!(matches!(result.unwrap_err(), Error::InvalidClaimName(_)));
  }

  #[test]
  fn non_object_claims() {
    assert!(matches!(
      SdElements::new().plain(json!(["not", "an", "object"])).unwrap_err(),
      Error::DataTypeMismatch(_)
    ));
  }
}
