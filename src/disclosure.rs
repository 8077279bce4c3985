// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Display;

use serde_json::Value;

use crate::Error;
use crate::Result;
use crate::ARRAY_DIGEST_KEY;
use crate::DIGESTS_KEY;

/// A disclosable value.
/// Both object properties and array element disclosures are supported.
///
/// See: https://www.ietf.org/archive/id/draft-ietf-oauth-selective-disclosure-jwt-07.html#name-disclosures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disclosure {
  /// The salt value.
  pub salt: String,
  /// The claim name, `None` for array elements.
  pub claim_name: Option<String>,
  /// The claim value, which can be of any type.
  pub claim_value: Value,
  /// The encoded disclosure as produced at creation or as received.
  /// Digests are computed over this string, never over a re-serialization.
  unparsed: String,
}

impl Disclosure {
  /// Creates a disclosure for an object property.
  ///
  /// The wire form is the base64url-no-pad encoding of the JSON array
  /// `[salt, name, value]` serialized without redundant whitespace.
  ///
  /// ## Error
  /// Returns [`Error::InvalidClaimName`] if `name` is the reserved `_sd` key
  /// and [`Error::InvalidClaimValue`] if `value` contains a JSON `null` or an
  /// object with an `_sd` key, at any nesting depth.
  pub fn property(salt: String, name: String, value: Value) -> Result<Self> {
    if name == DIGESTS_KEY || name == ARRAY_DIGEST_KEY {
      return Err(Error::InvalidClaimName(name));
    }
    check_claim_value(&value)?;

    let array = Value::Array(vec![
      Value::String(salt.clone()),
      Value::String(name.clone()),
      value.clone(),
    ]);
    Ok(Self {
      salt,
      claim_name: Some(name),
      claim_value: value,
      unparsed: encode(&array),
    })
  }

  /// Creates a disclosure for an array element.
  ///
  /// The wire form is the base64url-no-pad encoding of the JSON array
  /// `[salt, value]` serialized without redundant whitespace.
  ///
  /// ## Error
  /// Returns [`Error::InvalidClaimValue`] if `value` contains a JSON `null`
  /// or an object with an `_sd` key, at any nesting depth.
  pub fn array_element(salt: String, value: Value) -> Result<Self> {
    check_claim_value(&value)?;

    let array = Value::Array(vec![Value::String(salt.clone()), value.clone()]);
    Ok(Self {
      salt,
      claim_name: None,
      claim_value: value,
      unparsed: encode(&array),
    })
  }

  /// Parses a base64url encoded disclosure into a [`Disclosure`].
  ///
  /// The input string is preserved: `to_string` returns it unchanged, so a
  /// decode/re-encode cycle can never invalidate digests.
  ///
  /// ## Error
  /// Returns an [`Error::MalformedDisclosure`] if input is not a valid disclosure.
  pub fn parse(disclosure: &str) -> Result<Self> {
    let decoded: Vec<Value> = multibase::Base::Base64Url
      .decode(disclosure)
      .map_err(|_| Error::MalformedDisclosure(format!("not base64url-no-pad encoded: {disclosure}")))
      .and_then(|data| {
        serde_json::from_slice(&data)
          .map_err(|_| Error::MalformedDisclosure(format!("decoded disclosure is not a JSON array: {disclosure}")))
      })?;

    let (salt, claim_name, claim_value) = match decoded.as_slice() {
      [salt, value] => (salt, None, value),
      [salt, name, value] => {
        let name = name
          .as_str()
          .ok_or_else(|| Error::MalformedDisclosure("claim name is not a string".to_string()))?;
        if name == DIGESTS_KEY || name == ARRAY_DIGEST_KEY {
          return Err(Error::MalformedDisclosure(format!("reserved claim name `{name}`")));
        }
        (salt, Some(name.to_owned()), value)
      }
      _ => {
        return Err(Error::MalformedDisclosure(format!(
          "deserialized array has an invalid length of {}",
          decoded.len()
        )))
      }
    };
    let salt = salt
      .as_str()
      .ok_or_else(|| Error::MalformedDisclosure("salt is not a string".to_string()))?
      .to_owned();

    Ok(Self {
      salt,
      claim_name,
      claim_value: claim_value.clone(),
      unparsed: disclosure.to_owned(),
    })
  }

  /// Returns the encoded disclosure, the string digests are computed over.
  pub fn as_str(&self) -> &str {
    &self.unparsed
  }
}

impl Display for Disclosure {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.unparsed)
  }
}

fn encode(array: &Value) -> String {
  // `to_string` never fails on a value that contains no non-string keys.
  let json = serde_json::to_string(array).expect("a JSON array is always serializable");
  multibase::Base::Base64Url.encode(json)
}

fn check_claim_value(value: &Value) -> Result<()> {
  match value {
    Value::Null => Err(Error::InvalidClaimValue("`null` cannot be disclosed".to_string())),
    Value::Object(object) => {
      if object.contains_key(DIGESTS_KEY) {
        return Err(Error::InvalidClaimValue(format!(
          "disclosed objects must not contain the reserved `{DIGESTS_KEY}` key"
        )));
      }
      object.values().try_for_each(check_claim_value)
    }
    Value::Array(array) => array.iter().try_for_each(check_claim_value),
    _ => Ok(()),
  }
}
