// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Display;
use std::str::FromStr;

use crate::Error;

/// One step of a [`ClaimPath`]: an object key, an array index, or the
/// wildcard matching any single step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ClaimPathSegment {
  /// An object key.
  Name(String),
  /// An array index.
  Index(usize),
  /// Matches any single object key or array index. Only meaningful in query
  /// paths; paths recorded during recreation are always concrete.
  All,
}

impl Display for ClaimPathSegment {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Name(name) => f.write_str(name),
      Self::Index(index) => write!(f, "{index}"),
      Self::All => f.write_str("*"),
    }
  }
}

/// An ordered sequence of steps from the credential root to a claim.
///
/// Equality includes length; `a` is a prefix of `b` iff every step of `a`
/// equals the corresponding step of `b`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClaimPath(Vec<ClaimPathSegment>);

impl ClaimPath {
  /// The empty path, addressing the credential root.
  pub fn root() -> Self {
    Self::default()
  }

  /// Returns a new path with `segment` appended.
  pub fn join(&self, segment: ClaimPathSegment) -> Self {
    let mut segments = self.0.clone();
    segments.push(segment);
    Self(segments)
  }

  /// Returns the segments of this path.
  pub fn segments(&self) -> &[ClaimPathSegment] {
    &self.0
  }

  /// Returns the number of segments.
  pub fn len(&self) -> usize {
    self.0.len()
  }

  /// Returns whether this is the root path.
  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Returns whether `self` is a (non-strict) prefix of `other`.
  pub fn is_prefix_of(&self, other: &ClaimPath) -> bool {
    self.0.len() <= other.0.len() && self.0.iter().zip(other.0.iter()).all(|(a, b)| a == b)
  }

  /// Returns whether this concrete path satisfies `query`.
  ///
  /// A match requires equal length and, per step, either equality or a
  /// wildcard in the query.
  pub fn matches(&self, query: &ClaimPath) -> bool {
    self.0.len() == query.0.len()
      && self
        .0
        .iter()
        .zip(query.0.iter())
        .all(|(concrete, queried)| matches!(queried, ClaimPathSegment::All) || concrete == queried)
  }
}

impl FromIterator<ClaimPathSegment> for ClaimPath {
  fn from_iter<I: IntoIterator<Item = ClaimPathSegment>>(iter: I) -> Self {
    Self(iter.into_iter().collect())
  }
}

impl Display for ClaimPath {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    for segment in &self.0 {
      write!(f, "/{segment}")?;
    }
    Ok(())
  }
}

impl FromStr for ClaimPath {
  type Err = Error;

  /// Parses a `/`-separated path. Numeric segments become array indices and
  /// `*` becomes the wildcard; everything else is an object key.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let trimmed = s.trim_start_matches('/');
    if trimmed.is_empty() {
      return Ok(Self::root());
    }
    let segments = trimmed
      .split('/')
      .map(|segment| {
        if segment.is_empty() {
          return Err(Error::Deserialization(format!("empty segment in claim path {s}")));
        }
        Ok(match segment {
          "*" => ClaimPathSegment::All,
          _ => segment
            .parse::<usize>()
            .map(ClaimPathSegment::Index)
            .unwrap_or_else(|_| ClaimPathSegment::Name(segment.to_owned())),
        })
      })
      .collect::<Result<Vec<_>, _>>()?;
    Ok(Self(segments))
  }
}
