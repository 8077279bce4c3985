// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

mod builder;
mod decoder;
mod disclosure;
mod element;
mod encoder;
mod error;
mod hasher;
mod jwt;
mod key_binding_jwt;
mod path;
mod salt;
mod sd_jwt;
mod signer;
#[cfg(test)]
pub(crate) mod test_utils;
mod verifier;

pub use builder::*;
pub use decoder::*;
pub use disclosure::*;
pub use element::*;
pub use encoder::*;
pub use error::*;
pub use hasher::*;
pub use jwt::*;
pub use key_binding_jwt::*;
pub use path::*;
pub use salt::*;
pub use sd_jwt::*;
pub use signer::*;
pub use verifier::*;
