// Copyright Facebook, Inc. 2019.
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2 or any later version.

//! The crate-level error type. Every public entry point returns
//! `Fallible<T>` (an alias for `Result<T, failure::Error>`); callers that
//! need to distinguish *not-found* from everything else (the multi-pack
//! store's fallthrough loop, most prominently) downcast to
//! `HistoryPackError` and match on the `NotFound` variant.

use std::io;

use failure::Fail;
use types::Key;

#[derive(Debug, Fail)]
pub enum HistoryPackError {
    #[fail(display = "key not found: {:?}", _0)]
    NotFound(Key),

    #[fail(display = "decode error: {}", _0)]
    Decode(String),

    #[fail(
        display = "name hash collision: looked up {:?}, found {:?}",
        expected, actual
    )]
    Collision {
        expected: Vec<u8>,
        actual: Vec<u8>,
    },

    #[fail(display = "client protocol error: {}", _0)]
    ClientProtocol(String),

    #[fail(display = "io error: {}", _0)]
    Io(#[fail(cause)] io::Error),
}

impl From<io::Error> for HistoryPackError {
    fn from(e: io::Error) -> Self {
        HistoryPackError::Io(e)
    }
}

impl HistoryPackError {
    pub fn not_found(name: &[u8], node: &types::Node) -> Self {
        HistoryPackError::NotFound(Key::new(name.to_vec(), node.clone()))
    }
}
