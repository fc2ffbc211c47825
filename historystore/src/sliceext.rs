// Copyright Facebook, Inc. 2019.

use failure::Fallible;

use crate::error::HistoryPackError;

/// Slice indexing that turns an out-of-bounds access into a `decode-error`
/// instead of a panic. Every read off an mmap'd pack/index goes through
/// this so a truncated or corrupt file surfaces as an `Err`, never a SIGBUS
/// or a `slice index out of range` panic.
pub trait SliceExt {
    fn get_err(&self, range: std::ops::Range<usize>) -> Fallible<&[u8]>;
}

impl SliceExt for [u8] {
    fn get_err(&self, range: std::ops::Range<usize>) -> Fallible<&[u8]> {
        self.get(range.clone()).ok_or_else(|| {
            HistoryPackError::Decode(format!(
                "range {:?} out of bounds for slice of length {}",
                range,
                self.len()
            ))
            .into()
        })
    }
}
