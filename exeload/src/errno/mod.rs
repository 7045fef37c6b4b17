// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Error handling. See [`Errno`].

use thiserror::Error;

mod generated;

/// Linux error numbers
///
/// This is a transparent wrapper around Linux error numbers (i.e., `i32`s) intended
/// to provide some type safety by expecting explicit conversions to/from `i32`s.
///
/// Every error the loader surfaces converts into one of these; collaborator seams are expected
/// to report their failures the same way so that the original error kind survives propagation.
#[derive(PartialEq, Eq, Clone, Copy, Error)]
pub struct Errno {
    value: core::num::NonZeroU8,
}

impl From<Errno> for i32 {
    fn from(e: Errno) -> Self {
        e.value.get().into()
    }
}

impl core::fmt::Display for Errno {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl core::fmt::Debug for Errno {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Errno({} = {})", self.value.get(), self.as_str())
    }
}

impl Errno {
    /// Provide the negative integer representation of the error
    ///
    /// ```
    /// # use exeload::errno::Errno;
    /// assert_eq!(-2, Errno::ENOENT.as_neg());
    /// // Direct conversion to i32 will give the positive variant
    /// assert_eq!(2, Errno::ENOENT.into());
    /// ```
    pub fn as_neg(self) -> i32 {
        -i32::from(self)
    }

    /// (Private-only) Helper function that makes the associated constants on [`Errno`]
    /// significantly more convenient to write down.
    const fn new(value: u8) -> Self {
        match core::num::NonZeroU8::new(value) {
            Some(value) => Errno { value },
            None => panic!("errno constants are non-zero"),
        }
    }
}
