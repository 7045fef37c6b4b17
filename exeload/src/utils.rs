// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Miscellaneous "kitchen sink" shared by the loader modules.

/// An extension trait that adds `truncate` to truncate integers to a specific size of the same
/// signedness.
///
/// ELF fields are 64-bit on disk regardless of the host; conversions into `usize` addresses are
/// spelled with this trait so that every deliberate narrowing is visible at the call site.
pub trait TruncateExt<To> {
    /// Truncate `self` to `To`, taking only lower-order bits.
    fn truncate(self) -> To;
}

macro_rules! impl_truncate {
    ($from:ty, $to:ty) => {
        impl TruncateExt<$to> for $from {
            #[inline(always)]
            fn truncate(self) -> $to {
                <$to>::from_le_bytes(
                    self.to_le_bytes()[..const { core::mem::size_of::<$to>() }]
                        .try_into()
                        .expect("guaranteed to be optimized out"),
                )
            }
        }
    };
}

impl_truncate! { u64, usize }
impl_truncate! { u64, u32 }
impl_truncate! { u64, u16 }
impl_truncate! { u64, u8 }
impl_truncate! { usize, u32 }
impl_truncate! { usize, u16 }
impl_truncate! { usize, u8 }
impl_truncate! { u32, u16 }
impl_truncate! { u32, u8 }
impl_truncate! { u16, u8 }
