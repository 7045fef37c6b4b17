// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! VDSO mapping.
//!
//! The VDSO is a pre-linked image with a known in-process layout; nothing about it needs
//! parsing at load time. It is copied into a memory-manager-chosen region and tightened to
//! read-execute, and the driver records where its sigreturn trampoline ended up.

use thiserror::Error;

use crate::errno::Errno;
use crate::mm::{AccessMemory, Fault, MapMemory, PAGE_SIZE, Protection, page_align_up};

/// A pre-built VDSO image.
#[derive(Clone, Copy, Debug)]
pub struct VdsoImage<'a> {
    /// The image bytes, starting with its ELF header.
    pub bytes: &'a [u8],
    /// Offset from the image base to the sigreturn entry, fixed when the image was built.
    pub sigreturn_offset: usize,
}

/// An error while mapping the VDSO.
#[derive(Error, Debug)]
pub enum VdsoError<E> {
    #[error("VDSO image is empty or too large")]
    BadImage,
    #[error("memory mapping error")]
    Map(#[source] E),
    #[error(transparent)]
    Fault(#[from] Fault),
}

impl<E: Into<Errno>> From<VdsoError<E>> for Errno {
    fn from(value: VdsoError<E>) -> Self {
        match value {
            VdsoError::BadImage => Errno::EINVAL,
            VdsoError::Fault(Fault) => Errno::EFAULT,
            VdsoError::Map(err) => err.into(),
        }
    }
}

/// Map `vdso` into a free region of `mm`, returning its base address.
///
/// The copy is staged through a writable anonymous mapping and then tightened to
/// read-execute, so a W^X-enforcing manager never sees a writable-executable region.
pub fn load_vdso<M: MapMemory + AccessMemory>(
    mm: &mut M,
    vdso: &VdsoImage<'_>,
) -> Result<usize, VdsoError<M::Error>> {
    if vdso.bytes.is_empty() {
        return Err(VdsoError::BadImage);
    }
    let len = page_align_up(vdso.bytes.len()).ok_or(VdsoError::BadImage)?;
    let base = mm.reserve(len, PAGE_SIZE).map_err(VdsoError::Map)?;
    mm.map_zero(base, len, Protection::READ_WRITE)
        .map_err(VdsoError::Map)?;
    mm.write(base, vdso.bytes)?;
    mm.protect(base, len, Protection::READ_EXEC)
        .map_err(VdsoError::Map)?;
    Ok(base)
}
