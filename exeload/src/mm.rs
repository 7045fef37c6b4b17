// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! The memory-manager seam the loader maps executables into.
//!
//! [`MapMemory`] covers mapping and the post-load bookkeeping the manager keeps on behalf of
//! the process (`/proc` ranges, the recorded executable, the VDSO sigreturn address);
//! [`AccessMemory`] covers byte-level access to memory that has already been mapped. The
//! loader's contract with the caller is that the manager is empty at entry and that nothing
//! else mutates it for the duration of the call.

use core::ops::Range;

use thiserror::Error;

use crate::errno::Errno;
use crate::loader::auxv::AuxVec;

/// Page size in bytes
pub const PAGE_SIZE: usize = 4096;

/// Round `address` down to the containing page boundary.
pub fn page_align_down(address: usize) -> usize {
    address & !(PAGE_SIZE - 1)
}

/// Round `address` up to the next page boundary, or `None` on overflow.
pub fn page_align_up(address: usize) -> Option<usize> {
    address.checked_next_multiple_of(PAGE_SIZE)
}

/// Memory protection flags.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Protection {
    /// Read permission.
    pub read: bool,
    /// Write permission.
    pub write: bool,
    /// Execute permission.
    pub execute: bool,
}

impl Protection {
    /// Read-only.
    pub const READ: Self = Self { read: true, write: false, execute: false };
    /// Read-write, the protection of bss and of a non-executable stack.
    pub const READ_WRITE: Self = Self { read: true, write: true, execute: false };
    /// Read-execute, the protection of text and of the VDSO.
    pub const READ_EXEC: Self = Self { read: true, write: false, execute: true };
}

/// An error indicating a memory access fault.
#[derive(Debug, Error)]
#[error("memory access fault")]
pub struct Fault;

impl From<Fault> for Errno {
    fn from(_: Fault) -> Self {
        Errno::EFAULT
    }
}

/// The mapping and bookkeeping operations of a memory manager.
///
/// All addresses and lengths must be page-aligned; implementations fail otherwise.
pub trait MapMemory {
    /// The file handle type mappings can be backed by.
    type File;
    /// The error type for mapping operations.
    type Error: Into<Errno> + core::error::Error + 'static;

    /// Reserve an unmapped region of `len` bytes aligned to `align` (a power of two),
    /// returning the chosen base address.
    fn reserve(&mut self, len: usize, align: usize) -> Result<usize, Self::Error>;

    /// Map `len` bytes of `file` starting at file `offset` to `address`, with protection
    /// `prot`.
    fn map_file(
        &mut self,
        file: &Self::File,
        address: usize,
        len: usize,
        offset: u64,
        prot: Protection,
    ) -> Result<(), Self::Error>;

    /// Map `len` bytes of zeroed anonymous memory at `address` with protection `prot`.
    fn map_zero(&mut self, address: usize, len: usize, prot: Protection)
    -> Result<(), Self::Error>;

    /// Change protections of a mapped region.
    fn protect(&mut self, address: usize, len: usize, prot: Protection)
    -> Result<(), Self::Error>;

    /// Allocate and map the initial stack as a grow-down region somewhere in the address
    /// space, returning its range. `prot` carries the executable-stack bit derived from the
    /// image's `PT_GNU_STACK` header.
    fn map_stack(&mut self, prot: Protection) -> Result<Range<usize>, Self::Error>;

    /// Establish the initial program break.
    fn brk_setup(&mut self, address: usize);

    /// Record the range of the argv string area, for later `/proc` exposure.
    fn set_argv_range(&mut self, range: Range<usize>);

    /// Record the range of the envp string area, for later `/proc` exposure.
    fn set_envp_range(&mut self, range: Range<usize>);

    /// Record the auxiliary vector handed to the process.
    fn set_auxv(&mut self, auxv: &AuxVec);

    /// Record `file` as the executable backing this address space. The handle is co-owned by
    /// the manager for the process lifetime.
    fn set_executable(&mut self, file: Self::File);

    /// Record the address of the VDSO's sigreturn entry for the signal subsystem.
    fn set_vdso_sigreturn(&mut self, address: usize);
}

/// Trait for reading and writing memory that has been mapped via [`MapMemory`].
pub trait AccessMemory {
    /// Read from memory.
    fn read(&mut self, address: usize, buf: &mut [u8]) -> Result<(), Fault>;

    /// Write to memory.
    fn write(&mut self, address: usize, data: &[u8]) -> Result<(), Fault>;

    /// Zero out a region of memory.
    fn zero(&mut self, address: usize, len: usize) -> Result<(), Fault>;
}
