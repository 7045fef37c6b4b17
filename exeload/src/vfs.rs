// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! The file-system seam the loader reads executables through.
//!
//! Lookup, permission checking, and symlink traversal all live behind [`Vfs::open_at`]; the
//! loader only ever sees opened files as [`ReadAt`] implementations.

use alloc::vec::Vec;
use bitflags::bitflags;
use thiserror::Error;

use crate::errno::Errno;

/// The maximum number of symbolic links a single path resolution may traverse.
///
/// The driver refreshes the shared traversal budget to this value after each successful
/// interpreter-script substitution.
pub const MAX_SYMLINK_TRAVERSALS: u32 = 40;

/// Name of the extended attribute holding a file's capability sets.
pub const XATTR_NAME_CAPS: &str = "security.capability";

/// Size of the version-3 `vfs_cap_data` descriptor, the largest on-disk capability format.
pub const XATTR_CAPS_SZ_3: usize = 24;

bitflags! {
    /// File mode bits, in the Linux `st_mode` encoding.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct FileMode: u32 {
        /// Bit mask for the file type bit field.
        const S_IFMT = 0o170000;
        /// Socket.
        const S_IFSOCK = 0o140000;
        /// Symbolic link.
        const S_IFLNK = 0o120000;
        /// Regular file.
        const S_IFREG = 0o100000;
        /// Block device.
        const S_IFBLK = 0o060000;
        /// Directory.
        const S_IFDIR = 0o040000;
        /// Character device.
        const S_IFCHR = 0o020000;
        /// FIFO.
        const S_IFIFO = 0o010000;
        /// <https://docs.rs/bitflags/*/bitflags/#externally-defined-flags>
        const _ = !0;
    }
}

impl FileMode {
    /// Whether the mode describes a regular file.
    ///
    /// Only regular files may be executed; the driver rejects everything else.
    pub fn is_regular_file(self) -> bool {
        (self & FileMode::S_IFMT) == FileMode::S_IFREG
    }
}

/// Status information about an opened file.
#[derive(Clone, Copy, Debug)]
pub struct FileStatus {
    /// File type and permission bits.
    pub mode: FileMode,
}

/// An error from [`ReadAt::read_full`].
#[derive(Error, Debug)]
pub enum ReadFullError<E> {
    #[error("unexpected end of file")]
    UnexpectedEof,
    #[error("I/O error")]
    Io(#[source] E),
}

/// An opened file the loader can read executable bytes from.
///
/// Reads are positional and never move a file offset; regular-file reads are assumed not to
/// block, matching the VFS contract.
pub trait ReadAt {
    /// The error type for file operations.
    type Error: Into<Errno> + core::error::Error + 'static;

    /// Read into `buf` starting at `offset`, returning the number of bytes read.
    ///
    /// A short (or zero) count is only permitted at end-of-file.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// The length of the file in bytes.
    fn size(&self) -> Result<u64, Self::Error>;

    /// File status, for the regular-file check on pre-opened handles.
    fn status(&self) -> Result<FileStatus, Self::Error>;

    /// Read the extended attribute `name`, returning at most `size` bytes.
    ///
    /// Absence is reported as `ENODATA`; file systems without xattr support report
    /// `EOPNOTSUPP`.
    fn get_xattr(&self, name: &str, size: usize) -> Result<Vec<u8>, Self::Error>;

    /// Fill `buf` entirely from `offset`, failing on premature end-of-file.
    fn read_full(
        &self,
        mut offset: u64,
        mut buf: &mut [u8],
    ) -> Result<(), ReadFullError<Self::Error>> {
        loop {
            if buf.is_empty() {
                return Ok(());
            }
            match self.read_at(offset, buf) {
                Ok(0) => return Err(ReadFullError::UnexpectedEof),
                Ok(n) => {
                    buf = &mut buf[n..];
                    offset += n as u64;
                }
                Err(err) => return Err(ReadFullError::Io(err)),
            }
        }
    }
}

/// The virtual file system the loader opens executables and interpreters through.
pub trait Vfs {
    /// A directory handle, used as the root and starting point of resolution.
    type Dir;
    /// An opened file. Cloning must yield another reference to the same open file description,
    /// so that the memory manager can co-own the executable past loader return.
    type File: ReadAt + Clone;

    /// Open `path` for execution (read access plus an execute-permission check), resolving
    /// relative paths against `start` and absolute ones against `root`.
    ///
    /// `follow_final` says whether a trailing symlink is followed. `remaining_traversals` is
    /// the shared symlink budget; resolution decrements it and fails with `ELOOP` once it hits
    /// zero.
    fn open_at(
        &self,
        root: &Self::Dir,
        start: &Self::Dir,
        path: &str,
        follow_final: bool,
        remaining_traversals: &mut u32,
    ) -> Result<Self::File, Errno>;
}
