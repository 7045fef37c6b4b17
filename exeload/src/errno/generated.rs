// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Generated code for the [`super::Errno`] constants.
//!
//! This particular module itself is private, but defines all of the below within the public
//! [`super::Errno`] type, so as to have them all be exposed, but still keep the auto-generated
//! code restricted to this single file.

impl super::Errno {
    pub const EPERM: Self = Self::new(1);
    pub const ENOENT: Self = Self::new(2);
    pub const ESRCH: Self = Self::new(3);
    pub const EINTR: Self = Self::new(4);
    pub const EIO: Self = Self::new(5);
    pub const ENXIO: Self = Self::new(6);
    pub const E2BIG: Self = Self::new(7);
    pub const ENOEXEC: Self = Self::new(8);
    pub const EBADF: Self = Self::new(9);
    pub const ECHILD: Self = Self::new(10);
    pub const EAGAIN: Self = Self::new(11);
    pub const ENOMEM: Self = Self::new(12);
    pub const EACCES: Self = Self::new(13);
    pub const EFAULT: Self = Self::new(14);
    pub const ENOTBLK: Self = Self::new(15);
    pub const EBUSY: Self = Self::new(16);
    pub const EEXIST: Self = Self::new(17);
    pub const EXDEV: Self = Self::new(18);
    pub const ENODEV: Self = Self::new(19);
    pub const ENOTDIR: Self = Self::new(20);
    pub const EISDIR: Self = Self::new(21);
    pub const EINVAL: Self = Self::new(22);
    pub const ENFILE: Self = Self::new(23);
    pub const EMFILE: Self = Self::new(24);
    pub const ENOTTY: Self = Self::new(25);
    pub const ETXTBSY: Self = Self::new(26);
    pub const EFBIG: Self = Self::new(27);
    pub const ENOSPC: Self = Self::new(28);
    pub const ESPIPE: Self = Self::new(29);
    pub const EROFS: Self = Self::new(30);
    pub const EMLINK: Self = Self::new(31);
    pub const EPIPE: Self = Self::new(32);
    pub const EDOM: Self = Self::new(33);
    pub const ERANGE: Self = Self::new(34);
    pub const ENAMETOOLONG: Self = Self::new(36);
    pub const ELOOP: Self = Self::new(40);
    pub const ENODATA: Self = Self::new(61);
    pub const EOVERFLOW: Self = Self::new(75);
    pub const EOPNOTSUPP: Self = Self::new(95);

    /// Human-friendly readable version of `self`.
    ///
    /// Generated using
    /// ```sh
    /// /usr/bin/errno -l | awk \
    ///     -e 'function f(n,c,s){print c" => \""n": "s"\","}' \
    ///     -e '{n=$1; c=$2; $1=""; $2=""; f(n,c,substr($0,3));}' \
    /// | sort -n
    /// ```
    /// filtered down to the constants defined above, plus the fallthrough-unreachable case.
    pub const fn as_str(self) -> &'static str {
        match self.value.get() {
            1 => "EPERM: Operation not permitted",
            2 => "ENOENT: No such file or directory",
            3 => "ESRCH: No such process",
            4 => "EINTR: Interrupted system call",
            5 => "EIO: Input/output error",
            6 => "ENXIO: No such device or address",
            7 => "E2BIG: Argument list too long",
            8 => "ENOEXEC: Exec format error",
            9 => "EBADF: Bad file descriptor",
            10 => "ECHILD: No child processes",
            11 => "EAGAIN/EWOULDBLOCK: Resource temporarily unavailable",
            12 => "ENOMEM: Cannot allocate memory",
            13 => "EACCES: Permission denied",
            14 => "EFAULT: Bad address",
            15 => "ENOTBLK: Block device required",
            16 => "EBUSY: Device or resource busy",
            17 => "EEXIST: File exists",
            18 => "EXDEV: Invalid cross-device link",
            19 => "ENODEV: No such device",
            20 => "ENOTDIR: Not a directory",
            21 => "EISDIR: Is a directory",
            22 => "EINVAL: Invalid argument",
            23 => "ENFILE: Too many open files in system",
            24 => "EMFILE: Too many open files",
            25 => "ENOTTY: Inappropriate ioctl for device",
            26 => "ETXTBSY: Text file busy",
            27 => "EFBIG: File too large",
            28 => "ENOSPC: No space left on device",
            29 => "ESPIPE: Illegal seek",
            30 => "EROFS: Read-only file system",
            31 => "EMLINK: Too many links",
            32 => "EPIPE: Broken pipe",
            33 => "EDOM: Numerical argument out of domain",
            34 => "ERANGE: Numerical result out of range",
            36 => "ENAMETOOLONG: File name too long",
            40 => "ELOOP: Too many levels of symbolic links",
            61 => "ENODATA: No data available",
            75 => "EOVERFLOW: Value too large for defined data type",
            95 => "EOPNOTSUPP: Operation not supported",
            _ => "unknown errno",
        }
    }
}
