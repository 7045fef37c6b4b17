// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! # exeload
//!
//! > An executable loader for a hosted Unix-style process.
//!
//! Given a path (or an already-open file) plus argument and environment vectors, `exeload`
//! prepares a fresh address space so that a program begins execution with the layout the
//! System V ABI mandates: it resolves `#!` interpreter-script indirection, maps ELF segments
//! (and their bss) into a caller-supplied memory manager, maps a VDSO image, builds the
//! initial stack (argv, envp, auxiliary vector, random bytes, executable name), arranges the
//! program break, and returns the image metadata.
//!
//! The loader owns none of the machinery it drives. Path resolution, mapping primitives,
//! credentials, randomness, and the register file are all reached through the narrow traits in
//! [`vfs`], [`mm`], and [`platform`]; callers provide implementations of those seams and then
//! call [`loader::load`].

#![no_std]

extern crate alloc;

pub mod errno;
pub mod loader;
pub mod mm;
pub mod platform;
pub mod utils;
pub mod vfs;

// The main entry point and its argument/result types, re-exported here publicly, just to keep
// the common case ergonomic.
pub use loader::{FileSource, ImageInfo, LoadError, LoadRequest, load};
