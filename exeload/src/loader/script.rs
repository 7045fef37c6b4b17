// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Interpreter-script (`#!`) resolution.
//!
//! A script substitutes a new filename and argv for the current attempt; the driver then loops
//! and loads the interpreter instead. The parsing rules here match Linux's `load_script`
//! behavior: one line, bounded length, at most one argument carrying the entire remainder of
//! the line.

use alloc::ffi::CString;
use alloc::string::String;
use alloc::vec::Vec;
use thiserror::Error;

use crate::errno::Errno;
use crate::vfs::ReadAt;

/// The longest usable `#!` line. Bytes past this are ignored, newline or not.
pub const INTERP_MAX_LINE_LENGTH: usize = 127;

/// An error from [`parse_interpreter_script`].
#[derive(Error, Debug)]
pub enum ScriptError<E> {
    #[error("interpreter line has no usable interpreter path")]
    BadInterpreter,
    #[error("I/O error")]
    Io(#[source] E),
}

impl<E: Into<Errno>> From<ScriptError<E>> for Errno {
    fn from(value: ScriptError<E>) -> Self {
        match value {
            ScriptError::BadInterpreter => Errno::ENOEXEC,
            ScriptError::Io(err) => err.into(),
        }
    }
}

fn trim_start(mut line: &[u8]) -> &[u8] {
    while let [b' ' | b'\t', rest @ ..] = line {
        line = rest;
    }
    line
}

fn trim_end(mut line: &[u8]) -> &[u8] {
    while let [rest @ .., b' ' | b'\t'] = line {
        line = rest;
    }
    line
}

/// Parse the `#!` line of `file` and rewrite `argv` for the interpreter.
///
/// Returns the interpreter path (the filename of the next load attempt) and the new argv:
/// `[interpreter, argument?, filename, argv[1..]...]`. The script's own `argv[0]` is
/// discarded; `filename` takes its place so the interpreter can re-open the script under the
/// name it was invoked by.
pub fn parse_interpreter_script<F: ReadAt>(
    filename: &str,
    file: &F,
    argv: Vec<CString>,
) -> Result<(String, Vec<CString>), ScriptError<F::Error>> {
    let mut buf = [0u8; INTERP_MAX_LINE_LENGTH];
    let mut n = 0;
    while n < buf.len() {
        match file.read_at(n as u64, &mut buf[n..]).map_err(ScriptError::Io)? {
            0 => break,
            read => n += read,
        }
    }
    let mut line = &buf[..n];

    // The line ends at the first newline, or at the length limit if there is none. A stray NUL
    // ends it as well, since the interpreter path must be a C string.
    if let Some(i) = line.iter().position(|&b| b == b'\n') {
        line = &line[..i];
    }
    if let Some(i) = line.iter().position(|&b| b == 0) {
        line = &line[..i];
    }
    let Some(line) = line.strip_prefix(b"#!") else {
        return Err(ScriptError::BadInterpreter);
    };

    let line = trim_start(line);
    let (interp, rest) = match line.iter().position(|&b| b == b' ' || b == b'\t') {
        Some(i) => line.split_at(i),
        None => (line, &line[line.len()..]),
    };
    if interp.is_empty() {
        return Err(ScriptError::BadInterpreter);
    }
    // Everything after the first whitespace run is a single argument, internal whitespace
    // included, with both ends trimmed.
    let arg = trim_end(trim_start(rest));

    let interp_path =
        String::from_utf8(interp.to_vec()).map_err(|_| ScriptError::BadInterpreter)?;

    let mut new_argv = Vec::with_capacity(argv.len() + 2);
    new_argv.push(CString::new(interp).expect("NUL bytes were truncated away"));
    if !arg.is_empty() {
        new_argv.push(CString::new(arg).expect("NUL bytes were truncated away"));
    }
    new_argv.push(CString::new(filename).map_err(|_| ScriptError::BadInterpreter)?);
    new_argv.extend(argv.into_iter().skip(1));

    Ok((interp_path, new_argv))
}
