// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! The loader driver.
//!
//! [`load`] orchestrates one load: it resolves interpreter-script indirection, loads the
//! terminal ELF (and its `PT_INTERP` interpreter), maps the VDSO, establishes the program
//! break, builds the initial stack, and leaves the architecture context pointing at the entry
//! point. The memory manager must be empty at entry; on failure the caller tears the address
//! space down, so no mappings are unwound here.

pub mod auxv;
pub mod elf;
pub mod script;
mod stack;
pub mod vdso;


use alloc::ffi::CString;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use thiserror::Error;

use self::auxv::AuxKey;
use self::elf::LoadedImage;
use self::stack::UserStack;
use self::vdso::VdsoImage;
use crate::errno::Errno;
use crate::mm::{AccessMemory, MapMemory, PAGE_SIZE, Protection, page_align_up};
use crate::platform::{ArchContext, CpuFeatures, OsTag, Provider};
use crate::utils::TruncateExt as _;
use crate::vfs::{MAX_SYMLINK_TRAVERSALS, ReadAt, Vfs, XATTR_CAPS_SZ_3, XATTR_NAME_CAPS};

/// The maximum number of attempts to load an executable, to bound interpreter-script loops:
/// the initial attempt plus five substitutions, which is what Linux allows.
pub const MAX_LOADER_ATTEMPTS: usize = 6;

/// Maximum length of a process's short name, including the terminating NUL.
pub const TASK_COMM_LEN: usize = 16;

/// The value of `AT_CLKTCK`: the frequency at which `times()` increments.
pub const CLOCKS_PER_SEC: usize = 100;

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const SCRIPT_MAGIC: [u8; 2] = *b"#!";

/// Where the executable of a load attempt comes from.
pub enum FileSource<V: Vfs> {
    /// Resolve and open `filename` through the VFS. The loader owns the handle it opens and
    /// releases it on every failure path.
    Path {
        /// Path to the executable, relative to the working directory unless absolute.
        filename: String,
    },
    /// Use a pre-opened handle. The caller has already checked that it may execute this
    /// file; the loader still verifies it is a regular file.
    Handle {
        /// The open file.
        file: V::File,
        /// The name the file is known by, for diagnostics, `AT_EXECFN`, and the image name.
        filename: String,
    },
}

impl<V: Vfs> FileSource<V> {
    /// The name the executable is known by.
    pub fn filename(&self) -> &str {
        match self {
            FileSource::Path { filename } | FileSource::Handle { filename, .. } => filename,
        }
    }
}

/// Specification of an executable to be loaded. See [`load`].
pub struct LoadRequest<'a, V: Vfs, M: MapMemory<File = V::File> + AccessMemory> {
    /// The memory manager to load the executable into. Must be empty.
    pub mm: &'a mut M,
    /// The file system executables and interpreters are opened through.
    pub vfs: &'a V,
    /// The executable itself.
    pub source: FileSource<V>,
    /// The file-system root; absolute paths resolve against it.
    pub root: &'a V::Dir,
    /// The working directory; relative paths resolve against it.
    pub working_dir: &'a V::Dir,
    /// The symlink-traversal budget, shared with the caller and refreshed on each successful
    /// script substitution.
    pub remaining_traversals: &'a mut u32,
    /// Whether a trailing symlink of the filename is followed.
    pub resolve_final: bool,
    /// Whether the executable (or one of its parent directories) was opened close-on-exec.
    /// An interpreter script then fails with `ENOENT`, since the script would be
    /// inaccessible to the interpreter.
    pub close_on_exec: bool,
    /// The argument vector.
    pub argv: Vec<CString>,
    /// The environment vector.
    pub envv: Vec<CString>,
    /// The CPU feature set, for `AT_HWCAP`/`AT_HWCAP2`.
    pub features: &'a dyn CpuFeatures,
    /// Called after every successful open of an executable or interpreter path.
    pub after_open: Option<&'a mut dyn FnMut(&V::File)>,
}

/// The information for the loaded image.
#[derive(Debug)]
pub struct ImageInfo {
    /// The target operating system of the image.
    pub os: OsTag,
    /// The entry point the architecture context was pointed at.
    pub entry: usize,
    /// The initial stack pointer: the address of argc.
    pub sp: usize,
    /// The base name of the binary, truncated to [`TASK_COMM_LEN`]` - 1` bytes.
    pub name: String,
    /// The binary's file capability, empty when absent or unsupported.
    pub file_caps: Vec<u8>,
}

/// A load failure: the errno to surface, with a message naming the offending file.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct LoadError {
    errno: Errno,
    message: String,
}

impl LoadError {
    fn new(errno: Errno, message: String) -> Self {
        Self { errno, message }
    }

    /// The Linux errno this failure surfaces as.
    pub fn errno(&self) -> Errno {
        self.errno
    }
}

enum HeaderClass {
    Elf,
    InterpreterScript,
    Unknown,
}

/// Classify the first bytes of a file. The buffer is zero-padded when the file is shorter
/// than 4 bytes, so an ELF needs all four magic bytes present while a script needs only
/// `#!`.
fn classify(hdr: &[u8; 4]) -> HeaderClass {
    if *hdr == ELF_MAGIC {
        HeaderClass::Elf
    } else if hdr[..2] == SCRIPT_MAGIC {
        HeaderClass::InterpreterScript
    } else {
        HeaderClass::Unknown
    }
}

/// Read the 4-byte header window. Short reads are fine (a valid script can be three bytes);
/// a zero-byte file is not an executable of any kind.
fn read_header<F: ReadAt>(file: &F) -> Result<[u8; 4], Errno> {
    let mut hdr = [0u8; 4];
    let mut n = 0;
    while n < hdr.len() {
        match file.read_at(n as u64, &mut hdr[n..]).map_err(Into::into)? {
            0 => break,
            read => n += read,
        }
    }
    if n == 0 {
        return Err(Errno::ENOEXEC);
    }
    Ok(hdr)
}

/// Open `filename` for execution and run the after-open callback.
fn open_path<V: Vfs>(
    vfs: &V,
    root: &V::Dir,
    working_dir: &V::Dir,
    filename: &str,
    resolve_final: bool,
    remaining_traversals: &mut u32,
    after_open: &mut Option<&mut dyn FnMut(&V::File)>,
) -> Result<V::File, Errno> {
    if filename.is_empty() {
        return Err(Errno::ENOENT);
    }
    let file = vfs.open_at(root, working_dir, filename, resolve_final, remaining_traversals)?;
    if let Some(cb) = after_open.as_mut() {
        cb(&file);
    }
    Ok(file)
}

/// Prevent us from trying to execute a directory, pipe, socket, or device.
fn check_is_regular_file<P: Provider, F: ReadAt>(
    platform: &P,
    file: &F,
    filename: &str,
) -> Result<(), Errno> {
    let status = file.status().map_err(Into::into)?;
    if !status.mode.is_regular_file() {
        platform.debug_log_print(&format!("{filename} is not a regular file\n"));
        return Err(Errno::EACCES);
    }
    Ok(())
}

/// Resolve script indirection and load the terminal ELF.
///
/// Returns the loaded image, the ELF's file (retained so the memory manager can record it),
/// and the argv vector after all script substitutions.
#[expect(clippy::too_many_arguments, reason = "direct decomposition of the request")]
fn load_executable<P, V, M>(
    platform: &P,
    mm: &mut M,
    vfs: &V,
    root: &V::Dir,
    working_dir: &V::Dir,
    remaining_traversals: &mut u32,
    resolve_final: bool,
    close_on_exec: bool,
    source: FileSource<V>,
    mut argv: Vec<CString>,
    mut after_open: Option<&mut dyn FnMut(&V::File)>,
) -> Result<(LoadedImage, V::File, Vec<CString>), Errno>
where
    P: Provider,
    V: Vfs,
    M: MapMemory<File = V::File> + AccessMemory,
{
    let (mut filename, mut file) = match source {
        FileSource::Path { filename } => (filename, None),
        FileSource::Handle { file, filename } => (filename, Some(file)),
    };
    for _ in 0..MAX_LOADER_ATTEMPTS {
        let f = match file.take() {
            Some(f) => {
                check_is_regular_file(platform, &f, &filename)?;
                f
            }
            None => open_path(
                vfs,
                root,
                working_dir,
                &filename,
                resolve_final,
                remaining_traversals,
                &mut after_open,
            )
            .map_err(|errno| {
                platform.debug_log_print(&format!("error opening {filename}: {errno}\n"));
                errno
            })?,
        };

        let hdr = read_header(&f)?;
        match classify(&hdr) {
            HeaderClass::Elf => {
                let loaded = elf::load_elf(
                    platform,
                    mm,
                    vfs,
                    root,
                    working_dir,
                    remaining_traversals,
                    &f,
                    &filename,
                )?;
                // An ELF is always terminal. Hold on to the file.
                return Ok((loaded, f, argv));
            }
            HeaderClass::InterpreterScript => {
                if close_on_exec {
                    return Err(Errno::ENOENT);
                }
                let (new_filename, new_argv) =
                    script::parse_interpreter_script(&filename, &f, argv).map_err(|err| {
                        platform.debug_log_print(&format!(
                            "error loading interpreter script {filename}: {err}\n"
                        ));
                        Errno::from(err)
                    })?;
                filename = new_filename;
                argv = new_argv;
                // Refresh the traversal limit for the interpreter.
                *remaining_traversals = MAX_SYMLINK_TRAVERSALS;
            }
            HeaderClass::Unknown => {
                platform.debug_log_print(&format!("{filename}: unknown magic {hdr:02x?}\n"));
                return Err(Errno::ENOEXEC);
            }
        }
        // The script's file drops here; the next iteration opens the interpreter.
    }
    Err(Errno::ELOOP)
}

/// Load `req.source` into `req.mm` and prepare the initial task state.
///
/// Preconditions: the memory manager is empty, and no other agent mutates it for the
/// duration of the call.
pub fn load<P, V, M, A>(
    platform: &P,
    req: LoadRequest<'_, V, M>,
    arch: &mut A,
    extra_auxv: &[(AuxKey, usize)],
    vdso: &VdsoImage<'_>,
) -> Result<ImageInfo, LoadError>
where
    P: Provider,
    V: Vfs,
    M: MapMemory<File = V::File> + AccessMemory,
    A: ArchContext,
{
    let LoadRequest {
        mm,
        vfs,
        source,
        root,
        working_dir,
        remaining_traversals,
        resolve_final,
        close_on_exec,
        argv,
        envv,
        features,
        after_open,
    } = req;
    // The name the program was invoked by. Script substitutions rewrite argv, but
    // `AT_EXECFN` and the image name keep naming the original file.
    let filename = String::from(source.filename());

    let (loaded, file, argv) = load_executable(
        platform,
        mm,
        vfs,
        root,
        working_dir,
        remaining_traversals,
        resolve_final,
        close_on_exec,
        source,
        argv,
        after_open,
    )
    .map_err(|errno| LoadError::new(errno, format!("failed to load {filename}: {errno}")))?;
    let LoadedImage {
        os,
        entry,
        end,
        auxv: mut aux,
        executable_stack,
        tls: _,
    } = loaded;

    let file_caps = match file.get_xattr(XATTR_NAME_CAPS, XATTR_CAPS_SZ_3) {
        Ok(caps) => caps,
        Err(err) => {
            let errno = err.into();
            if errno == Errno::ENODATA || errno == Errno::EOPNOTSUPP {
                // The lack of file capabilities is communicated by an empty value.
                Vec::new()
            } else {
                return Err(LoadError::new(
                    errno,
                    format!("failed to read file capabilities of {filename}: {errno}"),
                ));
            }
        }
    };

    // Load the VDSO.
    let vdso_addr = vdso::load_vdso(mm, vdso).map_err(|err| {
        let message = format!("error loading VDSO: {err}");
        LoadError::new(Errno::from(err), message)
    })?;

    // Setup the heap. brk starts at the next page after the end of the executable.
    // Userspace can assume that the remainder of the page after `end` is available for its
    // use.
    let brk = page_align_up(end)
        .ok_or_else(|| LoadError::new(Errno::ENOEXEC, format!("brk overflows: {end:#x}")))?;
    mm.brk_setup(brk);

    // Allocate our stack.
    let stack_prot = if executable_stack {
        Protection { read: true, write: true, execute: true }
    } else {
        Protection::READ_WRITE
    };
    let stack_range = mm.map_stack(stack_prot).map_err(|err| {
        let message = format!("failed to allocate stack: {err}");
        LoadError::new(err.into(), message)
    })?;

    let layout = {
        let mut stack = UserStack::new(&mut *mm, stack_range).ok_or_else(|| {
            LoadError::new(Errno::ENOMEM, String::from("stack region is unusable"))
        })?;

        // Push the original filename, for AT_EXECFN.
        let execfn = stack.push_bytes_nul(filename.as_bytes()).map_err(|err| {
            let message = format!("failed to push exec filename: {err}");
            LoadError::new(err.into(), message)
        })?;

        // Push 16 bytes which AT_RANDOM will point to.
        let mut random = [0u8; 16];
        platform.fill_bytes(&mut random).map_err(|errno| {
            LoadError::new(errno, format!("failed to read random bytes: {errno}"))
        })?;
        let random_addr = stack.push_bytes(&random).map_err(|err| {
            let message = format!("failed to push random bytes: {err}");
            LoadError::new(err.into(), message)
        })?;

        // Add the generic auxv entries.
        aux.insert(AuxKey::AT_UID, platform.uid() as usize);
        aux.insert(AuxKey::AT_EUID, platform.euid() as usize);
        aux.insert(AuxKey::AT_GID, platform.gid() as usize);
        aux.insert(AuxKey::AT_EGID, platform.egid() as usize);
        // The conditions that would require AT_SECURE = 1 never arise. See the credentials
        // provider contract.
        aux.insert(AuxKey::AT_SECURE, 0);
        aux.insert(AuxKey::AT_CLKTCK, CLOCKS_PER_SEC);
        aux.insert(AuxKey::AT_EXECFN, execfn);
        aux.insert(AuxKey::AT_RANDOM, random_addr);
        aux.insert(AuxKey::AT_PAGESZ, PAGE_SIZE);
        aux.insert(AuxKey::AT_SYSINFO_EHDR, vdso_addr);
        aux.insert(AuxKey::AT_HWCAP, features.hwcap1().truncate());
        aux.insert(AuxKey::AT_HWCAP2, features.hwcap2().truncate());
        for (key, val) in extra_auxv {
            aux.insert(*key, *val);
        }

        stack.build(&argv, &envv, &aux).map_err(|err| {
            let message = format!("failed to load stack: {err}");
            LoadError::new(err.into(), message)
        })?
    };

    mm.set_argv_range(layout.argv_range);
    mm.set_envp_range(layout.envp_range);
    mm.set_auxv(&aux);
    mm.set_executable(file.clone());
    mm.set_vdso_sigreturn(vdso_addr + vdso.sigreturn_offset);

    arch.set_ip(entry);
    arch.set_sp(layout.sp);

    let base = filename.rsplit('/').next().unwrap_or("");
    let mut cut = base.len().min(TASK_COMM_LEN - 1);
    while !base.is_char_boundary(cut) {
        cut -= 1;
    }

    Ok(ImageInfo {
        os,
        entry,
        sp: layout.sp,
        name: String::from(&base[..cut]),
        file_caps,
    })
}
