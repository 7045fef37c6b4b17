// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! ELF parsing and mapping.
//!
//! Supports parsing and mapping ELF binaries as the Linux kernel would when starting a new
//! process, including both static and dynamic (`PT_INTERP`) binaries. Parsing is a pure
//! function of the file bytes; mapping realizes the parsed segments in a [`MapMemory`]
//! implementation.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use elf::file::{Class, FileHeader};
use thiserror::Error;

use super::auxv::{AuxKey, AuxVec};
use crate::errno::Errno;
use crate::mm::{AccessMemory, Fault, MapMemory, PAGE_SIZE, Protection, page_align_down, page_align_up};
use crate::platform::{OsTag, Provider};
use crate::utils::TruncateExt as _;
use crate::vfs::{ReadAt, ReadFullError, Vfs};

type Endian = elf::endian::LittleEndian;

const CLASS: Class = Class::ELF64;

const MACHINE: u16 = if cfg!(target_arch = "x86_64") {
    elf::abi::EM_X86_64
} else if cfg!(target_arch = "aarch64") {
    elf::abi::EM_AARCH64
} else {
    panic!("unsupported arch")
};

/// Errors that can occur when parsing an ELF file.
#[derive(Debug, Error)]
pub enum ElfParseError<E> {
    #[error("ELF parsing error")]
    Elf(#[from] elf::parse::ParseError),
    #[error("bad ELF format")]
    BadFormat,
    #[error("unsupported ELF type")]
    UnsupportedType,
    #[error("bad interpreter")]
    BadInterp,
    #[error("I/O error")]
    Io(#[source] E),
}

impl<E: Into<Errno>> From<ElfParseError<E>> for Errno {
    fn from(value: ElfParseError<E>) -> Self {
        match value {
            ElfParseError::Elf(_)
            | ElfParseError::BadFormat
            | ElfParseError::UnsupportedType
            | ElfParseError::BadInterp => Errno::ENOEXEC,
            ElfParseError::Io(err) => err.into(),
        }
    }
}

impl<E> ElfParseError<E> {
    fn from_read(err: ReadFullError<E>) -> Self {
        match err {
            ReadFullError::UnexpectedEof => ElfParseError::BadFormat,
            ReadFullError::Io(err) => ElfParseError::Io(err),
        }
    }
}

/// Errors that can occur when mapping an ELF file into memory.
#[derive(Debug, Error)]
pub enum ElfLoadError<E> {
    #[error("memory mapping error")]
    Map(#[source] E),
    #[error("invalid program header")]
    InvalidProgramHeader,
    #[error(transparent)]
    Fault(#[from] Fault),
}

impl<E: Into<Errno>> From<ElfLoadError<E>> for Errno {
    fn from(value: ElfLoadError<E>) -> Self {
        match value {
            ElfLoadError::InvalidProgramHeader => Errno::ENOEXEC,
            ElfLoadError::Fault(Fault) => Errno::EFAULT,
            ElfLoadError::Map(err) => err.into(),
        }
    }
}

/// One `PT_LOAD` program header, validated.
///
/// The memory size may exceed the file size; the excess is the zero-filled bss.
#[derive(Clone, Copy, Debug)]
pub struct ProgramSegment {
    /// Offset of the segment contents in the file.
    pub offset: u64,
    /// Number of bytes backed by the file.
    pub file_size: u64,
    /// Total size of the segment in memory.
    pub mem_size: u64,
    /// Unbiased virtual address.
    pub vaddr: u64,
    /// Requested alignment, a power of two.
    pub align: u64,
    /// Segment permissions.
    pub prot: Protection,
}

/// The result of parsing an ELF file's headers: a typed, validated description of the
/// segments to be mapped. Parsing reads only the file; it maps nothing.
#[derive(Debug)]
pub struct ElfParsedFile {
    os: OsTag,
    e_type: u16,
    entry: u64,
    phoff: u64,
    phnum: u16,
    segments: Vec<ProgramSegment>,
    interpreter: Option<String>,
    phdr_vaddr: Option<u64>,
    executable_stack: bool,
    tls: Option<ProgramSegment>,
}

fn prot_from_flags(flags: u32) -> Protection {
    Protection {
        read: flags & elf::abi::PF_R != 0,
        write: flags & elf::abi::PF_W != 0,
        execute: flags & elf::abi::PF_X != 0,
    }
}

impl ElfParsedFile {
    /// Parse and validate the ELF header and program-header table of `file`.
    pub fn parse<F: ReadAt>(file: &F) -> Result<Self, ElfParseError<F::Error>> {
        let mut buf = [0u8; size_of::<elf::file::Elf64_Ehdr>()];
        file.read_full(0, &mut buf)
            .map_err(ElfParseError::from_read)?;
        let ident = elf::file::parse_ident::<Endian>(&buf)?;
        if ident.1 != CLASS {
            return Err(ElfParseError::BadFormat);
        }
        let os = match ident.2 {
            // Plain System V or Linux; everything else is some other operating system's
            // binary.
            elf::abi::ELFOSABI_NONE | elf::abi::ELFOSABI_GNU => OsTag::Linux,
            _ => return Err(ElfParseError::UnsupportedType),
        };
        let header = FileHeader::parse_tail(ident, &buf[elf::abi::EI_NIDENT..])?;

        if header.version != 1 {
            // EV_CURRENT is the only defined file version.
            return Err(ElfParseError::BadFormat);
        }
        if header.e_type != elf::abi::ET_EXEC && header.e_type != elf::abi::ET_DYN {
            return Err(ElfParseError::UnsupportedType);
        }
        if header.e_machine != MACHINE {
            return Err(ElfParseError::UnsupportedType);
        }

        if usize::from(header.e_phentsize) != size_of::<elf::segment::Elf64_Phdr>() {
            return Err(ElfParseError::BadFormat);
        }
        // The u16 multiply also bounds the table to 64KiB.
        let phdr_size: u16 = header
            .e_phentsize
            .checked_mul(header.e_phnum)
            .ok_or(ElfParseError::BadFormat)?;
        let mut phdrs = alloc::vec![0u8; usize::from(phdr_size)];
        file.read_full(header.e_phoff, &mut phdrs)
            .map_err(ElfParseError::from_read)?;

        let mut segments = Vec::new();
        let mut interpreter = None;
        let mut phdr_vaddr = None;
        let mut executable_stack = false;
        let mut tls = None;
        let mut last_end: u64 = 0;
        for ph in elf::parse::ParsingIterator::<'_, Endian, elf::segment::ProgramHeader>::new(
            header.endianness,
            header.class,
            &phdrs,
        ) {
            match ph.p_type {
                elf::abi::PT_LOAD => {
                    let end = ph
                        .p_vaddr
                        .checked_add(ph.p_memsz)
                        .ok_or(ElfParseError::BadFormat)?;
                    ph.p_offset
                        .checked_add(ph.p_filesz)
                        .ok_or(ElfParseError::BadFormat)?;
                    if ph.p_filesz > ph.p_memsz {
                        return Err(ElfParseError::BadFormat);
                    }
                    // Loadable segments must be sorted and disjoint, and the file offset must
                    // be congruent with the virtual address modulo the page size, or the
                    // segment cannot be realized by page-granular mappings.
                    if ph.p_vaddr < last_end {
                        return Err(ElfParseError::BadFormat);
                    }
                    if ph.p_offset % PAGE_SIZE as u64 != ph.p_vaddr % PAGE_SIZE as u64 {
                        return Err(ElfParseError::BadFormat);
                    }
                    if ph.p_align != 0 && !ph.p_align.is_power_of_two() {
                        return Err(ElfParseError::BadFormat);
                    }
                    last_end = end;
                    segments.push(ProgramSegment {
                        offset: ph.p_offset,
                        file_size: ph.p_filesz,
                        mem_size: ph.p_memsz,
                        vaddr: ph.p_vaddr,
                        align: ph.p_align,
                        prot: prot_from_flags(ph.p_flags),
                    });
                }
                elf::abi::PT_INTERP => {
                    if interpreter.is_some() {
                        return Err(ElfParseError::BadFormat);
                    }
                    // Bound the interpreter length like Linux, and require the trailing NUL.
                    let len: usize = ph.p_filesz.truncate();
                    if !(2..4096).contains(&len) {
                        return Err(ElfParseError::BadInterp);
                    }
                    let mut buf = alloc::vec![0u8; len];
                    file.read_full(ph.p_offset, &mut buf)
                        .map_err(ElfParseError::from_read)?;
                    buf.truncate(
                        buf.iter()
                            .position(|&b| b == 0)
                            .ok_or(ElfParseError::BadInterp)?,
                    );
                    if buf.is_empty() {
                        return Err(ElfParseError::BadInterp);
                    }
                    interpreter =
                        Some(String::from_utf8(buf).map_err(|_| ElfParseError::BadInterp)?);
                }
                elf::abi::PT_GNU_STACK => {
                    executable_stack = ph.p_flags & elf::abi::PF_X != 0;
                }
                elf::abi::PT_PHDR => {
                    phdr_vaddr = Some(ph.p_vaddr);
                }
                elf::abi::PT_TLS => {
                    if tls.is_some() {
                        return Err(ElfParseError::BadFormat);
                    }
                    tls = Some(ProgramSegment {
                        offset: ph.p_offset,
                        file_size: ph.p_filesz,
                        mem_size: ph.p_memsz,
                        vaddr: ph.p_vaddr,
                        align: ph.p_align,
                        prot: prot_from_flags(ph.p_flags),
                    });
                }
                _ => {}
            }
        }
        if segments.is_empty() {
            return Err(ElfParseError::BadFormat);
        }

        Ok(ElfParsedFile {
            os,
            e_type: header.e_type,
            entry: header.e_entry,
            phoff: header.e_phoff,
            phnum: header.e_phnum,
            segments,
            interpreter,
            phdr_vaddr,
            executable_stack,
            tls,
        })
    }

    /// The operating system the image targets.
    pub fn os(&self) -> OsTag {
        self.os
    }

    /// The validated `PT_LOAD` segments, in ascending address order.
    pub fn segments(&self) -> &[ProgramSegment] {
        &self.segments
    }

    /// The `PT_INTERP` interpreter path, if any.
    pub fn interpreter(&self) -> Option<&str> {
        self.interpreter.as_deref()
    }

    /// Whether `PT_GNU_STACK` asked for an executable stack.
    pub fn executable_stack(&self) -> bool {
        self.executable_stack
    }

    /// The TLS template segment, if the image carries one. Setting up the TLS image is the
    /// dynamic linker's job; the loader only records it.
    pub fn tls(&self) -> Option<&ProgramSegment> {
        self.tls.as_ref()
    }

    /// Map all `PT_LOAD` segments of `file` into `mm`.
    pub fn load<M: MapMemory + AccessMemory>(
        &self,
        mm: &mut M,
        file: &M::File,
    ) -> Result<MappedElf, ElfLoadError<M::Error>> {
        let bias: usize = if self.e_type == elf::abi::ET_DYN {
            // Find an aligned region that will fit all PT_LOAD segments, and bias every
            // address so that the lowest segment lands at its start. The subtraction can
            // wrap for prelinked objects whose lowest vaddr exceeds the chosen base; the
            // per-segment additions below wrap back into range.
            let mut min = usize::MAX;
            let mut max = 0usize;
            let mut align = PAGE_SIZE;
            for seg in &self.segments {
                min = min.min(seg.vaddr.truncate());
                let end: u64 = seg
                    .vaddr
                    .checked_add(seg.mem_size)
                    .ok_or(ElfLoadError::InvalidProgramHeader)?;
                max = max.max(end.truncate());
                if seg.align.is_power_of_two() {
                    align = align.max(seg.align.truncate());
                }
            }
            let min = page_align_down(min);
            let max = page_align_up(max).ok_or(ElfLoadError::InvalidProgramHeader)?;
            let base = mm
                .reserve(max - min, align)
                .map_err(ElfLoadError::Map)?;
            base.wrapping_sub(min)
        } else {
            // For ET_EXEC, load at the fixed addresses specified in the ELF.
            0
        };

        let mut end = 0usize;
        let mut phdr_addr = 0usize;
        for seg in &self.segments {
            let seg_addr = bias.wrapping_add(seg.vaddr.truncate());
            let seg_file_end = seg_addr
                .checked_add(seg.file_size.truncate())
                .ok_or(ElfLoadError::InvalidProgramHeader)?;
            let seg_mem_end = seg_addr
                .checked_add(seg.mem_size.truncate())
                .ok_or(ElfLoadError::InvalidProgramHeader)?;
            let load_start = page_align_down(seg_addr);
            let file_end = page_align_up(seg_file_end).ok_or(ElfLoadError::InvalidProgramHeader)?;
            let load_end = page_align_up(seg_mem_end).ok_or(ElfLoadError::InvalidProgramHeader)?;

            let anon_start = if seg.file_size > 0 {
                // Map the file-backed whole pages with their final permissions. `p_offset`
                // is co-aligned with `p_vaddr` (checked at parse time), so backing up to the
                // page boundary stays within the file's page.
                let offset = seg.offset - (seg_addr - load_start) as u64;
                mm.map_file(file, load_start, file_end - load_start, offset, seg.prot)
                    .map_err(ElfLoadError::Map)?;
                // Zero the remainder of the last file-backed page. Common binaries depend on
                // the whole tail being zero, but only a writable segment may be touched; a
                // read-only segment's tail is whatever the file holds, as other loaders have
                // it.
                if seg.mem_size > seg.file_size && seg.prot.write && file_end > seg_file_end {
                    mm.zero(seg_file_end, file_end - seg_file_end)?;
                }
                file_end
            } else {
                load_start
            };
            if load_end > anon_start {
                // Map the zero-filled portion.
                mm.map_zero(anon_start, load_end - anon_start, seg.prot)
                    .map_err(ElfLoadError::Map)?;
            }

            end = end.max(load_end);

            // Track the location of the program headers in memory; this is used for
            // `AT_PHDR`.
            if seg.offset <= self.phoff && self.phoff < seg.offset + seg.file_size {
                let offset_in_segment: usize = (self.phoff - seg.offset).truncate();
                phdr_addr = seg_addr + offset_in_segment;
            }
        }

        // An explicit PT_PHDR wins, but only when a PT_LOAD actually maps it.
        if let Some(vaddr) = self.phdr_vaddr {
            let addr = bias.wrapping_add(vaddr.truncate());
            let mapped = self.segments.iter().any(|seg| {
                let start = bias.wrapping_add(seg.vaddr.truncate());
                addr >= start && addr < start.wrapping_add(seg.file_size.truncate())
            });
            if mapped {
                phdr_addr = addr;
            }
        }

        Ok(MappedElf {
            start: page_align_down(bias.wrapping_add(self.segments[0].vaddr.truncate())),
            end,
            entry: bias.wrapping_add(self.entry.truncate()),
            phdr_addr,
        })
    }
}

/// The result of mapping one parsed ELF into the address space.
#[derive(Debug)]
pub struct MappedElf {
    /// Lowest address the image occupies. For an ET_DYN image this is the load bias target.
    pub start: usize,
    /// One past the highest mapped address.
    pub end: usize,
    /// Biased entry point.
    pub entry: usize,
    /// Address of the program-header table in process memory, 0 when no segment maps it.
    pub phdr_addr: usize,
}

/// A fully loaded executable: the binary's segments plus its `PT_INTERP` interpreter's, if
/// any. This exists only between parse and stack build; the driver consumes it.
#[derive(Debug)]
pub struct LoadedImage {
    /// The operating system the image targets.
    pub os: OsTag,
    /// Where execution starts: the interpreter's entry point when one is present, the
    /// binary's otherwise.
    pub entry: usize,
    /// One past the highest address of the binary's segments. The program break starts on
    /// the page after this; the interpreter is mapped elsewhere and does not move it.
    pub end: usize,
    /// Auxiliary-vector entries contributed by the image.
    pub auxv: AuxVec,
    /// Whether the initial stack must be executable.
    pub executable_stack: bool,
    /// The binary's TLS template, for the dynamic linker to consume.
    pub tls: Option<ProgramSegment>,
}

/// Load the ELF `file` and, when it names a `PT_INTERP` interpreter, that interpreter too.
///
/// The interpreter must itself be a self-contained ELF: scripts and nested `PT_INTERP`
/// chains are rejected rather than re-entering the script-substitution loop.
pub(super) fn load_elf<P, V, M>(
    platform: &P,
    mm: &mut M,
    vfs: &V,
    root: &V::Dir,
    working_dir: &V::Dir,
    remaining_traversals: &mut u32,
    file: &V::File,
    filename: &str,
) -> Result<LoadedImage, Errno>
where
    P: Provider,
    V: Vfs,
    M: MapMemory<File = V::File> + AccessMemory,
{
    let bin = ElfParsedFile::parse(file).map_err(|err| {
        platform.debug_log_print(&format!("error parsing {filename}: {err}\n"));
        Errno::from(err)
    })?;
    let bin_mapped = bin.load(mm, file).map_err(|err| {
        platform.debug_log_print(&format!("error mapping {filename}: {err}\n"));
        Errno::from(err)
    })?;

    let mut auxv = AuxVec::new();
    auxv.insert(AuxKey::AT_PHDR, bin_mapped.phdr_addr);
    auxv.insert(AuxKey::AT_PHENT, size_of::<elf::segment::Elf64_Phdr>());
    auxv.insert(AuxKey::AT_PHNUM, bin.phnum.into());
    auxv.insert(AuxKey::AT_ENTRY, bin_mapped.entry);
    auxv.insert(AuxKey::AT_FLAGS, 0);

    let mut entry = bin_mapped.entry;
    if let Some(interp_path) = bin.interpreter() {
        let interp_file = vfs
            .open_at(root, working_dir, interp_path, true, remaining_traversals)
            .map_err(|errno| {
                platform
                    .debug_log_print(&format!("error opening interpreter {interp_path}: {errno}\n"));
                errno
            })?;
        let interp = ElfParsedFile::parse(&interp_file).map_err(|err| {
            platform.debug_log_print(&format!("error parsing interpreter {interp_path}: {err}\n"));
            Errno::from(err)
        })?;
        if interp.interpreter().is_some() {
            // No recursive interpreters.
            platform.debug_log_print(&format!("interpreter {interp_path} requires an interpreter\n"));
            return Err(Errno::ENOEXEC);
        }
        if interp.os() != bin.os() {
            return Err(Errno::ENOEXEC);
        }
        let interp_mapped = interp.load(mm, &interp_file).map_err(|err| {
            platform.debug_log_print(&format!("error mapping interpreter {interp_path}: {err}\n"));
            Errno::from(err)
        })?;
        auxv.insert(AuxKey::AT_BASE, interp_mapped.start);
        entry = interp_mapped.entry;
    } else {
        auxv.insert(AuxKey::AT_BASE, 0);
    }

    Ok(LoadedImage {
        os: bin.os(),
        entry,
        end: bin_mapped.end,
        auxv,
        executable_stack: bin.executable_stack(),
        tls: bin.tls,
    })
}
