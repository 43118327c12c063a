//! Locate command buffers and the render target inside a memory snapshot.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::elf::{ElfError, ElfImage, Symbol};
use super::reader::{open_snapshot, MemoryRead};
use crate::conf::{ContextLayout, DecoderConfig, Limits};

pub const SYM_BACKUP_KLOGICAL: &str = "backup_command_buffer_klogical";
pub const SYM_BACKUP_PHYSICAL: &str = "backup_command_buffer_physical";
pub const SYM_BACKUP_SIZE: &str = "backup_command_buffer_size";
pub const SYM_INIT_BUFFER: &str = "init_cmd_buffer";
pub const SYM_INIT_SIZE: &str = "init_cmd_buffer_size";
pub const SYM_POWER_CONTEXT: &str = "global_power_context";
pub const SYM_CONTEXT: &str = "s_context";

/// The only symbols the resolver ever looks up.
pub const WANTED_SYMBOLS: [&str; 7] = [
    SYM_BACKUP_KLOGICAL,
    SYM_BACKUP_PHYSICAL,
    SYM_BACKUP_SIZE,
    SYM_INIT_BUFFER,
    SYM_INIT_SIZE,
    SYM_POWER_CONTEXT,
    SYM_CONTEXT,
];

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Symbol file is not usable: {0}")]
    Elf(#[from] ElfError),

    #[error("Memory snapshot is empty")]
    EmptySnapshot,

    #[error("Symbol not found: {0}")]
    MissingSymbol(&'static str),

    #[error("Address 0x{address:08x} (+{len} bytes) is not present in the snapshot")]
    Unmapped { address: u64, len: usize },

    #[error("Implausible {what} size: {size} bytes")]
    ImplausibleSize { what: &'static str, size: u32 },

    #[error("{0} pointer is null")]
    NullPointer(&'static str),

    #[error("Command buffer ring index must be 0 or 1, got {0}")]
    InvalidRing(u8),
}

/// Name → symbol lookup, restricted to [`WANTED_SYMBOLS`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymbolTable {
    symbols: HashMap<String, Symbol>,
}

impl SymbolTable {
    pub fn from_elf(image: &ElfImage<'_>) -> Result<Self, ElfError> {
        let symbols = image
            .find_symbols(&WANTED_SYMBOLS)?
            .into_iter()
            .map(|s| (s.name.clone(), s))
            .collect();
        Ok(Self { symbols })
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn require(&self, name: &'static str) -> Result<&Symbol, ResolveError> {
        self.get(name).ok_or(ResolveError::MissingSymbol(name))
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Symbols sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        let mut all: Vec<&Symbol> = self.symbols.values().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all.into_iter()
    }
}

/// Which command buffer to pull out of the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum BufferKind {
    /// Copy of the last submitted commands.
    Backup,
    /// GPU initialization commands.
    Init,
    /// One of the two command rings of the root context.
    Ring(u8),
}

impl BufferKind {
    /// Segment name used when the buffer is decoded.
    pub fn segment_name(&self) -> String {
        match self {
            BufferKind::Backup => "backup command buffer".to_string(),
            BufferKind::Init => "init command buffer".to_string(),
            BufferKind::Ring(i) => format!("command buffer [{}]", i),
        }
    }
}

impl fmt::Display for BufferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segment_name())
    }
}

/// A command buffer copied out of the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocatedBuffer {
    pub kind: BufferKind,
    pub physical: Option<u32>,
    pub address: u64,
    pub size: u32,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

/// Render target descriptor read from the root context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderTarget {
    /// Descriptor pointer; `None` when only the context dimensions were available.
    pub rtbuffer: Option<u32>,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub format: u16,
    pub format_name: String,
    /// GPU address.
    pub address: u32,
    /// CPU address.
    pub memory: u32,
    #[serde(skip)]
    pub pixels: Option<Vec<u8>>,
}

/// Name of a render target format code. Bits above 10 carry flags.
pub fn render_target_format_name(format: u16) -> String {
    let name = match format & 0x3FF {
        0 => "RGBA8888",
        1 => "BGRA8888",
        2 => "RGBX8888",
        3 => "BGRX8888",
        4 => "RGB565",
        5 => "BGR565",
        6 => "RGBA4444",
        7 => "BGRA4444",
        10 => "A8",
        11 => "L8",
        31 => "ABGR8888",
        32 => "ARGB8888",
        _ => return format!("Unknown({})", format),
    };
    name.to_string()
}

/// Symbols from a firmware image paired with a memory snapshot.
///
/// Read-only once built, so it can be shared across threads.
pub struct MemoryResolver {
    symbols: SymbolTable,
    memory: Box<dyn MemoryRead>,
    layout: ContextLayout,
    limits: Limits,
}

impl fmt::Debug for MemoryResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryResolver")
            .field("symbols", &self.symbols.len())
            .field("strategy", &self.memory.strategy())
            .finish()
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, ResolveError> {
    std::fs::read(path).map_err(|source| ResolveError::Io {
        path: path.to_path_buf(),
        source,
    })
}

impl MemoryResolver {
    pub fn load(elf: &[u8], snapshot: impl Into<Bytes>, config: &DecoderConfig) -> Result<Self, ResolveError> {
        let image = ElfImage::parse(elf)?;
        let symbols = SymbolTable::from_elf(&image)?;
        for symbol in symbols.iter() {
            tracing::info!(
                "Found symbol {} at 0x{:08x} (size {})",
                symbol.name,
                symbol.address,
                symbol.size
            );
        }
        if symbols.is_empty() {
            tracing::warn!("None of the command buffer symbols are present in the symbol file");
        }

        let snapshot = snapshot.into();
        if snapshot.is_empty() {
            return Err(ResolveError::EmptySnapshot);
        }
        let memory = open_snapshot(snapshot);
        tracing::debug!(strategy = memory.strategy(), "Snapshot opened");

        Ok(Self {
            symbols,
            memory,
            layout: config.layout.clone(),
            limits: config.limits.clone(),
        })
    }

    pub fn load_files(
        elf_path: impl AsRef<Path>,
        core_path: impl AsRef<Path>,
        config: &DecoderConfig,
    ) -> Result<Self, ResolveError> {
        let elf = read_file(elf_path.as_ref())?;
        let core = read_file(core_path.as_ref())?;
        Self::load(&elf, core, config)
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn memory(&self) -> &dyn MemoryRead {
        self.memory.as_ref()
    }

    pub fn read(&self, address: u64, len: usize) -> Result<&[u8], ResolveError> {
        self.memory
            .read(address, len)
            .ok_or(ResolveError::Unmapped { address, len })
    }

    fn read_u32(&self, address: u64) -> Result<u32, ResolveError> {
        self.memory
            .read_u32(address)
            .ok_or(ResolveError::Unmapped { address, len: 4 })
    }

    fn context_field(&self, offset: u32) -> Result<u32, ResolveError> {
        let base = self.symbols.require(SYM_CONTEXT)?.address;
        self.read_u32(base + u64::from(offset))
    }

    pub fn locate_command_buffer(&self, kind: BufferKind) -> Result<LocatedBuffer, ResolveError> {
        let located = match kind {
            BufferKind::Backup => self.locate_backup()?,
            BufferKind::Init => self.locate_init()?,
            BufferKind::Ring(index) => self.locate_ring(index)?,
        };
        tracing::info!(
            "Located {} at 0x{:08x} ({} bytes)",
            located.kind,
            located.address,
            located.size
        );
        Ok(located)
    }

    fn locate_backup(&self) -> Result<LocatedBuffer, ResolveError> {
        let klogical = self.symbols.require(SYM_BACKUP_KLOGICAL)?;
        let size_sym = self.symbols.require(SYM_BACKUP_SIZE)?;

        let pointer = self.read_u32(klogical.address)?;
        let size = self.read_u32(size_sym.address)?;
        let physical = self
            .symbols
            .get(SYM_BACKUP_PHYSICAL)
            .and_then(|s| self.memory.read_u32(s.address));

        if size == 0 || size > self.limits.max_command_buffer_size {
            return Err(ResolveError::ImplausibleSize {
                what: "backup command buffer",
                size,
            });
        }
        if pointer == 0 {
            return Err(ResolveError::NullPointer(SYM_BACKUP_KLOGICAL));
        }

        let address = u64::from(pointer);
        let bytes = self.read(address, size as usize)?.to_vec();
        Ok(LocatedBuffer {
            kind: BufferKind::Backup,
            physical,
            address,
            size,
            bytes,
        })
    }

    fn locate_init(&self) -> Result<LocatedBuffer, ResolveError> {
        let buffer = self.symbols.require(SYM_INIT_BUFFER)?;
        let size_sym = self.symbols.require(SYM_INIT_SIZE)?;

        let size = self.read_u32(size_sym.address)?;
        if size == 0 || size > self.limits.max_init_buffer_size {
            return Err(ResolveError::ImplausibleSize {
                what: "init command buffer",
                size,
            });
        }

        let bytes = self.read(buffer.address, size as usize)?.to_vec();
        Ok(LocatedBuffer {
            kind: BufferKind::Init,
            physical: None,
            address: buffer.address,
            size,
            bytes,
        })
    }

    fn locate_ring(&self, index: u8) -> Result<LocatedBuffer, ResolveError> {
        let slot = usize::from(index);
        if slot >= self.layout.command_buffer.len() {
            return Err(ResolveError::InvalidRing(index));
        }

        let pointer = self.context_field(self.layout.command_buffer[slot])?;
        let capacity = self.context_field(self.layout.command_buffer_size)?;
        if pointer == 0 {
            return Err(ResolveError::NullPointer("command_buffer"));
        }
        if capacity == 0 || capacity > self.limits.max_command_buffer_size {
            return Err(ResolveError::ImplausibleSize {
                what: "command ring",
                size: capacity,
            });
        }

        // Only the bytes written so far are meaningful.
        let used = self.context_field(self.layout.command_offset[slot]).unwrap_or(0);
        let size = if used != 0 && used <= capacity { used } else { capacity };

        let address = u64::from(pointer);
        let bytes = self.read(address, size as usize)?.to_vec();
        Ok(LocatedBuffer {
            kind: BufferKind::Ring(index),
            physical: None,
            address,
            size,
            bytes,
        })
    }

    /// Ring the driver was filling when the snapshot was taken.
    pub fn current_ring(&self) -> Option<u8> {
        match self.context_field(self.layout.command_buffer_current) {
            Ok(0) => Some(0),
            Ok(1) => Some(1),
            Ok(other) => {
                tracing::debug!("Unexpected command_buffer_current value {}", other);
                None
            }
            Err(_) => None,
        }
    }

    pub fn locate_render_target(&self, read_pixels: bool) -> Result<RenderTarget, ResolveError> {
        let rtbuffer = self.context_field(self.layout.rtbuffer)?;

        if rtbuffer == 0 {
            let width = self.context_field(self.layout.target_width)?;
            let height = self.context_field(self.layout.target_height)?;
            if width == 0 || height == 0 {
                return Err(ResolveError::NullPointer("rtbuffer"));
            }
            tracing::info!("rtbuffer is null, target size {}x{} from context", width, height);
            return Ok(RenderTarget {
                rtbuffer: None,
                width,
                height,
                ..Default::default()
            });
        }

        let fields = &self.layout.buffer;
        let base = u64::from(rtbuffer);
        let width = self.read_u32(base + u64::from(fields.width))?;
        let height = self.read_u32(base + u64::from(fields.height))?;
        let stride = self.memory.read_u32(base + u64::from(fields.stride)).unwrap_or(0);
        let format = self.memory.read_u16(base + u64::from(fields.format)).unwrap_or(0);
        let memory = self.memory.read_u32(base + u64::from(fields.memory)).unwrap_or(0);
        let address = self.memory.read_u32(base + u64::from(fields.address)).unwrap_or(0);

        let mut target = RenderTarget {
            rtbuffer: Some(rtbuffer),
            width,
            height,
            stride,
            format,
            format_name: render_target_format_name(format),
            address,
            memory,
            pixels: None,
        };

        if read_pixels && memory != 0 && width != 0 && height != 0 && stride != 0 {
            let len = u64::from(stride) * u64::from(height);
            match usize::try_from(len).ok().and_then(|len| self.memory.read(u64::from(memory), len)) {
                Some(pixels) => {
                    tracing::info!("Read {} bytes of render target pixels", pixels.len());
                    target.pixels = Some(pixels.to_vec());
                }
                None => tracing::warn!("Render target pixels at 0x{:08x} are not in the snapshot", memory),
            }
        }

        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::elf::tests::build_elf32;

    const BASE: u32 = 0x2000_0000;

    fn put(mem: &mut [u8], offset: usize, value: u32) {
        mem[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Snapshot with a backup buffer at +0x10 and the root context at +0x100.
    fn fixture() -> (Vec<u8>, Vec<u8>) {
        let mut mem = vec![0u8; 0x1000];
        put(&mut mem, 0x0, BASE + 0x10);
        put(&mut mem, 0x4, 16);
        put(&mut mem, 0x8, 0x8000_0000);
        put(&mut mem, 0x10, 0x3001_0A00);
        put(&mut mem, 0x14, 0x0000_0100);
        put(&mut mem, 0x18, 0x0000_0000);
        put(&mut mem, 0x1C, 0x0000_0000);
        put(&mut mem, 0x40, 8);

        let ctx = 0x100;
        put(&mut mem, ctx + 0x0C8, BASE + 0x10);
        put(&mut mem, ctx + 0x0D0, 16);
        put(&mut mem, ctx + 0x0D4, 8);
        put(&mut mem, ctx + 0x0DC, 1);
        put(&mut mem, ctx + 0x720, BASE + 0x900);

        let rt = 0x900;
        put(&mut mem, rt, 2);
        put(&mut mem, rt + 0x4, 2);
        put(&mut mem, rt + 0x8, 8);
        mem[rt + 0xE..rt + 0x10].copy_from_slice(&(32u16 | 1 << 10).to_le_bytes());
        put(&mut mem, rt + 0x14, BASE + 0xA00);
        put(&mut mem, rt + 0x18, 0x6000_0000);

        let elf = build_elf32(
            &[
                (SYM_BACKUP_KLOGICAL, BASE, 4),
                (SYM_BACKUP_SIZE, BASE + 4, 4),
                (SYM_BACKUP_PHYSICAL, BASE + 8, 4),
                (SYM_INIT_BUFFER, BASE + 0x10, 16),
                (SYM_INIT_SIZE, BASE + 0x40, 4),
                (SYM_CONTEXT, BASE + 0x100, 0x800),
                ("unrelated_symbol", BASE, 4),
            ],
            None,
        );
        let core = build_elf32(&[], Some((BASE, &mem)));
        (elf, core)
    }

    fn resolver() -> MemoryResolver {
        let (elf, core) = fixture();
        MemoryResolver::load(&elf, core, &DecoderConfig::default()).expect("Failed to load resolver")
    }

    #[test]
    fn test_symbol_table_allow_list() {
        let r = resolver();
        assert_eq!(r.symbols().len(), 6);
        assert!(r.symbols().get("unrelated_symbol").is_none());
        assert!(matches!(
            r.symbols().require(SYM_POWER_CONTEXT),
            Err(ResolveError::MissingSymbol(SYM_POWER_CONTEXT))
        ));
    }

    #[test]
    fn test_locate_backup() {
        let buf = resolver().locate_command_buffer(BufferKind::Backup).unwrap();
        assert_eq!(buf.address, u64::from(BASE + 0x10));
        assert_eq!(buf.size, 16);
        assert_eq!(buf.physical, Some(0x8000_0000));
        assert_eq!(&buf.bytes[..4], &0x3001_0A00u32.to_le_bytes());
    }

    #[test]
    fn test_locate_init_reads_at_symbol() {
        let buf = resolver().locate_command_buffer(BufferKind::Init).unwrap();
        assert_eq!(buf.address, u64::from(BASE + 0x10));
        assert_eq!(buf.size, 8);
        assert_eq!(buf.bytes.len(), 8);
    }

    #[test]
    fn test_locate_ring_uses_written_length() {
        let r = resolver();
        let buf = r.locate_command_buffer(BufferKind::Ring(0)).unwrap();
        assert_eq!(buf.size, 8);
        assert_eq!(r.current_ring(), Some(1));
        assert!(matches!(
            r.locate_command_buffer(BufferKind::Ring(2)),
            Err(ResolveError::InvalidRing(2))
        ));
        // Ring 1 pointer is null in the fixture.
        assert!(matches!(
            r.locate_command_buffer(BufferKind::Ring(1)),
            Err(ResolveError::NullPointer(_))
        ));
    }

    #[test]
    fn test_implausible_backup_size() {
        let (elf, mut core) = fixture();
        // Segment data starts right after the ELF header and one phdr.
        let size_at = 52 + 32 + 4;
        core[size_at..size_at + 4].copy_from_slice(&0x20_0000u32.to_le_bytes());
        let r = MemoryResolver::load(&elf, core, &DecoderConfig::default()).unwrap();
        assert!(matches!(
            r.locate_command_buffer(BufferKind::Backup),
            Err(ResolveError::ImplausibleSize { size: 0x20_0000, .. })
        ));
    }

    #[test]
    fn test_render_target_descriptor() {
        let rt = resolver().locate_render_target(false).unwrap();
        assert_eq!(rt.rtbuffer, Some(BASE + 0x900));
        assert_eq!((rt.width, rt.height, rt.stride), (2, 2, 8));
        assert_eq!(rt.format_name, "ARGB8888");
        assert_eq!(rt.address, 0x6000_0000);
        assert!(rt.pixels.is_none());

        let with_pixels = resolver().locate_render_target(true).unwrap();
        assert_eq!(with_pixels.pixels.map(|p| p.len()), Some(16));
    }

    #[test]
    fn test_render_target_falls_back_to_context_size() {
        let (elf, mut core) = fixture();
        let ctx = 52 + 32 + 0x100;
        core[ctx + 0x720..ctx + 0x724].copy_from_slice(&0u32.to_le_bytes());
        core[ctx + 0x7A4..ctx + 0x7A8].copy_from_slice(&466u32.to_le_bytes());
        core[ctx + 0x7A8..ctx + 0x7AC].copy_from_slice(&466u32.to_le_bytes());
        let r = MemoryResolver::load(&elf, core, &DecoderConfig::default()).unwrap();
        let rt = r.locate_render_target(true).unwrap();
        assert_eq!(rt.rtbuffer, None);
        assert_eq!((rt.width, rt.height), (466, 466));
    }

    #[test]
    fn test_format_names() {
        assert_eq!(render_target_format_name(0), "RGBA8888");
        assert_eq!(render_target_format_name(11 | 1 << 10), "L8");
        assert_eq!(render_target_format_name(99), "Unknown(99)");
    }

    #[test]
    fn test_load_rejects_bad_inputs() {
        let (elf, _) = fixture();
        assert!(matches!(
            MemoryResolver::load(b"garbage!garbage!", vec![1u8], &DecoderConfig::default()),
            Err(ResolveError::Elf(_))
        ));
        assert!(matches!(
            MemoryResolver::load(&elf, Vec::new(), &DecoderConfig::default()),
            Err(ResolveError::EmptySnapshot)
        ));
        assert!(matches!(
            MemoryResolver::load_files("/nonexistent/fw.elf", "/nonexistent/core", &DecoderConfig::default()),
            Err(ResolveError::Io { .. })
        ));
    }
}
