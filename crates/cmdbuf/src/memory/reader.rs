//! Random-access reads by virtual address over a memory snapshot.

use bytes::Bytes;

use super::elf::{ElfImage, LoadSegment};

/// Capability shared by every snapshot flavor.
pub trait MemoryRead: Send + Sync {
    /// `len` bytes at `address`, or `None` when the range is not backed.
    fn read(&self, address: u64, len: usize) -> Option<&[u8]>;

    /// Name of the strategy, for logs and reports.
    fn strategy(&self) -> &'static str;

    fn read_u16(&self, address: u64) -> Option<u16> {
        let raw: [u8; 2] = self.read(address, 2)?.try_into().ok()?;
        Some(u16::from_le_bytes(raw))
    }

    fn read_u32(&self, address: u64) -> Option<u32> {
        let raw: [u8; 4] = self.read(address, 4)?.try_into().ok()?;
        Some(u32::from_le_bytes(raw))
    }
}

fn direct(data: &[u8], offset: u64, len: usize) -> Option<&[u8]> {
    let start = usize::try_from(offset).ok()?;
    let end = start.checked_add(len)?;
    data.get(start..end)
}

/// ELF core snapshot: addresses are translated through PT_LOAD segments,
/// falling back to a direct file offset for unmapped addresses.
pub struct CoreImage {
    data: Bytes,
    segments: Vec<LoadSegment>,
}

impl CoreImage {
    pub fn new(data: Bytes, segments: Vec<LoadSegment>) -> Self {
        Self { data, segments }
    }

    pub fn segments(&self) -> &[LoadSegment] {
        &self.segments
    }
}

impl MemoryRead for CoreImage {
    fn read(&self, address: u64, len: usize) -> Option<&[u8]> {
        for segment in &self.segments {
            if let Some(offset) = segment.translate(address, len) {
                if let Some(bytes) = direct(&self.data, offset, len) {
                    return Some(bytes);
                }
            }
        }
        direct(&self.data, address, len)
    }

    fn strategy(&self) -> &'static str {
        "core"
    }
}

/// Bare memory blob: an address is a byte offset into the file.
pub struct FlatImage {
    data: Bytes,
}

impl FlatImage {
    pub fn new(data: Bytes) -> Self {
        Self { data }
    }
}

impl MemoryRead for FlatImage {
    fn read(&self, address: u64, len: usize) -> Option<&[u8]> {
        direct(&self.data, address, len)
    }

    fn strategy(&self) -> &'static str {
        "flat"
    }
}

/// Pick the read strategy for `snapshot` once, up front.
///
/// A snapshot that parses as ELF with at least one LOAD segment is a core
/// image; anything else is treated as a flat memory blob.
pub fn open_snapshot(snapshot: Bytes) -> Box<dyn MemoryRead> {
    let segments = match ElfImage::parse(&snapshot) {
        Ok(image) => image.load_segments().to_vec(),
        Err(e) => {
            tracing::warn!("Snapshot is not an ELF core ({}), reading it as a flat memory dump", e);
            Vec::new()
        }
    };

    if segments.is_empty() {
        Box::new(FlatImage::new(snapshot))
    } else {
        tracing::info!(segments = segments.len(), "Mapped snapshot LOAD segments");
        for segment in segments.iter().take(10) {
            tracing::debug!(
                "LOAD vaddr=0x{:08x} filesz=0x{:x} offset=0x{:x}",
                segment.vaddr,
                segment.file_size,
                segment.file_offset
            );
        }
        Box::new(CoreImage::new(snapshot, segments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::elf::tests::build_elf32;

    #[test]
    fn test_flat_reads_by_offset() {
        let flat = FlatImage::new(Bytes::from_static(&[0x78, 0x56, 0x34, 0x12, 0xAA]));
        assert_eq!(flat.read_u32(0), Some(0x1234_5678));
        assert_eq!(flat.read_u16(3), Some(0xAA12));
        assert_eq!(flat.read(2, 4), None);
        assert_eq!(flat.read(u64::MAX, 1), None);
    }

    #[test]
    fn test_core_translates_then_falls_back() {
        let payload = 0xCAFE_F00Du32.to_le_bytes();
        let image = build_elf32(&[], Some((0x2000_0000, &payload)));
        let core = open_snapshot(Bytes::from(image.clone()));
        assert_eq!(core.strategy(), "core");
        assert_eq!(core.read_u32(0x2000_0000), Some(0xCAFE_F00D));

        // Reads past the segment's file bytes do not translate.
        assert_eq!(core.read(0x2000_0002, 4), None);

        // Unmapped low addresses read the file directly.
        assert_eq!(core.read(0, 4), Some(&image[0..4]));
    }

    #[test]
    fn test_non_elf_snapshot_is_flat() {
        let reader = open_snapshot(Bytes::from_static(b"not an elf at all"));
        assert_eq!(reader.strategy(), "flat");
        assert_eq!(reader.read(4, 2), Some(&b"an"[..]));
    }

    #[test]
    fn test_elf_without_segments_is_flat() {
        let image = build_elf32(&[("s_context", 0, 0)], None);
        let reader = open_snapshot(Bytes::from(image));
        assert_eq!(reader.strategy(), "flat");
    }
}
