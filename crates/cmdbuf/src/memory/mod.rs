//! Memory: symbol lookup and address reads over firmware coredumps.
//!
//! A firmware ELF provides symbol addresses, a snapshot (an ELF core or a
//! raw memory blob) provides the bytes. [`MemoryResolver`] combines both to
//! pull command buffers and the render target descriptor out of a crash.

pub mod elf;
pub mod reader;
pub mod resolver;

pub use elf::{ElfError, ElfImage, LoadSegment, Symbol};
pub use reader::{open_snapshot, CoreImage, FlatImage, MemoryRead};
pub use resolver::{
    render_target_format_name, BufferKind, LocatedBuffer, MemoryResolver, RenderTarget, ResolveError,
    SymbolTable,
};
