//! BGZF block container.
//!
//! BGZF is a series of concatenated gzip members ("blocks"), each at most
//! 64 KiB compressed and 64 KiB uncompressed. Every block carries its own
//! total size in a `BC` extra subfield, so a reader can jump to any block
//! boundary and decompress it in isolation.
//!
//! # Virtual positions
//!
//! A [`VirtualPosition`] packs the file offset of a block (high 48 bits)
//! and a byte offset inside the decompressed block (low 16 bits).
//!
//! # Block layout
//!
//! - Bytes 0-1: gzip magic (31, 139)
//! - Byte 2: CM = 8 (deflate), byte 3: FLG with FEXTRA (4) set
//! - Bytes 10-11: XLEN
//! - Extra subfields, including SI1='B', SI2='C', SLEN=2, BSIZE (block size - 1)
//! - Raw deflate payload, then CRC32 and ISIZE of the uncompressed data
//!
//! The stream ends with an empty 28-byte block ([`EOF_MARKER`]).
//!
//! Blocks are written with noodles' [`Writer`]; its virtual positions convert
//! into [`VirtualPosition`] with `From`.

mod reader;
mod virtual_position;

pub use noodles::bgzf::Writer;
pub use reader::{Block, BlockRead, Reader};
pub use virtual_position::VirtualPosition;

/// Gzip member magic bytes
pub const MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Largest compressed block allowed by the format
pub const MAX_BLOCK_SIZE: usize = 65536;

/// Empty block terminating every well-formed stream
pub const EOF_MARKER: [u8; 28] = [
    0x1f, 0x8b, 0x08, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0x06, 0x00, 0x42, 0x43, 0x02,
    0x00, 0x1b, 0x00, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

// Fixed gzip header up to and including XLEN
const FIXED_HEADER_SIZE: usize = 12;
// CRC32 + ISIZE
const FOOTER_SIZE: usize = 8;
