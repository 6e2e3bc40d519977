//! Tabix (TBI) index: contig table, binning index and linear index.
//!
//! # Layout
//!
//! All integers are little-endian; the whole file is BGZF-compressed.
//!
//! - Magic: `TBI\1`
//! - `n_ref`, `format`, `col_seq`, `col_beg`, `col_end`, `meta`, `skip`, `l_nm` (i32)
//! - Contig names, each NUL-terminated (`l_nm` bytes in total)
//! - Per contig:
//!   - `n_bin` (i32), then per bin: `bin` (u32), `n_chunk` (i32), chunks as `u64` pairs
//!   - `n_intv` (i32), then `n_intv` linear offsets (u64)
//! - Optional: number of records without coordinates (u64)
//!
//! The low 16 bits of `format` select [`FileFormat`]; bit 16 marks
//! 0-based half-open coordinates (otherwise 1-based closed).

mod binning;
mod indexer;
mod reader;
mod writer;

pub use binning::{
    DEPTH, MAX_COORDINATE, METADATA_BIN, MIN_SHIFT, linear_window, reg2bin, reg2bins,
};
pub use indexer::{Indexer, build};
pub use reader::{load, parse};
pub use writer::{to_bytes, write};

use crate::bgzf::VirtualPosition;
use crate::types::{ContigSummary, FileFormat, Preset};
use crate::{Error, Result};
use std::collections::{BTreeMap, HashMap};

pub(crate) const MAGIC: &[u8; 4] = b"TBI\x01";

/// Flag in the format field for 0-based half-open coordinates
pub(crate) const ZERO_BASED_FLAG: i32 = 0x10000;

/// Describes how data lines are laid out.
///
/// Column numbers are 1-based, as stored in the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub format: FileFormat,
    pub zero_based: bool,
    pub col_seq: usize,
    pub col_beg: usize,
    pub col_end: Option<usize>,
    pub meta_char: u8,
    pub skip_lines: u32,
}

impl Default for Header {
    fn default() -> Self {
        Self::from(Preset::default())
    }
}

impl From<Preset> for Header {
    fn from(preset: Preset) -> Self {
        match preset {
            Preset::Gff => Self {
                format: FileFormat::Generic,
                zero_based: false,
                col_seq: 1,
                col_beg: 4,
                col_end: Some(5),
                meta_char: b'#',
                skip_lines: 0,
            },
            Preset::Bed => Self {
                format: FileFormat::Generic,
                zero_based: true,
                col_seq: 1,
                col_beg: 2,
                col_end: Some(3),
                meta_char: b'#',
                skip_lines: 0,
            },
            Preset::Sam => Self {
                format: FileFormat::Sam,
                zero_based: false,
                col_seq: 3,
                col_beg: 4,
                col_end: None,
                meta_char: b'@',
                skip_lines: 0,
            },
            Preset::Vcf => Self {
                format: FileFormat::Vcf,
                zero_based: false,
                col_seq: 1,
                col_beg: 2,
                col_end: None,
                meta_char: b'#',
                skip_lines: 0,
            },
        }
    }
}

impl Header {
    /// Format field as stored in the index
    pub(crate) fn format_code(&self) -> i32 {
        let flags = if self.zero_based { ZERO_BASED_FLAG } else { 0 };
        self.format.code() | flags
    }
}

/// Span of a BGZF stream, `[start, end)` in virtual positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Chunk {
    start: VirtualPosition,
    end: VirtualPosition,
}

impl Chunk {
    pub fn new(start: VirtualPosition, end: VirtualPosition) -> Self {
        Self { start, end }
    }

    pub fn start(&self) -> VirtualPosition {
        self.start
    }

    pub fn end(&self) -> VirtualPosition {
        self.end
    }
}

/// Summary stored in the pseudo-bin of each contig
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    pub start_position: VirtualPosition,
    pub end_position: VirtualPosition,
    pub mapped_record_count: u64,
    pub unmapped_record_count: u64,
}

/// Binning and linear index of one contig
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReferenceSequence {
    name: String,
    bins: BTreeMap<u32, Vec<Chunk>>,
    intervals: Vec<VirtualPosition>,
    metadata: Option<Metadata>,
}

impl ReferenceSequence {
    pub fn new(
        name: String,
        bins: BTreeMap<u32, Vec<Chunk>>,
        intervals: Vec<VirtualPosition>,
        metadata: Option<Metadata>,
    ) -> Self {
        Self {
            name,
            bins,
            intervals,
            metadata,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bins(&self) -> &BTreeMap<u32, Vec<Chunk>> {
        &self.bins
    }

    /// Linear index: smallest record offset per 16 KiB window
    pub fn intervals(&self) -> &[VirtualPosition] {
        &self.intervals
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    /// Lowest virtual position a record overlapping `begin` can start at
    pub fn min_offset(&self, begin: u64) -> VirtualPosition {
        let window = linear_window(begin);
        match self.intervals.get(window) {
            Some(&pos) => pos,
            None => self.intervals.last().copied().unwrap_or(VirtualPosition::MIN),
        }
    }
}

/// A loaded tabix index. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    header: Header,
    reference_sequences: Vec<ReferenceSequence>,
    names: HashMap<String, usize>,
    unplaced_record_count: Option<u64>,
}

impl Index {
    pub fn new(
        header: Header,
        reference_sequences: Vec<ReferenceSequence>,
        unplaced_record_count: Option<u64>,
    ) -> Result<Self> {
        let mut names = HashMap::with_capacity(reference_sequences.len());
        for (id, reference) in reference_sequences.iter().enumerate() {
            if names.insert(reference.name.clone(), id).is_some() {
                return Err(Error::BadIndex(format!(
                    "duplicate contig name: {}",
                    reference.name
                )));
            }
        }

        Ok(Self {
            header,
            reference_sequences,
            names,
            unplaced_record_count,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn reference_sequences(&self) -> &[ReferenceSequence] {
        &self.reference_sequences
    }

    pub fn reference_sequence(&self, id: usize) -> Option<&ReferenceSequence> {
        self.reference_sequences.get(id)
    }

    /// Dense contig id for a (case-sensitive) contig name
    pub fn reference_id(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    pub fn contig_names(&self) -> impl Iterator<Item = &str> {
        self.reference_sequences.iter().map(|r| r.name())
    }

    pub fn unplaced_record_count(&self) -> Option<u64> {
        self.unplaced_record_count
    }

    pub fn summaries(&self) -> Vec<ContigSummary> {
        self.reference_sequences
            .iter()
            .enumerate()
            .map(|(id, reference)| ContigSummary {
                id,
                name: reference.name.clone(),
                records: reference.metadata.map(|m| m.mapped_record_count),
                bins: reference.bins.len(),
            })
            .collect()
    }
}
