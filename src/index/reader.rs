use super::{Header, Index, MAGIC, METADATA_BIN, Metadata, ReferenceSequence, ZERO_BASED_FLAG};
use super::Chunk;
use crate::bgzf::{self, BlockRead, VirtualPosition};
use crate::types::FileFormat;
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Reads a tabix index from disk.
///
/// Accepts both the usual BGZF-compressed form and raw TBI bytes.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Index> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|source| Error::IndexOpen {
        path: path.to_path_buf(),
        source,
    })?;

    let mut raw = Vec::new();
    file.read_to_end(&mut raw)?;

    let bytes = if raw.starts_with(&bgzf::MAGIC) {
        decompress(raw)?
    } else {
        raw
    };

    let index = parse(&bytes)?;
    debug!(
        path = %path.display(),
        contigs = index.reference_sequences().len(),
        "loaded tabix index"
    );

    Ok(index)
}

fn decompress(raw: Vec<u8>) -> Result<Vec<u8>> {
    let mut reader = bgzf::Reader::new(std::io::Cursor::new(raw));
    let mut out = Vec::new();
    loop {
        match reader.read_block() {
            Ok(BlockRead::Block(block)) => out.extend_from_slice(block.data()),
            Ok(BlockRead::EndOfStream) => return Ok(out),
            Err(e) => return Err(Error::BadIndex(format!("unreadable index container: {}", e))),
        }
    }
}

/// Parses uncompressed TBI bytes
pub fn parse(bytes: &[u8]) -> Result<Index> {
    if bytes.len() < MAGIC.len() || &bytes[..MAGIC.len()] != MAGIC {
        return Err(Error::IndexFormat(format!(
            "expected magic {:?}, got {:?}",
            MAGIC,
            &bytes[..bytes.len().min(MAGIC.len())]
        )));
    }

    let mut input = Input {
        buf: bytes,
        pos: MAGIC.len(),
    };

    let n_ref = input.read_count("n_ref")?;
    let format_code = input.read_i32("format")?;
    let format = FileFormat::from_code(format_code & 0xffff).ok_or_else(|| {
        Error::IndexFormat(format!("unknown format code {}", format_code & 0xffff))
    })?;
    let col_seq = input.read_column("col_seq")?;
    let col_beg = input.read_column("col_beg")?;
    let col_end = input.read_count("col_end")?;
    let meta = input.read_i32("meta")?;
    let skip = input.read_count("skip")?;

    let header = Header {
        format,
        zero_based: format_code & ZERO_BASED_FLAG != 0,
        col_seq,
        col_beg,
        col_end: (col_end > 0).then_some(col_end),
        meta_char: meta as u8,
        skip_lines: skip as u32,
    };

    let l_nm = input.read_count("l_nm")?;
    let names = parse_names(input.take(l_nm, "contig names")?)?;
    if names.len() != n_ref {
        return Err(Error::BadIndex(format!(
            "header declares {} contigs but {} names are present",
            n_ref,
            names.len()
        )));
    }

    let mut reference_sequences = Vec::with_capacity(n_ref);
    for name in names {
        reference_sequences.push(read_reference_sequence(&mut input, name)?);
    }

    let unplaced_record_count = match input.remaining() {
        0 => None,
        8 => Some(input.read_u64("n_no_coor")?),
        n => {
            return Err(Error::BadIndex(format!(
                "{} unexpected trailing bytes",
                n
            )));
        }
    };

    Index::new(header, reference_sequences, unplaced_record_count)
}

fn read_reference_sequence(input: &mut Input<'_>, name: String) -> Result<ReferenceSequence> {
    let n_bin = input.read_count("n_bin")?;
    // Each bin needs at least a bin number and a chunk count
    input.check_len(n_bin, 8, "bins")?;

    let mut bins: BTreeMap<u32, Vec<Chunk>> = BTreeMap::new();
    let mut metadata = None;

    for _ in 0..n_bin {
        let bin = input.read_u32("bin")?;
        let n_chunk = input.read_count("n_chunk")?;
        input.check_len(n_chunk, 16, "chunks")?;

        let mut chunks = Vec::with_capacity(n_chunk);
        for _ in 0..n_chunk {
            let start = VirtualPosition::from(input.read_u64("chunk start")?);
            let end = VirtualPosition::from(input.read_u64("chunk end")?);
            chunks.push(Chunk::new(start, end));
        }

        if bin == METADATA_BIN {
            if chunks.len() != 2 {
                return Err(Error::BadIndex(format!(
                    "metadata bin of {} has {} chunks, expected 2",
                    name,
                    chunks.len()
                )));
            }
            metadata = Some(Metadata {
                start_position: chunks[0].start(),
                end_position: chunks[0].end(),
                mapped_record_count: chunks[1].start().as_raw(),
                unmapped_record_count: chunks[1].end().as_raw(),
            });
        } else {
            bins.entry(bin).or_default().extend(chunks);
        }
    }

    let n_intv = input.read_count("n_intv")?;
    input.check_len(n_intv, 8, "linear index")?;
    let mut intervals = Vec::with_capacity(n_intv);
    for _ in 0..n_intv {
        intervals.push(VirtualPosition::from(input.read_u64("linear offset")?));
    }

    Ok(ReferenceSequence::new(name, bins, intervals, metadata))
}

fn parse_names(buf: &[u8]) -> Result<Vec<String>> {
    if buf.is_empty() {
        return Ok(Vec::new());
    }
    let Some(body) = buf.strip_suffix(&[0]) else {
        return Err(Error::BadIndex(
            "contig names are not NUL-terminated".to_string(),
        ));
    };

    body.split(|&b| b == 0)
        .map(|name| {
            String::from_utf8(name.to_vec())
                .map_err(|e| Error::BadIndex(format!("invalid UTF-8 in contig name: {}", e)))
        })
        .collect()
}

/// Bounds-checked little-endian reader over the index bytes
struct Input<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Input<'a> {
    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize, section: &str) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(Error::BadIndex(format!(
                "{} needs {} bytes but only {} remain",
                section,
                n,
                self.remaining()
            )));
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Fails early when `count` items of `size` bytes cannot fit
    fn check_len(&self, count: usize, size: usize, section: &str) -> Result<()> {
        match count.checked_mul(size) {
            Some(n) if n <= self.remaining() => Ok(()),
            _ => Err(Error::BadIndex(format!(
                "{} declares {} entries but only {} bytes remain",
                section,
                count,
                self.remaining()
            ))),
        }
    }

    fn read_i32(&mut self, section: &str) -> Result<i32> {
        let b = self.take(4, section)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_u32(&mut self, section: &str) -> Result<u32> {
        let b = self.take(4, section)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_u64(&mut self, section: &str) -> Result<u64> {
        let b = self.take(8, section)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(u64::from_le_bytes(raw))
    }

    /// Non-negative i32
    fn read_count(&mut self, section: &str) -> Result<usize> {
        let n = self.read_i32(section)?;
        usize::try_from(n).map_err(|_| Error::BadIndex(format!("negative {}: {}", section, n)))
    }

    /// 1-based column number
    fn read_column(&mut self, section: &str) -> Result<usize> {
        match self.read_count(section)? {
            0 => Err(Error::BadIndex(format!("{} must be at least 1", section))),
            n => Ok(n),
        }
    }
}
