use super::{
    Chunk, Header, Index, MAX_COORDINATE, Metadata, ReferenceSequence, linear_window, reg2bin,
};
use crate::bgzf::{self, VirtualPosition};
use crate::record::{is_meta_line, parse_span};
use crate::{Error, Result};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::debug;

/// Builds an index from a BGZF-compressed, sorted data file.
///
/// Header lines (the first `skip_lines` lines and any line starting with the
/// meta character) are ignored. A data line without valid coordinates fails
/// the build.
pub fn build<P: AsRef<Path>>(path: P, header: Header) -> Result<Index> {
    let path = path.as_ref();
    let mut reader = bgzf::Reader::open(path)?;
    let mut indexer = Indexer::new(header.clone());

    let mut buf = Vec::new();
    let mut line_number = 0u64;

    while let Some(start) = reader.read_line(&mut buf)? {
        line_number += 1;
        if line_number <= u64::from(header.skip_lines) || is_meta_line(&header, &buf) {
            continue;
        }
        let end = reader.virtual_position();

        let invalid = |reason: &str| Error::InvalidRecord {
            line: line_number,
            reason: reason.to_string(),
        };
        let line = std::str::from_utf8(&buf).map_err(|_| invalid("invalid UTF-8"))?;
        let span = parse_span(&header, line).map_err(invalid)?;
        if span.end > MAX_COORDINATE {
            return Err(invalid("end coordinate exceeds 2^29"));
        }

        indexer.add_record(span.contig, span.start, span.end, Chunk::new(start, end))?;
    }

    let index = indexer.finish()?;
    debug!(
        path = %path.display(),
        lines = line_number,
        contigs = index.reference_sequences().len(),
        "built tabix index"
    );

    Ok(index)
}

/// Incremental index builder fed with records in file order.
pub struct Indexer {
    header: Header,
    reference_sequences: Vec<ReferenceSequence>,
    seen: HashSet<String>,
    current: Option<ContigBuilder>,
}

impl Indexer {
    pub fn new(header: Header) -> Self {
        Self {
            header,
            reference_sequences: Vec::new(),
            seen: HashSet::new(),
            current: None,
        }
    }

    /// Adds a record spanning `[start, end)` stored at `chunk`.
    ///
    /// Records must arrive grouped by contig and sorted by start.
    pub fn add_record(&mut self, contig: &str, start: u64, end: u64, chunk: Chunk) -> Result<()> {
        if start >= end || end > MAX_COORDINATE {
            return Err(Error::InvalidRegion(format!(
                "{}:{}-{} is outside the indexable range",
                contig, start, end
            )));
        }

        let switch = match &self.current {
            Some(current) => current.name != contig,
            None => true,
        };
        if switch {
            if self.seen.contains(contig) {
                return Err(Error::UnsortedInput(format!(
                    "records for {} are not contiguous",
                    contig
                )));
            }
            if let Some(previous) = self.current.take() {
                self.reference_sequences.push(previous.finish());
            }
            self.seen.insert(contig.to_string());
            self.current = Some(ContigBuilder::new(contig.to_string(), chunk.start()));
        }

        match self.current.as_mut() {
            Some(current) => current.push(start, end, chunk),
            None => Ok(()),
        }
    }

    pub fn finish(mut self) -> Result<Index> {
        if let Some(current) = self.current.take() {
            self.reference_sequences.push(current.finish());
        }
        Index::new(self.header, self.reference_sequences, Some(0))
    }
}

struct ContigBuilder {
    name: String,
    bins: BTreeMap<u32, Vec<Chunk>>,
    intervals: Vec<Option<VirtualPosition>>,
    last_start: u64,
    // Bin of the chunk being grown and where that chunk starts
    open_bin: Option<(u32, VirtualPosition)>,
    first_position: VirtualPosition,
    last_position: VirtualPosition,
    record_count: u64,
}

impl ContigBuilder {
    fn new(name: String, first_position: VirtualPosition) -> Self {
        Self {
            name,
            bins: BTreeMap::new(),
            intervals: Vec::new(),
            last_start: 0,
            open_bin: None,
            first_position,
            last_position: first_position,
            record_count: 0,
        }
    }

    fn push(&mut self, start: u64, end: u64, chunk: Chunk) -> Result<()> {
        if start < self.last_start {
            return Err(Error::UnsortedInput(format!(
                "{}:{} follows {}:{}",
                self.name, start, self.name, self.last_start
            )));
        }
        self.last_start = start;

        let last_window = linear_window(end - 1);
        if self.intervals.len() <= last_window {
            self.intervals.resize(last_window + 1, None);
        }
        for slot in &mut self.intervals[linear_window(start)..=last_window] {
            if slot.is_none() {
                *slot = Some(chunk.start());
            }
        }

        let bin = reg2bin(start, end);
        match self.open_bin {
            Some((open, _)) if open == bin => {}
            Some((open, open_start)) => {
                self.add_chunk(open, Chunk::new(open_start, chunk.start()));
                self.open_bin = Some((bin, chunk.start()));
            }
            None => self.open_bin = Some((bin, chunk.start())),
        }

        self.last_position = chunk.end();
        self.record_count += 1;
        Ok(())
    }

    /// Appends to a bin, extending its last chunk when both touch the same block
    fn add_chunk(&mut self, bin: u32, chunk: Chunk) {
        let chunks = self.bins.entry(bin).or_default();
        if let Some(last) = chunks.last_mut() {
            if last.end().compressed() == chunk.start().compressed() || last.end() == chunk.start() {
                *last = Chunk::new(last.start(), chunk.end());
                return;
            }
        }
        chunks.push(chunk);
    }

    fn finish(mut self) -> ReferenceSequence {
        if let Some((bin, start)) = self.open_bin.take() {
            let end = self.last_position;
            self.add_chunk(bin, Chunk::new(start, end));
        }

        // Empty windows take the offset of the next populated one
        let mut next = self.last_position;
        let mut intervals = vec![VirtualPosition::MIN; self.intervals.len()];
        for (i, slot) in self.intervals.iter().enumerate().rev() {
            if let Some(pos) = slot {
                next = *pos;
            }
            intervals[i] = next;
        }

        let metadata = Metadata {
            start_position: self.first_position,
            end_position: self.last_position,
            mapped_record_count: self.record_count,
            unmapped_record_count: 0,
        };

        ReferenceSequence::new(self.name, self.bins, intervals, Some(metadata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn chunk(start: u64, end: u64) -> Chunk {
        Chunk::new(VirtualPosition::from(start), VirtualPosition::from(end))
    }

    // Offsets in distinct blocks so chunks never merge by block
    fn block(n: u64) -> u64 {
        n << 16
    }

    #[test]
    fn test_contig_table_order() {
        let mut indexer = Indexer::new(Header::default());
        indexer.add_record("chr1", 0, 10, chunk(block(0), block(1))).unwrap();
        indexer.add_record("chr2", 0, 10, chunk(block(1), block(2))).unwrap();
        let index = indexer.finish().unwrap();
        assert_eq!(index.contig_names().collect::<Vec<_>>(), vec!["chr1", "chr2"]);
        assert_eq!(index.unplaced_record_count(), Some(0));
    }

    #[test]
    fn test_unsorted_start_rejected() {
        let mut indexer = Indexer::new(Header::default());
        indexer.add_record("chr1", 100, 110, chunk(block(0), block(1))).unwrap();
        let err = indexer
            .add_record("chr1", 50, 60, chunk(block(1), block(2)))
            .unwrap_err();
        assert!(matches!(err, Error::UnsortedInput(_)));
    }

    #[test]
    fn test_reappearing_contig_rejected() {
        let mut indexer = Indexer::new(Header::default());
        indexer.add_record("chr1", 0, 1, chunk(block(0), block(1))).unwrap();
        indexer.add_record("chr2", 0, 1, chunk(block(1), block(2))).unwrap();
        let err = indexer
            .add_record("chr1", 5, 6, chunk(block(2), block(3)))
            .unwrap_err();
        assert!(matches!(err, Error::UnsortedInput(_)));
    }

    #[test]
    fn test_out_of_range_record_rejected() {
        let mut indexer = Indexer::new(Header::default());
        let err = indexer
            .add_record("chr1", 0, MAX_COORDINATE + 1, chunk(0, 1))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRegion(_)));
    }

    #[test]
    fn test_bins_and_chunks() {
        let mut indexer = Indexer::new(Header::default());
        indexer.add_record("chr1", 100, 200, chunk(block(0), block(1))).unwrap();
        indexer.add_record("chr1", 150, 300, chunk(block(1), block(2))).unwrap();
        // Spans two 16 KiB windows, lands in a level-4 bin
        indexer.add_record("chr1", 16_000, 17_000, chunk(block(2), block(3))).unwrap();
        indexer.add_record("chr1", 40_000, 40_010, chunk(block(3), block(4))).unwrap();
        let index = indexer.finish().unwrap();

        let chr1 = index.reference_sequence(0).unwrap();
        assert_eq!(chr1.bins()[&4681], vec![chunk(block(0), block(2))]);
        assert_eq!(chr1.bins()[&585], vec![chunk(block(2), block(3))]);
        assert_eq!(chr1.bins()[&4683], vec![chunk(block(3), block(4))]);

        let metadata = chr1.metadata().unwrap();
        assert_eq!(metadata.mapped_record_count, 4);
        assert_eq!(metadata.start_position.as_raw(), block(0));
        assert_eq!(metadata.end_position.as_raw(), block(4));
    }

    #[test]
    fn test_linear_index_backfill() {
        let mut indexer = Indexer::new(Header::default());
        indexer.add_record("chr1", 10, 20, chunk(block(0), block(1))).unwrap();
        indexer
            .add_record("chr1", 3 << 14, (3 << 14) + 5, chunk(block(1), block(2)))
            .unwrap();
        let index = indexer.finish().unwrap();

        let intervals = index.reference_sequence(0).unwrap().intervals();
        assert_eq!(
            intervals.iter().map(|p| p.as_raw()).collect::<Vec<_>>(),
            vec![block(0), block(1), block(1), block(1)]
        );
    }

    #[test]
    fn test_chunks_in_same_block_merge() {
        // 585, 4682, then 585 again: the two 585 chunks share block 0
        let mut indexer = Indexer::new(Header::default());
        indexer.add_record("chr1", 100, 20_000, chunk(0, 10)).unwrap();
        indexer.add_record("chr1", 16_400, 16_410, chunk(10, 20)).unwrap();
        indexer.add_record("chr1", 16_450, 40_000, chunk(20, 30)).unwrap();
        let index = indexer.finish().unwrap();

        let chr1 = index.reference_sequence(0).unwrap();
        assert_eq!(chr1.bins()[&585], vec![chunk(0, 30)]);
        assert_eq!(chr1.bins()[&4682], vec![chunk(10, 20)]);
    }

    #[test]
    fn test_chunks_in_different_blocks_stay_apart() {
        let mut indexer = Indexer::new(Header::default());
        indexer.add_record("chr1", 100, 20_000, chunk(block(0), block(1))).unwrap();
        indexer.add_record("chr1", 16_400, 16_410, chunk(block(2), block(3))).unwrap();
        indexer.add_record("chr1", 16_450, 40_000, chunk(block(4), block(5))).unwrap();
        let index = indexer.finish().unwrap();

        let chr1 = index.reference_sequence(0).unwrap();
        assert_eq!(
            chr1.bins()[&585],
            vec![chunk(block(0), block(2)), chunk(block(4), block(5))]
        );
        assert_eq!(chr1.bins()[&4682], vec![chunk(block(2), block(4))]);
    }

    #[test]
    fn test_overflowing_coordinate_fails_build() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overflow.bed.gz");
        let mut writer = bgzf::Writer::new(std::fs::File::create(&path).unwrap());
        writer
            .write_all(b"chr1\t10\t20\nchr1\t18446744073709551615\t5\n")
            .unwrap();
        writer.finish().unwrap();

        match build(&path, Header::from(crate::types::Preset::Bed)).unwrap_err() {
            Error::InvalidRecord { line, reason } => {
                assert_eq!(line, 2);
                assert!(reason.contains("overflow"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
