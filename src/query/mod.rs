//! Interval resolution: genomic range to BGZF chunks.
//!
//! Given a contig and a 0-based half-open interval, the resolver collects
//! the chunks of every bin that could hold an overlapping record, drops
//! chunks that end before the linear index floor, and coalesces the rest into
//! as few sorted scan ranges as possible.

use crate::index::{Chunk, Index, MAX_COORDINATE, ReferenceSequence, reg2bins};
use crate::types::Region;
use crate::{Error, Result};
use tracing::debug;

/// A query resolved against an index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedQuery {
    pub reference_id: usize,
    pub begin: u64,
    pub end: u64,
    pub chunks: Vec<Chunk>,
}

/// Clamps `[begin, end)` to `[0, 2^29)`; `None` if nothing is left
pub fn clamp_interval(begin: i64, end: i64) -> Option<(u64, u64)> {
    let begin = begin.max(0) as u64;
    let end = end.clamp(0, MAX_COORDINATE as i64) as u64;
    (begin < end).then_some((begin, end))
}

/// Resolves a query by contig name.
pub fn resolve(index: &Index, contig: &str, begin: i64, end: i64) -> Result<ResolvedQuery> {
    let reference_id = index
        .reference_id(contig)
        .ok_or_else(|| Error::UnknownContig(contig.to_string()))?;
    resolve_by_id(index, reference_id, begin, end)
}

/// Resolves a query by dense contig id.
pub fn resolve_by_id(
    index: &Index,
    reference_id: usize,
    begin: i64,
    end: i64,
) -> Result<ResolvedQuery> {
    let reference = index
        .reference_sequence(reference_id)
        .ok_or_else(|| Error::UnknownContig(format!("#{}", reference_id)))?;

    let Some((begin, end)) = clamp_interval(begin, end) else {
        return Ok(ResolvedQuery {
            reference_id,
            begin: 0,
            end: 0,
            chunks: Vec::new(),
        });
    };

    let chunks = coalesce(candidates(reference, begin, end));
    debug!(
        contig = reference.name(),
        begin,
        end,
        chunks = chunks.len(),
        "resolved query"
    );

    Ok(ResolvedQuery {
        reference_id,
        begin,
        end,
        chunks,
    })
}

/// Resolves `contig`, `contig:begin` or `contig:begin-end` (1-based, inclusive).
///
/// A string that exactly matches a contig name is a whole-contig query, so
/// names containing `:` still work.
pub fn resolve_region_string(index: &Index, region: &str) -> Result<ResolvedQuery> {
    let region = match index.reference_id(region) {
        Some(_) => Region::whole(region),
        None => Region::parse(region)?,
    };
    resolve_region(index, &region)
}

pub fn resolve_region(index: &Index, region: &Region) -> Result<ResolvedQuery> {
    let begin = region.start.map_or(0, saturating_i64);
    let end = region.end.map_or(MAX_COORDINATE as i64, saturating_i64);
    resolve(index, &region.reference_name, begin, end)
}

fn saturating_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Chunks that may hold records overlapping `[begin, end)`, sorted by start
/// and not coalesced.
///
/// Requires `begin < end <= 2^29`.
pub fn candidates(reference: &ReferenceSequence, begin: u64, end: u64) -> Vec<Chunk> {
    let floor = reference.min_offset(begin);

    let mut chunks: Vec<Chunk> = reg2bins(begin, end)
        .into_iter()
        .filter_map(|bin| reference.bins().get(&bin))
        .flatten()
        .filter(|chunk| chunk.end() > floor)
        .copied()
        .collect();

    chunks.sort_by_key(|chunk| (chunk.start(), chunk.end()));
    chunks
}

/// Merges sorted chunks that overlap, or that end and start in the same block.
pub fn coalesce(chunks: Vec<Chunk>) -> Vec<Chunk> {
    let mut merged: Vec<Chunk> = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        match merged.last_mut() {
            Some(last)
                if chunk.start() <= last.end()
                    || chunk.start().compressed() == last.end().compressed() =>
            {
                if chunk.end() > last.end() {
                    *last = Chunk::new(last.start(), chunk.end());
                }
            }
            _ => merged.push(chunk),
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgzf::VirtualPosition;
    use crate::index::{Header, Indexer};

    fn chunk(start: u64, end: u64) -> Chunk {
        Chunk::new(VirtualPosition::from(start), VirtualPosition::from(end))
    }

    fn block(n: u64) -> u64 {
        n << 16
    }

    fn scenario_index() -> Index {
        let mut indexer = Indexer::new(Header::default());
        indexer.add_record("chr1", 100, 200, chunk(block(0), block(1))).unwrap();
        indexer.add_record("chr1", 150, 300, chunk(block(1), block(2))).unwrap();
        indexer.add_record("chr1", 500, 600, chunk(block(2), block(3))).unwrap();
        indexer.add_record("chr1", 1 << 20, (1 << 20) + 10, chunk(block(3), block(4))).unwrap();
        indexer.add_record("chr2", 10, 20, chunk(block(4), block(5))).unwrap();
        indexer.finish().unwrap()
    }

    #[test]
    fn test_clamp_interval() {
        assert_eq!(clamp_interval(-5, 10), Some((0, 10)));
        assert_eq!(clamp_interval(10, 10), None);
        assert_eq!(clamp_interval(10, 5), None);
        assert_eq!(clamp_interval(-10, -1), None);
        assert_eq!(clamp_interval(0, i64::MAX), Some((0, MAX_COORDINATE)));
    }

    #[test]
    fn test_empty_interval_resolves_to_nothing() {
        let index = scenario_index();
        for (begin, end) in [(200, 200), (300, 100), (-20, 0)] {
            let resolved = resolve(&index, "chr1", begin, end).unwrap();
            assert!(resolved.chunks.is_empty());
        }
    }

    #[test]
    fn test_unknown_contig() {
        let index = scenario_index();
        assert!(matches!(
            resolve(&index, "chr3", 1, 10),
            Err(Error::UnknownContig(_))
        ));
        assert!(matches!(
            resolve_by_id(&index, 7, 1, 10),
            Err(Error::UnknownContig(_))
        ));
        assert!(matches!(
            resolve_region_string(&index, "chr3:1-10"),
            Err(Error::UnknownContig(_))
        ));
    }

    #[test]
    fn test_resolve_by_name_and_id_agree() {
        let index = scenario_index();
        let by_name = resolve(&index, "chr2", 0, 100).unwrap();
        let by_id = resolve_by_id(&index, 1, 0, 100).unwrap();
        assert_eq!(by_name, by_id);
        assert_eq!(by_name.chunks, vec![chunk(block(4), block(5))]);
    }

    #[test]
    fn test_linear_floor_drops_early_chunks() {
        let index = scenario_index();
        let resolved = resolve(&index, "chr1", 1 << 20, (1 << 20) + 1).unwrap();
        assert_eq!(resolved.chunks, vec![chunk(block(3), block(4))]);
    }

    #[test]
    fn test_region_string_forms() {
        let index = scenario_index();

        let bounded = resolve_region_string(&index, "chr1:120-160").unwrap();
        assert_eq!((bounded.begin, bounded.end), (119, 160));

        let open = resolve_region_string(&index, "chr1:500").unwrap();
        assert_eq!((open.begin, open.end), (499, MAX_COORDINATE));

        let whole = resolve_region_string(&index, "chr1").unwrap();
        assert_eq!((whole.begin, whole.end), (0, MAX_COORDINATE));
        assert_eq!(whole.chunks, vec![chunk(block(0), block(4))]);
    }

    #[test]
    fn test_contig_name_with_colon() {
        let mut indexer = Indexer::new(Header::default());
        indexer.add_record("HLA-A*01:01", 0, 10, chunk(0, 10)).unwrap();
        let index = indexer.finish().unwrap();

        let resolved = resolve_region_string(&index, "HLA-A*01:01").unwrap();
        assert_eq!(resolved.reference_id, 0);
        assert_eq!(resolved.chunks.len(), 1);

        let bounded = resolve_region_string(&index, "HLA-A*01:01:1-5").unwrap();
        assert_eq!((bounded.begin, bounded.end), (0, 5));
    }

    #[test]
    fn test_coalesce_overlapping_and_same_block() {
        let chunks = vec![
            chunk(block(0), block(1)),
            chunk(block(0) + 5, block(0) + 10),
            chunk(block(1) + 3, block(2)),
            chunk(block(4), block(5)),
        ];
        assert_eq!(
            coalesce(chunks),
            vec![chunk(block(0), block(2)), chunk(block(4), block(5))]
        );
        assert!(coalesce(Vec::new()).is_empty());
    }

    #[test]
    fn test_candidates_are_sorted() {
        let index = scenario_index();
        let chr1 = index.reference_sequence(0).unwrap();
        let chunks = candidates(chr1, 0, MAX_COORDINATE);
        assert!(chunks.windows(2).all(|w| w[0].start() <= w[1].start()));
    }
}
