/// log2 of the finest bin and linear window size (16 KiB)
pub const MIN_SHIFT: u32 = 14;

/// Number of levels below the root bin
pub const DEPTH: u32 = 5;

/// Coordinates must be below 2^29
pub const MAX_COORDINATE: u64 = 1 << (MIN_SHIFT + 3 * DEPTH);

/// Pseudo-bin holding per-contig metadata
pub const METADATA_BIN: u32 = 37450;

/// First bin number at `level` (0 = root)
fn level_offset(level: u32) -> u64 {
    ((1 << (3 * level)) - 1) / 7
}

fn level_shift(level: u32) -> u32 {
    MIN_SHIFT + 3 * (DEPTH - level)
}

/// Smallest bin that fully contains `[beg, end)`.
///
/// Requires `beg < end <= MAX_COORDINATE`.
pub fn reg2bin(beg: u64, end: u64) -> u32 {
    let end = end - 1;
    for level in (1..=DEPTH).rev() {
        let shift = level_shift(level);
        if beg >> shift == end >> shift {
            return (level_offset(level) + (beg >> shift)) as u32;
        }
    }
    0
}

/// Every bin that may hold a record overlapping `[beg, end)`, root first.
///
/// Requires `beg < end <= MAX_COORDINATE`.
pub fn reg2bins(beg: u64, end: u64) -> Vec<u32> {
    let end = end - 1;
    let mut bins = vec![0];
    for level in 1..=DEPTH {
        let shift = level_shift(level);
        let offset = level_offset(level);
        for k in (beg >> shift)..=(end >> shift) {
            bins.push((offset + k) as u32);
        }
    }
    bins
}

/// Linear index window containing `pos`
pub fn linear_window(pos: u64) -> usize {
    (pos >> MIN_SHIFT) as usize
}
