use super::{Index, MAGIC, METADATA_BIN};
use crate::Result;
use crate::bgzf;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Writes `index` to `path` as a BGZF-compressed TBI file.
pub fn write<P: AsRef<Path>>(index: &Index, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;

    let mut writer = bgzf::Writer::new(BufWriter::new(file));
    writer.write_all(&to_bytes(index))?;
    writer.finish()?.flush()?;

    debug!(path = %path.display(), "wrote tabix index");
    Ok(())
}

/// Serializes `index` to uncompressed TBI bytes
pub fn to_bytes(index: &Index) -> Vec<u8> {
    let header = index.header();
    let mut buf = Vec::new();

    buf.extend_from_slice(MAGIC);
    put_i32(&mut buf, index.reference_sequences().len() as i32);
    put_i32(&mut buf, header.format_code());
    put_i32(&mut buf, header.col_seq as i32);
    put_i32(&mut buf, header.col_beg as i32);
    put_i32(&mut buf, header.col_end.unwrap_or(0) as i32);
    put_i32(&mut buf, i32::from(header.meta_char));
    put_i32(&mut buf, header.skip_lines as i32);

    let mut names = Vec::new();
    for name in index.contig_names() {
        names.extend_from_slice(name.as_bytes());
        names.push(0);
    }
    put_i32(&mut buf, names.len() as i32);
    buf.extend_from_slice(&names);

    for reference in index.reference_sequences() {
        let n_bin = reference.bins().len() + usize::from(reference.metadata().is_some());
        put_i32(&mut buf, n_bin as i32);

        for (&bin, chunks) in reference.bins() {
            put_u32(&mut buf, bin);
            put_i32(&mut buf, chunks.len() as i32);
            for chunk in chunks {
                put_u64(&mut buf, chunk.start().as_raw());
                put_u64(&mut buf, chunk.end().as_raw());
            }
        }

        if let Some(metadata) = reference.metadata() {
            put_u32(&mut buf, METADATA_BIN);
            put_i32(&mut buf, 2);
            put_u64(&mut buf, metadata.start_position.as_raw());
            put_u64(&mut buf, metadata.end_position.as_raw());
            put_u64(&mut buf, metadata.mapped_record_count);
            put_u64(&mut buf, metadata.unmapped_record_count);
        }

        put_i32(&mut buf, reference.intervals().len() as i32);
        for interval in reference.intervals() {
            put_u64(&mut buf, interval.as_raw());
        }
    }

    if let Some(n) = index.unplaced_record_count() {
        put_u64(&mut buf, n);
    }

    buf
}

fn put_i32(buf: &mut Vec<u8>, n: i32) {
    buf.extend_from_slice(&n.to_le_bytes());
}

fn put_u32(buf: &mut Vec<u8>, n: u32) {
    buf.extend_from_slice(&n.to_le_bytes());
}

fn put_u64(buf: &mut Vec<u8>, n: u64) {
    buf.extend_from_slice(&n.to_le_bytes());
}
