//! Query handle over a data file and its index.

use crate::bgzf::{self, VirtualPosition};
use crate::cursor::Cursor;
use crate::index::{self, Chunk, Header, Index};
use crate::query::{self, ResolvedQuery};
use crate::record::is_meta_line;
use crate::types::ContigSummary;
use crate::{Error, Result};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const INDEX_EXTENSION: &str = "tbi";

/// An open data file with its loaded index.
///
/// Cheap to clone; the index is shared. Every cursor opens its own file
/// handle, so cursors can be driven from different threads.
#[derive(Debug, Clone)]
pub struct TabixReader {
    data_path: PathBuf,
    index_path: PathBuf,
    index: Arc<Index>,
    header_lines: Arc<Vec<String>>,
    header_end: VirtualPosition,
}

impl TabixReader {
    /// Opens `path` with its co-located index (see [`locate_index`]).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let index_path = locate_index(path).ok_or_else(|| Error::IndexOpen {
            path: default_index_path(path),
            source: io::Error::from(io::ErrorKind::NotFound),
        })?;
        Self::open_with_index(path, index_path)
    }

    pub fn open_with_index<P: AsRef<Path>, Q: AsRef<Path>>(path: P, index_path: Q) -> Result<Self> {
        let data_path = path.as_ref().to_path_buf();
        let index_path = index_path.as_ref().to_path_buf();

        let index = index::load(&index_path)?;
        let (header_lines, header_end) = read_header(&data_path, index.header())?;

        debug!(
            data = %data_path.display(),
            index = %index_path.display(),
            header_lines = header_lines.len(),
            "opened tabix reader"
        );

        Ok(Self {
            data_path,
            index_path,
            index: Arc::new(index),
            header_lines: Arc::new(header_lines),
            header_end,
        })
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn index(&self) -> &Arc<Index> {
        &self.index
    }

    pub fn header(&self) -> &Header {
        self.index.header()
    }

    /// Leading lines skipped as header or comments
    pub fn header_lines(&self) -> &[String] {
        &self.header_lines
    }

    pub fn contigs(&self) -> impl Iterator<Item = &str> {
        self.index.contig_names()
    }

    pub fn summaries(&self) -> Vec<ContigSummary> {
        self.index.summaries()
    }

    /// Records on `contig` overlapping `[begin, end)` (0-based, half-open)
    pub fn query(&self, contig: &str, begin: i64, end: i64) -> Result<Cursor> {
        let resolved = query::resolve(&self.index, contig, begin, end)?;
        self.cursor(resolved)
    }

    pub fn query_by_id(&self, reference_id: usize, begin: i64, end: i64) -> Result<Cursor> {
        let resolved = query::resolve_by_id(&self.index, reference_id, begin, end)?;
        self.cursor(resolved)
    }

    /// Records in a region string such as `chr1:10,000-20,000` (1-based, inclusive)
    pub fn query_region(&self, region: &str) -> Result<Cursor> {
        let resolved = query::resolve_region_string(&self.index, region)?;
        self.cursor(resolved)
    }

    /// Scans an explicit chunk list for records overlapping `[begin, end)`.
    ///
    /// Chunks must be sorted by start. Useful for checking a custom chunk
    /// selection against [`TabixReader::query`].
    pub fn scan_chunks(
        &self,
        reference_id: usize,
        begin: u64,
        end: u64,
        chunks: Vec<Chunk>,
    ) -> Result<Cursor> {
        if self.index.reference_sequence(reference_id).is_none() {
            return Err(Error::UnknownContig(format!("#{}", reference_id)));
        }
        self.cursor(ResolvedQuery {
            reference_id,
            begin,
            end,
            chunks,
        })
    }

    fn cursor(&self, resolved: ResolvedQuery) -> Result<Cursor> {
        Cursor::new(
            &self.data_path,
            Arc::clone(&self.index),
            resolved.reference_id,
            (resolved.begin, resolved.end),
            resolved.chunks,
            self.header_end,
        )
    }
}

/// Conventional index path: the data path with `.tbi` appended
pub fn default_index_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(INDEX_EXTENSION);
    PathBuf::from(name)
}

/// Finds the index for `path`.
///
/// Tries the appended form (`data.bed.gz.tbi`) first, then the replaced form
/// (`data.bed.tbi`) for `.gz`/`.bgz` data files.
pub fn locate_index(path: &Path) -> Option<PathBuf> {
    let appended = default_index_path(path);
    if appended.exists() {
        return Some(appended);
    }

    let compressed = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("gz") | Some("bgz")
    );
    if compressed {
        let replaced = path.with_extension(INDEX_EXTENSION);
        if replaced.exists() {
            return Some(replaced);
        }
    }

    None
}

/// Collects header lines and the position of the first data line
fn read_header(path: &Path, header: &Header) -> Result<(Vec<String>, VirtualPosition)> {
    let mut reader = bgzf::Reader::open(path)?;
    let mut lines = Vec::new();
    let mut buf = Vec::new();
    let mut line_number = 0u64;

    loop {
        let position = reader.virtual_position();
        let Some(start) = reader.read_line(&mut buf)? else {
            return Ok((lines, position));
        };
        line_number += 1;

        if line_number > u64::from(header.skip_lines) && !is_meta_line(header, &buf) {
            return Ok((lines, start));
        }
        lines.push(String::from_utf8_lossy(&buf).into_owned());
    }
}
