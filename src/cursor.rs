//! Lazy record iteration over resolved chunks.

use crate::bgzf::{self, VirtualPosition};
use crate::index::{Chunk, Index};
use crate::record::{is_meta_line, parse_span};
use crate::{Error, Result};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Outcome of [`Cursor::advance`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    Record(String),
    EndOfStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ready,
    Scanning,
    Exhausted,
    Poisoned,
    Closed,
}

enum Verdict {
    Keep(String),
    Skip,
    Stop,
}

/// Forward-only iterator over the lines overlapping one query.
///
/// Each cursor owns its own file handle and decode buffer; the index is
/// shared read-only. After an error, or after [`Cursor::close`], every call
/// to [`Cursor::advance`] fails with [`Error::InvalidCursor`].
pub struct Cursor {
    reader: Option<bgzf::Reader<BufReader<File>>>,
    index: Arc<Index>,
    reference_id: usize,
    begin: u64,
    end: u64,
    chunks: Vec<Chunk>,
    next_chunk: usize,
    chunk_end: VirtualPosition,
    // Lines starting before this position belong to the file header
    header_end: VirtualPosition,
    state: State,
    line: Vec<u8>,
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("reference_id", &self.reference_id)
            .field("interval", &(self.begin, self.end))
            .field("chunks", &self.chunks.len())
            .field("next_chunk", &self.next_chunk)
            .field("state", &self.state)
            .field("reader", &self.reader)
            .finish_non_exhaustive()
    }
}

impl Cursor {
    pub(crate) fn new(
        data_path: &Path,
        index: Arc<Index>,
        reference_id: usize,
        (begin, end): (u64, u64),
        chunks: Vec<Chunk>,
        header_end: VirtualPosition,
    ) -> Result<Self> {
        let reader = bgzf::Reader::open(data_path)?;

        Ok(Self {
            reader: Some(reader),
            index,
            reference_id,
            begin,
            end,
            chunks,
            next_chunk: 0,
            chunk_end: VirtualPosition::MIN,
            header_end,
            state: State::Ready,
            line: Vec::new(),
        })
    }

    /// Query interval, 0-based half-open
    pub fn interval(&self) -> (u64, u64) {
        (self.begin, self.end)
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == State::Exhausted
    }

    /// Yields the next overlapping line, or `EndOfStream` once done.
    pub fn advance(&mut self) -> Result<Advance> {
        match self.state {
            State::Poisoned => {
                return Err(Error::InvalidCursor("cursor failed on an earlier call"));
            }
            State::Closed => return Err(Error::InvalidCursor("cursor is closed")),
            State::Exhausted => return Ok(Advance::EndOfStream),
            State::Ready | State::Scanning => {}
        }

        let Some(mut reader) = self.reader.take() else {
            self.state = State::Poisoned;
            return Err(Error::InvalidCursor("cursor has no open stream"));
        };

        match self.scan(&mut reader) {
            Ok(advance) => {
                if self.state == State::Exhausted {
                    self.line = Vec::new();
                } else {
                    self.reader = Some(reader);
                }
                Ok(advance)
            }
            Err(e) => {
                self.state = State::Poisoned;
                self.line = Vec::new();
                Err(e)
            }
        }
    }

    /// Releases the file handle and buffers.
    pub fn close(&mut self) {
        self.reader = None;
        self.line = Vec::new();
        self.state = State::Closed;
    }

    fn scan(&mut self, reader: &mut bgzf::Reader<BufReader<File>>) -> Result<Advance> {
        loop {
            if self.state == State::Ready || reader.virtual_position() >= self.chunk_end {
                if !self.next_range(reader)? {
                    self.state = State::Exhausted;
                    return Ok(Advance::EndOfStream);
                }
            }

            let Some(line_start) = reader.read_line(&mut self.line)? else {
                self.state = State::Exhausted;
                return Ok(Advance::EndOfStream);
            };

            match self.check_line(line_start) {
                Verdict::Keep(line) => return Ok(Advance::Record(line)),
                Verdict::Skip => continue,
                Verdict::Stop => {
                    self.state = State::Exhausted;
                    return Ok(Advance::EndOfStream);
                }
            }
        }
    }

    /// Moves to the next chunk that extends past the current position.
    ///
    /// Never moves backwards, so overlapping chunks cannot yield a line twice.
    fn next_range(&mut self, reader: &mut bgzf::Reader<BufReader<File>>) -> Result<bool> {
        let current = match self.state {
            State::Ready => None,
            _ => Some(reader.virtual_position()),
        };
        self.state = State::Scanning;

        while let Some(chunk) = self.chunks.get(self.next_chunk).copied() {
            self.next_chunk += 1;
            match current {
                Some(pos) if chunk.end() <= pos => continue,
                Some(pos) if chunk.start() <= pos => {}
                _ => reader.seek(chunk.start())?,
            }
            self.chunk_end = chunk.end();
            return Ok(true);
        }

        Ok(false)
    }

    fn check_line(&self, line_start: VirtualPosition) -> Verdict {
        let header = self.index.header();
        if line_start < self.header_end || is_meta_line(header, &self.line) {
            return Verdict::Skip;
        }

        let Ok(line) = std::str::from_utf8(&self.line) else {
            debug!(position = %line_start, "skipping line with invalid UTF-8");
            return Verdict::Skip;
        };

        let span = match parse_span(header, line) {
            Ok(span) => span,
            Err(reason) => {
                debug!(position = %line_start, reason, "skipping malformed line");
                return Verdict::Skip;
            }
        };

        let contig = self
            .index
            .reference_sequence(self.reference_id)
            .map(|r| r.name());
        if contig != Some(span.contig) || span.start >= self.end {
            // Input is sorted: nothing further can overlap
            return Verdict::Stop;
        }
        if span.end <= self.begin {
            return Verdict::Skip;
        }

        Verdict::Keep(line.to_string())
    }
}

impl Iterator for Cursor {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if matches!(self.state, State::Poisoned | State::Closed) {
            return None;
        }
        match self.advance() {
            Ok(Advance::Record(line)) => Some(Ok(line)),
            Ok(Advance::EndOfStream) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
