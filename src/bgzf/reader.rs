use super::{FIXED_HEADER_SIZE, FOOTER_SIZE, MAGIC, MAX_BLOCK_SIZE, VirtualPosition};
use crate::{Error, Result};
use flate2::read::DeflateDecoder;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::warn;

/// One decompressed block, borrowed from the reader's buffer
#[derive(Debug)]
pub struct Block<'a> {
    position: VirtualPosition,
    data: &'a [u8],
    next: VirtualPosition,
}

impl<'a> Block<'a> {
    /// Virtual position of the first byte of this block
    pub fn position(&self) -> VirtualPosition {
        self.position
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Virtual position of the block that follows
    pub fn next(&self) -> VirtualPosition {
        self.next
    }
}

#[derive(Debug)]
pub enum BlockRead<'a> {
    Block(Block<'a>),
    EndOfStream,
}

/// Random-access BGZF reader.
///
/// Holds exactly one decompressed block in memory. Not meant to be shared
/// between threads; open one reader per consumer instead.
pub struct Reader<R> {
    inner: R,
    block: Vec<u8>,
    compressed: Vec<u8>,
    // Offset of the block currently held in `block`
    block_offset: u64,
    // Offset of the next block to be read from `inner`
    next_block_offset: u64,
    pos: usize,
    eof: bool,
    last_block_empty: bool,
}

impl<R> fmt::Debug for Reader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reader")
            .field("block_offset", &self.block_offset)
            .field("block_len", &self.block.len())
            .field("pos", &self.pos)
            .field("eof", &self.eof)
            .finish_non_exhaustive()
    }
}

impl Reader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| Error::IndexOpen {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read + Seek> Reader<R> {
    /// Wraps a stream positioned at the start of a block.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            block: Vec::new(),
            compressed: Vec::new(),
            block_offset: 0,
            next_block_offset: 0,
            pos: 0,
            eof: false,
            last_block_empty: false,
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Virtual position of the next byte to be consumed.
    ///
    /// A fully consumed block reports the start of the following block.
    pub fn virtual_position(&self) -> VirtualPosition {
        if self.pos < self.block.len() {
            VirtualPosition::from(self.block_offset << 16 | self.pos as u64)
        } else {
            VirtualPosition::from(self.next_block_offset << 16)
        }
    }

    /// Moves to `pos`, discarding the buffered block.
    pub fn seek(&mut self, pos: VirtualPosition) -> Result<()> {
        let offset = pos.compressed();
        self.inner.seek(SeekFrom::Start(offset))?;
        self.next_block_offset = offset;
        self.block_offset = offset;
        self.block.clear();
        self.pos = 0;
        self.eof = false;
        self.last_block_empty = false;

        let within = usize::from(pos.uncompressed());
        if within > 0 {
            if !self.fill_block()? || within > self.block.len() {
                return Err(Error::corrupt(
                    offset,
                    format!("in-block offset {} is past the end of the block", within),
                ));
            }
            self.pos = within;
        }

        Ok(())
    }

    /// Decompresses the next block, dropping whatever is left of the current one.
    pub fn read_block(&mut self) -> Result<BlockRead<'_>> {
        if !self.fill_block()? {
            return Ok(BlockRead::EndOfStream);
        }
        self.pos = self.block.len();

        Ok(BlockRead::Block(Block {
            position: VirtualPosition::from(self.block_offset << 16),
            data: &self.block,
            next: VirtualPosition::from(self.next_block_offset << 16),
        }))
    }

    /// Reads one line into `buf` without its terminator (`\n` or `\r\n`).
    ///
    /// Returns the virtual position of the first byte of the line, or `None`
    /// once the stream is exhausted. Lines may span any number of blocks.
    pub fn read_line(&mut self, buf: &mut Vec<u8>) -> Result<Option<VirtualPosition>> {
        buf.clear();
        let mut start = None;

        loop {
            if self.pos >= self.block.len() {
                if !self.fill_block()? {
                    break;
                }
                continue;
            }

            if start.is_none() {
                start = Some(self.virtual_position());
            }

            let available = &self.block[self.pos..];
            match available.iter().position(|&b| b == b'\n') {
                Some(i) => {
                    buf.extend_from_slice(&available[..i]);
                    self.pos += i + 1;
                    break;
                }
                None => {
                    buf.extend_from_slice(available);
                    self.pos = self.block.len();
                }
            }
        }

        if buf.last() == Some(&b'\r') {
            buf.pop();
        }

        Ok(start)
    }

    /// Loads the next non-empty block into `self.block`.
    ///
    /// Returns `false` at end of stream.
    fn fill_block(&mut self) -> Result<bool> {
        loop {
            if self.eof {
                return Ok(false);
            }

            let offset = self.next_block_offset;
            let mut header = [0u8; FIXED_HEADER_SIZE];
            let n = read_up_to(&mut self.inner, &mut header)?;
            if n == 0 {
                if !self.last_block_empty {
                    warn!(offset, "BGZF stream ended without an EOF marker block");
                }
                self.eof = true;
                self.block.clear();
                self.pos = 0;
                self.block_offset = offset;
                return Ok(false);
            }
            if n < FIXED_HEADER_SIZE {
                return Err(Error::corrupt(offset, "truncated block header"));
            }

            let xlen = check_header(&header).map_err(|reason| Error::corrupt(offset, reason))?;

            let mut extra = vec![0u8; xlen];
            read_block_bytes(&mut self.inner, &mut extra, offset)?;
            let block_size = block_size(&extra).map_err(|reason| Error::corrupt(offset, reason))?;

            let payload_size = block_size
                .checked_sub(FIXED_HEADER_SIZE + xlen + FOOTER_SIZE)
                .ok_or_else(|| {
                    Error::corrupt(offset, format!("block size {} is too small", block_size))
                })?;

            self.compressed.resize(payload_size + FOOTER_SIZE, 0);
            read_block_bytes(&mut self.inner, &mut self.compressed, offset)?;

            let (cdata, footer) = self.compressed.split_at(payload_size);
            let crc = u32::from_le_bytes([footer[0], footer[1], footer[2], footer[3]]);
            let isize = u32::from_le_bytes([footer[4], footer[5], footer[6], footer[7]]) as usize;
            if isize > MAX_BLOCK_SIZE {
                return Err(Error::corrupt(
                    offset,
                    format!("declared uncompressed size {} exceeds 64 KiB", isize),
                ));
            }

            self.block.clear();
            self.block.reserve(isize);
            DeflateDecoder::new(cdata)
                .read_to_end(&mut self.block)
                .map_err(|e| Error::corrupt(offset, format!("inflate failed: {}", e)))?;

            if self.block.len() != isize {
                return Err(Error::corrupt(
                    offset,
                    format!(
                        "uncompressed size {} does not match declared size {}",
                        self.block.len(),
                        isize
                    ),
                ));
            }
            if crc32fast::hash(&self.block) != crc {
                return Err(Error::corrupt(offset, "CRC32 mismatch"));
            }

            self.block_offset = offset;
            self.next_block_offset = offset + block_size as u64;
            self.pos = 0;
            self.last_block_empty = self.block.is_empty();

            if !self.block.is_empty() {
                return Ok(true);
            }
        }
    }
}

/// Validates the fixed gzip header and returns XLEN
fn check_header(header: &[u8; FIXED_HEADER_SIZE]) -> std::result::Result<usize, String> {
    if header[..2] != MAGIC {
        return Err(format!(
            "invalid gzip magic: [{}, {}]",
            header[0], header[1]
        ));
    }
    if header[2] != 8 {
        return Err(format!("unsupported compression method {}", header[2]));
    }
    if header[3] & 0x04 == 0 {
        return Err("missing FEXTRA flag".to_string());
    }
    Ok(u16::from_le_bytes([header[10], header[11]]) as usize)
}

/// Finds the `BC` subfield and returns the total block size
fn block_size(extra: &[u8]) -> std::result::Result<usize, String> {
    let mut pos = 0;
    while pos + 4 <= extra.len() {
        let slen = u16::from_le_bytes([extra[pos + 2], extra[pos + 3]]) as usize;
        if extra[pos] == b'B' && extra[pos + 1] == b'C' && slen == 2 {
            if pos + 6 > extra.len() {
                return Err("incomplete BSIZE subfield".to_string());
            }
            let bsize = u16::from_le_bytes([extra[pos + 4], extra[pos + 5]]);
            return Ok(usize::from(bsize) + 1);
        }
        pos += 4 + slen;
    }
    Err("missing BC subfield".to_string())
}

fn read_block_bytes<R: Read>(reader: &mut R, buf: &mut [u8], offset: u64) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => Error::corrupt(offset, "truncated block"),
        _ => Error::Io(e),
    })
}

/// Like `read_exact`, but reports how much was read at end of file
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
