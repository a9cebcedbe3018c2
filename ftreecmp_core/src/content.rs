use ftreecmp_common::{IgnoreRange, DEFAULT_CHUNK_SIZE};
use std::io::{self, Read};
use std::ops::Range;

/// Which of the two compared streams an I/O error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Old,
    New,
}

/// A read failure on one side of a content comparison
#[derive(Debug)]
pub struct ReadError {
    pub side: Side,
    pub source: io::Error,
}

/// One ignore range per stream, applied identically to every chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskPair {
    pub old: IgnoreRange,
    pub new: IgnoreRange,
}

/// Streamed byte-equality check between two readers
#[derive(Debug, Clone)]
pub struct ContentComparator {
    chunk_size: usize,
}

impl Default for ContentComparator {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl ContentComparator {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Compare two streams chunk by chunk.
    ///
    /// Returns `Ok(true)` when both reach end of input at the same offset with
    /// identical (masked) contents. A read error is returned as `Err`, never as
    /// a difference.
    pub fn same_content<O: Read, N: Read>(
        &self,
        old: &mut O,
        new: &mut N,
        mask: Option<MaskPair>,
    ) -> Result<bool, ReadError> {
        let mut old_buf = vec![0u8; self.chunk_size];
        let mut new_buf = vec![0u8; self.chunk_size];
        let mut offset = 0u64;

        loop {
            let old_len = read_chunk(old, &mut old_buf).map_err(|source| ReadError {
                side: Side::Old,
                source,
            })?;
            let new_len = read_chunk(new, &mut new_buf).map_err(|source| ReadError {
                side: Side::New,
                source,
            })?;

            if old_len != new_len {
                return Ok(false);
            }
            if old_len == 0 {
                return Ok(true);
            }

            if let Some(mask) = mask {
                mask_chunk(&mut old_buf[..old_len], offset, &mask.old);
                mask_chunk(&mut new_buf[..new_len], offset, &mask.new);
            }

            if old_buf[..old_len] != new_buf[..new_len] {
                return Ok(false);
            }

            offset += old_len as u64;
        }
    }
}

/// Fill `buf` as far as the stream allows; a short count means end of input.
fn read_chunk<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
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

/// Part of a chunk starting at `chunk_offset` covered by `range`, as buffer indices
fn chunk_overlap(chunk_offset: u64, chunk_len: usize, range: &IgnoreRange) -> Option<Range<usize>> {
    let chunk_end = chunk_offset + chunk_len as u64;
    let start = range.offset.max(chunk_offset);
    let end = range.end().min(chunk_end);
    if start >= end {
        return None;
    }
    Some((start - chunk_offset) as usize..(end - chunk_offset) as usize)
}

fn mask_chunk(chunk: &mut [u8], chunk_offset: u64, range: &IgnoreRange) {
    if let Some(overlap) = chunk_overlap(chunk_offset, chunk.len(), range) {
        chunk[overlap].fill(0);
    }
}
