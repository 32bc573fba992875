//! Fixed-size character chunks decoded from an archive entry.
//!
//! [`Utf8Decoder`] is fed raw bytes in whatever pieces they arrive and cuts
//! the decoded text into chunks of exactly `chunk_size` characters (the last
//! one may be shorter). A multi-byte character that straddles two pieces is
//! carried over, so chunk boundaries always fall between characters.
//! [`ChunkSource`] drives a decoder from any [`Read`].

use std::io::{ErrorKind, Read};
use std::mem;

use crate::error::{Error, Result};

/// Default number of characters per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 512;

/// Smallest accepted chunk size.
const MIN_CHUNK_SIZE: usize = 1;

/// Smallest read buffer; always holds one complete UTF-8 character.
const MIN_READ_SIZE: usize = 4;

/// Characters read in one call.
///
/// The backing buffer may be longer than the filled count; only the first
/// [`len`](Chunk::len) characters are valid.
#[derive(Debug, Clone)]
pub struct Chunk {
    buf: Box<[char]>,
    filled: usize,
}

impl Chunk {
    pub fn new(buf: Box<[char]>, filled: usize) -> Self {
        let filled = filled.min(buf.len());
        Self { buf, filled }
    }

    pub fn as_chars(&self) -> &[char] {
        &self.buf[..self.filled]
    }

    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }
}

impl From<&str> for Chunk {
    fn from(text: &str) -> Self {
        let buf: Box<[char]> = text.chars().collect();
        let filled = buf.len();
        Self { buf, filled }
    }
}

/// Incremental UTF-8 decoder producing character chunks.
#[derive(Debug)]
pub struct Utf8Decoder {
    chunk_size: usize,
    /// Leading bytes of a character whose remaining bytes have not arrived.
    carried: Vec<u8>,
    /// Characters of the chunk being filled.
    chars: Vec<char>,
    /// Entry offset of the first carried byte.
    offset: u64,
}

impl Utf8Decoder {
    pub fn new(chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(MIN_CHUNK_SIZE);
        Self {
            chunk_size,
            carried: Vec::with_capacity(MIN_READ_SIZE),
            chars: Vec::with_capacity(chunk_size),
            offset: 0,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Decode the next piece of the entry, appending every full chunk to `out`.
    pub fn decode(&mut self, bytes: &[u8], out: &mut Vec<Chunk>) -> Result<()> {
        let joined;
        let input = if self.carried.is_empty() {
            bytes
        } else {
            joined = [self.carried.as_slice(), bytes].concat();
            joined.as_slice()
        };

        let valid = match std::str::from_utf8(input) {
            Ok(_) => input.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(e) => {
                return Err(Error::InvalidUtf8 {
                    offset: self.offset + e.valid_up_to() as u64,
                });
            }
        };

        let text = std::str::from_utf8(&input[..valid]).unwrap_or_default();
        for c in text.chars() {
            self.chars.push(c);
            if self.chars.len() == self.chunk_size {
                out.push(self.take_chunk());
            }
        }

        self.offset += valid as u64;
        self.carried = input[valid..].to_vec();
        Ok(())
    }

    /// Flush the last, possibly short, chunk once the entry has ended.
    ///
    /// A character still incomplete at this point is `InvalidUtf8`.
    pub fn finish(&mut self, out: &mut Vec<Chunk>) -> Result<()> {
        if !self.carried.is_empty() {
            return Err(Error::InvalidUtf8 {
                offset: self.offset,
            });
        }
        if !self.chars.is_empty() {
            out.push(self.take_chunk());
        }
        Ok(())
    }

    fn take_chunk(&mut self) -> Chunk {
        let chars = mem::replace(&mut self.chars, Vec::with_capacity(self.chunk_size));
        let filled = chars.len();
        Chunk::new(chars.into_boxed_slice(), filled)
    }
}

/// Reads an entry's bytes and yields chunks of `chunk_size` characters.
pub struct ChunkSource<R> {
    reader: R,
    decoder: Utf8Decoder,
    buf: Vec<u8>,
    /// Decoded chunks not handed out yet, oldest first.
    ready: Vec<Chunk>,
    eof: bool,
}

impl<R: Read> ChunkSource<R> {
    pub fn new(reader: R, chunk_size: usize) -> Self {
        let decoder = Utf8Decoder::new(chunk_size);
        Self {
            reader,
            buf: vec![0u8; decoder.chunk_size().max(MIN_READ_SIZE)],
            decoder,
            ready: Vec::new(),
            eof: false,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.decoder.chunk_size()
    }

    /// Read the next chunk, or `None` once the entry is exhausted.
    ///
    /// Never yields an empty chunk.
    pub fn next_chunk(&mut self) -> Result<Option<Chunk>> {
        while self.ready.is_empty() && !self.eof {
            match self.reader.read(&mut self.buf) {
                Ok(0) => {
                    self.eof = true;
                    self.decoder.finish(&mut self.ready)?;
                }
                Ok(n) => self.decoder.decode(&self.buf[..n], &mut self.ready)?,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
            self.ready.reverse();
        }
        Ok(self.ready.pop())
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Iterates chunks until the entry ends or a read fails.
impl<R: Read> Iterator for ChunkSource<R> {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_chunk().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Returns at most `step` bytes per read.
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    fn collect(source: ChunkSource<impl Read>) -> Vec<String> {
        source
            .map(|chunk| chunk.unwrap().as_chars().iter().collect())
            .collect()
    }

    #[test]
    fn splits_into_fixed_chunks() {
        let source = ChunkSource::new("abcdefghij".as_bytes(), 4);
        assert_eq!(collect(source), vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn multibyte_characters_survive_read_boundaries() {
        let text = "Зарегистрированные ККТ – 東京";
        let source = ChunkSource::new(
            Trickle {
                data: text.as_bytes(),
                step: 1,
            },
            5,
        );
        let chunks = collect(source);
        assert!(chunks.iter().all(|c| c.chars().count() <= 5));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn chunks_are_sized_in_characters() {
        let text = "ЖжЖжЖжЖжЖжЖжЖжЖжЖжЖжЖ";
        let source = ChunkSource::new(text.as_bytes(), 8);
        let sizes: Vec<usize> = collect(source).iter().map(|c| c.chars().count()).collect();
        assert_eq!(sizes, vec![8, 8, 3]);
    }

    #[test]
    fn decoder_carries_split_characters() {
        let bytes = "aé東".as_bytes();
        let mut decoder = Utf8Decoder::new(2);
        let mut out = Vec::new();
        for byte in bytes {
            decoder.decode(std::slice::from_ref(byte), &mut out).unwrap();
        }
        decoder.finish(&mut out).unwrap();
        let chunks: Vec<String> = out.iter().map(|c| c.as_chars().iter().collect()).collect();
        assert_eq!(chunks, vec!["aé", "東"]);
    }

    #[test]
    fn empty_entry_has_no_chunks() {
        let mut source = ChunkSource::new(&b""[..], DEFAULT_CHUNK_SIZE);
        assert!(source.next_chunk().unwrap().is_none());
        assert!(source.next_chunk().unwrap().is_none());
    }

    #[test]
    fn invalid_utf8_reports_offset() {
        let mut source = ChunkSource::new(&b"ab\xffcd"[..], 16);
        assert!(matches!(
            source.next_chunk(),
            Err(Error::InvalidUtf8 { offset: 2 })
        ));
    }

    #[test]
    fn invalid_utf8_offset_counts_earlier_pieces() {
        let mut decoder = Utf8Decoder::new(16);
        let mut out = Vec::new();
        decoder.decode("héllo".as_bytes(), &mut out).unwrap();
        assert!(matches!(
            decoder.decode(b"x\xc3(", &mut out),
            Err(Error::InvalidUtf8 { offset: 7 })
        ));
    }

    #[test]
    fn truncated_character_at_end_is_invalid() {
        let bytes = "ok й".as_bytes();
        let mut source = ChunkSource::new(&bytes[..bytes.len() - 1], 16);
        assert!(matches!(
            source.next_chunk(),
            Err(Error::InvalidUtf8 { offset: 3 })
        ));
    }

    #[test]
    fn chunk_ignores_unfilled_tail() {
        let chunk = Chunk::new(vec!['a', 'b', 'x', 'x'].into_boxed_slice(), 2);
        assert_eq!(chunk.as_chars(), &['a', 'b']);
        assert_eq!(chunk.capacity(), 4);
        assert_eq!(Chunk::from("hé").len(), 2);
    }

    #[test]
    fn zero_chunk_size_is_clamped() {
        let source = ChunkSource::new("東京".as_bytes(), 0);
        assert_eq!(source.chunk_size(), MIN_CHUNK_SIZE);
        assert_eq!(collect(source), vec!["東", "京"]);
    }
}
