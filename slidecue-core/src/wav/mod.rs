//! RIFF/WAVE container reader.
//!
//! ## Layout
//!
//! ```text
//! "RIFF" u32le(size) "WAVE"
//! repeated: tag[4] u32le(size) payload[size]
//! ```
//!
//! Only two chunk types are interpreted: `"fmt "` (must be the 16-byte PCM
//! layout) and `"data"`. Everything else is skipped by its declared size.
//! A short chunk header ends the chunk sequence without error, which is how
//! truncated files and trailing garbage are tolerated.

pub mod format;

use std::borrow::Cow;
use std::io::{self, Read, Seek, SeekFrom};

use tracing::{debug, trace};

pub use format::FormatDescriptor;

use crate::error::{Result, SlidecueError};

/// Size of a chunk header: 4-byte tag + u32 size.
pub const CHUNK_HEADER_LEN: u64 = 8;

/// Offset of the first chunk header (after `"RIFF" size "WAVE"`).
const FIRST_CHUNK_OFFSET: u64 = 12;

/// A chunk header as found in the stream. `offset` is the position of the
/// payload (i.e. just past the header).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub tag: [u8; 4],
    pub size: u32,
    pub offset: u64,
}

impl ChunkHeader {
    pub fn tag_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.tag)
    }

    pub fn is(&self, tag: &[u8; 4]) -> bool {
        &self.tag == tag
    }

    /// Position of the next chunk header.
    fn next_offset(&self) -> u64 {
        self.offset + u64::from(self.size)
    }
}

/// One chunk yielded by [`WaveReader::next_chunk`].
#[derive(Debug)]
pub enum Chunk {
    Format(FormatDescriptor),
    Data(DataChunk),
    Other(ChunkHeader),
}

/// Lazy view over a `"data"` chunk. Blocks are read on demand through the
/// owning [`WaveReader`].
#[derive(Debug, Clone)]
pub struct DataChunk {
    pub header: ChunkHeader,
    pub format: FormatDescriptor,
    position: u64,
    remaining: u64,
}

impl DataChunk {
    fn new(header: ChunkHeader, format: FormatDescriptor) -> Self {
        Self {
            header,
            format,
            position: header.offset,
            remaining: u64::from(header.size),
        }
    }

    /// Read up to `max_frames` interleaved frames.
    ///
    /// Returns `Ok(None)` once the chunk is exhausted. A read whose byte count
    /// is not a whole number of frames ends the sequence and the partial
    /// block is discarded.
    pub fn next_block<R: Read + Seek>(
        &mut self,
        reader: &mut WaveReader<R>,
        max_frames: usize,
    ) -> Result<Option<Vec<i16>>> {
        let frame_bytes = self.format.frame_bytes();
        if self.remaining == 0 || frame_bytes == 0 {
            return Ok(None);
        }

        let want = (max_frames.max(1) * frame_bytes) as u64;
        let len = want.min(self.remaining) as usize;
        let mut buf = vec![0u8; len];

        reader.inner.seek(SeekFrom::Start(self.position))?;
        let read = read_up_to(&mut reader.inner, &mut buf)?;

        if read == 0 || read % frame_bytes != 0 {
            if read != 0 {
                debug!(
                    read,
                    frame_bytes, "data chunk ends mid-frame, dropping final block"
                );
            }
            self.remaining = 0;
            return Ok(None);
        }

        self.position += read as u64;
        self.remaining -= read as u64;

        let samples = buf[..read]
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        Ok(Some(samples))
    }
}

/// Streaming chunk reader over any seekable byte source.
pub struct WaveReader<R> {
    inner: R,
    riff_size: u32,
    next_offset: u64,
    format: Option<FormatDescriptor>,
}

impl<R: Read + Seek> WaveReader<R> {
    /// Validate the RIFF/WAVE preamble.
    ///
    /// # Errors
    /// `SlidecueError::Format` when either magic is missing.
    pub fn new(mut inner: R) -> Result<Self> {
        let mut preamble = [0u8; FIRST_CHUNK_OFFSET as usize];
        inner.seek(SeekFrom::Start(0))?;
        let read = read_up_to(&mut inner, &mut preamble)?;
        if read < preamble.len() {
            return Err(SlidecueError::Format("file shorter than RIFF header".into()));
        }
        if &preamble[0..4] != b"RIFF" {
            return Err(SlidecueError::Format("missing RIFF magic".into()));
        }
        if &preamble[8..12] != b"WAVE" {
            return Err(SlidecueError::Format("missing WAVE magic".into()));
        }
        let riff_size = u32::from_le_bytes([preamble[4], preamble[5], preamble[6], preamble[7]]);

        Ok(Self {
            inner,
            riff_size,
            next_offset: FIRST_CHUNK_OFFSET,
            format: None,
        })
    }

    /// Declared RIFF payload size. Informational only; chunk iteration is
    /// driven by the chunk headers.
    pub fn riff_size(&self) -> u32 {
        self.riff_size
    }

    /// The format descriptor, once the `"fmt "` chunk has been read.
    pub fn format(&self) -> Option<FormatDescriptor> {
        self.format
    }

    /// Read the next chunk header and advance past its payload.
    ///
    /// Returns `Ok(None)` when fewer than 8 header bytes remain.
    pub fn next_chunk(&mut self) -> Result<Option<Chunk>> {
        self.inner.seek(SeekFrom::Start(self.next_offset))?;
        let mut raw = [0u8; CHUNK_HEADER_LEN as usize];
        if read_up_to(&mut self.inner, &mut raw)? != raw.len() {
            return Ok(None);
        }

        let header = ChunkHeader {
            tag: [raw[0], raw[1], raw[2], raw[3]],
            size: u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]),
            offset: self.next_offset + CHUNK_HEADER_LEN,
        };
        self.next_offset = header.next_offset();
        trace!(tag = %header.tag_str(), size = header.size, offset = header.offset, "chunk");

        if header.is(b"fmt ") {
            let format = self.read_format(&header)?;
            self.format = Some(format);
            return Ok(Some(Chunk::Format(format)));
        }

        if header.is(b"data") {
            let format = self.format.ok_or_else(|| {
                SlidecueError::Format("data chunk appears before fmt chunk".into())
            })?;
            return Ok(Some(Chunk::Data(DataChunk::new(header, format))));
        }

        Ok(Some(Chunk::Other(header)))
    }

    fn read_format(&mut self, header: &ChunkHeader) -> Result<FormatDescriptor> {
        if u64::from(header.size) != format::FMT_CHUNK_LEN as u64 {
            return Err(SlidecueError::Format(format!(
                "fmt chunk must be {} bytes, found {}",
                format::FMT_CHUNK_LEN,
                header.size
            )));
        }
        let mut payload = [0u8; format::FMT_CHUNK_LEN];
        self.inner.seek(SeekFrom::Start(header.offset))?;
        if read_up_to(&mut self.inner, &mut payload)? != payload.len() {
            return Err(SlidecueError::Format("truncated fmt chunk".into()));
        }
        FormatDescriptor::parse(&payload)
    }
}

/// `Read::read` until `buf` is full or EOF. Returns the number of bytes read.
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Hand-built container so odd layouts (unknown chunks, bad sizes) can be expressed.
    fn container(chunks: &[(&[u8; 4], Vec<u8>)]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(b"WAVE");
        for (tag, payload) in chunks {
            body.extend_from_slice(*tag);
            body.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            body.extend_from_slice(payload);
        }
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(&body);
        out
    }

    fn pcm_fmt(channels: u16, rate: u32, bits: u16) -> Vec<u8> {
        let mut p = Vec::new();
        p.extend_from_slice(&1u16.to_le_bytes());
        p.extend_from_slice(&channels.to_le_bytes());
        p.extend_from_slice(&rate.to_le_bytes());
        p.extend_from_slice(&(rate * u32::from(channels) * 2).to_le_bytes());
        p.extend_from_slice(&(channels * 2).to_le_bytes());
        p.extend_from_slice(&bits.to_le_bytes());
        p
    }

    fn stereo_bytes(frames: &[(i16, i16)]) -> Vec<u8> {
        frames
            .iter()
            .flat_map(|(l, r)| l.to_le_bytes().into_iter().chain(r.to_le_bytes()))
            .collect()
    }

    fn collect_chunks(bytes: Vec<u8>) -> Result<Vec<Chunk>> {
        let mut reader = WaveReader::new(Cursor::new(bytes))?;
        let mut out = Vec::new();
        while let Some(chunk) = reader.next_chunk()? {
            out.push(chunk);
        }
        Ok(out)
    }

    #[test]
    fn rejects_missing_riff_magic() {
        let mut bytes = container(&[(b"fmt ", pcm_fmt(2, 16_000, 16))]);
        bytes[0..4].copy_from_slice(b"RIFX");
        let err = WaveReader::new(Cursor::new(bytes)).err().expect("must fail");
        assert!(matches!(err, SlidecueError::Format(_)));
    }

    #[test]
    fn rejects_missing_wave_magic() {
        let mut bytes = container(&[]);
        bytes[8..12].copy_from_slice(b"AVI ");
        assert!(matches!(
            WaveReader::new(Cursor::new(bytes)),
            Err(SlidecueError::Format(_))
        ));
    }

    #[test]
    fn skips_unknown_chunks_by_size() {
        let bytes = container(&[
            (b"LIST", vec![0xAA; 26]),
            (b"fmt ", pcm_fmt(2, 8_000, 16)),
            (b"junk", vec![1, 2, 3]),
            (b"data", stereo_bytes(&[(1, 3), (5, 7)])),
        ]);
        let chunks = collect_chunks(bytes).expect("parse");
        assert_eq!(chunks.len(), 4);
        assert!(matches!(&chunks[0], Chunk::Other(h) if h.is(b"LIST") && h.size == 26));
        assert!(matches!(&chunks[1], Chunk::Format(f) if f.sample_rate == 8_000));
        assert!(matches!(&chunks[2], Chunk::Other(h) if h.tag_str() == "junk"));
        assert!(matches!(&chunks[3], Chunk::Data(d) if d.header.size == 8));
    }

    #[test]
    fn partial_trailing_header_ends_sequence() {
        let mut bytes = container(&[(b"fmt ", pcm_fmt(2, 8_000, 16))]);
        bytes.extend_from_slice(b"dat");
        let chunks = collect_chunks(bytes).expect("short header is not an error");
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn data_before_fmt_is_format_error() {
        let bytes = container(&[(b"data", stereo_bytes(&[(0, 0)]))]);
        assert!(matches!(collect_chunks(bytes), Err(SlidecueError::Format(_))));
    }

    #[test]
    fn fmt_chunk_with_extension_is_rejected() {
        let mut fmt = pcm_fmt(2, 8_000, 16);
        fmt.extend_from_slice(&[0, 0]);
        let bytes = container(&[(b"fmt ", fmt)]);
        assert!(matches!(collect_chunks(bytes), Err(SlidecueError::Format(_))));
    }

    #[test]
    fn data_blocks_respect_block_size() {
        let frames: Vec<(i16, i16)> = (0..5).map(|i| (i, -i)).collect();
        let bytes = container(&[
            (b"fmt ", pcm_fmt(2, 8_000, 16)),
            (b"data", stereo_bytes(&frames)),
        ]);
        let mut reader = WaveReader::new(Cursor::new(bytes)).unwrap();
        // "WAVE" + (8 + 16) fmt + (8 + 20) data.
        assert_eq!(reader.riff_size(), 56);
        assert!(reader.format().is_none());
        let mut data = loop {
            match reader.next_chunk().unwrap().expect("data chunk") {
                Chunk::Data(d) => break d,
                _ => continue,
            }
        };
        assert_eq!(reader.format().map(|f| f.sample_rate), Some(8_000));

        let first = data.next_block(&mut reader, 2).unwrap().unwrap();
        assert_eq!(first, vec![0, 0, 1, -1]);
        let second = data.next_block(&mut reader, 2).unwrap().unwrap();
        assert_eq!(second, vec![2, -2, 3, -3]);
        let third = data.next_block(&mut reader, 2).unwrap().unwrap();
        assert_eq!(third, vec![4, -4]);
        assert!(data.next_block(&mut reader, 2).unwrap().is_none());
    }

    #[test]
    fn truncated_final_block_is_dropped() {
        // Declared size covers 3 frames, file only holds 2.5 of them.
        let mut payload = stereo_bytes(&[(10, 10), (20, 20), (30, 30)]);
        payload.truncate(10);
        let mut bytes = container(&[(b"fmt ", pcm_fmt(2, 8_000, 16))]);
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&12u32.to_le_bytes());
        bytes.extend_from_slice(&payload);

        let mut reader = WaveReader::new(Cursor::new(bytes)).unwrap();
        let mut data = loop {
            if let Chunk::Data(d) = reader.next_chunk().unwrap().expect("data") {
                break d;
            }
        };
        // One block of 3 frames reads 10 bytes: not a whole frame count.
        assert!(data.next_block(&mut reader, 3).unwrap().is_none());
    }
}
