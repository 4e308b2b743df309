//! Mono sample streaming over WAV sources.
//!
//! # Design constraints
//!
//! The detector stages need the whole file twice (envelope statistics, then
//! detection), and the file may be hours long. Rather than loading it, a
//! [`SampleSource`] hands out a fresh, finite iterator of bounded
//! [`SampleBlock`]s on every call. Each call re-reads the file exactly once,
//! in order.
//!
//! Stereo frames are downmixed by integer averaging with truncation toward
//! zero, so `mono[i] == (left[i] + right[i]) / 2` for every frame.

pub mod block;

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

pub use block::SampleBlock;

use crate::error::Result;
use crate::wav::{Chunk, DataChunk, WaveReader};

/// Boxed block iterator handed out by [`SampleSource::blocks`].
pub type BlockIter<'a> = Box<dyn Iterator<Item = Result<SampleBlock>> + Send + 'a>;

/// A restartable producer of mono sample blocks.
pub trait SampleSource: Send + Sync {
    /// Start a new pass over the audio.
    ///
    /// # Errors
    /// Container errors detected before the first block (bad magic) are
    /// returned here; later errors surface as `Err` items.
    fn blocks(&self) -> Result<BlockIter<'_>>;
}

/// Collaborator that reports the length of a rendered media file.
///
/// Implementations may block (file reads, external probes).
pub trait MediaDurationProvider {
    fn duration_secs(&self) -> Result<f64>;
}

/// Downmix interleaved frames to mono.
///
/// Mono input is passed through unchanged; stereo frames are averaged with
/// integer division.
pub fn downmix(interleaved: &[i16], channels: u16) -> Vec<i16> {
    match channels {
        2 => interleaved
            .chunks_exact(2)
            .map(|frame| ((i32::from(frame[0]) + i32::from(frame[1])) / 2) as i16)
            .collect(),
        _ => interleaved.to_vec(),
    }
}

/// Pull-based mono block iterator over a WAV byte stream.
pub struct MonoSampleStream<R> {
    reader: WaveReader<R>,
    data: Option<DataChunk>,
    /// Frames per block. `None` = one second of audio per block.
    block_frames: Option<usize>,
    finished: bool,
}

impl<R: Read + Seek> MonoSampleStream<R> {
    pub fn new(inner: R, block_frames: Option<usize>) -> Result<Self> {
        Ok(Self {
            reader: WaveReader::new(inner)?,
            data: None,
            block_frames,
            finished: false,
        })
    }

    fn next_block(&mut self) -> Result<Option<SampleBlock>> {
        loop {
            if let Some(data) = self.data.as_mut() {
                let format = data.format;
                let frames = self
                    .block_frames
                    .unwrap_or(format.sample_rate as usize)
                    .max(1);
                match data.next_block(&mut self.reader, frames)? {
                    Some(interleaved) => {
                        return Ok(Some(SampleBlock::new(
                            downmix(&interleaved, format.channels),
                            format.sample_rate,
                            format.bits_per_sample,
                        )));
                    }
                    None => self.data = None,
                }
            }

            match self.reader.next_chunk()? {
                Some(Chunk::Data(data)) => {
                    debug!(
                        size = data.header.size,
                        channels = data.format.channels,
                        sample_rate = data.format.sample_rate,
                        "streaming data chunk"
                    );
                    self.data = Some(data);
                }
                Some(_) => continue,
                None => return Ok(None),
            }
        }
    }
}

impl<R: Read + Seek> Iterator for MonoSampleStream<R> {
    type Item = Result<SampleBlock>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_block() {
            Ok(Some(block)) => Some(Ok(block)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

/// A WAV file on disk. Every pass reopens the file.
#[derive(Debug, Clone)]
pub struct WaveFile {
    path: PathBuf,
    block_frames: Option<usize>,
}

impl WaveFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            block_frames: None,
        }
    }

    /// Override the default one-second block size.
    pub fn with_block_frames(mut self, frames: usize) -> Self {
        self.block_frames = Some(frames.max(1));
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SampleSource for WaveFile {
    fn blocks(&self) -> Result<BlockIter<'_>> {
        let file = BufReader::new(File::open(&self.path)?);
        Ok(Box::new(MonoSampleStream::new(file, self.block_frames)?))
    }
}

impl MediaDurationProvider for WaveFile {
    fn duration_secs(&self) -> Result<f64> {
        total_duration(self)
    }
}

/// An in-memory WAV image.
#[derive(Debug, Clone)]
pub struct WaveBytes {
    bytes: Arc<[u8]>,
    block_frames: Option<usize>,
}

impl WaveBytes {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
            block_frames: None,
        }
    }

    pub fn with_block_frames(mut self, frames: usize) -> Self {
        self.block_frames = Some(frames.max(1));
        self
    }
}

impl SampleSource for WaveBytes {
    fn blocks(&self) -> Result<BlockIter<'_>> {
        let cursor = Cursor::new(Arc::clone(&self.bytes));
        Ok(Box::new(MonoSampleStream::new(cursor, self.block_frames)?))
    }
}

impl MediaDurationProvider for WaveBytes {
    fn duration_secs(&self) -> Result<f64> {
        total_duration(self)
    }
}

/// Sum of block durations over one full pass.
pub fn total_duration(source: &dyn SampleSource) -> Result<f64> {
    let mut total = 0.0;
    for block in source.blocks()? {
        total += block?.duration_secs();
    }
    Ok(total)
}
