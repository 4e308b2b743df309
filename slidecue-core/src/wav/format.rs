//! The 16-byte PCM `"fmt "` chunk.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SlidecueError};

/// Only the plain PCM layout is accepted; `WAVE_FORMAT_EXTENSIBLE` and
/// compressed formats are rejected.
pub const FMT_CHUNK_LEN: usize = 16;

/// `WAVE_FORMAT_PCM`.
pub const PCM_FORMAT_ID: u16 = 1;

pub const SUPPORTED_BITS_PER_SAMPLE: u16 = 16;

/// Stream parameters from the `"fmt "` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatDescriptor {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

impl FormatDescriptor {
    /// Parse a 16-byte fmt payload. Fields sit at fixed offsets:
    /// format id @0, channels @2, sample rate @4, bits-per-sample @14.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() != FMT_CHUNK_LEN {
            return Err(SlidecueError::Format(format!(
                "fmt payload must be {FMT_CHUNK_LEN} bytes, got {}",
                payload.len()
            )));
        }

        let format_id = u16::from_le_bytes([payload[0], payload[1]]);
        if format_id != PCM_FORMAT_ID {
            return Err(SlidecueError::Format(format!(
                "unsupported format id {format_id} (only linear PCM)"
            )));
        }

        let descriptor = Self {
            channels: u16::from_le_bytes([payload[2], payload[3]]),
            sample_rate: u32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]),
            bits_per_sample: u16::from_le_bytes([payload[14], payload[15]]),
        };

        if descriptor.bits_per_sample != SUPPORTED_BITS_PER_SAMPLE {
            return Err(SlidecueError::Format(format!(
                "unsupported bits per sample {} (only 16-bit)",
                descriptor.bits_per_sample
            )));
        }
        if !(1..=2).contains(&descriptor.channels) {
            return Err(SlidecueError::Format(format!(
                "unsupported channel count {} (mono or stereo only)",
                descriptor.channels
            )));
        }
        if descriptor.sample_rate == 0 {
            return Err(SlidecueError::Format("sample rate is zero".into()));
        }

        Ok(descriptor)
    }

    /// Bytes per interleaved frame.
    pub fn frame_bytes(&self) -> usize {
        usize::from(self.channels) * usize::from(self.bits_per_sample / 8)
    }
}
