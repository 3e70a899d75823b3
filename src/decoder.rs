//! Waveform container decoding
//!
//! This module parses RIFF/WAVE byte buffers into typed sample matrices.
//! - PCM (encoding tag 1) at 8, 16, and 32 bits, plus 32-bit IEEE float (tag 3)
//! - 8-bit samples are unsigned on the wire and re-biased so silence decodes to 0
//! - Multi-channel frames are de-interleaved into one column per channel
//!
//! Parsing is pure: the decoder never touches the filesystem beyond the
//! convenience `decode_file` entry point.

use std::path::Path;

use crate::error::ConvertError;
use crate::types::{AudioStream, SampleMatrix, SampleWidth};

const ENCODING_PCM: u16 = 1;
const ENCODING_IEEE_FLOAT: u16 = 3;

/// Decoder for RIFF/WAVE recordings
pub struct WavDecoder;

impl WavDecoder {
    /// Decode a complete WAVE byte buffer into an [`AudioStream`]
    pub fn decode(bytes: &[u8]) -> Result<AudioStream, ConvertError> {
        let mut cursor = ByteCursor::new(bytes);

        if cursor.take(4)? != b"RIFF" {
            return Err(ConvertError::Decode("missing RIFF header".to_string()));
        }
        cursor.read_u32_le()?; // declared RIFF payload size, unused
        if cursor.take(4)? != b"WAVE" {
            return Err(ConvertError::Decode("not a WAVE container".to_string()));
        }

        let mut format: Option<FormatChunk> = None;

        loop {
            let id = cursor
                .take(4)
                .map_err(|_| ConvertError::Decode("no data chunk in container".to_string()))?;
            let chunk_id = [id[0], id[1], id[2], id[3]];
            let chunk_size = cursor.read_u32_le()? as usize;

            match &chunk_id {
                b"fmt " => {
                    let body = cursor.take_chunk(chunk_size, "fmt chunk")?;
                    format = Some(FormatChunk::parse(body)?);
                }
                b"data" => {
                    let fmt = format.ok_or_else(|| {
                        ConvertError::Decode("data chunk before fmt chunk".to_string())
                    })?;
                    let frames = cursor.take_chunk(chunk_size, "frame data")?;
                    return decode_frames(&fmt, frames);
                }
                _ => {
                    // Unknown chunks (LIST, fact, ...) are skipped; chunk
                    // bodies are padded to an even byte count.
                    let padded = chunk_size + (chunk_size & 1);
                    cursor.take_chunk(padded, "chunk body")?;
                }
            }
        }
    }

    /// Read and decode a WAVE file from disk
    pub fn decode_file<P: AsRef<Path>>(path: P) -> Result<AudioStream, ConvertError> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::decode(&bytes)
    }
}

/// Parsed `fmt ` chunk fields relevant to decoding
#[derive(Debug, Clone, Copy)]
struct FormatChunk {
    encoding: u16,
    channels: u16,
    sample_rate_hz: u32,
    width: SampleWidth,
}

impl FormatChunk {
    fn parse(body: &[u8]) -> Result<Self, ConvertError> {
        if body.len() < 16 {
            return Err(ConvertError::Decode(format!(
                "fmt chunk too short: {} bytes",
                body.len()
            )));
        }

        let encoding = u16::from_le_bytes([body[0], body[1]]);
        let channels = u16::from_le_bytes([body[2], body[3]]);
        let sample_rate_hz = u32::from_le_bytes([body[4], body[5], body[6], body[7]]);
        // bytes 8..14: byte rate and block align, both derivable
        let bits_per_sample = u16::from_le_bytes([body[14], body[15]]);

        if encoding != ENCODING_PCM && encoding != ENCODING_IEEE_FLOAT {
            return Err(ConvertError::Decode(format!(
                "unsupported encoding tag: {encoding}"
            )));
        }
        if channels == 0 {
            return Err(ConvertError::Decode("zero channels declared".to_string()));
        }
        if sample_rate_hz == 0 {
            return Err(ConvertError::Decode("zero sample rate declared".to_string()));
        }
        if bits_per_sample == 0 || bits_per_sample % 8 != 0 {
            return Err(ConvertError::Decode(format!(
                "sample width is not a whole byte count: {bits_per_sample} bits"
            )));
        }

        let width = SampleWidth::from_bytes(bits_per_sample / 8)?;
        if encoding == ENCODING_IEEE_FLOAT && width != SampleWidth::Int32 {
            return Err(ConvertError::Decode(format!(
                "float samples must be 32-bit, got {bits_per_sample} bits"
            )));
        }

        Ok(Self {
            encoding,
            channels,
            sample_rate_hz,
            width,
        })
    }
}

fn decode_frames(fmt: &FormatChunk, frames: &[u8]) -> Result<AudioStream, ConvertError> {
    let width_bytes = fmt.width.bytes();
    if frames.len() % width_bytes != 0 {
        return Err(ConvertError::Decode(format!(
            "frame data length {} is not aligned to {}-byte samples",
            frames.len(),
            width_bytes
        )));
    }

    let sample_count = frames.len() / width_bytes;
    let channels = fmt.channels as usize;
    if sample_count % channels != 0 {
        return Err(ConvertError::Decode(format!(
            "sample count {sample_count} is not divisible by {channels} channels"
        )));
    }

    let samples = if fmt.encoding == ENCODING_IEEE_FLOAT {
        let flat: Vec<f32> = frames
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        SampleMatrix::Float(deinterleave(&flat, channels))
    } else {
        let flat: Vec<i32> = match fmt.width {
            // Unsigned on the wire; silence is 128, not 0
            SampleWidth::Int8 => frames.iter().map(|&b| b as i32 - 128).collect(),
            SampleWidth::Int16 => frames
                .chunks_exact(2)
                .map(|b| i16::from_le_bytes([b[0], b[1]]) as i32)
                .collect(),
            SampleWidth::Int32 => frames
                .chunks_exact(4)
                .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
        };
        SampleMatrix::Int(deinterleave(&flat, channels))
    };

    Ok(AudioStream {
        sample_rate_hz: fmt.sample_rate_hz,
        width: fmt.width,
        samples,
    })
}

/// Split a flat row-major frame sequence into one column per channel
fn deinterleave<T: Copy>(flat: &[T], channels: usize) -> Vec<Vec<T>> {
    let frames = flat.len() / channels;
    let mut columns = vec![Vec::with_capacity(frames); channels];
    for frame in flat.chunks_exact(channels) {
        for (column, &value) in columns.iter_mut().zip(frame) {
            column.push(value);
        }
    }
    columns
}

/// Bounds-checked reader over the raw container bytes
struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ConvertError> {
        if self.remaining() < n {
            return Err(ConvertError::Decode(format!(
                "truncated container: wanted {n} bytes, {} left",
                self.remaining()
            )));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Like `take`, but reports a short read against the declared chunk span
    fn take_chunk(&mut self, n: usize, what: &str) -> Result<&'a [u8], ConvertError> {
        if self.remaining() < n {
            return Err(ConvertError::Decode(format!(
                "truncated {what}: declared {n} bytes, {} present",
                self.remaining()
            )));
        }
        self.take(n)
    }

    fn read_u32_le(&mut self) -> Result<u32, ConvertError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}
