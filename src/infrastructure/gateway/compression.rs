//! Gateway Frame Decompression
//!
//! Reassembles binary gateway frames into JSON documents. In `zlib-stream`
//! mode a single inflate context lives for the whole connection and every
//! message ends with the sync-flush marker `00 00 FF FF`.

use std::io::Read;

use flate2::read::ZlibDecoder;
use flate2::{Decompress, FlushDecompress, Status};
use serde::Deserialize;

use crate::shared::error::GatewayError;

/// Sync-flush marker terminating every zlib-stream message.
pub const ZLIB_SUFFIX: [u8; 4] = [0x00, 0x00, 0xFF, 0xFF];

const INFLATE_CHUNK: usize = 32 * 1024;

/// Transport compression negotiated with the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompressionMode {
    /// One inflate context for the whole connection (`compress=zlib-stream`).
    #[default]
    ZlibStream,
    /// Individual messages compressed one-shot (`"compress": true` in IDENTIFY).
    Payload,
    /// No compression; binary frames carry raw JSON.
    None,
}

impl CompressionMode {
    /// Value for the `compress` query parameter of the gateway URL.
    pub fn query_value(self) -> Option<&'static str> {
        match self {
            Self::ZlibStream => Some("zlib-stream"),
            Self::Payload | Self::None => None,
        }
    }
}

/// Streaming decompressor for one gateway connection.
pub struct FrameDecompressor {
    mode: CompressionMode,
    inflater: Decompress,
    buffer: Vec<u8>,
}

impl FrameDecompressor {
    pub fn new(mode: CompressionMode) -> Self {
        Self {
            mode,
            inflater: Decompress::new(true),
            buffer: Vec::new(),
        }
    }

    /// Bytes waiting for a message boundary.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Feed one binary WebSocket message.
    ///
    /// Returns the decoded JSON text once a complete message is available,
    /// `None` while a zlib-stream message is still fragmented.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Option<String>, GatewayError> {
        match self.mode {
            CompressionMode::ZlibStream => {
                self.buffer.extend_from_slice(chunk);
                if !chunk.ends_with(&ZLIB_SUFFIX) {
                    return Ok(None);
                }

                let compressed = std::mem::take(&mut self.buffer);
                let inflated = self.inflate(&compressed)?;
                into_utf8(inflated).map(Some)
            }
            CompressionMode::Payload => inflate_once(chunk).map(Some),
            CompressionMode::None => into_utf8(chunk.to_vec()).map(Some),
        }
    }

    /// Drop all buffered bytes and the dictionary state.
    pub fn reset(&mut self) {
        self.inflater.reset(true);
        self.buffer.clear();
    }

    fn inflate(&mut self, input: &[u8]) -> Result<Vec<u8>, GatewayError> {
        let mut output = Vec::with_capacity(input.len().saturating_mul(4).max(INFLATE_CHUNK));
        let mut consumed = 0usize;

        loop {
            if output.len() == output.capacity() {
                output.reserve(INFLATE_CHUNK);
            }

            let in_before = self.inflater.total_in();
            let out_before = self.inflater.total_out();

            let status = self
                .inflater
                .decompress_vec(&input[consumed..], &mut output, FlushDecompress::Sync)
                .map_err(|e| GatewayError::Decode(format!("inflate failed: {}", e)))?;

            let read = (self.inflater.total_in() - in_before) as usize;
            let written = self.inflater.total_out() - out_before;
            consumed += read;

            if status == Status::StreamEnd {
                break;
            }
            if consumed >= input.len() && output.len() < output.capacity() {
                break;
            }
            if read == 0 && written == 0 && output.len() < output.capacity() {
                return Err(GatewayError::Decode(
                    "inflate made no progress on buffered input".into(),
                ));
            }
        }

        Ok(output)
    }
}

impl Default for FrameDecompressor {
    fn default() -> Self {
        Self::new(CompressionMode::default())
    }
}

fn inflate_once(chunk: &[u8]) -> Result<String, GatewayError> {
    let mut text = String::new();
    ZlibDecoder::new(chunk)
        .read_to_string(&mut text)
        .map_err(|e| GatewayError::Decode(format!("payload inflate failed: {}", e)))?;
    Ok(text)
}

fn into_utf8(bytes: Vec<u8>) -> Result<String, GatewayError> {
    String::from_utf8(bytes)
        .map_err(|e| GatewayError::Decode(format!("payload is not valid UTF-8: {}", e)))
}
