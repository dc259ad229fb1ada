// File: livelist-sync/src/compression.rs
// Purpose: Gzip handling for binary push frames

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

use crate::error::{Result, SyncError};

/// First two bytes of every gzip stream
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Compress data using gzip
pub fn compress(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level.min(9)));
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Decompress gzip data
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder.read_to_end(&mut decompressed)?;
    Ok(decompressed)
}

pub fn is_gzip(data: &[u8]) -> bool {
    data.len() >= GZIP_MAGIC.len() && data[..2] == GZIP_MAGIC
}

/// Turn a binary websocket frame into text.
///
/// Gzip streams are inflated first; anything else must already be UTF-8.
pub fn decode_binary_frame(data: &[u8]) -> Result<String> {
    let bytes = if is_gzip(data) {
        decompress(data)?
    } else {
        data.to_vec()
    };

    String::from_utf8(bytes)
        .map_err(|e| SyncError::Transport(format!("binary frame is not valid UTF-8: {}", e)))
}
