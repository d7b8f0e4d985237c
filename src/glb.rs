//! Binary glTF (GLB) container codec.
//!
//! A GLB file is a 12-byte header (`magic`, `version`, `length`) followed by
//! length-prefixed chunks. VRM files always carry one JSON chunk and at most
//! one binary chunk; any other layout is rejected rather than skipped.

use std::borrow::Cow;

use gltf::binary::{Glb, Header};
use serde_json::Value;
use thiserror::Error;

pub const GLB_MAGIC: [u8; 4] = *b"glTF";
pub const GLB_VERSION: u32 = 2;
pub const CHUNK_TYPE_JSON: [u8; 4] = *b"JSON";
pub const CHUNK_TYPE_BIN: [u8; 4] = *b"BIN\0";

const HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;

#[derive(Error, Debug)]
pub enum GlbError {
    #[error("malformed GLB container: {0}")]
    MalformedContainer(String),

    #[error("unsupported GLB version {0} (expected 2)")]
    UnsupportedVersion(u32),

    #[error("GLB contains more than one {0} chunk")]
    MultipleChunksOfSameType(&'static str),

    #[error("chunk at offset {offset} declares {declared} bytes but only {available} remain")]
    TruncatedChunk {
        offset: usize,
        declared: usize,
        available: usize,
    },

    #[error("GLB has no JSON chunk")]
    MissingJsonChunk,

    #[error("unknown GLB chunk type {0:?}")]
    UnknownChunkType([u8; 4]),

    #[error("invalid JSON chunk: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("GLB output exceeds the 4 GiB container limit")]
    TooLarge,

    #[error("failed to write GLB container: {0}")]
    Write(#[source] gltf::Error),
}

/// Raw chunk payloads of a container, before JSON parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlbChunks<'a> {
    pub json: &'a [u8],
    pub bin: Option<&'a [u8]>,
}

/// Split a GLB byte stream into its JSON and binary chunk payloads.
pub fn split(bytes: &[u8]) -> Result<GlbChunks<'_>, GlbError> {
    if bytes.len() < HEADER_LEN {
        return Err(GlbError::MalformedContainer(format!(
            "header needs {HEADER_LEN} bytes, got {}",
            bytes.len()
        )));
    }
    if bytes[0..4] != GLB_MAGIC {
        return Err(GlbError::MalformedContainer(format!(
            "bad magic {:?}",
            &bytes[0..4]
        )));
    }

    let version = read_u32(bytes, 4);
    if version != GLB_VERSION {
        return Err(GlbError::UnsupportedVersion(version));
    }

    let declared_total = read_u32(bytes, 8) as usize;
    if declared_total < HEADER_LEN {
        return Err(GlbError::MalformedContainer(format!(
            "declared length {declared_total} is shorter than the header"
        )));
    }
    let end = declared_total.min(bytes.len());

    let mut json = None::<&[u8]>;
    let mut bin = None::<&[u8]>;
    let mut offset = HEADER_LEN;

    while offset < end {
        let available = end - offset;
        if available < CHUNK_HEADER_LEN {
            return Err(GlbError::TruncatedChunk {
                offset,
                declared: CHUNK_HEADER_LEN,
                available,
            });
        }

        let chunk_len = read_u32(bytes, offset) as usize;
        let chunk_type: [u8; 4] = [
            bytes[offset + 4],
            bytes[offset + 5],
            bytes[offset + 6],
            bytes[offset + 7],
        ];
        let data_start = offset + CHUNK_HEADER_LEN;
        if chunk_len > end - data_start {
            return Err(GlbError::TruncatedChunk {
                offset,
                declared: chunk_len,
                available: end - data_start,
            });
        }
        let data = &bytes[data_start..data_start + chunk_len];

        match chunk_type {
            CHUNK_TYPE_JSON => {
                if json.replace(data).is_some() {
                    return Err(GlbError::MultipleChunksOfSameType("JSON"));
                }
            }
            CHUNK_TYPE_BIN => {
                if bin.replace(data).is_some() {
                    return Err(GlbError::MultipleChunksOfSameType("BIN"));
                }
            }
            other => return Err(GlbError::UnknownChunkType(other)),
        }

        offset = data_start + chunk_len;
    }

    let json = json.ok_or(GlbError::MissingJsonChunk)?;
    Ok(GlbChunks { json, bin })
}

/// Decode a GLB container into its JSON document and binary blob.
///
/// The blob keeps any trailing zero padding present in the file.
pub fn decode(bytes: &[u8]) -> Result<(Value, Vec<u8>), GlbError> {
    let chunks = split(bytes)?;
    let json = serde_json::from_slice(chunks.json).map_err(GlbError::InvalidJson)?;
    let bin = chunks.bin.map(<[u8]>::to_vec).unwrap_or_default();
    Ok((json, bin))
}

/// Encode a JSON document and binary blob into a two-chunk GLB container.
///
/// The binary chunk is written even when `bin` is empty.
pub fn encode(json: &Value, bin: &[u8]) -> Result<Vec<u8>, GlbError> {
    let json_bytes = serde_json::to_vec(json).map_err(GlbError::InvalidJson)?;

    let total_len = HEADER_LEN
        + CHUNK_HEADER_LEN
        + json_bytes.len()
        + padding_for(json_bytes.len())
        + CHUNK_HEADER_LEN
        + bin.len()
        + padding_for(bin.len());
    let length = u32::try_from(total_len).map_err(|_| GlbError::TooLarge)?;

    let container = Glb {
        header: Header {
            magic: GLB_MAGIC,
            version: GLB_VERSION,
            length,
        },
        json: Cow::Owned(json_bytes),
        bin: Some(Cow::Borrowed(bin)),
    };

    let mut out = Vec::with_capacity(total_len);
    container.to_writer(&mut out).map_err(GlbError::Write)?;
    Ok(out)
}

/// Bytes needed to bring `len` up to the next multiple of four.
pub fn padding_for(len: usize) -> usize {
    (4 - len % 4) % 4
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}
