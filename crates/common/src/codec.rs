// Copyright (C) 2026 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! The payload codec interface, and the JSON codec used by default.

use std::collections::BTreeMap;

use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::model::{FeatureEncoding, Flags, GeoEncoding, TagsEncoding};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Could not encode {0}: {1}")]
    CouldNotEncode(&'static str, String),
    #[error("Could not decode {0}: {1}")]
    CouldNotDecode(&'static str, String),
    #[error("Unsupported {0} encoding in flags {1:#x}")]
    UnsupportedEncoding(&'static str, i32),
}

/// A shared string dictionary a codec may use to compress payloads. Opaque to the engine, which
/// only passes it through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dictionary {
    pub id: String,
}

/// Stateless transform between feature parts and the bytes persisted in a row.
pub trait Codec: Send + Sync {
    /// The flags this codec stamps on rows it encodes.
    fn default_flags(&self) -> Flags;

    fn encode_feature(
        &self,
        body: &Value,
        flags: Flags,
        dict: Option<&Dictionary>,
    ) -> Result<Vec<u8>, CodecError>;

    fn decode_feature(
        &self,
        bytes: &[u8],
        flags: Flags,
        dict: Option<&Dictionary>,
    ) -> Result<Value, CodecError>;

    fn encode_tags(
        &self,
        tags: &BTreeMap<String, Value>,
        flags: Flags,
        dict: Option<&Dictionary>,
    ) -> Result<Vec<u8>, CodecError>;

    fn decode_tags(
        &self,
        bytes: &[u8],
        flags: Flags,
        dict: Option<&Dictionary>,
    ) -> Result<BTreeMap<String, Value>, CodecError>;

    fn encode_geometry(&self, geometry: &Value, flags: Flags) -> Result<Vec<u8>, CodecError>;

    fn decode_geometry(&self, bytes: &[u8], flags: Flags) -> Result<Value, CodecError>;
}

/// Encodes every part as plain JSON text.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn default_flags(&self) -> Flags {
        Flags::new(GeoEncoding::GeoJson, FeatureEncoding::Json, TagsEncoding::Json)
    }

    fn encode_feature(
        &self,
        body: &Value,
        flags: Flags,
        _dict: Option<&Dictionary>,
    ) -> Result<Vec<u8>, CodecError> {
        if flags.feature_encoding() != FeatureEncoding::Json {
            return Err(CodecError::UnsupportedEncoding("feature", flags.raw()));
        }
        serde_json::to_vec(body).map_err(|e| CodecError::CouldNotEncode("feature", e.to_string()))
    }

    fn decode_feature(
        &self,
        bytes: &[u8],
        flags: Flags,
        _dict: Option<&Dictionary>,
    ) -> Result<Value, CodecError> {
        if flags.feature_encoding() != FeatureEncoding::Json {
            return Err(CodecError::UnsupportedEncoding("feature", flags.raw()));
        }
        serde_json::from_slice(bytes)
            .map_err(|e| CodecError::CouldNotDecode("feature", e.to_string()))
    }

    fn encode_tags(
        &self,
        tags: &BTreeMap<String, Value>,
        flags: Flags,
        _dict: Option<&Dictionary>,
    ) -> Result<Vec<u8>, CodecError> {
        if flags.tags_encoding() != TagsEncoding::Json {
            return Err(CodecError::UnsupportedEncoding("tags", flags.raw()));
        }
        serde_json::to_vec(tags).map_err(|e| CodecError::CouldNotEncode("tags", e.to_string()))
    }

    fn decode_tags(
        &self,
        bytes: &[u8],
        flags: Flags,
        _dict: Option<&Dictionary>,
    ) -> Result<BTreeMap<String, Value>, CodecError> {
        if flags.tags_encoding() != TagsEncoding::Json {
            return Err(CodecError::UnsupportedEncoding("tags", flags.raw()));
        }
        serde_json::from_slice(bytes).map_err(|e| CodecError::CouldNotDecode("tags", e.to_string()))
    }

    fn encode_geometry(&self, geometry: &Value, flags: Flags) -> Result<Vec<u8>, CodecError> {
        if flags.geo_encoding() != GeoEncoding::GeoJson {
            return Err(CodecError::UnsupportedEncoding("geometry", flags.raw()));
        }
        if !geometry.is_object() {
            return Err(CodecError::CouldNotEncode(
                "geometry",
                "GeoJSON geometry must be an object".to_string(),
            ));
        }
        serde_json::to_vec(geometry)
            .map_err(|e| CodecError::CouldNotEncode("geometry", e.to_string()))
    }

    fn decode_geometry(&self, bytes: &[u8], flags: Flags) -> Result<Value, CodecError> {
        if flags.geo_encoding() != GeoEncoding::GeoJson {
            return Err(CodecError::UnsupportedEncoding("geometry", flags.raw()));
        }
        serde_json::from_slice(bytes)
            .map_err(|e| CodecError::CouldNotDecode("geometry", e.to_string()))
    }
}

/// Content fingerprint over the encoded payload parts: the first four bytes of a SHA-256 digest.
/// Absent and empty parts hash differently.
pub fn content_hash(parts: &[Option<&[u8]>]) -> i32 {
    let mut hasher = Sha256::new();
    for part in parts {
        match part {
            None => hasher.update([0u8]),
            Some(bytes) => {
                hasher.update([1u8]);
                hasher.update((bytes.len() as u64).to_be_bytes());
                hasher.update(bytes);
            }
        }
    }
    let digest = hasher.finalize();
    i32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}
