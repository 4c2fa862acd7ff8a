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

use serde::{Deserialize, Serialize};
use strum::{Display, FromRepr};

use crate::model::{Guid, ModelError, StoreNumber, TupleNumber, Version};

const GEO_ENCODING_MASK: i32 = 0x0000_000f;
const FEATURE_ENCODING_SHIFT: u32 = 4;
const FEATURE_ENCODING_MASK: i32 = 0x0000_00f0;
const TAGS_ENCODING_SHIFT: u32 = 8;
const TAGS_ENCODING_MASK: i32 = 0x0000_0f00;
const ACTION_SHIFT: u32 = 16;
const ACTION_MASK: i32 = 0x0003_0000;

/// What happened to a feature in the write that produced a row.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, FromRepr, Display, Serialize, Deserialize)]
#[repr(u8)]
pub enum Action {
    #[strum(serialize = "CREATED")]
    Created = 0,
    #[strum(serialize = "UPDATED")]
    Updated = 1,
    #[strum(serialize = "DELETED")]
    Deleted = 2,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, FromRepr, Serialize, Deserialize)]
#[repr(u8)]
pub enum GeoEncoding {
    None = 0,
    GeoJson = 1,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, FromRepr, Serialize, Deserialize)]
#[repr(u8)]
pub enum FeatureEncoding {
    None = 0,
    Json = 1,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, FromRepr, Serialize, Deserialize)]
#[repr(u8)]
pub enum TagsEncoding {
    None = 0,
    Json = 1,
}

/// Row flags: the encodings of the geometry, feature and tags payloads, and the action that
/// produced the row.
///
/// Layout (low to high): geometry encoding (4 bits), feature encoding (4 bits), tags encoding
/// (4 bits), 4 reserved bits, action (2 bits).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Flags(i32);

impl Flags {
    pub fn new(geo: GeoEncoding, feature: FeatureEncoding, tags: TagsEncoding) -> Self {
        Self(
            (geo as i32)
                | ((feature as i32) << FEATURE_ENCODING_SHIFT)
                | ((tags as i32) << TAGS_ENCODING_SHIFT),
        )
    }

    /// Validates raw flags as read from storage or supplied with a pre-encoded row.
    pub fn from_raw(raw: i32) -> Result<Self, ModelError> {
        let flags = Self(raw);
        let valid = GeoEncoding::from_repr((raw & GEO_ENCODING_MASK) as u8).is_some()
            && FeatureEncoding::from_repr(
                ((raw & FEATURE_ENCODING_MASK) >> FEATURE_ENCODING_SHIFT) as u8,
            )
            .is_some()
            && TagsEncoding::from_repr(((raw & TAGS_ENCODING_MASK) >> TAGS_ENCODING_SHIFT) as u8)
                .is_some()
            && Action::from_repr(((raw & ACTION_MASK) >> ACTION_SHIFT) as u8).is_some();
        if !valid {
            return Err(ModelError::InvalidFlags(raw));
        }
        Ok(flags)
    }

    pub fn raw(&self) -> i32 {
        self.0
    }

    pub fn geo_encoding(&self) -> GeoEncoding {
        GeoEncoding::from_repr((self.0 & GEO_ENCODING_MASK) as u8).unwrap_or(GeoEncoding::None)
    }

    pub fn feature_encoding(&self) -> FeatureEncoding {
        FeatureEncoding::from_repr(((self.0 & FEATURE_ENCODING_MASK) >> FEATURE_ENCODING_SHIFT) as u8)
            .unwrap_or(FeatureEncoding::None)
    }

    pub fn tags_encoding(&self) -> TagsEncoding {
        TagsEncoding::from_repr(((self.0 & TAGS_ENCODING_MASK) >> TAGS_ENCODING_SHIFT) as u8)
            .unwrap_or(TagsEncoding::None)
    }

    pub fn action(&self) -> Action {
        Action::from_repr(((self.0 & ACTION_MASK) >> ACTION_SHIFT) as u8).unwrap_or(Action::Created)
    }

    pub fn with_action(&self, action: Action) -> Self {
        Self((self.0 & !ACTION_MASK) | ((action as i32) << ACTION_SHIFT))
    }
}

/// The versioned header of one feature state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub store_number: StoreNumber,
    pub version: Version,
    pub uid: i32,
    pub id: String,
    /// The version of the state this one superseded, `None` for the first state of a chain.
    pub prev_version: Option<Version>,
    pub puid: Option<i32>,
    /// Only set on history rows: the version of the state that superseded this one.
    pub next_version: Option<Version>,
    pub created_at: i64,
    pub updated_at: i64,
    pub author_ts: i64,
    pub author: Option<String>,
    pub app_id: String,
    pub feature_type: Option<String>,
    pub origin: Option<String>,
    pub flags: Flags,
    pub hash: i32,
    pub change_count: i32,
    pub geo_grid: i32,
}

impl Metadata {
    pub fn tuple_number(&self) -> TupleNumber {
        TupleNumber::new(self.store_number, self.version, self.uid)
    }

    pub fn prev_tuple_number(&self) -> Option<TupleNumber> {
        match (self.prev_version, self.puid) {
            (Some(version), Some(uid)) => Some(TupleNumber::new(self.store_number, version, uid)),
            _ => None,
        }
    }

    pub fn action(&self) -> Action {
        self.flags.action()
    }

    /// True while this state has not been superseded.
    pub fn is_head(&self) -> bool {
        self.next_version.is_none()
    }

    pub fn guid(&self, collection_id: &str) -> Guid {
        Guid::new(collection_id, &self.id, self.tuple_number())
    }
}
