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

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::ModelError;

const MAP_BITS: u32 = 12;
const COLLECTION_BITS: u32 = 44;
const PARTITION_BITS: u32 = 8;

/// Identifies the physical location of a row: (map, collection, partition).
///
/// Packed into a single `i64` as `map (12 bits) | collection (44 bits) | partition (8 bits)`, so
/// it can be persisted in one column and compared cheaply.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreNumber(i64);

impl StoreNumber {
    pub const MAX_MAP: u16 = (1 << MAP_BITS) - 1;
    pub const MAX_COLLECTION: i64 = (1 << COLLECTION_BITS) - 1;

    pub fn new(map: u16, collection: i64, partition: u8) -> Result<Self, ModelError> {
        if map > Self::MAX_MAP {
            return Err(ModelError::StoreNumberOutOfRange(format!("map {map}")));
        }
        if !(0..=Self::MAX_COLLECTION).contains(&collection) {
            return Err(ModelError::StoreNumberOutOfRange(format!(
                "collection {collection}"
            )));
        }
        Ok(Self(
            ((map as i64) << (COLLECTION_BITS + PARTITION_BITS))
                | (collection << PARTITION_BITS)
                | partition as i64,
        ))
    }

    pub fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> i64 {
        self.0
    }

    pub fn map_number(&self) -> u16 {
        ((self.0 >> (COLLECTION_BITS + PARTITION_BITS)) as u16) & Self::MAX_MAP
    }

    pub fn collection_number(&self) -> i64 {
        (self.0 >> PARTITION_BITS) & Self::MAX_COLLECTION
    }

    pub fn partition_number(&self) -> u8 {
        (self.0 & 0xff) as u8
    }
}

impl Display for StoreNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.map_number(),
            self.collection_number(),
            self.partition_number()
        )
    }
}

/// The transaction number of a write. Totally ordered across the whole storage.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(pub i64);

impl Version {
    pub fn next(&self) -> Version {
        Version(self.0 + 1)
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The number of one physical row: where it lives, the transaction that wrote it, and its
/// sequence within that transaction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TupleNumber {
    pub store_number: StoreNumber,
    pub version: Version,
    pub uid: i32,
}

impl TupleNumber {
    pub fn new(store_number: StoreNumber, version: Version, uid: i32) -> Self {
        Self {
            store_number,
            version,
            uid,
        }
    }

    /// The position of this tuple within its feature's chain of states.
    pub fn chain_position(&self) -> (Version, i32) {
        (self.version, self.uid)
    }
}

impl Display for TupleNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.store_number.raw(), self.version, self.uid)
    }
}

const GUID_PREFIX: &str = "urn:tessera:";

/// Globally unique reference to one specific state of one feature.
///
/// Rendered as `urn:tessera:<store>:<version>:<uid>:<collection>:<feature-id>`. Collection ids
/// never contain `:`, feature ids may.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Guid {
    pub collection_id: String,
    pub feature_id: String,
    pub tuple_number: TupleNumber,
}

impl Guid {
    pub fn new(collection_id: &str, feature_id: &str, tuple_number: TupleNumber) -> Self {
        Self {
            collection_id: collection_id.to_string(),
            feature_id: feature_id.to_string(),
            tuple_number,
        }
    }

    /// Two guids reference the same state if they name the same feature and the same write.
    pub fn same_state(&self, other: &Guid) -> bool {
        self.collection_id == other.collection_id
            && self.feature_id == other.feature_id
            && self.tuple_number.chain_position() == other.tuple_number.chain_position()
    }
}

impl Display for Guid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{GUID_PREFIX}{}:{}",
            self.tuple_number, self.collection_id
        )?;
        write!(f, ":{}", self.feature_id)
    }
}

impl FromStr for Guid {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ModelError::InvalidGuid(s.to_string());
        let rest = s.strip_prefix(GUID_PREFIX).ok_or_else(invalid)?;
        let mut parts = rest.splitn(5, ':');
        let mut next = || parts.next().ok_or_else(invalid);
        let store: i64 = next()?.parse().map_err(|_| invalid())?;
        let version: i64 = next()?.parse().map_err(|_| invalid())?;
        let uid: i32 = next()?.parse().map_err(|_| invalid())?;
        let collection_id = next()?;
        let feature_id = next()?;
        if collection_id.is_empty() || feature_id.is_empty() {
            return Err(invalid());
        }
        Ok(Guid {
            collection_id: collection_id.to_string(),
            feature_id: feature_id.to_string(),
            tuple_number: TupleNumber::new(StoreNumber::from_raw(store), Version(version), uid),
        })
    }
}
