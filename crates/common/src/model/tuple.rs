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

use crate::model::{Metadata, TupleNumber};

/// One physical row: metadata plus the encoded payload parts. Payload bytes are produced and
/// consumed by a [`crate::Codec`] and are never interpreted by the engine.
///
/// Tuples are immutable once written; a change to the feature produces a new tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tuple {
    pub meta: Metadata,
    pub feature: Option<Vec<u8>>,
    pub tags: Option<Vec<u8>>,
    pub geo: Option<Vec<u8>>,
    pub geo_ref: Option<Vec<u8>>,
    pub attachment: Option<Vec<u8>>,
}

impl Tuple {
    pub fn tuple_number(&self) -> TupleNumber {
        self.meta.tuple_number()
    }

    pub fn id(&self) -> &str {
        &self.meta.id
    }

    /// The same tuple with its payload dropped, as returned to callers that asked for no results.
    pub fn without_payload(self) -> Self {
        Self {
            meta: self.meta,
            feature: None,
            tags: None,
            geo: None,
            geo_ref: None,
            attachment: None,
        }
    }
}
