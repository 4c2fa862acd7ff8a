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

mod ids;
mod metadata;
mod tuple;

pub mod feature;

pub use ids::{Guid, StoreNumber, TupleNumber, Version};
pub use metadata::{Action, FeatureEncoding, Flags, GeoEncoding, Metadata, TagsEncoding};
pub use tuple::Tuple;

use thiserror::Error;

/// Errors raised when constructing or parsing model values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Store number component out of range: {0}")]
    StoreNumberOutOfRange(String),
    #[error("Invalid guid: {0}")]
    InvalidGuid(String),
    #[error("Invalid flags: {0:#x}")]
    InvalidFlags(i32),
}
