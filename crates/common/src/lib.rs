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

//! The value model shared by the tessera write engine and its collaborators: storage and tuple
//! numbering, versioned feature metadata, feature payloads, and the codec interface that turns
//! payloads into the opaque byte arrays persisted by the engine.

pub use codec::{CodecError, Codec, Dictionary, JsonCodec, content_hash};
pub use model::{
    Action, FeatureEncoding, Flags, GeoEncoding, Guid, Metadata, ModelError, StoreNumber,
    TagsEncoding, Tuple, TupleNumber, Version,
};
pub use model::feature::Feature;

pub mod codec;
pub mod geo;
pub mod model;
pub mod tracing;
