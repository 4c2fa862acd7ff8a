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

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::geo;

/// A feature as supplied by a caller: an identifier, a JSON body, tags, and optional geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub feature_type: Option<String>,
    #[serde(default)]
    pub properties: Value,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, Value>,
    /// GeoJSON geometry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Value>,
    /// `[longitude, latitude]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_point: Option<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl Feature {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            feature_type: None,
            properties: Value::Object(Default::default()),
            tags: BTreeMap::new(),
            geometry: None,
            reference_point: None,
            attachment: None,
            origin: None,
        }
    }

    pub fn with_type(mut self, feature_type: &str) -> Self {
        self.feature_type = Some(feature_type.to_string());
        self
    }

    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        if !self.properties.is_object() {
            self.properties = Value::Object(Default::default());
        }
        if let Value::Object(map) = &mut self.properties {
            map.insert(key.to_string(), value.into());
        }
        self
    }

    pub fn with_properties(mut self, properties: Value) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_tag(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.tags.insert(key.to_string(), value.into());
        self
    }

    pub fn with_geometry(mut self, geometry: Value) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn with_attachment(mut self, attachment: Vec<u8>) -> Self {
        self.attachment = Some(attachment);
        self
    }

    /// The explicit reference point, or the centre of the geometry's bounding box.
    pub fn effective_reference_point(&self) -> Option<[f64; 2]> {
        self.reference_point
            .or_else(|| self.geometry.as_ref().and_then(geo::reference_point))
    }

    /// The body handed to the codec as the feature payload. Geometry, tags and attachment are
    /// encoded separately.
    pub fn body(&self) -> Value {
        let mut body = serde_json::Map::new();
        body.insert("id".to_string(), Value::String(self.id.clone()));
        if let Some(feature_type) = &self.feature_type {
            body.insert("type".to_string(), Value::String(feature_type.clone()));
        }
        body.insert("properties".to_string(), self.properties.clone());
        Value::Object(body)
    }
}
