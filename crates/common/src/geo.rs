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

//! Coarse spatial bucketing of features.

use serde_json::Value;

/// Tile level used for `geo_grid` buckets.
pub const GRID_LEVEL: u32 = 14;

/// The centre of the bounding box of every coordinate in a GeoJSON geometry (including
/// geometry collections). `None` when the geometry carries no coordinates.
pub fn reference_point(geometry: &Value) -> Option<[f64; 2]> {
    let mut bbox: Option<[f64; 4]> = None;
    collect_bbox(geometry, &mut bbox);
    bbox.map(|[min_x, min_y, max_x, max_y]| [(min_x + max_x) / 2.0, (min_y + max_y) / 2.0])
}

fn collect_bbox(geometry: &Value, bbox: &mut Option<[f64; 4]>) {
    if let Some(coordinates) = geometry.get("coordinates") {
        collect_positions(coordinates, bbox);
    }
    if let Some(Value::Array(geometries)) = geometry.get("geometries") {
        for g in geometries {
            collect_bbox(g, bbox);
        }
    }
}

fn collect_positions(value: &Value, bbox: &mut Option<[f64; 4]>) {
    let Value::Array(items) = value else {
        return;
    };
    // A position is an array whose first two members are numbers.
    if let (Some(x), Some(y)) = (
        items.first().and_then(Value::as_f64),
        items.get(1).and_then(Value::as_f64),
    ) {
        let b = bbox.get_or_insert([x, y, x, y]);
        b[0] = b[0].min(x);
        b[1] = b[1].min(y);
        b[2] = b[2].max(x);
        b[3] = b[3].max(y);
        return;
    }
    for item in items {
        collect_positions(item, bbox);
    }
}

/// The bucket id of a `[longitude, latitude]` point: the Morton-interleaved tile coordinates at
/// [`GRID_LEVEL`], with a leading level bit so buckets of different levels never collide.
pub fn geo_grid(point: [f64; 2]) -> i32 {
    let [lon, lat] = point;
    let cells = 1u32 << GRID_LEVEL;
    let to_cell = |v: f64, min: f64, span: f64| -> u32 {
        let cell = (((v - min) / span) * cells as f64).floor();
        if cell.is_nan() || cell < 0.0 {
            0
        } else {
            (cell as u32).min(cells - 1)
        }
    };
    let x = to_cell(lon.clamp(-180.0, 180.0), -180.0, 360.0);
    let y = to_cell(lat.clamp(-90.0, 90.0), -90.0, 180.0);

    let mut key: u32 = 0;
    for bit in 0..GRID_LEVEL {
        key |= ((x >> bit) & 1) << (2 * bit);
        key |= ((y >> bit) & 1) << (2 * bit + 1);
    }
    (key | (1 << (2 * GRID_LEVEL))) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reference_point_of_polygon() {
        let polygon = json!({
            "type": "Polygon",
            "coordinates": [[[0.0, 0.0], [4.0, 0.0], [4.0, 2.0], [0.0, 2.0], [0.0, 0.0]]]
        });
        assert_eq!(reference_point(&polygon), Some([2.0, 1.0]));
    }

    #[test]
    fn test_reference_point_of_collection() {
        let collection = json!({
            "type": "GeometryCollection",
            "geometries": [
                {"type": "Point", "coordinates": [-10.0, -10.0]},
                {"type": "Point", "coordinates": [10.0, 30.0]}
            ]
        });
        assert_eq!(reference_point(&collection), Some([0.0, 10.0]));
        assert_eq!(reference_point(&json!({"type": "Point"})), None);
    }

    #[test]
    fn test_geo_grid_is_stable_and_local() {
        let berlin = geo_grid([13.405, 52.52]);
        assert_eq!(berlin, geo_grid([13.405, 52.52]));
        // Very close points share a bucket, distant ones do not.
        assert_eq!(berlin, geo_grid([13.4051, 52.5201]));
        assert_ne!(berlin, geo_grid([-74.0, 40.7]));
        // Level bit is always present.
        assert!(berlin >= 1 << (2 * GRID_LEVEL));
    }

    #[test]
    fn test_geo_grid_handles_edges() {
        assert_eq!(geo_grid([-180.0, -90.0]), 1 << (2 * GRID_LEVEL));
        let max = geo_grid([180.0, 90.0]);
        assert_eq!(max, ((1u32 << (2 * GRID_LEVEL + 1)) - 1) as i32);
        assert_eq!(geo_grid([f64::NAN, f64::NAN]), 1 << (2 * GRID_LEVEL));
    }
}
