// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Route geometry derived from Strava's encoded polylines.
//!
//! Decoded routes are kept as `geo::LineString` values, so every
//! coordinate is stored as `x = longitude`, `y = latitude`.

use geo::{BoundingRect, LineString};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Strava encodes polylines with five decimal digits.
const POLYLINE_PRECISION: u32 = 5;

/// Line text recorded for a route without coordinates.
pub const EMPTY_LINE_TEXT: &str = "LINESTRING EMPTY";

/// Axis-aligned rectangle that contains a route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lng: f64,
    pub max_lat: f64,
    pub max_lng: f64,
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.6},{:.6},{:.6},{:.6}",
            self.min_lat, self.min_lng, self.max_lat, self.max_lng
        )
    }
}

/// Geometry derived from one encoded path.
#[derive(Debug, Clone)]
pub struct RouteGeometry {
    pub bounds: BoundingBox,
    pub line_text: String,
}

/// Decode an encoded polyline into an ordered coordinate sequence.
///
/// Empty input is rejected along with malformed input; a route with no
/// points is never a usable decode result.
pub fn decode(encoded: &str) -> Result<LineString<f64>, GeometryError> {
    if encoded.is_empty() {
        return Err(GeometryError::Decode("empty polyline".to_string()));
    }

    let line = polyline::decode_polyline(encoded, POLYLINE_PRECISION)
        .map_err(|e| GeometryError::Decode(e.to_string()))?;

    if line.0.is_empty() {
        return Err(GeometryError::Decode(
            "polyline contains no coordinates".to_string(),
        ));
    }
    Ok(line)
}

/// Bounding box of a decoded route.
pub fn bounding_box(line: &LineString<f64>) -> Result<BoundingBox, GeometryError> {
    let rect = line.bounding_rect().ok_or(GeometryError::EmptyGeometry)?;
    Ok(BoundingBox {
        min_lat: rect.min().y,
        min_lng: rect.min().x,
        max_lat: rect.max().y,
        max_lng: rect.max().x,
    })
}

/// WKT-style line text, `LINESTRING(lng lat, lng lat, ...)`.
pub fn to_line_text(line: &LineString<f64>) -> String {
    if line.0.is_empty() {
        return EMPTY_LINE_TEXT.to_string();
    }

    let points: Vec<String> = line
        .coords()
        .map(|c| format!("{} {}", c.x, c.y))
        .collect();
    format!("LINESTRING({})", points.join(", "))
}

/// Decode a polyline and derive everything stored alongside a record.
pub fn derive(encoded: &str) -> Result<RouteGeometry, GeometryError> {
    let line = decode(encoded)?;
    Ok(RouteGeometry {
        bounds: bounding_box(&line)?,
        line_text: to_line_text(&line),
    })
}

/// Errors from geometry operations.
#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    #[error("Failed to decode polyline: {0}")]
    Decode(String),

    #[error("Route has no coordinates")]
    EmptyGeometry,
}
