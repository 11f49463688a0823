// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Cached Strava activity model.

use crate::services::geometry::{BoundingBox, RouteGeometry};
use crate::services::strava::ActivityDetail;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored activity record.
///
/// Activity IDs are unique across all athletes, so the ID alone is the
/// document key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Strava activity ID (also used as document ID)
    pub id: u64,
    /// Strava athlete ID (owner)
    pub athlete_id: u64,
    pub start_date: DateTime<Utc>,
    /// Activity name/title
    pub name: String,
    /// Sport type (Ride, Run, Hike, etc.)
    pub sport_type: String,
    pub elapsed_time_secs: u32,
    pub moving_time_secs: u32,
    /// Distance in kilometers
    pub distance_km: f64,
    /// Average speed in km/h
    pub average_speed_kmh: f64,
    /// Total ascent in meters
    pub elevation_gain_m: f64,
    /// Full-resolution encoded polyline
    pub polyline: String,
    pub bounds: BoundingBox,
    /// `LINESTRING(lng lat, ...)` text for spatial consumers
    pub geometry: String,
}

impl ActivityRecord {
    /// Build a record from a detailed activity and its decoded geometry.
    pub fn from_detail(detail: &ActivityDetail, polyline: &str, route: RouteGeometry) -> Self {
        Self {
            id: detail.id,
            athlete_id: detail.athlete.id,
            start_date: detail.start_date,
            name: detail.name.clone(),
            sport_type: detail.sport_type.clone(),
            elapsed_time_secs: detail.elapsed_time,
            moving_time_secs: detail.moving_time,
            distance_km: detail.distance / 1000.0,
            average_speed_kmh: detail.average_speed * 3.6,
            elevation_gain_m: detail.total_elevation_gain,
            polyline: polyline.to_string(),
            bounds: route.bounds,
            geometry: route.line_text,
        }
    }
}
