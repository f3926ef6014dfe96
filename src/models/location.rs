use serde::{Deserialize, Serialize};

/// GeoJSON point. Coordinates are stored as `[longitude, latitude]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename = "Point")]
pub struct GeoPoint {
    pub coordinates: [f64; 2],
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            coordinates: [lng, lat],
        }
    }

    pub fn lat(&self) -> f64 {
        self.coordinates[1]
    }

    pub fn lng(&self) -> f64 {
        self.coordinates[0]
    }
}

/// Address plus the geocoded point derived from it.
///
/// `point` and `formatted_address` are only ever set by geocoding the current
/// `address`; changing the address through [`Location::unresolved`] starts
/// from a blank point so a stale one can never be carried over.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub address: String,
    pub formatted_address: Option<String>,
    pub point: Option<GeoPoint>,
}

impl Location {
    pub fn unresolved(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            formatted_address: None,
            point: None,
        }
    }

    pub fn resolved(address: impl Into<String>, formatted_address: String, point: GeoPoint) -> Self {
        Self {
            address: address.into(),
            formatted_address: Some(formatted_address),
            point: Some(point),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.point.is_some()
    }
}
