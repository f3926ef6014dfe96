//! Address resolution against the external geocoding provider.
//!
//! Every address change re-queries the provider; there is no cache. When the
//! provider ranks several candidates the first one wins.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::GeocoderConfig;
use crate::error::{AppError, GatewayError};
use crate::models::location::{GeoPoint, Location};

#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeResult {
    pub latitude: f64,
    pub longitude: f64,
    pub formatted_address: String,
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Zero or more candidates for `address`, best match first.
    async fn geocode(&self, address: &str) -> Result<Vec<GeocodeResult>, GatewayError>;
}

/// Whether the owning entity can be saved without a resolved point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Unresolvable address aborts the save (order drop-off).
    Mandatory,
    /// Unresolvable address clears the point (user and vendor addresses).
    Optional,
}

/// Geocodes `address` into a fresh [`Location`], bounded by `timeout`.
pub async fn resolve_location(
    geocoder: &dyn Geocoder,
    address: &str,
    requirement: Requirement,
    timeout: Duration,
) -> Result<Location, AppError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(AppError::BadRequest("address cannot be empty".to_string()));
    }

    let outcome = match tokio::time::timeout(timeout, geocoder.geocode(address)).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::Timeout(timeout)),
    };

    match (outcome, requirement) {
        (Ok(results), _) if !results.is_empty() => {
            let best = &results[0];
            debug!(address, formatted = %best.formatted_address, "address resolved");
            Ok(Location::resolved(
                address,
                best.formatted_address.clone(),
                GeoPoint::new(best.latitude, best.longitude),
            ))
        }
        (Ok(_), Requirement::Mandatory) => Err(AppError::BadRequest(format!(
            "could not resolve address: {address}"
        ))),
        (Err(err), Requirement::Mandatory) => Err(AppError::Gateway(err)),
        (Ok(_), Requirement::Optional) => {
            warn!(address, "address has no geocoding result; clearing point");
            Ok(Location::unresolved(address))
        }
        (Err(err), Requirement::Optional) => {
            warn!(address, error = %err, "geocoding failed; clearing point");
            Ok(Location::unresolved(address))
        }
    }
}

/// Re-resolves only when the address text differs from `current`, so an
/// unchanged address keeps its point without another provider round-trip.
pub async fn relocate(
    geocoder: &dyn Geocoder,
    current: Option<&Location>,
    address: &str,
    requirement: Requirement,
    timeout: Duration,
) -> Result<Location, AppError> {
    if let Some(existing) = current {
        if existing.address == address.trim() {
            return Ok(existing.clone());
        }
    }

    resolve_location(geocoder, address, requirement, timeout).await
}

/// MapQuest geocoding API client.
pub struct MapQuestGeocoder {
    client: Client,
    base_url: String,
    key: String,
}

impl MapQuestGeocoder {
    pub fn new(config: &GeocoderConfig, timeout: Duration) -> Result<Self, GatewayError> {
        let key = config
            .mapquest_key
            .clone()
            .ok_or_else(|| GatewayError::NotConfigured("MAPQUEST_KEY not set".to_string()))?;

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            key,
        })
    }
}

#[derive(Deserialize)]
struct MapQuestResponse {
    #[serde(default)]
    results: Vec<MapQuestResult>,
}

#[derive(Deserialize)]
struct MapQuestResult {
    #[serde(default)]
    locations: Vec<MapQuestLocation>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MapQuestLocation {
    lat_lng: MapQuestLatLng,
    #[serde(default)]
    street: String,
    #[serde(default)]
    admin_area5: String,
    #[serde(default)]
    admin_area3: String,
    #[serde(default)]
    postal_code: String,
    #[serde(default)]
    admin_area1: String,
}

#[derive(Deserialize)]
struct MapQuestLatLng {
    lat: f64,
    lng: f64,
}

impl MapQuestLocation {
    fn formatted(&self) -> String {
        [
            &self.street,
            &self.admin_area5,
            &self.admin_area3,
            &self.postal_code,
            &self.admin_area1,
        ]
        .into_iter()
        .filter(|part| !part.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join(", ")
    }
}

#[async_trait]
impl Geocoder for MapQuestGeocoder {
    async fn geocode(&self, address: &str) -> Result<Vec<GeocodeResult>, GatewayError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("key", self.key.as_str()), ("location", address)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: MapQuestResponse = response
            .json()
            .await
            .map_err(|err| GatewayError::Decode(err.to_string()))?;

        Ok(payload
            .results
            .into_iter()
            .flat_map(|result| result.locations)
            .map(|location| GeocodeResult {
                latitude: location.lat_lng.lat,
                longitude: location.lat_lng.lng,
                formatted_address: location.formatted(),
            })
            .collect())
    }
}

/// In-memory address table. Unknown addresses resolve to zero results.
#[derive(Default)]
pub struct StaticGeocoder {
    entries: RwLock<HashMap<String, GeocodeResult>>,
}

impl StaticGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, address: &str, lat: f64, lng: f64) -> Self {
        self.insert(address, lat, lng);
        self
    }

    pub fn insert(&self, address: &str, lat: f64, lng: f64) {
        let result = GeocodeResult {
            latitude: lat,
            longitude: lng,
            formatted_address: format!("{address} (resolved)"),
        };
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(address.to_string(), result);
        }
    }
}

#[async_trait]
impl Geocoder for StaticGeocoder {
    async fn geocode(&self, address: &str) -> Result<Vec<GeocodeResult>, GatewayError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| GatewayError::Decode("static geocoder lock poisoned".to_string()))?;
        Ok(entries.get(address).cloned().into_iter().collect())
    }
}
