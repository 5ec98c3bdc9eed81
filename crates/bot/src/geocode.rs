//! Yandex geocoder client and nearest-outlet selection.
//!
//! Resolves a free-text address to coordinates. The provider ranks
//! matches by relevance; the first match is used deterministically. Zero
//! matches is an expected, recoverable condition (`AddressNotFound`), not
//! an operational failure.

use std::sync::Arc;

use pizzatime_core::{Coordinates, geo::round_km};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

use crate::commerce::types::Outlet;
use crate::config::GeocoderConfig;

const GEOCODER_URL: &str = "https://geocode-maps.yandex.ru/1.x";

/// Errors that can occur when geocoding.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned a non-2xx response.
    #[error("API error: {status} - {body}")]
    Api { status: u16, body: String },

    /// The provider returned zero matches for the query.
    #[error("no matches for address: {0}")]
    AddressNotFound(String),

    /// Failed to parse a response body or position string.
    #[error("Parse error: {0}")]
    Parse(String),
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct GeocoderResponse {
    response: GeocoderBody,
}

#[derive(Debug, Deserialize)]
struct GeocoderBody {
    #[serde(rename = "GeoObjectCollection")]
    collection: GeoObjectCollection,
}

#[derive(Debug, Deserialize)]
struct GeoObjectCollection {
    #[serde(rename = "featureMember", default)]
    members: Vec<FeatureMember>,
}

#[derive(Debug, Deserialize)]
struct FeatureMember {
    #[serde(rename = "GeoObject")]
    geo_object: GeoObject,
}

#[derive(Debug, Deserialize)]
struct GeoObject {
    #[serde(rename = "Point")]
    point: Point,
}

#[derive(Debug, Deserialize)]
struct Point {
    /// Space-separated `"longitude latitude"`.
    pos: String,
}

/// Parse the provider's `"longitude latitude"` position string.
fn parse_pos(pos: &str) -> Result<Coordinates, GeocodeError> {
    let mut parts = pos.split_whitespace();
    let longitude = parts
        .next()
        .and_then(|p| p.parse::<f64>().ok())
        .ok_or_else(|| GeocodeError::Parse(format!("bad position string: {pos}")))?;
    let latitude = parts
        .next()
        .and_then(|p| p.parse::<f64>().ok())
        .ok_or_else(|| GeocodeError::Parse(format!("bad position string: {pos}")))?;

    Ok(Coordinates::new(latitude, longitude))
}

// =============================================================================
// Client
// =============================================================================

/// Client for the Yandex geocoder API.
#[derive(Clone)]
pub struct GeocodeClient {
    inner: Arc<GeocodeClientInner>,
}

struct GeocodeClientInner {
    client: reqwest::Client,
    api_key: SecretString,
}

impl GeocodeClient {
    /// Create a new geocoder client.
    #[must_use]
    pub fn new(config: &GeocoderConfig) -> Self {
        Self {
            inner: Arc::new(GeocodeClientInner {
                client: reqwest::Client::new(),
                api_key: config.api_key.clone(),
            }),
        }
    }

    /// Resolve a free-text address to coordinates.
    ///
    /// # Errors
    ///
    /// Returns `AddressNotFound` when the provider has zero matches; the
    /// caller is expected to re-prompt rather than fail the session.
    pub async fn resolve_address(&self, address: &str) -> Result<Coordinates, GeocodeError> {
        let response = self
            .inner
            .client
            .get(GEOCODER_URL)
            .query(&[
                ("geocode", address),
                ("apikey", self.inner.api_key.expose_secret()),
                ("format", "json"),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(GeocodeError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GeocoderResponse =
            serde_json::from_str(&body).map_err(|e| GeocodeError::Parse(e.to_string()))?;

        // Provider-ranked "most relevant" match comes first.
        let best = parsed
            .response
            .collection
            .members
            .into_iter()
            .next()
            .ok_or_else(|| GeocodeError::AddressNotFound(address.to_string()))?;

        parse_pos(&best.geo_object.point.pos)
    }
}

/// Pick the outlet nearest to `user`, with its distance rounded to one
/// decimal place (all delivery policy runs on the rounded value).
#[must_use]
pub fn nearest_outlet(user: Coordinates, outlets: &[Outlet]) -> Option<(&Outlet, f64)> {
    outlets
        .iter()
        .map(|outlet| (outlet, user.distance_km(&outlet.coordinates)))
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(outlet, km)| (outlet, round_km(km)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pizzatime_core::ChatId;

    use super::*;

    fn outlet(alias: &str, latitude: f64, longitude: f64) -> Outlet {
        Outlet {
            address: format!("{alias} address"),
            alias: alias.to_string(),
            coordinates: Coordinates::new(latitude, longitude),
            courier_chat_id: ChatId::new(1),
        }
    }

    #[test]
    fn parse_pos_is_longitude_first() {
        let coords = parse_pos("37.62 55.75").unwrap();
        assert!((coords.longitude - 37.62).abs() < 1e-9);
        assert!((coords.latitude - 55.75).abs() < 1e-9);
    }

    #[test]
    fn parse_pos_rejects_garbage() {
        assert!(matches!(parse_pos("nope"), Err(GeocodeError::Parse(_))));
        assert!(matches!(parse_pos("37.62"), Err(GeocodeError::Parse(_))));
    }

    #[test]
    fn geocoder_response_shape_deserializes() {
        let json = serde_json::json!({
            "response": {
                "GeoObjectCollection": {
                    "featureMember": [
                        { "GeoObject": { "Point": { "pos": "37.62 55.75" } } },
                        { "GeoObject": { "Point": { "pos": "30.31 59.93" } } }
                    ]
                }
            }
        });
        let parsed: GeocoderResponse = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.response.collection.members.len(), 2);
    }

    #[test]
    fn empty_feature_member_list_deserializes() {
        let json = serde_json::json!({
            "response": { "GeoObjectCollection": {} }
        });
        let parsed: GeocoderResponse = serde_json::from_value(json).unwrap();
        assert!(parsed.response.collection.members.is_empty());
    }

    #[test]
    fn nearest_outlet_picks_minimum_distance() {
        let outlets = vec![
            outlet("far", 59.93, 30.31),
            outlet("near", 55.76, 37.62),
        ];
        let user = Coordinates::new(55.75, 37.62);

        let (best, km) = nearest_outlet(user, &outlets).unwrap();
        assert_eq!(best.alias, "near");
        assert!(km < 2.0);
        // one-decimal rounding applied
        assert!(((km * 10.0).round() / 10.0 - km).abs() < 1e-9);
    }

    #[test]
    fn nearest_outlet_of_empty_list_is_none() {
        let user = Coordinates::new(55.75, 37.62);
        assert!(nearest_outlet(user, &[]).is_none());
    }
}
