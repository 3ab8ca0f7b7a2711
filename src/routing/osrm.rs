//! OSRM-compatible HTTP routing provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::RoutingConfig;
use crate::interfaces::routing::{Result, RoutingError, RoutingProvider};
use crate::model::LatLng;

#[derive(Debug, Deserialize)]
struct RouteResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<Route>,
}

#[derive(Debug, Deserialize)]
struct Route {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    /// GeoJSON order: `[lng, lat]`.
    coordinates: Vec<[f64; 2]>,
}

/// Routes over an OSRM `route/v1` endpoint with GeoJSON geometry.
pub struct OsrmProvider {
    client: Client,
    base_url: String,
    profile: String,
}

impl OsrmProvider {
    pub fn new(config: &RoutingConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            profile: config.profile.clone(),
        })
    }

    fn url(&self, from: LatLng, to: LatLng) -> String {
        format!(
            "{}/route/v1/{}/{:.6},{:.6};{:.6},{:.6}?overview=full&geometries=geojson",
            self.base_url, self.profile, from.lng, from.lat, to.lng, to.lat
        )
    }
}

/// Extract the first route's geometry as `(lat, lng)` points.
pub fn parse_route_response(body: &str) -> Result<Vec<LatLng>> {
    let response: RouteResponse =
        serde_json::from_str(body).map_err(|e| RoutingError::InvalidResponse(e.to_string()))?;

    if response.code != "Ok" {
        return Err(RoutingError::NoRoute(
            response.message.unwrap_or(response.code),
        ));
    }

    let route = response
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| RoutingError::NoRoute("empty route list".to_string()))?;

    let points: Vec<LatLng> = route
        .geometry
        .coordinates
        .into_iter()
        .map(|[lng, lat]| LatLng::new(lat, lng))
        .filter(LatLng::is_valid)
        .collect();

    if points.is_empty() {
        return Err(RoutingError::NoRoute("empty geometry".to_string()));
    }
    Ok(points)
}

#[async_trait]
impl RoutingProvider for OsrmProvider {
    #[tracing::instrument(name = "osrm.route", skip(self), fields(from = %from.rounded_key(), to = %to.rounded_key()))]
    async fn route(&self, from: LatLng, to: LatLng) -> Result<Vec<LatLng>> {
        let response = self.client.get(self.url(from, to)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RoutingError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let points = parse_route_response(&body)?;
        debug!(points = points.len(), "Route resolved");
        Ok(points)
    }

    fn name(&self) -> &str {
        "osrm"
    }
}
