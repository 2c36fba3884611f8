use std::env;

use futures::future::join_all;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::domain::analysis::{RouteAnalysisResult, RoutePathInfo};
use crate::domain::location::Coordinates;

const DEFAULT_BASE_URL: &str = "https://api.openrouteservice.org";

/// Thin OpenRouteService directions client. Strictly best-effort: any
/// failure leaves the straight-line route untouched.
pub struct OrsClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OrsClient {
    /// Built from `ORS_API_KEY` / `ORS_BASE_URL`; None when no key is set.
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("ORS_API_KEY").ok()?;
        let base_url = env::var("ORS_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Some(OrsClient {
            client: Client::new(),
            api_key,
            base_url,
        })
    }

    /// Road geometry for one leg as a (lat, lon) polyline.
    pub async fn directions(&self, from: Coordinates, to: Coordinates) -> Option<Vec<Coordinates>> {
        let url = format!("{}/v2/directions/driving-car/geojson", self.base_url);
        // ORS wants longitude,latitude in that order
        let body = json!({
            "coordinates": [[from.1, from.0], [to.1, to.0]],
        });
        debug!("ors directions: POST {url}");

        let response = match self
            .client
            .post(&url)
            .header("Authorization", &self.api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                error!("ors directions request failed: {e}");
                return None;
            }
        };

        let payload: Value = match response.json().await {
            Ok(v) => v,
            Err(e) => {
                error!("ors directions: failed to parse response: {e}");
                return None;
            }
        };

        let coordinates = payload["features"][0]["geometry"]["coordinates"].as_array()?;
        let path = coordinates
            .iter()
            .filter_map(|pair| {
                let lon = pair.get(0)?.as_f64()?;
                let lat = pair.get(1)?.as_f64()?;
                Some((lat, lon))
            })
            .collect();
        Some(path)
    }

    /// Fill `road_paths` for every vehicle route of a day result. Legs the
    /// service cannot resolve are simply skipped.
    pub async fn attach_road_paths(&self, result: &mut RouteAnalysisResult) {
        for trip in &mut result.trips {
            for vehicle_route in &mut trip.vehicle_routes {
                let legs: Vec<(Coordinates, Coordinates)> = vehicle_route
                    .stops
                    .windows(2)
                    .map(|pair| (pair[0].coordinates, pair[1].coordinates))
                    .collect();

                let fetched = join_all(
                    legs.iter()
                        .map(|(from, to)| self.directions(*from, *to)),
                )
                .await;

                vehicle_route.road_paths = legs
                    .into_iter()
                    .zip(fetched)
                    .filter_map(|((from, to), path)| {
                        path.map(|path| RoutePathInfo {
                            from_coords: from,
                            to_coords: to,
                            path,
                        })
                    })
                    .collect();
            }
        }
    }
}
