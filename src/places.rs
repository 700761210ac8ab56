//! Nearby-places search client.
//!
//! One blocking GET against the places endpoint per run, with a bounded
//! timeout and a single retry on transient failure. The demographic pipeline
//! does not depend on this call succeeding.

use reqwest::blocking::Client;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::warn;

use crate::config::PlacesConfig;
use crate::error::PipelineError;
use crate::types::PointOfInterest;

const SEARCH_URL: &str = "https://maps.googleapis.com/maps/api/place/nearbysearch/json";

pub struct PlacesClient {
    client: Client,
    api_key: String,
}

impl PlacesClient {
    /// The credential is read once at the composition root and handed in
    /// here; nothing in this module touches process-global state.
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::ExternalService(e.to_string()))?;
        Ok(Self { client, api_key })
    }

    /// Search for the configured keyword around the configured location and
    /// return the result coordinates. Retried once if the failure looks
    /// transient (timeout, connection error, 5xx); a malformed response body
    /// is not retried.
    pub fn search(&self, config: &PlacesConfig) -> Result<Vec<PointOfInterest>, PipelineError> {
        let body = match self.send(config) {
            Ok(body) => body,
            Err(err) if err.is_transient() => {
                warn!("places search failed ({err}); retrying once");
                self.send(config)
                    .map_err(|e| PipelineError::ExternalService(e.to_string()))?
            }
            Err(err) => return Err(PipelineError::ExternalService(err.to_string())),
        };
        parse_results(&body)
    }

    fn send(&self, config: &PlacesConfig) -> Result<String, SendError> {
        let radius = config.radius_m.to_string();
        let query = [
            ("location", config.location.as_str()),
            ("radius", radius.as_str()),
            ("keyword", config.keyword.as_str()),
            ("key", self.api_key.as_str()),
        ];

        let response = self
            .client
            .get(SEARCH_URL)
            .query(&query)
            .send()
            .map_err(SendError::Http)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SendError::Status(status));
        }
        response.text().map_err(SendError::Http)
    }
}

enum SendError {
    Http(reqwest::Error),
    Status(reqwest::StatusCode),
}

impl SendError {
    fn is_transient(&self) -> bool {
        match self {
            SendError::Http(err) => err.is_timeout() || err.is_connect(),
            SendError::Status(status) => status.is_server_error(),
        }
    }
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::Http(err) => write!(f, "{err}"),
            SendError::Status(status) => write!(f, "request failed with status {status}"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    geometry: ResultGeometry,
}

#[derive(Debug, Deserialize)]
struct ResultGeometry {
    location: ResultLocation,
}

#[derive(Debug, Deserialize)]
struct ResultLocation {
    lat: f64,
    lng: f64,
}

fn parse_results(body: &str) -> Result<Vec<PointOfInterest>, PipelineError> {
    let response: SearchResponse = serde_json::from_str(body)
        .map_err(|e| PipelineError::ExternalService(format!("malformed response: {e}")))?;

    if let Some(status) = &response.status {
        if status != "OK" && status != "ZERO_RESULTS" {
            return Err(PipelineError::ExternalService(format!(
                "search returned status {status}"
            )));
        }
    }

    Ok(response
        .results
        .into_iter()
        .map(|result| PointOfInterest {
            latitude: result.geometry.location.lat,
            longitude: result.geometry.location.lng,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_result_coordinates() {
        let body = r#"{
            "status": "OK",
            "results": [
                {"geometry": {"location": {"lat": 29.4241, "lng": -98.4936}}},
                {"geometry": {"location": {"lat": 29.5, "lng": -98.4}}}
            ]
        }"#;
        let points = parse_results(body).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].latitude, 29.4241);
        assert_eq!(points[0].longitude, -98.4936);
    }

    #[test]
    fn zero_results_is_not_an_error() {
        let body = r#"{"status": "ZERO_RESULTS", "results": []}"#;
        assert!(parse_results(body).unwrap().is_empty());
    }

    #[test]
    fn non_ok_status_is_an_error() {
        let body = r#"{"status": "REQUEST_DENIED", "results": []}"#;
        let err = parse_results(body).unwrap_err();
        assert!(matches!(err, PipelineError::ExternalService(_)));
        assert!(err.to_string().contains("REQUEST_DENIED"));
    }

    #[test]
    fn malformed_body_is_an_error() {
        let err = parse_results("not json").unwrap_err();
        assert!(matches!(err, PipelineError::ExternalService(_)));
    }
}
