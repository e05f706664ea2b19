//! Weather lookup — Open-Meteo geocoding plus current conditions.
//!
//! Two calls per lookup: the place name is geocoded to coordinates, then the
//! forecast API is asked for the current temperature, apparent temperature,
//! humidity, wind speed and WMO weather code. No API key is needed.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Weather request timed out after {0}s")]
    Timeout(u64),

    #[error("Weather service unreachable: {0}")]
    Network(String),

    #[error("Weather service returned status {0}")]
    Status(u16),

    #[error("Unexpected weather response: {0}")]
    Decode(String),
}

/// A one-line description of the current weather at a place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherSummary {
    pub summary: String,
    pub place: String,
    pub code: i64,
}

/// Human-readable label for a WMO weather interpretation code.
pub fn wmo_label(code: i64) -> Option<&'static str> {
    Some(match code {
        0 => "clear sky",
        1 => "mainly clear",
        2 => "partly cloudy",
        3 => "overcast",
        45 => "fog",
        48 => "depositing rime fog",
        51 => "light drizzle",
        53 => "moderate drizzle",
        55 => "dense drizzle",
        56 => "light freezing drizzle",
        57 => "dense freezing drizzle",
        61 => "light rain",
        63 => "moderate rain",
        65 => "heavy rain",
        66 => "light freezing rain",
        67 => "heavy freezing rain",
        71 => "light snow",
        73 => "moderate snow",
        75 => "heavy snow",
        77 => "snow grains",
        80 => "light rain showers",
        81 => "moderate rain showers",
        82 => "violent rain showers",
        85 => "light snow showers",
        86 => "heavy snow showers",
        95 => "thunderstorm",
        96 => "thunderstorm with light hail",
        99 => "thunderstorm with heavy hail",
        _ => return None,
    })
}

pub struct WeatherClient {
    client: reqwest::Client,
    geocoding_url: String,
    forecast_url: String,
    timeout_secs: u64,
}

impl WeatherClient {
    /// A client for the public Open-Meteo endpoints with an 8 second timeout.
    pub fn new() -> Self {
        Self::with_endpoints(GEOCODING_URL, FORECAST_URL, 8)
    }

    pub fn with_endpoints(
        geocoding_url: impl Into<String>,
        forecast_url: impl Into<String>,
        timeout_secs: u64,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            geocoding_url: geocoding_url.into(),
            forecast_url: forecast_url.into(),
            timeout_secs,
        }
    }

    /// Current weather for `query`, or `None` when the place is unknown.
    pub async fn lookup(&self, query: &str) -> Result<Option<WeatherSummary>, WeatherError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(None);
        }

        let geo: GeocodingResponse = self
            .get_json(
                &self.geocoding_url,
                &[
                    ("name", query.to_string()),
                    ("count", "1".into()),
                    ("language", "en".into()),
                    ("format", "json".into()),
                ],
            )
            .await?;
        let Some(location) = geo.results.into_iter().next() else {
            debug!(query, "Place not found");
            return Ok(None);
        };

        let forecast: ForecastResponse = self
            .get_json(
                &self.forecast_url,
                &[
                    ("latitude", location.latitude.to_string()),
                    ("longitude", location.longitude.to_string()),
                    (
                        "current",
                        "temperature_2m,apparent_temperature,relative_humidity_2m,wind_speed_10m,weather_code"
                            .into(),
                    ),
                    ("timezone", "auto".into()),
                ],
            )
            .await?;
        let Some(current) = forecast.current else {
            return Ok(None);
        };

        Ok(Some(summarize(&location, &current)))
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, WeatherError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        if !response.status().is_success() {
            return Err(WeatherError::Status(response.status().as_u16()));
        }

        response.json().await.map_err(|e| {
            if e.is_timeout() {
                WeatherError::Timeout(self.timeout_secs)
            } else {
                WeatherError::Decode(e.to_string())
            }
        })
    }

    fn map_error(&self, e: reqwest::Error) -> WeatherError {
        if e.is_timeout() {
            WeatherError::Timeout(self.timeout_secs)
        } else {
            WeatherError::Network(e.to_string())
        }
    }
}

impl Default for WeatherClient {
    fn default() -> Self {
        Self::new()
    }
}

fn summarize(location: &GeoLocation, current: &CurrentWeather) -> WeatherSummary {
    let place = [Some(location.name.as_str()), location.country_code.as_deref()]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    let label = wmo_label(current.weather_code)
        .map(str::to_string)
        .unwrap_or_else(|| format!("weather code {}", current.weather_code));

    let summary = format!(
        "Weather for {place}: {label}, temp {}°C (feels like {}°C), humidity {}%, wind {} km/h. Updated: {}.",
        current.temperature_2m,
        current.apparent_temperature,
        current.relative_humidity_2m,
        current.wind_speed_10m,
        current.time.as_deref().unwrap_or("unknown"),
    );

    WeatherSummary {
        summary,
        place,
        code: current.weather_code,
    }
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<GeoLocation>,
}

#[derive(Debug, Deserialize)]
struct GeoLocation {
    name: String,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    country_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: Option<CurrentWeather>,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    #[serde(default)]
    time: Option<String>,
    temperature_2m: f64,
    apparent_temperature: f64,
    relative_humidity_2m: f64,
    wind_speed_10m: f64,
    weather_code: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::routing::get;
    use axum::{Json, Router};
    use std::collections::HashMap;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn open_meteo_stub() -> Router {
        Router::new()
            .route(
                "/search",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    if q.get("name").map(String::as_str) == Some("Kraków") {
                        Json(serde_json::json!({"results": [{
                            "name": "Kraków", "latitude": 50.06, "longitude": 19.94, "country_code": "PL"
                        }]}))
                    } else {
                        Json(serde_json::json!({"generationtime_ms": 0.1}))
                    }
                }),
            )
            .route(
                "/forecast",
                get(|| async {
                    Json(serde_json::json!({"current": {
                        "time": "2026-01-01T12:00",
                        "temperature_2m": 3.5,
                        "apparent_temperature": 0.5,
                        "relative_humidity_2m": 81,
                        "wind_speed_10m": 12.2,
                        "weather_code": 61
                    }}))
                }),
            )
    }

    #[test]
    fn wmo_labels() {
        assert_eq!(wmo_label(0), Some("clear sky"));
        assert_eq!(wmo_label(95), Some("thunderstorm"));
        assert_eq!(wmo_label(42), None);
    }

    #[test]
    fn unknown_code_is_spelled_out() {
        let location = GeoLocation {
            name: "Gdańsk".into(),
            latitude: 0.0,
            longitude: 0.0,
            country_code: None,
        };
        let current = CurrentWeather {
            time: None,
            temperature_2m: 1.0,
            apparent_temperature: -2.0,
            relative_humidity_2m: 90.0,
            wind_speed_10m: 30.0,
            weather_code: 42,
        };
        let s = summarize(&location, &current);
        assert_eq!(s.place, "Gdańsk");
        assert!(s.summary.contains("weather code 42"));
        assert!(s.summary.ends_with("Updated: unknown."));
    }

    #[tokio::test]
    async fn lookup_known_place() {
        let base = serve(open_meteo_stub()).await;
        let client = WeatherClient::with_endpoints(format!("{base}/search"), format!("{base}/forecast"), 5);

        let summary = client.lookup("Kraków").await.unwrap().unwrap();
        assert_eq!(summary.place, "Kraków, PL");
        assert_eq!(summary.code, 61);
        assert_eq!(
            summary.summary,
            "Weather for Kraków, PL: light rain, temp 3.5°C (feels like 0.5°C), humidity 81%, wind 12.2 km/h. Updated: 2026-01-01T12:00."
        );
    }

    #[tokio::test]
    async fn unknown_place_is_none() {
        let base = serve(open_meteo_stub()).await;
        let client = WeatherClient::with_endpoints(format!("{base}/search"), format!("{base}/forecast"), 5);
        assert!(client.lookup("Atlantis").await.unwrap().is_none());
        assert!(client.lookup("   ").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unreachable_service_is_an_error() {
        // nothing listens on port 9 of the loopback interface
        let client = WeatherClient::with_endpoints("http://127.0.0.1:9/search", "http://127.0.0.1:9/forecast", 2);
        assert!(client.lookup("Kraków").await.is_err());
    }
}
