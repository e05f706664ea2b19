//! External lookups for Atlas.
//!
//! Currently a single one: current weather conditions for a place name via
//! the keyless Open-Meteo APIs.

pub mod weather;

pub use weather::{WeatherClient, WeatherError, WeatherSummary, wmo_label};
