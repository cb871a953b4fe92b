//! Upstream Collaborators
//!
//! Interfaces for everything the pipeline pulls from outside: raw readings,
//! forecast-derived proxy history, short-range weather forecasts and the
//! wall clock. Ships a deterministic synthetic provider and a static
//! forecast so the pipeline runs without network access.

mod forecast;
mod synthetic;

pub use forecast::StaticForecast;
pub use synthetic::{AqiSynthesizer, SyntheticParams, SyntheticReadings};

use chrono::{DateTime, Utc};
use feature_engine::RawReading;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Source errors
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Upstream fetch from {source_name} failed: {reason}")]
    UpstreamFetch { source_name: String, reason: String },
    #[error("Invalid time range: {start} is after {end}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("Invalid source parameters: {0}")]
    InvalidParameters(String),
}

/// Weather observation without air quality, as a forecast feed provides it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    pub timestamp: DateTime<Utc>,
    pub temp: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub wind_speed: f64,
    pub wind_deg: f64,
    pub weather_main: String,
    pub weather_description: String,
}

impl WeatherObservation {
    /// Complete the observation with an AQI value; pollutants stay unknown
    pub fn with_aqi(self, aqi: f64) -> RawReading {
        RawReading {
            timestamp: self.timestamp,
            temp: self.temp,
            humidity: self.humidity,
            pressure: self.pressure,
            wind_speed: self.wind_speed,
            wind_deg: self.wind_deg,
            weather_main: self.weather_main,
            weather_description: self.weather_description,
            aqi,
            pm25: None,
            pm10: None,
            o3: None,
            no2: None,
            so2: None,
            co: None,
        }
    }
}

impl From<&RawReading> for WeatherObservation {
    fn from(reading: &RawReading) -> Self {
        Self {
            timestamp: reading.timestamp,
            temp: reading.temp,
            humidity: reading.humidity,
            pressure: reading.pressure,
            wind_speed: reading.wind_speed,
            wind_deg: reading.wind_deg,
            weather_main: reading.weather_main.clone(),
            weather_description: reading.weather_description.clone(),
        }
    }
}

/// Forecast temperature and humidity for one future day
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub temp: f64,
    pub humidity: f64,
}

/// Time-stamped weather + AQI readings
pub trait RawReadingSource: Send + Sync {
    /// Readings with `since <= timestamp <= until`, ascending
    fn pull(&self, since: DateTime<Utc>, until: DateTime<Utc>) -> Result<Vec<RawReading>, SourceError>;

    /// The live reading
    fn current(&self) -> Result<RawReading, SourceError>;
}

/// Forecast-derived weather used in place of real history
pub trait ProxyHistorySource: Send + Sync {
    fn history(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<WeatherObservation>, SourceError>;
}

/// Daily temperature / humidity forecast
pub trait ForecastSource: Send + Sync {
    /// Up to `horizon_days` points, day 1 first. Fewer points than asked
    /// for is not an error.
    fn forecast(&self, horizon_days: usize) -> Result<Vec<ForecastPoint>, SourceError>;
}

/// Wall clock, injectable for tests
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
