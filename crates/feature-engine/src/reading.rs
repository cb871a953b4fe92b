//! Raw Environmental Readings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One time-stamped weather + air quality observation.
///
/// Pollutant concentrations are optional; providers frequently omit some of
/// them. Readings are never mutated once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawReading {
    pub timestamp: DateTime<Utc>,
    /// Air temperature (°C)
    pub temp: f64,
    /// Relative humidity (%)
    pub humidity: f64,
    /// Pressure (hPa)
    pub pressure: f64,
    /// Wind speed (m/s)
    pub wind_speed: f64,
    /// Wind direction (degrees)
    pub wind_deg: f64,
    pub weather_main: String,
    pub weather_description: String,
    pub aqi: f64,
    #[serde(default)]
    pub pm25: Option<f64>,
    #[serde(default)]
    pub pm10: Option<f64>,
    #[serde(default)]
    pub o3: Option<f64>,
    #[serde(default)]
    pub no2: Option<f64>,
    #[serde(default)]
    pub so2: Option<f64>,
    #[serde(default)]
    pub co: Option<f64>,
}

/// Pollutant series that receive lag and rolling-window features
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pollutant {
    Pm25,
    Pm10,
    O3,
    No2,
    So2,
    Co,
    Aqi,
}

impl Pollutant {
    /// Every pollutant, in feature column order
    pub const ALL: [Pollutant; 7] = [
        Pollutant::Pm25,
        Pollutant::Pm10,
        Pollutant::O3,
        Pollutant::No2,
        Pollutant::So2,
        Pollutant::Co,
        Pollutant::Aqi,
    ];

    /// Column name of the raw series
    pub fn column(&self) -> &'static str {
        match self {
            Pollutant::Pm25 => "pm25",
            Pollutant::Pm10 => "pm10",
            Pollutant::O3 => "o3",
            Pollutant::No2 => "no2",
            Pollutant::So2 => "so2",
            Pollutant::Co => "co",
            Pollutant::Aqi => "aqi",
        }
    }
}

impl RawReading {
    /// Value of a pollutant series for this reading
    pub fn pollutant(&self, pollutant: Pollutant) -> Option<f64> {
        match pollutant {
            Pollutant::Pm25 => self.pm25,
            Pollutant::Pm10 => self.pm10,
            Pollutant::O3 => self.o3,
            Pollutant::No2 => self.no2,
            Pollutant::So2 => self.so2,
            Pollutant::Co => self.co,
            Pollutant::Aqi => Some(self.aqi),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::hourly_readings;

    #[test]
    fn test_aqi_always_present() {
        let reading = &hourly_readings(1, |_| 80.0)[0];
        assert_eq!(reading.pollutant(Pollutant::Aqi), Some(80.0));
        assert_eq!(reading.pollutant(Pollutant::Pm10), None);
    }

    #[test]
    fn test_missing_pollutants_deserialize_as_none() {
        let json = r#"{
            "timestamp": "2024-03-04T00:00:00Z",
            "temp": 25.0, "humidity": 60.0, "pressure": 1010.0,
            "wind_speed": 3.0, "wind_deg": 90.0,
            "weather_main": "Clear", "weather_description": "clear sky",
            "aqi": 42.0
        }"#;
        let reading: RawReading = serde_json::from_str(json).unwrap();
        assert!(reading.pm25.is_none());
        assert_eq!(reading.aqi, 42.0);
    }
}
