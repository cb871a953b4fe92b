//! Static Daily Forecast

use crate::{ForecastPoint, ForecastSource, SourceError};
use serde::{Deserialize, Serialize};

/// Fixed list of daily forecast points, served in order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticForecast {
    pub points: Vec<ForecastPoint>,
}

impl StaticForecast {
    pub fn new(points: Vec<ForecastPoint>) -> Self {
        Self { points }
    }
}

impl Default for StaticForecast {
    fn default() -> Self {
        Self::new(vec![
            ForecastPoint { temp: 25.0, humidity: 60.0 },
            ForecastPoint { temp: 26.0, humidity: 55.0 },
            ForecastPoint { temp: 24.0, humidity: 65.0 },
        ])
    }
}

impl ForecastSource for StaticForecast {
    fn forecast(&self, horizon_days: usize) -> Result<Vec<ForecastPoint>, SourceError> {
        Ok(self.points.iter().take(horizon_days).copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_points() {
        let points = StaticForecast::default().forecast(3).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[1], ForecastPoint { temp: 26.0, humidity: 55.0 });
    }

    #[test]
    fn test_short_forecast_is_not_an_error() {
        assert_eq!(StaticForecast::default().forecast(7).unwrap().len(), 3);
        assert!(StaticForecast::default().forecast(0).unwrap().is_empty());
    }
}
