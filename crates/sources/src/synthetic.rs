//! Seeded Synthetic Weather and AQI
//!
//! Each hour's reading is drawn from an RNG seeded by the configured seed
//! and the hour itself, so any window of history is reproducible no matter
//! how it is requested.

use crate::{Clock, ProxyHistorySource, RawReadingSource, SourceError, WeatherObservation};
use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use feature_engine::RawReading;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::{Arc, Mutex};
use tracing::debug;

const SECONDS_PER_HOUR: i64 = 3600;

/// Generator parameters; defaults reproduce a hot, humid coastal city
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticParams {
    pub seed: u64,
    pub base_temp: f64,
    pub temp_amplitude: f64,
    pub temp_noise: f64,
    pub base_humidity: f64,
    pub humidity_amplitude: f64,
    pub humidity_noise: f64,
    pub wind_min: f64,
    pub wind_max: f64,
    pub pressure_min: f64,
    pub pressure_max: f64,
    pub aqi_base: f64,
    pub aqi_min: f64,
    pub aqi_max: f64,
    /// Proxy history span when no start is given
    pub proxy_days: i64,
    /// Spacing of proxy history points
    pub proxy_step_hours: i64,
}

impl Default for SyntheticParams {
    fn default() -> Self {
        Self {
            seed: 42,
            base_temp: 28.0,
            temp_amplitude: 7.0,
            temp_noise: 1.0,
            base_humidity: 65.0,
            humidity_amplitude: 10.0,
            humidity_noise: 3.0,
            wind_min: 3.0,
            wind_max: 20.0,
            pressure_min: 1005.0,
            pressure_max: 1015.0,
            aqi_base: 100.0,
            aqi_min: 40.0,
            aqi_max: 250.0,
            proxy_days: 5,
            proxy_step_hours: 3,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn hour_start(hour_index: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(hour_index * SECONDS_PER_HOUR, 0).single()
}

/// First whole hour at or after `t`
fn ceil_hour(t: DateTime<Utc>) -> i64 {
    let secs = t.timestamp();
    let exact = secs.rem_euclid(SECONDS_PER_HOUR) == 0 && t.timestamp_subsec_nanos() == 0;
    secs.div_euclid(SECONDS_PER_HOUR) + if exact { 0 } else { 1 }
}

/// Finite and strictly increasing
fn ascending(lo: f64, hi: f64) -> bool {
    lo.is_finite() && hi.is_finite() && lo < hi
}

fn floor_hour(t: DateTime<Utc>) -> i64 {
    t.timestamp().div_euclid(SECONDS_PER_HOUR)
}

/// Deterministic hourly reading provider
pub struct SyntheticReadings {
    params: SyntheticParams,
    temp_noise: Normal<f64>,
    humidity_noise: Normal<f64>,
    clock: Arc<dyn Clock>,
}

impl SyntheticReadings {
    pub fn new(params: SyntheticParams, clock: Arc<dyn Clock>) -> Result<Self, SourceError> {
        let invalid = SourceError::InvalidParameters;

        let temp_noise = Normal::new(0.0, params.temp_noise)
            .map_err(|e| invalid(format!("temp_noise: {}", e)))?;
        let humidity_noise = Normal::new(0.0, params.humidity_noise)
            .map_err(|e| invalid(format!("humidity_noise: {}", e)))?;
        if !ascending(params.wind_min, params.wind_max) {
            return Err(invalid("wind_min must be below wind_max".into()));
        }
        if !ascending(params.pressure_min, params.pressure_max) {
            return Err(invalid("pressure_min must be below pressure_max".into()));
        }
        if params.aqi_min.is_nan() || params.aqi_max.is_nan() || params.aqi_min > params.aqi_max {
            return Err(invalid("aqi_min must not exceed aqi_max".into()));
        }
        if params.proxy_step_hours < 1 || params.proxy_days < 0 {
            return Err(invalid("proxy window must be non-negative with a positive step".into()));
        }

        Ok(Self {
            params,
            temp_noise,
            humidity_noise,
            clock,
        })
    }

    pub fn params(&self) -> &SyntheticParams {
        &self.params
    }

    /// The reading for one whole hour (hours since the Unix epoch)
    fn reading_for_hour(&self, hour_index: i64) -> Option<RawReading> {
        let timestamp = hour_start(hour_index)?;
        let p = &self.params;
        let mut rng =
            StdRng::seed_from_u64(p.seed ^ (hour_index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));

        let hour_factor = (2.0 * PI * timestamp.hour() as f64 / 24.0).sin();
        let temp = p.base_temp + p.temp_amplitude * hour_factor + self.temp_noise.sample(&mut rng);
        let humidity =
            p.base_humidity - p.humidity_amplitude * hour_factor + self.humidity_noise.sample(&mut rng);
        let wind_speed = rng.gen_range(p.wind_min..p.wind_max);
        let pressure = rng.gen_range(p.pressure_min..p.pressure_max);

        // stagnant, humid air holds pollution; occasional spikes on top
        let spike = match rng.gen::<f64>() {
            u if u < 0.80 => 0.0,
            u if u < 0.95 => 20.0,
            _ => 40.0,
        };
        let aqi = (p.aqi_base + humidity * 0.3 - wind_speed * 1.5 + spike).clamp(p.aqi_min, p.aqi_max);

        Some(RawReading {
            timestamp,
            temp: round2(temp),
            humidity: round2(humidity),
            pressure: round2(pressure),
            wind_speed: round2(wind_speed),
            wind_deg: rng.gen_range(0.0..360.0),
            weather_main: "Clear".into(),
            weather_description: "clear sky".into(),
            aqi: round2(aqi),
            pm25: Some(aqi * 0.6),
            pm10: Some(aqi * 0.8),
            o3: Some(rng.gen_range(10.0..50.0)),
            no2: Some(rng.gen_range(10.0..60.0)),
            so2: Some(rng.gen_range(5.0..25.0)),
            co: Some(rng.gen_range(0.5..2.0)),
        })
    }

    fn hours(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        step: usize,
    ) -> Result<Vec<RawReading>, SourceError> {
        if since > until {
            return Err(SourceError::InvalidRange {
                start: since,
                end: until,
            });
        }
        Ok((ceil_hour(since)..=floor_hour(until))
            .step_by(step)
            .filter_map(|h| self.reading_for_hour(h))
            .collect())
    }
}

impl RawReadingSource for SyntheticReadings {
    fn pull(&self, since: DateTime<Utc>, until: DateTime<Utc>) -> Result<Vec<RawReading>, SourceError> {
        let readings = self.hours(since, until, 1)?;
        debug!("Synthesized {} hourly readings", readings.len());
        Ok(readings)
    }

    fn current(&self) -> Result<RawReading, SourceError> {
        let now = self.clock.now();
        self.reading_for_hour(floor_hour(now))
            .ok_or_else(|| SourceError::UpstreamFetch {
                source_name: "synthetic".into(),
                reason: format!("no reading representable at {}", now),
            })
    }
}

impl ProxyHistorySource for SyntheticReadings {
    fn history(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<WeatherObservation>, SourceError> {
        let end = end.unwrap_or_else(|| self.clock.now());
        let start = start.unwrap_or(end - Duration::days(self.params.proxy_days));
        let step = usize::try_from(self.params.proxy_step_hours).unwrap_or(1).max(1);

        let observations: Vec<WeatherObservation> = self
            .hours(start, end, step)?
            .iter()
            .map(WeatherObservation::from)
            .collect();
        debug!("Synthesized {} proxy observations", observations.len());
        Ok(observations)
    }
}

/// Stand-in AQI values for proxy history: uniform integers in `[low, high)`
pub struct AqiSynthesizer {
    rng: Mutex<StdRng>,
    low: u32,
    high: u32,
}

impl AqiSynthesizer {
    pub fn new(seed: u64) -> Self {
        Self::with_range(seed, 40, 160)
    }

    pub fn with_range(seed: u64, low: u32, high: u32) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            low,
            high: high.max(low + 1),
        }
    }

    pub fn synthesize(&self, n: usize) -> Vec<f64> {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        (0..n)
            .map(|_| rng.gen_range(self.low..self.high) as f64)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FixedClock;
    use proptest::prelude::*;

    fn at(hours: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap() + Duration::hours(hours)
    }

    fn generator(seed: u64) -> SyntheticReadings {
        let params = SyntheticParams {
            seed,
            ..SyntheticParams::default()
        };
        SyntheticReadings::new(params, Arc::new(FixedClock(at(100)))).unwrap()
    }

    #[test]
    fn test_pull_is_hourly_and_inclusive() {
        let readings = generator(1).pull(at(0), at(47)).unwrap();
        assert_eq!(readings.len(), 48);
        assert_eq!(readings[0].timestamp, at(0));
        assert_eq!(readings[47].timestamp, at(47));
        assert!(readings
            .windows(2)
            .all(|w| w[1].timestamp - w[0].timestamp == Duration::hours(1)));
    }

    #[test]
    fn test_partial_hours_are_aligned() {
        let since = at(0) + Duration::minutes(10);
        let until = at(3) + Duration::minutes(59);
        let readings = generator(1).pull(since, until).unwrap();
        assert_eq!(readings.len(), 3);
        assert_eq!(readings[0].timestamp, at(1));
    }

    #[test]
    fn test_overlapping_windows_agree() {
        let g = generator(9);
        let a = g.pull(at(0), at(10)).unwrap();
        let b = g.pull(at(5), at(20)).unwrap();
        assert_eq!(a[5], b[0]);
    }

    #[test]
    fn test_seed_changes_values() {
        let a = generator(1).pull(at(0), at(5)).unwrap();
        let b = generator(2).pull(at(0), at(5)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_pollutant_ratios() {
        for r in generator(3).pull(at(0), at(23)).unwrap() {
            let pm25 = r.pm25.unwrap();
            assert!((pm25 / 0.6 - r.aqi).abs() < 0.01);
            assert!((r.pm10.unwrap() / 0.8 - r.aqi).abs() < 0.01);
            assert!((0.5..2.0).contains(&r.co.unwrap()));
        }
    }

    #[test]
    fn test_current_uses_clock() {
        let reading = generator(1).current().unwrap();
        assert_eq!(reading.timestamp, at(100));
    }

    #[test]
    fn test_inverted_range_rejected() {
        assert!(matches!(
            generator(1).pull(at(5), at(1)),
            Err(SourceError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_proxy_history_defaults_to_five_days_every_three_hours() {
        let history = generator(1).history(None, None).unwrap();
        assert_eq!(history.len(), 5 * 24 / 3 + 1);
        assert_eq!(history.last().unwrap().timestamp, at(100));
        assert_eq!(history[1].timestamp - history[0].timestamp, Duration::hours(3));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let params = SyntheticParams {
            wind_min: 10.0,
            wind_max: 5.0,
            ..SyntheticParams::default()
        };
        assert!(matches!(
            SyntheticReadings::new(params, Arc::new(FixedClock(at(0)))),
            Err(SourceError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_synthesized_aqi_range() {
        let values = AqiSynthesizer::new(7).synthesize(500);
        assert!(values.iter().all(|v| (40.0..160.0).contains(v) && v.fract() == 0.0));
        assert_eq!(AqiSynthesizer::new(7).synthesize(10), values[..10].to_vec());
    }

    proptest! {
        #[test]
        fn prop_aqi_is_clamped(seed in any::<u64>(), hour in 0i64..10_000) {
            let readings = generator(seed).pull(at(hour), at(hour)).unwrap();
            prop_assert_eq!(readings.len(), 1);
            prop_assert!((40.0..=250.0).contains(&readings[0].aqi));
        }
    }
}
