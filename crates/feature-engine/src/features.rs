//! Feature Frame Assembly

use crate::category::AqiCategory;
use crate::error::FeatureError;
use crate::normalizer::{scale_features, NormalizationMethod, ScaledFeatures};
use crate::reading::{Pollutant, RawReading};
use crate::statistics::{diff, fill_forward_backward, lag, rolling_mean, rolling_std};
use crate::window::{prepare_training_data, TrainingSet};
use chrono::{DateTime, Datelike, Timelike, Utc};
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::f64::consts::PI;
use std::ops::Range;
use tracing::debug;

/// Lag used for the day-over-day feature (hourly samples)
pub const DAILY_LAG: usize = 24;

/// Trailing window for rolling mean / std
pub const ROLLING_WINDOW: usize = 24;

/// Raw weather measurements copied straight from the reading
const WEATHER_COLUMNS: [&str; 5] = ["temp", "humidity", "pressure", "wind_speed", "wind_deg"];

/// Features that depend only on the reading itself (no history)
const DERIVED_COLUMNS: [&str; 11] = [
    "hour",
    "day",
    "month",
    "weekday",
    "is_weekend",
    "hour_sin",
    "hour_cos",
    "month_sin",
    "month_cos",
    "temp_humidity_interaction",
    "wind_temp_interaction",
];

fn weather_main(reading: &RawReading) -> &str {
    &reading.weather_main
}

fn weather_description(reading: &RawReading) -> &str {
    &reading.weather_description
}

/// Categorical fields expanded into `<field>_<label>` indicator columns
const ONE_HOT_FIELDS: [(&str, fn(&RawReading) -> &str); 2] = [
    ("weather_main", weather_main),
    ("weather_description", weather_description),
];

fn weather_values(reading: &RawReading) -> [f64; 5] {
    [
        reading.temp,
        reading.humidity,
        reading.pressure,
        reading.wind_speed,
        reading.wind_deg,
    ]
}

fn derived_values(reading: &RawReading) -> [f64; 11] {
    let hour = reading.timestamp.hour() as f64;
    let month = reading.timestamp.month() as f64;
    let weekday = reading.timestamp.weekday().num_days_from_monday();

    [
        hour,
        reading.timestamp.day() as f64,
        month,
        weekday as f64,
        if weekday >= 5 { 1.0 } else { 0.0 },
        (2.0 * PI * hour / 24.0).sin(),
        (2.0 * PI * hour / 24.0).cos(),
        (2.0 * PI * month / 12.0).sin(),
        (2.0 * PI * month / 12.0).cos(),
        reading.temp * reading.humidity,
        reading.wind_speed * reading.temp,
    ]
}

fn history_columns(pollutant: Pollutant) -> [String; 5] {
    let name = pollutant.column();
    [
        format!("{name}_lag_1"),
        format!("{name}_lag_{DAILY_LAG}"),
        format!("{name}_rolling_mean_{ROLLING_WINDOW}"),
        format!("{name}_rolling_std_{ROLLING_WINDOW}"),
        format!("{name}_change_rate"),
    ]
}

/// Whether a column is a one-hot indicator (absent label means 0)
pub(crate) fn is_one_hot(column: &str) -> bool {
    ONE_HOT_FIELDS
        .iter()
        .any(|(field, _)| column.strip_prefix(*field).is_some_and(|rest| rest.starts_with('_')))
}

fn indicator(flag: bool) -> f64 {
    if flag {
        1.0
    } else {
        0.0
    }
}

/// One derived feature row, self-describing for storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Source reading the features were derived from
    pub reading: RawReading,
    /// Discretized AQI band of the reading
    pub aqi_category: AqiCategory,
    /// Numeric features by column name
    pub features: BTreeMap<String, f64>,
}

impl FeatureVector {
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.reading.timestamp
    }
}

/// Columnar feature table: one row per input reading, fixed column order
#[derive(Debug, Clone)]
pub struct FeatureFrame {
    columns: Vec<String>,
    readings: Vec<RawReading>,
    categories: Vec<AqiCategory>,
    values: Array2<f64>,
}

/// Columns accumulated before gap filling
struct ColumnBuilder {
    columns: Vec<String>,
    data: Vec<Vec<Option<f64>>>,
}

impl ColumnBuilder {
    fn new() -> Self {
        Self {
            columns: Vec::new(),
            data: Vec::new(),
        }
    }

    fn push(&mut self, name: impl Into<String>, series: Vec<Option<f64>>) {
        self.columns.push(name.into());
        self.data.push(series);
    }

    fn finish(self, readings: Vec<RawReading>) -> FeatureFrame {
        let filled: Vec<Vec<f64>> = self.data.iter().map(|c| fill_forward_backward(c)).collect();
        let values = Array2::from_shape_fn((readings.len(), self.columns.len()), |(row, col)| {
            filled[col][row]
        });
        let categories = readings.iter().map(|r| AqiCategory::from_aqi(r.aqi)).collect();

        FeatureFrame {
            columns: self.columns,
            readings,
            categories,
            values,
        }
    }
}

/// Build the feature frame for a time-ordered reading sequence.
///
/// The output has exactly one row per reading. Lag and rolling values that
/// lack history are filled forward then backward, so every cell is defined.
pub fn create_features(readings: &[RawReading]) -> FeatureFrame {
    if readings.is_empty() {
        return FeatureFrame::empty();
    }

    let pollutants: Vec<Pollutant> = Pollutant::ALL
        .into_iter()
        .filter(|p| readings.iter().any(|r| r.pollutant(*p).is_some()))
        .collect();

    let mut builder = ColumnBuilder::new();

    let weather: Vec<[f64; 5]> = readings.iter().map(weather_values).collect();
    for (idx, name) in WEATHER_COLUMNS.iter().enumerate() {
        builder.push(*name, weather.iter().map(|w| Some(w[idx])).collect());
    }

    let raw: Vec<Vec<Option<f64>>> = pollutants
        .iter()
        .map(|p| readings.iter().map(|r| r.pollutant(*p)).collect())
        .collect();
    for (pollutant, series) in pollutants.iter().zip(&raw) {
        builder.push(pollutant.column(), series.clone());
    }

    let derived: Vec<[f64; 11]> = readings.iter().map(derived_values).collect();
    for (idx, name) in DERIVED_COLUMNS.iter().enumerate() {
        builder.push(*name, derived.iter().map(|d| Some(d[idx])).collect());
    }

    for (pollutant, series) in pollutants.iter().zip(&raw) {
        let [lag_1, lag_daily, mean, std, change] = history_columns(*pollutant);
        builder.push(lag_1, lag(series, 1));
        builder.push(lag_daily, lag(series, DAILY_LAG));
        builder.push(mean, rolling_mean(series, ROLLING_WINDOW));
        builder.push(std, rolling_std(series, ROLLING_WINDOW));
        builder.push(change, diff(series));
    }

    for (field, accessor) in ONE_HOT_FIELDS {
        let labels: BTreeSet<&str> = readings.iter().map(accessor).collect();
        for label in labels {
            builder.push(
                format!("{field}_{label}"),
                readings.iter().map(|r| Some(indicator(accessor(r) == label))).collect(),
            );
        }
    }

    let frame = builder.finish(readings.to_vec());
    debug!(
        "Created {} feature columns for {} readings",
        frame.columns.len(),
        frame.len()
    );
    frame
}

impl FeatureFrame {
    /// Frame with no rows and no columns
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            readings: Vec::new(),
            categories: Vec::new(),
            values: Array2::zeros((0, 0)),
        }
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Column names in frame order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn readings(&self) -> &[RawReading] {
        &self.readings
    }

    pub fn categories(&self) -> &[AqiCategory] {
        &self.categories
    }

    /// Row-major value matrix (rows × columns)
    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.column_index(name).map(|idx| self.values.column(idx))
    }

    pub fn value(&self, row: usize, name: &str) -> Option<f64> {
        let col = self.column_index(name)?;
        self.values.get((row, col)).copied()
    }

    /// Split the frame into self-describing rows for storage
    pub fn to_vectors(&self) -> Vec<FeatureVector> {
        self.readings
            .iter()
            .enumerate()
            .map(|(row, reading)| FeatureVector {
                reading: reading.clone(),
                aqi_category: self.categories[row],
                features: self
                    .columns
                    .iter()
                    .cloned()
                    .zip(self.values.row(row).iter().copied())
                    .collect(),
            })
            .collect()
    }

    /// Map a model schema onto this frame's columns.
    ///
    /// One-hot columns for labels that do not occur here resolve to `None`
    /// (constant zero). Any other missing column is a schema mismatch.
    pub fn resolve_schema(&self, schema: &[String]) -> Result<Vec<Option<usize>>, FeatureError> {
        schema
            .iter()
            .map(|name| match self.column_index(name) {
                Some(idx) => Ok(Some(idx)),
                None if is_one_hot(name) => Ok(None),
                None => Err(FeatureError::SchemaMismatch(name.clone())),
            })
            .collect()
    }

    /// Flatten consecutive rows into one vector, row by row, in schema order
    pub(crate) fn flatten_rows(&self, rows: Range<usize>, resolved: &[Option<usize>]) -> Vec<f64> {
        let mut flat = Vec::with_capacity(rows.len() * resolved.len());
        for row in rows {
            for source in resolved {
                flat.push(source.map_or(0.0, |col| self.values[(row, col)]));
            }
        }
        flat
    }

    /// Append a forecast row built from `reading` onto a copy of this frame.
    ///
    /// Row-local features (weather, pollutants present on the reading,
    /// calendar, cyclic, interactions, one-hot) are recomputed from the
    /// reading. Lag, rolling and change-rate features cannot be known for a
    /// future step and are copied unchanged from the last known row.
    pub fn extend_with_forecast(&self, reading: RawReading) -> Result<FeatureFrame, FeatureError> {
        let last = self.len().checked_sub(1).ok_or(FeatureError::InsufficientData {
            required: 1,
            available: 0,
        })?;

        let mut row: Vec<f64> = self.values.row(last).to_vec();
        let mut set = |name: &str, value: f64| {
            if let Some(idx) = self.column_index(name) {
                row[idx] = value;
            }
        };

        for (name, value) in WEATHER_COLUMNS.into_iter().zip(weather_values(&reading)) {
            set(name, value);
        }
        for (name, value) in DERIVED_COLUMNS.into_iter().zip(derived_values(&reading)) {
            set(name, value);
        }
        for pollutant in Pollutant::ALL {
            if let Some(value) = reading.pollutant(pollutant) {
                set(pollutant.column(), value);
            }
        }
        for (idx, column) in self.columns.iter().enumerate() {
            for (field, accessor) in ONE_HOT_FIELDS {
                if let Some(label) = column
                    .strip_prefix(field)
                    .and_then(|rest| rest.strip_prefix('_'))
                {
                    row[idx] = indicator(accessor(&reading) == label);
                }
            }
        }

        let mut values = self.values.clone();
        values
            .push_row(ArrayView1::from(&row))
            .map_err(|_| FeatureError::DimensionMismatch {
                expected: self.columns.len(),
                actual: row.len(),
            })?;

        let mut readings = self.readings.clone();
        let mut categories = self.categories.clone();
        categories.push(AqiCategory::from_aqi(reading.aqi));
        readings.push(reading);

        Ok(FeatureFrame {
            columns: self.columns.clone(),
            readings,
            categories,
            values,
        })
    }
}

/// Stateless feature transform shared by the live, backfill, training and
/// inference paths, so every path produces the same schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureEngineer {
    normalization: NormalizationMethod,
}

impl FeatureEngineer {
    pub fn new(normalization: NormalizationMethod) -> Self {
        Self { normalization }
    }

    pub fn normalization(&self) -> NormalizationMethod {
        self.normalization
    }

    /// Build features for a reading sequence
    pub fn create_features(&self, readings: &[RawReading]) -> FeatureFrame {
        create_features(readings)
    }

    /// Build flattened lookback windows and next-step targets
    pub fn prepare_training_data(
        &self,
        frame: &FeatureFrame,
        target: &str,
        lookback: usize,
    ) -> Result<TrainingSet, FeatureError> {
        prepare_training_data(frame, target, lookback)
    }

    /// Fit normalization on `train` and apply it to both partitions
    pub fn scale_features(
        &self,
        train: &Array2<f64>,
        test: Option<&Array2<f64>>,
    ) -> Result<ScaledFeatures, FeatureError> {
        scale_features(self.normalization, train, test)
    }
}
