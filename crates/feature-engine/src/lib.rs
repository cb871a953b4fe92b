//! Feature Engineering Engine
//!
//! Turns raw environmental readings into AQI model features: calendar and
//! cyclic encodings, per-pollutant lag and rolling-window statistics,
//! weather interactions and one-hot weather descriptors. Also builds the
//! flattened lookback windows used for supervised training and fits the
//! normalization applied to them.

mod category;
mod error;
mod features;
mod normalizer;
mod reading;
mod statistics;
mod window;

pub use category::AqiCategory;
pub use error::FeatureError;
pub use features::{
    create_features, FeatureEngineer, FeatureFrame, FeatureVector, DAILY_LAG, ROLLING_WINDOW,
};
pub use normalizer::{scale_features, FittedScaler, NormalizationMethod, ScaledFeatures};
pub use reading::{Pollutant, RawReading};
pub use statistics::WindowStatistics;
pub use window::{inference_input, prepare_training_data, TrainingSet, DEFAULT_LOOKBACK, DEFAULT_TARGET};
