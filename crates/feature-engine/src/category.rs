//! AQI Category Bands

use serde::{Deserialize, Serialize};
use std::fmt;

/// Six fixed AQI severity bands.
///
/// Each band's upper edge is inclusive: 50 is `Good`, 50.0001 is `Moderate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AqiCategory {
    #[serde(rename = "Good")]
    Good,
    #[serde(rename = "Moderate")]
    Moderate,
    #[serde(rename = "Unhealthy for Sensitive Groups")]
    UnhealthyForSensitiveGroups,
    #[serde(rename = "Unhealthy")]
    Unhealthy,
    #[serde(rename = "Very Unhealthy")]
    VeryUnhealthy,
    #[serde(rename = "Hazardous")]
    Hazardous,
}

impl AqiCategory {
    /// All bands from least to most severe
    pub const ALL: [AqiCategory; 6] = [
        AqiCategory::Good,
        AqiCategory::Moderate,
        AqiCategory::UnhealthyForSensitiveGroups,
        AqiCategory::Unhealthy,
        AqiCategory::VeryUnhealthy,
        AqiCategory::Hazardous,
    ];

    /// Map an AQI value to its band. Total over all f64 inputs; anything
    /// that is not `<= 300` (including NaN) is `Hazardous`.
    pub fn from_aqi(aqi: f64) -> Self {
        if aqi <= 50.0 {
            AqiCategory::Good
        } else if aqi <= 100.0 {
            AqiCategory::Moderate
        } else if aqi <= 150.0 {
            AqiCategory::UnhealthyForSensitiveGroups
        } else if aqi <= 200.0 {
            AqiCategory::Unhealthy
        } else if aqi <= 300.0 {
            AqiCategory::VeryUnhealthy
        } else {
            AqiCategory::Hazardous
        }
    }

    /// Inclusive upper edge of the band (infinite for `Hazardous`)
    pub fn upper_bound(&self) -> f64 {
        match self {
            AqiCategory::Good => 50.0,
            AqiCategory::Moderate => 100.0,
            AqiCategory::UnhealthyForSensitiveGroups => 150.0,
            AqiCategory::Unhealthy => 200.0,
            AqiCategory::VeryUnhealthy => 300.0,
            AqiCategory::Hazardous => f64::INFINITY,
        }
    }

    /// Human-readable label
    pub fn as_str(&self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::UnhealthyForSensitiveGroups => "Unhealthy for Sensitive Groups",
            AqiCategory::Unhealthy => "Unhealthy",
            AqiCategory::VeryUnhealthy => "Very Unhealthy",
            AqiCategory::Hazardous => "Hazardous",
        }
    }
}

impl fmt::Display for AqiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_band_edges_are_inclusive() {
        assert_eq!(AqiCategory::from_aqi(0.0), AqiCategory::Good);
        assert_eq!(AqiCategory::from_aqi(50.0), AqiCategory::Good);
        assert_eq!(AqiCategory::from_aqi(50.0001), AqiCategory::Moderate);
        assert_eq!(AqiCategory::from_aqi(100.0), AqiCategory::Moderate);
        assert_eq!(AqiCategory::from_aqi(150.0), AqiCategory::UnhealthyForSensitiveGroups);
        assert_eq!(AqiCategory::from_aqi(200.0), AqiCategory::Unhealthy);
        assert_eq!(AqiCategory::from_aqi(300.0), AqiCategory::VeryUnhealthy);
        assert_eq!(AqiCategory::from_aqi(300.5), AqiCategory::Hazardous);
    }

    #[test]
    fn test_nan_is_hazardous() {
        assert_eq!(AqiCategory::from_aqi(f64::NAN), AqiCategory::Hazardous);
    }

    #[test]
    fn test_labels() {
        assert_eq!(
            AqiCategory::UnhealthyForSensitiveGroups.to_string(),
            "Unhealthy for Sensitive Groups"
        );
        assert_eq!(AqiCategory::VeryUnhealthy.as_str(), "Very Unhealthy");
    }

    proptest! {
        #[test]
        fn prop_category_respects_bounds(aqi in -100.0f64..1000.0) {
            let category = AqiCategory::from_aqi(aqi);
            prop_assert!(aqi <= category.upper_bound());
            let position = AqiCategory::ALL.iter().position(|c| *c == category).unwrap();
            if position > 0 {
                prop_assert!(aqi > AqiCategory::ALL[position - 1].upper_bound());
            }
        }
    }
}
