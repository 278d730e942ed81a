//! Tracked subjects, their size metrics and environmental covariates
//!
//! Everything domain-specific lives here: which metrics a subject carries,
//! where their fields are found in upstream records, how each covariate maps
//! onto a growth-rate effect, the plausible growth-rate band, and the
//! literature values used to anchor saturation curves.

use crate::data::ReferenceCalibrationPoint;
use crate::record::FieldResolver;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A tracked biological subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    /// Farmed fish
    Aquatic,
    /// Greenhouse plant
    Plant,
}

/// A tracked size metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Fish body length in centimetres
    Length,
    /// Fish body weight in grams
    Weight,
    /// Plant height in centimetres
    Height,
    /// Number of leaves on the plant
    LeafCount,
}

/// Shape of the saturation curve fitted for a subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveShape {
    VonBertalanffy,
    ExponentialSaturation,
}

/// Typical growth of a metric on the age axis under the neutral profile.
///
/// The literature anchors of a metric lie on this curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceCurve {
    pub asymptote: f64,
    /// Per-day rate under the neutral profile
    pub rate: f64,
    /// Age in days at which the curve leaves zero
    pub origin: f64,
}

impl ReferenceCurve {
    /// Value at `age_days` under the neutral profile
    pub fn value_at(&self, age_days: f64) -> f64 {
        self.value_with_rate(self.rate, age_days)
    }

    /// Value at `age_days` for an arbitrary per-day rate
    pub fn value_with_rate(&self, rate: f64, age_days: f64) -> f64 {
        (self.asymptote * (1.0 - (-rate * (age_days - self.origin)).exp())).max(0.01)
    }
}

/// How a covariate value maps onto a growth effect in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Response {
    /// `max(0, (v - low) / span)`, saturating at 1
    Ramp { low: f64, span: f64 },
    /// 1 inside `[low, high]`, falling linearly to 0 over `tolerance` outside
    Band { low: f64, high: f64, tolerance: f64 },
}

impl Response {
    pub fn effect(&self, value: f64) -> f64 {
        let effect = match *self {
            Response::Ramp { low, span } => ((value - low) / span).max(0.0),
            Response::Band {
                low,
                high,
                tolerance,
            } => {
                let distance = if value < low {
                    low - value
                } else if value > high {
                    value - high
                } else {
                    0.0
                };
                1.0 - distance / tolerance
            }
        };
        if effect.is_finite() {
            effect.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// An environmental covariate tracked for a subject
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CovariateSpec {
    pub name: &'static str,
    /// Field names tried in order against upstream records
    pub accessors: &'static [&'static str],
    /// Value used when a record does not carry the field
    pub default: f64,
    /// Value of the neutral profile used for calibration points
    pub neutral: f64,
    pub response: Response,
}

impl CovariateSpec {
    /// Normalized effect of this covariate within a covariate map
    pub fn effect_in(&self, covariates: &BTreeMap<String, f64>) -> f64 {
        let value = covariates.get(self.name).copied().unwrap_or(self.default);
        self.response.effect(value)
    }
}

const AQUATIC_COVARIATES: &[CovariateSpec] = &[
    CovariateSpec {
        name: "temperature",
        accessors: &["temperature", "water_temp", "waterTemperature", "sensors.temperature"],
        default: 15.0,
        neutral: 15.0,
        response: Response::Ramp {
            low: 4.0,
            span: 16.0,
        },
    },
    CovariateSpec {
        name: "dissolved_oxygen",
        accessors: &["dissolved_oxygen", "oxygen", "do", "sensors.oxygen"],
        default: 8.0,
        neutral: 8.0,
        response: Response::Ramp {
            low: 3.0,
            span: 5.0,
        },
    },
    CovariateSpec {
        name: "ph",
        accessors: &["ph", "pH", "sensors.ph"],
        default: 7.0,
        neutral: 7.0,
        response: Response::Band {
            low: 6.5,
            high: 8.5,
            tolerance: 1.5,
        },
    },
];

const PLANT_COVARIATES: &[CovariateSpec] = &[
    CovariateSpec {
        name: "temperature",
        accessors: &["temperature", "air_temp", "airTemperature", "sensors.temperature"],
        default: 22.0,
        neutral: 22.0,
        response: Response::Ramp {
            low: 10.0,
            span: 15.0,
        },
    },
    CovariateSpec {
        name: "humidity",
        accessors: &["humidity", "relative_humidity", "sensors.humidity"],
        default: 60.0,
        neutral: 60.0,
        response: Response::Band {
            low: 50.0,
            high: 80.0,
            tolerance: 30.0,
        },
    },
    CovariateSpec {
        name: "light",
        accessors: &["light", "lux", "light_intensity", "sensors.light"],
        default: 12_000.0,
        neutral: 12_000.0,
        response: Response::Ramp {
            low: 1_000.0,
            span: 19_000.0,
        },
    },
];

/// Average length of a month in days, for literature tables given in months
pub const DAYS_PER_MONTH: f64 = 30.44;

impl Subject {
    pub const ALL: [Subject; 2] = [Subject::Aquatic, Subject::Plant];

    pub fn name(&self) -> &'static str {
        match self {
            Subject::Aquatic => "aquatic",
            Subject::Plant => "plant",
        }
    }

    pub fn metrics(&self) -> &'static [Metric] {
        match self {
            Subject::Aquatic => &[Metric::Length, Metric::Weight],
            Subject::Plant => &[Metric::Height, Metric::LeafCount],
        }
    }

    pub fn covariates(&self) -> &'static [CovariateSpec] {
        match self {
            Subject::Aquatic => AQUATIC_COVARIATES,
            Subject::Plant => PLANT_COVARIATES,
        }
    }

    pub fn curve_shape(&self) -> CurveShape {
        match self {
            Subject::Aquatic => CurveShape::VonBertalanffy,
            Subject::Plant => CurveShape::ExponentialSaturation,
        }
    }

    /// Plausible band for the per-day growth rate `k`
    pub fn growth_rate_band(&self) -> (f64, f64) {
        match self {
            Subject::Aquatic => (0.002, 0.15),
            Subject::Plant => (0.003, 0.12),
        }
    }

    /// Covariate values describing an unremarkable day
    pub fn neutral_profile(&self) -> BTreeMap<String, f64> {
        self.covariates()
            .iter()
            .map(|spec| (spec.name.to_string(), spec.neutral))
            .collect()
    }

    /// Normalized effects of a covariate map, in covariate order
    pub fn effects(&self, covariates: &BTreeMap<String, f64>) -> Vec<f64> {
        self.covariates()
            .iter()
            .map(|spec| spec.effect_in(covariates))
            .collect()
    }

    /// Resolution table for one of this subject's metrics
    pub fn resolver(&self, metric: Metric) -> FieldResolver {
        self.covariates().iter().fold(
            FieldResolver::new(metric.name(), metric.accessors()),
            |resolver, spec| resolver.with_covariate(spec.name, spec.accessors, spec.default),
        )
    }
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Length => "length",
            Metric::Weight => "weight",
            Metric::Height => "height",
            Metric::LeafCount => "leaf_count",
        }
    }

    pub fn subject(&self) -> Subject {
        match self {
            Metric::Length | Metric::Weight => Subject::Aquatic,
            Metric::Height | Metric::LeafCount => Subject::Plant,
        }
    }

    /// Field names tried in order against upstream records
    pub fn accessors(&self) -> &'static [&'static str] {
        match self {
            Metric::Length => &["length", "fish_length", "lengthCm", "measurements.length"],
            Metric::Weight => &["weight", "fish_weight", "weightGrams", "measurements.weight"],
            Metric::Height => &["height", "plant_height", "heightCm", "measurements.height"],
            Metric::LeafCount => &["leaf_count", "leaves", "leafCount", "measurements.leaves"],
        }
    }

    /// Typical curve of this metric, used by the synthetic source
    pub fn reference_curve(&self) -> ReferenceCurve {
        let (asymptote, rate, origin) = match self {
            Metric::Length => (45.0, 0.004, -10.0),
            Metric::Weight => (1_500.0, 0.0025, -12.0),
            Metric::Height => (120.0, 0.012, -5.0),
            Metric::LeafCount => (40.0, 0.04, -3.0),
        };
        ReferenceCurve {
            asymptote,
            rate,
            origin,
        }
    }

    /// Literature anchors as `(age in months, value)`
    fn literature(&self) -> &'static [(f64, f64)] {
        match self {
            Metric::Length => &[(3.0, 15.0), (6.0, 24.2), (12.0, 35.0), (24.0, 42.7)],
            Metric::Weight => &[(6.0, 577.9), (12.0, 915.9), (24.0, 1_265.6)],
            Metric::Height => &[(1.0, 41.6), (2.0, 65.6), (3.0, 82.2)],
            Metric::LeafCount => &[],
        }
    }

    /// Reference calibration points for this metric, in days of age
    pub fn calibration_points(&self) -> Vec<ReferenceCalibrationPoint> {
        self.literature()
            .iter()
            .map(|&(months, value)| ReferenceCalibrationPoint::from_months(months, value))
            .collect()
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
