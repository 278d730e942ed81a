//! Generic key-value records and per-domain field resolution
//!
//! Upstream batches arrive as loosely shaped maps whose field names vary by
//! device and firmware. A [`FieldResolver`] holds one ordered accessor list
//! per field and tries them in sequence, so the naming rules live in a single
//! table instead of being scattered through the aggregation code.

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A raw upstream record: field name to JSON value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style insert
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One way of locating a field inside a [`Record`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accessor {
    /// A top-level key
    Key(String),
    /// A nested path through objects, e.g. `sensors.temperature`
    Path(Vec<String>),
}

impl Accessor {
    /// Look the field up; `null` counts as absent
    pub fn lookup<'a>(&self, record: &'a Record) -> Option<&'a Value> {
        let found = match self {
            Accessor::Key(key) => record.get(key),
            Accessor::Path(segments) => {
                let (first, rest) = segments.split_first()?;
                rest.iter()
                    .try_fold(record.get(first)?, |value, segment| value.get(segment))
            }
        };
        found.filter(|value| !value.is_null())
    }
}

impl From<&str> for Accessor {
    fn from(spec: &str) -> Self {
        if spec.contains('.') {
            Accessor::Path(spec.split('.').map(str::to_string).collect())
        } else {
            Accessor::Key(spec.to_string())
        }
    }
}

/// Resolution rule for a covariate field
#[derive(Debug, Clone, PartialEq)]
pub struct CovariateRule {
    pub name: String,
    pub accessors: Vec<Accessor>,
    pub default: f64,
}

/// A record reduced to the tracked metric plus its covariates
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRecord {
    pub metric: f64,
    pub covariates: BTreeMap<String, f64>,
}

/// Ordered field-resolution table for one tracked metric
#[derive(Debug, Clone, PartialEq)]
pub struct FieldResolver {
    metric_name: String,
    metric: Vec<Accessor>,
    covariates: Vec<CovariateRule>,
}

impl FieldResolver {
    pub fn new(metric_name: &str, metric: &[&str]) -> Self {
        Self {
            metric_name: metric_name.to_string(),
            metric: metric.iter().map(|spec| Accessor::from(*spec)).collect(),
            covariates: Vec::new(),
        }
    }

    /// Add a covariate with its accessor order and fallback value
    pub fn with_covariate(mut self, name: &str, accessors: &[&str], default: f64) -> Self {
        self.covariates.push(CovariateRule {
            name: name.to_string(),
            accessors: accessors.iter().map(|spec| Accessor::from(*spec)).collect(),
            default,
        });
        self
    }

    pub fn metric_name(&self) -> &str {
        &self.metric_name
    }

    pub fn covariate_rules(&self) -> &[CovariateRule] {
        &self.covariates
    }

    /// Resolve the metric and covariates of a record.
    ///
    /// The first accessor that finds a field wins. A metric that is missing
    /// under every accessor, or present but not numeric, is an
    /// [`ForecastError::UpstreamFormat`] error and the record should be
    /// dropped. Covariates never fail: absent or malformed values fall back
    /// to the rule's default.
    pub fn resolve(&self, record: &Record) -> Result<ResolvedRecord> {
        let raw = self
            .metric
            .iter()
            .find_map(|accessor| accessor.lookup(record))
            .ok_or_else(|| {
                ForecastError::UpstreamFormat(format!(
                    "no known field for '{}' among {} keys",
                    self.metric_name,
                    record.len()
                ))
            })?;

        let metric = numeric(raw).ok_or_else(|| {
            ForecastError::UpstreamFormat(format!(
                "field for '{}' is not numeric: {}",
                self.metric_name, raw
            ))
        })?;

        let covariates = self
            .covariates
            .iter()
            .map(|rule| {
                let value = rule
                    .accessors
                    .iter()
                    .find_map(|accessor| accessor.lookup(record))
                    .and_then(numeric)
                    .filter(|v| v.is_finite())
                    .unwrap_or(rule.default);
                (rule.name.clone(), value)
            })
            .collect();

        Ok(ResolvedRecord { metric, covariates })
    }
}

/// Numbers and numeric strings resolve; anything else does not
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}
