//! Match parameters.
//!
//! [`MatchArgs`] is the wire form: every field optional, unknown keys ignored.
//! Indexer defaults and per-call overrides are both `MatchArgs`; [`MatchArgs::merge`]
//! combines them into a fresh value and [`MatchArgs::resolve`] fills the gaps
//! and parses traversal paths into [`MatchSettings`].

use crate::config::DEFAULT_METRIC;
use crate::error::{IndexError, Result};
use crate::matcher::distance::Metric;
use crate::matcher::traversal::{parse_paths, TraversalPath};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchArgs {
    pub metric: Option<Metric>,
    /// Key under which scores are recorded. Defaults to the metric's name.
    pub metric_name: Option<String>,
    /// Top-k cutoff. Defaults to the size of the candidate set.
    #[serde(alias = "top_k")]
    pub limit: Option<usize>,
    /// Skip candidates whose id equals the query's id.
    pub exclude_self: Option<bool>,
    /// Matches carry only the candidate id and its score.
    pub only_id: Option<bool>,
    /// Min-max rescale each query's match scores into `[a, b]`.
    pub normalization: Option<(f32, f32)>,
    /// Query-side traversal paths.
    pub traversal_ldarray: Option<Vec<String>>,
    /// Candidate-side traversal paths.
    pub traversal_rdarray: Option<Vec<String>>,
}

impl MatchArgs {
    /// Pick the recognized keys out of a runtime parameter map.
    ///
    /// Unknown keys are ignored. A recognized key with an unusable value fails
    /// with `InvalidParameter`.
    pub fn from_parameters(parameters: &Map<String, Value>) -> Result<Self> {
        serde_json::from_value(Value::Object(parameters.clone()))
            .map_err(|e| IndexError::InvalidParameter(e.to_string()))
    }

    /// Fields set in `overrides` win. Neither input is modified.
    pub fn merge(&self, overrides: &MatchArgs) -> MatchArgs {
        MatchArgs {
            metric: overrides.metric.or(self.metric),
            metric_name: overrides
                .metric_name
                .clone()
                .or_else(|| self.metric_name.clone()),
            limit: overrides.limit.or(self.limit),
            exclude_self: overrides.exclude_self.or(self.exclude_self),
            only_id: overrides.only_id.or(self.only_id),
            normalization: overrides.normalization.or(self.normalization),
            traversal_ldarray: overrides
                .traversal_ldarray
                .clone()
                .or_else(|| self.traversal_ldarray.clone()),
            traversal_rdarray: overrides
                .traversal_rdarray
                .clone()
                .or_else(|| self.traversal_rdarray.clone()),
        }
    }

    pub fn resolve(&self) -> Result<MatchSettings> {
        let metric = self.metric.unwrap_or(DEFAULT_METRIC);
        if let Some((a, b)) = self.normalization {
            if !a.is_finite() || !b.is_finite() {
                return Err(IndexError::InvalidParameter(format!(
                    "normalization bounds must be finite, got [{}, {}]",
                    a, b
                )));
            }
        }
        Ok(MatchSettings {
            metric,
            metric_name: self
                .metric_name
                .clone()
                .unwrap_or_else(|| metric.name().to_string()),
            limit: self.limit,
            exclude_self: self.exclude_self.unwrap_or(false),
            only_id: self.only_id.unwrap_or(false),
            normalization: self.normalization,
            query_paths: parse_paths(self.traversal_ldarray.as_deref().unwrap_or_default())?,
            candidate_paths: parse_paths(self.traversal_rdarray.as_deref().unwrap_or_default())?,
        })
    }
}

/// Fully resolved parameters of one match run.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchSettings {
    pub metric: Metric,
    pub metric_name: String,
    pub limit: Option<usize>,
    pub exclude_self: bool,
    pub only_id: bool,
    pub normalization: Option<(f32, f32)>,
    pub query_paths: Vec<TraversalPath>,
    pub candidate_paths: Vec<TraversalPath>,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            metric: DEFAULT_METRIC,
            metric_name: DEFAULT_METRIC.name().to_string(),
            limit: None,
            exclude_self: false,
            only_id: false,
            normalization: None,
            query_paths: vec![TraversalPath::root()],
            candidate_paths: vec![TraversalPath::root()],
        }
    }
}
