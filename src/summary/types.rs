use serde::Serialize;

use crate::{
    adjacency::Exclusion,
    loader::Denominator,
    outcome::{Caveat, Totals},
    unit::UnitId,
};

/// Highest-density interval holding `mass` of the draws.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Interval {
    pub mass: f64,
    pub lower: f64,
    pub upper: f64,
}

impl Interval {
    #[inline] pub fn width(&self) -> f64 { self.upper - self.lower }
}

/// Central tendency and interval of a quantity across draws.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Estimate {
    pub mean: f64,
    pub median: f64,
    pub interval: Interval,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitSummary {
    pub unit: UnitId,
    pub response: f64,
    pub trials: f64,
    pub observed_ratio: f64,
    pub predicted_ratio: Estimate, // predicted response / observed trials
}

/// Statewide figures. Modeled and full totals are reported side by side and never reconciled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatewideSummary {
    pub modeled: Totals,
    pub modeled_ratio: Option<f64>,
    /// Per draw: summed predicted responses over summed modeled trials.
    pub predicted_ratio: Estimate,
    pub full: Totals,
    pub full_ratio: Option<f64>,
}

/// Solver-imputed values of one missing covariate entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImputedSummary {
    pub covariate: String,
    pub unit: UnitId,
    pub mean: f64,
    pub std_dev: f64,
    pub interval: Interval,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvergenceSummary {
    pub parameters: usize,
    pub worst_rhat: Option<(String, f64)>,
    pub lowest_ess: Option<(String, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaveatNote {
    pub kind: Caveat,
    pub description: &'static str,
}

impl From<Caveat> for CaveatNote {
    fn from(kind: Caveat) -> Self {
        Self { kind, description: kind.description() }
    }
}

/// Structured result of a run; any report layer reads it as is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub response: String,
    pub denominator: Denominator,
    pub chains: usize,
    pub draws: usize,
    pub units: Vec<UnitSummary>,
    pub statewide: StatewideSummary,
    pub imputed: Vec<ImputedSummary>,
    pub exclusions: Vec<Exclusion>,
    pub caveats: Vec<CaveatNote>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub convergence: Option<ConvergenceSummary>,
}

impl Summary {
    pub fn unit(&self, id: &UnitId) -> Option<&UnitSummary> {
        self.units.iter().find(|summary| &summary.unit == id)
    }
}
