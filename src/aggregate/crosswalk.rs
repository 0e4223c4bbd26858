use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{geom::MatchKind, unit::{UnitId, UnitLayer}};

/// How fine units are assigned to coarse units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrosswalkMode {
    /// Each fine unit goes wholly to the coarse unit containing its centroid.
    #[default]
    Centroid,
    /// Each fine unit is split by intersection area over the coarse units it overlaps.
    AreaWeighted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    Contained,
    Boundary,
    Fallback,
    AreaWeighted,
}

impl From<MatchKind> for MatchMethod {
    fn from(kind: MatchKind) -> Self {
        match kind {
            MatchKind::Contained => MatchMethod::Contained,
            MatchKind::Boundary => MatchMethod::Boundary,
            MatchKind::Nearest => MatchMethod::Fallback,
        }
    }
}

/// Assignment of one fine unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FineMatch {
    pub fine: UnitId,
    pub method: MatchMethod,
    pub primary: UnitId,              // receives the fine unit's rate values
    pub shares: Vec<(UnitId, f64)>,   // count weights, ascending coarse id, summing to one
}

/// Match statistics of a crosswalk.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CrosswalkReport {
    pub contained: usize,
    pub boundary: usize,
    pub fallback: usize,
    pub area_weighted: usize,
    pub unmatched: Vec<UnitId>,           // fine units without a usable centroid
    pub coarse_without_fine: Vec<UnitId>, // coarse units that received nothing
}

/// Many-to-one (or, area-weighted, many-to-many) mapping of fine units onto coarse units.
/// A pure function of the two layers: both are stored in identifier order and every
/// tie resolves to the smallest identifier.
#[derive(Debug, Clone)]
pub struct Crosswalk {
    mode: CrosswalkMode,
    matches: Vec<FineMatch>,
    report: CrosswalkReport,
}

impl Crosswalk {
    pub fn build(fine: &UnitLayer, coarse: &UnitLayer, mode: CrosswalkMode) -> Self {
        let mut report = CrosswalkReport::default();
        let mut matches = Vec::with_capacity(fine.len());
        let mut received = vec![false; coarse.len()];

        for (i, id) in fine.ids().iter().enumerate() {
            let shares = match mode {
                CrosswalkMode::AreaWeighted => coarse.geoms().overlap_shares(&fine.geoms().shapes()[i]),
                CrosswalkMode::Centroid => Vec::new(),
            };

            let found = if shares.is_empty() {
                fine.geoms().centroid(i)
                    .and_then(|pt| coarse.geoms().locate(pt))
                    .map(|(j, kind)| (MatchMethod::from(kind), j, vec![(j, 1.0)]))
            } else {
                // Largest share wins the rate values, ties to the smallest identifier.
                let dominant = shares.iter()
                    .fold(None, |best: Option<(usize, f64)>, &(j, w)| match best {
                        Some((_, bw)) if bw >= w => best,
                        _ => Some((j, w)),
                    })
                    .map(|(j, _)| j);
                dominant.map(|j| (MatchMethod::AreaWeighted, j, shares))
            };

            let Some((method, primary, shares)) = found else {
                debug!(unit = %id, "fine unit has no centroid to match");
                report.unmatched.push(id.clone());
                continue;
            };

            match method {
                MatchMethod::Contained => report.contained += 1,
                MatchMethod::Boundary => report.boundary += 1,
                MatchMethod::Fallback => {
                    debug!(unit = %id, coarse = %coarse.ids()[primary], "centroid outside every coarse unit, using nearest");
                    report.fallback += 1
                }
                MatchMethod::AreaWeighted => report.area_weighted += 1,
            }
            for &(j, _) in &shares {
                received[j] = true;
            }

            matches.push(FineMatch {
                fine: id.clone(),
                method,
                primary: coarse.ids()[primary].clone(),
                shares: shares.into_iter().map(|(j, w)| (coarse.ids()[j].clone(), w)).collect(),
            });
        }

        report.coarse_without_fine = coarse.ids().iter()
            .zip(&received)
            .filter(|&(_, &r)| !r)
            .map(|(id, _)| id.clone())
            .collect();

        info!(
            mode = ?mode,
            contained = report.contained,
            boundary = report.boundary,
            fallback = report.fallback,
            area_weighted = report.area_weighted,
            "matched fine units to coarse units"
        );
        if !report.unmatched.is_empty() || !report.coarse_without_fine.is_empty() {
            warn!(
                unmatched = report.unmatched.len(),
                coarse_without_fine = report.coarse_without_fine.len(),
                "crosswalk left units without a match"
            );
        }

        Self { mode, matches, report }
    }

    #[inline] pub fn mode(&self) -> CrosswalkMode { self.mode }

    /// Matches in ascending fine identifier order.
    #[inline] pub fn matches(&self) -> &[FineMatch] { &self.matches }

    #[inline] pub fn report(&self) -> &CrosswalkReport { &self.report }

    /// Coarse unit receiving the rate values of `fine`.
    pub fn primary_of(&self, fine: &UnitId) -> Option<&UnitId> {
        self.matches.binary_search_by(|m| m.fine.cmp(fine)).ok().map(|k| &self.matches[k].primary)
    }
}
