//! Election results: long rows pivoted to one record per reporting unit and joined to precinct geometry.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result, ensure};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{error::ModelError, io, unit::{UnitId, UnitLayer}};

/// Column names of the long-format results table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResultsColumns {
    pub unit: String,
    pub contest: String,
    pub choice: String,
    pub votes: Option<String>, // when absent, a row's votes are mail + in-person
    pub mail: Option<String>,
    pub in_person: Option<String>,
    pub ballots: String,
    pub registered: Option<String>,
}

impl Default for ResultsColumns {
    fn default() -> Self {
        Self {
            unit: "precinct".into(),
            contest: "contest".into(),
            choice: "choice".into(),
            votes: None,
            mail: Some("mail_votes".into()),
            in_person: Some("in_person_votes".into()),
            ballots: "ballots_cast".into(),
            registered: Some("registered_voters".into()),
        }
    }
}

/// Which count serves as the trial (offset) total of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Denominator {
    #[default]
    Ballots,
    Registered,
    ContestVotes,
}

/// Pivoted results of one reporting unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitResults {
    pub unit: UnitId,
    pub ballots: Option<f64>,
    pub registered: Option<f64>,
    pub mail: f64,
    pub in_person: f64,
    pub choices: BTreeMap<String, f64>, // every choice of the contest, zero-filled
}

impl UnitResults {
    /// Votes for `choice`; zero for a choice that never appeared.
    pub fn votes(&self, choice: &str) -> f64 {
        self.choices.get(choice).copied().unwrap_or(0.0)
    }

    /// Votes over all choices.
    pub fn contest_votes(&self) -> f64 {
        self.choices.values().sum()
    }

    /// Trial total under `denominator`; `None` when the count was not reported.
    pub fn trials(&self, denominator: Denominator) -> Option<f64> {
        match denominator {
            Denominator::Ballots => self.ballots,
            Denominator::Registered => self.registered,
            Denominator::ContestVotes => Some(self.contest_votes()),
        }
    }
}

/// Results of every reporting unit, in ascending identifier order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElectionResults {
    units: BTreeMap<UnitId, UnitResults>,
    choices: Vec<String>,
}

impl ElectionResults {
    /// Pivot long rows (one per unit, contest and choice) into one record per unit.
    ///
    /// Ballots and registered voters repeat on every row of a unit, so the maximum is kept;
    /// mail and in-person votes are summed. Rows without a unit or choice are skipped.
    pub fn pivot(table: &DataFrame, columns: &ResultsColumns, contest: Option<&str>) -> Result<Self> {
        ensure!(
            columns.votes.is_some() || columns.mail.is_some() || columns.in_person.is_some(),
            "[loader] no vote column configured: set votes, mail or in_person"
        );

        let units = io::str_values(table, &columns.unit).context("[loader] reading unit column")?;
        let choices = io::str_values(table, &columns.choice).context("[loader] reading choice column")?;
        let keep = match contest {
            Some(name) => io::str_values(table, &columns.contest)
                .context("[loader] reading contest column")?
                .into_iter()
                .map(|value| value.as_deref() == Some(name))
                .collect(),
            None => vec![true; table.height()],
        };

        let mail = optional_values(table, columns.mail.as_deref())?;
        let in_person = optional_values(table, columns.in_person.as_deref())?;
        let votes = match columns.votes.as_deref() {
            Some(name) => io::f64_values(table, name).context("[loader] reading votes column")?,
            None => mail.iter().zip(&in_person)
                .map(|(&m, &p)| if m.is_none() && p.is_none() { None } else { Some(m.unwrap_or(0.0) + p.unwrap_or(0.0)) })
                .collect(),
        };
        let ballots = io::f64_values(table, &columns.ballots).context("[loader] reading ballots column")?;
        let registered = optional_values(table, columns.registered.as_deref())?;

        let rows = (0..table.height())
            .filter(|&r| keep[r] && units[r].is_some() && choices[r].is_some())
            .collect::<Vec<_>>();
        ensure!(
            !rows.is_empty(),
            "[loader] no result rows{}", contest.map(|c| format!(" for contest {c:?}")).unwrap_or_default()
        );

        if contest.is_none() && table.column(&columns.contest).is_ok() {
            check_choices_are_unambiguous(table, &columns.contest, &choices, &rows)?;
        }

        let pick_str = |values: &[Option<String>]| rows.iter().map(|&r| values[r].clone()).collect::<Vec<_>>();
        let pick = |values: &[Option<f64>]| rows.iter().map(|&r| values[r]).collect::<Vec<_>>();
        let long = DataFrame::new(vec![
            Column::new("unit".into(), pick_str(&units)),
            Column::new("choice".into(), pick_str(&choices)),
            Column::new("votes".into(), pick(&votes)),
            Column::new("mail".into(), pick(&mail)),
            Column::new("in_person".into(), pick(&in_person)),
            Column::new("ballots".into(), pick(&ballots)),
            Column::new("registered".into(), pick(&registered)),
        ])?;

        let per_unit = long.clone().lazy()
            .group_by([col("unit")])
            .agg([
                col("ballots").max(),
                col("registered").max(),
                col("mail").sum(),
                col("in_person").sum(),
            ])
            .collect()
            .context("[loader] aggregating per-unit totals")?;

        let per_choice = long.lazy()
            .group_by([col("unit"), col("choice")])
            .agg([col("votes").sum()])
            .collect()
            .context("[loader] aggregating votes per choice")?;

        let mut results = BTreeMap::new();
        let ids = io::str_values(&per_unit, "unit")?;
        let ballots = io::f64_values(&per_unit, "ballots")?;
        let registered = io::f64_values(&per_unit, "registered")?;
        let mail = io::f64_values(&per_unit, "mail")?;
        let in_person = io::f64_values(&per_unit, "in_person")?;
        for (i, id) in ids.into_iter().enumerate() {
            let Some(id) = id.map(UnitId::from) else { continue };
            results.insert(id.clone(), UnitResults {
                unit: id,
                ballots: ballots[i],
                registered: registered[i],
                mail: mail[i].unwrap_or(0.0),
                in_person: in_person[i].unwrap_or(0.0),
                choices: BTreeMap::new(),
            });
        }

        let mut names = BTreeSet::new();
        let ids = io::str_values(&per_choice, "unit")?;
        let choices = io::str_values(&per_choice, "choice")?;
        let votes = io::f64_values(&per_choice, "votes")?;
        for ((id, choice), votes) in ids.into_iter().zip(choices).zip(votes) {
            let (Some(id), Some(choice)) = (id, choice) else { continue };
            if let Some(unit) = results.get_mut(&UnitId::from(id)) {
                unit.choices.insert(choice.clone(), votes.unwrap_or(0.0));
            }
            names.insert(choice);
        }

        for unit in results.values_mut() {
            for name in &names {
                unit.choices.entry(name.clone()).or_insert(0.0);
            }
        }

        Ok(Self { units: results, choices: names.into_iter().collect() })
    }

    #[inline] pub fn len(&self) -> usize { self.units.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.units.is_empty() }

    /// Choice names in ascending order.
    #[inline] pub fn choices(&self) -> &[String] { &self.choices }

    #[inline] pub fn get(&self, id: &UnitId) -> Option<&UnitResults> { self.units.get(id) }

    #[inline] pub fn contains(&self, id: &UnitId) -> bool { self.units.contains_key(id) }

    pub fn iter(&self) -> impl Iterator<Item = &UnitResults> { self.units.values() }

    pub fn ids(&self) -> impl Iterator<Item = &UnitId> { self.units.keys() }
}

/// Read an optional numeric column; an unconfigured column is all missing.
fn optional_values(table: &DataFrame, name: Option<&str>) -> Result<Vec<Option<f64>>> {
    match name {
        Some(name) => io::f64_values(table, name).with_context(|| format!("[loader] reading column {name:?}")),
        None => Ok(vec![None; table.height()]),
    }
}

/// Without a contest filter, rows of several contests are pivoted together; a choice
/// name shared by two contests would merge their votes into one column.
fn check_choices_are_unambiguous(
    table: &DataFrame,
    contest_column: &str,
    choices: &[Option<String>],
    rows: &[usize],
) -> Result<()> {
    let contests = io::str_values(table, contest_column).context("[loader] reading contest column")?;
    let mut seen = BTreeMap::<&str, BTreeSet<&str>>::new();
    for &r in rows {
        if let (Some(choice), Some(contest)) = (choices[r].as_deref(), contests[r].as_deref()) {
            seen.entry(choice).or_default().insert(contest);
        }
    }

    match seen.iter().find(|(_, contests)| contests.len() > 1) {
        Some((choice, contests)) => Err(ModelError::InvalidConfig(format!(
            "choice {choice:?} appears in contests {contests:?}; set results.contest to pick one"
        ))).context("[loader] pivoting results"),
        None => Ok(()),
    }
}

/// Units dropped while loading results, each listed under exactly one reason.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
    pub contest: Option<String>,
    pub result_units: usize,
    pub choices: Vec<String>,
    pub missing_geometry: Vec<UnitId>,   // results without a precinct polygon
    pub missing_results: Vec<UnitId>,    // precinct polygons without results
    pub non_positive_total: Vec<UnitId>, // trial total missing or not positive
}

/// Pivoted results plus the units that survive the geometry join and the ballots check.
#[derive(Debug, Clone)]
pub struct LoadedResults {
    pub results: ElectionResults, // every pivoted unit, dropped ones included
    pub eligible: Vec<UnitId>,
    pub report: LoadReport,
}

/// Pivot `table`, join it to `precincts` by identifier and drop units whose
/// `denominator` total is missing or not positive.
pub fn load_results(
    table: &DataFrame,
    columns: &ResultsColumns,
    contest: Option<&str>,
    denominator: Denominator,
    precincts: &UnitLayer,
) -> Result<LoadedResults> {
    let results = ElectionResults::pivot(table, columns, contest)?;
    info!(units = results.len(), choices = results.choices().len(), "pivoted election results");

    let missing_geometry = results.ids()
        .filter(|id| !precincts.contains(id))
        .cloned()
        .collect::<Vec<_>>();
    let missing_results = precincts.ids().iter()
        .filter(|id| !results.contains(id))
        .cloned()
        .collect::<Vec<_>>();

    let mut eligible = Vec::with_capacity(results.len());
    let mut non_positive_total = Vec::new();
    for unit in results.iter().filter(|unit| precincts.contains(&unit.unit)) {
        match unit.trials(denominator) {
            Some(trials) if trials > 0.0 => eligible.push(unit.unit.clone()),
            _ => non_positive_total.push(unit.unit.clone()),
        }
    }

    if !missing_geometry.is_empty() || !missing_results.is_empty() {
        warn!(
            missing_geometry = missing_geometry.len(),
            missing_results = missing_results.len(),
            "results and precinct geometry do not match"
        );
    }
    if !non_positive_total.is_empty() {
        warn!(count = non_positive_total.len(), denominator = ?denominator, "dropped units with missing or non-positive totals");
    }

    let report = LoadReport {
        contest: contest.map(str::to_string),
        result_units: results.len(),
        choices: results.choices().to_vec(),
        missing_geometry,
        missing_results,
        non_positive_total,
    };

    Ok(LoadedResults { results, eligible, report })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{io::read_csv_string, testutil::{square_layer, vote_columns}, unit::UnitKind};

    const RESULTS: &str = "\
precinct,contest,choice,mail_votes,in_person_votes,ballots_cast,registered_voters
P1,Measure A,Yes,10,5,40,100
P1,Measure A,No,15,8,40,100
P2,Measure A,Yes,3,1,10,30
P1,Mayor,Smith,20,12,40,100
P3,Measure A,No,0,0,0,25
";

    fn ids(names: &[&str]) -> Vec<UnitId> {
        names.iter().map(|&n| UnitId::new(n)).collect()
    }

    #[test]
    fn pivot_fills_missing_choices_with_zero() {
        let table = read_csv_string(RESULTS).unwrap();
        let results = ElectionResults::pivot(&table, &ResultsColumns::default(), Some("Measure A")).unwrap();

        assert_eq!(results.choices(), &["No".to_string(), "Yes".to_string()]);
        let p2 = results.get(&UnitId::new("P2")).unwrap();
        assert_eq!(p2.votes("Yes"), 4.0);
        assert_eq!(p2.choices.get("No"), Some(&0.0));
    }

    #[test]
    fn repeated_totals_take_the_maximum_and_votes_sum() {
        let table = read_csv_string(RESULTS).unwrap();
        let results = ElectionResults::pivot(&table, &ResultsColumns::default(), Some("Measure A")).unwrap();

        let p1 = results.get(&UnitId::new("P1")).unwrap();
        assert_eq!(p1.ballots, Some(40.0));
        assert_eq!(p1.registered, Some(100.0));
        assert_eq!(p1.mail, 25.0);
        assert_eq!(p1.in_person, 13.0);
        assert_eq!(p1.contest_votes(), 38.0);
    }

    #[test]
    fn without_filter_every_contest_is_pivoted() {
        let table = read_csv_string(RESULTS).unwrap();
        let results = ElectionResults::pivot(&table, &ResultsColumns::default(), None).unwrap();

        assert_eq!(results.choices().len(), 3);
        assert_eq!(results.get(&UnitId::new("P1")).unwrap().votes("Smith"), 32.0);
    }

    #[test]
    fn choices_shared_across_contests_need_a_filter() {
        let table = read_csv_string("\
precinct,contest,choice,votes,ballots_cast
P1,Measure A,Yes,7,20
P1,Measure B,Yes,9,20
P1,Measure A,No,3,20
").unwrap();

        let err = ElectionResults::pivot(&table, &vote_columns(), None).unwrap_err();
        assert!(matches!(err.downcast_ref::<ModelError>(), Some(ModelError::InvalidConfig(m)) if m.contains("\"Yes\"")));

        let measure_a = ElectionResults::pivot(&table, &vote_columns(), Some("Measure A")).unwrap();
        let p1 = measure_a.get(&UnitId::new("P1")).unwrap();
        assert_eq!(p1.votes("Yes"), 7.0);
        assert_eq!(p1.contest_votes(), 10.0);
    }

    #[test]
    fn unknown_contest_is_an_error() {
        let table = read_csv_string(RESULTS).unwrap();
        assert!(ElectionResults::pivot(&table, &ResultsColumns::default(), Some("Governor")).is_err());
    }

    #[test]
    fn explicit_vote_column_is_used() {
        let table = read_csv_string("precinct,choice,votes,ballots_cast\nP1,Yes,7,9\nP1,No,2,9\n").unwrap();
        let results = ElectionResults::pivot(&table, &vote_columns(), None).unwrap();

        let p1 = results.get(&UnitId::new("P1")).unwrap();
        assert_eq!(p1.votes("Yes"), 7.0);
        assert_eq!(p1.registered, None);
    }

    #[test]
    fn each_dropped_unit_is_reported_once() {
        let table = read_csv_string(RESULTS).unwrap();
        let precincts = square_layer(UnitKind::Precinct, &[
            ("P1", 0.0, 0.0, 1.0), ("P3", 1.0, 0.0, 1.0), ("P4", 2.0, 0.0, 1.0),
        ]);

        let loaded = load_results(&table, &ResultsColumns::default(), Some("Measure A"), Denominator::Ballots, &precincts).unwrap();

        assert_eq!(loaded.eligible, ids(&["P1"]));
        assert_eq!(loaded.report.missing_geometry, ids(&["P2"]));
        assert_eq!(loaded.report.missing_results, ids(&["P4"]));
        assert_eq!(loaded.report.non_positive_total, ids(&["P3"]));
        assert_eq!(loaded.report.result_units, 3);
        assert_eq!(loaded.results.len(), 3);
    }

    #[test]
    fn eligibility_follows_the_denominator() {
        let table = read_csv_string("precinct,choice,votes,ballots_cast,registered_voters\nP1,Yes,0,5,\nP2,Yes,4,5,9\n").unwrap();
        let columns = ResultsColumns { registered: Some("registered_voters".into()), ..vote_columns() };
        let precincts = square_layer(UnitKind::Precinct, &[("P1", 0.0, 0.0, 1.0), ("P2", 1.0, 0.0, 1.0)]);

        let registered = load_results(&table, &columns, None, Denominator::Registered, &precincts).unwrap();
        assert_eq!(registered.eligible, ids(&["P2"]));

        let votes = load_results(&table, &columns, None, Denominator::ContestVotes, &precincts).unwrap();
        assert_eq!(votes.report.non_positive_total, ids(&["P1"]));
    }
}
