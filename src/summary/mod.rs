//! Posterior summaries: per-unit and statewide ratios with highest-density intervals.

mod summarizer;
mod types;

pub use summarizer::PosteriorSummarizer;
pub use types::{CaveatNote, ConvergenceSummary, Estimate, ImputedSummary, Interval, StatewideSummary, Summary, UnitSummary};
