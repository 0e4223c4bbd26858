use serde::{Deserialize, Serialize};

/// The two areal unit sets the pipeline works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Precinct,   // Coarse units, carry election results
    BlockGroup, // Fine units, carry census estimates
}

impl UnitKind {
    pub fn to_str(&self) -> &'static str {
        match self {
            UnitKind::Precinct => "precinct",
            UnitKind::BlockGroup => "block_group",
        }
    }
}

impl std::fmt::Display for UnitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_str())
    }
}
