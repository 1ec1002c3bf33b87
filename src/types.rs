use serde::Serialize;

/// Simulated month, 1-based. `Month(0)` is the pre-simulation initial state;
/// the engine steps through `Month(1)..=Month(horizon)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Month(pub u32);

impl Month {
    pub const MONTHS_PER_YEAR: u32 = 12;

    /// 1-based simulated year this month falls in. `Month(0)` maps to year 1.
    pub fn year(self) -> u32 {
        if self.0 == 0 {
            1
        } else {
            (self.0 - 1) / Self::MONTHS_PER_YEAR + 1
        }
    }

    /// First month of a 1-based year.
    pub fn year_start(year: u32) -> Self {
        Month((year - 1) * Self::MONTHS_PER_YEAR + 1)
    }

    /// True on December of any simulated year.
    pub fn is_year_end(self) -> bool {
        self.0 > 0 && self.0 % Self::MONTHS_PER_YEAR == 0
    }
}

impl std::fmt::Display for Month {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Catalog key for the fixed macroeconomic scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ScenarioId {
    Optimistic,
    BusinessAsUsual,
    GreenTransition,
    ResourceCrisis,
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ScenarioId::Optimistic => "optimistic",
            ScenarioId::BusinessAsUsual => "business-as-usual",
            ScenarioId::GreenTransition => "green-transition",
            ScenarioId::ResourceCrisis => "resource-crisis",
        };
        f.write_str(s)
    }
}
