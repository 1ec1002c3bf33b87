use thiserror::Error;

/// Investment budget available to the player, EUR.
pub const TOTAL_BUDGET: f64 = 1_000_000.0;

/// Cash on hand before the unallocated budget remainder is added, EUR.
pub const STARTING_CAPITAL: f64 = 200_000.0;

/// Fixed simulation horizon: 10 years of monthly steps.
pub const SIMULATION_MONTHS: u32 = 120;

/// Cumulative waste cap, tons. Reaching it shuts the factory down.
pub const MAX_WASTE_TONS: f64 = 1_000.0;

/// The four-way budget split, fixed for the life of a run.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Allocation {
    /// Traditional manufacturing line, EUR.
    pub traditional: f64,
    /// Defect-detection systems (quality), EUR.
    pub detection: f64,
    /// Robotic disassembly/remanufacturing line, EUR.
    pub robotics: f64,
    /// Eco-design (material recovery), EUR.
    pub ecodesign: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum AllocationError {
    #[error("{category} investment is negative: {amount}")]
    Negative { category: &'static str, amount: f64 },
    #[error("{category} investment is not finite")]
    NotFinite { category: &'static str },
    #[error("allocated {total} exceeds total budget {budget}")]
    OverBudget { total: f64, budget: f64 },
}

impl Allocation {
    pub fn new(traditional: f64, detection: f64, robotics: f64, ecodesign: f64) -> Self {
        Allocation { traditional, detection, robotics, ecodesign }
    }

    /// Everything into the traditional line.
    pub fn all_traditional() -> Self {
        Allocation::new(TOTAL_BUDGET, 0.0, 0.0, 0.0)
    }

    /// Even split between robotics and eco-design, nothing traditional.
    pub fn all_circular() -> Self {
        Allocation::new(0.0, 0.0, TOTAL_BUDGET / 2.0, TOTAL_BUDGET / 2.0)
    }

    /// No investment at all — the whole budget stays idle cash.
    pub fn idle() -> Self {
        Allocation::new(0.0, 0.0, 0.0, 0.0)
    }

    pub fn total(&self) -> f64 {
        self.traditional + self.detection + self.robotics + self.ecodesign
    }

    /// Budget remainder added to starting capital as idle cash.
    pub fn unallocated(&self) -> f64 {
        TOTAL_BUDGET - self.total()
    }

    /// Fail-fast precondition check for the engine boundary. The engine
    /// itself does not re-validate mid-run.
    pub fn validate(&self) -> Result<(), AllocationError> {
        for (category, amount) in [
            ("traditional", self.traditional),
            ("detection", self.detection),
            ("robotics", self.robotics),
            ("ecodesign", self.ecodesign),
        ] {
            if !amount.is_finite() {
                return Err(AllocationError::NotFinite { category });
            }
            if amount < 0.0 {
                return Err(AllocationError::Negative { category, amount });
            }
        }
        let total = self.total();
        if total > TOTAL_BUDGET {
            return Err(AllocationError::OverBudget { total, budget: TOTAL_BUDGET });
        }
        Ok(())
    }
}
