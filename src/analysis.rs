use crate::simulation::RunOutcome;
use crate::types::Month;

/// Per-run classification, derived from the outcome alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Verdict {
    Bankrupt(Month),
    WasteShutdown(Month),
    /// Survived with profit above 200k.
    Excellent,
    /// Survived with profit above 50k.
    Good,
    /// Survived with any positive profit.
    Marginal,
    /// Survived but lost money.
    LossMaking,
}

impl Verdict {
    pub fn for_outcome(outcome: &RunOutcome) -> Verdict {
        if let Some(month) = outcome.bankrupt_month {
            Verdict::Bankrupt(month)
        } else if let Some(month) = outcome.waste_shutdown_month {
            Verdict::WasteShutdown(month)
        } else if outcome.profit > 200_000.0 {
            Verdict::Excellent
        } else if outcome.profit > 50_000.0 {
            Verdict::Good
        } else if outcome.profit > 0.0 {
            Verdict::Marginal
        } else {
            Verdict::LossMaking
        }
    }

    pub fn survived(&self) -> bool {
        !matches!(self, Verdict::Bankrupt(_) | Verdict::WasteShutdown(_))
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Bankrupt(m) => write!(f, "Bankrupt at month {m}"),
            Verdict::WasteShutdown(m) => write!(f, "Shut down for waste at month {m}"),
            Verdict::Excellent => write!(f, "Excellent! Thriving business"),
            Verdict::Good => write!(f, "Good! Profitable operation"),
            Verdict::Marginal => write!(f, "Marginal profit, could do better"),
            Verdict::LossMaking => write!(f, "Survived but lost money"),
        }
    }
}

/// Resilience tier of one allocation across the whole scenario catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum RatingTier {
    /// Survived everywhere with strong average returns.
    Outstanding,
    /// Survived everywhere.
    Robust,
    /// Failed in at least one scenario but survived at least half.
    Vulnerable,
    /// Failed in most scenarios.
    HighRisk,
}

/// Cross-scenario summary of one allocation.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct StrategyRating {
    pub survived: usize,
    pub scenarios: usize,
    pub avg_profit: f64,
    pub tier: RatingTier,
}

impl StrategyRating {
    pub fn from_outcomes(outcomes: &[RunOutcome]) -> StrategyRating {
        let scenarios = outcomes.len();
        let survived = outcomes.iter().filter(|o| o.survived).count();
        let avg_profit = if scenarios > 0 {
            outcomes.iter().map(|o| o.profit).sum::<f64>() / scenarios as f64
        } else {
            0.0
        };
        let tier = if survived == scenarios && avg_profit > 100_000.0 {
            RatingTier::Outstanding
        } else if survived == scenarios {
            RatingTier::Robust
        } else if survived * 2 >= scenarios {
            RatingTier::Vulnerable
        } else {
            RatingTier::HighRisk
        };
        StrategyRating { survived, scenarios, avg_profit, tier }
    }
}

impl std::fmt::Display for StrategyRating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let blurb = match self.tier {
            RatingTier::Outstanding => {
                "Outstanding! Resilient across all scenarios with excellent returns."
            }
            RatingTier::Robust => {
                "Robust strategy! Survives all scenarios; consider optimizing for higher profits."
            }
            RatingTier::Vulnerable => "Vulnerable strategy. Consider more circular investments.",
            RatingTier::HighRisk => {
                "High-risk strategy! Traditional manufacturing alone is not resilient."
            }
        };
        write!(
            f,
            "{blurb} Survived: {}/{} scenarios | Average profit: {:.0}",
            self.survived, self.scenarios, self.avg_profit
        )
    }
}

/// Distribution statistics for a continuous metric across N runs.
#[derive(Debug, Clone)]
pub struct DistStats {
    pub n: usize,
    pub min: f64,
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

fn percentile_stats(values: &mut Vec<f64>) -> Option<DistStats> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = values.len();

    let interp = |p: f64| -> f64 {
        let h = p * (n - 1) as f64;
        let lo = h.floor() as usize;
        let hi = (lo + 1).min(n - 1);
        let frac = h - lo as f64;
        values[lo] * (1.0 - frac) + values[hi] * frac
    };

    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = if n > 1 {
        values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
    } else {
        0.0
    };

    Some(DistStats {
        n,
        min: values[0],
        p5: interp(0.05),
        p25: interp(0.25),
        p50: interp(0.50),
        p75: interp(0.75),
        p95: interp(0.95),
        max: values[n - 1],
        mean,
        std_dev: variance.sqrt(),
    })
}

/// Cross-run distribution of the key outcome metrics for one
/// allocation/scenario pair swept over seeds.
#[derive(Debug, Clone)]
pub struct SweepDist {
    pub final_balance: DistStats,
    pub profit: DistStats,
    pub total_waste: DistStats,
    /// Fraction of runs that survived the full horizon.
    pub survival_rate: f64,
}

/// Requires at least 2 runs — a single run has no distribution.
pub fn sweep_distributions(outcomes: &[RunOutcome]) -> Option<SweepDist> {
    if outcomes.len() < 2 {
        return None;
    }
    let mut balances: Vec<f64> = outcomes.iter().map(|o| o.final_balance).collect();
    let mut profits: Vec<f64> = outcomes.iter().map(|o| o.profit).collect();
    let mut wastes: Vec<f64> = outcomes.iter().map(|o| o.total_waste).collect();
    let survived = outcomes.iter().filter(|o| o.survived).count();

    Some(SweepDist {
        final_balance: percentile_stats(&mut balances)?,
        profit: percentile_stats(&mut profits)?,
        total_waste: percentile_stats(&mut wastes)?,
        survival_rate: survived as f64 / outcomes.len() as f64,
    })
}
