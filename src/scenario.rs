use thiserror::Error;

use crate::events::EventKind;
use crate::types::ScenarioId;

/// Per-month trigger probability for each random event kind.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct EventProbabilities {
    pub supply_shock: f64,
    pub energy_spike: f64,
    pub new_regulation: f64,
    pub market_crash: f64,
    pub circular_incentive: f64,
    pub tech_breakthrough: f64,
}

impl EventProbabilities {
    pub const NONE: EventProbabilities = EventProbabilities {
        supply_shock: 0.0,
        energy_spike: 0.0,
        new_regulation: 0.0,
        market_crash: 0.0,
        circular_incentive: 0.0,
        tech_breakthrough: 0.0,
    };

    pub fn for_kind(&self, kind: EventKind) -> f64 {
        match kind {
            EventKind::SupplyShock => self.supply_shock,
            EventKind::EnergySpike => self.energy_spike,
            EventKind::NewRegulation => self.new_regulation,
            EventKind::MarketCrash => self.market_crash,
            EventKind::CircularIncentive => self.circular_incentive,
            EventKind::TechBreakthrough => self.tech_breakthrough,
            // Log-only kinds are emitted by the engine, never rolled.
            _ => 0.0,
        }
    }

    fn all(&self) -> [f64; 6] {
        [
            self.supply_shock,
            self.energy_spike,
            self.new_regulation,
            self.market_crash,
            self.circular_incentive,
            self.tech_breakthrough,
        ]
    }
}

/// A named macroeconomic regime. Immutable once a run starts.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Scenario {
    pub id: ScenarioId,
    pub name: &'static str,
    pub description: &'static str,
    /// Multiplier on per-unit material rates at month 0.
    pub material_cost_base: f64,
    /// Monthly multiplicative growth of material cost.
    pub material_cost_growth: f64,
    /// Half-width of the monthly zero-mean material cost perturbation.
    pub material_volatility: f64,
    /// EUR per ton of waste. With `waste_tax_intro_year` set, this is the
    /// post-introduction base and the tax is zero before that year.
    pub waste_tax_per_ton: f64,
    /// Monthly multiplicative growth of the waste tax.
    pub waste_tax_growth: f64,
    /// 1-based year the waste tax snaps in. `None` = taxed from month 1.
    pub waste_tax_intro_year: Option<u32>,
    /// Multiplier on per-unit energy rates at month 0.
    pub energy_cost_base: f64,
    /// Half-width of the monthly zero-mean energy cost perturbation.
    pub energy_volatility: f64,
    /// Demand index the monthly redraw centers on (100 = nominal).
    pub demand_base: f64,
    /// Scales the monthly demand redraw noise.
    pub demand_volatility: f64,
    /// Monthly multiplicative drift of the demand index.
    pub demand_growth: f64,
    /// Price premium for circular products (0.25 = +25%).
    pub circular_demand_bonus: f64,
    pub events: EventProbabilities,
}

#[derive(Debug, Error, PartialEq)]
pub enum ScenarioError {
    #[error("{field} is not finite")]
    NotFinite { field: &'static str },
    #[error("event probability {value} outside [0, 1]")]
    ProbabilityOutOfRange { value: f64 },
}

impl Scenario {
    /// The four fixed regimes, in display order.
    pub fn catalog() -> [Scenario; 4] {
        [
            // Cheap abundant materials, no waste regulation ever, strong
            // stable demand. Traditional manufacturing's best case.
            Scenario {
                id: ScenarioId::Optimistic,
                name: "Optimistic (Utopia)",
                description: "Infinite cheap resources, no waste regulations, \
                              stable high demand.",
                material_cost_base: 0.8,
                material_cost_growth: 0.001, // 0.1% monthly
                material_volatility: 0.003,
                waste_tax_per_ton: 0.0,
                waste_tax_growth: 0.0,
                waste_tax_intro_year: None,
                energy_cost_base: 0.8,
                energy_volatility: 0.01,
                demand_base: 120.0,
                demand_volatility: 0.02,
                demand_growth: 0.0,
                circular_demand_bonus: 0.0,
                events: EventProbabilities {
                    supply_shock: 0.0,
                    energy_spike: 0.0,
                    new_regulation: 0.0,
                    market_crash: 0.005,
                    circular_incentive: 0.0,
                    tech_breakthrough: 0.01,
                },
            },
            // Gradual resource inflation, a modest waste tax that grows,
            // steady market.
            Scenario {
                id: ScenarioId::BusinessAsUsual,
                name: "Business as Usual",
                description: "Gradual resource inflation, emerging \
                              sustainability awareness, steady market growth.",
                material_cost_base: 1.0,
                material_cost_growth: 0.005, // 0.5% monthly
                material_volatility: 0.005,
                waste_tax_per_ton: 500.0,
                waste_tax_growth: 0.01,
                waste_tax_intro_year: None,
                energy_cost_base: 1.0,
                energy_volatility: 0.03,
                demand_base: 100.0,
                demand_volatility: 0.05,
                demand_growth: 0.002,
                circular_demand_bonus: 0.1,
                events: EventProbabilities {
                    supply_shock: 0.02,
                    energy_spike: 0.015,
                    new_regulation: 0.008,
                    market_crash: 0.01,
                    circular_incentive: 0.01,
                    tech_breakthrough: 0.008,
                },
            },
            // Waste tax arrives at year 3 and then climbs steeply; growing
            // appetite for sustainable products.
            Scenario {
                id: ScenarioId::GreenTransition,
                name: "Green Transition",
                description: "Resource prices spike mid-simulation, moderate \
                              waste taxes phased in, growing demand for \
                              sustainable products.",
                material_cost_base: 1.0,
                material_cost_growth: 0.01, // 1% monthly
                material_volatility: 0.008,
                waste_tax_per_ton: 2_000.0,
                waste_tax_growth: 0.02,
                waste_tax_intro_year: Some(3),
                energy_cost_base: 1.2,
                energy_volatility: 0.06,
                demand_base: 100.0,
                demand_volatility: 0.08,
                demand_growth: 0.004,
                circular_demand_bonus: 0.25,
                events: EventProbabilities {
                    supply_shock: 0.03,
                    energy_spike: 0.03,
                    new_regulation: 0.02,
                    market_crash: 0.015,
                    circular_incentive: 0.03,
                    tech_breakthrough: 0.015,
                },
            },
            // Scarce expensive materials, strict waste law, disrupted supply
            // chains and shrinking demand. Circular strategies' home turf.
            Scenario {
                id: ScenarioId::ResourceCrisis,
                name: "Resource Crisis",
                description: "Materials become scarce and expensive, strict \
                              waste laws enforced, supply chains disrupted.",
                material_cost_base: 1.5,
                material_cost_growth: 0.02, // 2% monthly
                material_volatility: 0.012,
                waste_tax_per_ton: 5_000.0,
                waste_tax_growth: 0.03,
                waste_tax_intro_year: None,
                energy_cost_base: 1.5,
                energy_volatility: 0.10,
                demand_base: 80.0,
                demand_volatility: 0.15,
                demand_growth: -0.003,
                circular_demand_bonus: 0.5,
                events: EventProbabilities {
                    supply_shock: 0.06,
                    energy_spike: 0.05,
                    new_regulation: 0.03,
                    market_crash: 0.025,
                    circular_incentive: 0.02,
                    tech_breakthrough: 0.01,
                },
            },
        ]
    }

    pub fn get(id: ScenarioId) -> Scenario {
        Scenario::catalog()
            .into_iter()
            .find(|s| s.id == id)
            .expect("catalog covers every ScenarioId")
    }

    /// Guard for user-supplied scenarios. The built-in catalog is fixed at
    /// build time and needs no runtime check.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        for (field, value) in [
            ("material_cost_base", self.material_cost_base),
            ("material_cost_growth", self.material_cost_growth),
            ("material_volatility", self.material_volatility),
            ("waste_tax_per_ton", self.waste_tax_per_ton),
            ("waste_tax_growth", self.waste_tax_growth),
            ("energy_cost_base", self.energy_cost_base),
            ("energy_volatility", self.energy_volatility),
            ("demand_base", self.demand_base),
            ("demand_volatility", self.demand_volatility),
            ("demand_growth", self.demand_growth),
            ("circular_demand_bonus", self.circular_demand_bonus),
        ] {
            if !value.is_finite() {
                return Err(ScenarioError::NotFinite { field });
            }
        }
        for p in self.events.all() {
            if !(0.0..=1.0).contains(&p) {
                return Err(ScenarioError::ProbabilityOutOfRange { value: p });
            }
        }
        Ok(())
    }
}
