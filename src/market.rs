use rand::Rng;

use crate::events::{EffectAction, EventKind, MarketEvent};
use crate::scenario::Scenario;
use crate::types::Month;

/// Demand index clamp band (100 = nominal demand).
pub const DEMAND_MIN: f64 = 50.0;
pub const DEMAND_MAX: f64 = 150.0;

/// Mutable market conditions, one instance per run. Shock factors hold the
/// temporary event modifications separately from the drifting bases so an
/// expired effect can be reversed exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketState {
    /// Drifting multiplier on per-unit material rates.
    pub material_cost: f64,
    pub material_shock: f64,
    /// EUR per ton. Zero until the introduction year when the scenario
    /// phases the tax in.
    pub waste_tax: f64,
    /// Drifting multiplier on per-unit energy rates.
    pub energy_cost: f64,
    pub energy_shock: f64,
    /// Demand index, clamped to [DEMAND_MIN, DEMAND_MAX].
    pub demand: f64,
    pub demand_shock: f64,
    /// Price premium for circular products, from the scenario.
    pub circular_premium: f64,
    /// Additive EUR/unit subsidy while a circular incentive is active.
    pub circular_bonus: f64,
    /// Multiplier on material-recovery efficiency from tech breakthroughs.
    pub circular_efficiency: f64,
    waste_tax_pending: bool,
}

impl MarketState {
    pub fn new(scenario: &Scenario) -> Self {
        let delayed = scenario.waste_tax_intro_year.is_some();
        MarketState {
            material_cost: scenario.material_cost_base,
            material_shock: 1.0,
            waste_tax: if delayed { 0.0 } else { scenario.waste_tax_per_ton },
            energy_cost: scenario.energy_cost_base,
            energy_shock: 1.0,
            demand: scenario.demand_base,
            demand_shock: 1.0,
            circular_premium: scenario.circular_demand_bonus,
            circular_bonus: 0.0,
            circular_efficiency: 1.0,
            waste_tax_pending: delayed,
        }
    }

    /// Monthly parameter drift. Returns the waste-tax introduction event the
    /// single time a delayed tax snaps in.
    pub fn drift(
        &mut self,
        scenario: &Scenario,
        month: Month,
        rng: &mut impl Rng,
    ) -> Option<MarketEvent> {
        let noise = (rng.random::<f64>() - 0.5) * 2.0 * scenario.material_volatility;
        self.material_cost *= 1.0 + scenario.material_cost_growth + noise;

        let mut introduced = None;
        if self.waste_tax_pending {
            if let Some(year) = scenario.waste_tax_intro_year
                && month.year() >= year
            {
                self.waste_tax = scenario.waste_tax_per_ton;
                self.waste_tax_pending = false;
                introduced = Some(MarketEvent::new(month, EventKind::WasteTaxIntroduced));
            }
        } else {
            self.waste_tax *= 1.0 + scenario.waste_tax_growth;
        }

        let energy_noise = (rng.random::<f64>() - 0.5) * 2.0 * scenario.energy_volatility;
        self.energy_cost *= 1.0 + energy_noise;

        // Redraw around a base that itself drifts by the growth rate.
        let drifted_base = scenario.demand_base * (1.0 + scenario.demand_growth).powi(month.0 as i32);
        let demand_noise = (rng.random::<f64>() - 0.5) * scenario.demand_volatility * 100.0;
        self.demand = (drifted_base + demand_noise).clamp(DEMAND_MIN, DEMAND_MAX);

        introduced
    }

    /// Apply an event's one-time modification.
    pub fn apply(&mut self, action: EffectAction) {
        match action {
            EffectAction::ScaleMaterialShock(f) => self.material_shock *= f,
            EffectAction::ScaleEnergyShock(f) => self.energy_shock *= f,
            EffectAction::ScaleDemandShock(f) => self.demand_shock *= f,
            EffectAction::ScaleWasteTax(f) => self.waste_tax *= f,
            EffectAction::AddCircularBonus(b) => self.circular_bonus += b,
            EffectAction::ScaleCircularEfficiency(f) => self.circular_efficiency *= f,
        }
    }

    /// Reverse a previously applied modification exactly.
    pub fn revert(&mut self, action: EffectAction) {
        match action {
            EffectAction::ScaleMaterialShock(f) => self.material_shock /= f,
            EffectAction::ScaleEnergyShock(f) => self.energy_shock /= f,
            EffectAction::ScaleDemandShock(f) => self.demand_shock /= f,
            EffectAction::ScaleWasteTax(f) => self.waste_tax /= f,
            EffectAction::AddCircularBonus(b) => self.circular_bonus -= b,
            EffectAction::ScaleCircularEfficiency(f) => self.circular_efficiency /= f,
        }
    }

    pub fn effective_material_cost(&self) -> f64 {
        self.material_cost * self.material_shock
    }

    pub fn effective_energy_cost(&self) -> f64 {
        self.energy_cost * self.energy_shock
    }

    /// Demand as a revenue multiplier (1.0 = nominal).
    pub fn demand_factor(&self) -> f64 {
        self.demand / 100.0 * self.demand_shock
    }
}
