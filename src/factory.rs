use crate::config::{Allocation, TOTAL_BUDGET};
use crate::market::MarketState;

// Per-unit production rates, traditional line.
const TRAD_MATERIAL_PER_UNIT: f64 = 150.0; // EUR at material cost 1.0
const TRAD_ENERGY_PER_UNIT: f64 = 40.0; // EUR at energy cost 1.0
const TRAD_WASTE_PER_UNIT: f64 = 0.8; // tons
const TRAD_UNIT_PRICE: f64 = 800.0;

// Per-unit production rates, circular line. Material and waste are further
// scaled by (1 − recovery efficiency).
const CIRC_MATERIAL_PER_UNIT: f64 = 50.0;
const CIRC_ENERGY_PER_UNIT: f64 = 60.0;
const CIRC_WASTE_PER_UNIT: f64 = 0.2;
const CIRC_UNIT_PRICE: f64 = 700.0;

// Units of annual capacity per EUR invested.
const CAPACITY_PER_EUR: f64 = 1.0 / 10_000.0;

// Quality improves linearly with detection investment.
const QUALITY_FLOOR: f64 = 0.6;
const QUALITY_SPAN: f64 = 0.4;

// Material recovery improves linearly with eco-design investment;
// breakthroughs can push it further, up to the hard cap.
const RECOVERY_FLOOR: f64 = 0.3;
const RECOVERY_SPAN: f64 = 0.6;
const RECOVERY_CAP: f64 = 0.95;

// Fixed operating cost as an annual fraction of line investment.
const TRAD_OPEX_RATE: f64 = 0.04;
const CIRC_OPEX_RATE: f64 = 0.06;

/// Capacities and efficiencies derived once from the allocation; fixed for
/// the life of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactoryProfile {
    /// Traditional units produced per month.
    pub traditional_capacity: f64,
    /// Circular units produced per month.
    pub circular_capacity: f64,
    /// Fraction of traditional revenue surviving quality control.
    pub quality: f64,
    /// Base material-recovery efficiency before breakthrough multipliers.
    pub recovery: f64,
    /// Fixed monthly operating cost, EUR.
    pub operating_cost: f64,
}

/// One month's income statement. All amounts EUR, waste in tons.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct MonthAccounts {
    pub traditional_revenue: f64,
    pub circular_revenue: f64,
    pub material_cost: f64,
    pub energy_cost: f64,
    pub operating_cost: f64,
    pub waste_tons: f64,
    pub disposal_cost: f64,
}

impl MonthAccounts {
    pub fn net_profit(&self) -> f64 {
        self.traditional_revenue + self.circular_revenue
            - self.material_cost
            - self.energy_cost
            - self.disposal_cost
            - self.operating_cost
    }
}

impl FactoryProfile {
    pub fn from_allocation(alloc: &Allocation) -> Self {
        FactoryProfile {
            traditional_capacity: alloc.traditional * CAPACITY_PER_EUR / 12.0,
            circular_capacity: alloc.robotics * CAPACITY_PER_EUR / 12.0,
            quality: QUALITY_FLOOR + QUALITY_SPAN * (alloc.detection / TOTAL_BUDGET),
            recovery: RECOVERY_FLOOR + RECOVERY_SPAN * (alloc.ecodesign / TOTAL_BUDGET),
            operating_cost: (alloc.traditional * TRAD_OPEX_RATE
                + alloc.robotics * CIRC_OPEX_RATE)
                / 12.0,
        }
    }

    /// Recovery efficiency after breakthrough multipliers, hard-capped.
    pub fn effective_recovery(&self, market: &MarketState) -> f64 {
        (self.recovery * market.circular_efficiency).min(RECOVERY_CAP)
    }

    /// The monthly accounting formula under current market conditions.
    pub fn month_accounts(&self, market: &MarketState) -> MonthAccounts {
        let demand = market.demand_factor();
        let material = market.effective_material_cost();
        let energy = market.effective_energy_cost();

        let trad = self.traditional_capacity;
        let trad_material = trad * TRAD_MATERIAL_PER_UNIT * material;
        let trad_energy = trad * TRAD_ENERGY_PER_UNIT * energy;
        let trad_waste = trad * TRAD_WASTE_PER_UNIT;
        let trad_revenue = trad * TRAD_UNIT_PRICE * demand * self.quality;

        let recovery = self.effective_recovery(market);
        let circ = self.circular_capacity;
        let circ_material = circ * CIRC_MATERIAL_PER_UNIT * material * (1.0 - recovery);
        let circ_energy = circ * CIRC_ENERGY_PER_UNIT * energy;
        let circ_waste = circ * CIRC_WASTE_PER_UNIT * (1.0 - recovery);
        let circ_revenue = circ * CIRC_UNIT_PRICE * demand * (1.0 + market.circular_premium)
            + circ * market.circular_bonus;

        let waste_tons = trad_waste + circ_waste;

        MonthAccounts {
            traditional_revenue: trad_revenue,
            circular_revenue: circ_revenue,
            material_cost: trad_material + circ_material,
            energy_cost: trad_energy + circ_energy,
            operating_cost: self.operating_cost,
            waste_tons,
            disposal_cost: waste_tons * market.waste_tax,
        }
    }
}
