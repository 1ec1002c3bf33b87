use std::collections::HashMap;

use serde::Serialize;

use crate::types::Month;

/// Everything that can appear in a run's event log. The first six are rolled
/// monthly against scenario probabilities and carry an effect profile; the
/// rest are emitted by the engine itself and only ever logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventKind {
    SupplyShock,
    EnergySpike,
    NewRegulation,
    MarketCrash,
    CircularIncentive,
    TechBreakthrough,
    // Log-only.
    WasteTaxIntroduced,
    Bankruptcy,
    WasteShutdown,
}

/// How long an effect stays on the market state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectDuration {
    /// Reversed exactly after this many months.
    Finite(u32),
    /// Applied once, never reversed.
    Permanent,
}

/// The single market-state modification an event makes when it fires.
/// Reversal is the exact inverse: divide where this multiplied, subtract
/// where it added.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EffectAction {
    ScaleMaterialShock(f64),
    ScaleEnergyShock(f64),
    ScaleDemandShock(f64),
    ScaleWasteTax(f64),
    AddCircularBonus(f64),
    ScaleCircularEfficiency(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectProfile {
    pub duration: EffectDuration,
    pub action: EffectAction,
}

impl EventKind {
    /// The six kinds rolled each month, in roll order.
    pub const RANDOM: [EventKind; 6] = [
        EventKind::SupplyShock,
        EventKind::EnergySpike,
        EventKind::NewRegulation,
        EventKind::MarketCrash,
        EventKind::CircularIncentive,
        EventKind::TechBreakthrough,
    ];

    /// Effect profile for random kinds; `None` for log-only kinds.
    pub fn profile(self) -> Option<EffectProfile> {
        use EffectAction::*;
        use EffectDuration::*;
        let profile = match self {
            EventKind::SupplyShock => EffectProfile {
                duration: Finite(6),
                action: ScaleMaterialShock(1.5),
            },
            EventKind::EnergySpike => EffectProfile {
                duration: Finite(4),
                action: ScaleEnergyShock(1.8),
            },
            EventKind::NewRegulation => EffectProfile {
                duration: Permanent,
                action: ScaleWasteTax(1.5),
            },
            EventKind::MarketCrash => EffectProfile {
                duration: Finite(8),
                action: ScaleDemandShock(0.6),
            },
            EventKind::CircularIncentive => EffectProfile {
                duration: Finite(12),
                action: AddCircularBonus(50.0),
            },
            EventKind::TechBreakthrough => EffectProfile {
                duration: Permanent,
                action: ScaleCircularEfficiency(1.15),
            },
            _ => return None,
        };
        Some(profile)
    }

    pub fn is_permanent(self) -> bool {
        matches!(self.profile(), Some(EffectProfile { duration: EffectDuration::Permanent, .. }))
    }

    pub fn icon(self) -> &'static str {
        match self {
            EventKind::SupplyShock => "📦",
            EventKind::EnergySpike => "⚡",
            EventKind::NewRegulation => "📜",
            EventKind::MarketCrash => "📉",
            EventKind::CircularIncentive => "♻️",
            EventKind::TechBreakthrough => "🔬",
            EventKind::WasteTaxIntroduced => "🏛️",
            EventKind::Bankruptcy => "💀",
            EventKind::WasteShutdown => "☠️",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            EventKind::SupplyShock => "Supply chain disruption drives material prices up",
            EventKind::EnergySpike => "Energy prices spike",
            EventKind::NewRegulation => "New regulation tightens waste disposal rules",
            EventKind::MarketCrash => "Market crash cuts demand",
            EventKind::CircularIncentive => "Government subsidy for circular products",
            EventKind::TechBreakthrough => "Recycling technology breakthrough",
            EventKind::WasteTaxIntroduced => "Waste tax comes into force",
            EventKind::Bankruptcy => "Out of cash — bankrupt",
            EventKind::WasteShutdown => "Waste cap exceeded — shut down by regulator",
        }
    }
}

/// One entry of the ordered run event log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketEvent {
    pub month: Month,
    pub kind: EventKind,
    pub message: String,
}

impl MarketEvent {
    pub fn new(month: Month, kind: EventKind) -> Self {
        MarketEvent { month, kind, message: kind.message().to_string() }
    }
}

/// Remaining-duration bookkeeping for finite-duration effects.
/// Invariant: at most one active instance per kind — `activate` on an
/// already-active kind is a caller bug. Permanent effects never enter here.
#[derive(Debug, Default)]
pub struct ActiveEffects {
    remaining: HashMap<EventKind, u32>,
}

impl ActiveEffects {
    pub fn new() -> Self {
        ActiveEffects { remaining: HashMap::new() }
    }

    pub fn is_active(&self, kind: EventKind) -> bool {
        self.remaining.contains_key(&kind)
    }

    pub fn activate(&mut self, kind: EventKind, months: u32) {
        debug_assert!(months > 0, "zero-duration effect");
        let prev = self.remaining.insert(kind, months);
        debug_assert!(prev.is_none(), "{kind:?} already active");
    }

    /// Decrement every active effect; return the kinds that just expired so
    /// the caller can reverse their modifications. Expiry order within a
    /// month is immaterial — reversals touch independent fields.
    pub fn tick(&mut self) -> Vec<EventKind> {
        let mut expired = Vec::new();
        for (kind, left) in self.remaining.iter_mut() {
            *left -= 1;
            if *left == 0 {
                expired.push(*kind);
            }
        }
        for kind in &expired {
            self.remaining.remove(kind);
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.remaining.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }
}
