//! Dispatch adjustment: turning a MW delta into per-bus load and generation increments.
//!
//! The delta is shared equally across the selected buses. Each share becomes a
//! temporary load and/or generator record (id `"Tm"`) at the bus, with reactive
//! power fixed by the class power factor. Temporary records disappear again
//! when the case is restored to a snapshot taken before the adjustment.

use headroom_core::{BusId, Case, HeadroomError, HeadroomResult, Megavars, Megawatts};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Non-empty set of unique buses whose dispatch the search may change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<BusId>", into = "Vec<BusId>")]
pub struct BusSelection(Vec<BusId>);

impl BusSelection {
    pub fn new(ids: Vec<BusId>) -> HeadroomResult<Self> {
        if ids.is_empty() {
            return Err(HeadroomError::config(
                "selected_buses_ids must name at least one bus",
            ));
        }
        let mut seen = HashSet::with_capacity(ids.len());
        for id in &ids {
            if !seen.insert(*id) {
                return Err(HeadroomError::config(format!(
                    "selected_buses_ids lists bus {id} more than once"
                )));
            }
        }
        Ok(Self(ids))
    }

    pub fn single(id: BusId) -> Self {
        Self(vec![id])
    }

    /// Every in-service bus of the case, in case order.
    pub fn all_in_service(case: &Case) -> HeadroomResult<Self> {
        Self::new(
            case.buses()
                .iter()
                .filter(|b| b.in_service)
                .map(|b| b.id)
                .collect(),
        )
    }

    pub fn ids(&self) -> &[BusId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fails with the first selected bus missing from the case.
    pub fn validate_against(&self, case: &Case) -> HeadroomResult<()> {
        for &id in &self.0 {
            case.require_bus(id, "selected_buses_ids")?;
        }
        Ok(())
    }
}

impl TryFrom<Vec<BusId>> for BusSelection {
    type Error = HeadroomError;

    fn try_from(ids: Vec<BusId>) -> HeadroomResult<Self> {
        Self::new(ids)
    }
}

impl From<BusSelection> for Vec<BusId> {
    fn from(selection: BusSelection) -> Self {
        selection.0
    }
}

/// Power factors fixing the reactive companion of load and generation increments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerFactorPair {
    pub load_pf: f64,
    pub gen_pf: f64,
}

impl Default for PowerFactorPair {
    fn default() -> Self {
        Self {
            load_pf: 0.9,
            gen_pf: 0.9,
        }
    }
}

impl PowerFactorPair {
    pub fn new(load_pf: f64, gen_pf: f64) -> HeadroomResult<Self> {
        let pair = Self { load_pf, gen_pf };
        pair.validate()?;
        Ok(pair)
    }

    pub fn validate(&self) -> HeadroomResult<()> {
        for (field, pf) in [
            ("load_power_factor", self.load_pf),
            ("gen_power_factor", self.gen_pf),
        ] {
            if !(pf > 0.0 && pf <= 1.0) {
                return Err(HeadroomError::config(format!(
                    "{field} must be in (0, 1], got {pf}"
                )));
            }
        }
        Ok(())
    }
}

/// Which side of the balance a dispatch adjustment moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Injection {
    /// Matching load and generation increments at each selected bus.
    #[default]
    LoadAndGeneration,
    LoadOnly,
    GenerationOnly,
}

impl Injection {
    pub fn moves_load(self) -> bool {
        matches!(self, Injection::LoadAndGeneration | Injection::LoadOnly)
    }

    pub fn moves_generation(self) -> bool {
        matches!(self, Injection::LoadAndGeneration | Injection::GenerationOnly)
    }
}

/// Increments written at one bus.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusIncrement {
    pub bus: BusId,
    pub load_mw: Megawatts,
    pub load_mvar: Megavars,
    pub gen_mw: Megawatts,
    pub gen_mvar: Megavars,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdjustmentOutcome {
    pub requested: Megawatts,
    /// Smallest total actually applied across the classes the injection moves.
    pub applied: Megawatts,
    pub load_applied: Megawatts,
    pub gen_applied: Megawatts,
    pub increments: Vec<BusIncrement>,
}

impl AdjustmentOutcome {
    /// True when a cap cut the adjustment short.
    pub fn is_clamped(&self) -> bool {
        self.applied < self.requested
    }
}

/// Applies MW deltas to a case under fixed caps and power factors.
#[derive(Debug, Clone)]
pub struct DispatchAdjuster<'a> {
    selection: &'a BusSelection,
    power_factors: PowerFactorPair,
    injection: Injection,
    upper_load_cap: Megawatts,
    upper_gen_cap: Megawatts,
}

impl<'a> DispatchAdjuster<'a> {
    pub fn new(
        selection: &'a BusSelection,
        power_factors: PowerFactorPair,
        upper_load_cap: Megawatts,
        upper_gen_cap: Megawatts,
    ) -> Self {
        Self {
            selection,
            power_factors,
            injection: Injection::LoadAndGeneration,
            upper_load_cap,
            upper_gen_cap,
        }
    }

    pub fn with_injection(mut self, injection: Injection) -> Self {
        self.injection = injection;
        self
    }

    /// Write the increments for `delta` into `case`.
    ///
    /// Every selected bus is checked before the case is touched, so a failed
    /// call leaves the case unchanged.
    pub fn apply(&self, case: &mut Case, delta: Megawatts) -> HeadroomResult<AdjustmentOutcome> {
        if !delta.is_finite() || delta < Megawatts::ZERO {
            return Err(HeadroomError::config(format!(
                "dispatch delta must be a finite non-negative value, got {}",
                delta.value()
            )));
        }
        self.selection.validate_against(case)?;

        let load_total = if self.injection.moves_load() {
            delta.min(self.upper_load_cap.max(Megawatts::ZERO))
        } else {
            Megawatts::ZERO
        };
        let gen_total = if self.injection.moves_generation() {
            delta.min(self.upper_gen_cap.max(Megawatts::ZERO))
        } else {
            Megawatts::ZERO
        };
        let applied = match self.injection {
            Injection::LoadAndGeneration => load_total.min(gen_total),
            Injection::LoadOnly => load_total,
            Injection::GenerationOnly => gen_total,
        };

        let n = self.selection.len() as f64;
        let load_share = load_total / n;
        let gen_share = gen_total / n;
        let load_q = load_share.reactive_at_power_factor(self.power_factors.load_pf);
        let gen_q = gen_share.reactive_at_power_factor(self.power_factors.gen_pf);

        let mut increments = Vec::with_capacity(self.selection.len());
        for &bus in self.selection.ids() {
            if load_share > Megawatts::ZERO {
                case.push_temporary_load(bus, load_share, load_q)?;
            }
            if gen_share > Megawatts::ZERO {
                case.push_temporary_gen(bus, gen_share, gen_q)?;
            }
            increments.push(BusIncrement {
                bus,
                load_mw: load_share,
                load_mvar: load_q,
                gen_mw: gen_share,
                gen_mvar: gen_q,
            });
        }

        debug!(
            requested_mw = delta.value(),
            load_mw = load_total.value(),
            gen_mw = gen_total.value(),
            buses = self.selection.len(),
            "applied dispatch adjustment"
        );

        Ok(AdjustmentOutcome {
            requested: delta,
            applied,
            load_applied: load_total,
            gen_applied: gen_total,
            increments,
        })
    }
}

/// One-shot matching load/generation adjustment.
pub fn apply_dispatch(
    case: &mut Case,
    selection: &BusSelection,
    delta: Megawatts,
    power_factors: PowerFactorPair,
    upper_load_cap: Megawatts,
    upper_gen_cap: Megawatts,
) -> HeadroomResult<AdjustmentOutcome> {
    DispatchAdjuster::new(selection, power_factors, upper_load_cap, upper_gen_cap).apply(case, delta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use headroom_core::{Branch, Bus, BusKind, TEMP_ELEMENT_ID};

    fn case() -> Case {
        let mut case = Case::new("dispatch", 100.0);
        case.add_bus(Bus::new(BusId::new(1)).with_kind(BusKind::Swing))
            .unwrap();
        case.add_bus(Bus::new(BusId::new(2))).unwrap();
        case.add_bus(Bus::new(BusId::new(3))).unwrap();
        case.add_branch(Branch::new(BusId::new(1), BusId::new(2), 0.1))
            .unwrap();
        case.add_branch(Branch::new(BusId::new(2), BusId::new(3), 0.1))
            .unwrap();
        case
    }

    fn selection() -> BusSelection {
        BusSelection::new(vec![BusId::new(2), BusId::new(3)]).unwrap()
    }

    #[test]
    fn splits_delta_equally() {
        let mut case = case();
        let selection = selection();
        let outcome = apply_dispatch(
            &mut case,
            &selection,
            Megawatts(40.0),
            PowerFactorPair::default(),
            Megawatts(100.0),
            Megawatts(100.0),
        )
        .unwrap();

        assert!(!outcome.is_clamped());
        assert_eq!(outcome.increments.len(), 2);
        assert_eq!(case.bus_load(BusId::new(2)).0, Megawatts(20.0));
        assert_eq!(case.bus_generation(BusId::new(3)).0, Megawatts(20.0));
        assert!(case.loads().iter().all(|l| l.id == TEMP_ELEMENT_ID));
        let q = case.bus_load(BusId::new(2)).1.value();
        assert!((q - 20.0 * (0.9f64.acos()).tan()).abs() < 1e-9);
    }

    #[test]
    fn caps_clamp_each_class() {
        let mut case = case();
        let selection = selection();
        let outcome = apply_dispatch(
            &mut case,
            &selection,
            Megawatts(80.0),
            PowerFactorPair::default(),
            Megawatts(50.0),
            Megawatts(100.0),
        )
        .unwrap();

        assert!(outcome.is_clamped());
        assert_eq!(outcome.applied, Megawatts(50.0));
        assert_eq!(outcome.load_applied, Megawatts(50.0));
        assert_eq!(outcome.gen_applied, Megawatts(80.0));
    }

    #[test]
    fn unity_power_factor_has_no_reactive_part() {
        let mut case = case();
        let selection = BusSelection::single(BusId::new(2));
        let pf = PowerFactorPair::new(1.0, 1.0).unwrap();
        apply_dispatch(
            &mut case,
            &selection,
            Megawatts(10.0),
            pf,
            Megawatts(100.0),
            Megawatts(100.0),
        )
        .unwrap();
        assert_eq!(case.bus_load(BusId::new(2)).1.value(), 0.0);
    }

    #[test]
    fn load_only_leaves_generation_alone() {
        let mut case = case();
        let selection = selection();
        let outcome = DispatchAdjuster::new(
            &selection,
            PowerFactorPair::default(),
            Megawatts(100.0),
            Megawatts(0.0),
        )
        .with_injection(Injection::LoadOnly)
        .apply(&mut case, Megawatts(30.0))
        .unwrap();

        assert!(!outcome.is_clamped());
        assert!(case.gens().is_empty());
        assert_eq!(case.loads().len(), 2);
    }

    #[test]
    fn zero_delta_adds_no_records() {
        let mut case = case();
        let selection = selection();
        let before = case.snapshot();
        apply_dispatch(
            &mut case,
            &selection,
            Megawatts::ZERO,
            PowerFactorPair::default(),
            Megawatts(100.0),
            Megawatts(100.0),
        )
        .unwrap();
        assert_eq!(case.snapshot(), before);
    }

    #[test]
    fn unknown_bus_fails_without_mutation() {
        let mut case = case();
        let selection = BusSelection::new(vec![BusId::new(2), BusId::new(99)]).unwrap();
        let before = case.snapshot();
        let err = apply_dispatch(
            &mut case,
            &selection,
            Megawatts(10.0),
            PowerFactorPair::default(),
            Megawatts(100.0),
            Megawatts(100.0),
        )
        .unwrap_err();
        assert!(matches!(err, HeadroomError::InvalidBusReference { bus, .. } if bus == BusId::new(99)));
        assert_eq!(case.snapshot(), before);
    }

    #[test]
    fn negative_delta_is_rejected() {
        let mut case = case();
        let selection = selection();
        assert!(apply_dispatch(
            &mut case,
            &selection,
            Megawatts(-1.0),
            PowerFactorPair::default(),
            Megawatts(100.0),
            Megawatts(100.0),
        )
        .is_err());
    }

    #[test]
    fn selection_rules() {
        assert!(BusSelection::new(vec![]).is_err());
        assert!(BusSelection::new(vec![BusId::new(1), BusId::new(1)]).is_err());
        let parsed: BusSelection = serde_json::from_str("[4, 2]").unwrap();
        assert_eq!(parsed.ids(), &[BusId::new(4), BusId::new(2)]);
        assert!(serde_json::from_str::<BusSelection>("[]").is_err());

        let all = BusSelection::all_in_service(&case()).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn power_factor_bounds() {
        assert!(PowerFactorPair::new(0.0, 0.9).is_err());
        assert!(PowerFactorPair::new(0.9, 1.1).is_err());
        assert!(PowerFactorPair::new(f64::NAN, 0.9).is_err());
        assert!(PowerFactorPair::new(0.95, 1.0).is_ok());
    }
}
