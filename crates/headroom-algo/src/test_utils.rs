//! Test fixtures: small cases and scripted solvers.
//!
//! The scripted solvers ignore network physics and report a single synthetic
//! flow equal to the MW injected by temporary (`"Tm"`) records, which makes
//! the feasible region of a search exactly known. That flow is the larger of
//! the temporary load and generation, not their net: load and generation
//! placed on the same bus do not cancel here, unlike in
//! [`LinearizedPowerFlow`](crate::LinearizedPowerFlow).

use headroom_core::{
    Branch, BranchFlow, Bus, BusId, BusKind, BusVoltage, Case, ElementRef, Gen, Load, Megavars,
    MegavoltAmperes, Megawatts, PerUnit, PowerFlowResults, PowerFlowSolver, Ratings, SolveOutcome,
    SolverOptions, SwingPower, Transformer, TEMP_ELEMENT_ID,
};
use std::cell::Cell;

fn bus(id: usize) -> Bus {
    Bus::new(BusId::new(id))
}

fn line(from: usize, to: usize, x: f64, rating: f64) -> Branch {
    Branch::new(BusId::new(from), BusId::new(to), x)
        .with_ratings(Ratings::uniform(MegavoltAmperes(rating)))
}

fn load(at: usize, p: f64, q: f64) -> Load {
    Load::new(BusId::new(at), Megawatts(p), Megavars(q))
}

/// Five-bus meshed case. Bus 5 hangs off bus 4 through the only transformer,
/// so a transformer outage islands it.
pub fn ring_case() -> Case {
    let mut case = Case::new("ring5", 100.0);
    case.add_bus(bus(1).with_kind(BusKind::Swing)).unwrap();
    for id in 2..=4 {
        case.add_bus(bus(id)).unwrap();
    }
    case.add_bus(bus(5)).unwrap();

    case.add_branch(line(1, 2, 0.05, 150.0)).unwrap();
    case.add_branch(line(1, 3, 0.08, 150.0)).unwrap();
    case.add_branch(line(2, 3, 0.10, 100.0)).unwrap();
    case.add_branch(line(3, 4, 0.06, 100.0)).unwrap();
    case.add_branch(line(2, 4, 0.10, 100.0)).unwrap();
    case.add_transformer(
        Transformer::new(BusId::new(4), BusId::new(5), 0.05)
            .with_ratings(Ratings::uniform(MegavoltAmperes(80.0))),
    )
    .unwrap();

    case.add_load(load(2, 20.0, 5.0)).unwrap();
    case.add_load(load(3, 15.0, 4.0)).unwrap();
    case.add_load(load(4, 10.0, 3.0)).unwrap();
    case.add_load(load(5, 5.0, 1.0)).unwrap();
    case.add_gen(Gen::new(BusId::new(4), Megawatts(10.0), Megavars(2.0)))
        .unwrap();
    case
}

/// Three buses in a line: 1 (swing) - 2 - 3.
pub fn radial_case() -> Case {
    let mut case = Case::new("radial3", 100.0);
    case.add_bus(bus(1).with_kind(BusKind::Swing)).unwrap();
    case.add_bus(bus(2)).unwrap();
    case.add_bus(bus(3)).unwrap();
    case.add_branch(line(1, 2, 0.05, 120.0)).unwrap();
    case.add_branch(line(2, 3, 0.05, 120.0)).unwrap();
    case.add_load(load(3, 10.0, 2.0)).unwrap();
    case
}

fn temporary_injection(case: &Case) -> f64 {
    let load: f64 = case
        .loads()
        .iter()
        .filter(|l| l.id == TEMP_ELEMENT_ID)
        .map(|l| l.active_power.value())
        .sum();
    let gen: f64 = case
        .gens()
        .iter()
        .filter(|g| g.id == TEMP_ELEMENT_ID)
        .map(|g| g.active_power.value())
        .sum();
    load.max(gen)
}

fn any_outage(case: &Case) -> bool {
    case.branches().iter().any(|b| !b.in_service)
        || case.transformers().iter().any(|t| !t.in_service)
}

fn flat_results(case: &Case) -> PowerFlowResults {
    PowerFlowResults {
        bus_voltages: case
            .buses()
            .iter()
            .map(|b| BusVoltage {
                bus: b.id,
                in_service: b.in_service,
                voltage: PerUnit::ONE,
            })
            .collect(),
        branch_flows: Vec::new(),
        trafo_flows: Vec::new(),
        swing_power: case
            .swing_bus()
            .map(|b| SwingPower {
                bus: b.id,
                active_power: Megawatts::ZERO,
                reactive_power: Megavars::ZERO,
            })
            .into_iter()
            .collect(),
    }
}

/// Feasible exactly while the injected MW stays at or below a threshold.
///
/// The threshold shows up as the rating of one synthetic branch whose flow is
/// the injected MW, so with a 100 % loading limit the boundary is the
/// threshold itself.
#[derive(Debug, Default)]
pub struct ThresholdSolver {
    pub limit_mw: f64,
    /// Threshold used while any branch or transformer is out of service.
    pub outage_limit_mw: Option<f64>,
    /// Injections above this fail to converge.
    pub fail_above_mw: Option<f64>,
    /// Like `fail_above_mw`, but only while something is out of service.
    pub outage_fail_above_mw: Option<f64>,
    calls: Cell<usize>,
}

impl ThresholdSolver {
    pub fn new(limit_mw: f64) -> Self {
        Self {
            limit_mw,
            ..Default::default()
        }
    }

    pub fn with_outage_limit(mut self, limit_mw: f64) -> Self {
        self.outage_limit_mw = Some(limit_mw);
        self
    }

    pub fn with_failure_above(mut self, mw: f64) -> Self {
        self.fail_above_mw = Some(mw);
        self
    }

    pub fn with_outage_failure_above(mut self, mw: f64) -> Self {
        self.outage_fail_above_mw = Some(mw);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl PowerFlowSolver for ThresholdSolver {
    fn solve(&self, case: &Case, _options: &SolverOptions) -> SolveOutcome {
        self.calls.set(self.calls.get() + 1);
        let injected = temporary_injection(case);
        if self.fail_above_mw.is_some_and(|limit| injected > limit) {
            return SolveOutcome::failed(format!("diverged at {injected:.3} MW"));
        }
        let outaged = any_outage(case);
        if outaged && self.outage_fail_above_mw.is_some_and(|limit| injected > limit) {
            return SolveOutcome::failed(format!("diverged at {injected:.3} MW with an outage"));
        }
        let limit = match self.outage_limit_mw {
            Some(outage_limit) if outaged => outage_limit,
            _ => self.limit_mw,
        };
        let element = case
            .branches()
            .first()
            .map(Branch::element_ref)
            .unwrap_or_else(|| ElementRef {
                from_bus: BusId::new(0),
                to_bus: BusId::new(0),
                circuit: "1".into(),
            });
        let mut results = flat_results(case);
        results.branch_flows.push(BranchFlow {
            element,
            flow: MegavoltAmperes(injected),
            ratings: Ratings::uniform(MegavoltAmperes(limit)),
        });
        SolveOutcome::Converged(results)
    }
}

/// Flat-voltage solver that counts its calls; optionally fails unless full
/// Newton-Raphson is requested.
#[derive(Debug, Default)]
pub struct CountingSolver {
    require_full_newton_raphson: bool,
    calls: Cell<usize>,
}

impl CountingSolver {
    pub fn failing_unless_full_newton_raphson() -> Self {
        Self {
            require_full_newton_raphson: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl PowerFlowSolver for CountingSolver {
    fn solve(&self, case: &Case, options: &SolverOptions) -> SolveOutcome {
        self.calls.set(self.calls.get() + 1);
        if self.require_full_newton_raphson && !options.use_full_newton_raphson {
            return SolveOutcome::failed("decoupled iteration diverged");
        }
        SolveOutcome::Converged(flat_results(case))
    }
}
