//! Power-flow solver boundary.
//!
//! The headroom search never looks inside a solver. It hands over the case and
//! an opaque [`SolverOptions`] record and receives a [`SolveOutcome`]: either a
//! converged result set or a failure, which the search treats as infeasibility.

use crate::{BusId, ElementRef, Megavars, MegavoltAmperes, Megawatts, PerUnit, RateSelector, Ratings};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub mod backend;

pub use backend::{FaerSolver, GaussSolver, LinearSystemBackend};

/// Options threaded through to the solver untouched by the search.
///
/// `params` mirrors the tool-specific option map of a study document (for
/// example `{"options1": 1, "options5": 1}`); `use_full_newton_raphson`
/// selects the full Newton-Raphson variant over the decoupled one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolverOptions {
    #[serde(default)]
    pub use_full_newton_raphson: bool,
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
}

impl SolverOptions {
    pub fn new(params: BTreeMap<String, Value>) -> Self {
        Self {
            use_full_newton_raphson: false,
            params,
        }
    }

    pub fn with_full_newton_raphson(mut self, enabled: bool) -> Self {
        self.use_full_newton_raphson = enabled;
        self
    }

    /// Numeric parameter lookup; non-numeric values read as `None`.
    pub fn param_f64(&self, key: &str) -> Option<f64> {
        self.params.get(key).and_then(Value::as_f64)
    }
}

/// Bus voltage magnitude after a solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusVoltage {
    pub bus: BusId,
    pub in_service: bool,
    pub voltage: PerUnit,
}

/// Apparent power flowing through a branch or transformer, with the ratings
/// needed to express it as a loading percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchFlow {
    pub element: ElementRef,
    pub flow: MegavoltAmperes,
    pub ratings: Ratings,
}

impl BranchFlow {
    /// Loading in percent of the selected rating; `None` when that rating is unlimited.
    pub fn loading_pct(&self, selector: RateSelector) -> Option<f64> {
        self.ratings
            .get(selector)
            .map(|rating| 100.0 * self.flow.value().abs() / rating.value())
    }
}

/// Power delivered by a swing bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwingPower {
    pub bus: BusId,
    pub active_power: Megawatts,
    pub reactive_power: Megavars,
}

impl SwingPower {
    pub fn apparent_power(&self) -> MegavoltAmperes {
        self.active_power.apparent_power(self.reactive_power)
    }
}

/// Everything the limit evaluator needs from a converged solve.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerFlowResults {
    pub bus_voltages: Vec<BusVoltage>,
    pub branch_flows: Vec<BranchFlow>,
    pub trafo_flows: Vec<BranchFlow>,
    pub swing_power: Vec<SwingPower>,
}

/// Result of one blocking solve.
#[derive(Debug, Clone, PartialEq)]
pub enum SolveOutcome {
    Converged(PowerFlowResults),
    Failed { reason: String },
}

impl SolveOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        SolveOutcome::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_converged(&self) -> bool {
        matches!(self, SolveOutcome::Converged(_))
    }
}

/// A power-flow engine the headroom search can drive.
///
/// Implementations must not mutate the case and must be deterministic for a
/// given case state and options.
pub trait PowerFlowSolver {
    fn solve(&self, case: &crate::Case, options: &SolverOptions) -> SolveOutcome;
}

impl<S: PowerFlowSolver + ?Sized> PowerFlowSolver for &S {
    fn solve(&self, case: &crate::Case, options: &SolverOptions) -> SolveOutcome {
        (**self).solve(case, options)
    }
}
