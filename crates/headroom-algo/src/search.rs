//! Contingency-constrained headroom search.
//!
//! ## Algorithm
//!
//! 1. Validate the study against the case (buses, outage references, limits)
//!    before any solve.
//! 2. Resolve the solver method when the study leaves it open: the decoupled
//!    variant if it converges on the base case, full Newton-Raphson otherwise.
//! 3. Base check: solve the unmodified case against the normal limits. A
//!    violation (or non-convergence) there means no headroom at all.
//! 4. Probe the ceiling. If it passes, the ceiling is the answer.
//! 5. Bisect `[low, high]` until `high - low <= tolerance` or the iteration
//!    budget is spent. A candidate passes when the intact network meets the
//!    normal limits and every contingency meets the contingency limits.
//!
//! Every trial starts from the base dispatch and topology, and the case is
//! restored to its base state before [`search`] returns.

use crate::contingency::{apply_contingency, Contingency, ContingencyScenario};
use crate::dispatch::{BusSelection, DispatchAdjuster, Injection, PowerFactorPair};
use crate::limits::{evaluate, first_violation, summarize, LimitProfile, ViolationRecord};
use headroom_core::{
    Case, HeadroomError, HeadroomResult, Megawatts, PowerFlowSolver, SolveOutcome, SolverOptions,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

pub(crate) fn default_solver_opts() -> BTreeMap<String, Value> {
    BTreeMap::from([
        ("options1".to_string(), Value::from(1)),
        ("options5".to_string(), Value::from(1)),
    ])
}

/// Search bounds and budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    pub upper_load_limit_p_mw: f64,
    pub upper_gen_limit_p_mw: f64,
    pub headroom_tolerance_p_mw: f64,
    pub max_iterations: usize,
    /// Passed to the solver untouched.
    #[serde(default = "default_solver_opts")]
    pub solver_opts: BTreeMap<String, Value>,
}

impl SearchConfig {
    pub fn new(upper_load_limit_p_mw: f64, upper_gen_limit_p_mw: f64) -> Self {
        Self {
            upper_load_limit_p_mw,
            upper_gen_limit_p_mw,
            headroom_tolerance_p_mw: 5.0,
            max_iterations: 10,
            solver_opts: default_solver_opts(),
        }
    }

    pub fn with_tolerance(mut self, tolerance_mw: f64) -> Self {
        self.headroom_tolerance_p_mw = tolerance_mw;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn validate(&self) -> HeadroomResult<()> {
        if !(self.headroom_tolerance_p_mw.is_finite() && self.headroom_tolerance_p_mw > 0.0) {
            return Err(HeadroomError::config(format!(
                "headroom_tolerance_p_mw must be positive, got {}",
                self.headroom_tolerance_p_mw
            )));
        }
        if self.max_iterations == 0 {
            return Err(HeadroomError::config("max_iterations must be at least 1"));
        }
        for (field, cap) in [
            ("upper_load_limit_p_mw", self.upper_load_limit_p_mw),
            ("upper_gen_limit_p_mw", self.upper_gen_limit_p_mw),
        ] {
            if !(cap.is_finite() && cap >= 0.0) {
                return Err(HeadroomError::config(format!(
                    "{field} must be a finite non-negative value, got {cap}"
                )));
            }
        }
        Ok(())
    }

    /// Upper end of the search interval for an injection direction.
    pub fn ceiling(&self, injection: Injection) -> Megawatts {
        let cap = match injection {
            Injection::LoadAndGeneration => self.upper_load_limit_p_mw.min(self.upper_gen_limit_p_mw),
            Injection::LoadOnly => self.upper_load_limit_p_mw,
            Injection::GenerationOnly => self.upper_gen_limit_p_mw,
        };
        Megawatts(cap)
    }

    pub fn tolerance(&self) -> Megawatts {
        Megawatts(self.headroom_tolerance_p_mw)
    }
}

/// Everything one headroom search needs besides the case and the solver.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadroomStudy {
    pub config: SearchConfig,
    pub selection: BusSelection,
    pub power_factors: PowerFactorPair,
    pub normal_limits: LimitProfile,
    pub contingency_limits: LimitProfile,
    pub scenario: ContingencyScenario,
    /// `None` lets the search pick the method from a base-case trial solve.
    pub use_full_newton_raphson: Option<bool>,
    pub injection: Injection,
}

impl HeadroomStudy {
    pub fn new(config: SearchConfig, selection: BusSelection) -> Self {
        Self {
            config,
            selection,
            power_factors: PowerFactorPair::default(),
            normal_limits: LimitProfile::normal(),
            contingency_limits: LimitProfile::contingency(),
            scenario: ContingencyScenario::default(),
            use_full_newton_raphson: None,
            injection: Injection::default(),
        }
    }

    pub fn with_power_factors(mut self, power_factors: PowerFactorPair) -> Self {
        self.power_factors = power_factors;
        self
    }

    pub fn with_limits(mut self, normal: LimitProfile, contingency: LimitProfile) -> Self {
        self.normal_limits = normal;
        self.contingency_limits = contingency;
        self
    }

    pub fn with_scenario(mut self, scenario: ContingencyScenario) -> Self {
        self.scenario = scenario;
        self
    }

    pub fn with_full_newton_raphson(mut self, enabled: bool) -> Self {
        self.use_full_newton_raphson = Some(enabled);
        self
    }

    pub fn with_injection(mut self, injection: Injection) -> Self {
        self.injection = injection;
        self
    }

    /// Case-independent checks.
    pub fn validate(&self) -> HeadroomResult<()> {
        self.config.validate()?;
        self.power_factors.validate()?;
        self.normal_limits.validate("normal_limits")?;
        self.contingency_limits.validate("contingency_limits")?;
        if !self.contingency_limits.is_wider_than(&self.normal_limits) {
            warn!("contingency limits are tighter than normal limits in at least one bound");
        }
        Ok(())
    }

    /// Full validation, including every bus and outage reference.
    pub fn validate_against(&self, case: &Case) -> HeadroomResult<()> {
        self.validate()?;
        self.selection.validate_against(case)?;
        self.scenario.validate_against(case)
    }

    fn adjuster(&self) -> DispatchAdjuster<'_> {
        DispatchAdjuster::new(
            &self.selection,
            self.power_factors,
            Megawatts(self.config.upper_load_limit_p_mw),
            Megawatts(self.config.upper_gen_limit_p_mw),
        )
        .with_injection(self.injection)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub feasible_mw: Megawatts,
    /// True when the final interval is within tolerance.
    pub converged: bool,
    /// The violation that rejected the final upper bound.
    pub binding_constraint: Option<ViolationRecord>,
    pub iterations_used: usize,
}

/// Outcome of checking one candidate delta.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeVerdict {
    Feasible,
    Violated(ViolationRecord),
    /// A cap cut the adjustment short; treated as infeasible.
    Clamped,
}

impl ProbeVerdict {
    pub fn is_feasible(&self) -> bool {
        matches!(self, ProbeVerdict::Feasible)
    }

    pub fn into_violation(self) -> Option<ViolationRecord> {
        match self {
            ProbeVerdict::Violated(record) => Some(record),
            _ => None,
        }
    }
}

/// Pick the solver method for a run.
///
/// An explicit study setting wins. Otherwise the base case is solved with the
/// decoupled variant and full Newton-Raphson is selected if that fails.
pub fn resolve_solver_options<S: PowerFlowSolver>(
    solver: &S,
    case: &Case,
    study: &HeadroomStudy,
) -> SolverOptions {
    let options = SolverOptions::new(study.config.solver_opts.clone());
    match study.use_full_newton_raphson {
        Some(enabled) => options.with_full_newton_raphson(enabled),
        None => {
            if solver.solve(case, &options).is_converged() {
                info!("base case converges with the decoupled method");
                options
            } else {
                info!("base case does not converge with the decoupled method, using full Newton-Raphson");
                options.with_full_newton_raphson(true)
            }
        }
    }
}

fn solve_and_check<S: PowerFlowSolver>(
    solver: &S,
    case: &Case,
    options: &SolverOptions,
    limits: &LimitProfile,
) -> Option<ViolationRecord> {
    match solver.solve(case, options) {
        SolveOutcome::Converged(results) => first_violation(&results, limits),
        SolveOutcome::Failed { reason } => {
            warn!(%reason, "power flow did not converge");
            Some(ViolationRecord::not_converged())
        }
    }
}

/// A validated study bound to a solver and a resolved method.
///
/// [`CandidateProbe::check`] runs one full trial (adjust, intact solve, every
/// contingency) and returns the case to the state it found it in.
pub struct CandidateProbe<'a, S> {
    solver: &'a S,
    study: &'a HeadroomStudy,
    adjuster: DispatchAdjuster<'a>,
    contingencies: Vec<Contingency>,
    options: SolverOptions,
}

impl<'a, S: PowerFlowSolver> CandidateProbe<'a, S> {
    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    /// First normal-limit violation of the case as it stands.
    pub fn check_base(&self, case: &Case) -> Option<ViolationRecord> {
        match self.solver.solve(case, &self.options) {
            SolveOutcome::Converged(results) => {
                let violations = evaluate(&results, &self.study.normal_limits);
                let first = violations.clone().next()?;
                let summary = summarize(violations);
                info!(%summary, first = %first, "base case violates normal limits");
                Some(first)
            }
            SolveOutcome::Failed { reason } => {
                warn!(%reason, "base case does not converge");
                Some(ViolationRecord::not_converged())
            }
        }
    }

    pub fn check(&self, case: &mut Case, candidate: Megawatts) -> HeadroomResult<ProbeVerdict> {
        let base = case.snapshot();
        let verdict = self.trial(case, candidate);
        case.restore(&base);
        verdict
    }

    fn trial(&self, case: &mut Case, candidate: Megawatts) -> HeadroomResult<ProbeVerdict> {
        let outcome = self.adjuster.apply(case, candidate)?;
        if outcome.is_clamped() {
            warn!(
                requested_mw = outcome.requested.value(),
                applied_mw = outcome.applied.value(),
                "dispatch adjustment clamped by cap"
            );
            return Ok(ProbeVerdict::Clamped);
        }

        if let Some(record) =
            solve_and_check(self.solver, case, &self.options, &self.study.normal_limits)
        {
            return Ok(ProbeVerdict::Violated(record));
        }

        for contingency in &self.contingencies {
            let guard = apply_contingency(case, contingency)?;
            if !guard.changed() {
                debug!(
                    scenario = contingency.index,
                    label = %contingency.label,
                    "elements already out of service, skipping"
                );
                continue;
            }
            let violation = solve_and_check(
                self.solver,
                &guard,
                &self.options,
                &self.study.contingency_limits,
            );
            guard.release();
            if let Some(record) = violation {
                return Ok(ProbeVerdict::Violated(record.with_scenario(contingency.index)));
            }
        }
        Ok(ProbeVerdict::Feasible)
    }
}

/// Headroom search over one study.
pub struct HeadroomSearch<'a, S> {
    solver: &'a S,
    study: &'a HeadroomStudy,
    options: Option<SolverOptions>,
}

impl<'a, S: PowerFlowSolver> HeadroomSearch<'a, S> {
    pub fn new(solver: &'a S, study: &'a HeadroomStudy) -> Self {
        Self {
            solver,
            study,
            options: None,
        }
    }

    /// Pin the solver options instead of resolving them from the base case.
    pub fn with_solver_options(mut self, options: SolverOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Validate the study against `case` and resolve the solver method.
    pub fn prepare(&self, case: &Case) -> HeadroomResult<CandidateProbe<'a, S>> {
        self.study.validate_against(case)?;
        let options = match &self.options {
            Some(options) => options.clone(),
            None => resolve_solver_options(self.solver, case, self.study),
        };
        Ok(CandidateProbe {
            solver: self.solver,
            study: self.study,
            adjuster: self.study.adjuster(),
            contingencies: self.study.scenario.contingencies(),
            options,
        })
    }

    pub fn run(&self, case: &mut Case) -> HeadroomResult<SearchResult> {
        let probe = self.prepare(case)?;
        let base = case.snapshot();
        let result = self.bisect(&probe, case);
        case.restore(&base);
        result
    }

    fn bisect(&self, probe: &CandidateProbe<'a, S>, case: &mut Case) -> HeadroomResult<SearchResult> {
        let config = &self.study.config;
        let tolerance = config.tolerance();
        let ceiling = config.ceiling(self.study.injection);
        info!(
            case = case.name(),
            buses = self.study.selection.len(),
            contingencies = probe.contingencies.len(),
            ceiling_mw = ceiling.value(),
            tolerance_mw = tolerance.value(),
            full_newton_raphson = probe.options.use_full_newton_raphson,
            "starting headroom search"
        );

        if let Some(record) = probe.check_base(case) {
            return Ok(SearchResult {
                feasible_mw: Megawatts::ZERO,
                converged: true,
                binding_constraint: Some(record),
                iterations_used: 0,
            });
        }

        if ceiling <= Megawatts::ZERO {
            return Ok(SearchResult {
                feasible_mw: Megawatts::ZERO,
                converged: true,
                binding_constraint: None,
                iterations_used: 0,
            });
        }

        let mut low = Megawatts::ZERO;
        let mut high = ceiling;
        let mut iterations = 1;
        let mut binding = match probe.check(case, ceiling)? {
            ProbeVerdict::Feasible => {
                info!(feasible_mw = ceiling.value(), "ceiling is feasible");
                return Ok(SearchResult {
                    feasible_mw: ceiling,
                    converged: true,
                    binding_constraint: None,
                    iterations_used: iterations,
                });
            }
            verdict => verdict.into_violation(),
        };

        while iterations < config.max_iterations && high - low > tolerance {
            iterations += 1;
            let candidate = (low + high) / 2.0;
            let verdict = probe.check(case, candidate)?;
            debug!(
                iteration = iterations,
                candidate_mw = candidate.value(),
                feasible = verdict.is_feasible(),
                "bisection round"
            );
            if verdict.is_feasible() {
                low = candidate;
            } else {
                high = candidate;
                binding = verdict.into_violation();
            }
        }

        let converged = high - low <= tolerance;
        if !converged {
            warn!(
                low_mw = low.value(),
                high_mw = high.value(),
                "iteration budget exhausted before reaching tolerance"
            );
        }
        info!(
            feasible_mw = low.value(),
            iterations,
            converged,
            binding = binding.as_ref().map(ToString::to_string).unwrap_or_default(),
            "headroom search finished"
        );
        Ok(SearchResult {
            feasible_mw: low,
            converged,
            binding_constraint: binding,
            iterations_used: iterations,
        })
    }
}

/// Run a headroom search. The case is back in its starting state on return.
pub fn search<S: PowerFlowSolver>(
    solver: &S,
    case: &mut Case,
    study: &HeadroomStudy,
) -> HeadroomResult<SearchResult> {
    HeadroomSearch::new(solver, study).run(case)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contingency::BranchOutage;
    use crate::limits::{ElementId, ViolationKind};
    use crate::test_utils::{radial_case, ring_case, CountingSolver, ThresholdSolver};
    use headroom_core::BusId;

    fn study(limit_cap: f64) -> HeadroomStudy {
        HeadroomStudy::new(
            SearchConfig::new(limit_cap, limit_cap).with_tolerance(1.0),
            BusSelection::new(vec![BusId::new(3)]).unwrap(),
        )
    }

    #[test]
    fn converges_on_threshold() {
        let solver = ThresholdSolver::new(42.0);
        let mut case = ring_case();
        let result = search(&solver, &mut case, &study(100.0).with_full_newton_raphson(false)).unwrap();
        assert!(result.converged);
        assert!(result.feasible_mw.value() <= 42.0);
        assert!(result.feasible_mw.value() >= 41.0);
        let binding = result.binding_constraint.unwrap();
        assert_eq!(binding.kind, ViolationKind::BranchLoading);
        assert_eq!(binding.scenario, None);
    }

    #[test]
    fn feasible_ceiling_ends_after_one_round() {
        let solver = ThresholdSolver::new(500.0);
        let mut case = ring_case();
        let result = search(&solver, &mut case, &study(80.0).with_full_newton_raphson(false)).unwrap();
        assert_eq!(result.feasible_mw, Megawatts(80.0));
        assert_eq!(result.iterations_used, 1);
        assert!(result.binding_constraint.is_none());
    }

    #[test]
    fn base_violation_returns_zero() {
        let solver = ThresholdSolver::new(50.0);
        let mut case = ring_case();
        let mut normal = LimitProfile::normal();
        normal.min_bus_voltage_pu = 1.01;
        let study = study(100.0).with_limits(normal, LimitProfile::contingency());
        let result = search(&solver, &mut case, &study).unwrap();
        assert_eq!(result.feasible_mw, Megawatts::ZERO);
        assert!(result.converged);
        assert_eq!(result.iterations_used, 0);
        assert_eq!(
            result.binding_constraint.unwrap().kind,
            ViolationKind::BusUndervoltage
        );
    }

    #[test]
    fn contingency_violation_carries_scenario_index() {
        let solver = ThresholdSolver::new(90.0).with_outage_limit(20.0);
        let mut case = radial_case();
        let scenario = ContingencyScenario {
            branches: vec![BranchOutage::new(BusId::new(1), BusId::new(2))],
            ..Default::default()
        };
        let study = study(100.0)
            .with_limits(LimitProfile::normal(), LimitProfile::normal())
            .with_scenario(scenario);
        let result = search(&solver, &mut case, &study).unwrap();
        assert!(result.feasible_mw.value() <= 20.0);
        assert!(result.feasible_mw.value() >= 19.0);
        assert_eq!(result.binding_constraint.unwrap().scenario, Some(0));
    }

    #[test]
    fn non_convergence_is_infeasibility() {
        let solver = ThresholdSolver::new(1000.0).with_failure_above(30.0);
        let mut case = ring_case();
        let result = search(&solver, &mut case, &study(100.0).with_full_newton_raphson(true)).unwrap();
        assert!(result.feasible_mw.value() <= 30.0);
        let binding = result.binding_constraint.unwrap();
        assert_eq!(binding.kind, ViolationKind::NotConverged);
        assert_eq!(binding.element_id, ElementId::Case);
    }

    #[test]
    fn non_convergence_under_outage_names_the_contingency() {
        let solver = ThresholdSolver::new(500.0).with_outage_failure_above(25.0);
        let mut case = radial_case();
        let before = case.snapshot();
        let scenario = ContingencyScenario {
            branches: vec![
                BranchOutage::new(BusId::new(2), BusId::new(3)),
                BranchOutage::new(BusId::new(1), BusId::new(2)),
            ],
            ..Default::default()
        };
        let study = study(100.0)
            .with_limits(LimitProfile::normal(), LimitProfile::normal())
            .with_scenario(scenario)
            .with_full_newton_raphson(false);

        let result = search(&solver, &mut case, &study).unwrap();
        assert!(result.converged);
        assert!(result.feasible_mw.value() <= 25.0);
        assert!(result.feasible_mw.value() >= 24.0);
        let binding = result.binding_constraint.unwrap();
        assert_eq!(binding.kind, ViolationKind::NotConverged);
        assert_eq!(binding.element_id, ElementId::Case);
        assert_eq!(binding.scenario, Some(0));
        assert_eq!(case.snapshot(), before);
        assert!(case.branches().iter().all(|b| b.in_service));
    }

    #[test]
    fn budget_exhaustion_reports_not_converged() {
        let solver = ThresholdSolver::new(33.3);
        let mut case = ring_case();
        let mut study = study(100.0).with_full_newton_raphson(false);
        study.config = study.config.clone().with_tolerance(0.01).with_max_iterations(3);
        let result = search(&solver, &mut case, &study).unwrap();
        assert!(!result.converged);
        assert_eq!(result.iterations_used, 3);
        assert_eq!(result.feasible_mw, Megawatts(25.0));
    }

    #[test]
    fn unknown_bus_fails_before_any_solve() {
        let solver = CountingSolver::default();
        let mut case = ring_case();
        let study = HeadroomStudy::new(
            SearchConfig::new(100.0, 100.0),
            BusSelection::new(vec![BusId::new(2), BusId::new(77)]).unwrap(),
        );
        let err = search(&solver, &mut case, &study).unwrap_err();
        assert!(matches!(err, HeadroomError::InvalidBusReference { bus, .. } if bus == BusId::new(77)));
        assert_eq!(solver.calls(), 0);
    }

    #[test]
    fn method_resolution_falls_back_to_full_newton_raphson() {
        let case = ring_case();
        let study = study(100.0);
        let decoupled_fails = CountingSolver::failing_unless_full_newton_raphson();
        let options = resolve_solver_options(&decoupled_fails, &case, &study);
        assert!(options.use_full_newton_raphson);
        assert_eq!(options.params, default_solver_opts());

        let fine = CountingSolver::default();
        assert!(!resolve_solver_options(&fine, &case, &study).use_full_newton_raphson);

        let pinned = study.with_full_newton_raphson(true);
        assert!(resolve_solver_options(&fine, &case, &pinned).use_full_newton_raphson);
        assert_eq!(fine.calls(), 1);
    }

    #[test]
    fn config_validation() {
        assert!(SearchConfig::new(10.0, 10.0).with_tolerance(0.0).validate().is_err());
        assert!(SearchConfig::new(10.0, 10.0).with_max_iterations(0).validate().is_err());
        assert!(SearchConfig::new(-1.0, 10.0).validate().is_err());
        assert!(SearchConfig::new(f64::INFINITY, 10.0).validate().is_err());
        assert!(SearchConfig::new(0.0, 10.0).validate().is_ok());
    }

    #[test]
    fn ceiling_depends_on_injection() {
        let config = SearchConfig::new(60.0, 40.0);
        assert_eq!(config.ceiling(Injection::LoadAndGeneration), Megawatts(40.0));
        assert_eq!(config.ceiling(Injection::LoadOnly), Megawatts(60.0));
        assert_eq!(config.ceiling(Injection::GenerationOnly), Megawatts(40.0));
    }

    #[test]
    fn probe_leaves_case_unchanged() {
        let solver = ThresholdSolver::new(42.0);
        let mut case = radial_case();
        let scenario = ContingencyScenario {
            branches: vec![BranchOutage::new(BusId::new(2), BusId::new(3))],
            ..Default::default()
        };
        let study = study(100.0).with_scenario(scenario);
        let search = HeadroomSearch::new(&solver, &study).with_solver_options(SolverOptions::default());
        let probe = search.prepare(&case).unwrap();
        let before = case.snapshot();
        assert!(probe.check(&mut case, Megawatts(10.0)).unwrap().is_feasible());
        assert!(!probe.check(&mut case, Megawatts(60.0)).unwrap().is_feasible());
        assert_eq!(case.snapshot(), before);
    }
}
