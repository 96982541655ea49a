//! # headroom-algo: Contingency-Constrained Headroom Search
//!
//! Finds the largest extra load (and matching generation) a set of buses can
//! take while the intact network stays within its normal limits and every
//! listed outage stays within its contingency limits.
//!
//! ## Components
//!
//! - [`limits`] - turns power-flow results into an ordered stream of violations
//! - [`dispatch`] - spreads a MW delta over the selected buses
//! - [`contingency`] - outage scenarios and the scoped [`OutageGuard`]
//! - [`search`] - the bounded bisection driving everything above
//! - [`survey`] - per-bus load and generation headroom
//! - [`study`] - JSON/YAML study documents
//! - [`power_flow`] - the reference [`LinearizedPowerFlow`] solver
//!
//! ## Example
//!
//! ```rust
//! use headroom_algo::{
//!     search, BusSelection, HeadroomStudy, Injection, LinearizedPowerFlow, SearchConfig,
//!     ViolationKind,
//! };
//! use headroom_core::*;
//!
//! let mut case = Case::new("two-bus", 100.0);
//! case.add_bus(Bus::new(BusId::new(1)).with_kind(BusKind::Swing)).unwrap();
//! case.add_bus(Bus::new(BusId::new(2))).unwrap();
//! case.add_branch(
//!     Branch::new(BusId::new(1), BusId::new(2), 0.1)
//!         .with_ratings(Ratings::uniform(MegavoltAmperes(100.0))),
//! )
//! .unwrap();
//!
//! let study = HeadroomStudy::new(
//!     SearchConfig::new(200.0, 200.0).with_tolerance(1.0),
//!     BusSelection::single(BusId::new(2)),
//! )
//! .with_injection(Injection::LoadOnly)
//! .with_full_newton_raphson(false);
//!
//! let result = search(&LinearizedPowerFlow::new(), &mut case, &study).unwrap();
//! assert!(result.converged);
//! assert!(result.feasible_mw.value() > 0.0);
//! assert!(result.feasible_mw.value() < 100.0);
//! assert_eq!(
//!     result.binding_constraint.unwrap().kind,
//!     ViolationKind::BranchLoading
//! );
//! ```

pub mod contingency;
pub mod dispatch;
pub mod limits;
pub mod power_flow;
pub mod search;
pub mod study;
pub mod survey;
pub mod test_utils;

pub use contingency::{
    apply_contingency, BranchOutage, Contingency, ContingencyScenario, Outage, OutageGroup,
    OutageGuard, TrafoOutage,
};
pub use dispatch::{
    apply_dispatch, AdjustmentOutcome, BusIncrement, BusSelection, DispatchAdjuster, Injection,
    PowerFactorPair,
};
pub use limits::{
    evaluate, first_violation, summarize, ElementId, LimitProfile, ViolationKind, ViolationRecord,
    ViolationSummary,
};
pub use power_flow::LinearizedPowerFlow;
pub use search::{
    resolve_solver_options, search, CandidateProbe, HeadroomSearch, HeadroomStudy, ProbeVerdict,
    SearchConfig, SearchResult,
};
pub use study::{load_study_from_path, StudyDocument};
pub use survey::{survey_buses, BusHeadroom};
