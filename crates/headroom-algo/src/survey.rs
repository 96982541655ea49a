//! Per-bus headroom survey.
//!
//! Runs the headroom search once per selected bus: load headroom always, and
//! generation headroom only where the bus already hosts generation and can
//! take some extra load. The solver method is resolved once on the base case
//! and reused for every bus.

use crate::dispatch::{BusSelection, Injection};
use crate::search::{resolve_solver_options, HeadroomSearch, HeadroomStudy, SearchResult};
use headroom_core::{BusId, Case, HeadroomResult, Megavars, Megawatts, PowerFlowSolver};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusHeadroom {
    pub bus: BusId,
    pub existing_load_mw: Megawatts,
    pub existing_load_mvar: Megavars,
    pub existing_gen_mw: Megawatts,
    pub existing_gen_mvar: Megavars,
    pub load_headroom: SearchResult,
    /// `None` when the bus has no generation or no load headroom.
    pub gen_headroom: Option<SearchResult>,
}

pub fn survey_buses<S: PowerFlowSolver>(
    solver: &S,
    case: &mut Case,
    study: &HeadroomStudy,
) -> HeadroomResult<Vec<BusHeadroom>> {
    study.validate_against(case)?;
    let options = resolve_solver_options(solver, case, study);
    let total = study.selection.len();

    let mut report = Vec::with_capacity(total);
    for (n, &bus) in study.selection.ids().iter().enumerate() {
        let (load_p, load_q) = case.bus_load(bus);
        let (gen_p, gen_q) = case.bus_generation(bus);
        info!(bus = %bus, progress = %format!("{}/{}", n + 1, total), "surveying bus");

        let single = HeadroomStudy {
            selection: BusSelection::single(bus),
            use_full_newton_raphson: Some(options.use_full_newton_raphson),
            ..study.clone()
        };

        let load_study = single.clone().with_injection(Injection::LoadOnly);
        let load_headroom = HeadroomSearch::new(solver, &load_study)
            .with_solver_options(options.clone())
            .run(case)?;

        let has_generation = case
            .gens()
            .iter()
            .any(|g| g.in_service && g.bus == bus);
        let gen_headroom = if has_generation && load_headroom.feasible_mw > Megawatts::ZERO {
            let gen_study = single.with_injection(Injection::GenerationOnly);
            Some(
                HeadroomSearch::new(solver, &gen_study)
                    .with_solver_options(options.clone())
                    .run(case)?,
            )
        } else {
            None
        };

        info!(
            bus = %bus,
            load_headroom_mw = load_headroom.feasible_mw.value(),
            gen_headroom_mw = gen_headroom.as_ref().map(|r| r.feasible_mw.value()),
            "bus surveyed"
        );
        report.push(BusHeadroom {
            bus,
            existing_load_mw: load_p,
            existing_load_mvar: load_q,
            existing_gen_mw: gen_p,
            existing_gen_mvar: gen_q,
            load_headroom,
            gen_headroom,
        });
    }
    Ok(report)
}
