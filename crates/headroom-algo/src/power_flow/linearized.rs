//! Lossless linearised AC power flow.
//!
//! Angles and voltage magnitudes are decoupled and each solved against the
//! same susceptance matrix built from series reactances:
//!
//! ```text
//! B θ  = P      (active injections, per-unit)
//! B ΔV = Q      (reactive injections, per-unit)
//! V_i  = V_swing + ΔV_i
//! ```
//!
//! Only buses connected to the swing bus are solved; islanded buses report a
//! voltage of zero so that any limit check flags them. Branch flows are the
//! apparent power implied by the angle and magnitude differences across each
//! element.
//!
//! The solve is direct, so the Newton-Raphson flag of [`SolverOptions`] has
//! no effect here. Two numeric parameters are honoured:
//!
//! - `max_angle_deg` (default 90): a larger angle across any element is
//!   reported as non-convergence.
//! - `collapse_voltage_pu` (default 0.5): any energized bus below it is
//!   reported as non-convergence.

use anyhow::{anyhow, Result};
use headroom_core::graph_utils::energized_buses;
use headroom_core::solver::{FaerSolver, LinearSystemBackend};
use headroom_core::{
    BranchFlow, BusVoltage, Case, ElementRef, Megavars, MegavoltAmperes, Megawatts, PerUnit,
    PowerFlowResults, PowerFlowSolver, Ratings, SolveOutcome, SolverOptions, SwingPower,
};
use tracing::trace;

const DEFAULT_MAX_ANGLE_DEG: f64 = 90.0;
const DEFAULT_COLLAPSE_VOLTAGE_PU: f64 = 0.5;
const MIN_REACTANCE: f64 = 1e-6;

/// Reference solver over the [`PowerFlowSolver`] boundary.
#[derive(Debug, Clone, Default)]
pub struct LinearizedPowerFlow<B: LinearSystemBackend = FaerSolver> {
    backend: B,
}

impl LinearizedPowerFlow {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<B: LinearSystemBackend> LinearizedPowerFlow<B> {
    pub fn with_backend(backend: B) -> Self {
        Self { backend }
    }
}

/// A series element reduced to what the solve needs.
struct SeriesElement {
    element: ElementRef,
    ratings: Ratings,
    from: usize,
    to: usize,
    reactance: f64,
    is_transformer: bool,
}

fn series_elements(case: &Case, slot: &[Option<usize>]) -> Vec<SeriesElement> {
    let branches = case.branches().iter().filter(|b| b.in_service).map(|b| {
        (
            b.element_ref(),
            b.ratings,
            b.reactance.abs().max(MIN_REACTANCE),
            false,
        )
    });
    let trafos = case.transformers().iter().filter(|t| t.in_service).map(|t| {
        (
            t.element_ref(),
            t.ratings,
            (t.reactance * t.ratio).abs().max(MIN_REACTANCE),
            true,
        )
    });
    branches
        .chain(trafos)
        .filter_map(|(element, ratings, reactance, is_transformer)| {
            let from = case.bus_position(element.from_bus).and_then(|p| slot[p])?;
            let to = case.bus_position(element.to_bus).and_then(|p| slot[p])?;
            Some(SeriesElement {
                element,
                ratings,
                from,
                to,
                reactance,
                is_transformer,
            })
        })
        .collect()
}

impl<B: LinearSystemBackend> LinearizedPowerFlow<B> {
    fn run(&self, case: &Case, options: &SolverOptions) -> Result<SolveOutcome> {
        let Some(swing) = case.swing_bus() else {
            return Ok(SolveOutcome::failed("no in-service swing bus"));
        };
        let base_mva = case.base_mva();
        if !(base_mva > 0.0) {
            return Err(anyhow!("non-positive base MVA {base_mva}"));
        }
        let max_angle = options
            .param_f64("max_angle_deg")
            .unwrap_or(DEFAULT_MAX_ANGLE_DEG);
        let collapse = options
            .param_f64("collapse_voltage_pu")
            .unwrap_or(DEFAULT_COLLAPSE_VOLTAGE_PU);

        // Matrix slot per arena position; the swing bus takes slot 0.
        let energized = energized_buses(case);
        let swing_pos = case
            .bus_position(swing.id)
            .ok_or_else(|| anyhow!("swing bus {} missing from index", swing.id))?;
        let mut order = vec![swing_pos];
        order.extend((0..case.buses().len()).filter(|&p| p != swing_pos && energized[p]));
        let mut slot = vec![None; case.buses().len()];
        for (s, &p) in order.iter().enumerate() {
            slot[p] = Some(s);
        }
        let n = order.len();

        let mut p_inj = vec![0.0; n];
        let mut q_inj = vec![0.0; n];
        for load in case.loads().iter().filter(|l| l.in_service) {
            if let Some(s) = case.bus_position(load.bus).and_then(|p| slot[p]) {
                p_inj[s] -= load.active_power.value() / base_mva;
                q_inj[s] -= load.reactive_power.value() / base_mva;
            }
        }
        for gen in case.gens().iter().filter(|g| g.in_service) {
            if let Some(s) = case.bus_position(gen.bus).and_then(|p| slot[p]) {
                p_inj[s] += gen.active_power.value() / base_mva;
                q_inj[s] += gen.reactive_power.value() / base_mva;
            }
        }

        let elements = series_elements(case, &slot);
        let mut susceptance = vec![vec![0.0; n]; n];
        for e in &elements {
            let b = 1.0 / e.reactance;
            susceptance[e.from][e.from] += b;
            susceptance[e.to][e.to] += b;
            susceptance[e.from][e.to] -= b;
            susceptance[e.to][e.from] -= b;
        }

        // Drop the swing row/column; its angle is zero and its magnitude is fixed.
        let reduced: Vec<Vec<f64>> = susceptance[1..].iter().map(|row| row[1..].to_vec()).collect();
        let (angles, deltas) = if n > 1 {
            let theta = match self.backend.solve(&reduced, &p_inj[1..]) {
                Ok(theta) => theta,
                Err(err) => return Ok(SolveOutcome::failed(format!("angle solve: {err}"))),
            };
            let dv = match self.backend.solve(&reduced, &q_inj[1..]) {
                Ok(dv) => dv,
                Err(err) => return Ok(SolveOutcome::failed(format!("voltage solve: {err}"))),
            };
            (theta, dv)
        } else {
            (Vec::new(), Vec::new())
        };

        let v_swing = swing.voltage_setpoint.value();
        let theta_at = |s: usize| if s == 0 { 0.0 } else { angles[s - 1] };
        let v_at = |s: usize| if s == 0 { v_swing } else { v_swing + deltas[s - 1] };

        for s in 1..n {
            let v = v_at(s);
            if !v.is_finite() || v < collapse {
                let bus = case.buses()[order[s]].id;
                return Ok(SolveOutcome::failed(format!(
                    "voltage collapse at bus {bus} ({v:.3} pu)"
                )));
            }
        }

        let mut branch_flows = Vec::new();
        let mut trafo_flows = Vec::new();
        for e in &elements {
            let d_theta = theta_at(e.from) - theta_at(e.to);
            if d_theta.to_degrees().abs() > max_angle {
                return Ok(SolveOutcome::failed(format!(
                    "angle across {} exceeds {max_angle} degrees",
                    e.element
                )));
            }
            let d_v = v_at(e.from) - v_at(e.to);
            let flow = BranchFlow {
                element: e.element.clone(),
                flow: MegavoltAmperes((d_theta / e.reactance).hypot(d_v / e.reactance) * base_mva),
                ratings: e.ratings,
            };
            if e.is_transformer {
                trafo_flows.push(flow);
            } else {
                branch_flows.push(flow);
            }
        }

        let bus_voltages = case
            .buses()
            .iter()
            .enumerate()
            .map(|(p, bus)| BusVoltage {
                bus: bus.id,
                in_service: bus.in_service,
                voltage: PerUnit(slot[p].map_or(0.0, v_at)),
            })
            .collect();

        // Lossless: the swing bus covers the energized imbalance of every other bus.
        let (swing_load_p, swing_load_q) = case.bus_load(swing.id);
        let swing_p = swing_load_p.value() - p_inj[1..].iter().sum::<f64>() * base_mva;
        let swing_q = swing_load_q.value() - q_inj[1..].iter().sum::<f64>() * base_mva;

        trace!(
            case = case.name(),
            energized = n,
            islanded = case.buses().len() - n,
            "linearized power flow solved"
        );

        Ok(SolveOutcome::Converged(PowerFlowResults {
            bus_voltages,
            branch_flows,
            trafo_flows,
            swing_power: vec![SwingPower {
                bus: swing.id,
                active_power: Megawatts(swing_p),
                reactive_power: Megavars(swing_q),
            }],
        }))
    }
}

impl<B: LinearSystemBackend> PowerFlowSolver for LinearizedPowerFlow<B> {
    fn solve(&self, case: &Case, options: &SolverOptions) -> SolveOutcome {
        self.run(case, options)
            .unwrap_or_else(|err| SolveOutcome::failed(err.to_string()))
    }
}
