//! # headroom-core: Network Case Model
//!
//! Data structures shared by the headroom search engine and its collaborators.
//!
//! ## Design
//!
//! A [`Case`] is an arena: buses, loads, generators, branches and transformers
//! live in plain vectors and are addressed either by their stable [`BusId`] or
//! by their position in the arena. Searches mutate a case in place (dispatch
//! increments, outages) and roll it back with [`Case::snapshot`] /
//! [`Case::restore`], which patch indices instead of cloning the network.
//!
//! ```rust
//! use headroom_core::*;
//!
//! let mut case = Case::new("two-bus", 100.0);
//! case.add_bus(Bus::new(BusId::new(1)).with_kind(BusKind::Swing)).unwrap();
//! case.add_bus(Bus::new(BusId::new(2))).unwrap();
//! case.add_branch(Branch::new(BusId::new(1), BusId::new(2), 0.1)).unwrap();
//! case.add_load(Load::new(BusId::new(2), Megawatts(40.0), Megavars(10.0))).unwrap();
//!
//! let base = case.snapshot();
//! case.set_branch_in_service(0, false);
//! case.restore(&base);
//! assert!(case.branches()[0].in_service);
//! ```
//!
//! ## Modules
//!
//! - [`units`] - unit newtypes (MW, Mvar, MVA, pu, kV)
//! - [`solver`] - the power-flow solver boundary and linear-system backends
//! - [`case_file`] - JSON/YAML case documents and the case-loading boundary
//! - [`graph_utils`] - connectivity queries over the in-service topology

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub mod case_file;
pub mod error;
pub mod graph_utils;
pub mod solver;
pub mod units;

pub use case_file::{load_case_from_path, CaseDocument, CaseFileLoader, CaseLoader};
pub use error::{HeadroomError, HeadroomResult};
pub use solver::{
    BranchFlow, BusVoltage, PowerFlowResults, PowerFlowSolver, SolveOutcome, SolverOptions,
    SwingPower,
};
pub use units::{Kilovolts, Megavars, MegavoltAmperes, Megawatts, PerUnit};

/// Identifier assigned to temporary load and generator records created by a search.
pub const TEMP_ELEMENT_ID: &str = "Tm";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusId(usize);

impl BusId {
    #[inline]
    pub fn new(value: usize) -> Self {
        BusId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl fmt::Display for BusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bus type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusKind {
    #[default]
    Load,
    Generator,
    /// Reference bus absorbing the power imbalance.
    Swing,
}

fn default_in_service() -> bool {
    true
}

fn default_setpoint() -> PerUnit {
    PerUnit::ONE
}

fn default_circuit() -> String {
    "1".to_string()
}

fn default_ratio() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bus {
    pub id: BusId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: BusKind,
    #[serde(default)]
    pub base_kv: Kilovolts,
    /// Scheduled voltage; only meaningful at the swing bus.
    #[serde(default = "default_setpoint")]
    pub voltage_setpoint: PerUnit,
    #[serde(default = "default_in_service")]
    pub in_service: bool,
}

impl Bus {
    pub fn new(id: BusId) -> Self {
        Self {
            id,
            name: format!("Bus {}", id),
            kind: BusKind::Load,
            base_kv: Kilovolts(0.0),
            voltage_setpoint: PerUnit::ONE,
            in_service: true,
        }
    }

    pub fn with_kind(mut self, kind: BusKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_setpoint(mut self, setpoint: PerUnit) -> Self {
        self.voltage_setpoint = setpoint;
        self
    }

    pub fn is_swing(&self) -> bool {
        self.kind == BusKind::Swing
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Load {
    pub bus: BusId,
    #[serde(default = "default_circuit")]
    pub id: String,
    #[serde(rename = "p_mw")]
    pub active_power: Megawatts,
    #[serde(rename = "q_mvar", default)]
    pub reactive_power: Megavars,
    #[serde(default = "default_in_service")]
    pub in_service: bool,
}

impl Load {
    pub fn new(bus: BusId, active_power: Megawatts, reactive_power: Megavars) -> Self {
        Self {
            bus,
            id: default_circuit(),
            active_power,
            reactive_power,
            in_service: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gen {
    pub bus: BusId,
    #[serde(default = "default_circuit")]
    pub id: String,
    #[serde(rename = "p_mw")]
    pub active_power: Megawatts,
    #[serde(rename = "q_mvar", default)]
    pub reactive_power: Megavars,
    #[serde(default = "default_in_service")]
    pub in_service: bool,
}

impl Gen {
    pub fn new(bus: BusId, active_power: Megawatts, reactive_power: Megavars) -> Self {
        Self {
            bus,
            id: default_circuit(),
            active_power,
            reactive_power,
            in_service: true,
        }
    }
}

/// Named thermal-rating table used to turn a flow into a loading percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RateSelector {
    #[default]
    Rate1,
    Rate2,
    Rate3,
}

impl fmt::Display for RateSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RateSelector::Rate1 => "Rate1",
            RateSelector::Rate2 => "Rate2",
            RateSelector::Rate3 => "Rate3",
        };
        f.write_str(label)
    }
}

/// Thermal ratings of a branch or transformer. A missing or zero rating means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Ratings {
    #[serde(default)]
    pub rate1: Option<MegavoltAmperes>,
    #[serde(default)]
    pub rate2: Option<MegavoltAmperes>,
    #[serde(default)]
    pub rate3: Option<MegavoltAmperes>,
}

impl Ratings {
    pub fn uniform(rating: MegavoltAmperes) -> Self {
        Self {
            rate1: Some(rating),
            rate2: Some(rating),
            rate3: Some(rating),
        }
    }

    pub fn get(&self, selector: RateSelector) -> Option<MegavoltAmperes> {
        let rating = match selector {
            RateSelector::Rate1 => self.rate1,
            RateSelector::Rate2 => self.rate2,
            RateSelector::Rate3 => self.rate3,
        };
        rating.filter(|r| r.value() > 0.0)
    }
}

/// Identifies a series element by its terminals and circuit id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementRef {
    pub from_bus: BusId,
    pub to_bus: BusId,
    pub circuit: String,
}

impl ElementRef {
    /// Terminals match in either orientation; `circuit = None` matches any circuit.
    pub fn matches(&self, from_bus: BusId, to_bus: BusId, circuit: Option<&str>) -> bool {
        let terminals = (self.from_bus == from_bus && self.to_bus == to_bus)
            || (self.from_bus == to_bus && self.to_bus == from_bus);
        terminals && circuit.map_or(true, |c| c.trim() == self.circuit.trim())
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{} ckt {}", self.from_bus, self.to_bus, self.circuit)
    }
}

/// Series element class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Branch,
    Transformer,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeKind::Branch => f.write_str("branch"),
            EdgeKind::Transformer => f.write_str("transformer"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub from_bus: BusId,
    pub to_bus: BusId,
    #[serde(default = "default_circuit")]
    pub circuit: String,
    /// Series resistance (per-unit)
    #[serde(default)]
    pub resistance: f64,
    /// Series reactance (per-unit)
    pub reactance: f64,
    #[serde(default)]
    pub ratings: Ratings,
    #[serde(default = "default_in_service")]
    pub in_service: bool,
}

impl Branch {
    pub fn new(from_bus: BusId, to_bus: BusId, reactance: f64) -> Self {
        Self {
            from_bus,
            to_bus,
            circuit: default_circuit(),
            resistance: 0.0,
            reactance,
            ratings: Ratings::default(),
            in_service: true,
        }
    }

    pub fn with_circuit(mut self, circuit: impl Into<String>) -> Self {
        self.circuit = circuit.into();
        self
    }

    pub fn with_ratings(mut self, ratings: Ratings) -> Self {
        self.ratings = ratings;
        self
    }

    pub fn element_ref(&self) -> ElementRef {
        ElementRef {
            from_bus: self.from_bus,
            to_bus: self.to_bus,
            circuit: self.circuit.clone(),
        }
    }
}

/// Two-winding transformer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transformer {
    pub from_bus: BusId,
    pub to_bus: BusId,
    #[serde(default = "default_circuit")]
    pub circuit: String,
    /// Leakage reactance (per-unit on system base)
    pub reactance: f64,
    /// Off-nominal turns ratio
    #[serde(default = "default_ratio")]
    pub ratio: f64,
    #[serde(default)]
    pub ratings: Ratings,
    #[serde(default = "default_in_service")]
    pub in_service: bool,
}

impl Transformer {
    pub fn new(from_bus: BusId, to_bus: BusId, reactance: f64) -> Self {
        Self {
            from_bus,
            to_bus,
            circuit: default_circuit(),
            reactance,
            ratio: 1.0,
            ratings: Ratings::default(),
            in_service: true,
        }
    }

    pub fn with_ratings(mut self, ratings: Ratings) -> Self {
        self.ratings = ratings;
        self
    }

    pub fn element_ref(&self) -> ElementRef {
        ElementRef {
            from_bus: self.from_bus,
            to_bus: self.to_bus,
            circuit: self.circuit.clone(),
        }
    }
}

/// Dispatch and topology state captured by [`Case::snapshot`].
///
/// Records are only ever appended to a case during a search, so restoring
/// truncates the load/generator arenas back to their captured lengths and
/// rewrites the per-record fields a search may touch.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseSnapshot {
    loads: Vec<(Megawatts, Megavars, bool)>,
    gens: Vec<(Megawatts, Megavars, bool)>,
    branch_status: Vec<bool>,
    transformer_status: Vec<bool>,
}

/// A loaded network model.
#[derive(Debug, Clone)]
pub struct Case {
    name: String,
    base_mva: f64,
    buses: Vec<Bus>,
    loads: Vec<Load>,
    gens: Vec<Gen>,
    branches: Vec<Branch>,
    transformers: Vec<Transformer>,
    bus_index: HashMap<BusId, usize>,
}

impl Case {
    pub fn new(name: impl Into<String>, base_mva: f64) -> Self {
        Self {
            name: name.into(),
            base_mva,
            buses: Vec::new(),
            loads: Vec::new(),
            gens: Vec::new(),
            branches: Vec::new(),
            transformers: Vec::new(),
            bus_index: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// System MVA base used for per-unit conversion.
    pub fn base_mva(&self) -> f64 {
        self.base_mva
    }

    pub fn buses(&self) -> &[Bus] {
        &self.buses
    }

    pub fn loads(&self) -> &[Load] {
        &self.loads
    }

    pub fn gens(&self) -> &[Gen] {
        &self.gens
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn transformers(&self) -> &[Transformer] {
        &self.transformers
    }

    pub fn add_bus(&mut self, bus: Bus) -> HeadroomResult<usize> {
        if self.bus_index.contains_key(&bus.id) {
            return Err(HeadroomError::config(format!(
                "duplicate bus {} in case '{}'",
                bus.id, self.name
            )));
        }
        let idx = self.buses.len();
        self.bus_index.insert(bus.id, idx);
        self.buses.push(bus);
        Ok(idx)
    }

    pub fn add_load(&mut self, load: Load) -> HeadroomResult<usize> {
        self.require_bus(load.bus, "load")?;
        self.loads.push(load);
        Ok(self.loads.len() - 1)
    }

    pub fn add_gen(&mut self, gen: Gen) -> HeadroomResult<usize> {
        self.require_bus(gen.bus, "generator")?;
        self.gens.push(gen);
        Ok(self.gens.len() - 1)
    }

    pub fn add_branch(&mut self, branch: Branch) -> HeadroomResult<usize> {
        let context = format!("branch {}", branch.element_ref());
        self.require_bus(branch.from_bus, &context)?;
        self.require_bus(branch.to_bus, &context)?;
        self.branches.push(branch);
        Ok(self.branches.len() - 1)
    }

    pub fn add_transformer(&mut self, transformer: Transformer) -> HeadroomResult<usize> {
        let context = format!("transformer {}", transformer.element_ref());
        self.require_bus(transformer.from_bus, &context)?;
        self.require_bus(transformer.to_bus, &context)?;
        self.transformers.push(transformer);
        Ok(self.transformers.len() - 1)
    }

    pub fn contains_bus(&self, id: BusId) -> bool {
        self.bus_index.contains_key(&id)
    }

    /// Arena position of a bus.
    pub fn bus_position(&self, id: BusId) -> Option<usize> {
        self.bus_index.get(&id).copied()
    }

    pub fn bus(&self, id: BusId) -> Option<&Bus> {
        self.bus_position(id).map(|idx| &self.buses[idx])
    }

    /// Look up a bus, failing with [`HeadroomError::InvalidBusReference`].
    pub fn require_bus(&self, id: BusId, context: &str) -> HeadroomResult<&Bus> {
        self.bus(id).ok_or_else(|| HeadroomError::InvalidBusReference {
            bus: id,
            context: context.to_string(),
        })
    }

    /// The first in-service swing bus.
    pub fn swing_bus(&self) -> Option<&Bus> {
        self.buses.iter().find(|b| b.in_service && b.is_swing())
    }

    /// Total in-service load at a bus.
    pub fn bus_load(&self, id: BusId) -> (Megawatts, Megavars) {
        self.loads
            .iter()
            .filter(|l| l.in_service && l.bus == id)
            .fold((Megawatts::ZERO, Megavars::ZERO), |(p, q), l| {
                (p + l.active_power, q + l.reactive_power)
            })
    }

    /// Total in-service generation at a bus.
    pub fn bus_generation(&self, id: BusId) -> (Megawatts, Megavars) {
        self.gens
            .iter()
            .filter(|g| g.in_service && g.bus == id)
            .fold((Megawatts::ZERO, Megavars::ZERO), |(p, q), g| {
                (p + g.active_power, q + g.reactive_power)
            })
    }

    /// Positions of branches between two buses, optionally restricted to one circuit.
    pub fn find_branches(&self, from: BusId, to: BusId, circuit: Option<&str>) -> Vec<usize> {
        self.branches
            .iter()
            .enumerate()
            .filter(|(_, b)| b.element_ref().matches(from, to, circuit))
            .map(|(idx, _)| idx)
            .collect()
    }

    pub fn find_transformers(&self, from: BusId, to: BusId, circuit: Option<&str>) -> Vec<usize> {
        self.transformers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.element_ref().matches(from, to, circuit))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Set a branch status, returning the previous one.
    pub fn set_branch_in_service(&mut self, idx: usize, in_service: bool) -> bool {
        std::mem::replace(&mut self.branches[idx].in_service, in_service)
    }

    /// Set a transformer status, returning the previous one.
    pub fn set_transformer_in_service(&mut self, idx: usize, in_service: bool) -> bool {
        std::mem::replace(&mut self.transformers[idx].in_service, in_service)
    }

    pub fn set_edge_in_service(&mut self, kind: EdgeKind, idx: usize, in_service: bool) -> bool {
        match kind {
            EdgeKind::Branch => self.set_branch_in_service(idx, in_service),
            EdgeKind::Transformer => self.set_transformer_in_service(idx, in_service),
        }
    }

    pub fn snapshot(&self) -> CaseSnapshot {
        CaseSnapshot {
            loads: self
                .loads
                .iter()
                .map(|l| (l.active_power, l.reactive_power, l.in_service))
                .collect(),
            gens: self
                .gens
                .iter()
                .map(|g| (g.active_power, g.reactive_power, g.in_service))
                .collect(),
            branch_status: self.branches.iter().map(|b| b.in_service).collect(),
            transformer_status: self.transformers.iter().map(|t| t.in_service).collect(),
        }
    }

    /// Roll dispatch and topology back to a snapshot taken from this case.
    pub fn restore(&mut self, snapshot: &CaseSnapshot) {
        self.loads.truncate(snapshot.loads.len());
        for (load, &(p, q, status)) in self.loads.iter_mut().zip(&snapshot.loads) {
            load.active_power = p;
            load.reactive_power = q;
            load.in_service = status;
        }
        self.gens.truncate(snapshot.gens.len());
        for (gen, &(p, q, status)) in self.gens.iter_mut().zip(&snapshot.gens) {
            gen.active_power = p;
            gen.reactive_power = q;
            gen.in_service = status;
        }
        for (branch, &status) in self.branches.iter_mut().zip(&snapshot.branch_status) {
            branch.in_service = status;
        }
        for (trafo, &status) in self.transformers.iter_mut().zip(&snapshot.transformer_status) {
            trafo.in_service = status;
        }
    }

    pub fn stats(&self) -> CaseStats {
        CaseStats {
            num_buses: self.buses.len(),
            num_loads: self.loads.len(),
            num_gens: self.gens.len(),
            num_branches: self.branches.len(),
            num_transformers: self.transformers.len(),
            total_load_mw: self
                .loads
                .iter()
                .filter(|l| l.in_service)
                .map(|l| l.active_power.value())
                .sum(),
            total_gen_mw: self
                .gens
                .iter()
                .filter(|g| g.in_service)
                .map(|g| g.active_power.value())
                .sum(),
        }
    }

    /// Structural checks a solver relies on: a positive MVA base, at least one
    /// bus and exactly one in-service swing bus.
    pub fn validate(&self) -> HeadroomResult<()> {
        if !(self.base_mva.is_finite() && self.base_mva > 0.0) {
            return Err(HeadroomError::config(format!(
                "case '{}' has non-positive base MVA {}",
                self.name, self.base_mva
            )));
        }
        if self.buses.is_empty() {
            return Err(HeadroomError::config(format!(
                "case '{}' has no buses",
                self.name
            )));
        }
        let swings = self
            .buses
            .iter()
            .filter(|b| b.in_service && b.is_swing())
            .count();
        if swings != 1 {
            return Err(HeadroomError::config(format!(
                "case '{}' must have exactly one in-service swing bus, found {}",
                self.name, swings
            )));
        }
        Ok(())
    }

    /// Append a temporary load at an existing bus. Removed again by [`Case::restore`].
    pub fn push_temporary_load(
        &mut self,
        bus: BusId,
        active_power: Megawatts,
        reactive_power: Megavars,
    ) -> HeadroomResult<()> {
        self.require_bus(bus, "dispatch adjustment")?;
        self.loads.push(Load {
            bus,
            id: TEMP_ELEMENT_ID.to_string(),
            active_power,
            reactive_power,
            in_service: true,
        });
        Ok(())
    }

    /// Append a temporary generator at an existing bus.
    pub fn push_temporary_gen(
        &mut self,
        bus: BusId,
        active_power: Megawatts,
        reactive_power: Megavars,
    ) -> HeadroomResult<()> {
        self.require_bus(bus, "dispatch adjustment")?;
        self.gens.push(Gen {
            bus,
            id: TEMP_ELEMENT_ID.to_string(),
            active_power,
            reactive_power,
            in_service: true,
        });
        Ok(())
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CaseStats {
    pub num_buses: usize,
    pub num_loads: usize,
    pub num_gens: usize,
    pub num_branches: usize,
    pub num_transformers: usize,
    pub total_load_mw: f64,
    pub total_gen_mw: f64,
}

impl fmt::Display for CaseStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} buses, {} branches, {} transformers, {} loads ({:.1} MW), {} generators ({:.1} MW)",
            self.num_buses,
            self.num_branches,
            self.num_transformers,
            self.num_loads,
            self.total_load_mw,
            self.num_gens,
            self.total_gen_mw
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_bus() -> Case {
        let mut case = Case::new("three", 100.0);
        case.add_bus(Bus::new(BusId::new(1)).with_kind(BusKind::Swing))
            .unwrap();
        case.add_bus(Bus::new(BusId::new(2))).unwrap();
        case.add_bus(Bus::new(BusId::new(3))).unwrap();
        case.add_branch(Branch::new(BusId::new(1), BusId::new(2), 0.1))
            .unwrap();
        case.add_branch(Branch::new(BusId::new(1), BusId::new(2), 0.1).with_circuit("2"))
            .unwrap();
        case.add_transformer(Transformer::new(BusId::new(2), BusId::new(3), 0.05))
            .unwrap();
        case.add_load(Load::new(BusId::new(3), Megawatts(20.0), Megavars(5.0)))
            .unwrap();
        case
    }

    #[test]
    fn rejects_records_on_unknown_buses() {
        let mut case = three_bus();
        let err = case
            .add_load(Load::new(BusId::new(9), Megawatts(1.0), Megavars(0.0)))
            .unwrap_err();
        assert!(matches!(
            err,
            HeadroomError::InvalidBusReference { bus, .. } if bus == BusId::new(9)
        ));
        assert!(case
            .add_branch(Branch::new(BusId::new(1), BusId::new(7), 0.1))
            .is_err());
    }

    #[test]
    fn rejects_duplicate_bus() {
        let mut case = three_bus();
        assert!(case.add_bus(Bus::new(BusId::new(2))).is_err());
    }

    #[test]
    fn finds_parallel_circuits_in_either_orientation() {
        let case = three_bus();
        assert_eq!(case.find_branches(BusId::new(2), BusId::new(1), None), vec![0, 1]);
        assert_eq!(
            case.find_branches(BusId::new(1), BusId::new(2), Some("2")),
            vec![1]
        );
        assert!(case
            .find_branches(BusId::new(1), BusId::new(3), None)
            .is_empty());
        assert_eq!(
            case.find_transformers(BusId::new(3), BusId::new(2), None),
            vec![0]
        );
    }

    #[test]
    fn restore_removes_temporary_records_and_outages() {
        let mut case = three_bus();
        let base = case.snapshot();

        case.push_temporary_load(BusId::new(2), Megawatts(10.0), Megavars(4.0))
            .unwrap();
        case.push_temporary_gen(BusId::new(2), Megawatts(10.0), Megavars(4.0))
            .unwrap();
        case.set_branch_in_service(0, false);
        case.set_transformer_in_service(0, false);
        assert_eq!(case.loads().len(), 2);
        assert_ne!(case.snapshot(), base);

        case.restore(&base);
        assert_eq!(case.loads().len(), 1);
        assert!(case.gens().is_empty());
        assert!(case.branches()[0].in_service);
        assert!(case.transformers()[0].in_service);
        assert_eq!(case.snapshot(), base);
    }

    #[test]
    fn bus_totals_skip_out_of_service_records() {
        let mut case = three_bus();
        case.add_load(Load {
            in_service: false,
            ..Load::new(BusId::new(3), Megawatts(50.0), Megavars(0.0))
        })
        .unwrap();
        let (p, q) = case.bus_load(BusId::new(3));
        assert_eq!(p, Megawatts(20.0));
        assert_eq!(q, Megavars(5.0));
        assert_eq!(case.bus_generation(BusId::new(3)).0, Megawatts::ZERO);
    }

    #[test]
    fn validate_requires_single_swing_bus() {
        let case = three_bus();
        assert!(case.validate().is_ok());

        let mut no_swing = Case::new("none", 100.0);
        no_swing.add_bus(Bus::new(BusId::new(1))).unwrap();
        assert!(no_swing.validate().is_err());

        let empty = Case::new("empty", 100.0);
        assert!(empty.validate().is_err());
    }

    #[test]
    fn zero_rating_is_unlimited() {
        let ratings = Ratings {
            rate1: Some(MegavoltAmperes(0.0)),
            rate2: Some(MegavoltAmperes(150.0)),
            rate3: None,
        };
        assert_eq!(ratings.get(RateSelector::Rate1), None);
        assert_eq!(ratings.get(RateSelector::Rate2), Some(MegavoltAmperes(150.0)));
        assert_eq!(ratings.get(RateSelector::Rate3), None);
    }

    #[test]
    fn stats_summarise_case() {
        let stats = three_bus().stats();
        assert_eq!(stats.num_buses, 3);
        assert_eq!(stats.num_branches, 2);
        assert_eq!(stats.num_transformers, 1);
        assert!(stats.to_string().contains("20.0 MW"));
    }
}
