//! Contingency scenarios: ordered N-1 outages plus labelled N-k groups.
//!
//! A [`ContingencyScenario`] is flattened into indexed [`Contingency`] values
//! in a fixed order (branches, then transformers, then groups). The index is
//! what violation records carry in their `scenario` field.

pub mod apply;

pub use apply::{apply_contingency, OutageGuard};

use headroom_core::{BusId, Case, EdgeKind, HeadroomError, HeadroomResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Branch (line) outage. Without a circuit id every parallel circuit between
/// the two buses goes out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchOutage {
    #[serde(alias = "from_number")]
    pub from_bus: BusId,
    #[serde(alias = "to_number")]
    pub to_bus: BusId,
    #[serde(default, alias = "branch_id", skip_serializing_if = "Option::is_none")]
    pub circuit: Option<String>,
}

/// Two-winding transformer outage; same matching rules as [`BranchOutage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafoOutage {
    #[serde(alias = "from_number")]
    pub from_bus: BusId,
    #[serde(alias = "to_number")]
    pub to_bus: BusId,
    #[serde(default, alias = "trafo_id", skip_serializing_if = "Option::is_none")]
    pub circuit: Option<String>,
}

impl BranchOutage {
    pub fn new(from_bus: BusId, to_bus: BusId) -> Self {
        Self {
            from_bus,
            to_bus,
            circuit: None,
        }
    }

    pub fn with_circuit(mut self, circuit: impl Into<String>) -> Self {
        self.circuit = Some(circuit.into());
        self
    }
}

impl TrafoOutage {
    pub fn new(from_bus: BusId, to_bus: BusId) -> Self {
        Self {
            from_bus,
            to_bus,
            circuit: None,
        }
    }

    pub fn with_circuit(mut self, circuit: impl Into<String>) -> Self {
        self.circuit = Some(circuit.into());
        self
    }
}

/// One element taken out of service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outage {
    Branch(BranchOutage),
    Trafo(TrafoOutage),
}

impl Outage {
    pub fn kind(&self) -> EdgeKind {
        match self {
            Outage::Branch(_) => EdgeKind::Branch,
            Outage::Trafo(_) => EdgeKind::Transformer,
        }
    }

    fn terminals(&self) -> (BusId, BusId, Option<&str>) {
        match self {
            Outage::Branch(b) => (b.from_bus, b.to_bus, b.circuit.as_deref()),
            Outage::Trafo(t) => (t.from_bus, t.to_bus, t.circuit.as_deref()),
        }
    }

    /// Arena positions of the matching elements; empty when nothing matches.
    pub fn locate(&self, case: &Case) -> Vec<usize> {
        let (from, to, circuit) = self.terminals();
        match self.kind() {
            EdgeKind::Branch => case.find_branches(from, to, circuit),
            EdgeKind::Transformer => case.find_transformers(from, to, circuit),
        }
    }

    pub fn describe(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Outage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (from, to, circuit) = self.terminals();
        write!(f, "{} {}-{}", self.kind(), from, to)?;
        match circuit {
            Some(c) => write!(f, " ckt {}", c.trim()),
            None => write!(f, " (all circuits)"),
        }
    }
}

impl From<BranchOutage> for Outage {
    fn from(outage: BranchOutage) -> Self {
        Outage::Branch(outage)
    }
}

impl From<TrafoOutage> for Outage {
    fn from(outage: TrafoOutage) -> Self {
        Outage::Trafo(outage)
    }
}

/// Elements taken out together as one N-k contingency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutageGroup {
    #[serde(default)]
    pub label: Option<String>,
    pub outages: Vec<Outage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContingencyScenario {
    #[serde(default)]
    pub branches: Vec<BranchOutage>,
    #[serde(default)]
    pub trafos: Vec<TrafoOutage>,
    #[serde(default)]
    pub groups: Vec<OutageGroup>,
}

/// A single indexed contingency ready to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contingency {
    pub index: usize,
    pub label: String,
    pub outages: Vec<Outage>,
}

impl Contingency {
    /// Contingency order (k in N-k).
    pub fn order(&self) -> usize {
        self.outages.len()
    }
}

impl ContingencyScenario {
    pub fn len(&self) -> usize {
        self.branches.len() + self.trafos.len() + self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All contingencies with their scenario indices.
    pub fn contingencies(&self) -> Vec<Contingency> {
        let singles = self
            .branches
            .iter()
            .cloned()
            .map(Outage::from)
            .chain(self.trafos.iter().cloned().map(Outage::from))
            .map(|outage| (outage.describe(), vec![outage]));
        let groups = self.groups.iter().enumerate().map(|(n, group)| {
            let label = group
                .label
                .clone()
                .unwrap_or_else(|| format!("group {}", n + 1));
            (label, group.outages.clone())
        });
        singles
            .chain(groups)
            .enumerate()
            .map(|(index, (label, outages))| Contingency {
                index,
                label,
                outages,
            })
            .collect()
    }

    /// Every outage must name an element that exists; groups must not be empty.
    pub fn validate_against(&self, case: &Case) -> HeadroomResult<()> {
        for contingency in self.contingencies() {
            if contingency.outages.is_empty() {
                return Err(HeadroomError::config(format!(
                    "contingency #{} ({}) has no outages",
                    contingency.index, contingency.label
                )));
            }
            for outage in &contingency.outages {
                if outage.locate(case).is_empty() {
                    return Err(HeadroomError::InvalidTopologyReference {
                        scenario: contingency.index,
                        element: outage.describe(),
                    });
                }
            }
        }
        Ok(())
    }
}
