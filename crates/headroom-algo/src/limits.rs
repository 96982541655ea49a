//! Limit evaluation over converged power-flow results.
//!
//! Checks run in a fixed order so the first record of a sequence is stable
//! across runs: bus voltage, branch loading, transformer loading, swing-bus
//! apparent power. [`evaluate`] is lazy; the search only ever pulls the first
//! record, while reporting code can drain or clone the sequence.

use headroom_core::{
    BranchFlow, BusId, BusVoltage, ElementRef, HeadroomError, HeadroomResult, PowerFlowResults,
    RateSelector, SwingPower,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Voltage and thermal limits applied to one class of solve (normal or post-contingency).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitProfile {
    pub max_bus_voltage_pu: f64,
    pub min_bus_voltage_pu: f64,
    pub max_branch_loading_pct: f64,
    pub max_trafo_loading_pct: f64,
    #[serde(alias = "max_swing_bus_power_mw")]
    pub max_swing_bus_power_mva: f64,
    #[serde(default)]
    pub branch_rate_selector: RateSelector,
    #[serde(default)]
    pub trafo_rate_selector: RateSelector,
}

impl LimitProfile {
    /// Intact-network limits.
    pub fn normal() -> Self {
        Self {
            max_bus_voltage_pu: 1.1,
            min_bus_voltage_pu: 0.9,
            max_branch_loading_pct: 100.0,
            max_trafo_loading_pct: 100.0,
            max_swing_bus_power_mva: 1000.0,
            branch_rate_selector: RateSelector::Rate1,
            trafo_rate_selector: RateSelector::Rate1,
        }
    }

    /// Post-outage limits; wider than [`LimitProfile::normal`].
    pub fn contingency() -> Self {
        Self {
            max_bus_voltage_pu: 1.12,
            min_bus_voltage_pu: 0.88,
            max_branch_loading_pct: 120.0,
            max_trafo_loading_pct: 120.0,
            max_swing_bus_power_mva: 1000.0,
            branch_rate_selector: RateSelector::Rate1,
            trafo_rate_selector: RateSelector::Rate1,
        }
    }

    pub fn validate(&self, label: &str) -> HeadroomResult<()> {
        let values = [
            ("max_bus_voltage_pu", self.max_bus_voltage_pu),
            ("min_bus_voltage_pu", self.min_bus_voltage_pu),
            ("max_branch_loading_pct", self.max_branch_loading_pct),
            ("max_trafo_loading_pct", self.max_trafo_loading_pct),
            ("max_swing_bus_power_mva", self.max_swing_bus_power_mva),
        ];
        for (field, value) in values {
            if !value.is_finite() || value < 0.0 {
                return Err(HeadroomError::config(format!(
                    "{label}.{field} must be a finite non-negative number, got {value}"
                )));
            }
        }
        if self.min_bus_voltage_pu >= self.max_bus_voltage_pu {
            return Err(HeadroomError::config(format!(
                "{label}: min_bus_voltage_pu ({}) must be below max_bus_voltage_pu ({})",
                self.min_bus_voltage_pu, self.max_bus_voltage_pu
            )));
        }
        for (field, value) in [
            ("max_branch_loading_pct", self.max_branch_loading_pct),
            ("max_trafo_loading_pct", self.max_trafo_loading_pct),
            ("max_swing_bus_power_mva", self.max_swing_bus_power_mva),
        ] {
            if value == 0.0 {
                return Err(HeadroomError::config(format!(
                    "{label}.{field} must be positive"
                )));
            }
        }
        Ok(())
    }

    /// True when every post-outage bound is at least as permissive as `normal`.
    pub fn is_wider_than(&self, normal: &LimitProfile) -> bool {
        self.max_bus_voltage_pu >= normal.max_bus_voltage_pu
            && self.min_bus_voltage_pu <= normal.min_bus_voltage_pu
            && self.max_branch_loading_pct >= normal.max_branch_loading_pct
            && self.max_trafo_loading_pct >= normal.max_trafo_loading_pct
            && self.max_swing_bus_power_mva >= normal.max_swing_bus_power_mva
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    BusOvervoltage,
    BusUndervoltage,
    BranchLoading,
    TrafoLoading,
    SwingBusLoading,
    /// The solve itself failed; no limit could be checked.
    NotConverged,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ViolationKind::BusOvervoltage => "bus overvoltage",
            ViolationKind::BusUndervoltage => "bus undervoltage",
            ViolationKind::BranchLoading => "branch loading",
            ViolationKind::TrafoLoading => "transformer loading",
            ViolationKind::SwingBusLoading => "swing bus loading",
            ViolationKind::NotConverged => "not converged",
        };
        f.write_str(label)
    }
}

/// The network element a violation is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ElementId {
    Bus { bus: BusId },
    Branch(ElementRef),
    Transformer(ElementRef),
    /// Case-wide; used for solver failures.
    Case,
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementId::Bus { bus } => write!(f, "bus {bus}"),
            ElementId::Branch(element) => write!(f, "branch {element}"),
            ElementId::Transformer(element) => write!(f, "transformer {element}"),
            ElementId::Case => f.write_str("case"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationRecord {
    pub kind: ViolationKind,
    pub element_id: ElementId,
    pub observed_value: f64,
    pub limit_value: f64,
    /// Contingency index; `None` for the intact network.
    pub scenario: Option<usize>,
}

impl ViolationRecord {
    pub fn not_converged() -> Self {
        Self {
            kind: ViolationKind::NotConverged,
            element_id: ElementId::Case,
            observed_value: 0.0,
            limit_value: 0.0,
            scenario: None,
        }
    }

    pub fn with_scenario(mut self, scenario: usize) -> Self {
        self.scenario = Some(scenario);
        self
    }
}

impl fmt::Display for ViolationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind == ViolationKind::NotConverged {
            write!(f, "power flow not converged")?;
        } else {
            write!(
                f,
                "{} at {}: {:.3} vs limit {:.3}",
                self.kind, self.element_id, self.observed_value, self.limit_value
            )?;
        }
        match self.scenario {
            Some(idx) => write!(f, " (contingency #{idx})"),
            None => write!(f, " (intact network)"),
        }
    }
}

fn voltage_violation(v: &BusVoltage, profile: &LimitProfile) -> Option<ViolationRecord> {
    let observed = v.voltage.value();
    let (kind, limit) = if observed > profile.max_bus_voltage_pu {
        (ViolationKind::BusOvervoltage, profile.max_bus_voltage_pu)
    } else if observed < profile.min_bus_voltage_pu {
        (ViolationKind::BusUndervoltage, profile.min_bus_voltage_pu)
    } else {
        return None;
    };
    Some(ViolationRecord {
        kind,
        element_id: ElementId::Bus { bus: v.bus },
        observed_value: observed,
        limit_value: limit,
        scenario: None,
    })
}

fn loading_violation(
    flow: &BranchFlow,
    selector: RateSelector,
    max_pct: f64,
    kind: ViolationKind,
) -> Option<ViolationRecord> {
    let loading = flow.loading_pct(selector)?;
    (loading > max_pct).then(|| ViolationRecord {
        kind,
        element_id: match kind {
            ViolationKind::TrafoLoading => ElementId::Transformer(flow.element.clone()),
            _ => ElementId::Branch(flow.element.clone()),
        },
        observed_value: loading,
        limit_value: max_pct,
        scenario: None,
    })
}

fn swing_violation(swing: &SwingPower, profile: &LimitProfile) -> Option<ViolationRecord> {
    let apparent = swing.apparent_power().value();
    (apparent > profile.max_swing_bus_power_mva).then(|| ViolationRecord {
        kind: ViolationKind::SwingBusLoading,
        element_id: ElementId::Bus { bus: swing.bus },
        observed_value: apparent,
        limit_value: profile.max_swing_bus_power_mva,
        scenario: None,
    })
}

/// Every limit violation in `results`, lazily, in check order.
///
/// The returned iterator is `Clone`, so a caller can restart the sequence
/// without re-reading the results. An empty sequence means the solve is
/// within limits.
pub fn evaluate<'a>(
    results: &'a PowerFlowResults,
    profile: &'a LimitProfile,
) -> impl Iterator<Item = ViolationRecord> + Clone + 'a {
    let voltages = results
        .bus_voltages
        .iter()
        .filter(|v| v.in_service)
        .filter_map(move |v| voltage_violation(v, profile));
    let branches = results.branch_flows.iter().filter_map(move |flow| {
        loading_violation(
            flow,
            profile.branch_rate_selector,
            profile.max_branch_loading_pct,
            ViolationKind::BranchLoading,
        )
    });
    let trafos = results.trafo_flows.iter().filter_map(move |flow| {
        loading_violation(
            flow,
            profile.trafo_rate_selector,
            profile.max_trafo_loading_pct,
            ViolationKind::TrafoLoading,
        )
    });
    let swings = results
        .swing_power
        .iter()
        .filter_map(move |swing| swing_violation(swing, profile));
    voltages.chain(branches).chain(trafos).chain(swings)
}

/// The record that decides feasibility, if any.
pub fn first_violation(results: &PowerFlowResults, profile: &LimitProfile) -> Option<ViolationRecord> {
    evaluate(results, profile).next()
}

/// Violation counts per kind, for log lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViolationSummary {
    pub counts: BTreeMap<ViolationKind, usize>,
}

impl ViolationSummary {
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

impl fmt::Display for ViolationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.counts.is_empty() {
            return f.write_str("no violations");
        }
        let parts: Vec<String> = self
            .counts
            .iter()
            .map(|(kind, count)| format!("{count} {kind}"))
            .collect();
        f.write_str(&parts.join(", "))
    }
}

pub fn summarize(violations: impl IntoIterator<Item = ViolationRecord>) -> ViolationSummary {
    let mut summary = ViolationSummary::default();
    for record in violations {
        *summary.counts.entry(record.kind).or_insert(0) += 1;
    }
    summary
}
