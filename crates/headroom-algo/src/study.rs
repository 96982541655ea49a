//! Study documents (JSON or YAML).
//!
//! ```yaml
//! case_name: ring5
//! upper_load_limit_p_mw: 100
//! upper_gen_limit_p_mw: 100
//! selected_buses_ids: [3]
//! contingency_scenario:
//!   branches:
//!     - {from_bus: 2, to_bus: 3, circuit: "1"}
//! ```
//!
//! Everything except the case name and the two caps has a default.

use crate::contingency::ContingencyScenario;
use crate::dispatch::{BusSelection, Injection, PowerFactorPair};
use crate::limits::LimitProfile;
use crate::search::{default_solver_opts, HeadroomStudy, SearchConfig};
use headroom_core::case_file::parse_document;
use headroom_core::{BusId, Case, HeadroomResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

fn default_power_factor() -> f64 {
    0.9
}

fn default_tolerance() -> f64 {
    5.0
}

fn default_max_iterations() -> usize {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StudyDocument {
    pub case_name: String,
    pub upper_load_limit_p_mw: f64,
    pub upper_gen_limit_p_mw: f64,
    #[serde(default = "default_power_factor")]
    pub load_power_factor: f64,
    #[serde(default = "default_power_factor")]
    pub gen_power_factor: f64,
    /// Absent means every in-service bus of the case.
    #[serde(default)]
    pub selected_buses_ids: Option<Vec<BusId>>,
    #[serde(default = "default_tolerance", alias = "solver_tolerance_p_mw")]
    pub headroom_tolerance_p_mw: f64,
    #[serde(default = "default_solver_opts")]
    pub solver_opts: BTreeMap<String, Value>,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "LimitProfile::normal")]
    pub normal_limits: LimitProfile,
    #[serde(default = "LimitProfile::contingency")]
    pub contingency_limits: LimitProfile,
    #[serde(default)]
    pub contingency_scenario: ContingencyScenario,
    #[serde(default)]
    pub use_full_newton_raphson: Option<bool>,
    #[serde(default)]
    pub injection: Injection,
}

impl StudyDocument {
    pub fn search_config(&self) -> SearchConfig {
        SearchConfig {
            upper_load_limit_p_mw: self.upper_load_limit_p_mw,
            upper_gen_limit_p_mw: self.upper_gen_limit_p_mw,
            headroom_tolerance_p_mw: self.headroom_tolerance_p_mw,
            max_iterations: self.max_iterations,
            solver_opts: self.solver_opts.clone(),
        }
    }

    /// Build the study for `case`. References are not checked here; see
    /// [`HeadroomStudy::validate_against`].
    pub fn into_study(self, case: &Case) -> HeadroomResult<HeadroomStudy> {
        let selection = match &self.selected_buses_ids {
            Some(ids) => BusSelection::new(ids.clone())?,
            None => BusSelection::all_in_service(case)?,
        };
        Ok(HeadroomStudy {
            config: self.search_config(),
            selection,
            power_factors: PowerFactorPair {
                load_pf: self.load_power_factor,
                gen_pf: self.gen_power_factor,
            },
            normal_limits: self.normal_limits,
            contingency_limits: self.contingency_limits,
            scenario: self.contingency_scenario,
            use_full_newton_raphson: self.use_full_newton_raphson,
            injection: self.injection,
        })
    }
}

/// Read a study document, choosing the format from the file extension.
pub fn load_study_from_path(path: &Path) -> HeadroomResult<StudyDocument> {
    parse_document(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ring_case;
    use headroom_core::{HeadroomError, RateSelector};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn minimal_document_gets_defaults() {
        let doc: StudyDocument = serde_json::from_str(
            r#"{"case_name": "ring5", "upper_load_limit_p_mw": 50, "upper_gen_limit_p_mw": 40}"#,
        )
        .unwrap();
        assert_eq!(doc.load_power_factor, 0.9);
        assert_eq!(doc.headroom_tolerance_p_mw, 5.0);
        assert_eq!(doc.max_iterations, 10);
        assert_eq!(doc.solver_opts["options5"], Value::from(1));
        assert_eq!(doc.normal_limits, LimitProfile::normal());
        assert_eq!(doc.contingency_limits.max_branch_loading_pct, 120.0);
        assert!(doc.contingency_scenario.is_empty());
        assert_eq!(doc.injection, Injection::LoadAndGeneration);

        let case = ring_case();
        let study = doc.into_study(&case).unwrap();
        assert_eq!(study.selection.len(), case.buses().len());
        assert_eq!(study.use_full_newton_raphson, None);
    }

    #[test]
    fn yaml_document_with_scenario() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("study.yaml");
        fs::write(
            &path,
            r#"
case_name: ring5
upper_load_limit_p_mw: 80
upper_gen_limit_p_mw: 80
solver_tolerance_p_mw: 2.5
selected_buses_ids: [3, 5]
use_full_newton_raphson: true
injection: load_only
normal_limits:
  max_bus_voltage_pu: 1.05
  min_bus_voltage_pu: 0.95
  max_branch_loading_pct: 90
  max_trafo_loading_pct: 90
  max_swing_bus_power_mva: 500
  trafo_rate_selector: Rate2
contingency_scenario:
  branches:
    - {from_bus: 2, to_bus: 3}
  trafos:
    - {from_bus: 4, to_bus: 5, circuit: "1"}
"#,
        )
        .unwrap();

        let doc = load_study_from_path(&path).unwrap();
        assert_eq!(doc.headroom_tolerance_p_mw, 2.5);
        assert_eq!(doc.normal_limits.trafo_rate_selector, RateSelector::Rate2);
        let case = ring_case();
        let study = doc.into_study(&case).unwrap();
        assert_eq!(study.selection.ids(), &[BusId::new(3), BusId::new(5)]);
        assert_eq!(study.scenario.len(), 2);
        assert_eq!(study.injection, Injection::LoadOnly);
        assert_eq!(study.use_full_newton_raphson, Some(true));
        assert!(study.validate_against(&case).is_ok());
    }

    #[test]
    fn unknown_field_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("study.json");
        fs::write(
            &path,
            r#"{"case_name": "x", "upper_load_limit_p_mw": 1, "upper_gen_limit_p_mw": 1, "bogus": 1}"#,
        )
        .unwrap();
        assert!(matches!(
            load_study_from_path(&path).unwrap_err(),
            HeadroomError::Parse(_)
        ));
    }

    #[test]
    fn empty_selection_is_rejected() {
        let doc: StudyDocument = serde_json::from_str(
            r#"{"case_name": "ring5", "upper_load_limit_p_mw": 1, "upper_gen_limit_p_mw": 1, "selected_buses_ids": []}"#,
        )
        .unwrap();
        assert!(matches!(
            doc.into_study(&ring_case()),
            Err(HeadroomError::ConfigValidation(_))
        ));
    }
}
