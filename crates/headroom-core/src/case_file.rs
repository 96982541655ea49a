//! Case documents and the case-loading boundary.
//!
//! The search only needs `load(case_name) -> Case`. [`CaseFileLoader`] serves
//! that from JSON or YAML documents on disk; other front ends can implement
//! [`CaseLoader`] over whatever model store they use.

use crate::{Branch, Bus, Case, Gen, HeadroomError, HeadroomResult, Load, Transformer};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Loads a case by name.
pub trait CaseLoader {
    fn load(&self, case_name: &str) -> HeadroomResult<Case>;
}

fn default_base_mva() -> f64 {
    100.0
}

/// On-disk representation of a [`Case`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaseDocument {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_base_mva")]
    pub base_mva: f64,
    pub buses: Vec<Bus>,
    #[serde(default)]
    pub loads: Vec<Load>,
    #[serde(default)]
    pub gens: Vec<Gen>,
    #[serde(default)]
    pub branches: Vec<Branch>,
    #[serde(default)]
    pub transformers: Vec<Transformer>,
}

impl CaseDocument {
    /// Build and validate the case. `fallback_name` is used when the document has no name.
    pub fn into_case(self, fallback_name: &str) -> HeadroomResult<Case> {
        let name = self.name.unwrap_or_else(|| fallback_name.to_string());
        let mut case = Case::new(name, self.base_mva);
        for bus in self.buses {
            case.add_bus(bus)?;
        }
        for load in self.loads {
            case.add_load(load)?;
        }
        for gen in self.gens {
            case.add_gen(gen)?;
        }
        for branch in self.branches {
            case.add_branch(branch)?;
        }
        for transformer in self.transformers {
            case.add_transformer(transformer)?;
        }
        case.validate()?;
        Ok(case)
    }
}

fn is_yaml(path: &Path) -> Option<bool> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            Some(true)
        }
        Some(ext) if ext.eq_ignore_ascii_case("json") => Some(false),
        _ => None,
    }
}

/// Parse a JSON or YAML document, picking the format from the extension and
/// trying YAML then JSON when the extension is unknown.
pub fn parse_document<T: serde::de::DeserializeOwned>(path: &Path) -> HeadroomResult<T> {
    let data = fs::read_to_string(path)?;
    let parsed = match is_yaml(path) {
        Some(true) => serde_yaml::from_str(&data).map_err(|err| err.to_string()),
        Some(false) => serde_json::from_str(&data).map_err(|err| err.to_string()),
        None => serde_yaml::from_str(&data)
            .or_else(|_| serde_json::from_str(&data))
            .map_err(|err| err.to_string()),
    };
    parsed.map_err(|err| HeadroomError::Parse(format!("{}: {}", path.display(), err)))
}

/// Read a case document from a file.
pub fn load_case_from_path(path: &Path) -> HeadroomResult<Case> {
    let document: CaseDocument = parse_document(path)?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("case")
        .to_string();
    document.into_case(&stem)
}

/// Resolves case names against a directory of case documents.
///
/// A name is tried verbatim first, then with `.json`, `.yaml` and `.yml`
/// appended.
#[derive(Debug, Clone)]
pub struct CaseFileLoader {
    root: PathBuf,
}

impl CaseFileLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn resolve(&self, case_name: &str) -> Option<PathBuf> {
        let direct = self.root.join(case_name);
        if direct.is_file() {
            return Some(direct);
        }
        ["json", "yaml", "yml"]
            .iter()
            .map(|ext| self.root.join(format!("{case_name}.{ext}")))
            .find(|candidate| candidate.is_file())
    }
}

impl CaseLoader for CaseFileLoader {
    fn load(&self, case_name: &str) -> HeadroomResult<Case> {
        let path = self.resolve(case_name).ok_or_else(|| {
            HeadroomError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!(
                    "case '{}' not found under '{}'",
                    case_name,
                    self.root.display()
                ),
            ))
        })?;
        load_case_from_path(&path)
    }
}
