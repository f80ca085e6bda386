//! Spec store - loads spec definition files into memory

use crate::error::{Error, Result};
use crate::types::Spec;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File extension of spec definition files
pub const SPEC_EXTENSION: &str = "spec";

/// In-memory map from spec name to spec record
///
/// Built once and read-only afterwards. Names are kept sorted so listings
/// are stable.
#[derive(Debug, Clone, Default)]
pub struct SpecStore {
    specs: BTreeMap<String, Spec>,
}

impl SpecStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from already constructed specs
    pub fn from_specs(specs: impl IntoIterator<Item = Spec>) -> Self {
        let mut store = Self::new();
        for spec in specs {
            store.insert(spec);
        }
        store
    }

    /// Load every `*.spec` file found under the given directories
    ///
    /// Directories that don't exist are skipped. When two files declare the
    /// same name, the one found later wins.
    pub fn load(dirs: &[PathBuf]) -> Result<Self> {
        let mut store = Self::new();

        for dir in dirs {
            if !dir.is_dir() {
                log::debug!("Spec directory not found, skipping: {}", dir.display());
                continue;
            }

            for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
                let entry = entry.map_err(|source| Error::Walk {
                    path: dir.clone(),
                    source,
                })?;

                if entry.file_type().is_file()
                    && is_spec_file(entry.path())
                    && let Some(spec) = load_spec_file(entry.path())?
                {
                    store.insert(spec);
                }
            }
        }

        log::debug!("Loaded {} specs", store.len());
        Ok(store)
    }

    /// Add a spec, replacing any spec with the same name
    pub fn insert(&mut self, spec: Spec) {
        if let Some(previous) = self.specs.get(&spec.name) {
            log::warn!(
                "Spec '{}' from {} overrides {}",
                spec.name,
                spec.definition_path.display(),
                previous.definition_path.display()
            );
        }
        self.specs.insert(spec.name.clone(), spec);
    }

    /// Look up a spec by name
    pub fn get_spec(&self, name: &str) -> Option<&Spec> {
        self.specs.get(name)
    }

    /// Check if a spec exists
    pub fn spec_exists(&self, name: &str) -> bool {
        self.specs.contains_key(name)
    }

    /// All spec names, sorted
    pub fn spec_names(&self) -> impl Iterator<Item = &str> {
        self.specs.keys().map(String::as_str)
    }

    /// Iterate over all specs, sorted by name
    pub fn iter(&self) -> impl Iterator<Item = &Spec> {
        self.specs.values()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

fn is_spec_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(SPEC_EXTENSION))
}

/// Parse a single definition file
///
/// Returns `None` for files that don't declare a name.
pub fn load_spec_file(path: &Path) -> Result<Option<Spec>> {
    let content = fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let mut spec: Spec = toml::from_str(&content).map_err(|source| Error::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    if spec.name.trim().is_empty() {
        log::debug!("Ignoring spec file without a name: {}", path.display());
        return Ok(None);
    }

    spec.definition_path = path.to_path_buf();
    spec.definition_root = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    Ok(Some(spec))
}
