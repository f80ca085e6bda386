//! Requirement graph resolution
//!
//! Walks a spec's `requires` edges depth-first and flattens packages,
//! commands and file transfers into ordered lists. Each artifact has its own
//! merge order:
//!
//! | Artifact       | Order                                              |
//! |----------------|----------------------------------------------------|
//! | packages       | own, then each requirement in `requires` order     |
//! | pre-commands   | each requirement in `requires` order, then own     |
//! | post-commands  | own, then each requirement in `requires` order     |
//! | file transfers | own configs, own content, then each requirement    |
//!
//! Nothing is deduplicated: a spec reached twice (diamond or repeated edge)
//! contributes twice. Requirements that aren't in the store contribute
//! nothing. A requirement that loops back onto the current path is an
//! [`Error::Cycle`].

use crate::error::{Error, Result};
use crate::store::SpecStore;
use crate::types::{FileTransfer, ResolvedManifest, Spec};
use std::path::Path;
use walkdir::WalkDir;

/// Resolves specs against a store
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    store: &'a SpecStore,
}

impl<'a> Resolver<'a> {
    pub fn new(store: &'a SpecStore) -> Self {
        Self { store }
    }

    /// Resolve all four artifacts for a spec
    pub fn resolve(&self, name: &str) -> Result<ResolvedManifest> {
        Ok(ResolvedManifest {
            spec: name.to_string(),
            packages: self.packages(name)?,
            pre_commands: self.pre_commands(name)?,
            post_commands: self.post_commands(name)?,
            file_transfers: self.file_transfers(name)?,
        })
    }

    /// Flattened package list
    pub fn packages(&self, name: &str) -> Result<Vec<String>> {
        self.walk(name, &mut Vec::new(), &|spec: &Spec, required: Vec<String>| {
            let mut packages = spec.packages.clone();
            packages.extend(required);
            Ok(packages)
        })
    }

    /// Flattened pre-commands, dependencies first
    pub fn pre_commands(&self, name: &str) -> Result<Vec<String>> {
        self.walk(name, &mut Vec::new(), &|spec: &Spec, mut required: Vec<String>| {
            required.extend(spec.commands.pre.iter().cloned());
            Ok(required)
        })
    }

    /// Flattened post-commands, dependent first
    pub fn post_commands(&self, name: &str) -> Result<Vec<String>> {
        self.walk(name, &mut Vec::new(), &|spec: &Spec, required: Vec<String>| {
            let mut commands = spec.commands.post.clone();
            commands.extend(required);
            Ok(commands)
        })
    }

    /// Flattened file-transfer manifest
    pub fn file_transfers(&self, name: &str) -> Result<Vec<FileTransfer>> {
        self.walk(name, &mut Vec::new(), &|spec: &Spec, required: Vec<FileTransfer>| {
            let mut transfers = own_file_transfers(spec)?;
            transfers.extend(required);
            Ok(transfers)
        })
    }

    /// Depth-first walk; `merge` combines a spec with its requirements' output
    fn walk<T, F>(&self, name: &str, path: &mut Vec<String>, merge: &F) -> Result<Vec<T>>
    where
        F: Fn(&Spec, Vec<T>) -> Result<Vec<T>>,
    {
        if let Some(start) = path.iter().position(|visiting| visiting == name) {
            let mut chain = path[start..].to_vec();
            chain.push(name.to_string());
            return Err(Error::Cycle { chain });
        }

        let Some(spec) = self.store.get_spec(name) else {
            log::debug!("Required spec '{name}' not found, skipping");
            return Ok(Vec::new());
        };

        path.push(name.to_string());
        let mut required = Vec::new();
        for requirement in &spec.requires {
            required.extend(self.walk(requirement, path, merge)?);
        }
        path.pop();

        merge(spec, required)
    }
}

/// Resolve the full manifest for `name`
pub fn resolve(store: &SpecStore, name: &str) -> Result<ResolvedManifest> {
    Resolver::new(store).resolve(name)
}

pub fn resolve_packages(store: &SpecStore, name: &str) -> Result<Vec<String>> {
    Resolver::new(store).packages(name)
}

pub fn resolve_pre_commands(store: &SpecStore, name: &str) -> Result<Vec<String>> {
    Resolver::new(store).pre_commands(name)
}

pub fn resolve_post_commands(store: &SpecStore, name: &str) -> Result<Vec<String>> {
    Resolver::new(store).post_commands(name)
}

pub fn resolve_file_transfers(store: &SpecStore, name: &str) -> Result<Vec<FileTransfer>> {
    Resolver::new(store).file_transfers(name)
}

/// Transfers for a single spec's own config and content trees
fn own_file_transfers(spec: &Spec) -> Result<Vec<FileTransfer>> {
    let mut transfers = Vec::new();

    if !spec.configs.destination.is_empty() {
        transfers.extend(map_directory(&spec.configs_dir(), &spec.configs.destination)?);
    }

    if spec.ships_content() {
        transfers.extend(map_directory(&spec.content_dir(), &spec.content.destination)?);
    }

    Ok(transfers)
}

/// Plan a transfer for every regular file under `source_root`
fn map_directory(source_root: &Path, destination_root: &str) -> Result<Vec<FileTransfer>> {
    if !source_root.is_dir() {
        log::debug!("Source directory not found: {}", source_root.display());
        return Ok(Vec::new());
    }

    let root = destination_root.trim_end_matches('/');
    let mut transfers = Vec::new();

    for entry in WalkDir::new(source_root).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|source| Error::Walk {
            path: source_root.to_path_buf(),
            source,
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(source_root) else {
            continue;
        };
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        transfers.push(FileTransfer::new(entry.path(), format!("{root}/{relative}")));
    }

    Ok(transfers)
}
