use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;
use specgraph::{ResolvedManifest, Spec, SpecStore};

use crate::Context;
use crate::config::{Inventory, Settings};
use crate::paths;
use crate::ui;

/// Load every spec on the search path
pub fn load_store(settings: &Settings) -> Result<SpecStore> {
    let dirs = paths::spec_dirs(&settings.spec_dirs)?;
    log::debug!("Spec search path: {dirs:?}");
    SpecStore::load(&dirs).context("Failed to load spec definitions")
}

/// Resolve `name`, failing when no such spec is defined
pub fn resolve_named(store: &SpecStore, name: &str) -> Result<ResolvedManifest> {
    if !store.spec_exists(name) {
        bail!("Spec '{name}' not found on the spec search path");
    }
    specgraph::resolve(store, name).with_context(|| format!("Failed to resolve spec '{name}'"))
}

/// Print every known spec as a table
pub fn list(_ctx: &Context) -> Result<()> {
    let inventory = Inventory::load()?;
    let store = load_store(&inventory.settings)?;

    ui::header("Available Specs");
    if store.is_empty() {
        ui::info("No specs found");
        for dir in paths::spec_dirs(&inventory.settings.spec_dirs)? {
            ui::dim(&dir.display().to_string());
        }
        return Ok(());
    }

    let rows: Vec<Vec<String>> = store.iter().map(spec_row).collect();
    ui::table(
        &[
            "Name", "Version", "Requires", "Packages", "Configs", "Content", "Post", "File",
        ],
        &rows,
    );
    Ok(())
}

fn spec_row(spec: &Spec) -> Vec<String> {
    let content = if spec.ships_content() {
        spec.content.destination.clone()
    } else if spec.content.source.is_empty() {
        "-".to_string()
    } else {
        format!("({})", spec.content.source)
    };

    vec![
        spec.name.clone(),
        or_dash(&spec.version),
        ui::list_cell(&spec.requires),
        ui::truncate(&ui::list_cell(&spec.packages), 40),
        or_dash(&spec.configs.destination),
        content,
        ui::truncate(&ui::list_cell(&spec.commands.post), 40),
        spec.definition_path.display().to_string(),
    ]
}

fn or_dash(value: &str) -> String {
    if value.is_empty() {
        "-".to_string()
    } else {
        value.to_string()
    }
}

/// Print what a spec resolves to
pub fn show(_ctx: &Context, name: &str, json: bool) -> Result<()> {
    let inventory = Inventory::load()?;
    let store = load_store(&inventory.settings)?;
    let manifest = resolve_named(&store, name)?;

    if json {
        let out = serde_json::to_string_pretty(&manifest).context("Failed to serialize manifest")?;
        println!("{out}");
        return Ok(());
    }

    ui::header(&format!("Spec: {name}"));
    if let Some(spec) = store.get_spec(name) {
        if !spec.version.is_empty() {
            ui::kv("Version", &spec.version);
        }
        ui::kv("Defined in", &spec.definition_path.display().to_string());
    }

    let options = inventory.settings.pipeline_options();

    ui::section("Pre-commands");
    print_commands(&manifest.pre_commands);

    ui::section("Packages");
    print_commands(&options.package_commands(&manifest.packages));

    ui::section("Files");
    if manifest.file_transfers.is_empty() {
        ui::dim("(none)");
    }
    for transfer in &manifest.file_transfers {
        println!(
            "  {} {} {}",
            transfer.source.display().to_string().dimmed(),
            "→".cyan(),
            transfer.destination
        );
    }

    ui::section("Post-commands");
    print_commands(&manifest.post_commands);

    Ok(())
}

fn print_commands(commands: &[String]) {
    if commands.is_empty() {
        ui::dim("(none)");
    }
    for command in commands {
        println!("  {} {}", "$".dimmed(), command);
    }
}
