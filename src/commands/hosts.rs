use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;
use dialoguer::{Confirm, Input, Select};
use provision::{AuthMode, Host};

use crate::Context;
use crate::cli::AddHostArgs;
use crate::commands::specs;
use crate::config::Inventory;
use crate::ui;

const AUTH_CHOICES: [&str; 2] = ["key", "password"];

/// Print the inventory as a table
pub fn list(_ctx: &Context) -> Result<()> {
    let inventory = Inventory::load()?;

    ui::header("Configured Hosts");
    if inventory.hosts.is_empty() {
        ui::info("No hosts configured");
        ui::dim("Add one with 'fleetform add-host'");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = inventory.hosts.iter().map(host_row).collect();
    ui::table(&["Name", "Address", "User", "Spec", "Auth", "Port"], &rows);
    println!();
    ui::dim(&format!("{} host(s)", inventory.hosts.len()));
    Ok(())
}

fn host_row(host: &Host) -> Vec<String> {
    vec![
        host.name.clone(),
        host.address.clone(),
        host.username.clone(),
        host.spec.clone(),
        auth_label(host.auth).to_string(),
        host.port().to_string(),
    ]
}

fn auth_label(auth: AuthMode) -> &'static str {
    match auth {
        AuthMode::Key => AUTH_CHOICES[0],
        AuthMode::Password => AUTH_CHOICES[1],
    }
}

/// Add a host, prompting for anything not given as a flag
pub fn add(_ctx: &Context, args: AddHostArgs) -> Result<()> {
    let mut inventory = Inventory::load()?;
    let interactive = args.name.is_none()
        || args.address.is_none()
        || args.username.is_none()
        || args.spec.is_none();

    if interactive {
        ui::header("Add Host");
    }

    let name = match args.name {
        Some(name) => name,
        None => prompt_field("Name")?,
    };
    if inventory.find_host(&name).is_some() {
        bail!("Host '{name}' already exists");
    }
    let address = match args.address {
        Some(address) => address,
        None => prompt_field("Address")?,
    };
    let username = match args.username {
        Some(username) => username,
        None => prompt_field("Username")?,
    };
    let spec = match args.spec {
        Some(spec) => spec,
        None => prompt_field("Spec")?,
    };
    let auth = if args.password_auth {
        AuthMode::Password
    } else if interactive {
        prompt_auth()?
    } else {
        AuthMode::Key
    };

    let fields = [
        ("name", &name),
        ("address", &address),
        ("username", &username),
        ("spec", &spec),
    ];
    for (field, value) in fields {
        if value.trim().is_empty() {
            bail!("Host {field} cannot be empty");
        }
    }

    let store = specs::load_store(&inventory.settings)?;
    if !store.spec_exists(&spec) {
        ui::warn(&format!("Spec '{spec}' is not on the spec search path yet"));
    }

    let mut host = Host::new(name.trim(), address.trim(), username.trim(), spec.trim(), auth);
    host.port = args.port;

    ui::kv("Name", &host.name);
    ui::kv("Address", &format!("{}:{}", host.address, host.port()));
    ui::kv("User", &host.username);
    ui::kv("Spec", &host.spec);
    ui::kv("Auth", auth_label(host.auth));

    let label = host.label();
    inventory.add_host(host)?;
    let path = inventory.save()?;
    ui::success(&format!("Added {label}"));
    ui::dim(&format!("Saved to {}", path.display()));
    Ok(())
}

fn prompt_field(prompt: &str) -> Result<String> {
    Input::<String>::new()
        .with_prompt(prompt)
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Value cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()
        .with_context(|| format!("Failed to read {}", prompt.to_lowercase()))
}

fn prompt_auth() -> Result<AuthMode> {
    let choice = Select::new()
        .with_prompt("Authentication")
        .items(&AUTH_CHOICES)
        .default(0)
        .interact()
        .context("Failed to read authentication choice")?;
    Ok(if choice == 1 {
        AuthMode::Password
    } else {
        AuthMode::Key
    })
}

/// Remove a host after confirmation
pub fn delete(_ctx: &Context, name: Option<&str>, yes: bool) -> Result<()> {
    let mut inventory = Inventory::load()?;
    if inventory.hosts.is_empty() {
        ui::info("No hosts configured");
        return Ok(());
    }

    let name = match name {
        Some(name) => name.to_string(),
        None => {
            let labels: Vec<String> = inventory.hosts.iter().map(Host::label).collect();
            let index = Select::new()
                .with_prompt("Host to delete")
                .items(&labels)
                .default(0)
                .interact()
                .context("Failed to read host selection")?;
            inventory.hosts[index].name.clone()
        }
    };

    let Some(host) = inventory.find_host(&name) else {
        bail!("Host '{name}' not found");
    };
    let label = host.label();

    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete {}?", label.bold()))
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;
        if !confirmed {
            ui::info("Cancelled");
            return Ok(());
        }
    }

    inventory.remove_host(&name);
    inventory.save()?;
    ui::success(&format!("Deleted {label}"));
    Ok(())
}
