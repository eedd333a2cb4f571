//! Run one load/unload cycle and report the result

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use graphene_core::extensions::{ExtensionType, ModuleIdentity};
use graphene_core::{HostConfig, LifecycleController, LifecycleState};
use serde::Serialize;

#[derive(Args)]
pub struct LoadArgs {
    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
pub struct LoadReport {
    pub state: LifecycleState,
    pub modules: Vec<ModuleReport>,
}

#[derive(Debug, Serialize)]
pub struct ModuleReport {
    pub identity: ModuleIdentity,
    pub version: String,
    pub path: PathBuf,
    pub dependencies: Vec<ModuleIdentity>,
    pub extensions: Vec<ExtensionType>,
}

pub fn run(args: &LoadArgs, config: &HostConfig) -> Result<()> {
    let mut controller = LifecycleController::from_config(config);

    controller.load().context("Failed to load extensions")?;
    let report = report(&controller);
    controller.unload().context("Failed to unload extensions")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Snapshot of the loaded modules and their extension types
pub fn report(controller: &LifecycleController) -> LoadReport {
    let registry = controller.registry();
    let modules = controller
        .cache()
        .loaded()
        .iter()
        .map(|module| ModuleReport {
            identity: module.identity().clone(),
            version: module.manifest().version.clone(),
            path: module.path().to_path_buf(),
            dependencies: module
                .dependencies()
                .iter()
                .map(|dep| dep.identity().clone())
                .collect(),
            extensions: registry
                .extensions_of(module.identity().as_str())
                .map(<[ExtensionType]>::to_vec)
                .unwrap_or_default(),
        })
        .collect();

    LoadReport {
        state: controller.state(),
        modules,
    }
}

fn print_report(report: &LoadReport) {
    if report.modules.is_empty() {
        println!("No extension modules loaded");
        return;
    }

    for module in &report.modules {
        println!(
            "{} v{}    {}",
            module.identity,
            module.version,
            module.path.display()
        );
        if !module.dependencies.is_empty() {
            let deps: Vec<&str> = module.dependencies.iter().map(|d| d.as_str()).collect();
            println!("  depends on: {}", deps.join(", "));
        }
        for extension in &module.extensions {
            println!("  - {}", extension.name);
        }
    }
}
