use crate::agents::{ActionEngine, CollectionEngine};
use crate::config::Settings;
use crate::error::Result;
use crate::inventory::Inventory;
use crate::utils::path_validator::PathValidator;
use colored::Colorize;
use std::path::Path;

/// Inventory the manifest graph rooted at `manifest_path` and write it to `output_path`.
pub fn execute_collect<P: AsRef<Path>, Q: AsRef<Path>>(
    manifest_path: P,
    output_path: Q,
) -> Result<()> {
    let manifest_path = manifest_path.as_ref();
    let output_path = output_path.as_ref();
    println!("{}", "Collecting dependency state...".cyan().bold());

    // Step 1: Validate paths and settings
    println!("\n{}", "1. Validating paths...".yellow());
    PathValidator::validate_input_file(manifest_path)?;
    PathValidator::validate_output_file(output_path)?;
    let settings = Settings::from_env()?;
    println!("{}", "✓ Paths are valid".green());

    // Step 2: Manifests, oracle, lockfiles
    println!("\n{}", "2. Inspecting manifests and lockfiles...".yellow());
    let inventory = CollectionEngine::new(settings).collect(manifest_path)?;

    let proposed: usize = inventory
        .manifests
        .values()
        .map(|entry| entry.updated.dependencies.len())
        .sum();
    let drifted = inventory
        .lockfiles
        .values()
        .filter(|entry| entry.updated.is_some())
        .count();
    println!(
        "{}",
        format!(
            "✓ {} manifest(s): {} update(s) proposed; {} of {} lockfile(s) changed",
            inventory.manifests.len(),
            proposed,
            drifted,
            inventory.lockfiles.len()
        )
        .green()
    );

    // Step 3: Emit
    println!("\n{}", "3. Writing inventory...".yellow());
    inventory.write(output_path)?;
    println!("{}", format!("✓ Wrote {}", output_path.display()).green());

    println!("\n{}", "✨ Collection complete!".green().bold());
    Ok(())
}

/// Apply the updates recorded in `input_path` and write what was actually applied.
pub fn execute_act<P: AsRef<Path>, Q: AsRef<Path>>(input_path: P, output_path: Q) -> Result<()> {
    let input_path = input_path.as_ref();
    let output_path = output_path.as_ref();
    println!("{}", "Applying dependency updates...".cyan().bold());

    // Step 1: Read the inventory
    println!("\n{}", "1. Reading inventory...".yellow());
    PathValidator::validate_input_file(input_path)?;
    PathValidator::validate_output_file(output_path)?;
    let settings = Settings::from_env()?;
    let inventory = Inventory::read(input_path)?;
    println!(
        "{}",
        format!(
            "✓ {} manifest(s), {} lockfile(s)",
            inventory.manifests.len(),
            inventory.lockfiles.len()
        )
        .green()
    );

    // Step 2: Lockfiles first, then manifest rewrites
    println!("\n{}", "2. Updating lockfiles and manifests...".yellow());
    let applied = ActionEngine::new(settings).act(&inventory)?;

    // Step 3: Emit
    println!("\n{}", "3. Writing result...".yellow());
    applied.write(output_path)?;
    println!("{}", format!("✓ Wrote {}", output_path.display()).green());

    println!("\n{}", "✨ Updates applied!".green().bold());
    Ok(())
}
