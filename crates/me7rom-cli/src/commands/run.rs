//! Read, write, identify and patch runs.

use std::path::Path;

use anyhow::{Context, Result, bail};
use me7rom_core::{
    FileStore, RomAnalyzer, RomImage, RunConfig, SignatureCatalog, Step, builtin_signatures,
    load_signatures,
};
use tracing::info;

use crate::output;

pub fn load_catalog(path: Option<&Path>) -> Result<SignatureCatalog> {
    match path {
        Some(path) => {
            let catalog = load_signatures(path)
                .with_context(|| format!("Failed to load signatures from {}", path.display()))?;
            info!(
                "Loaded signature catalog '{}' ({} entries) from {}",
                catalog.version,
                catalog.entries.len(),
                path.display()
            );
            Ok(catalog)
        }
        None => Ok(builtin_signatures()),
    }
}

/// Run the analyzer over one image and print its report
pub fn run(config: RunConfig, signatures: Option<&Path>, json: bool) -> Result<()> {
    let catalog = load_catalog(signatures)?;
    let rom = RomImage::load(&config.rom_path)
        .with_context(|| format!("Failed to load {}", config.rom_path.display()))?;
    let mode = config.mode;

    let mut analyzer = RomAnalyzer::new(rom, &catalog, config)?;
    let report = analyzer.run(&mut FileStore)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        output::print_report(&report);
    }

    if let Some(Step::Failed { reason, .. }) = &report.table_action {
        bail!("MLHFM {} failed: {}", mode, reason);
    }
    Ok(())
}
