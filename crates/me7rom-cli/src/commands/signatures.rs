//! Signature catalog export.

use std::path::Path;

use anyhow::Result;
use me7rom_core::{builtin_signatures, save_signatures};
use tracing::info;

pub fn run(output: Option<&Path>) -> Result<()> {
    let catalog = builtin_signatures();
    match output {
        Some(path) => {
            save_signatures(path, &catalog)?;
            info!(
                "Wrote {} signature entries ({}) to {}",
                catalog.entries.len(),
                catalog.version,
                path.display()
            );
        }
        None => println!("{}", serde_json::to_string_pretty(&catalog)?),
    }
    Ok(())
}
