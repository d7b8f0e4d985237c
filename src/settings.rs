use std::{fs, path::Path};

use anyhow::{Context, Result};

use crate::convert::ExportOptions;

/// Save export options to a JSON file.
pub fn save_export_options(path: &Path, options: &ExportOptions) -> Result<()> {
    let content =
        serde_json::to_string_pretty(options).context("failed to serialize export options as JSON")?;
    fs::write(path, content)
        .with_context(|| format!("failed to save export options: {}", path.display()))?;
    Ok(())
}

/// Load export options from a JSON file. Missing fields take their defaults.
pub fn load_export_options(path: &Path) -> Result<ExportOptions> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to load export options: {}", path.display()))?;
    let options: ExportOptions =
        serde_json::from_str(&content).context("failed to parse export options JSON")?;
    Ok(options)
}
