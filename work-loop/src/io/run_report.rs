//! JSON run report written by `--report`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::core::types::LoopResult;

/// Write the loop result as pretty-printed JSON, creating parent directories.
pub fn write_run_report(path: &Path, result: &LoopResult) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create report dir {}", parent.display()))?;
    }
    let mut buf = serde_json::to_string_pretty(result).context("serialize run report")?;
    buf.push('\n');
    fs::write(path, buf).with_context(|| format!("write {}", path.display()))
}
