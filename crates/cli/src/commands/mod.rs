//! CLI command implementations

pub mod models;
pub mod predict;

use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;

/// Read observation JSON from a file, or stdin when no path is given
pub fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) => std::fs::read_to_string(p)
            .with_context(|| format!("Failed to read input file {}", p.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read observation from stdin")?;
            Ok(buf)
        }
    }
}
