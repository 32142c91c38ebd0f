pub mod chart;
pub mod payload;
pub mod reduce;
pub mod session;
pub mod sim;

use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;
use tally_core::Snapshot;
use tally_core::action::parse_snapshot;
use tally_core::error::ErrorCode;

use crate::output::coded;

/// Read a file, or stdin when `path` is `-`.
pub fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Read and parse a snapshot document.
pub fn load_snapshot(path: &Path) -> Result<Snapshot> {
    let raw = read_input(path)?;
    parse_snapshot(&raw)
        .map_err(|err| coded(ErrorCode::SnapshotParseError, format!("{}: {err}", path.display())))
}
