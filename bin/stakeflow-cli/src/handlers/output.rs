//! Reading and writing step artifacts.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use stakeflow_orchestrator::{Reportable, StepError, StepReport};
use tracing::info;

/// Prints the report of a step and, on success, writes its artifact to `out`.
///
/// A failed step is returned as an error after its report is printed so the process exits
/// non-zero.
pub(super) fn emit<T>(result: Result<T, StepError>, out: Option<&Path>) -> Result<()>
where
    T: Reportable + Serialize,
{
    let report = StepReport::from_result(&result);
    print_json(&report)?;

    let artifact = result?;
    if let Some(path) = out {
        write_json(path, &artifact)?;
        info!(event = "wrote artifact", path = %path.display());
    }

    Ok(())
}

pub(super) fn print_json(value: &impl Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("could not encode output")?;
    println!("{json}");

    Ok(())
}

pub(super) fn read_artifact<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read artifact {}", path.display()))?;

    serde_json::from_str(&raw)
        .with_context(|| format!("{} does not hold the expected artifact", path.display()))
}

fn write_json(path: &Path, value: &impl Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("could not encode artifact")?;

    fs::write(path, json).with_context(|| format!("could not write artifact {}", path.display()))
}
