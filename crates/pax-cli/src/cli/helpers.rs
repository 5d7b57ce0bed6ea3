use super::CliError;
use super::commands::{ConfigOverrides, apply_overrides};
use anyhow::Context;
use pax_core::domain::{PaxError, ResponseFunction, Spectrum};
use pax_core::modules::deconvolve::{
    ConfigLoadError, DeconvolutionConfig, load_deconvolution_config,
};
use pax_core::modules::serialization::{parse_spectrum_table, write_text_artifact};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub(super) fn read_spectrum_table(path: &Path, label: &str) -> Result<Spectrum, CliError> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("failed to read {label} table '{}'", path.display()))?;
    Ok(parse_spectrum_table(&source, label)?)
}

pub(super) fn read_response_table(path: &Path) -> Result<ResponseFunction, CliError> {
    let spectrum = read_spectrum_table(path, "response")?;
    Ok(ResponseFunction::from_spectrum(&spectrum)?)
}

/// Loads the optional JSON config and applies command-line overrides on top.
pub(super) fn resolve_config(
    config_path: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<DeconvolutionConfig, CliError> {
    let base = match config_path {
        Some(path) => load_deconvolution_config(path).map_err(config_load_error)?,
        None => DeconvolutionConfig::default(),
    };
    apply_overrides(base, overrides)
}

fn config_load_error(error: ConfigLoadError) -> CliError {
    match error {
        ConfigLoadError::Read { .. } => CliError::Internal(anyhow::Error::new(error)),
        ConfigLoadError::Parse { .. } => {
            CliError::Compute(PaxError::invalid_config(error.to_string()))
        }
    }
}

pub(super) fn write_artifact(path: &Path, content: &str) -> Result<(), CliError> {
    ensure_parent_dir(path)?;
    write_text_artifact(path, content)
        .with_context(|| format!("failed to write '{}'", path.display()))?;
    Ok(())
}

pub(super) fn write_json_artifact<T: Serialize>(path: &Path, value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to serialize report for '{}'", path.display()))?;
    write_artifact(path, &json)
}

fn ensure_parent_dir(path: &Path) -> Result<(), CliError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// `out/measured.dat` with index 2 becomes `out/measured_2.dat`.
pub(super) fn repetition_output_path(output: &Path, index: usize) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "measured".to_string());
    let file_name = match output.extension() {
        Some(extension) => format!("{stem}_{index}.{}", extension.to_string_lossy()),
        None => format!("{stem}_{index}"),
    };
    output.with_file_name(file_name)
}
