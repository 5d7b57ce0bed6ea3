use crate::domain::{EnergyGrid, PaxError, PaxResult, Spectrum};
use crate::modules::deconvolve::{DeconvolutionConfig, ResultPackage, StopReason};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::sync::Arc;

pub fn format_scientific_f64(value: f64, width: usize, precision: usize) -> String {
    format!(
        "{value:>width$.precision$e}",
        width = width,
        precision = precision
    )
}

pub fn normalize_text_artifact(content: &str) -> String {
    let mut normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    if !normalized.is_empty() && !normalized.ends_with('\n') {
        normalized.push('\n');
    }
    normalized
}

pub fn write_text_artifact(path: &Path, content: &str) -> std::io::Result<()> {
    fs::write(path, normalize_text_artifact(content))
}

/// Reads a two-column `energy intensity` table. Columns may be separated by
/// whitespace or commas; extra columns are ignored.
pub fn parse_spectrum_table(source: &str, label: &str) -> PaxResult<Spectrum> {
    let mut energies = Vec::new();
    let mut intensities = Vec::new();

    for (line_index, line) in source.lines().enumerate() {
        let line_number = line_index + 1;
        let trimmed = line.trim();
        if trimmed.is_empty()
            || trimmed.starts_with('#')
            || trimmed.starts_with('!')
            || trimmed.starts_with('*')
        {
            continue;
        }

        let mut tokens = trimmed
            .split(|character: char| character.is_whitespace() || character == ',')
            .filter(|token| !token.is_empty());
        let (Some(energy), Some(intensity)) = (tokens.next(), tokens.next()) else {
            return Err(PaxError::invalid_table(
                label,
                line_number,
                "expected at least two columns",
            ));
        };
        energies.push(parse_numeric_token(energy).ok_or_else(|| {
            PaxError::invalid_table(label, line_number, format!("invalid energy '{energy}'"))
        })?);
        intensities.push(parse_numeric_token(intensity).ok_or_else(|| {
            PaxError::invalid_table(
                label,
                line_number,
                format!("invalid intensity '{intensity}'"),
            )
        })?);
    }

    if energies.is_empty() {
        return Err(PaxError::invalid_table(
            label,
            0,
            "table does not contain any numeric rows",
        ));
    }

    let grid = EnergyGrid::new(energies)?;
    Spectrum::with_label(label, Arc::new(grid), intensities)
}

fn parse_numeric_token(token: &str) -> Option<f64> {
    token
        .trim()
        .replace(['D', 'd'], "E")
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Energies keep 17 significant digits so grids far from zero still parse
/// back with uniform spacing.
pub fn render_spectrum_table(spectrum: &Spectrum) -> String {
    let mut output = String::from("#                  energy        intensity\n");
    for (energy, intensity) in spectrum.energies().iter().zip(spectrum.intensities()) {
        let _ = writeln!(
            output,
            "{} {}",
            format_scientific_f64(*energy, 24, 16),
            format_scientific_f64(*intensity, 16, 8)
        );
    }
    output
}

pub fn render_history_table(result: &ResultPackage) -> String {
    let mut output = String::from(
        "# iteration         residual  relative_change       validation     truth_error\n",
    );
    for record in result.history() {
        let _ = writeln!(
            output,
            "{:>11} {} {} {} {}",
            record.iteration(),
            format_scientific_f64(record.residual(), 16, 8),
            format_scientific_f64(record.relative_change(), 16, 8),
            optional_column(record.validation_residual()),
            optional_column(record.ground_truth_error()),
        );
    }
    output
}

fn optional_column(value: Option<f64>) -> String {
    match value {
        Some(value) => format_scientific_f64(value, 16, 8),
        None => format!("{:>16}", "-"),
    }
}

/// JSON summary of one deconvolution run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultReport {
    pub stop_reason: StopReason,
    pub iterations: usize,
    pub config: DeconvolutionConfig,
    pub estimate_total: f64,
    pub final_residual: Option<f64>,
    pub final_relative_change: Option<f64>,
    pub best_validation_iteration: Option<usize>,
    pub best_ground_truth_iteration: Option<usize>,
    pub residuals: Vec<f64>,
    pub relative_changes: Vec<f64>,
}

impl ResultReport {
    pub fn from_result(result: &ResultPackage) -> Self {
        let latest = result.history().last();
        Self {
            stop_reason: result.stop_reason(),
            iterations: result.iterations(),
            config: *result.config(),
            estimate_total: result.estimate().total(),
            final_residual: latest.map(|record| record.residual()),
            final_relative_change: latest.map(|record| record.relative_change()),
            best_validation_iteration: result
                .best_validation_iteration()
                .map(|record| record.iteration()),
            best_ground_truth_iteration: result
                .best_ground_truth_iteration()
                .map(|record| record.iteration()),
            residuals: result.residuals(),
            relative_changes: result.relative_changes(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
