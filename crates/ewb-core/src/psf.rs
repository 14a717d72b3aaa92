use crate::result_store::SimulationResult;
use std::fs;
use std::path::Path;

/// Plain-text PSF: header, signal list, then one row per sample with the
/// axis value first.
pub fn render_psf_text(result: &SimulationResult, precision: usize) -> String {
    let precision = precision.clamp(1, 15);
    let mut out = String::new();
    out.push_str("PSF_TEXT\n");
    out.push_str(&format!("analysis={}\n", result.analysis));
    if let Some(axis) = &result.axis {
        out.push_str(&format!("axis={}\n", axis.name));
    }
    out.push_str(&format!("points={}\n", result.sample_count()));
    out.push_str("signals:\n");
    for name in result.variables.keys() {
        out.push_str(&format!("- {}\n", name));
    }
    out.push_str("values:\n");

    for index in 0..result.sample_count() {
        let mut fields = Vec::with_capacity(result.variables.len() + 1);
        if let Some(axis) = &result.axis {
            fields.push(format_value(axis.values.get(index).copied(), precision));
        }
        for values in result.variables.values() {
            fields.push(format_value(values.get(index).copied(), precision));
        }
        out.push_str(&fields.join(" "));
        out.push('\n');
    }
    out
}

pub fn write_psf_text(result: &SimulationResult, path: &Path, precision: usize) -> std::io::Result<()> {
    fs::write(path, render_psf_text(result, precision))
}

fn format_value(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(value) => format!("{:.*e}", precision, value),
        None => "nan".to_string(),
    }
}
