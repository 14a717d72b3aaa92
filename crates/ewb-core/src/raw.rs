//! Rawfile reader
//!
//! Reads the first plot of an ngspice rawfile, ASCII (`Values:`) or binary
//! (`Binary:`, real data only), into a `RawOutput`. Variable names are
//! normalized so both backends report `time`, `v(<node>)` and `i(<device>)`.

use thiserror::Error;

use crate::backend::{RawOutput, RawVariable, VarKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RawParseError {
    #[error("invalid header field {field}: {value}")]
    InvalidHeader { field: &'static str, value: String },
    #[error("data marker not found")]
    MissingData,
    #[error("complex data is not supported")]
    Complex,
    #[error("expected {expected} points, found {found}")]
    Truncated { expected: usize, found: usize },
}

#[derive(Debug, Default)]
struct Header {
    plot_name: String,
    complex: bool,
    num_variables: usize,
    num_points: usize,
    variables: Vec<RawVariable>,
}

pub fn parse_rawfile(data: &[u8]) -> Result<RawOutput, RawParseError> {
    let text = String::from_utf8_lossy(data);
    let (header, binary) = parse_header(&text)?;
    if header.complex {
        return Err(RawParseError::Complex);
    }
    let points = if binary {
        parse_binary(data, &header)?
    } else {
        parse_ascii(&text, &header)?
    };
    if points.len() < header.num_points {
        return Err(RawParseError::Truncated {
            expected: header.num_points,
            found: points.len(),
        });
    }
    Ok(RawOutput {
        plot_name: header.plot_name,
        variables: header.variables,
        points,
    })
}

fn parse_header(text: &str) -> Result<(Header, bool), RawParseError> {
    let mut header = Header::default();
    let mut in_variables = false;

    for line in text.lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix("Plotname:") {
            header.plot_name = value.trim().to_string();
        } else if let Some(value) = line.strip_prefix("Flags:") {
            header.complex = value.to_ascii_lowercase().contains("complex");
        } else if let Some(value) = line.strip_prefix("No. Variables:") {
            header.num_variables = parse_count("No. Variables", value)?;
        } else if let Some(value) = line.strip_prefix("No. Points:") {
            header.num_points = parse_count("No. Points", value)?;
        } else if line.starts_with("Variables:") {
            in_variables = true;
        } else if line.starts_with("Values:") {
            return Ok((header, false));
        } else if line.starts_with("Binary:") {
            return Ok((header, true));
        } else if in_variables && !line.is_empty() {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 3 {
                header.variables.push(normalize_variable(parts[1], parts[2]));
            }
        }
    }
    Err(RawParseError::MissingData)
}

fn parse_count(field: &'static str, value: &str) -> Result<usize, RawParseError> {
    value
        .trim()
        .parse()
        .map_err(|_| RawParseError::InvalidHeader {
            field,
            value: value.trim().to_string(),
        })
}

/// ASCII data: each point is `index value` followed by one value per line.
fn parse_ascii(text: &str, header: &Header) -> Result<Vec<Vec<f64>>, RawParseError> {
    let start = text.find("Values:").ok_or(RawParseError::MissingData)?;
    let mut points = Vec::with_capacity(header.num_points);
    let mut current = Vec::with_capacity(header.num_variables);
    let mut expecting_index = true;

    for line in text[start + "Values:".len()..].lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if expecting_index {
            let mut parts = line.split_whitespace();
            parts.next();
            if let Some(value) = parts.next().and_then(|v| v.parse::<f64>().ok()) {
                current.push(value);
            }
            expecting_index = false;
        } else if let Ok(value) = line.parse::<f64>() {
            current.push(value);
        }

        if current.len() == header.num_variables {
            points.push(std::mem::take(&mut current));
            expecting_index = true;
            if points.len() == header.num_points {
                break;
            }
        }
    }
    Ok(points)
}

fn parse_binary(data: &[u8], header: &Header) -> Result<Vec<Vec<f64>>, RawParseError> {
    let marker = b"Binary:\n";
    let start = data
        .windows(marker.len())
        .position(|window| window == marker)
        .ok_or(RawParseError::MissingData)?
        + marker.len();
    let body = &data[start..];
    let stride = header.num_variables * 8;
    if stride == 0 {
        return Ok(Vec::new());
    }

    Ok(body
        .chunks_exact(stride)
        .take(header.num_points)
        .map(|chunk| {
            chunk
                .chunks_exact(8)
                .map(|bytes| {
                    let mut buf = [0u8; 8];
                    buf.copy_from_slice(bytes);
                    f64::from_le_bytes(buf)
                })
                .collect()
        })
        .collect())
}

/// Map solver spellings (`V(1)`, `v1#branch`, `@r1[i]`, `v-sweep`) onto
/// `v(node)`, `i(device)`, `time` and the sweep axis.
pub fn normalize_variable(name: &str, var_type: &str) -> RawVariable {
    let name = name.to_ascii_lowercase();
    let var_type = var_type.to_ascii_lowercase();

    if var_type == "time" || name == "time" {
        return RawVariable::new("time", VarKind::Time);
    }
    if name.ends_with("-sweep") {
        return RawVariable::new(name, VarKind::Sweep);
    }
    if let Some(device) = name.strip_suffix("#branch") {
        return RawVariable::new(format!("i({})", device), VarKind::Current);
    }
    if let Some(inner) = name.strip_prefix('@') {
        let device = inner.split('[').next().unwrap_or(inner);
        return RawVariable::new(format!("i({})", device), VarKind::Current);
    }
    if name.starts_with("i(") {
        return RawVariable::new(name, VarKind::Current);
    }
    if name.starts_with("v(") {
        return RawVariable::new(name, VarKind::Voltage);
    }
    if var_type == "current" {
        RawVariable::new(format!("i({})", name), VarKind::Current)
    } else {
        RawVariable::new(format!("v({})", name), VarKind::Voltage)
    }
}
