//! Kubernetes resource quantity parsing
//!
//! Only the notations that show up in pod resource limits are handled:
//! CPU as cores or `n`/`u`/`m` fractions, memory as bytes with binary
//! (`Ki`..`Ti`) or decimal (`K`..`T`) suffixes.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid quantity '{value}'")]
pub struct QuantityError {
    pub value: String,
}

impl QuantityError {
    fn new(value: &str) -> Self {
        Self {
            value: value.to_string(),
        }
    }
}

/// Parse a CPU quantity into millicores
pub fn parse_cpu_millicores(value: &str) -> Result<u64, QuantityError> {
    let value = value.trim();
    let (number, divisor) = if let Some(n) = value.strip_suffix('n') {
        (n, 1_000_000.0)
    } else if let Some(u) = value.strip_suffix('u') {
        (u, 1_000.0)
    } else if let Some(m) = value.strip_suffix('m') {
        (m, 1.0)
    } else {
        (value, 0.001)
    };

    let parsed: f64 = number.parse().map_err(|_| QuantityError::new(value))?;
    if !parsed.is_finite() || parsed < 0.0 {
        return Err(QuantityError::new(value));
    }
    Ok((parsed / divisor).round() as u64)
}

/// Parse a memory quantity into bytes
pub fn parse_memory_bytes(value: &str) -> Result<u64, QuantityError> {
    const SUFFIXES: &[(&str, u64)] = &[
        ("Ki", 1 << 10),
        ("Mi", 1 << 20),
        ("Gi", 1 << 30),
        ("Ti", 1 << 40),
        ("K", 1_000),
        ("M", 1_000_000),
        ("G", 1_000_000_000),
        ("T", 1_000_000_000_000),
    ];

    let value = value.trim();
    let (number, multiplier) = SUFFIXES
        .iter()
        .find_map(|(suffix, mult)| value.strip_suffix(suffix).map(|n| (n, *mult)))
        .unwrap_or((value, 1));

    let parsed: f64 = number.parse().map_err(|_| QuantityError::new(value))?;
    if !parsed.is_finite() || parsed < 0.0 {
        return Err(QuantityError::new(value));
    }
    Ok((parsed * multiplier as f64).round() as u64)
}
