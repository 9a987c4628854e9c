use crate::domain::{Heat3dError, Heat3dResult};
use std::fs;
use std::path::Path;

/// Shortest round-trip rendering that always keeps a decimal point or an
/// exponent (`10.0`, `0.1`, `1e-7`).
pub fn format_float(value: f64) -> String {
    format!("{value:?}")
}

pub fn normalize_text_artifact(content: &str) -> String {
    let mut normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    if !normalized.is_empty() && !normalized.ends_with('\n') {
        normalized.push('\n');
    }
    normalized
}

pub fn write_text_artifact(path: &Path, content: &str) -> Heat3dResult<()> {
    fs::write(path, normalize_text_artifact(content)).map_err(|source| {
        Heat3dError::io_system(
            "IO.WRITE_ARTIFACT",
            format!("failed to write '{}': {}", path.display(), source),
        )
    })
}
