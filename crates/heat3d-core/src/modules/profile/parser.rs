use crate::domain::{Heat3dError, Heat3dResult, ParserResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Profile files named without a directory, or with a `./` component, live
/// in the input directory.
pub(super) fn resolve_profile_path(name: &Path, input_dir: &Path) -> PathBuf {
    let raw = name.to_string_lossy();
    if raw.contains("./") || !raw.contains('/') {
        input_dir.join(name)
    } else {
        name.to_path_buf()
    }
}

pub(super) fn read_profile_table(path: &Path) -> Heat3dResult<(Vec<f64>, Vec<f64>)> {
    let source = fs::read_to_string(path).map_err(|source| {
        Heat3dError::config(
            "CONFIG.PROFILE_FILE",
            format!("profile file '{}' could not be read: {}", path.display(), source),
        )
    })?;
    parse_profile_table(&source).map_err(|error| {
        Heat3dError::config(
            "CONFIG.PROFILE_FILE",
            format!("profile file '{}': {}", path.display(), error.message()),
        )
    })
}

/// Two whitespace-separated columns (psi, value); `#` starts a comment.
pub(super) fn parse_profile_table(source: &str) -> ParserResult<(Vec<f64>, Vec<f64>)> {
    let mut psi = Vec::new();
    let mut values = Vec::new();
    for (line_index, line) in source.lines().enumerate() {
        let content = line.split('#').next().unwrap_or_default().trim();
        if content.is_empty() {
            continue;
        }
        let columns: Vec<&str> = content.split_whitespace().collect();
        if columns.len() < 2 {
            return Err(Heat3dError::parse(
                "PARSE.PROFILE_ROW",
                format!("line {} has {} column(s), expected 2", line_index + 1, columns.len()),
            ));
        }
        psi.push(parse_number(columns[0], line_index)?);
        values.push(parse_number(columns[1], line_index)?);
    }
    if psi.is_empty() {
        return Err(Heat3dError::parse(
            "PARSE.PROFILE_EMPTY",
            "profile table contains no data rows",
        ));
    }
    Ok((psi, values))
}

fn parse_number(token: &str, line_index: usize) -> ParserResult<f64> {
    token.parse::<f64>().map_err(|_| {
        Heat3dError::parse(
            "PARSE.PROFILE_ROW",
            format!("line {} has non-numeric value '{}'", line_index + 1, token),
        )
    })
}
