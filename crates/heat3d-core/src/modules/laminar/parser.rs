use crate::common::config::PerturbationSource;
use crate::domain::{Heat3dError, ParserResult, TraceResult};
use std::fs;
use std::path::Path;

const LC_COLUMN: usize = 3;
const PSIMIN_COLUMN: usize = 4;

pub(super) fn read_laminar_file(path: &Path) -> ParserResult<TraceResult> {
    let source = fs::read_to_string(path).map_err(|source| {
        Heat3dError::parse(
            "PARSE.LAMINAR_MISSING",
            format!("tracer output '{}' could not be read: {}", path.display(), source),
        )
    })?;
    parse_laminar_table(&source).map_err(|error| {
        Heat3dError::parse(
            error.placeholder(),
            format!("{}: {}", path.display(), error.message()),
        )
    })
}

/// Whitespace table with `#` comments; column 3 is Lc in km, column 4 psimin.
pub(super) fn parse_laminar_table(source: &str) -> ParserResult<TraceResult> {
    let mut lc = Vec::new();
    let mut psimin = Vec::new();
    for (line_index, line) in source.lines().enumerate() {
        let content = line.split('#').next().unwrap_or_default().trim();
        if content.is_empty() {
            continue;
        }
        let columns: Vec<&str> = content.split_whitespace().collect();
        if columns.len() <= PSIMIN_COLUMN {
            return Err(Heat3dError::parse(
                "PARSE.LAMINAR_COLUMNS",
                format!(
                    "line {} has {} column(s), expected at least {}",
                    line_index + 1,
                    columns.len(),
                    PSIMIN_COLUMN + 1
                ),
            ));
        }
        lc.push(parse_column(columns[LC_COLUMN], "Lc", line_index)?);
        psimin.push(parse_column(columns[PSIMIN_COLUMN], "psimin", line_index)?);
    }
    if psimin.is_empty() {
        return Err(Heat3dError::parse(
            "PARSE.LAMINAR_EMPTY",
            "tracer output contains no data rows",
        ));
    }
    TraceResult::new(lc, psimin)
}

fn parse_column(token: &str, name: &str, line_index: usize) -> ParserResult<f64> {
    token.parse::<f64>().map_err(|_| {
        Heat3dError::parse(
            "PARSE.LAMINAR_VALUE",
            format!("line {} has non-numeric {} '{}'", line_index + 1, name, token),
        )
    })
}

/// `path scale [phase]` per line, `#` comments. `./` in a path is resolved
/// against `input_dir`; a missing phase is 0.
pub(super) fn parse_perturbation_file(
    source: &str,
    input_dir: &Path,
) -> ParserResult<Vec<PerturbationSource>> {
    let prefix = format!("{}/", input_dir.display());
    let mut sources = Vec::new();
    for (line_index, line) in source.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.len() < 2 {
            return Err(Heat3dError::parse(
                "PARSE.PERTURBATION_ROW",
                format!("line {} needs a file and a scale: '{}'", line_index + 1, line),
            ));
        }
        let path = words[0].replace("./", &prefix);
        let scale = parse_perturbation_value(words[1], line_index)?;
        let phase = match words.get(2) {
            Some(word) => parse_perturbation_value(word, line_index)?,
            None => 0.0,
        };
        sources.push(PerturbationSource::new(path, scale, phase));
    }
    Ok(sources)
}

fn parse_perturbation_value(token: &str, line_index: usize) -> ParserResult<f64> {
    token.parse::<f64>().map_err(|_| {
        Heat3dError::parse(
            "PARSE.PERTURBATION_ROW",
            format!("line {} has non-numeric value '{}'", line_index + 1, token),
        )
    })
}
