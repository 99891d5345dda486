use super::model::{ColumnValues, TwissTable};
use crate::domain::{ParserResult, SadError};

/// Label that identifies a repeated header line inside the table body.
pub const REPEATED_HEADER_SENTINEL: &str = "s(m)";

/// Parses a whitespace-separated SAD Twiss table. The first line is the
/// header; later lines carrying the `s(m)` label are repeated headers and are
/// dropped together with blank lines.
pub fn parse_twiss_table(source: &str) -> ParserResult<TwissTable> {
    let mut lines = source.lines().enumerate();
    let header: Vec<&str> = lines
        .next()
        .map(|(_, line)| line.split_whitespace().collect())
        .unwrap_or_default();
    if header.is_empty() {
        return Err(SadError::input_validation(
            "INPUT.TWISS_HEADER",
            "twiss table has no header line",
        ));
    }

    let mut cells: Vec<Vec<&str>> = vec![Vec::new(); header.len()];
    for (index, line) in lines {
        if line.trim().is_empty() || line.contains(REPEATED_HEADER_SENTINEL) {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != header.len() {
            return Err(SadError::input_validation(
                "INPUT.TWISS_ROW_LENGTH",
                format!(
                    "line {}: expected {} fields, found {}",
                    index + 1,
                    header.len(),
                    fields.len()
                ),
            ));
        }
        for (column, field) in cells.iter_mut().zip(fields) {
            column.push(field);
        }
    }

    let mut table = TwissTable::new();
    for (name, column) in header.into_iter().zip(cells) {
        table.push_column(name, classify_column(&column))?;
    }
    Ok(table)
}

fn classify_column(cells: &[&str]) -> ColumnValues {
    let numeric: Option<Vec<f64>> = cells
        .iter()
        .map(|cell| cell.parse::<f64>().ok().filter(|value| value.is_finite()))
        .collect();

    match numeric {
        Some(values) => ColumnValues::Numeric(values),
        None => ColumnValues::Text(cells.iter().map(|cell| cell.to_string()).collect()),
    }
}
