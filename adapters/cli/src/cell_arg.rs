use std::{error::Error, fmt};

use isoworld_core::CellCoord;

/// Delimiter separating the column from the row.
const FIELD_DELIMITER: char = ',';

/// Parses a `COLUMN,ROW` pair into a cell coordinate.
pub(crate) fn parse_cell(value: &str) -> Result<CellCoord, CellArgError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CellArgError::Empty);
    }

    let (column, row) = trimmed
        .split_once(FIELD_DELIMITER)
        .ok_or_else(|| CellArgError::MissingDelimiter(trimmed.to_owned()))?;
    let column = parse_component(column)?;
    let row = parse_component(row)?;
    Ok(CellCoord::new(column, row))
}

fn parse_component(value: &str) -> Result<i32, CellArgError> {
    let trimmed = value.trim();
    trimmed
        .parse()
        .map_err(|_| CellArgError::InvalidComponent(trimmed.to_owned()))
}

/// Errors raised while parsing a cell argument.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum CellArgError {
    Empty,
    MissingDelimiter(String),
    InvalidComponent(String),
}

impl fmt::Display for CellArgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "cell must not be empty"),
            Self::MissingDelimiter(value) => {
                write!(f, "expected COLUMN,ROW but found `{value}`")
            }
            Self::InvalidComponent(value) => {
                write!(f, "`{value}` is not a valid cell component")
            }
        }
    }
}

impl Error for CellArgError {}
