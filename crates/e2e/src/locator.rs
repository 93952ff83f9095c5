//! Text-based row lookup over captured elements

use serde::{Deserialize, Serialize};

use crate::browser::Element;

/// What to do when more than one row contains the text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowMatchPolicy {
    /// Several matches are an error
    #[default]
    Unique,
    /// Take the first match in document order
    First,
}

impl std::str::FromStr for RowMatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unique" => Ok(RowMatchPolicy::Unique),
            "first" => Ok(RowMatchPolicy::First),
            other => Err(format!("unknown row match policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocateError {
    NotFound,
    Ambiguous { count: usize },
}

/// Pick the row whose rendered text contains `text`
pub fn find_row_by_text<'a>(
    rows: &'a [Element],
    text: &str,
    policy: RowMatchPolicy,
) -> Result<&'a Element, LocateError> {
    let mut matches = rows.iter().filter(|row| row.contains_text(text));
    let first = matches.next().ok_or(LocateError::NotFound)?;

    match policy {
        RowMatchPolicy::First => Ok(first),
        RowMatchPolicy::Unique => match matches.count() {
            0 => Ok(first),
            extra => Err(LocateError::Ambiguous { count: extra + 1 }),
        },
    }
}
