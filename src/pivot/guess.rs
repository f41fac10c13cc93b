use crate::model::Table;

const KEY_CANDIDATES: [&str; 5] = ["sku", "item code", "itemcode", "product", "codice"];
const SIZE_CANDIDATES: [&str; 2] = ["size", "taglia"];
const QUANTITY_CANDIDATES: [&str; 4] = ["qty", "quantity", "quantità", "quantita"];

/// Default column choices derived from the header names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnGuess {
    pub key_column: Option<String>,
    pub size_column: Option<String>,
    pub quantity_column: Option<String>,
}

/// Picks the item key, size and quantity columns by their usual header names,
/// ignoring case and surrounding whitespace. Falls back to the first column
/// when no candidate matches; every field is `None` for a table without columns.
pub fn guess_columns(table: &Table) -> ColumnGuess {
    ColumnGuess {
        key_column: pick(table.columns(), &KEY_CANDIDATES),
        size_column: pick(table.columns(), &SIZE_CANDIDATES),
        quantity_column: pick(table.columns(), &QUANTITY_CANDIDATES),
    }
}

fn pick(columns: &[String], candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .find_map(|candidate| {
            columns
                .iter()
                .find(|column| column.trim().to_lowercase() == *candidate)
        })
        .or_else(|| columns.first())
        .cloned()
}
