#![deny(unsafe_code)]

use std::collections::BTreeMap;

use viewsync_model::Table;

/// Horizontal alignment of one rendered column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    Left,
    Right,
    Center,
}

/// Display rules for a single column.
#[derive(Debug, Clone, Default, serde::Deserialize, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnFormat {
    /// Header label override; the column name is used when absent.
    pub label: Option<String>,
    #[serde(default)]
    pub align: Align,
    /// Cells longer than this are clipped with an ellipsis.
    pub max_width: Option<usize>,
}

/// Optional display-formatting policy a panel binding carries.
#[derive(Debug, Clone, Default, serde::Deserialize, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub struct FormatPolicy {
    #[serde(default)]
    pub columns: BTreeMap<String, ColumnFormat>,
    /// Rendered in place of missing cells.
    #[serde(default)]
    pub missing_placeholder: String,
}

/// A table rendered to display strings, ready for any tabular widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedTable {
    pub headers: Vec<String>,
    pub aligns: Vec<Align>,
    pub rows: Vec<Vec<String>>,
}

impl FormatPolicy {
    pub fn apply(&self, table: &Table) -> FormattedTable {
        let formats: Vec<Option<&ColumnFormat>> = table
            .columns()
            .iter()
            .map(|column| self.columns.get(column))
            .collect();

        let headers = table
            .columns()
            .iter()
            .zip(&formats)
            .map(|(column, format)| {
                format
                    .and_then(|f| f.label.clone())
                    .unwrap_or_else(|| column.clone())
            })
            .collect();
        let aligns = formats
            .iter()
            .map(|format| format.map_or(Align::default(), |f| f.align))
            .collect();
        let rows = table
            .rows()
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&formats)
                    .map(|(cell, format)| {
                        let text = if cell.is_missing() {
                            self.missing_placeholder.clone()
                        } else {
                            cell.render()
                        };
                        match format.and_then(|f| f.max_width) {
                            Some(max) => clip(&text, max),
                            None => text,
                        }
                    })
                    .collect()
            })
            .collect();

        FormattedTable {
            headers,
            aligns,
            rows,
        }
    }
}

/// Clips to `max` characters, ending in an ellipsis when shortened.
fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(max.saturating_sub(1)).collect();
    clipped.push('…');
    clipped
}
