// src/extractors/web.rs

// --- Imports ---
use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

use crate::gateway::models::{TableColumn, WebTable};
use crate::utils::error::ExtractError;

// --- Constants ---
// Limits from the HTML table model
const MAX_COLSPAN: usize = 1_000;
const MAX_ROWSPAN: usize = 65_534;

// --- CSS Selectors (Lazy Static) ---
static TABLE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("table").expect("Failed to compile TABLE_SELECTOR")
});

// --- Data Structures ---
#[derive(Debug, Clone)]
struct RawCell {
    text: Option<String>,
    is_header: bool,
    colspan: usize,
    rowspan: usize,
}

type RawRow = Vec<RawCell>;

/// Header and body rows of one `<table>`, split but not yet grid-aligned.
#[derive(Debug, Default)]
struct TableSections {
    header: Vec<RawRow>,
    body: Vec<RawRow>,
}

// --- Entry Point ---

/// Parses every `<table>` in `html` into a column-major [`WebTable`].
///
/// Header rows come from `<thead>`, or failing that from leading rows made only of
/// `<th>` cells. Spanned cells are repeated into each slot they cover. Tables without
/// any cells are skipped; a page without any usable table is an error.
pub fn extract_tables(html: &str) -> Result<Vec<WebTable>, ExtractError> {
    let document = Html::parse_document(html);
    if !document.errors.is_empty() {
        tracing::debug!("HTML parser recovered from {} errors", document.errors.len());
    }

    let tables: Vec<WebTable> = document
        .select(&TABLE_SELECTOR)
        .filter_map(|table| build_table(collect_sections(table)))
        .collect();

    if tables.is_empty() {
        return Err(ExtractError::NoTables);
    }

    tracing::info!("Extracted {} tables", tables.len());
    Ok(tables)
}

// --- Helper Functions ---

/// Walks only this table's own rows; rows of nested tables belong to those tables.
fn collect_sections(table: ElementRef) -> TableSections {
    let mut sections = TableSections::default();
    let mut has_thead = false;

    for child in table.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "thead" => {
                has_thead = true;
                sections.header.extend(rows_of(child));
            }
            "tbody" | "tfoot" => sections.body.extend(rows_of(child)),
            "tr" => sections.body.push(cells_of(child)),
            _ => {} // caption, colgroup
        }
    }

    sections.body.retain(|row| !row.is_empty());

    if !has_thead {
        // Leading all-<th> rows act as the header
        let leading = sections
            .body
            .iter()
            .take_while(|row| row.iter().all(|cell| cell.is_header))
            .count();
        sections.header = sections.body.drain(..leading).collect();
    }

    sections
}

fn rows_of(section: ElementRef) -> Vec<RawRow> {
    section
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "tr")
        .map(cells_of)
        .collect()
}

fn cells_of(row: ElementRef) -> RawRow {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter_map(|cell| {
            let is_header = match cell.value().name() {
                "th" => true,
                "td" => false,
                _ => return None,
            };
            Some(RawCell {
                text: cell_text(cell),
                is_header,
                colspan: span_attr(cell, "colspan", MAX_COLSPAN),
                rowspan: span_attr(cell, "rowspan", MAX_ROWSPAN),
            })
        })
        .collect()
}

/// Whitespace-collapsed cell text; empty cells are `None`.
fn cell_text(cell: ElementRef) -> Option<String> {
    let text = cell
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ");
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn span_attr(cell: ElementRef, name: &str, max: usize) -> usize {
    cell.value()
        .attr(name)
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(1)
        .clamp(1, max)
}

/// Lays rows out on a grid, copying colspan/rowspan cells into every slot they cover.
fn expand_spans(rows: &[RawRow]) -> Vec<Vec<Option<String>>> {
    // Per column: rows still covered by a rowspan above, and the text to repeat
    let mut carried: Vec<(usize, Option<String>)> = Vec::new();
    let mut grid = Vec::with_capacity(rows.len());

    for row in rows {
        let mut line: Vec<Option<String>> = Vec::new();
        let mut cells = row.iter();
        let mut col = 0;

        loop {
            if let Some((remaining, text)) = carried.get_mut(col) {
                if *remaining > 0 {
                    *remaining -= 1;
                    line.push(text.clone());
                    col += 1;
                    continue;
                }
            }

            let Some(cell) = cells.next() else { break };
            for _ in 0..cell.colspan {
                if carried.len() <= col {
                    carried.resize(col + 1, (0, None));
                }
                carried[col] = (cell.rowspan - 1, cell.text.clone());
                line.push(cell.text.clone());
                col += 1;
            }
        }

        // Rowspans reaching past this row's last cell
        while col < carried.len() {
            let (remaining, text) = &mut carried[col];
            if *remaining > 0 {
                *remaining -= 1;
                line.push(text.clone());
            } else {
                line.push(None);
            }
            col += 1;
        }

        grid.push(line);
    }

    grid
}

fn build_table(sections: TableSections) -> Option<WebTable> {
    let header = expand_spans(&sections.header);
    let body = expand_spans(&sections.body);

    let width = header.iter().chain(body.iter()).map(Vec::len).max().unwrap_or(0);
    if width == 0 {
        return None;
    }

    let names = dedupe_names(column_names(&header, width));
    let columns = names
        .into_iter()
        .enumerate()
        .map(|(col, name)| TableColumn {
            name,
            cells: body
                .iter()
                .map(|row| row.get(col).cloned().flatten())
                .collect(),
        })
        .collect();

    Some(WebTable { columns })
}

/// Joins the distinct labels stacked above each column; unlabeled columns get their index.
fn column_names(header: &[Vec<Option<String>>], width: usize) -> Vec<String> {
    if header.is_empty() {
        return (0..width).map(|col| col.to_string()).collect();
    }

    (0..width)
        .map(|col| {
            let mut labels: Vec<&str> = Vec::new();
            for row in header {
                if let Some(Some(label)) = row.get(col) {
                    if labels.last() != Some(&label.as_str()) {
                        labels.push(label);
                    }
                }
            }
            if labels.is_empty() {
                format!("Unnamed: {}", col)
            } else {
                labels.join(" ")
            }
        })
        .collect()
}

/// Repeated names become `name`, `name.1`, `name.2`, ...
fn dedupe_names(names: Vec<String>) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    names
        .into_iter()
        .map(|name| {
            let mut unique = name.clone();
            // A suffixed name may itself collide with a real header
            while taken.contains(&unique) {
                let count = counts.entry(name.clone()).or_insert(0);
                *count += 1;
                unique = format!("{}.{}", name, count);
            }
            taken.insert(unique.clone());
            unique
        })
        .collect()
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn single_table(html: &str) -> serde_json::Value {
        let tables = extract_tables(html).expect("extraction failed");
        assert_eq!(tables.len(), 1, "expected exactly one table");
        serde_json::to_value(&tables[0]).unwrap()
    }

    #[test]
    fn simple_table_with_th_header() {
        let html = r#"
            <html><body>
            <h1>People</h1>
            <table>
              <tr><th>Name</th><th>Age</th></tr>
              <tr><td>Alice</td><td>30</td></tr>
            </table>
            </body></html>
        "#;
        assert_eq!(
            single_table(html),
            json!({"Name": {"0": "Alice"}, "Age": {"0": "30"}})
        );
    }

    #[test]
    fn columns_keep_document_order() {
        let html = "<table><tr><th>Zeta</th><th>Alpha</th></tr><tr><td>1</td><td>2</td></tr></table>";
        let tables = extract_tables(html).unwrap();
        let encoded = serde_json::to_string(&tables[0]).unwrap();
        assert_eq!(encoded, r#"{"Zeta":{"0":"1"},"Alpha":{"0":"2"}}"#);
    }

    #[test]
    fn thead_rows_define_the_header() {
        let html = r#"
            <table>
              <thead><tr><td>City</td><td>Population</td></tr></thead>
              <tbody>
                <tr><td>Oslo</td><td>700000</td></tr>
                <tr><td>Bergen</td><td>290000</td></tr>
              </tbody>
            </table>
        "#;
        assert_eq!(
            single_table(html),
            json!({
                "City": {"0": "Oslo", "1": "Bergen"},
                "Population": {"0": "700000", "1": "290000"}
            })
        );
    }

    #[test]
    fn headerless_table_uses_positional_names() {
        let html = "<table><tr><td>a</td><td>b</td></tr><tr><td>c</td><td>d</td></tr></table>";
        assert_eq!(
            single_table(html),
            json!({"0": {"0": "a", "1": "c"}, "1": {"0": "b", "1": "d"}})
        );
    }

    #[test]
    fn spans_are_expanded_into_every_slot() {
        let html = r#"
            <table>
              <tr><th>Region</th><th>Q1</th><th>Q2</th></tr>
              <tr><td rowspan="2">North</td><td>1</td><td>2</td></tr>
              <tr><td>3</td><td>4</td></tr>
              <tr><td colspan="3">Total pending</td></tr>
            </table>
        "#;
        assert_eq!(
            single_table(html),
            json!({
                "Region": {"0": "North", "1": "North", "2": "Total pending"},
                "Q1": {"0": "1", "1": "3", "2": "Total pending"},
                "Q2": {"0": "2", "1": "4", "2": "Total pending"}
            })
        );
    }

    #[test]
    fn stacked_headers_are_joined() {
        let html = r#"
            <table>
              <thead>
                <tr><th rowspan="2">Item</th><th colspan="2">Price</th></tr>
                <tr><th>Net</th><th>Gross</th></tr>
              </thead>
              <tr><td>Tea</td><td>2</td><td>2.5</td></tr>
            </table>
        "#;
        assert_eq!(
            single_table(html),
            json!({
                "Item": {"0": "Tea"},
                "Price Net": {"0": "2"},
                "Price Gross": {"0": "2.5"}
            })
        );
    }

    #[test]
    fn ragged_rows_and_empty_cells_become_null() {
        let html = r#"
            <table>
              <tr><th>A</th><th>B</th><th></th></tr>
              <tr><td>1</td></tr>
              <tr><td>  </td><td>x   y</td><td>z</td></tr>
            </table>
        "#;
        assert_eq!(
            single_table(html),
            json!({
                "A": {"0": "1", "1": null},
                "B": {"0": null, "1": "x y"},
                "Unnamed: 2": {"0": null, "1": "z"}
            })
        );
    }

    #[test]
    fn duplicate_column_names_are_suffixed() {
        assert_eq!(
            dedupe_names(vec!["x".into(), "x".into(), "y".into(), "x".into()]),
            vec!["x", "x.1", "y", "x.2"]
        );
        assert_eq!(
            dedupe_names(vec!["x".into(), "x".into(), "x.1".into()]),
            vec!["x", "x.1", "x.1.1"]
        );
        assert_eq!(
            dedupe_names(vec!["x.1".into(), "x".into(), "x".into()]),
            vec!["x.1", "x", "x.2"]
        );
    }

    #[test]
    fn nested_tables_are_separate() {
        let html = r#"
            <table>
              <tr><th>Outer</th></tr>
              <tr><td><table><tr><th>Inner</th></tr><tr><td>deep</td></tr></table></td></tr>
            </table>
        "#;
        let tables = extract_tables(html).unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(
            serde_json::to_value(&tables[1]).unwrap(),
            json!({"Inner": {"0": "deep"}})
        );
        assert_eq!(tables[0].columns.len(), 1);
        assert_eq!(tables[0].columns[0].name, "Outer");
    }

    #[test]
    fn header_only_table_has_empty_columns() {
        let html = "<table><tr><th>Only</th></tr></table>";
        assert_eq!(single_table(html), json!({"Only": {}}));
    }

    #[test]
    fn page_without_tables_is_an_error() {
        let err = extract_tables("<html><body><p>nothing here</p></body></html>").unwrap_err();
        assert!(matches!(err, ExtractError::NoTables));

        let err = extract_tables("<table></table>").unwrap_err();
        assert!(matches!(err, ExtractError::NoTables));
    }
}
