//! Structured `<table>` extraction, independent of the extraction strategy
//! layer (always runs, mirroring `links`/`media`).

use crate::result::ExtractedTable;
use scraper::{Html, Selector};

pub fn extract(html: &str) -> Vec<ExtractedTable> {
    let document = Html::parse_document(html);
    let table_selector = Selector::parse("table").unwrap();
    let row_selector = Selector::parse("tr").unwrap();
    let cell_selector = Selector::parse("td, th").unwrap();
    let caption_selector = Selector::parse("caption").unwrap();

    let mut tables = Vec::new();
    for table_el in document.select(&table_selector) {
        let caption = table_el
            .select(&caption_selector)
            .next()
            .map(|c| c.text().collect::<Vec<_>>().join("").trim().to_string());

        let mut rows: Vec<Vec<String>> = Vec::new();
        for row_el in table_el.select(&row_selector) {
            let cells: Vec<String> = row_el
                .select(&cell_selector)
                .map(|c| c.text().collect::<Vec<_>>().join("").trim().to_string())
                .collect();
            if !cells.is_empty() {
                rows.push(cells);
            }
        }

        let headers = rows.first().cloned().unwrap_or_default();
        let body_rows = if rows.is_empty() { Vec::new() } else { rows[1..].to_vec() };

        tables.push(ExtractedTable {
            headers,
            rows: body_rows,
            caption,
        });
    }
    tables
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_headers_and_rows() {
        let html = "<table><tr><th>Name</th><th>Price</th></tr><tr><td>BTC</td><td>28000</td></tr></table>";
        let tables = extract(html);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].headers, vec!["Name", "Price"]);
        assert_eq!(tables[0].rows, vec![vec!["BTC".to_string(), "28000".to_string()]]);
    }
}
