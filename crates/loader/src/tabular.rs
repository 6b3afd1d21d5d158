use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use serde_json::{Map, Value};

use shared::domain::PaperRecord;

/// Parses comma-delimited text into paper records. The first row is the
/// header; each later row is zipped against it, so short rows leave their
/// trailing fields at the field defaults. Quoted cells may contain
/// delimiters and newlines, a doubled quote inside a quoted cell is a
/// literal quote.
pub fn parse_records(input: &str) -> Result<Vec<PaperRecord>> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_reader(input.as_bytes());

    let header = reader
        .headers()
        .context("tabular input has no header row")?
        .clone();
    if header.is_empty() {
        bail!("tabular input has no header row");
    }

    let mut papers = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = row.with_context(|| format!("row {} is malformed", index + 2))?;
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let mut object = Map::new();
        for (column, cell) in header.iter().zip(row.iter()) {
            object.insert(column.to_string(), Value::String(cell.to_string()));
        }

        let record: PaperRecord = serde_json::from_value(Value::Object(object))
            .with_context(|| format!("row {} is not a valid paper record", index + 2))?;
        papers.push(record);
    }
    Ok(papers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_rows_into_records() {
        let papers = parse_records("id,title\n1,alpha\n2,beta\n").expect("records");
        assert_eq!(papers.len(), 2);
        assert_eq!(papers[0].id, "1");
        assert_eq!(papers[0].title, "alpha");
        assert_eq!(papers[1].id, "2");
        assert_eq!(papers[1].title, "beta");
    }

    #[test]
    fn quoted_cells_keep_delimiters_and_escaped_quotes() {
        let papers =
            parse_records("id,title\n1,\"a, \"\"quoted\"\" title\"\n").expect("records");
        assert_eq!(papers[0].title, "a, \"quoted\" title");
    }

    #[test]
    fn handles_crlf_and_skips_blank_lines() {
        let papers = parse_records("id,title\r\n\r\n1,alpha\r\n").expect("records");
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].title, "alpha");
    }

    #[test]
    fn records_coerce_numeric_strings() {
        let papers =
            parse_records("id,title,readers,area\n17,alpha,42,Ecology\n").expect("records");
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].id, "17");
        assert_eq!(papers[0].readers, 42.0);
        assert_eq!(papers[0].area, "Ecology");
    }

    #[test]
    fn short_rows_leave_trailing_fields_defaulted() {
        let papers = parse_records("id,title,authors\n1,alpha\n").expect("records");
        assert_eq!(papers[0].authors, "");
    }

    #[test]
    fn header_only_input_yields_no_records() {
        let papers = parse_records("id,title,readers\n").expect("records");
        assert!(papers.is_empty());
    }

    #[test]
    fn missing_header_is_an_error() {
        assert!(parse_records("").is_err());
    }
}
