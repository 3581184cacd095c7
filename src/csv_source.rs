//! CSV Source - parses an uploaded file into raw rows keyed by header

use crate::error::{CatalogError, Result};
use crate::record::RawRow;
use csv::ReaderBuilder;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Read every data row of the CSV file at `path`. An unreadable upload is an
/// input error.
pub fn read_rows(path: impl AsRef<Path>) -> Result<Vec<RawRow>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        CatalogError::Input(format!("cannot open upload {}: {}", path.display(), e))
    })?;
    parse_rows(file)
}

/// Parse CSV from any reader. Headers are trimmed; a row shorter than the
/// header simply lacks the trailing fields. Cells are kept verbatim.
pub fn parse_rows<R: Read>(reader: R) -> Result<Vec<RawRow>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect::<Vec<_>>();

    let mut out = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let mut row = RawRow::new();

        for (idx, header) in headers.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            if let Some(cell) = record.get(idx) {
                row.insert(header.clone(), cell.to_string());
            }
        }

        if !row.is_empty() {
            out.push(row);
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_keyed_by_trimmed_header() {
        let csv = "style_code, MRP ,Brick\nA1,799,Shirt\nA2,599,Jeans\n";
        let rows = parse_rows(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("MRP").map(String::as_str), Some("799"));
        assert_eq!(rows[1].get("Brick").map(String::as_str), Some("Jeans"));
    }

    #[test]
    fn test_short_rows_omit_missing_fields() {
        let csv = "a,b,c\n1,2\n1,2,3\n";
        let rows = parse_rows(csv.as_bytes()).unwrap();
        assert!(!rows[0].contains_key("c"));
        assert_eq!(rows[1].get("c").map(String::as_str), Some("3"));
    }

    #[test]
    fn test_header_only_file_has_no_rows() {
        let rows = parse_rows("a,b\n".as_bytes()).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_invalid_utf8_is_an_error() {
        let bytes: &[u8] = b"a,b\n\xff\xfe,1\n";
        assert!(parse_rows(bytes).is_err());
    }

    #[test]
    fn test_missing_upload_is_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_rows(dir.path().join("gone.csv")).unwrap_err();
        assert!(matches!(err, CatalogError::Input(_)));
        assert_eq!(err.status_code(), 400);
    }
}
