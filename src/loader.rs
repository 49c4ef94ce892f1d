//! ISSN list loading from an uploaded CSV.
//!
//! The upload must carry a header row with a column named exactly `issn`.
//! Values are taken as-is, in row order: no trimming, no deduplication, no
//! format validation. Blank and malformed entries pass through unchanged.

use crate::error::{HarvestError, Result};
use tracing::info;

/// Name of the required header column.
const ISSN_COLUMN: &str = "issn";

/// Read the ordered ISSN list from uploaded CSV bytes.
///
/// Returns an [`HarvestError::Input`] when the `issn` column is absent.
/// A row too short to reach the column yields an empty string.
pub fn read_issn_list(data: &[u8]) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(data);

    let headers = reader.headers()?.clone();
    let column = headers
        .iter()
        .position(|h| h == ISSN_COLUMN)
        .ok_or_else(|| {
            HarvestError::Input(format!("upload has no \"{}\" column", ISSN_COLUMN))
        })?;

    let mut issns = Vec::new();
    for record in reader.records() {
        let record = record?;
        issns.push(record.get(column).unwrap_or("").to_string());
    }

    info!(count = issns.len(), "Loaded ISSN list");
    Ok(issns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_in_order_with_duplicates_and_blanks() {
        let data = b"issn\n1234-5678\n\n1234-5678\nnot-an-issn\n";
        let issns = read_issn_list(data).expect("valid upload");
        assert_eq!(issns, vec!["1234-5678", "", "1234-5678", "not-an-issn"]);
    }

    #[test]
    fn test_issn_column_position_does_not_matter() {
        let data = b"journal,issn\nNature,0028-0836\nScience,0036-8075\n";
        let issns = read_issn_list(data).expect("valid upload");
        assert_eq!(issns, vec!["0028-0836", "0036-8075"]);
    }

    #[test]
    fn test_missing_column_is_an_input_error() {
        let data = b"journal\nNature\n";
        let err = read_issn_list(data).expect_err("no issn column");
        assert!(matches!(err, HarvestError::Input(_)));
    }

    #[test]
    fn test_column_name_is_exact() {
        let data = b"ISSN\n1234-5678\n";
        assert!(read_issn_list(data).is_err());
    }

    #[test]
    fn test_short_row_yields_empty_string() {
        let data = b"journal,issn\nNature,0028-0836\nScience\n";
        let issns = read_issn_list(data).expect("valid upload");
        assert_eq!(issns, vec!["0028-0836", ""]);
    }

    #[test]
    fn test_header_only_upload_is_empty() {
        let issns = read_issn_list(b"issn\n").expect("valid upload");
        assert!(issns.is_empty());
    }
}
