//! CSV decode.

use std::collections::HashSet;
use std::io::Read;

use crate::error::{IngestionError, IngestionResult};
use crate::types::{Cell, Column, DataType, Table, Value};

/// Decode CSV bytes into a [`Table`] of raw text columns.
///
/// Rules:
///
/// - The first record is the header row and must be present.
/// - Header names must be unique.
/// - Empty fields become missing cells; everything else is kept verbatim as text.
/// - Every record must have as many fields as the header.
pub fn decode_csv(bytes: &[u8]) -> IngestionResult<Table> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);
    decode_csv_from_reader(&mut rdr)
}

/// Decode CSV data from an existing CSV reader.
pub fn decode_csv_from_reader<R: Read>(rdr: &mut csv::Reader<R>) -> IngestionResult<Table> {
    let headers = rdr.headers()?.clone();
    if headers.is_empty() {
        return Err(IngestionError::Malformed {
            message: "csv has no header row".to_string(),
        });
    }

    let mut seen = HashSet::with_capacity(headers.len());
    for name in headers.iter() {
        if !seen.insert(name) {
            return Err(IngestionError::Malformed {
                message: format!("duplicate header '{name}'"),
            });
        }
    }

    let mut columns: Vec<Vec<Cell>> = vec![Vec::new(); headers.len()];
    for result in rdr.records() {
        let record = result?;
        for (idx, values) in columns.iter_mut().enumerate() {
            let raw = record.get(idx).unwrap_or("");
            values.push(if raw.is_empty() {
                None
            } else {
                Some(Value::Utf8(raw.to_owned()))
            });
        }
    }

    let columns = headers
        .iter()
        .zip(columns)
        .map(|(name, values)| Column::new(name, DataType::Utf8, values))
        .collect();
    Ok(Table::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_fields_become_missing() {
        let table = decode_csv(b"a,b\n1,\n,x\n").unwrap();
        assert_eq!(table.row_count(), 2);
        let a = table.column("a").unwrap();
        assert_eq!(a.data_type, DataType::Utf8);
        assert_eq!(a.values, vec![Some(Value::text("1")), None]);
        assert_eq!(
            table.column("b").unwrap().values,
            vec![None, Some(Value::text("x"))]
        );
    }

    #[test]
    fn header_only_gives_empty_columns() {
        let table = decode_csv(b"a,b\n").unwrap();
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.row_count(), 0);
    }

    #[test]
    fn rejects_missing_and_duplicate_headers() {
        assert!(matches!(
            decode_csv(b""),
            Err(IngestionError::Malformed { .. })
        ));
        assert!(matches!(
            decode_csv(b"a,a\n1,2\n"),
            Err(IngestionError::Malformed { .. })
        ));
    }

    #[test]
    fn ragged_records_are_csv_errors() {
        assert!(matches!(
            decode_csv(b"a,b\n1,2,3\n"),
            Err(IngestionError::Csv(_))
        ));
    }

    #[test]
    fn quoted_fields_keep_their_text() {
        let table = decode_csv(b"n\n\"1,000\"\n").unwrap();
        assert_eq!(
            table.column("n").unwrap().values,
            vec![Some(Value::text("1,000"))]
        );
    }
}
