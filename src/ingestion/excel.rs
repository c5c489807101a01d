#![cfg(feature = "excel")]

use std::collections::HashSet;
use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

use crate::error::{IngestionError, IngestionResult};
use crate::types::{Cell, Column, DataType, Table, Value};

use super::unified::ExcelSheetSelection;

const NANOS_PER_DAY: f64 = 86_400_000_000_000.0;

/// Decode an `.xls` or `.xlsx` workbook into a [`Table`].
///
/// Behavior:
/// - The first non-empty row of each sheet is the header row
/// - Cells keep their native kind (numbers, booleans, dates, durations, text); empty and error
///   cells are missing
/// - Whole-number floats are read as integers
/// - A column whose non-missing cells share one kind is tagged with it, otherwise `Mixed`
/// - With several sheets selected, every sheet must have the same header and rows are
///   concatenated in sheet order
pub fn decode_excel(bytes: &[u8], selection: &ExcelSheetSelection) -> IngestionResult<Table> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;

    let sheets: Vec<String> = match selection {
        ExcelSheetSelection::First => workbook.sheet_names().into_iter().take(1).collect(),
        ExcelSheetSelection::Sheet(name) => vec![name.clone()],
        ExcelSheetSelection::AllSheets => workbook.sheet_names(),
        ExcelSheetSelection::Sheets(names) => names.clone(),
    };
    if sheets.is_empty() {
        return Err(IngestionError::Malformed {
            message: "workbook has no sheets".to_string(),
        });
    }

    let mut headers: Option<Vec<String>> = None;
    let mut columns: Vec<Vec<Cell>> = Vec::new();
    for sheet in &sheets {
        let range = workbook.worksheet_range(sheet)?;
        let (sheet_headers, sheet_columns) = decode_sheet(&range)
            .map_err(|e| with_sheet(sheet, e))?;
        match &headers {
            None => {
                headers = Some(sheet_headers);
                columns = sheet_columns;
            }
            Some(expected) if *expected == sheet_headers => {
                for (acc, mut more) in columns.iter_mut().zip(sheet_columns) {
                    acc.append(&mut more);
                }
            }
            Some(expected) => {
                return Err(IngestionError::Malformed {
                    message: format!(
                        "sheet '{sheet}' headers {sheet_headers:?} differ from {expected:?}"
                    ),
                });
            }
        }
    }

    let columns = headers
        .unwrap_or_default()
        .into_iter()
        .zip(columns)
        .map(|(name, values)| {
            let data_type = column_type(&values);
            Column::new(name, data_type, values)
        })
        .collect();
    Ok(Table::new(columns)?)
}

fn with_sheet(sheet: &str, err: IngestionError) -> IngestionError {
    match err {
        IngestionError::Malformed { message } => IngestionError::Malformed {
            message: format!("sheet '{sheet}': {message}"),
        },
        other => other,
    }
}

fn decode_sheet(range: &Range<Data>) -> IngestionResult<(Vec<String>, Vec<Vec<Cell>>)> {
    let mut rows = range
        .rows()
        .skip_while(|row| row.iter().all(|c| matches!(c, Data::Empty)));

    let header_row = rows.next().ok_or_else(|| IngestionError::Malformed {
        message: "sheet has no non-empty rows (no header row found)".to_string(),
    })?;
    let headers: Vec<String> = header_row
        .iter()
        .enumerate()
        .map(|(idx, c)| match header_text(c) {
            text if text.trim().is_empty() => format!("Unnamed: {idx}"),
            text => text.trim().to_string(),
        })
        .collect();

    let mut seen = HashSet::with_capacity(headers.len());
    for name in &headers {
        if !seen.insert(name.as_str()) {
            return Err(IngestionError::Malformed {
                message: format!("duplicate header '{name}'"),
            });
        }
    }

    let mut columns: Vec<Vec<Cell>> = vec![Vec::new(); headers.len()];
    for row in rows {
        for (idx, values) in columns.iter_mut().enumerate() {
            values.push(row.get(idx).and_then(convert_cell));
        }
    }
    Ok((headers, columns))
}

fn header_text(c: &Data) -> String {
    match c {
        Data::String(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 => (*f as i64).to_string(),
        Data::Empty | Data::Error(_) => String::new(),
        other => other.to_string(),
    }
}

fn convert_cell(c: &Data) -> Cell {
    match c {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) if s.is_empty() => None,
        Data::String(s) => Some(Value::Utf8(s.clone())),
        Data::Int(i) => Some(Value::Int64(*i)),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Some(Value::Int64(*f as i64)),
        Data::Float(f) => Some(Value::Float64(*f)),
        Data::Bool(b) => Some(Value::Bool(*b)),
        Data::DateTime(dt) if dt.is_duration() => {
            Some(Value::Duration(serial_to_duration(dt.as_f64())))
        }
        Data::DateTime(dt) => serial_to_datetime(dt.as_f64()).map(Value::DateTime),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(Value::Utf8(s.clone())),
    }
}

/// Excel serial day numbers count from 1899-12-30 in the 1900 date system.
fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    epoch.checked_add_signed(serial_to_duration(serial))
}

fn serial_to_duration(serial: f64) -> TimeDelta {
    TimeDelta::nanoseconds((serial * NANOS_PER_DAY).round() as i64)
}

fn column_type(values: &[Cell]) -> DataType {
    let mut kinds = values.iter().flatten().map(Value::data_type);
    match kinds.next() {
        None => DataType::Utf8,
        Some(first) if kinds.all(|k| k == first) => first,
        Some(_) => DataType::Mixed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_dates_use_the_1900_system() {
        let dt = serial_to_datetime(45_000.5).unwrap();
        assert_eq!(
            dt,
            NaiveDate::from_ymd_opt(2023, 3, 15)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn whole_floats_read_as_integers() {
        assert_eq!(convert_cell(&Data::Float(3.0)), Some(Value::Int64(3)));
        assert_eq!(convert_cell(&Data::Float(3.5)), Some(Value::Float64(3.5)));
        assert_eq!(convert_cell(&Data::Empty), None);
    }

    #[test]
    fn column_type_is_homogeneous_or_mixed() {
        assert_eq!(
            column_type(&[Some(Value::Int64(1)), None, Some(Value::Int64(2))]),
            DataType::Int64
        );
        assert_eq!(
            column_type(&[Some(Value::Int64(1)), Some(Value::text("a"))]),
            DataType::Mixed
        );
        assert_eq!(column_type(&[None, None]), DataType::Utf8);
    }
}
