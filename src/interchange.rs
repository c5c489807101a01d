//! Table ⇄ JSON interchange.
//!
//! The JSON form carries the schema next to ordered records:
//!
//! ```json
//! {"schema":{"fields":[{"name":"id","type":"int64"}]},"data":[{"id":1},{"id":null}]}
//! ```
//!
//! Records keep column order. Datetimes are ISO-8601 text, durations are canonical duration text
//! (`D days HH:MM:SS`), and missing cells and non-finite floats are `null`. Reading back uses the
//! schema to restore each cell's type; `mixed` and `categorical` columns restore cells from
//! their JSON kind, so temporal cells inside them come back as text.

use chrono::NaiveDateTime;
use serde_json::{json, Map, Number, Value as Json};

use crate::error::InterchangeError;
use crate::inference::coerce::parse_duration;
use crate::types::{format_duration, Cell, Column, DataType, Schema, Table, Value};

const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Serialize `table` into the interchange form.
pub fn table_to_json(table: &Table) -> Json {
    let columns = table.columns();
    let data: Vec<Json> = (0..table.row_count())
        .map(|row| {
            let mut record = Map::with_capacity(columns.len());
            for col in columns {
                record.insert(col.name.clone(), cell_to_json(&col.values[row]));
            }
            Json::Object(record)
        })
        .collect();
    json!({
        "schema": schema_to_json(&table.schema()),
        "data": data,
    })
}

/// [`table_to_json`] rendered as a compact string.
pub fn table_to_json_string(table: &Table) -> String {
    table_to_json(table).to_string()
}

/// Rebuild a table from the interchange form.
pub fn table_from_json(doc: &Json) -> Result<Table, InterchangeError> {
    let schema_doc = doc.get("schema").ok_or_else(|| malformed("missing 'schema'"))?;
    let schema: Schema = serde_json::from_value(schema_doc.clone())?;
    let data = doc
        .get("data")
        .and_then(Json::as_array)
        .ok_or_else(|| malformed("missing 'data' array"))?;

    let mut columns: Vec<Vec<Cell>> = vec![Vec::with_capacity(data.len()); schema.fields.len()];
    for (row, record) in data.iter().enumerate() {
        let record = record
            .as_object()
            .ok_or_else(|| malformed(format!("record {row} is not an object")))?;
        for (field, values) in schema.fields.iter().zip(columns.iter_mut()) {
            let cell = match record.get(&field.name) {
                None | Some(Json::Null) => None,
                Some(v) => Some(json_to_value(v, field.data_type).ok_or_else(|| {
                    malformed(format!(
                        "record {row}: value {v} is not a valid {} for column '{}'",
                        field.data_type, field.name
                    ))
                })?),
            };
            values.push(cell);
        }
    }

    let columns = schema
        .fields
        .into_iter()
        .zip(columns)
        .map(|(field, values)| Column::new(field.name, field.data_type, values))
        .collect();
    Ok(Table::new(columns)?)
}

/// Parse the string form produced by [`table_to_json_string`].
pub fn table_from_json_str(s: &str) -> Result<Table, InterchangeError> {
    let doc: Json = serde_json::from_str(s)?;
    table_from_json(&doc)
}

fn malformed(message: impl Into<String>) -> InterchangeError {
    InterchangeError::Malformed {
        message: message.into(),
    }
}

fn schema_to_json(schema: &Schema) -> Json {
    let fields: Vec<Json> = schema
        .fields
        .iter()
        .map(|f| json!({ "name": f.name, "type": f.data_type.as_str() }))
        .collect();
    json!({ "fields": fields })
}

fn cell_to_json(cell: &Cell) -> Json {
    match cell {
        None => Json::Null,
        Some(Value::Int64(i)) => Json::from(*i),
        Some(Value::Float64(f)) => Number::from_f64(*f).map_or(Json::Null, Json::Number),
        Some(Value::Bool(b)) => Json::Bool(*b),
        Some(Value::Utf8(s)) => Json::String(s.clone()),
        Some(Value::DateTime(dt)) => Json::String(dt.format(ISO_FORMAT).to_string()),
        Some(Value::Duration(d)) => Json::String(format_duration(*d)),
    }
}

fn json_to_value(v: &Json, data_type: DataType) -> Option<Value> {
    match data_type {
        DataType::Int64 => v.as_i64().map(Value::Int64),
        DataType::Float64 => v.as_f64().map(Value::Float64),
        DataType::Bool => v.as_bool().map(Value::Bool),
        DataType::Utf8 => v.as_str().map(Value::text),
        DataType::DateTime => v
            .as_str()
            .and_then(|s| NaiveDateTime::parse_from_str(s, ISO_FORMAT).ok())
            .map(Value::DateTime),
        DataType::Duration => v
            .as_str()
            .and_then(|s| parse_duration(s).ok())
            .map(Value::Duration),
        DataType::Categorical | DataType::Mixed => match v {
            Json::Bool(b) => Some(Value::Bool(*b)),
            Json::Number(n) => n
                .as_i64()
                .map(Value::Int64)
                .or_else(|| n.as_f64().map(Value::Float64)),
            Json::String(s) => Some(Value::Utf8(s.clone())),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeDelta};

    fn sample() -> Table {
        let when = NaiveDate::from_ymd_opt(2012, 11, 10)
            .unwrap()
            .and_hms_milli_opt(8, 30, 0, 250)
            .unwrap();
        Table::new(vec![
            Column::new("id", DataType::Int64, vec![Some(Value::Int64(1)), None]),
            Column::new(
                "score",
                DataType::Float64,
                vec![Some(Value::Float64(f64::NAN)), Some(Value::Float64(2.5))],
            ),
            Column::new(
                "when",
                DataType::DateTime,
                vec![Some(Value::DateTime(when)), None],
            ),
            Column::new(
                "took",
                DataType::Duration,
                vec![None, Some(Value::Duration(TimeDelta::minutes(90)))],
            ),
            Column::new(
                "tag",
                DataType::Categorical,
                vec![Some(Value::text("a")), Some(Value::text("b"))],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn records_keep_column_order_and_render_temporal_text() {
        let doc = table_to_json(&sample());
        let first = doc["data"][0].as_object().unwrap();
        let keys: Vec<&str> = first.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "score", "when", "took", "tag"]);
        assert_eq!(first["score"], Json::Null);
        assert_eq!(first["when"], json!("2012-11-10T08:30:00.250"));
        assert_eq!(doc["data"][1]["took"], json!("0 days 01:30:00"));
        assert_eq!(doc["schema"]["fields"][3], json!({"name": "took", "type": "duration"}));
    }

    #[test]
    fn roundtrip_restores_types() {
        let table = sample();
        let back = table_from_json_str(&table_to_json_string(&table)).unwrap();
        assert_eq!(back.schema(), table.schema());
        assert_eq!(back.column("when"), table.column("when"));
        assert_eq!(back.column("took"), table.column("took"));
        // NaN is written as null
        assert_eq!(back.column("score").unwrap().values[0], None);
    }

    #[test]
    fn rejects_values_that_do_not_match_the_schema() {
        let doc = json!({
            "schema": {"fields": [{"name": "id", "type": "int64"}]},
            "data": [{"id": "one"}]
        });
        assert!(matches!(
            table_from_json(&doc),
            Err(InterchangeError::Malformed { .. })
        ));
        assert!(table_from_json(&json!({"data": []})).is_err());
    }
}
