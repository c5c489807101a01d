use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use rust_data_cleaning::config::InferenceOptions;
use rust_data_cleaning::inference::infer_table;
use rust_data_cleaning::ingestion::{decode, decode_from_path, IngestionOptions, TabularFormat};
use rust_data_cleaning::types::{DataType, Value};

fn tmp_file(ext: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("rust-data-cleaning-csv-{nanos}.{ext}"))
}

const PEOPLE: &str = "\
id,name,joined,active,wait,team
1,Ada,10/11/2012,yes,1 day,red
2,Grace,11/11/2012,no,2 days,blue
3,Linus,12/11/2012,yes,01:30:00,red
4,Ken,13/11/2012,no,00:00:05,red
";

#[test]
fn decode_produces_raw_text_columns_in_header_order() {
    let table = decode(PEOPLE.as_bytes(), TabularFormat::Csv, &IngestionOptions::default()).unwrap();
    let names: Vec<String> = table.schema().field_names().map(str::to_string).collect();
    assert_eq!(names, vec!["id", "name", "joined", "active", "wait", "team"]);
    assert!(table.columns().iter().all(|c| c.data_type == DataType::Utf8));
    assert_eq!(table.column("name").unwrap().values[3], Some(Value::text("Ken")));
}

#[test]
fn decode_then_infer_types_every_column() {
    let raw = decode(PEOPLE.as_bytes(), TabularFormat::Csv, &IngestionOptions::default()).unwrap();
    let typed = infer_table(&raw, &InferenceOptions::default());

    let types: Vec<DataType> = typed.columns().iter().map(|c| c.data_type).collect();
    assert_eq!(
        types,
        vec![
            DataType::Int64,
            DataType::Utf8,
            DataType::DateTime,
            DataType::Bool,
            DataType::Duration,
            // 2 distinct of 4 = 0.5, not under the categorical threshold
            DataType::Utf8,
        ]
    );
    assert_eq!(typed.row_count(), 4);
}

#[test]
fn decode_from_path_uses_extension() {
    let path = tmp_file("csv");
    std::fs::write(&path, PEOPLE).unwrap();

    let table = decode_from_path(&path, &IngestionOptions::default()).unwrap();
    assert_eq!(table.row_count(), 4);
    assert_eq!(table.column_count(), 6);

    let _ = std::fs::remove_file(&path);
}
