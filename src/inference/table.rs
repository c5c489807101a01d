use crate::config::InferenceOptions;
use crate::types::Table;

use super::column::infer_column;

/// Infer every column of `table` one after another on the calling thread.
///
/// Produces exactly what [`crate::execution::ExecutionEngine::infer_table`] produces; use it
/// for small tables or when a worker pool is not wanted.
pub fn infer_table(table: &Table, opts: &InferenceOptions) -> Table {
    let columns = table
        .columns()
        .iter()
        .map(|column| infer_column(column, opts))
        .collect();
    Table::from_columns_unchecked(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;

    #[test]
    fn preserves_column_order_and_row_count() {
        let table = Table::from_text_columns(vec![
            ("flag", vec![Some("yes"), Some("no"), Some("yes")]),
            ("n", vec![Some("1"), Some("2"), Some("3")]),
            ("name", vec![Some("ann"), Some("bob"), Some("cy")]),
        ])
        .unwrap();

        let out = infer_table(&table, &InferenceOptions::default());
        let names: Vec<_> = out.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["flag", "n", "name"]);
        assert_eq!(out.row_count(), 3);
        assert_eq!(out.columns()[0].data_type, DataType::Bool);
        assert_eq!(out.columns()[1].data_type, DataType::Int64);
        assert_eq!(out.columns()[2].data_type, DataType::Utf8);
    }
}
