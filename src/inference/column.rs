use tracing::debug;

use crate::config::InferenceOptions;
use crate::types::{Column, DataType, Value};

use super::candidate::{best_candidate, Candidate, COMMIT_ORDER};
use super::coerce::DateParser;

/// Infer the semantic type of one column.
///
/// Never fails: when nothing fits, the input column comes back unchanged. The result always has
/// the same name, length and row order as the input.
///
/// 1. Columns tagged with a concrete type are returned as-is. `Utf8`/`Mixed` columns whose
///    non-missing cells are all of one native kind are retagged (ints and floats widen to
///    `Float64`).
/// 2. Otherwise the integer, boolean, date and duration attempts run in that order and the first
///    one under its threshold commits.
/// 3. Low-cardinality columns are tagged `Categorical`, values untouched.
/// 4. The candidate with the fewest missing cells commits if it is under
///    `fallback_max_missing`; otherwise the raw column is kept.
pub fn infer_column(column: &Column, opts: &InferenceOptions) -> Column {
    if column.is_empty() || !column.data_type.needs_refinement() {
        return column.clone();
    }

    match classify(column) {
        Native::Kind(data_type) => return retag(column, data_type),
        Native::AllMissing => return column.clone(),
        Native::NeedsRefinement => {}
    }

    let parser = DateParser::new(opts.day_first);
    let mut attempted = Vec::with_capacity(COMMIT_ORDER.len());
    for rule in &COMMIT_ORDER {
        let candidate = Candidate::attempt(rule, column, &parser);
        debug!(
            column = %column.name,
            candidate = %candidate.kind,
            missing = candidate.missing,
            rows = column.len(),
            "coercion attempt"
        );
        if candidate.missing_fraction() < (rule.threshold)(opts) {
            return candidate.into_column(column.name.clone());
        }
        attempted.push(candidate);
    }

    let cardinality = column.distinct_count() as f64 / column.len() as f64;
    if cardinality < opts.categorical_max_cardinality {
        debug!(column = %column.name, cardinality, "tagging as categorical");
        return Column::new(
            column.name.clone(),
            DataType::Categorical,
            column.values.clone(),
        );
    }

    match best_candidate(attempted) {
        Some(best) if best.missing_fraction() < opts.fallback_max_missing => {
            debug!(column = %column.name, candidate = %best.kind, "fallback candidate committed");
            best.into_column(column.name.clone())
        }
        _ => column.clone(),
    }
}

enum Native {
    Kind(DataType),
    AllMissing,
    NeedsRefinement,
}

fn classify(column: &Column) -> Native {
    let (mut ints, mut floats, mut others) = (false, false, None::<DataType>);
    let mut mixed_other = false;

    for value in column.values.iter().flatten() {
        match value {
            Value::Utf8(_) => return Native::NeedsRefinement,
            Value::Int64(_) => ints = true,
            Value::Float64(_) => floats = true,
            other => match others {
                None => others = Some(other.data_type()),
                Some(dt) if dt != other.data_type() => mixed_other = true,
                Some(_) => {}
            },
        }
    }

    match (ints, floats, others) {
        (false, false, None) => Native::AllMissing,
        (true, false, None) => Native::Kind(DataType::Int64),
        (_, true, None) => Native::Kind(DataType::Float64),
        (false, false, Some(dt)) if !mixed_other => Native::Kind(dt),
        _ => Native::NeedsRefinement,
    }
}

fn retag(column: &Column, data_type: DataType) -> Column {
    let values = column
        .values
        .iter()
        .map(|cell| match (data_type, cell) {
            (DataType::Float64, Some(Value::Int64(i))) => Some(Value::Float64(*i as f64)),
            _ => cell.clone(),
        })
        .collect();
    Column::new(column.name.clone(), data_type, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeDelta};

    fn text(values: &[&str]) -> Column {
        Column::from_text("c", values.iter().map(|s| Some(*s)))
    }

    fn infer(col: &Column) -> Column {
        infer_column(col, &InferenceOptions::default())
    }

    #[test]
    fn clean_integers_commit() {
        let out = infer(&text(&["1", "2", "1,000", "\"7\""]));
        assert_eq!(out.data_type, DataType::Int64);
        assert_eq!(
            out.values,
            vec![
                Some(Value::Int64(1)),
                Some(Value::Int64(2)),
                Some(Value::Int64(1000)),
                Some(Value::Int64(7))
            ]
        );
    }

    #[test]
    fn zero_one_columns_are_integers_first() {
        let out = infer(&text(&["0", "1", "1", "0"]));
        assert_eq!(out.data_type, DataType::Int64);
    }

    #[test]
    fn day_first_dates_commit() {
        let out = infer(&text(&["10/11/12", "01/02/2020", "2021-05-06"]));
        assert_eq!(out.data_type, DataType::DateTime);
        let expected = NaiveDate::from_ymd_opt(2012, 11, 10)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(out.values[0], Some(Value::DateTime(expected)));
    }

    #[test]
    fn durations_commit() {
        let out = infer(&text(&["2 days", "01:30:00", "45m"]));
        assert_eq!(out.data_type, DataType::Duration);
        assert_eq!(out.values[0], Some(Value::Duration(TimeDelta::days(2))));
    }

    #[test]
    fn oversized_clock_values_count_as_missing() {
        let col = text(&["99999999999999999999999999999999:00:00", "x"]);
        assert_eq!(infer(&col), col);

        let col = text(&[
            "99999999999999999999999999999999:00:00",
            "01:00:00",
            "02:00:00",
            "03:00:00",
        ]);
        let out = infer(&col);
        assert_eq!(out.data_type, DataType::Duration);
        assert_eq!(out.values[0], None);
        assert_eq!(out.values[1], Some(Value::Duration(TimeDelta::hours(1))));
    }

    #[test]
    fn native_ints_and_floats_widen() {
        let col = Column::new(
            "c",
            DataType::Mixed,
            vec![Some(Value::Int64(1)), None, Some(Value::Float64(2.5))],
        );
        let out = infer(&col);
        assert_eq!(out.data_type, DataType::Float64);
        assert_eq!(
            out.values,
            vec![Some(Value::Float64(1.0)), None, Some(Value::Float64(2.5))]
        );
    }

    #[test]
    fn concrete_columns_are_left_alone() {
        let col = Column::new("c", DataType::Categorical, vec![Some(Value::text("1"))]);
        assert_eq!(infer(&col), col);
    }

    #[test]
    fn all_missing_column_is_unchanged() {
        let col = Column::new("c", DataType::Utf8, vec![None, None]);
        assert_eq!(infer(&col), col);
    }

    #[test]
    fn high_missing_fallback_keeps_raw_column() {
        let col = text(&["a1", "b2", "c3", "d4", "5", "f6"]);
        let out = infer(&col);
        assert_eq!(out, col);
    }

    #[test]
    fn fallback_commits_best_candidate_under_ceiling() {
        // 7 of 10 parse as integers: over the integer threshold, under the fallback ceiling.
        let col = text(&["1", "2", "3", "4", "5", "6", "7", "x", "y", "z"]);
        let out = infer(&col);
        assert_eq!(out.data_type, DataType::Int64);
        assert_eq!(out.missing_count(), 3);
    }

    #[test]
    fn inference_is_idempotent() {
        let inputs = [
            text(&["true", "false", "true"]),
            text(&["1", "2", "x", "y", "z", "w", "q", "r", "s", "t"]),
            text(&["a", "b", "a", "b", "a", "b"]),
            text(&["a1", "b2", "c3", "d4", "5", "f6"]),
        ];
        for col in &inputs {
            let once = infer(col);
            assert_eq!(infer(&once), once);
        }
    }
}
