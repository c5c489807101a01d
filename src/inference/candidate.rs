//! The ranked candidate table.
//!
//! Each entry pairs a candidate kind with a per-cell extractor and the threshold that commits it.
//! [`COMMIT_ORDER`] is the order in which candidates may commit outright; [`TIE_BREAK_ORDER`]
//! decides between candidates with equal missing-fraction in the fallback step.

use std::fmt;

use crate::config::InferenceOptions;
use crate::types::{Cell, Column, DataType, Value};

use super::coerce::{self, DateParser};

/// One of the four trial coercions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandidateKind {
    Integer,
    Boolean,
    Date,
    Duration,
}

impl CandidateKind {
    /// Type tag of a column committed to this candidate.
    pub fn data_type(self) -> DataType {
        match self {
            Self::Integer => DataType::Int64,
            Self::Boolean => DataType::Bool,
            Self::Date => DataType::DateTime,
            Self::Duration => DataType::Duration,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Duration => "duration",
        }
    }
}

impl fmt::Display for CandidateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Extractor = fn(&Value, &DateParser) -> Option<Value>;
type Threshold = fn(&InferenceOptions) -> f64;

/// A row of the candidate table.
pub(crate) struct CandidateRule {
    pub kind: CandidateKind,
    pub extract: Extractor,
    pub threshold: Threshold,
}

pub(crate) const COMMIT_ORDER: [CandidateRule; 4] = [
    CandidateRule {
        kind: CandidateKind::Integer,
        extract: integer_cell,
        threshold: integer_threshold,
    },
    CandidateRule {
        kind: CandidateKind::Boolean,
        extract: boolean_cell,
        threshold: boolean_threshold,
    },
    CandidateRule {
        kind: CandidateKind::Date,
        extract: date_cell,
        threshold: date_threshold,
    },
    CandidateRule {
        kind: CandidateKind::Duration,
        extract: duration_cell,
        threshold: duration_threshold,
    },
];

pub(crate) const TIE_BREAK_ORDER: [CandidateKind; 4] = [
    CandidateKind::Integer,
    CandidateKind::Date,
    CandidateKind::Duration,
    CandidateKind::Boolean,
];

fn integer_threshold(o: &InferenceOptions) -> f64 {
    o.integer_max_missing
}

fn boolean_threshold(o: &InferenceOptions) -> f64 {
    o.boolean_max_missing
}

fn date_threshold(o: &InferenceOptions) -> f64 {
    o.date_max_missing
}

fn duration_threshold(o: &InferenceOptions) -> f64 {
    o.duration_max_missing
}

fn integer_cell(v: &Value, _: &DateParser) -> Option<Value> {
    match v {
        Value::Int64(_) => Some(v.clone()),
        Value::Float64(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
            Some(Value::Int64(*f as i64))
        }
        Value::Utf8(s) => coerce::parse_integer(s).ok().map(Value::Int64),
        _ => None,
    }
}

fn boolean_cell(v: &Value, _: &DateParser) -> Option<Value> {
    match v {
        Value::Bool(_) => Some(v.clone()),
        Value::Int64(0) => Some(Value::Bool(false)),
        Value::Int64(1) => Some(Value::Bool(true)),
        Value::Float64(f) if *f == 0.0 => Some(Value::Bool(false)),
        Value::Float64(f) if *f == 1.0 => Some(Value::Bool(true)),
        Value::Utf8(s) => coerce::parse_bool(s).ok().map(Value::Bool),
        _ => None,
    }
}

fn date_cell(v: &Value, parser: &DateParser) -> Option<Value> {
    match v {
        Value::DateTime(_) => Some(v.clone()),
        Value::Utf8(s) => parser.parse(s).ok().map(Value::DateTime),
        _ => None,
    }
}

fn duration_cell(v: &Value, _: &DateParser) -> Option<Value> {
    match v {
        Value::Duration(_) => Some(v.clone()),
        Value::Utf8(s) => coerce::parse_duration(s).ok().map(Value::Duration),
        _ => None,
    }
}

/// One trial coercion of a column. Exists only for the duration of a single inference call.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Candidate {
    pub kind: CandidateKind,
    pub values: Vec<Cell>,
    pub missing: usize,
}

impl Candidate {
    /// Run `rule`'s extractor over every cell; failures and input missing cells both count.
    pub fn attempt(rule: &CandidateRule, column: &Column, parser: &DateParser) -> Self {
        let values: Vec<Cell> = column
            .values
            .iter()
            .map(|cell| cell.as_ref().and_then(|v| (rule.extract)(v, parser)))
            .collect();
        let missing = values.iter().filter(|c| c.is_none()).count();
        Self {
            kind: rule.kind,
            values,
            missing,
        }
    }

    pub fn missing_fraction(&self) -> f64 {
        if self.values.is_empty() {
            return 1.0;
        }
        self.missing as f64 / self.values.len() as f64
    }

    pub fn into_column(self, name: String) -> Column {
        Column::new(name, self.kind.data_type(), self.values)
    }
}

/// Lowest missing-fraction wins; ties go to the kind listed first in [`TIE_BREAK_ORDER`].
pub(crate) fn best_candidate(candidates: Vec<Candidate>) -> Option<Candidate> {
    let rank = |kind: CandidateKind| {
        TIE_BREAK_ORDER
            .iter()
            .position(|k| *k == kind)
            .unwrap_or(TIE_BREAK_ORDER.len())
    };
    candidates
        .into_iter()
        .min_by_key(|c| (c.missing, rank(c.kind)))
}
