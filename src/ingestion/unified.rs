//! Unified decode entrypoint.
//!
//! Most callers should use [`decode`], which turns raw bytes in a declared [`TabularFormat`]
//! into a [`crate::types::Table`] of raw (not yet inferred) columns.
//!
//! - [`decode_from_path`] reads a file and picks the format from its extension.
//! - If an [`super::observability::IngestionObserver`] is provided, success/failure/alerts are
//!   reported to it.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{IngestionError, IngestionResult};
use crate::types::Table;

use super::csv;
use super::observability::{IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats};

/// Declared tabular source format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TabularFormat {
    /// Comma-separated values.
    Csv,
    /// Legacy Excel workbook (feature-gated behind `excel`).
    Xls,
    /// Office Open XML workbook (feature-gated behind `excel`).
    Xlsx,
}

impl TabularFormat {
    /// Parse a format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "xls" => Some(Self::Xls),
            "xlsx" | "xlsm" => Some(Self::Xlsx),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xls => "xls",
            Self::Xlsx => "xlsx",
        }
    }
}

impl fmt::Display for TabularFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TabularFormat {
    type Err = IngestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s.trim().trim_start_matches('.')).ok_or_else(|| {
            IngestionError::UnsupportedFormat {
                format: s.to_string(),
            }
        })
    }
}

/// How to choose sheet(s) when decoding an Excel workbook.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExcelSheetSelection {
    /// Decode the first sheet (default).
    #[default]
    First,
    /// Decode a single named sheet.
    Sheet(String),
    /// Decode all sheets and concatenate rows.
    AllSheets,
    /// Decode only the listed sheets (in order) and concatenate rows.
    Sheets(Vec<String>),
}

/// Options controlling decode behavior.
///
/// Use [`Default`] for common cases.
#[derive(Clone)]
pub struct IngestionOptions {
    /// Excel-specific options.
    pub excel_sheet_selection: ExcelSheetSelection,
    /// Optional observer for logging/alerts.
    pub observer: Option<Arc<dyn IngestionObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: IngestionSeverity,
}

impl fmt::Debug for IngestionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionOptions")
            .field("excel_sheet_selection", &self.excel_sheet_selection)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            excel_sheet_selection: ExcelSheetSelection::default(),
            observer: None,
            alert_at_or_above: IngestionSeverity::Critical,
        }
    }
}

/// Decode raw bytes in the declared `format`.
///
/// When an observer is configured, this function reports:
///
/// - `on_success` on success, with row/column counts
/// - `on_failure` on failure, with a computed severity
/// - `on_alert` on failure when the computed severity is >= `options.alert_at_or_above`
///
/// # Examples
///
/// ```
/// use rust_data_cleaning::ingestion::{decode, IngestionOptions, TabularFormat};
///
/// # fn main() -> Result<(), rust_data_cleaning::IngestionError> {
/// let bytes = b"id,flag\n1,yes\n2,no\n";
/// let table = decode(bytes, TabularFormat::Csv, &IngestionOptions::default())?;
/// assert_eq!(table.row_count(), 2);
/// # Ok(())
/// # }
/// ```
///
/// ## Observability (tracing + alert threshold)
///
/// ```no_run
/// use std::sync::Arc;
///
/// use rust_data_cleaning::ingestion::{
///     decode_from_path, IngestionOptions, IngestionSeverity, TracingObserver,
/// };
///
/// let opts = IngestionOptions {
///     observer: Some(Arc::new(TracingObserver)),
///     alert_at_or_above: IngestionSeverity::Critical,
///     ..Default::default()
/// };
///
/// // Missing files are treated as Critical and will trigger `on_alert` at this threshold.
/// let _err = decode_from_path("does_not_exist.csv", &opts).unwrap_err();
/// ```
pub fn decode(
    bytes: &[u8],
    format: TabularFormat,
    options: &IngestionOptions,
) -> IngestionResult<Table> {
    let ctx = IngestionContext {
        source: format!("<{} bytes>", bytes.len()),
        format,
    };
    report(&ctx, options, decode_bytes(bytes, format, options))
}

/// Read `path` and decode it, picking the format from the file extension.
pub fn decode_from_path(path: impl AsRef<Path>, options: &IngestionOptions) -> IngestionResult<Table> {
    let path = path.as_ref();
    let format = infer_format_from_path(path)?;
    let ctx = IngestionContext {
        source: path.display().to_string(),
        format,
    };
    let result = std::fs::read(path)
        .map_err(IngestionError::from)
        .and_then(|bytes| decode_bytes(&bytes, format, options));
    report(&ctx, options, result)
}

fn report(
    ctx: &IngestionContext,
    options: &IngestionOptions,
    result: IngestionResult<Table>,
) -> IngestionResult<Table> {
    if let Some(obs) = options.observer.as_ref() {
        match &result {
            Ok(table) => obs.on_success(
                ctx,
                IngestionStats {
                    rows: table.row_count(),
                    columns: table.column_count(),
                },
            ),
            Err(e) => {
                let sev = severity_for_error(e);
                obs.on_failure(ctx, sev, e);
                if sev >= options.alert_at_or_above {
                    obs.on_alert(ctx, sev, e);
                }
            }
        }
    }
    result
}

fn decode_bytes(
    bytes: &[u8],
    format: TabularFormat,
    options: &IngestionOptions,
) -> IngestionResult<Table> {
    match format {
        TabularFormat::Csv => csv::decode_csv(bytes),
        TabularFormat::Xls | TabularFormat::Xlsx => {
            decode_excel_dispatch(bytes, format, &options.excel_sheet_selection)
        }
    }
}

fn severity_for_error(e: &IngestionError) -> IngestionSeverity {
    match e {
        IngestionError::Io(_) => IngestionSeverity::Critical,
        IngestionError::Csv(err) => match err.kind() {
            ::csv::ErrorKind::Io(_) => IngestionSeverity::Critical,
            _ => IngestionSeverity::Error,
        },
        #[cfg(feature = "excel")]
        IngestionError::Excel(_) => IngestionSeverity::Error,
        IngestionError::UnsupportedFormat { .. } => IngestionSeverity::Error,
        IngestionError::Malformed { .. } => IngestionSeverity::Error,
        IngestionError::Table(_) => IngestionSeverity::Error,
    }
}

fn infer_format_from_path(path: &Path) -> IngestionResult<TabularFormat> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or_else(|| IngestionError::UnsupportedFormat {
            format: format!("(no extension: {})", path.display()),
        })?;
    ext.parse()
}

fn decode_excel_dispatch(
    bytes: &[u8],
    format: TabularFormat,
    sel: &ExcelSheetSelection,
) -> IngestionResult<Table> {
    #[cfg(feature = "excel")]
    {
        let _ = format;
        super::excel::decode_excel(bytes, sel)
    }

    #[cfg(not(feature = "excel"))]
    {
        let _ = (bytes, sel);
        Err(IngestionError::UnsupportedFormat {
            format: format!("{format} (enable cargo feature 'excel')"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        events: Mutex<Vec<String>>,
    }

    impl IngestionObserver for Recording {
        fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
            self.events
                .lock()
                .unwrap()
                .push(format!("ok {} {}x{}", ctx.format, stats.rows, stats.columns));
        }

        fn on_failure(&self, _ctx: &IngestionContext, sev: IngestionSeverity, _e: &IngestionError) {
            self.events.lock().unwrap().push(format!("fail {sev:?}"));
        }

        fn on_alert(&self, _ctx: &IngestionContext, sev: IngestionSeverity, _e: &IngestionError) {
            self.events.lock().unwrap().push(format!("alert {sev:?}"));
        }
    }

    #[test]
    fn format_names_parse() {
        assert_eq!("CSV".parse::<TabularFormat>().unwrap(), TabularFormat::Csv);
        assert_eq!(".xlsx".parse::<TabularFormat>().unwrap(), TabularFormat::Xlsx);
        assert!(matches!(
            "parquet".parse::<TabularFormat>(),
            Err(IngestionError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn observer_sees_success_and_failure() {
        let obs = Arc::new(Recording::default());
        let opts = IngestionOptions {
            observer: Some(obs.clone()),
            alert_at_or_above: IngestionSeverity::Error,
            ..Default::default()
        };
        decode(b"a\n1\n2\n", TabularFormat::Csv, &opts).unwrap();
        decode(b"a,a\n", TabularFormat::Csv, &opts).unwrap_err();

        let events = obs.events.lock().unwrap().clone();
        assert_eq!(events, vec!["ok csv 2x1", "fail Error", "alert Error"]);
    }

    #[test]
    fn missing_file_is_critical() {
        let obs = Arc::new(Recording::default());
        let opts = IngestionOptions {
            observer: Some(obs.clone()),
            ..Default::default()
        };
        let err = decode_from_path("definitely/not/here.csv", &opts).unwrap_err();
        assert!(matches!(err, IngestionError::Io(_)));
        let events = obs.events.lock().unwrap().clone();
        assert_eq!(events, vec!["fail Critical", "alert Critical"]);
    }
}
