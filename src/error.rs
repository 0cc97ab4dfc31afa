use thiserror::Error;

/// Errors raised while loading, summarising or exporting sales data.
///
/// Per-cell coercion failures are not errors: they become missing values
/// and the pipeline carries on. Only problems that make the whole input
/// unusable end up here.
#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Excel read error: {0}")]
    Excel(#[from] calamine::Error),

    #[error("Excel write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("Missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Sheet '{0}' not found in workbook")]
    SheetNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Chart rendering failed: {0}")]
    Chart(String),

    #[error("Template error: {0}")]
    Template(String),
}

impl From<config::ConfigError> for DashboardError {
    fn from(err: config::ConfigError) -> Self {
        DashboardError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;
