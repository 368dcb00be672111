//! Domain error types.

use chrono::NaiveDate;

/// Failures of an explicit rebalancing-schedule operation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScheduleError {
    #[error("{0} is already a rebalancing date")]
    AlreadyScheduled(NaiveDate),

    #[error("{0} is not in the list of rebalancing dates")]
    NotScheduled(NaiveDate),

    #[error("{date} is outside the calendar range {start} to {end}")]
    OutOfRange {
        date: NaiveDate,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("{0} is not a trading day")]
    NotTradingDay(NaiveDate),

    #[error("adjusting {date} to a trading day exceeds the end date {end}")]
    AdjustmentPastEnd { date: NaiveDate, end: NaiveDate },
}

/// Broad classification of a [`BacktestError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    DataValidation,
    Schedule,
    Io,
}

/// Top-level error type for panelbt.
#[derive(Debug, thiserror::Error)]
pub enum BacktestError {
    #[error("unsupported frequency '{0}'")]
    UnsupportedFrequency(String),

    #[error("unknown weight scheme '{0}'")]
    UnknownWeightScheme(String),

    #[error("a market cap source is required when weight_scheme is MarketCapWeight")]
    MissingMarketCapSource,

    #[error("error parsing date '{input}' (expected YYYY-MM-DD)")]
    DateParse { input: String },

    #[error("start_date {start} must be earlier than end_date {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("invalid option {name}: {reason}")]
    InvalidOption { name: String, reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("the price panel is empty")]
    EmptyPanel,

    #[error("invalid panel: {reason}")]
    InvalidPanel { reason: String },

    #[error("no common columns between the price panel and the market caps")]
    NoCommonColumns,

    #[error("portfolio_returns and cumulative_returns must share the same date index")]
    IndexMismatch,

    #[error("return series are empty")]
    EmptyReturns,

    #[error("unsupported data format: {path}")]
    UnsupportedFormat { path: String },

    #[error("side dataset '{0}' is not loaded")]
    MissingSideData(String),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BacktestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BacktestError::UnsupportedFrequency(_)
            | BacktestError::UnknownWeightScheme(_)
            | BacktestError::MissingMarketCapSource
            | BacktestError::DateParse { .. }
            | BacktestError::InvalidDateRange { .. }
            | BacktestError::InvalidOption { .. }
            | BacktestError::ConfigParse { .. }
            | BacktestError::ConfigMissing { .. }
            | BacktestError::ConfigInvalid { .. } => ErrorKind::Configuration,
            BacktestError::EmptyPanel
            | BacktestError::InvalidPanel { .. }
            | BacktestError::NoCommonColumns
            | BacktestError::IndexMismatch
            | BacktestError::EmptyReturns
            | BacktestError::UnsupportedFormat { .. }
            | BacktestError::MissingSideData(_) => ErrorKind::DataValidation,
            BacktestError::Schedule(_) => ErrorKind::Schedule,
            BacktestError::Io(_) => ErrorKind::Io,
        }
    }
}

impl From<&BacktestError> for std::process::ExitCode {
    fn from(err: &BacktestError) -> Self {
        let code: u8 = match err.kind() {
            ErrorKind::Io => 1,
            ErrorKind::Configuration => 2,
            ErrorKind::Schedule => 4,
            ErrorKind::DataValidation => 5,
        };
        std::process::ExitCode::from(code)
    }
}
