//! Error types for ledgerlens-core
//!
//! This module provides the error taxonomy of the ledger pipeline, including
//! error codes, severities, detailed messages and suggestions. Most of these
//! errors degrade a single stage or entry; only `CoreError::EmptyInput` stops
//! a whole pipeline run.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ledgerlens_config::ConfigError;
use ledgerlens_parser::ParseError;

/// Error codes for programmatic error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Ledger text is empty
    EmptyInput,
    /// Malformed entry in the ledger text
    ParseError,
    /// Account outside every root category
    ClassificationWarning,
    /// Unusable tax map
    TaxConfigError,
    /// Transaction that cannot be balanced
    ImbalanceError,
    /// A single analytics metric failed
    AnalysisMetricError,
    /// Configuration error
    ConfigError,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCode::EmptyInput => write!(f, "EMPTY_INPUT"),
            ErrorCode::ParseError => write!(f, "PARSE_ERROR"),
            ErrorCode::ClassificationWarning => write!(f, "CLASSIFICATION_WARNING"),
            ErrorCode::TaxConfigError => write!(f, "TAX_CONFIG_ERROR"),
            ErrorCode::ImbalanceError => write!(f, "IMBALANCE_ERROR"),
            ErrorCode::AnalysisMetricError => write!(f, "ANALYSIS_METRIC_ERROR"),
            ErrorCode::ConfigError => write!(f, "CONFIG_ERROR"),
        }
    }
}

/// Detailed error information for command output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Suggestions for resolution
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    /// Line number in the ledger text (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl ErrorDetails {
    pub fn new(code: ErrorCode, message: String) -> Self {
        Self {
            code,
            message,
            details: None,
            suggestions: vec![],
            line: None,
        }
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.details = Some(detail);
        self
    }

    pub fn with_suggestion(mut self, suggestion: String) -> Self {
        self.suggestions.push(suggestion);
        self
    }

    pub fn with_line(mut self, line: Option<usize>) -> Self {
        self.line = line;
        self
    }
}

impl std::fmt::Display for ErrorDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(ref details) = self.details {
            write!(f, "\nDetails: {}", details)?;
        }
        if !self.suggestions.is_empty() {
            write!(f, "\nSuggestions:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n  - {}", suggestion)?;
            }
        }
        if let Some(line) = self.line {
            write!(f, "\nLine: {}", line)?;
        }
        Ok(())
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Informational
    Info,
    /// Warning - a stage or entry is degraded
    Warning,
    /// Error - a stage failed
    Error,
    /// Critical - the pipeline cannot run
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "info"),
            ErrorSeverity::Warning => write!(f, "warning"),
            ErrorSeverity::Error => write!(f, "error"),
            ErrorSeverity::Critical => write!(f, "critical"),
        }
    }
}

// ==================== Stage Errors ====================

/// Account whose root matches no configured or canonical root
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("Account '{account}' does not belong to any root category")]
pub struct ClassificationWarning {
    pub account: String,
}

/// Why a tax map was discarded
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaxConfigError {
    #[error("`taxes` must map tax names to percentages")]
    NotAMapping,

    #[error("Tax '{name}' must be a number or {{percentage: number}}")]
    InvalidEntry { name: String },

    #[error("Tax '{name}' percentage {percentage} is outside [0, 1]")]
    OutOfRange { name: String, percentage: Decimal },
}

/// Why a transaction was left out of the resolved set
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ImbalanceError {
    #[error("{count} postings without amount; at most one can be inferred")]
    MultipleElided { count: usize },

    #[error("Postings do not balance: {residual} {commodity} left over")]
    Unbalanced { commodity: String, residual: Decimal },

    #[error("No posting can absorb {residual} {commodity} of tax")]
    NoBalancingPosting { commodity: String, residual: Decimal },

    #[error("Transaction has no amounts")]
    NoAmounts,

    #[error("Account '{account}' is not declared")]
    UndeclaredAccount { account: String },

    #[error("Amounts in {commodity} exceed the decimal range")]
    Overflow { commodity: String },
}

/// Failure of a single analytics metric
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisError {
    #[error("{metric} needs at least {needed} months of data, found {available}")]
    InsufficientData { metric: String, needed: usize, available: usize },

    #[error("Invalid month '{value}', expected YYYY-MM")]
    InvalidMonth { value: String },

    #[error("Invalid {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("No data for {metric}")]
    NoData { metric: String },

    #[error("Amounts exceed the decimal range")]
    Overflow,
}

/// Result type of analytics metrics
pub type AnalysisResult<T> = Result<T, AnalysisError>;

// ==================== Core Error ====================

/// Main error type for ledgerlens-core
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Ledger text is empty")]
    EmptyInput,

    #[error("Parse error: {0}")]
    Parse(ParseError),

    #[error(transparent)]
    Classification(#[from] ClassificationWarning),

    #[error("Tax configuration error: {0}")]
    TaxConfig(#[from] TaxConfigError),

    #[error("Transaction at line {line} rejected: {error}")]
    Imbalance { line: usize, error: ImbalanceError },

    #[error("Analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<ParseError> for CoreError {
    fn from(error: ParseError) -> Self {
        match error {
            ParseError::EmptyInput => CoreError::EmptyInput,
            other => CoreError::Parse(other),
        }
    }
}

impl CoreError {
    /// Get the error code
    pub fn code(&self) -> ErrorCode {
        match self {
            CoreError::EmptyInput => ErrorCode::EmptyInput,
            CoreError::Parse(_) => ErrorCode::ParseError,
            CoreError::Classification(_) => ErrorCode::ClassificationWarning,
            CoreError::TaxConfig(_) => ErrorCode::TaxConfigError,
            CoreError::Imbalance { .. } => ErrorCode::ImbalanceError,
            CoreError::Analysis(_) => ErrorCode::AnalysisMetricError,
            CoreError::Config(_) => ErrorCode::ConfigError,
        }
    }

    /// Get the severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            CoreError::EmptyInput => ErrorSeverity::Critical,
            CoreError::Parse(_) => ErrorSeverity::Warning,
            CoreError::Classification(_) => ErrorSeverity::Info,
            CoreError::TaxConfig(_) => ErrorSeverity::Warning,
            CoreError::Imbalance { .. } => ErrorSeverity::Warning,
            CoreError::Analysis(_) => ErrorSeverity::Error,
            CoreError::Config(_) => ErrorSeverity::Critical,
        }
    }

    /// Convert to detailed error info
    pub fn to_details(&self) -> ErrorDetails {
        let mut details = ErrorDetails::new(self.code(), self.to_string());

        match self {
            CoreError::EmptyInput => {
                details = details.with_suggestion("Check that the ledger file is not empty.".to_string());
            }
            CoreError::Parse(error) => {
                details = details
                    .with_line(error.line())
                    .with_suggestion("Check the syntax of the entry; the rest of the file was parsed.".to_string());
            }
            CoreError::Classification(warning) => {
                details = details.with_suggestion(format!(
                    "Rename '{}' under one of the root accounts or configure accounts.parents.",
                    warning.account
                ));
            }
            CoreError::TaxConfig(_) => {
                details = details
                    .with_suggestion("Write taxes as `NAME: 0.16` or `NAME: {percentage: 0.16}`.".to_string())
                    .with_suggestion("The configured default taxes were used instead.".to_string());
            }
            CoreError::Imbalance { line, error } => {
                details = details
                    .with_line(Some(*line))
                    .with_detail(serde_json::json!(error))
                    .with_suggestion("Leave at most one posting without amount.".to_string());
            }
            CoreError::Analysis(error) => {
                details = details.with_detail(serde_json::json!(error));
            }
            CoreError::Config(error) => {
                for suggestion in error.to_details().suggestions {
                    details = details.with_suggestion(suggestion);
                }
            }
        }

        details
    }
}

/// Result type with CoreError
pub type CoreResult<T> = Result<T, CoreError>;

// ==================== Error Reporting ====================

/// Error context for reporting
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Pipeline operation being performed
    pub operation: String,
    /// Stage of the operation (if applicable)
    pub stage: Option<String>,
    /// Additional context data
    pub data: serde_json::Value,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            stage: None,
            data: serde_json::json!({}),
        }
    }

    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    pub fn with_data(mut self, key: &str, value: serde_json::Value) -> Self {
        self.data[key] = value;
        self
    }
}

/// Error logger trait
pub trait ErrorLogger: Send + Sync {
    fn log_error(&self, error: &CoreError, context: &ErrorContext);
    fn log_warning(&self, message: &str, context: &ErrorContext);
    fn log_debug(&self, message: &str, context: &ErrorContext);
}

/// Default error logger using log crate
#[derive(Debug, Default)]
pub struct DefaultErrorLogger;

impl ErrorLogger for DefaultErrorLogger {
    fn log_error(&self, error: &CoreError, context: &ErrorContext) {
        let message = format!(
            "[{}] {} - Operation: {} - Stage: {}",
            error.code(),
            error,
            context.operation,
            context.stage.as_deref().unwrap_or("-")
        );
        match error.severity() {
            ErrorSeverity::Info => log::info!(target: "ledgerlens::error", "{}", message),
            ErrorSeverity::Warning => log::warn!(target: "ledgerlens::error", "{}", message),
            ErrorSeverity::Error | ErrorSeverity::Critical => log::error!(target: "ledgerlens::error", "{}", message),
        }
    }

    fn log_warning(&self, message: &str, context: &ErrorContext) {
        log::warn!(
            target: "ledgerlens::error",
            "WARNING: {} - Operation: {} - Stage: {}",
            message,
            context.operation,
            context.stage.as_deref().unwrap_or("-")
        );
    }

    fn log_debug(&self, message: &str, context: &ErrorContext) {
        log::debug!(
            target: "ledgerlens::error",
            "DEBUG: {} - Operation: {} - Stage: {}",
            message,
            context.operation,
            context.stage.as_deref().unwrap_or("-")
        );
    }
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::EmptyInput.to_string(), "EMPTY_INPUT");
        assert_eq!(ErrorCode::TaxConfigError.to_string(), "TAX_CONFIG_ERROR");
        assert_eq!(ErrorCode::AnalysisMetricError.to_string(), "ANALYSIS_METRIC_ERROR");
    }

    #[test]
    fn test_error_severity_display() {
        assert_eq!(ErrorSeverity::Info.to_string(), "info");
        assert_eq!(ErrorSeverity::Critical.to_string(), "critical");
    }

    #[test]
    fn test_empty_parse_error_becomes_empty_input() {
        let error = CoreError::from(ParseError::EmptyInput);
        assert_eq!(error, CoreError::EmptyInput);
        assert_eq!(error.severity(), ErrorSeverity::Critical);

        let error = CoreError::from(ParseError::InvalidDate { line: 3, value: "2024-02-30".to_string() });
        assert_eq!(error.code(), ErrorCode::ParseError);
        assert_eq!(error.to_details().line, Some(3));
    }

    #[test]
    fn test_imbalance_details() {
        let error = CoreError::Imbalance { line: 12, error: ImbalanceError::MultipleElided { count: 2 } };
        let details = error.to_details();
        assert_eq!(details.code, ErrorCode::ImbalanceError);
        assert_eq!(details.line, Some(12));
        assert_eq!(details.details.unwrap()["reason"], "multiple_elided");
        assert!(details.message.contains("line 12"));
    }

    #[test]
    fn test_tax_config_error_message() {
        let error = TaxConfigError::InvalidEntry { name: "IVA".to_string() };
        assert_eq!(error.to_string(), "Tax 'IVA' must be a number or {percentage: number}");
        assert_eq!(CoreError::from(error).code(), ErrorCode::TaxConfigError);
    }

    #[test]
    fn test_error_context() {
        let context = ErrorContext::new("analyze_ledger")
            .with_stage("moving_average")
            .with_data("window", serde_json::json!(3));

        assert_eq!(context.operation, "analyze_ledger");
        assert_eq!(context.stage.as_deref(), Some("moving_average"));
        assert_eq!(context.data["window"], 3);
    }

    #[test]
    fn test_error_details_builder() {
        let details = ErrorDetails::new(ErrorCode::ParseError, "Bad amount".to_string())
            .with_detail(serde_json::json!({"value": "ten"}))
            .with_suggestion("Check the amount".to_string())
            .with_line(Some(7));

        assert!(details.details.is_some());
        assert_eq!(details.suggestions.len(), 1);
        assert!(details.to_string().contains("Line: 7"));
    }
}
