//! Core ledger processing: hierarchy, taxes, balances and analytics

pub mod analyst;
pub mod balances;
pub mod error;
pub mod hierarchy;
pub mod options;
pub mod period;
pub mod pipeline;
pub mod taxes;

pub use analyst::LedgerAnalyst;
pub use balances::{counted_quantity, date_range, AccountBalances, BalanceCalculator, StatusResults};
pub use error::{
    AnalysisError, AnalysisResult, ClassificationWarning, CoreError, CoreResult, DefaultErrorLogger, ErrorCode,
    ErrorContext, ErrorDetails, ErrorLogger, ErrorSeverity, ImbalanceError, TaxConfigError,
};
pub use hierarchy::{AccountHierarchy, Classification, ParentSpec, UNCLASSIFIED};
pub use options::AnalysisOptions;
pub use period::{Period, YearMonth};
pub use pipeline::{
    analyze_ledger, calculate_ledger, compare_ledger_months, ledger_alerts, parse_ledger, LedgerAlerts,
    LedgerAnalysis, LedgerCalculation, LedgerParse,
};
pub use taxes::{
    balance_only, normalize_taxes, resolve, ResolveSettings, ResolvedPosting, ResolvedSet, ResolvedTransaction,
    TaxNormalization, TaxResolution, TaxSource,
};

// Re-export the stage type shared by every pipeline result
pub use ledgerlens_parser::Stage;
