//! Per-stage results for best-effort pipelines
//!
//! Every stage of parsing and analysis yields either a value or the reason
//! it is unavailable. Downstream stages inspect the reason instead of
//! catching failures.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Stage<T> {
    Ready { value: T },
    Unavailable { reason: String },
}

impl<T> Stage<T> {
    pub fn ready(value: T) -> Self {
        Stage::Ready { value }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Stage::Unavailable { reason: reason.into() }
    }

    pub fn from_result<E: std::fmt::Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Stage::ready(value),
            Err(e) => Stage::unavailable(e.to_string()),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Stage::Ready { .. })
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Stage::Ready { value } => Some(value),
            Stage::Unavailable { .. } => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Stage::Ready { value } => Some(value),
            Stage::Unavailable { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Stage::Ready { .. } => None,
            Stage::Unavailable { reason } => Some(reason),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Stage<U> {
        match self {
            Stage::Ready { value } => Stage::ready(f(value)),
            Stage::Unavailable { reason } => Stage::Unavailable { reason },
        }
    }

    pub fn as_ref(&self) -> Stage<&T> {
        match self {
            Stage::Ready { value } => Stage::Ready { value },
            Stage::Unavailable { reason } => Stage::Unavailable { reason: reason.clone() },
        }
    }
}
