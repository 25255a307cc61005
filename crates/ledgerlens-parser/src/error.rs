//! Error types for ledgerlens-parser

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParseError {
    #[error("Syntax error at line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("Invalid date '{value}' at line {line}")]
    InvalidDate { line: usize, value: String },

    #[error("Invalid amount '{value}' at line {line}")]
    InvalidAmount { line: usize, value: String },

    #[error("Invalid account '{value}' at line {line}")]
    InvalidAccount { line: usize, value: String },

    #[error("Unsupported posting at line {line}: {message}")]
    UnsupportedPosting { line: usize, message: String },

    #[error("Metadata block error: {message}")]
    MetadataError { message: String },

    #[error("Ledger text is empty")]
    EmptyInput,
}

impl ParseError {
    /// Line the error refers to, when it is tied to one entry
    pub fn line(&self) -> Option<usize> {
        match self {
            ParseError::SyntaxError { line, .. }
            | ParseError::InvalidDate { line, .. }
            | ParseError::InvalidAmount { line, .. }
            | ParseError::InvalidAccount { line, .. }
            | ParseError::UnsupportedPosting { line, .. } => Some(*line),
            ParseError::MetadataError { .. } | ParseError::EmptyInput => None,
        }
    }
}
