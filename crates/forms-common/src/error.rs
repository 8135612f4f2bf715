//! Error types for the forms runtime.

use miette::Diagnostic;
use thiserror::Error;

/// Main error type for forms runtime operations
#[derive(Debug, Error, Diagnostic)]
pub enum FormsError {
    /// The form definition could not be turned into a form model
    #[error("invalid form definition: {0}")]
    #[diagnostic(code(forms::definition))]
    InvalidDefinition(String),

    /// The rule engine rejected an operation
    #[error("rule engine error: {0}")]
    #[diagnostic(code(forms::model))]
    Model(String),

    /// Prefill data could not be retrieved
    #[error("failed to fetch prefill data for form {form_id}: {message}")]
    #[diagnostic(code(forms::fetch))]
    Fetch { form_id: String, message: String },

    /// Custom function registration failed
    #[error("failed to register custom functions from {path}: {message}")]
    #[diagnostic(code(forms::custom_functions))]
    CustomFunctions { path: String, message: String },

    /// A sync phase was asked to move somewhere other than its successor
    #[error("invalid phase transition from {from} to {to}")]
    #[diagnostic(
        code(forms::transition),
        help("phases only move forward: uninitialized, pre-restore, post-restore-pending, live")
    )]
    Transition { from: &'static str, to: &'static str },

    /// Serialization/deserialization error
    #[error(transparent)]
    #[diagnostic(transparent)]
    Serde(#[from] SerDeError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

/// Serialization/deserialization errors
#[derive(Debug, Error, Diagnostic)]
#[non_exhaustive]
pub enum SerDeError {
    #[error(transparent)]
    #[diagnostic(code(forms::serde::json))]
    Json(#[from] serde_json::Error),
}

impl From<serde_json::Error> for FormsError {
    fn from(err: serde_json::Error) -> Self {
        FormsError::Serde(SerDeError::Json(err))
    }
}

/// Configuration errors
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("missing required environment variable {var}")]
    #[diagnostic(code(config::missing_env))]
    MissingEnv { var: &'static str },

    #[error("invalid URL {url}: {message}")]
    #[diagnostic(code(config::url_parse))]
    UrlParse { url: String, message: String },
}
