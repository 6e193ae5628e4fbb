use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum PipelineError {
    #[error("illegal character in arguments: {0}")]
    IllegalArgument(String),

    #[error("missing required parameter: {0}")]
    MissingParameter(String),

    #[error("unsupported tool: {0}")]
    UnsupportedTool(String),

    #[error("failed to parse results file {path}: {message}")]
    ResultsParse { path: String, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("fact store request failed: {0}")]
    FactStoreHttp(String),

    #[error("fact store returned status {status}: {message}")]
    FactStoreStatus { status: u16, message: String },
}
