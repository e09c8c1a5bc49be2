use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum RefineryError {
    #[error("invalid bin id: {0}")]
    InvalidBinId(String),

    #[error("invalid sequence extension: {0}")]
    InvalidExtension(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("failed to read quality report at {0}")]
    ReportRead(Utf8PathBuf),

    #[error("malformed quality report: {0}")]
    ReportParse(String),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("refinement tool failed: {0}")]
    RefineTool(String),

    #[error("quality tool failed: {0}")]
    QualityTool(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
