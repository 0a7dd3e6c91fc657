use std::path::PathBuf;
use thiserror::Error;

/// Errors that halt an analysis run or one of its stages.
///
/// Per-row parse failures are not represented here: rows that cannot be
/// parsed are dropped during normalization and only counted.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A credential for an external service is absent or blank.
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    /// The uploaded table lacks one or more required columns.
    #[error("Missing required column(s): {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    /// The forecasting or commentary collaborator failed.
    #[error("{stage} service failed: {message}")]
    ExternalService { stage: String, message: String },

    /// A profile or option value is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn external(stage: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::ExternalService {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_lists_all_columns() {
        let err = PipelineError::Schema {
            missing: vec!["Date".to_string(), "Revenue".to_string()],
        };
        assert_eq!(err.to_string(), "Missing required column(s): Date, Revenue");
    }

    #[test]
    fn test_external_service_display() {
        let err = PipelineError::external("commentary", "timeout");
        assert_eq!(err.to_string(), "commentary service failed: timeout");
    }

    #[test]
    fn test_missing_credential_display() {
        let err = PipelineError::MissingCredential("GROQ_API_KEY".to_string());
        assert_eq!(err.to_string(), "Missing credential: GROQ_API_KEY");
    }

    #[test]
    fn test_file_read_display() {
        let err = PipelineError::FileRead {
            path: PathBuf::from("/tmp/missing.csv"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/tmp/missing.csv"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{bad").unwrap_err();
        let err: PipelineError = json_err.into();
        assert!(err.to_string().starts_with("Failed to parse JSON"));
    }
}
