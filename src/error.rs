// ⚠️ Error kinds - fatal configuration errors vs recoverable per-file errors

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EtlError {
    #[error("taxonomy file not found: {0}")]
    MissingTaxonomyFile(PathBuf),

    #[error("input root not found: {0}")]
    MissingInputRoot(PathBuf),

    #[error("unreadable source {path}: {reason}")]
    UnreadableSource { path: PathBuf, reason: String },

    #[error("no reporting column found in sheet {sheet}")]
    NoReportingColumnFound { sheet: String },

    #[error("{groups} duplicate group(s) hold conflicting amounts")]
    ConflictingValues { groups: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = EtlError::NoReportingColumnFound { sheet: "Balans".into() };
        assert_eq!(err.to_string(), "no reporting column found in sheet Balans");

        let err = EtlError::UnreadableSource {
            path: PathBuf::from("x.xlsx"),
            reason: "zip".into(),
        };
        assert_eq!(err.to_string(), "unreadable source x.xlsx: zip");
    }
}
