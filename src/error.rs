use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// What an on-screen identity check was confirming
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Printer,
    Report,
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetKind::Printer => write!(f, "printer"),
            TargetKind::Report => write!(f, "report"),
        }
    }
}

/// Stage of export confirmation that ran out of time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    Appear,
    Stabilize,
}

impl std::fmt::Display for ExportStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportStage::Appear => write!(f, "appear"),
            ExportStage::Stabilize => write!(f, "stabilize"),
        }
    }
}

/// Fatal errors. Any of these stops the save call and leaves the current
/// document (and everything after it) in the queue.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("element {element} did not become active within {timeout:?} (top dialog: `{top_dialog}`)")]
    ElementTimeout {
        element: String,
        timeout: Duration,
        top_dialog: String,
    },

    #[error("{target} verification failed: expected `{expected}`, read `{observed}` ({confidence:.1} < {threshold:.1})")]
    InvalidTarget {
        target: TargetKind,
        expected: String,
        observed: String,
        confidence: f64,
        threshold: f64,
    },

    #[error("stale export at {path:?}: content changed but file is {age:?} old")]
    StaleExport { path: PathBuf, age: Duration },

    #[error("export file {path:?} did not {stage} within {timeout:?}")]
    ExportTimeout {
        path: PathBuf,
        stage: ExportStage,
        timeout: Duration,
    },

    #[error("no progress on `{document}` after {transitions} transitions (top dialog: `{top_dialog}`)")]
    Stalled {
        document: String,
        transitions: u32,
        top_dialog: String,
    },

    #[error("no pixels matching #{color} found")]
    RegionNotFound { color: String },

    #[error("cannot remove {removed} of {available} {axis}")]
    InvalidCropDimensions {
        axis: &'static str,
        removed: u32,
        available: u32,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Platform error: {0}")]
    Platform(#[from] anyhow::Error),
}

/// Failures that a retry loop absorbs. They are logged and counted but never
/// returned from a save call.
#[derive(Error, Debug)]
pub enum RecoverableError {
    #[error("failed to close `{title}`: {source}")]
    Close {
        title: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to dismiss `{title}`: {source}")]
    Dismiss {
        title: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("no dialog is open")]
    NothingOpen,
}

pub type Result<T> = std::result::Result<T, ExportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_target_message() {
        let err = ExportError::InvalidTarget {
            target: TargetKind::Printer,
            expected: "Microsoft Print to PDF".into(),
            observed: "OneNote".into(),
            confidence: 31.0,
            threshold: 90.0,
        };
        let msg = err.to_string();
        assert!(msg.starts_with("printer verification failed"));
        assert!(msg.contains("31.0 < 90.0"));
    }

    #[test]
    fn test_anyhow_lifts_into_platform() {
        fn primitive() -> anyhow::Result<()> {
            Err(anyhow::anyhow!("COM not initialized"))
        }
        fn fails() -> Result<()> {
            primitive()?;
            Ok(())
        }
        assert!(matches!(fails(), Err(ExportError::Platform(_))));
    }
}
