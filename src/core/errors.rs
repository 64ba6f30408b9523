//! Error taxonomy for the reconciliation core.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::util::diagnostic::Diagnostic;

/// Coarse error category, for callers that only need to branch on kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Parse,
    Manifest,
    Validation,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Io => write!(f, "io"),
            ErrorKind::Parse => write!(f, "parse"),
            ErrorKind::Manifest => write!(f, "manifest"),
            ErrorKind::Validation => write!(f, "validation"),
        }
    }
}

/// Error raised by the scanner, the manifest model, or the reconciler.
///
/// None of these are retried: every variant is a local, deterministic
/// failure and aborts the whole run.
#[derive(Debug, Error)]
pub enum DepsyncError {
    #[error("failed to read `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("syntax error in `{}` on line {line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("invalid manifest `{}`: {message}", path.display())]
    Manifest { path: PathBuf, message: String },

    #[error("{message}")]
    Validation { message: String },
}

impl DepsyncError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        DepsyncError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn manifest(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        DepsyncError::Manifest {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        DepsyncError::Validation {
            message: message.into(),
        }
    }

    /// The category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DepsyncError::Io { .. } => ErrorKind::Io,
            DepsyncError::Parse { .. } => ErrorKind::Parse,
            DepsyncError::Manifest { .. } => ErrorKind::Manifest,
            DepsyncError::Validation { .. } => ErrorKind::Validation,
        }
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            DepsyncError::Io { path, source } => Diagnostic::error(format!(
                "could not read `{}`",
                path.display()
            ))
            .with_location(path)
            .with_context(source.to_string())
            .with_suggestion("Check that the path exists and is readable"),

            DepsyncError::Parse {
                path,
                line,
                message,
            } => Diagnostic::error(format!("syntax error: {}", message))
                .with_location(path)
                .with_context(format!("on line {}", line))
                .with_suggestion(
                    "Fix the file or exclude it; usage analysis refuses to run on a partial scan",
                ),

            DepsyncError::Manifest { path, message } => {
                Diagnostic::error(format!("invalid manifest: {}", message))
                    .with_location(path)
                    .with_suggestion("Run `composer validate` to locate the problem")
            }

            DepsyncError::Validation { message } => Diagnostic::error(message.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        let err = DepsyncError::io("src", io::Error::from(io::ErrorKind::NotFound));
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(DepsyncError::validation("x").kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_parse_error_diagnostic() {
        let err = DepsyncError::Parse {
            path: PathBuf::from("src/Broken.php"),
            line: 12,
            message: "unclosed `{`".to_string(),
        };

        assert_eq!(
            err.to_string(),
            "syntax error in `src/Broken.php` on line 12: unclosed `{`"
        );

        let output = err.to_diagnostic().format(false);
        assert!(output.contains("syntax error: unclosed `{`"));
        assert!(output.contains("src/Broken.php"));
        assert!(output.contains("on line 12"));
    }
}
