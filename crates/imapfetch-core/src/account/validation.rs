//! Account validation.

use super::model::Account;
use crate::folder::FolderFilter;

/// Validation error for account configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Archive path is empty.
    EmptyArchive,
    /// IMAP server is empty.
    EmptyServer,
    /// IMAP port is invalid.
    InvalidPort,
    /// Username is empty.
    EmptyUsername,
    /// Password is empty.
    EmptyPassword,
    /// An exclude pattern is not a valid glob.
    InvalidExclude {
        /// The offending pattern.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl ValidationError {
    /// Get the field name this error relates to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::EmptyArchive => "archive",
            Self::EmptyServer => "server",
            Self::InvalidPort => "port",
            Self::EmptyUsername => "username",
            Self::EmptyPassword => "password",
            Self::InvalidExclude { .. } => "exclude",
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyArchive => f.write_str("archive path is required"),
            Self::EmptyServer => f.write_str("IMAP server is required"),
            Self::InvalidPort => f.write_str("IMAP port must be 1-65535"),
            Self::EmptyUsername => f.write_str("username is required"),
            Self::EmptyPassword => f.write_str("password is required"),
            Self::InvalidExclude { pattern, reason } => {
                write!(f, "invalid exclude pattern {pattern:?}: {reason}")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Result of validating an account.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Validate an account configuration.
///
/// Returns `Ok(())` if valid, or `Err(Vec<ValidationError>)` with all errors.
///
/// # Errors
///
/// Returns a vector of `ValidationError` if any fields are invalid.
pub fn validate_account(account: &Account) -> ValidationResult {
    let mut errors = Vec::new();

    if account.archive.as_os_str().is_empty() {
        errors.push(ValidationError::EmptyArchive);
    }

    if account.server.trim().is_empty() {
        errors.push(ValidationError::EmptyServer);
    }
    if account.port == Some(0) {
        errors.push(ValidationError::InvalidPort);
    }

    if account.username.trim().is_empty() {
        errors.push(ValidationError::EmptyUsername);
    }
    if account.password.is_empty() {
        errors.push(ValidationError::EmptyPassword);
    }

    for pattern in &account.exclude {
        if let Err(err) = FolderFilter::compile(pattern) {
            errors.push(ValidationError::InvalidExclude {
                pattern: pattern.clone(),
                reason: err.msg.to_string(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
