//! Domain error types.

/// Columns whose values must be unique across the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Username,
    Email,
    FederatedIdentity,
    NewsletterAddress,
    GameName,
    GameLink,
}

impl UniqueField {
    /// User-visible message for a collision on this field.
    pub fn conflict_message(self) -> &'static str {
        match self {
            UniqueField::Username => "Username already in use.",
            UniqueField::Email => "Email already in use.",
            UniqueField::FederatedIdentity => "That account is already linked.",
            UniqueField::NewsletterAddress => "Address is already in database.",
            UniqueField::GameName => "Game name already in use.",
            UniqueField::GameLink => "Link URL already in use.",
        }
    }
}

/// Generic local-login failure. Deliberately identical for unknown users and bad passwords.
pub const INVALID_CREDENTIALS: &str = "Incorrect username or password.";

/// Top-level error type for squirrel.
#[derive(Debug, thiserror::Error)]
pub enum SquirrelError {
    #[error("{reason}")]
    Validation { reason: String },

    #[error("Invalid request.")]
    InvalidRequest,

    #[error("{}", field.conflict_message())]
    Conflict { field: UniqueField },

    #[error("Incorrect username or password.")]
    InvalidCredentials,

    #[error("No user logged in.")]
    Anonymous,

    #[error("{reason}")]
    NotFound { reason: String },

    #[error("That is not a properly formatted userId.")]
    MalformedId,

    #[error("identity provider error: {reason}")]
    Provider { reason: String },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("password hashing error: {reason}")]
    PasswordHash { reason: String },

    #[error("internal error: {reason}")]
    Internal { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SquirrelError {
    pub fn validation(reason: impl Into<String>) -> Self {
        SquirrelError::Validation {
            reason: reason.into(),
        }
    }

    pub fn not_found(reason: impl Into<String>) -> Self {
        SquirrelError::NotFound {
            reason: reason.into(),
        }
    }

    pub fn conflict(field: UniqueField) -> Self {
        SquirrelError::Conflict { field }
    }
}

impl From<r2d2::Error> for SquirrelError {
    fn from(err: r2d2::Error) -> Self {
        SquirrelError::Database {
            reason: err.to_string(),
        }
    }
}

impl From<&SquirrelError> for std::process::ExitCode {
    fn from(err: &SquirrelError) -> Self {
        let code: u8 = match err {
            SquirrelError::Io(_) | SquirrelError::Internal { .. } => 1,
            SquirrelError::ConfigParse { .. }
            | SquirrelError::ConfigMissing { .. }
            | SquirrelError::ConfigInvalid { .. } => 2,
            SquirrelError::Database { .. } | SquirrelError::DatabaseQuery { .. } => 3,
            SquirrelError::PasswordHash { .. } => 4,
            SquirrelError::NotFound { .. } | SquirrelError::Anonymous => 5,
            SquirrelError::Validation { .. }
            | SquirrelError::InvalidRequest
            | SquirrelError::MalformedId
            | SquirrelError::Conflict { .. }
            | SquirrelError::InvalidCredentials
            | SquirrelError::Provider { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_message_names_the_field() {
        assert_eq!(
            SquirrelError::conflict(UniqueField::Username).to_string(),
            "Username already in use."
        );
        assert_eq!(
            SquirrelError::conflict(UniqueField::Email).to_string(),
            "Email already in use."
        );
    }

    #[test]
    fn invalid_credentials_uses_generic_phrase() {
        assert_eq!(SquirrelError::InvalidCredentials.to_string(), INVALID_CREDENTIALS);
    }
}
