//! Index-name admissibility checks.

use thiserror::Error;

/// Characters that cannot appear in an index name because the name doubles
/// as an on-disk directory name.
pub const INVALID_FILENAME_CHARS: &[char] = &['\\', '/', '*', '?', '"', '<', '>', '|', ':'];

/// Why a candidate index name was rejected. The checks run in a fixed
/// order, so the same input always reports the same reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidIndexNameReason {
    #[error("must not be empty")]
    Empty,
    #[error("must not contain whitespace")]
    WhitespaceForbidden,
    #[error("must not contain ','")]
    CommaForbidden,
    #[error("must not contain '#'")]
    HashForbidden,
    #[error("must not start with '_'")]
    LeadingUnderscoreForbidden,
    #[error("must be lowercase")]
    MustBeLowercase,
    #[error("must not contain the following characters \\, /, *, ?, \", <, >, |, :")]
    IllegalFilesystemChar,
    #[error("an alias with the same name already exists")]
    CollidesWithAlias,
}

/// Checks a candidate index name against the naming rules. Existence and
/// alias collisions are the caller's concern; this predicate only looks at
/// the name itself.
pub fn validate_index_name(name: &str) -> Result<(), InvalidIndexNameReason> {
    if name.is_empty() {
        return Err(InvalidIndexNameReason::Empty);
    }
    if name.contains(char::is_whitespace) {
        return Err(InvalidIndexNameReason::WhitespaceForbidden);
    }
    if name.contains(',') {
        return Err(InvalidIndexNameReason::CommaForbidden);
    }
    if name.contains('#') {
        return Err(InvalidIndexNameReason::HashForbidden);
    }
    if name.starts_with('_') {
        return Err(InvalidIndexNameReason::LeadingUnderscoreForbidden);
    }
    if name.to_lowercase() != name {
        return Err(InvalidIndexNameReason::MustBeLowercase);
    }
    if name.contains(INVALID_FILENAME_CHARS) {
        return Err(InvalidIndexNameReason::IllegalFilesystemChar);
    }
    Ok(())
}
