use std::fmt;

use thiserror::Error;

/// Why a configured repository identifier was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RepositoryParseError {
    #[error("repository '{0}' is not of the form owner/name")]
    MissingSeparator(String),
    #[error("repository '{0}' contains more than one '/'")]
    TooManySeparators(String),
    #[error("repository '{0}' has an empty owner or name")]
    EmptyComponent(String),
    #[error("repository '{0}' has an owner or name outside [A-Za-z0-9._-] or equal to '.'/'..'")]
    InvalidComponent(String),
}

/// One monitored repository, split from an `owner/name` identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryTarget {
    pub owner: String,
    pub name: String,
}

impl RepositoryTarget {
    /// Splits `owner/name` into its two parts. Exactly one separator and
    /// two non-empty parts made of ASCII letters, digits, `.`, `_` and `-` are
    /// required. Both parts end up verbatim in a URL path.
    pub fn parse(identifier: &str) -> Result<Self, RepositoryParseError> {
        let mut parts = identifier.split('/');
        let (owner, name) = match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(name), None) => (owner, name),
            (_, None, _) => {
                return Err(RepositoryParseError::MissingSeparator(
                    identifier.to_string(),
                ))
            }
            _ => {
                return Err(RepositoryParseError::TooManySeparators(
                    identifier.to_string(),
                ))
            }
        };

        if owner.trim().is_empty() || name.trim().is_empty() {
            return Err(RepositoryParseError::EmptyComponent(identifier.to_string()));
        }
        if !is_valid_component(owner) || !is_valid_component(name) {
            return Err(RepositoryParseError::InvalidComponent(
                identifier.to_string(),
            ));
        }

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

fn is_valid_component(part: &str) -> bool {
    part != "."
        && part != ".."
        && part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

impl fmt::Display for RepositoryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}
