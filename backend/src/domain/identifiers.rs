//! Identifier newtypes for compute instances and their owning projects.
//!
//! Both identifiers are opaque strings owned by the compute system. They are
//! validated only for shape (non-empty, no surrounding whitespace) because
//! they double as cache key suffixes.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors returned when constructing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierValidationError {
    /// Identifier is empty after trimming whitespace.
    #[error("{kind} must not be empty")]
    Empty { kind: &'static str },
    /// Identifier contains leading or trailing whitespace.
    #[error("{kind} must not contain surrounding whitespace")]
    ContainsWhitespace { kind: &'static str },
}

fn validate(kind: &'static str, raw: &str) -> Result<(), IdentifierValidationError> {
    if raw.trim().is_empty() {
        return Err(IdentifierValidationError::Empty { kind });
    }
    if raw.trim() != raw {
        return Err(IdentifierValidationError::ContainsWhitespace { kind });
    }
    Ok(())
}

macro_rules! define_identifier {
    ($(#[$meta:meta])* $name:ident => $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validate and construct the identifier.
            pub fn new(value: impl Into<String>) -> Result<Self, IdentifierValidationError> {
                let raw = value.into();
                validate($kind, &raw)?;
                Ok(Self(raw))
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdentifierValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

define_identifier! {
    /// Compute instance identifier (the `uuid` column).
    ///
    /// # Examples
    /// ```
    /// use instance_sync::domain::InstanceId;
    ///
    /// let id = InstanceId::new("u1").expect("valid id");
    /// assert_eq!(id.as_str(), "u1");
    /// ```
    InstanceId => "instance id"
}

define_identifier! {
    /// Tenant (project) identifier used to scope instance listings.
    ProjectId => "project id"
}
