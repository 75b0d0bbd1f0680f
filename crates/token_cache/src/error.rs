// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for token cache operations.

use std::fmt;

/// The step of a cache access that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Operation {
    /// Reading a blob from the backing store.
    Read,
    /// Writing a blob to the backing store.
    Write,
    /// Removing a blob from the backing store.
    Remove,
    /// Computing the partition key.
    Key,
    /// Encrypting a blob before it is persisted.
    Protect,
    /// Decrypting a blob after it is read.
    Unprotect,
    /// Serializing the host's token collection.
    Serialize,
    /// Loading bytes into the host's token collection.
    Deserialize,
    /// Acquiring or releasing a partition write lock.
    Lock,
    /// The operation was cancelled through its cancellation token.
    Cancelled,
    /// A hook panicked.
    Hook,
}

impl Operation {
    /// Returns a short, stable name for the operation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Remove => "remove",
            Self::Key => "key",
            Self::Protect => "protect",
            Self::Unprotect => "unprotect",
            Self::Serialize => "serialize",
            Self::Deserialize => "deserialize",
            Self::Lock => "lock",
            Self::Cancelled => "cancelled",
            Self::Hook => "hook",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error from a token cache operation.
///
/// The error records which [`Operation`] failed and wraps the underlying cause. Backing
/// stores, encryptors and hosts build errors through the helper constructors so that the
/// provider and its logs can tell a failed read from a failed write.
///
/// # Examples
///
/// ```
/// use token_cache::{Error, Operation};
///
/// let error = Error::read("connection refused");
/// assert_eq!(error.operation(), Operation::Read);
/// assert!(error.to_string().contains("connection refused"));
/// ```
#[ohno::error]
#[display("token cache {operation} failed")]
pub struct Error {
    operation: Operation,
}

impl Error {
    /// Returns the operation that failed.
    #[must_use]
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Creates an error for a failed backing-store read.
    pub fn read(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(Operation::Read, cause)
    }

    /// Creates an error for a failed backing-store write.
    pub fn write(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(Operation::Write, cause)
    }

    /// Creates an error for a failed backing-store removal.
    pub fn remove(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(Operation::Remove, cause)
    }

    /// Creates an error for a partition key that could not be computed.
    pub fn key(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(Operation::Key, cause)
    }

    /// Creates an error for a failed encryption.
    pub fn protect(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(Operation::Protect, cause)
    }

    /// Creates an error for a payload that could not be decrypted.
    pub fn unprotect(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(Operation::Unprotect, cause)
    }

    /// Creates an error for a token collection that could not be serialized.
    pub fn serialize(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(Operation::Serialize, cause)
    }

    /// Creates an error for bytes the host could not load.
    pub fn deserialize(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(Operation::Deserialize, cause)
    }

    /// Creates an error for a lock that could not be acquired or released.
    pub fn lock(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(Operation::Lock, cause)
    }

    /// Creates an error for an operation abandoned because its token was cancelled.
    #[must_use]
    pub fn cancelled(during: Operation) -> Self {
        Self::caused_by(Operation::Cancelled, format!("{during} was cancelled"))
    }

    /// Returns `true` if the operation was abandoned due to cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.operation == Operation::Cancelled
    }
}

/// A specialized [`Result`] type for token cache operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_operation_and_cause() {
        let error = Error::write("disk full");
        let display = error.to_string();
        assert!(display.starts_with("token cache write failed"), "got: {display}");
        assert!(display.contains("disk full"), "got: {display}");
    }

    #[test]
    fn helpers_record_operation() {
        assert_eq!(Error::read("x").operation(), Operation::Read);
        assert_eq!(Error::remove("x").operation(), Operation::Remove);
        assert_eq!(Error::key("x").operation(), Operation::Key);
        assert_eq!(Error::protect("x").operation(), Operation::Protect);
        assert_eq!(Error::deserialize("x").operation(), Operation::Deserialize);
    }

    #[test]
    fn cancelled_mentions_interrupted_operation() {
        let error = Error::cancelled(Operation::Read);
        assert!(error.is_cancelled());
        assert!(error.to_string().contains("read was cancelled"));
    }

    #[test]
    fn result_alias_propagates_errors() {
        fn fails() -> Result<u8> {
            Err(Error::serialize("bad state"))
        }

        let err = fails().expect_err("should fail");
        assert_eq!(err.operation(), Operation::Serialize);
    }
}
