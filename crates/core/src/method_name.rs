//! Method name parsing and validation.
//!
//! A method name identifies a single RPC within a service, in the familiar
//! `/package.Service/Method` shape - not because anything here speaks that
//! wire protocol, but because it's a format every host application and
//! every example in this crate's test suite already knows how to read.

use crate::error::Status;

/// A validated `/service/method` name.
///
/// Construction is the only place validation happens; once you have a
/// `MethodName` its two halves are guaranteed non-empty. A name handed to
/// [`MethodName::parse`] without its leading `/` is auto-prefixed rather
/// than rejected - only the service/method split and non-emptiness are
/// actually validated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodName {
    full: String,
    service_len: usize,
}

impl MethodName {
    /// Parse and validate a full method name of the form `/service/method`.
    ///
    /// A name missing its leading `/` is prefixed with one rather than
    /// rejected.
    ///
    /// # Errors
    ///
    /// Returns `Status::invalid_argument` if the name doesn't contain
    /// exactly one `/` separating service from method, or either half is
    /// empty.
    pub fn parse(full: impl Into<String>) -> Result<Self, Status> {
        let mut full = full.into();
        if !full.starts_with('/') {
            full.insert(0, '/');
        }
        let rest = &full[1..];
        let slash = rest.find('/').ok_or_else(|| {
            Status::invalid_argument(format!("method name must contain a service and a method: {full}"))
        })?;
        let (service, method) = (&rest[..slash], &rest[slash + 1..]);
        if service.is_empty() || method.is_empty() {
            return Err(Status::invalid_argument(format!(
                "method name's service and method must both be non-empty: {full}"
            )));
        }
        if method.contains('/') {
            return Err(Status::invalid_argument(format!(
                "method name must contain exactly one service/method separator: {full}"
            )));
        }
        let service_len = 1 + slash;
        Ok(Self { full, service_len })
    }

    /// The full name, e.g. `/chanrpc.Echo/Say`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.full
    }

    /// The service portion, e.g. `chanrpc.Echo`.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.full[1..self.service_len]
    }

    /// The method portion, e.g. `Say`.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.full[self.service_len + 1..]
    }
}

impl std::fmt::Display for MethodName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.full)
    }
}

impl std::str::FromStr for MethodName {
    type Err = Status;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_service_and_method() {
        let name = MethodName::parse("/chanrpc.Echo/Say").unwrap();
        assert_eq!(name.service(), "chanrpc.Echo");
        assert_eq!(name.method(), "Say");
        assert_eq!(name.as_str(), "/chanrpc.Echo/Say");
    }

    #[test]
    fn missing_leading_slash_is_auto_prefixed() {
        let name = MethodName::parse("chanrpc.Echo/Say").unwrap();
        assert_eq!(name.as_str(), "/chanrpc.Echo/Say");
        assert_eq!(name.service(), "chanrpc.Echo");
        assert_eq!(name.method(), "Say");
    }

    #[test]
    fn rejects_missing_method_separator() {
        let err = MethodName::parse("/chanrpc.Echo").unwrap_err();
        assert_eq!(err.code(), crate::error::Code::InvalidArgument);
    }

    #[test]
    fn rejects_empty_service_or_method() {
        assert!(MethodName::parse("//Say").is_err());
        assert!(MethodName::parse("/chanrpc.Echo/").is_err());
    }

    #[test]
    fn rejects_extra_separators() {
        let err = MethodName::parse("/chanrpc.Echo/Say/Extra").unwrap_err();
        assert_eq!(err.code(), crate::error::Code::InvalidArgument);
    }
}
