//! Per-call credential attachment.
//!
//! A [`PerCallCredentials`] implementation contributes metadata to a call's
//! outgoing headers before it's dispatched - an API key, a bearer token, a
//! signature over the method name. Failure to produce that metadata fails
//! the call outright with [`crate::error::Code::Unauthenticated`]; there is
//! no partial-credentials mode.

use async_trait::async_trait;
use http::HeaderMap;

use crate::error::Status;

/// A source of per-call credential metadata.
#[async_trait]
pub trait PerCallCredentials: Send + Sync + 'static {
    /// Produce metadata to merge into the call's outgoing headers for the
    /// method named by `method`.
    ///
    /// # Errors
    ///
    /// Any error returned here is surfaced to the caller as
    /// [`crate::error::Code::Unauthenticated`], regardless of the error's
    /// own classification - credential failures are never retried with a
    /// different status by this layer.
    async fn metadata(&self, method: &str) -> Result<HeaderMap, Status>;
}

/// Merge the metadata from a [`PerCallCredentials`] into `headers`, mapping
/// any failure to [`crate::error::Code::Unauthenticated`].
///
/// # Errors
///
/// Returns `Status::unauthenticated` if the credentials provider fails.
pub async fn attach(
    credentials: &dyn PerCallCredentials,
    method: &str,
    headers: &mut HeaderMap,
) -> Result<(), Status> {
    let extra = credentials.metadata(method).await.map_err(|err| {
        Status::unauthenticated(format!("per-call credentials rejected: {err}"))
    })?;
    headers.extend(extra);
    Ok(())
}

/// Credentials that always attach a single static header.
///
/// Mostly useful for tests and for hosts with a single static API key; real
/// deployments are expected to implement [`PerCallCredentials`] directly.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    header_name: http::HeaderName,
    header_value: http::HeaderValue,
}

impl StaticCredentials {
    /// Build static credentials from a fixed header name/value pair.
    #[must_use]
    pub fn new(header_name: http::HeaderName, header_value: http::HeaderValue) -> Self {
        Self {
            header_name,
            header_value,
        }
    }
}

#[async_trait]
impl PerCallCredentials for StaticCredentials {
    async fn metadata(&self, _method: &str) -> Result<HeaderMap, Status> {
        let mut headers = HeaderMap::new();
        headers.insert(self.header_name.clone(), self.header_value.clone());
        Ok(headers)
    }
}
