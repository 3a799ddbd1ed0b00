use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};

pub use super::cloud_trace_context::{CloudTraceContext, X_CLOUD_TRACE_CONTEXT_HEADER};

#[derive(Debug, Clone, Default)]
pub struct CloudTraceContextAxum(pub CloudTraceContext);

impl CloudTraceContextAxum {
    async fn from_request_parts_impl<S: Send + Sync>(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Self, Infallible> {
        Ok(CloudTraceContextAxum(CloudTraceContext::from_headers(
            &parts.headers,
        )))
    }
}

impl<S> FromRequestParts<S> for CloudTraceContextAxum
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        CloudTraceContextAxum::from_request_parts_impl(parts, state).into_future()
    }
}

impl From<CloudTraceContextAxum> for CloudTraceContext {
    fn from(value: CloudTraceContextAxum) -> Self {
        value.0
    }
}
