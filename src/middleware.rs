use std::sync::Arc;

use axum::{extract::Request, extract::State, middleware::Next, response::Response};
use tracing::Instrument;

use super::log_fields::CloudTraceFields;
use super::project_id::ProjectIdResolver;

/// Runs the rest of the stack inside a span carrying the Cloud Trace log
/// fields of the request.
pub async fn cloud_trace_span(
    State(resolver): State<Arc<dyn ProjectIdResolver>>,
    request: Request,
    next: Next,
) -> Response {
    let fields = CloudTraceFields::from_headers(request.headers(), resolver.as_ref()).await;
    next.run(request).instrument(fields.span()).await
}
