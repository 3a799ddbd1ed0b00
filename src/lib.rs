//! Correlates application logs with Google Cloud Trace.
//!
//! The `X-Cloud-Trace-Context` header of an inbound request is parsed into a
//! [`CloudTraceContext`] and turned into the `logging.googleapis.com/*` fields
//! Cloud Logging uses to attach a log entry to its trace.

pub mod cloud_trace_context;
pub mod cloud_trace_context_axum;
pub mod log_fields;
pub mod middleware;
pub mod project_id;
pub mod setup_tracing;

pub use cloud_trace_context::{CloudTraceContext, X_CLOUD_TRACE_CONTEXT_HEADER};
pub use cloud_trace_context_axum::CloudTraceContextAxum;
pub use log_fields::{CloudTraceFields, LogField, LogValue};
pub use middleware::cloud_trace_span;
pub use project_id::{CloudRunProjectId, MetadataClient, ProjectIdResolver, StaticProjectId};
pub use setup_tracing::{CloudLoggingFormat, cloud_logging_layer};
