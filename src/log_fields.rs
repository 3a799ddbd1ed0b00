//! Structured log fields that let Cloud Logging tie an entry to its trace.
//!
//! Fields are only present when they carry something: no trace ID means no
//! trace field, a missing span means no span field, and the sampled flag is
//! emitted only when it is `true`.

use axum::http::HeaderMap;
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::{Span, field::Empty};

use super::cloud_trace_context::CloudTraceContext;
use super::project_id::ProjectIdResolver;

pub const TRACE_KEY: &str = "logging.googleapis.com/trace";
pub const SPAN_ID_KEY: &str = "logging.googleapis.com/spanId";
pub const TRACE_SAMPLED_KEY: &str = "logging.googleapis.com/trace_sampled";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogValue {
    String(String),
    Bool(bool),
}

impl From<&LogValue> for serde_json::Value {
    fn from(value: &LogValue) -> Self {
        match value {
            LogValue::String(s) => serde_json::Value::String(s.clone()),
            LogValue::Bool(b) => serde_json::Value::Bool(*b),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogField {
    pub key: &'static str,
    pub value: LogValue,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloudTraceFields(Vec<LogField>);

impl CloudTraceFields {
    /// An unknown project still produces a trace field, as
    /// `projects//traces/<trace_id>`.
    pub fn new(ctx: &CloudTraceContext, project_id: Option<&str>) -> Self {
        let mut fields = vec![];
        if !ctx.trace_id().is_empty() {
            fields.push(LogField {
                key: TRACE_KEY,
                value: LogValue::String(format!(
                    "projects/{}/traces/{}",
                    project_id.unwrap_or_default(),
                    ctx.trace_id()
                )),
            });
        }
        if !ctx.span_id().is_empty() {
            fields.push(LogField {
                key: SPAN_ID_KEY,
                value: LogValue::String(ctx.span_id().to_string()),
            });
        }
        if ctx.is_sampled() {
            fields.push(LogField {
                key: TRACE_SAMPLED_KEY,
                value: LogValue::Bool(true),
            });
        }
        Self(fields)
    }

    /// The resolver is consulted only when there is a trace ID to qualify.
    pub async fn resolve(ctx: &CloudTraceContext, resolver: &dyn ProjectIdResolver) -> Self {
        let project_id = if ctx.trace_id().is_empty() {
            None
        } else {
            resolver.resolve().await
        };
        Self::new(ctx, project_id.as_deref())
    }

    pub async fn from_headers(headers: &HeaderMap, resolver: &dyn ProjectIdResolver) -> Self {
        Self::resolve(&CloudTraceContext::from_headers(headers), resolver).await
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogField> {
        self.0.iter()
    }

    pub fn get(&self, key: &str) -> Option<&LogValue> {
        self.0.iter().find(|x| x.key == key).map(|x| &x.value)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Map<String, serde_json::Value> {
        self.0
            .iter()
            .map(|x| (x.key.to_string(), serde_json::Value::from(&x.value)))
            .collect()
    }

    pub fn span(&self) -> Span {
        let span = tracing::info_span!(
            "request",
            "logging.googleapis.com/trace" = Empty,
            "logging.googleapis.com/spanId" = Empty,
            "logging.googleapis.com/trace_sampled" = Empty,
        );
        for field in &self.0 {
            match &field.value {
                LogValue::String(s) => span.record(field.key, s.as_str()),
                LogValue::Bool(b) => span.record(field.key, *b),
            };
        }
        span
    }
}

impl Serialize for CloudTraceFields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for field in &self.0 {
            match &field.value {
                LogValue::String(s) => map.serialize_entry(field.key, s)?,
                LogValue::Bool(b) => map.serialize_entry(field.key, b)?,
            }
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::project_id::StaticProjectId;

    struct CountingResolver(AtomicUsize);

    #[async_trait::async_trait]
    impl ProjectIdResolver for CountingResolver {
        async fn resolve(&self) -> Option<String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Some("counted".to_string())
        }
    }

    fn fields_of(raw: &str) -> CloudTraceFields {
        CloudTraceFields::new(&CloudTraceContext::parse(raw), None)
    }

    fn string(s: &str) -> LogValue {
        LogValue::String(s.to_string())
    }

    #[test]
    fn test_fields_without_project() {
        let fields = fields_of("105445aa7843bc8bf206b120001000/000000000000004a;o=1");
        assert_eq!(
            fields.get(TRACE_KEY),
            Some(&string("projects//traces/105445aa7843bc8bf206b120001000"))
        );
        assert_eq!(fields.get(SPAN_ID_KEY), Some(&string("000000000000004a")));
        assert_eq!(fields.get(TRACE_SAMPLED_KEY), Some(&LogValue::Bool(true)));

        let fields = fields_of("105445aa7843bc8bf206b120001000/000000000000004a;o=0");
        assert_eq!(fields.len(), 2);
        assert_eq!(fields.get(TRACE_SAMPLED_KEY), None);
    }

    #[test]
    fn test_absent_values_are_omitted() {
        assert!(fields_of("").is_empty());

        let fields = fields_of("/0;o=1");
        assert_eq!(
            fields.iter().map(|x| x.key).collect::<Vec<_>>(),
            vec![TRACE_SAMPLED_KEY]
        );

        let fields = fields_of("105445aa7843bc8bf206b120001000/0");
        assert_eq!(
            fields.iter().map(|x| x.key).collect::<Vec<_>>(),
            vec![TRACE_KEY]
        );
    }

    #[test]
    fn test_field_order_and_json() {
        let ctx = CloudTraceContext::parse("abc/42;o=1");
        let fields = CloudTraceFields::new(&ctx, Some("demo"));
        assert_eq!(
            fields.iter().map(|x| x.key).collect::<Vec<_>>(),
            vec![TRACE_KEY, SPAN_ID_KEY, TRACE_SAMPLED_KEY]
        );

        let expected = serde_json::json!({
            "logging.googleapis.com/trace": "projects/demo/traces/abc",
            "logging.googleapis.com/spanId": "42",
            "logging.googleapis.com/trace_sampled": true,
        });
        assert_eq!(serde_json::to_value(&fields).unwrap(), expected);
        assert_eq!(serde_json::Value::Object(fields.to_json()), expected);
    }

    #[tokio::test]
    async fn test_resolver_only_used_with_trace_id() {
        let resolver = CountingResolver(AtomicUsize::new(0));

        let fields = CloudTraceFields::resolve(&CloudTraceContext::parse("/7;o=1"), &resolver).await;
        assert_eq!(fields.len(), 2);
        assert_eq!(resolver.0.load(Ordering::SeqCst), 0);

        let fields = CloudTraceFields::resolve(&CloudTraceContext::parse("abc"), &resolver).await;
        assert_eq!(fields.get(TRACE_KEY), Some(&string("projects/counted/traces/abc")));
        assert_eq!(resolver.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-cloud-trace-context",
            HeaderValue::from_static("abc/0;o=1"),
        );
        let fields = CloudTraceFields::from_headers(&headers, &StaticProjectId::new("p")).await;
        assert_eq!(
            serde_json::to_value(&fields).unwrap(),
            serde_json::json!({
                "logging.googleapis.com/trace": "projects/p/traces/abc",
                "logging.googleapis.com/trace_sampled": true,
            })
        );

        let fields = CloudTraceFields::from_headers(&HeaderMap::new(), &StaticProjectId::new("p")).await;
        assert!(fields.is_empty());
    }
}
