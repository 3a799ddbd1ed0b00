use axum::http::HeaderMap;

pub const X_CLOUD_TRACE_CONTEXT_HEADER: &str = "x-cloud-trace-context";

const SAMPLED_MARKER: &str = "o=1";

/// `TRACE_ID/SPAN_ID;o=TRACE_TRUE`, every part omittable from the right.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloudTraceContext {
    trace_id: String,
    span_id: String,
    sampled: bool,
}

impl CloudTraceContext {
    pub fn new(trace_id: impl Into<String>, span_id: impl Into<String>, sampled: bool) -> Self {
        Self {
            trace_id: trace_id.into(),
            span_id: span_id.into(),
            sampled,
        }
    }

    /// Never fails. Only the first `/` segment and the first two `;`
    /// sub-segments of the second one are looked at.
    pub fn parse(raw: &str) -> Self {
        let mut parts = raw.split('/');
        let Some(trace_id) = parts.next() else {
            return Self::default();
        };
        let mut ctx = Self::new(trace_id, "", false);

        let Some(rest) = parts.next() else {
            return ctx;
        };
        let mut options = rest.split(';');
        let Some(span_id) = options.next() else {
            return ctx;
        };
        if span_id != "0" {
            ctx.span_id = span_id.to_string();
        }

        if let Some(flag) = options.next() {
            ctx.sampled = flag == SAMPLED_MARKER;
        }
        ctx
    }

    pub fn from_headers(headers: &HeaderMap) -> Self {
        let Some(value) = headers.get(X_CLOUD_TRACE_CONTEXT_HEADER) else {
            return Self::default();
        };
        Self::parse(&String::from_utf8_lossy(value.as_bytes()))
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn span_id(&self) -> &str {
        &self.span_id
    }

    pub fn is_sampled(&self) -> bool {
        self.sampled
    }
}
