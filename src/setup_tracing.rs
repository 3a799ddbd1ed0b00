use std::fmt;
use std::fmt::Write as _;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::{JsonFields, Writer};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormattedFields, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

const LOG_FORMAT_ENV: &str = "LOG_FORMAT";
const CLOUD_LOGGING_PREFIX: &str = "logging.googleapis.com/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl LogFormat {
    pub fn from_env() -> Self {
        Self::from_value(std::env::var(LOG_FORMAT_ENV).ok().as_deref())
    }

    fn from_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("pretty") | Some("text") => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

/// Writes each event as one flat JSON object. `logging.googleapis.com/*`
/// fields of the enclosing spans are lifted to the top level, the innermost
/// span winning; fields on the event itself win over both.
#[derive(Debug, Clone, Copy, Default)]
pub struct CloudLoggingFormat;

fn severity(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARNING",
        Level::INFO => "INFO",
        _ => "DEBUG",
    }
}

struct JsonVisitor<'a>(&'a mut serde_json::Map<String, serde_json::Value>);

impl Visit for JsonVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), value.into());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.0.insert(field.name().to_string(), value.into());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.0.insert(field.name().to_string(), value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.0.insert(field.name().to_string(), value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.0.insert(field.name().to_string(), value.into());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0
            .insert(field.name().to_string(), format!("{value:?}").into());
    }
}

impl<S> FormatEvent<S, JsonFields> for CloudLoggingFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, JsonFields>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        let mut record = serde_json::Map::new();
        record.insert("severity".to_string(), severity(meta.level()).into());
        record.insert("target".to_string(), meta.target().into());

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                let extensions = span.extensions();
                let Some(fields) = extensions.get::<FormattedFields<JsonFields>>() else {
                    continue;
                };
                let Ok(fields) =
                    serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(&fields.fields)
                else {
                    continue;
                };
                record.extend(
                    fields
                        .into_iter()
                        .filter(|(k, _)| k.starts_with(CLOUD_LOGGING_PREFIX)),
                );
            }
        }

        event.record(&mut JsonVisitor(&mut record));

        writeln!(writer, "{}", serde_json::Value::Object(record))
    }
}

/// The JSON layer installed by [`setup`], writing to `make_writer`.
pub fn cloud_logging_layer<S, W>(
    make_writer: W,
) -> tracing_subscriber::fmt::Layer<S, JsonFields, CloudLoggingFormat, W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + 'static,
{
    tracing_subscriber::fmt::Layer::new()
        .fmt_fields(JsonFields::new())
        .event_format(CloudLoggingFormat)
        .with_writer(make_writer)
}

/// Installs the global subscriber, filtered by `RUST_LOG`.
pub fn setup() -> anyhow::Result<()> {
    setup_with(LogFormat::from_env())
}

pub fn setup_with(format: LogFormat) -> anyhow::Result<()> {
    let builder =
        tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::from_default_env());

    match format {
        LogFormat::Json => builder.with(cloud_logging_layer(std::io::stdout)).try_init()?,
        LogFormat::Pretty => builder
            .with(
                tracing_subscriber::fmt::Layer::new()
                    .with_ansi(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_level(true),
            )
            .try_init()?,
    }
    Ok(())
}
