use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::LoggingConfig;

/// Field name that names the kind of event, e.g. `collector.fetch.failed`.
const EVENT_FIELD: &str = "event_name";

/// Event fields as JSON values.
#[derive(Default)]
struct FieldMap(Map<String, Value>);

impl FieldMap {
    fn put(&mut self, field: &Field, value: impl Into<Value>) {
        self.0.insert(field.name().to_string(), value.into());
    }
}

impl Visit for FieldMap {
    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, value);
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, value);
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.put(field, value);
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, value);
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value);
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.put(field, format!("{:?}", value));
    }
}

fn severity_number(level: &Level) -> u64 {
    match *level {
        Level::TRACE => 1,
        Level::DEBUG => 5,
        Level::INFO => 9,
        Level::WARN => 13,
        Level::ERROR => 17,
    }
}

/// One JSON object per event: severity, message, an optional `event` kind,
/// the remaining fields under `attributes`, the emitting `source` and the
/// `resource` describing this process.
#[derive(Clone)]
struct JsonLineFormat {
    resource: Value,
}

impl JsonLineFormat {
    fn new(config: &LoggingConfig) -> Self {
        Self {
            resource: json!({
                "service.name": config.service_name,
                "service.version": config.service_version,
            }),
        }
    }
}

impl<S, N> FormatEvent<S, N> for JsonLineFormat
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    N: for<'writer> FormatFields<'writer> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();
        let mut fields = FieldMap::default();
        event.record(&mut fields);
        let FieldMap(mut attributes) = fields;

        let body = match attributes.remove("message") {
            Some(Value::String(message)) => message,
            _ => metadata.name().to_string(),
        };

        let mut line = Map::new();
        line.insert(
            "timestamp".into(),
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true).into(),
        );
        line.insert("severity_text".into(), metadata.level().as_str().into());
        line.insert("severity_number".into(), severity_number(metadata.level()).into());
        line.insert("body".into(), body.into());
        if let Some(kind) = attributes.remove(EVENT_FIELD) {
            line.insert("event".into(), kind);
        }
        line.insert("attributes".into(), Value::Object(attributes));
        line.insert(
            "source".into(),
            json!({
                "module": metadata.target(),
                "file": metadata.file(),
                "line": metadata.line(),
            }),
        );
        line.insert("resource".into(), self.resource.clone());

        let serialized =
            serde_json::to_string(&Value::Object(line)).map_err(|_| std::fmt::Error)?;
        writeln!(writer, "{}", serialized)
    }
}

/// Installs the global tracing subscriber.
///
/// `json` emits one object per line on stdout (see [`JsonLineFormat`]); `console` (and any
/// other value) emits human-readable multi-line output.
pub fn init_logging(logging_config: &LoggingConfig) -> Result<(), String> {
    let level_filter = logging_config.level_filter()?;
    let filter_layer = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .from_env_lossy();

    let result = if logging_config.format.eq_ignore_ascii_case("json") {
        tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt::layer().event_format(JsonLineFormat::new(logging_config)))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt::layer().pretty())
            .try_init()
    };
    result.map_err(|e| format!("Failed to initialize logging: {}", e))
}
