use std::fmt;
use std::sync::Arc;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Ordered key/value pairs attached to a log record.
pub type LogFields = Vec<(String, String)>;

/// Destination for lifecycle records.
pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, msg: &str, fields: &[(String, String)]);
}

/// Forwards records to `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, msg: &str, fields: &[(String, String)]) {
        let fields = render_fields(fields);
        match level {
            LogLevel::Debug => tracing::debug!(target: "pacproxy", %fields, "{msg}"),
            LogLevel::Info => tracing::info!(target: "pacproxy", %fields, "{msg}"),
            LogLevel::Warn => tracing::warn!(target: "pacproxy", %fields, "{msg}"),
            LogLevel::Error => tracing::error!(target: "pacproxy", %fields, "{msg}"),
        }
    }
}

fn render_fields(fields: &[(String, String)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Rewrites or drops a record before it reaches the logger.
/// Returning `None` drops the record.
pub type LogHook =
    Arc<dyn Fn(LogLevel, String, LogFields) -> Option<(String, LogFields)> + Send + Sync>;

/// Builds a hook that replaces the value of every field whose key matches one
/// of `keys` (ASCII case-insensitive) with `[REDACTED]`.
pub fn redact_keys_hook<I, S>(keys: I) -> LogHook
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let keys: Vec<String> = keys
        .into_iter()
        .map(|k| k.as_ref().to_ascii_lowercase())
        .filter(|k| !k.is_empty())
        .collect();
    Arc::new(move |_level: LogLevel, msg: String, mut fields: LogFields| {
        for (key, value) in fields.iter_mut() {
            if keys.iter().any(|k| key.eq_ignore_ascii_case(k)) {
                *value = "[REDACTED]".to_string();
            }
        }
        Some((msg, fields))
    })
}

/// A logger plus an optional hook. Cloning is cheap.
#[derive(Clone)]
pub struct LogSink {
    logger: Option<Arc<dyn Logger>>,
    hook: Option<LogHook>,
}

impl Default for LogSink {
    fn default() -> Self {
        Self {
            logger: Some(Arc::new(TracingLogger)),
            hook: None,
        }
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSink")
            .field("logger", &self.logger.is_some())
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

impl LogSink {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self {
            logger: Some(logger),
            hook: None,
        }
    }

    pub fn disabled() -> Self {
        Self {
            logger: None,
            hook: None,
        }
    }

    pub fn with_hook(mut self, hook: LogHook) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn emit(&self, level: LogLevel, msg: &str, fields: LogFields) {
        let Some(logger) = &self.logger else {
            return;
        };
        match &self.hook {
            Some(hook) => {
                if let Some((msg, fields)) = hook(level, msg.to_string(), fields) {
                    logger.log(level, &msg, &fields);
                }
            }
            None => logger.log(level, msg, &fields),
        }
    }
}

#[macro_export]
macro_rules! log_error {
    ($sink:expr, $msg:expr $(, $key:expr => $value:expr)* $(,)?) => {
        $sink.emit(
            $crate::log::LogLevel::Error,
            $msg,
            vec![$(($key.to_string(), $value.to_string())),*],
        )
    };
}

#[macro_export]
macro_rules! log_warn {
    ($sink:expr, $msg:expr $(, $key:expr => $value:expr)* $(,)?) => {
        $sink.emit(
            $crate::log::LogLevel::Warn,
            $msg,
            vec![$(($key.to_string(), $value.to_string())),*],
        )
    };
}

#[macro_export]
macro_rules! log_info {
    ($sink:expr, $msg:expr $(, $key:expr => $value:expr)* $(,)?) => {
        $sink.emit(
            $crate::log::LogLevel::Info,
            $msg,
            vec![$(($key.to_string(), $value.to_string())),*],
        )
    };
}

#[macro_export]
macro_rules! log_debug {
    ($sink:expr, $msg:expr $(, $key:expr => $value:expr)* $(,)?) => {
        $sink.emit(
            $crate::log::LogLevel::Debug,
            $msg,
            vec![$(($key.to_string(), $value.to_string())),*],
        )
    };
}
