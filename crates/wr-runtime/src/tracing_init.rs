use std::fmt::{self as stdfmt};
use std::path::Path;

use anyhow::Result;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::format::DefaultFields;
use tracing_subscriber::fmt::time::{FormatTime, SystemTime};
use tracing_subscriber::fmt::{self, FmtContext, FormatEvent, FormattedFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};
use wr_config::{LogFormat, LoggingConfig};

const RESET: &str = "\x1b[0m";

// ---------------------------------------------------------------------------
// FileFieldBuffer — separate span field cache for the file layer
// ---------------------------------------------------------------------------

/// Field formatter handed to the file layer. `fmt` layers cache formatted
/// span fields in span extensions keyed by the formatter type, so the file
/// layer gets its own type to keep its cache apart from the stderr layer's.
#[derive(Default)]
pub struct FileFieldBuffer;

impl<'writer> fmt::FormatFields<'writer> for FileFieldBuffer {
    fn format_fields<R: tracing_subscriber::field::RecordFields>(
        &self,
        writer: fmt::format::Writer<'writer>,
        fields: R,
    ) -> stdfmt::Result {
        DefaultFields::new().format_fields(writer, fields)
    }
}

// ---------------------------------------------------------------------------
// TextFormat — single-line text renderer with a [domain] prefix
// ---------------------------------------------------------------------------

/// Event formatter for the plain output streams. The `domain` field injected
/// by the `wr_*` macros becomes a `[domain]` prefix up front instead of one
/// more key=value pair at the end of the line:
///
/// ```text
/// 2026-03-07T09:15:02Z  INFO [proc] event accepted item_id=12 change="updated"
/// ```
///
/// Events carrying no `domain` field (dependencies, mostly) skip the prefix.
/// Styling applies only when the writer reports ANSI support.
#[derive(Default)]
pub struct TextFormat {
    timer: SystemTime,
}

fn severity_color(level: Level) -> &'static str {
    match level {
        Level::ERROR => "\x1b[31m",
        Level::WARN => "\x1b[33m",
        Level::INFO => "\x1b[32m",
        Level::DEBUG => "\x1b[34m",
        Level::TRACE => "\x1b[35m",
    }
}

impl<S, N> FormatEvent<S, N> for TextFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'writer> fmt::FormatFields<'writer> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: fmt::format::Writer<'_>,
        event: &Event<'_>,
    ) -> stdfmt::Result {
        let ansi = writer.has_ansi_escapes();

        if ansi {
            write!(writer, "\x1b[2m")?;
        }
        if self.timer.format_time(&mut writer).is_err() {
            write!(writer, "<no time>")?;
        }
        if ansi {
            write!(writer, "{RESET}")?;
        }

        let level = *event.metadata().level();
        if ansi {
            write!(writer, " {}{level:>5}{RESET} ", severity_color(level))?;
        } else {
            write!(writer, " {level:>5} ")?;
        }

        let mut visitor = FieldSplitter::default();
        event.record(&mut visitor);

        if let Some(domain) = visitor.domain.as_deref() {
            if ansi {
                write!(writer, "\x1b[1;36m[{domain}]{RESET} ")?;
            } else {
                write!(writer, "[{domain}] ")?;
            }
        }

        // enclosing spans, root first
        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                if ansi {
                    write!(writer, "\x1b[1m{}{RESET}{{", span.name())?;
                } else {
                    write!(writer, "{}{{", span.name())?;
                }
                let ext = span.extensions();
                match ext.get::<FormattedFields<N>>() {
                    Some(fields) if !fields.is_empty() => write!(writer, "{fields}")?,
                    _ => {}
                }
                write!(writer, "}}: ")?;
            }
        }

        write!(writer, "{}", visitor.message)?;

        if !visitor.extras.is_empty() {
            let extras = visitor.extras.join(" ");
            if ansi {
                write!(writer, " \x1b[3m{extras}{RESET}")?;
            } else {
                write!(writer, " {extras}")?;
            }
        }

        writeln!(writer)
    }
}

// ---------------------------------------------------------------------------
// FieldSplitter — pulls domain and message out of the field list
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FieldSplitter {
    domain: Option<String>,
    message: String,
    extras: Vec<String>,
}

impl Visit for FieldSplitter {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "domain" => self.domain = Some(value.to_string()),
            "message" => self.message = value.to_string(),
            name => self.extras.push(format!("{name}={value:?}")),
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn stdfmt::Debug) {
        match field.name() {
            "domain" => {
                let raw = format!("{value:?}");
                self.domain = Some(raw.trim_matches('"').to_string());
            }
            "message" => {
                self.message = format!("{value:?}");
            }
            name => self.extras.push(format!("{name}={value:?}")),
        }
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.extras.push(format!("{}={value}", field.name()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.extras.push(format!("{}={value}", field.name()));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.extras.push(format!("{}={value}", field.name()));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.extras.push(format!("{}={value}", field.name()));
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

fn filter_directives(config: &LoggingConfig) -> String {
    let mut directives = vec![config.level.clone()];
    directives.extend(
        config
            .modules
            .iter()
            .map(|(module, level)| format!("{module}={level}")),
    );
    directives.join(",")
}

fn open_log_file(file_path: &Path, base_dir: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    let resolved = if file_path.is_relative() {
        base_dir.join(file_path)
    } else {
        file_path.to_path_buf()
    };
    if let Some(parent) = resolved.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file_name = resolved
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("log file path has no file name"))?
        .to_os_string();
    let dir = resolved
        .parent()
        .ok_or_else(|| anyhow::anyhow!("log file path has no parent directory"))?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}

/// Build and install the global `tracing` subscriber from [`LoggingConfig`].
///
/// The returned [`WorkerGuard`], when present, has to stay alive for the
/// whole process; dropping it flushes and closes the non-blocking file
/// writer.
///
/// Precedence: `RUST_LOG` overrides all config-driven directives. stderr is
/// filtered; the file layer, when configured, captures everything.
///
/// `log::warn!` lines from library code land in the same stream through the
/// `tracing-log` bridge that `tracing-subscriber` installs by default.
pub fn init_tracing(
    config: &LoggingConfig,
    base_dir: &Path,
) -> Result<Option<WorkerGuard>> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let directives = filter_directives(config);
        EnvFilter::try_new(&directives)
            .map_err(|e| anyhow::anyhow!("invalid log filter '{directives}': {e}"))?
    };

    let json = config.format == LogFormat::Json;

    let Some(ref file_path) = config.file else {
        if json {
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .json()
                        .with_target(false)
                        .with_writer(std::io::stderr)
                        .with_filter(filter),
                )
                .init();
        } else {
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .event_format(TextFormat::default())
                        .with_writer(std::io::stderr)
                        .with_filter(filter),
                )
                .init();
        }
        return Ok(None);
    };

    let (file_writer, guard) = open_log_file(file_path, base_dir)?;

    if json {
        // JSON output leaves domain as an ordinary field, queryable by key
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .json()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_filter(filter),
            )
            .with(
                fmt::layer()
                    .json()
                    .fmt_fields(FileFieldBuffer::default())
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(file_writer),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .event_format(TextFormat::default())
                    .with_writer(std::io::stderr)
                    .with_filter(filter),
            )
            .with(
                fmt::layer()
                    .event_format(TextFormat::default())
                    .fmt_fields(FileFieldBuffer::default())
                    .with_ansi(false)
                    .with_writer(file_writer),
            )
            .init();
    }

    Ok(Some(guard))
}
