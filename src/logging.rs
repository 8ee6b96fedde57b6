//! Logging setup
//!
//! The runner reads workflow commands from stdout, so by default every event
//! is rendered as one: errors as `::error::`, warnings as `::warning::`, debug
//! as `::debug::`, info as a plain line. `log_format = "json"` switches to the
//! structured formatter instead.

use std::fmt;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

/// Escape a workflow command message
pub fn escape_data(message: &str) -> String {
    message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Renders events as runner workflow commands
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkflowCommandFormat;

impl<S, N> FormatEvent<S, N> for WorkflowCommandFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut message = String::new();
        ctx.format_fields(Writer::new(&mut message), event)?;

        match *event.metadata().level() {
            Level::ERROR => writeln!(writer, "::error::{}", escape_data(&message)),
            Level::WARN => writeln!(writer, "::warning::{}", escape_data(&message)),
            Level::INFO => writeln!(writer, "{}", message),
            _ => writeln!(writer, "::debug::{}", escape_data(&message)),
        }
    }
}

/// Filter directive for the requested verbosity
fn filter_directive(verbose: u8, step_debug: bool) -> &'static str {
    match (verbose, step_debug) {
        (0, false) => "cache_relay=info",
        (0 | 1, _) => "cache_relay=debug",
        _ => "cache_relay=trace",
    }
}

/// Initialize the global subscriber
///
/// Debug output is enabled by `-v` or by the runner's step debug flag.
pub fn init(verbose: u8, step_debug: bool, log_format: &str) {
    let filter = EnvFilter::new(filter_directive(verbose, step_debug));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stdout);

    if log_format.eq_ignore_ascii_case("json") {
        builder.json().with_target(false).init();
    } else {
        builder.event_format(WorkflowCommandFormat).init();
    }
}
