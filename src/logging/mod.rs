//! slog loggers handed to the services for per-component audit lines.
//!
//! Request/diagnostic logging goes through `tracing`; these loggers carry the
//! business audit trail ("sale completed", "stock adjusted", ...).

use slog::{o, Discard, Drain, Logger};
use slog_async::Async;
use slog_term::{FullFormat, PlainDecorator, TermDecorator};

/// Configuration for setting up the logger
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub async_buffer_size: usize,
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            async_buffer_size: 1024,
            use_color: true,
        }
    }
}

/// Sets up the root audit logger
pub fn setup_logger(config: LoggerConfig) -> Logger {
    let version = env!("CARGO_PKG_VERSION");

    if config.use_color {
        let decorator = TermDecorator::new().force_color().build();
        let drain = FullFormat::new(decorator).build().fuse();
        let drain = Async::new(drain)
            .chan_size(config.async_buffer_size)
            .build()
            .fuse();
        Logger::root(drain, o!("version" => version))
    } else {
        let decorator = PlainDecorator::new(std::io::stderr());
        let drain = FullFormat::new(decorator).build().fuse();
        let drain = Async::new(drain)
            .chan_size(config.async_buffer_size)
            .build()
            .fuse();
        Logger::root(drain, o!("version" => version))
    }
}

/// Child logger tagged with the owning component
pub fn component_logger(root: &Logger, component: &'static str) -> Logger {
    root.new(o!("component" => component))
}

/// Logger that drops everything; for tests and the CLI
pub fn discard_logger() -> Logger {
    Logger::root(Discard, o!())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_loggers_accept_records() {
        let root = setup_logger(LoggerConfig {
            async_buffer_size: 16,
            use_color: false,
        });
        let logger = component_logger(&root, "sales");
        slog::info!(logger, "sale completed"; "order_id" => "abc");

        let quiet = component_logger(&discard_logger(), "stock");
        slog::warn!(quiet, "dropped");
    }
}
