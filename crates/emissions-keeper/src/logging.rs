use crate::config::LoggingConfig;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
///
/// Calling this again after a subscriber is installed is a no-op, so tests
/// and embedding hosts can call it freely.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = build_filter(config, std::env::var("RUST_LOG").ok())?;
    let subscriber = tracing_subscriber::registry().with(filter);

    let installed = match config.format.as_str() {
        "json" => {
            let json_layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_line_number(true)
                .with_file(true);
            subscriber.with(json_layer).try_init()
        }
        _ => {
            let show_location = matches!(config.level.as_str(), "debug" | "trace");
            let pretty_layer = fmt::layer()
                .with_target(show_location)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_line_number(show_location)
                .with_file(show_location);
            subscriber.with(pretty_layer).try_init()
        }
    };

    if installed.is_ok() {
        tracing::info!(
            level = %config.level,
            format = %config.format,
            "✨ Logging initialized"
        );
    }
    Ok(())
}

fn build_filter(config: &LoggingConfig, rust_log: Option<String>) -> anyhow::Result<EnvFilter> {
    let mut filter = EnvFilter::new(rust_log.unwrap_or_else(|| config.level.clone()));
    for crate_name in ["emissions_keeper", "emissions_storage"] {
        filter = filter.add_directive(format!("{}={}", crate_name, config.level).parse()?);
    }
    for (module, level) in &config.module_filters {
        filter = filter.add_directive(format!("{}={}", module, level).parse()?);
    }
    Ok(filter)
}
