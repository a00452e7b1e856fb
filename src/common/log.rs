use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};
use tracing_tree::HierarchicalLayer;
use tracing_tree::time::UtcDateTime;

const DEFAULT_FILTER: &str = "air_wm=info,airwm=info";

/// Installs the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let tree = HierarchicalLayer::default()
        .with_writer(std::io::stderr)
        .with_indent_amount(2)
        .with_indent_lines(true)
        .with_deferred_spans(true)
        .with_span_retrace(true)
        .with_targets(true)
        .with_timer(UtcDateTime::default());
    if let Err(e) = Registry::default().with(filter).with(tree).try_init() {
        eprintln!("Could not install the log subscriber: {e}");
    }
}
