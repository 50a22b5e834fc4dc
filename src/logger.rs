use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Install the global subscriber. `verbose` turns on the per-pass dumps in
/// release builds; debug builds always log at DEBUG.
pub fn init(verbose: bool) {
    let subscriber_builder = FmtSubscriber::builder().compact().with_target(false).without_time();
    let level = if verbose || cfg!(debug_assertions) {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = subscriber_builder.with_max_level(level).finish();

    tracing::subscriber::set_global_default(subscriber).expect("failed to initialize logger");
}
