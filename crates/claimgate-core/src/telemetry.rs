//! Tracing initialisation for the `claimgate` binary.
//!
//! Call [`init_tracing`] once at program start. Later calls are ignored
//! because the global subscriber can only be set once per process.
//!
//! Filter precedence: `CLAIMGATE_LOG`, then `RUST_LOG`, then the gateway
//! default (`warn` for dependencies, the requested level for claimgate's own
//! crates).

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Gateway-specific filter override.
pub const ENV_LOG: &str = "CLAIMGATE_LOG";

/// Targets that receive the requested level by default.
const GATEWAY_TARGETS: [&str; 2] = ["claimgate_core", "claimgate_cli"];

/// Default directives: dependencies at `warn`, gateway crates at `level`.
pub fn default_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    let mut directives = vec!["warn".to_string()];
    directives.extend(GATEWAY_TARGETS.iter().map(|t| format!("{t}={level}")));
    directives.join(",")
}

/// Pick the filter directives, reading variables through `lookup`.
pub fn filter_directives<F>(level: Level, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    [ENV_LOG, "RUST_LOG"]
        .into_iter()
        .filter_map(|key| lookup(key))
        .find(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default_directives(level))
}

/// Build the filter; unparseable directives fall back to the default.
pub fn build_filter<F>(level: Level, lookup: F) -> EnvFilter
where
    F: Fn(&str) -> Option<String>,
{
    let directives = filter_directives(level, lookup);
    EnvFilter::try_new(&directives).unwrap_or_else(|e| {
        eprintln!("ignoring log filter '{directives}': {e}");
        EnvFilter::new(default_directives(level))
    })
}

/// Initialise the global tracing subscriber.
///
/// * `json`: emit newline-delimited JSON log lines.
/// * `level`: verbosity of claimgate's own events when no filter is set.
///
/// Logs go to stderr so command output on stdout stays parseable.
pub fn init_tracing(json: bool, level: Level) {
    let filter = build_filter(level, |key| std::env::var(key).ok());
    let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let result = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init()
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        }
    }

    #[test]
    fn test_default_directives_scope_level_to_gateway() {
        assert_eq!(
            default_directives(Level::DEBUG),
            "warn,claimgate_core=debug,claimgate_cli=debug"
        );
        assert_eq!(filter_directives(Level::INFO, vars(&[])), default_directives(Level::INFO));
    }

    #[test]
    fn test_claimgate_log_wins_over_rust_log() {
        let lookup = vars(&[(ENV_LOG, "claimgate_core=trace"), ("RUST_LOG", "info")]);
        assert_eq!(filter_directives(Level::INFO, lookup), "claimgate_core=trace");
    }

    #[test]
    fn test_rust_log_used_when_claimgate_log_blank() {
        let lookup = vars(&[(ENV_LOG, "  "), ("RUST_LOG", "debug")]);
        assert_eq!(filter_directives(Level::INFO, lookup), "debug");
    }

    #[test]
    fn test_invalid_directives_fall_back_to_default() {
        let filter = build_filter(Level::INFO, vars(&[(ENV_LOG, "claimgate_core=notalevel")]));
        assert!(filter.to_string().contains("claimgate_core=info"));
    }
}
