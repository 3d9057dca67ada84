//! Tracing subscriber initialisation.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::{FeatureFlags, ServerConfig};

/// Installs the global subscriber.
///
/// `RUST_LOG` wins over `server.log_level`. Output is JSON lines in
/// production or when `json_logs` is set. Returns `false` if tracing is
/// disabled or a subscriber was already installed.
pub fn init_tracing(server: &ServerConfig, features: &FeatureFlags) -> bool {
    if !features.enable_tracing {
        return false;
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&server.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if json_output(server, features) {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    installed.is_ok()
}

fn json_output(server: &ServerConfig, features: &FeatureFlags) -> bool {
    features.json_logs || server.is_production()
}
