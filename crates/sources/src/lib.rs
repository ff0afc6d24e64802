//! Message sources for the OSC bridge.
//!
//! Every source implements [`Source`]: it is started and stopped by the
//! bridge, hands out one event stream, and reports unrecoverable runtime
//! failures on a separate fatal-error stream.

pub mod dummy;
pub mod error;
pub mod http_bridge;
pub mod source;
pub mod ticker;

use std::sync::Arc;

use oscbridge_core::config::{DebugConfig, OscSources};

pub use dummy::DummySource;
pub use error::SourceError;
pub use http_bridge::HttpBridgeSource;
pub use source::{Source, SourceChannels, SourceHandle};
pub use ticker::TickerSource;

/// Instantiate every enabled source. Nothing is started yet.
pub fn build_sources(config: &OscSources, debug: &DebugConfig) -> Vec<SourceHandle> {
    let verbose = debug.debug_osc_connection;
    let mut handles = Vec::new();

    for dummy in config.dummy_connections.iter().filter(|c| c.enabled) {
        handles.push(SourceHandle::new(
            dummy.name.clone(),
            dummy.prefix.clone(),
            Arc::new(DummySource::new(dummy.clone(), verbose)),
        ));
    }
    for bridge in config.http_bridges.iter().filter(|c| c.enabled) {
        handles.push(SourceHandle::new(
            bridge.name.clone(),
            bridge.prefix.clone(),
            Arc::new(HttpBridgeSource::new(bridge.clone(), verbose)),
        ));
    }
    for ticker in config.tickers.iter().filter(|c| c.enabled) {
        handles.push(SourceHandle::new(
            ticker.name.clone(),
            ticker.prefix.clone(),
            Arc::new(TickerSource::new(ticker.clone(), verbose)),
        ));
    }

    handles
}

#[cfg(test)]
mod tests {
    use oscbridge_core::BridgeConfig;

    use super::*;

    #[test]
    fn only_enabled_sources_are_built() {
        let config = BridgeConfig::from_yaml(
            r#"
osc_sources:
  dummy_connections:
    - {name: d1, prefix: dm, enabled: true, iteration_speed_secs: 1}
    - {name: d2, enabled: false}
  http_bridges:
    - {name: web, enabled: true, port: 7878}
  tickers:
    - {name: clock, prefix: t, enabled: true, refresh_rate_millis: 500}
"#,
        )
        .unwrap();

        let handles = build_sources(&config.osc_sources, &config.app.debug);
        let names: Vec<(&str, &str)> = handles
            .iter()
            .map(|h| (h.name.as_str(), h.prefix.as_str()))
            .collect();
        assert_eq!(names, vec![("d1", "dm"), ("web", ""), ("clock", "t")]);
        assert!(handles.iter().all(|h| h.source.name() == h.name));
    }
}
