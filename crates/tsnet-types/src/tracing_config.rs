//! Tracing setup for debugging type resolution.
//!
//! `TSNET_LOG_FORMAT` picks the output:
//!
//! - `text` (default): flat `tracing-subscriber` lines
//! - `tree`: indented span tree via `tracing-tree`
//! - `json`: one JSON object per event
//!
//! ```bash
//! TSNET_LOG=debug TSNET_LOG_FORMAT=tree cargo test -p tsnet-types
//! TSNET_LOG="tsnet_types::nominal=trace" cargo test -p tsnet-types
//! ```
//!
//! Nothing is installed unless `TSNET_LOG` or `RUST_LOG` is set.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Tree,
    Json,
}

impl LogFormat {
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "tree" => Self::Tree,
            "json" => Self::Json,
            _ => Self::Text,
        }
    }

    fn from_env() -> Self {
        Self::parse(&std::env::var("TSNET_LOG_FORMAT").unwrap_or_default())
    }
}

/// `TSNET_LOG` wins over `RUST_LOG`.
fn build_filter() -> EnvFilter {
    if let Ok(val) = std::env::var("TSNET_LOG") {
        EnvFilter::builder().parse_lossy(val)
    } else {
        EnvFilter::from_default_env()
    }
}

/// Install the global subscriber. Output goes to stderr.
///
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init_tracing() {
    if std::env::var("TSNET_LOG").is_err() && std::env::var("RUST_LOG").is_err() {
        return;
    }

    let filter = build_filter();
    let result = match LogFormat::from_env() {
        LogFormat::Tree => {
            let tree_layer = tracing_tree::HierarchicalLayer::default()
                .with_writer(std::io::stderr)
                .with_indent_amount(2)
                .with_indent_lines(true)
                .with_deferred_spans(true)
                .with_targets(true);
            Registry::default().with(filter).with(tree_layer).try_init()
        }
        LogFormat::Json => {
            let json_layer = fmt::layer().json().with_writer(std::io::stderr);
            Registry::default().with(filter).with(json_layer).try_init()
        }
        LogFormat::Text => {
            let text_layer = fmt::layer().with_writer(std::io::stderr);
            Registry::default().with(filter).with(text_layer).try_init()
        }
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
#[path = "../tests/tracing_config_tests.rs"]
mod tests;
