//! Prometheus exporter for ClustSafe rack power distribution units.
//!
//! The exporter runs the vendor's administration tool against the host named in
//! each scrape request, decodes the XML report it prints and exposes the
//! readings as Prometheus gauges.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────┐   ┌──────────┐   ┌───────────┐
//! │ GET /metrics │──>│  Fetcher │──>│  Parser  │──>│  Mapping  │
//! │ ?target=host │   │ (tool)   │   │  (XML)   │   │ (samples) │
//! └──────────────┘   └──────────┘   └──────────┘   └───────────┘
//! ```
//!
//! Nothing is shared between requests: each one gets its own
//! [`ClustsafeScraper`] and its own registry.
//!
//! # Usage
//!
//! ```bash
//! CLUSTSAFE_USER=admin CLUSTSAFE_PASSWORD=secret clustsafe-exporter
//! curl 'http://localhost:9879/metrics?target=10.0.0.1'
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod collector;
pub mod config;
pub mod error;
pub mod fetch;
pub mod http;
pub mod mapping;
pub mod parser;
pub mod report;

pub use collector::{ClustsafeScraper, CollectedSamples, MetricsProvider, render_provider};
pub use config::{Credentials, ExporterConfig};
pub use fetch::{CommandFetcher, Fetcher};
pub use http::HttpServer;
