//! Scrape collection for a single ClustSafe target.
//!
//! A [`ClustsafeScraper`] is bound to one target for its whole life. Each
//! [`collect`](MetricsProvider::collect) runs fetch, parse and map in turn and
//! always ends with `clustsafe_up`. A failed fetch or parse yields nothing but
//! `clustsafe_up 0`.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use prometheus_client::collector::Collector;
use prometheus_client::encoding::{DescriptorEncoder, EncodeMetric};
use prometheus_client::metrics::MetricType;
use prometheus_client::metrics::gauge::ConstGauge;
use prometheus_client::registry::Registry;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::error::ScrapeError;
use crate::fetch::Fetcher;
use crate::mapping::{DESCRIPTORS, MetricDesc, MetricSample, map_report, up_sample};
use crate::parser::parse;

/// Something that can describe and produce a set of metric samples.
pub trait MetricsProvider: Send + Sync {
    /// The fixed set of families this provider may emit.
    fn describe(&self) -> &'static [MetricDesc];

    /// Produce the current samples.
    fn collect(&self) -> impl Future<Output = Vec<MetricSample>> + Send;
}

/// Metrics provider bound to one ClustSafe host.
pub struct ClustsafeScraper<F> {
    target: String,
    fetcher: Arc<F>,
    /// Held for the whole scrape so one instance never runs two at once.
    slot: Mutex<()>,
}

impl<F: Fetcher> ClustsafeScraper<F> {
    /// Create a scraper for `target`.
    pub fn new(target: impl Into<String>, fetcher: Arc<F>) -> Self {
        Self {
            target: target.into(),
            fetcher,
            slot: Mutex::new(()),
        }
    }

    async fn scrape(&self) -> Result<Vec<MetricSample>, ScrapeError> {
        let raw = self.fetcher.fetch(&self.target).await?;

        let report = parse(&raw).inspect_err(|e| {
            debug!(
                host = %self.target,
                output = %e.raw_snippet,
                "Received ClustSafe output"
            );
        })?;

        Ok(map_report(&report))
    }
}

impl<F: Fetcher> MetricsProvider for ClustsafeScraper<F> {
    fn describe(&self) -> &'static [MetricDesc] {
        &DESCRIPTORS
    }

    async fn collect(&self) -> Vec<MetricSample> {
        let _slot = self.slot.lock().await;
        let started = Instant::now();

        match self.scrape().await {
            Ok(mut samples) => {
                debug!(
                    host = %self.target,
                    samples = samples.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Scrape complete"
                );
                samples.push(up_sample(true));
                samples
            }
            Err(ScrapeError::Exec(e)) => {
                error!(host = %self.target, err = %e, "Can't execute ClustSafe command");
                vec![up_sample(false)]
            }
            Err(ScrapeError::Parse(e)) => {
                error!(host = %self.target, err = %e, "Failed parsing ClustSafe output");
                vec![up_sample(false)]
            }
        }
    }
}

/// The outcome of one collection, registrable with a `prometheus-client` registry.
#[derive(Debug)]
pub struct CollectedSamples {
    descriptors: &'static [MetricDesc],
    samples: Vec<MetricSample>,
}

impl CollectedSamples {
    /// Run one collection on `provider` and keep its result.
    pub async fn collect_from<P: MetricsProvider>(provider: &P) -> Self {
        Self {
            descriptors: provider.describe(),
            samples: provider.collect().await,
        }
    }

    pub fn samples(&self) -> &[MetricSample] {
        &self.samples
    }
}

impl Collector for CollectedSamples {
    fn encode(&self, mut encoder: DescriptorEncoder) -> Result<(), std::fmt::Error> {
        for desc in self.descriptors {
            let mut family = self
                .samples
                .iter()
                .filter(|s| s.name == desc.name)
                .peekable();

            // Families without samples this scrape are left out.
            if family.peek().is_none() {
                continue;
            }

            let mut metric_encoder =
                encoder.encode_descriptor(desc.name, desc.help, None, MetricType::Gauge)?;

            // An unlabeled family holds a single series, encoded straight
            // onto the descriptor.
            if desc.labels.is_empty() {
                if let Some(sample) = family.next() {
                    ConstGauge::new(sample.value).encode(metric_encoder)?;
                }
                continue;
            }

            for sample in family {
                let series = metric_encoder.encode_family(&sample.labels)?;
                ConstGauge::new(sample.value).encode(series)?;
            }
        }

        Ok(())
    }
}

/// Collect `provider` into a registry that lives only for this call, and
/// render it in the OpenMetrics text format.
pub async fn render_provider<P: MetricsProvider>(provider: &P) -> Result<String, std::fmt::Error> {
    let mut registry = Registry::default();
    registry.register_collector(Box::new(CollectedSamples::collect_from(provider).await));

    let mut body = String::new();
    prometheus_client::encoding::text::encode(&mut body, &registry)?;
    Ok(body)
}
