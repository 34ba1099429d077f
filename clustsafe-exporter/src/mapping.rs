//! Mapping from a parsed ClustSafe report to Prometheus samples.

use std::collections::HashSet;

use tracing::warn;

use crate::report::ParsedReport;

pub const POWER_CONSUMPTION: &str = "clustsafe_power_consumption_watts";
pub const OUTLET_UP: &str = "clustsafe_outlet_up";
pub const LINE_UP: &str = "clustsafe_line_up";
pub const HUMIDITY: &str = "clustsafe_humidity";
pub const TEMPERATURE: &str = "clustsafe_temperature";
pub const UP: &str = "clustsafe_up";

/// Static description of one metric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDesc {
    pub name: &'static str,
    pub help: &'static str,
    pub labels: &'static [&'static str],
}

/// Every family the exporter can emit, in exposition order.
pub static DESCRIPTORS: [MetricDesc; 6] = [
    MetricDesc {
        name: HUMIDITY,
        help: "The humidity in percentage.",
        labels: &["sensor"],
    },
    MetricDesc {
        name: TEMPERATURE,
        help: "The temperature in celsius.",
        labels: &["sensor"],
    },
    MetricDesc {
        name: OUTLET_UP,
        help: "The status of an outlet in the module.",
        labels: &["module", "outlet"],
    },
    MetricDesc {
        name: LINE_UP,
        help: "The status of an input power line in the module.",
        labels: &["module", "line"],
    },
    MetricDesc {
        name: POWER_CONSUMPTION,
        help: "The real power consumption in Watts.",
        labels: &["module"],
    },
    MetricDesc {
        name: UP,
        help: "Was the last scrape of ClustSafe successful.",
        labels: &[],
    },
];

/// One gauge sample.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub name: &'static str,
    pub value: f64,
    /// Label pairs, in the order declared by the family's descriptor.
    pub labels: Vec<(String, String)>,
}

impl MetricSample {
    pub fn new(name: &'static str, value: f64, labels: Vec<(String, String)>) -> Self {
        Self {
            name,
            value,
            labels,
        }
    }

    /// Look up a label value by name.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// The terminal availability sample.
pub fn up_sample(up: bool) -> MetricSample {
    MetricSample::new(UP, bool_value(up), Vec::new())
}

fn bool_value(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

fn label(name: &str, value: impl Into<String>) -> (String, String) {
    (name.to_string(), value.into())
}

/// Translate a report into samples.
///
/// Modules come first in document order, each followed by its outlets and
/// lines, then sensors in document order. Only connected modules contribute.
/// A sample whose label set was already emitted for its family is dropped.
pub fn map_report(report: &ParsedReport) -> Vec<MetricSample> {
    let mut samples = Vec::new();

    for module in report.modules.iter().filter(|m| m.is_connected()) {
        samples.push(MetricSample::new(
            POWER_CONSUMPTION,
            module.power.real_power,
            vec![label("module", &module.id)],
        ));

        for outlet in &module.outlets {
            samples.push(MetricSample::new(
                OUTLET_UP,
                bool_value(outlet.is_on()),
                vec![label("module", &module.id), label("outlet", &outlet.id)],
            ));
        }

        for line in &module.lines {
            samples.push(MetricSample::new(
                LINE_UP,
                bool_value(line.is_connected()),
                vec![label("module", &module.id), label("line", &line.id)],
            ));
        }
    }

    for sensor in &report.sensors {
        let sample = match sensor.kind.as_str() {
            "humidity" => MetricSample::new(
                HUMIDITY,
                sensor.value,
                vec![label("sensor", "humidity")],
            ),
            "temperature" => MetricSample::new(
                TEMPERATURE,
                sensor.value,
                vec![label("sensor", "temperature")],
            ),
            // Unplugged dallas sensors report zero.
            "dallas" if sensor.value > 0.0 => MetricSample::new(
                TEMPERATURE,
                sensor.value,
                vec![label("sensor", format!("dallas{}", sensor.id))],
            ),
            _ => continue,
        };
        samples.push(sample);
    }

    dedup_series(samples)
}

fn dedup_series(samples: Vec<MetricSample>) -> Vec<MetricSample> {
    let mut seen = HashSet::with_capacity(samples.len());

    samples
        .into_iter()
        .filter(|sample| {
            let fresh = seen.insert((sample.name, sample.labels.clone()));
            if !fresh {
                warn!(
                    metric = sample.name,
                    labels = ?sample.labels,
                    "Dropping duplicate series"
                );
            }
            fresh
        })
        .collect()
}
