// Prometheus text exposition of one cycle's observations.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};

use super::{DerivedMetric, MetricKind};

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Renders observations as gauges. A fresh registry is built per call, so series that were
/// not emitted this cycle disappear from the output.
pub fn render(metrics: &[DerivedMetric]) -> Result<String, prometheus::Error> {
    let registry = Registry::new();
    let mut families: BTreeMap<MetricKind, GaugeVec> = BTreeMap::new();

    for m in metrics {
        let gauges = match families.entry(m.kind) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                let desc = m.kind.descriptor();
                let vec = GaugeVec::new(Opts::new(desc.name, desc.help), desc.labels)?;
                registry.register(Box::new(vec.clone()))?;
                e.insert(vec)
            }
        };
        let labels: Vec<&str> = m.labels.iter().map(String::as_str).collect();
        gauges.get_metric_with_label_values(&labels)?.set(m.value);
    }

    let mut buf = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buf)?;
    String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
