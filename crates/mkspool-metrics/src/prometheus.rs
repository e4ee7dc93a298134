//! Prometheus text exposition format.
//!
//! Renders a metrics snapshot for scraping by a Prometheus server or
//! compatible agent. Every family gets HELP and TYPE lines even when it has
//! no series yet.

use std::fmt::Write;

use crate::collector::{FAMILIES, LabelSet, MetricKind, MetricsSnapshot, NAMESPACE};

/// Render `snapshot` into Prometheus text format.
pub fn render_prometheus(snapshot: &MetricsSnapshot) -> String {
    let mut out = String::new();

    for family in FAMILIES {
        let name = format!("{NAMESPACE}_{}", family.name);
        let _ = writeln!(out, "# HELP {name} {}", family.help);
        let _ = writeln!(out, "# TYPE {name} {}", family.kind.as_str());

        match family.kind {
            MetricKind::Counter => {
                for (labels, value) in snapshot.counters.get(family.name).into_iter().flatten() {
                    let _ = writeln!(out, "{name}{} {value}", render_labels(labels, None));
                }
            }
            MetricKind::Gauge => {
                if let Some(value) = snapshot.gauges.get(family.name) {
                    let _ = writeln!(out, "{name} {value}");
                }
            }
            MetricKind::Histogram => {
                for sample in snapshot.histograms.get(family.name).into_iter().flatten() {
                    for (bound, count) in &sample.buckets {
                        let le = bound.to_string();
                        let _ = writeln!(
                            out,
                            "{name}_bucket{} {count}",
                            render_labels(&sample.labels, Some(&le))
                        );
                    }
                    let _ = writeln!(
                        out,
                        "{name}_bucket{} {}",
                        render_labels(&sample.labels, Some("+Inf")),
                        sample.count
                    );
                    let plain = render_labels(&sample.labels, None);
                    let _ = writeln!(out, "{name}_sum{plain} {}", sample.sum);
                    let _ = writeln!(out, "{name}_count{plain} {}", sample.count);
                }
            }
        }
    }

    out
}

fn render_labels(labels: &LabelSet, le: Option<&str>) -> String {
    let mut pairs: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{k}=\"{}\"", escape(v)))
        .collect();
    if let Some(le) = le {
        pairs.push(format!("le=\"{le}\""));
    }
    if pairs.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", pairs.join(","))
    }
}

fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
