//! Request metrics in Prometheus text exposition format
//!
//! Four families are kept:
//! - `request_processing_seconds{method, path}` histogram
//! - `requests_total{method, path}`
//! - `success_total{method, path, status_code}`: responses produced without
//!   an error, whatever their status
//! - `errors_total{method, path, error_type, status_code}`
//!
//! Paths are labelled by route template (`/api/v1/scenarios/:scenario_id/...`)
//! and methods are limited to the standard set, so the label set stays
//! bounded whatever clients send.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Upper bounds of the request time histogram, in seconds
pub const REQUEST_TIME_BUCKETS: [f64; 13] = [
    0.05, 0.2, 0.3, 0.7, 1.0, 1.5, 2.5, 5.0, 10.0, 20.0, 40.0, 60.0, 120.0,
];

type Labels = Vec<(&'static str, String)>;

#[derive(Debug, Clone, Default)]
struct HistogramSeries {
    /// Non-cumulative count per bucket; `+Inf` is derived from `count`
    buckets: [u64; REQUEST_TIME_BUCKETS.len()],
    sum: f64,
    count: u64,
}

impl HistogramSeries {
    fn observe(&mut self, value: f64) {
        if let Some(index) = REQUEST_TIME_BUCKETS.iter().position(|bound| value <= *bound) {
            self.buckets[index] += 1;
        }
        self.sum += value;
        self.count += 1;
    }
}

/// Path label shared by every request that matched no route
pub const UNMATCHED_ROUTE: &str = "<unmatched>";

/// Method label: standard methods as-is, anything else `OTHER`
pub fn method_label(method: &str) -> &'static str {
    match method {
        "GET" => "GET",
        "HEAD" => "HEAD",
        "POST" => "POST",
        "PUT" => "PUT",
        "DELETE" => "DELETE",
        "PATCH" => "PATCH",
        "OPTIONS" => "OPTIONS",
        "CONNECT" => "CONNECT",
        "TRACE" => "TRACE",
        _ => "OTHER",
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn format_labels(labels: &[(&'static str, String)], extra: Option<(&str, String)>) -> String {
    let mut parts: Vec<String> = labels
        .iter()
        .map(|(name, value)| format!("{}=\"{}\"", name, escape_label(value)))
        .collect();
    if let Some((name, value)) = extra {
        parts.push(format!("{}=\"{}\"", name, value));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", parts.join(","))
    }
}

/// Process-wide metric registry
#[derive(Debug, Default)]
pub struct Metrics {
    requests: Mutex<BTreeMap<Labels, u64>>,
    successes: Mutex<BTreeMap<Labels, u64>>,
    errors: Mutex<BTreeMap<Labels, u64>>,
    request_time: Mutex<BTreeMap<Labels, HistogramSeries>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self, method: &str, path: &str) {
        *lock(&self.requests)
            .entry(vec![("method", method.to_string()), ("path", path.to_string())])
            .or_default() += 1;
    }

    pub fn record_success(&self, method: &str, path: &str, status_code: u16) {
        *lock(&self.successes)
            .entry(vec![
                ("method", method.to_string()),
                ("path", path.to_string()),
                ("status_code", status_code.to_string()),
            ])
            .or_default() += 1;
    }

    pub fn record_error(&self, method: &str, path: &str, error_type: &str, status_code: u16) {
        *lock(&self.errors)
            .entry(vec![
                ("method", method.to_string()),
                ("path", path.to_string()),
                ("error_type", error_type.to_string()),
                ("status_code", status_code.to_string()),
            ])
            .or_default() += 1;
    }

    pub fn observe_request_time(&self, method: &str, path: &str, seconds: f64) {
        lock(&self.request_time)
            .entry(vec![("method", method.to_string()), ("path", path.to_string())])
            .or_default()
            .observe(seconds);
    }

    pub fn requests_total(&self, method: &str, path: &str) -> u64 {
        lock(&self.requests)
            .get(&vec![("method", method.to_string()), ("path", path.to_string())])
            .copied()
            .unwrap_or(0)
    }

    pub fn success_total(&self, method: &str, path: &str, status_code: u16) -> u64 {
        lock(&self.successes)
            .get(&vec![
                ("method", method.to_string()),
                ("path", path.to_string()),
                ("status_code", status_code.to_string()),
            ])
            .copied()
            .unwrap_or(0)
    }

    pub fn errors_total(&self, method: &str, path: &str, error_type: &str, status_code: u16) -> u64 {
        lock(&self.errors)
            .get(&vec![
                ("method", method.to_string()),
                ("path", path.to_string()),
                ("error_type", error_type.to_string()),
                ("status_code", status_code.to_string()),
            ])
            .copied()
            .unwrap_or(0)
    }

    /// Errors across every label set
    pub fn errors_sum(&self) -> u64 {
        lock(&self.errors).values().sum()
    }

    /// Render every family in Prometheus text format
    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push_str("# HELP request_processing_seconds Processing time histogram\n");
        out.push_str("# TYPE request_processing_seconds histogram\n");
        for (labels, series) in lock(&self.request_time).iter() {
            let mut cumulative = 0;
            for (bound, count) in REQUEST_TIME_BUCKETS.iter().zip(series.buckets.iter()) {
                cumulative += count;
                let _ = writeln!(
                    out,
                    "request_processing_seconds_bucket{} {}",
                    format_labels(labels, Some(("le", bound.to_string()))),
                    cumulative
                );
            }
            let _ = writeln!(
                out,
                "request_processing_seconds_bucket{} {}",
                format_labels(labels, Some(("le", "+Inf".to_string()))),
                series.count
            );
            let _ = writeln!(out, "request_processing_seconds_sum{} {}", format_labels(labels, None), series.sum);
            let _ = writeln!(out, "request_processing_seconds_count{} {}", format_labels(labels, None), series.count);
        }

        render_counter(&mut out, "requests_total", "Total number of requests", &self.requests);
        render_counter(
            &mut out,
            "success_total",
            "Total number of processed requests without exceptions (including non-2xx status codes)",
            &self.successes,
        );
        render_counter(&mut out, "errors_total", "Total number of errors in requests", &self.errors);

        out
    }
}

fn render_counter(out: &mut String, name: &str, help: &str, family: &Mutex<BTreeMap<Labels, u64>>) {
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} counter", name);
    for (labels, value) in lock(family).iter() {
        let _ = writeln!(out, "{}{} {}", name, format_labels(labels, None), value);
    }
}
