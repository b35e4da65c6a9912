//! Metric snapshot types
//!
//! A snapshot is captured once per poll and never mutated afterwards. Field
//! names serialize in camelCase so that the JSON produced by a metrics source
//! and the identifiers used in alert conditions share one vocabulary.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A point-in-time reading of a deployment's health metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetricSnapshot {
    /// Failed requests, in percent
    pub error_rate: f64,
    /// Mean response time in milliseconds
    pub response_time: f64,
    /// Requests per second
    pub throughput: f64,
    /// Availability, in percent
    pub availability: f64,
    pub performance: PerformanceMetrics,
    pub business: BusinessMetrics,
    /// Application-defined metrics, keyed by name
    pub custom: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PerformanceMetrics {
    pub web_vitals: WebVitals,
    pub resources: ResourceUsage,
    pub mobile: MobileMetrics,
}

/// Browser performance indicators
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebVitals {
    pub fcp: f64,
    pub lcp: f64,
    pub fid: f64,
    pub cls: f64,
    pub ttfb: f64,
    pub inp: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceUsage {
    pub cpu: f64,
    pub memory: f64,
    pub disk: f64,
    pub network: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MobileMetrics {
    pub battery_drain: f64,
    pub data_usage: f64,
    pub load_time: f64,
    pub crash_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BusinessMetrics {
    pub conversion_rate: f64,
    pub revenue: f64,
    pub engagement: f64,
    pub retention: f64,
}

impl MetricSnapshot {
    /// Resolve a metric by its path, e.g. `errorRate`,
    /// `performance.webVitals.lcp` or `custom.checkout_latency`
    pub fn field(&self, path: &str) -> Option<f64> {
        match path.split_once('.') {
            None => match path {
                "errorRate" => Some(self.error_rate),
                "responseTime" => Some(self.response_time),
                "throughput" => Some(self.throughput),
                "availability" => Some(self.availability),
                _ => None,
            },
            Some(("performance", rest)) => self.performance.field(rest),
            Some(("business", rest)) => self.business.field(rest),
            Some(("custom", name)) => self.custom.get(name).copied(),
            Some(_) => None,
        }
    }

    /// Keep only the named custom metrics
    pub fn retain_custom(&mut self, names: &[String]) {
        self.custom.retain(|key, _| names.iter().any(|n| n == key));
    }

    /// One-line rendering of the headline fields
    pub fn summary(&self) -> String {
        format!(
            "errorRate={:.2}% responseTime={:.1}ms throughput={:.1}req/s availability={:.2}%",
            self.error_rate, self.response_time, self.throughput, self.availability
        )
    }

    /// Field-wise mean of a set of snapshots.
    ///
    /// Custom metrics are averaged over the snapshots that carry them.
    /// Returns `None` for an empty input.
    pub fn mean<'a, I>(snapshots: I) -> Option<MetricSnapshot>
    where
        I: IntoIterator<Item = &'a MetricSnapshot>,
    {
        let items: Vec<&MetricSnapshot> = snapshots.into_iter().collect();
        if items.is_empty() {
            return None;
        }

        let mut custom_totals: BTreeMap<String, (f64, usize)> = BTreeMap::new();
        for snapshot in &items {
            for (name, value) in &snapshot.custom {
                let entry = custom_totals.entry(name.clone()).or_insert((0.0, 0));
                entry.0 += value;
                entry.1 += 1;
            }
        }

        let performance: Vec<&PerformanceMetrics> = items.iter().map(|s| &s.performance).collect();
        let business: Vec<&BusinessMetrics> = items.iter().map(|s| &s.business).collect();

        Some(MetricSnapshot {
            error_rate: mean_of(&items, |s| s.error_rate),
            response_time: mean_of(&items, |s| s.response_time),
            throughput: mean_of(&items, |s| s.throughput),
            availability: mean_of(&items, |s| s.availability),
            performance: PerformanceMetrics::mean(&performance),
            business: BusinessMetrics::mean(&business),
            custom: custom_totals
                .into_iter()
                .map(|(name, (total, count))| (name, total / count as f64))
                .collect(),
        })
    }
}

impl PerformanceMetrics {
    fn field(&self, path: &str) -> Option<f64> {
        let (group, name) = path.split_once('.')?;
        match group {
            "webVitals" => match name {
                "fcp" => Some(self.web_vitals.fcp),
                "lcp" => Some(self.web_vitals.lcp),
                "fid" => Some(self.web_vitals.fid),
                "cls" => Some(self.web_vitals.cls),
                "ttfb" => Some(self.web_vitals.ttfb),
                "inp" => Some(self.web_vitals.inp),
                _ => None,
            },
            "resources" => match name {
                "cpu" => Some(self.resources.cpu),
                "memory" => Some(self.resources.memory),
                "disk" => Some(self.resources.disk),
                "network" => Some(self.resources.network),
                _ => None,
            },
            "mobile" => match name {
                "batteryDrain" => Some(self.mobile.battery_drain),
                "dataUsage" => Some(self.mobile.data_usage),
                "loadTime" => Some(self.mobile.load_time),
                "crashRate" => Some(self.mobile.crash_rate),
                _ => None,
            },
            _ => None,
        }
    }

    fn mean(items: &[&PerformanceMetrics]) -> Self {
        Self {
            web_vitals: WebVitals {
                fcp: mean_of(items, |p| p.web_vitals.fcp),
                lcp: mean_of(items, |p| p.web_vitals.lcp),
                fid: mean_of(items, |p| p.web_vitals.fid),
                cls: mean_of(items, |p| p.web_vitals.cls),
                ttfb: mean_of(items, |p| p.web_vitals.ttfb),
                inp: mean_of(items, |p| p.web_vitals.inp),
            },
            resources: ResourceUsage {
                cpu: mean_of(items, |p| p.resources.cpu),
                memory: mean_of(items, |p| p.resources.memory),
                disk: mean_of(items, |p| p.resources.disk),
                network: mean_of(items, |p| p.resources.network),
            },
            mobile: MobileMetrics {
                battery_drain: mean_of(items, |p| p.mobile.battery_drain),
                data_usage: mean_of(items, |p| p.mobile.data_usage),
                load_time: mean_of(items, |p| p.mobile.load_time),
                crash_rate: mean_of(items, |p| p.mobile.crash_rate),
            },
        }
    }
}

impl BusinessMetrics {
    fn field(&self, name: &str) -> Option<f64> {
        match name {
            "conversionRate" => Some(self.conversion_rate),
            "revenue" => Some(self.revenue),
            "engagement" => Some(self.engagement),
            "retention" => Some(self.retention),
            _ => None,
        }
    }

    fn mean(items: &[&BusinessMetrics]) -> Self {
        Self {
            conversion_rate: mean_of(items, |b| b.conversion_rate),
            revenue: mean_of(items, |b| b.revenue),
            engagement: mean_of(items, |b| b.engagement),
            retention: mean_of(items, |b| b.retention),
        }
    }
}

fn mean_of<T>(items: &[&T], value: impl Fn(&T) -> f64) -> f64 {
    if items.is_empty() {
        return 0.0;
    }
    items.iter().map(|item| value(*item)).sum::<f64>() / items.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(error_rate: f64, lcp: f64) -> MetricSnapshot {
        let mut s = MetricSnapshot {
            error_rate,
            response_time: 120.0,
            throughput: 300.0,
            availability: 99.9,
            ..Default::default()
        };
        s.performance.web_vitals.lcp = lcp;
        s.business.conversion_rate = 3.5;
        s
    }

    #[test]
    fn test_field_paths() {
        let mut s = snapshot(1.5, 2400.0);
        s.custom.insert("queue_depth".to_string(), 42.0);
        s.performance.mobile.crash_rate = 0.3;

        assert_eq!(s.field("errorRate"), Some(1.5));
        assert_eq!(s.field("availability"), Some(99.9));
        assert_eq!(s.field("performance.webVitals.lcp"), Some(2400.0));
        assert_eq!(s.field("performance.mobile.crashRate"), Some(0.3));
        assert_eq!(s.field("business.conversionRate"), Some(3.5));
        assert_eq!(s.field("custom.queue_depth"), Some(42.0));

        assert_eq!(s.field("custom.missing"), None);
        assert_eq!(s.field("performance.webVitals"), None);
        assert_eq!(s.field("latency"), None);
    }

    #[test]
    fn test_mean_of_snapshots() {
        let mut a = snapshot(1.0, 2000.0);
        a.custom.insert("only_a".to_string(), 10.0);
        let b = snapshot(3.0, 3000.0);

        let mean = MetricSnapshot::mean([&a, &b]).unwrap();
        assert_eq!(mean.error_rate, 2.0);
        assert_eq!(mean.performance.web_vitals.lcp, 2500.0);
        assert_eq!(mean.response_time, 120.0);
        // Averaged only over snapshots carrying the key
        assert_eq!(mean.custom.get("only_a"), Some(&10.0));

        assert!(MetricSnapshot::mean(std::iter::empty()).is_none());
    }

    #[test]
    fn test_deserialize_partial_json() {
        let json = serde_json::json!({
            "errorRate": 2.5,
            "performance": { "webVitals": { "cls": 0.12 } },
            "custom": { "signups": 17 }
        });
        let s: MetricSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(s.error_rate, 2.5);
        assert_eq!(s.performance.web_vitals.cls, 0.12);
        assert_eq!(s.custom.get("signups"), Some(&17.0));
        assert_eq!(s.availability, 0.0);
    }

    #[test]
    fn test_retain_custom() {
        let mut s = MetricSnapshot::default();
        s.custom.insert("keep".to_string(), 1.0);
        s.custom.insert("drop".to_string(), 2.0);
        s.retain_custom(&["keep".to_string()]);
        assert_eq!(s.custom.len(), 1);
        assert!(s.custom.contains_key("keep"));
    }
}
