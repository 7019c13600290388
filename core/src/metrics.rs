use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricGauge {
    /// Number of the latest whitelisted milestone.
    LatestMilestone,
    /// Number of the most recently queued future milestone.
    FutureMilestone,
    /// Votes backing the current lock.
    MilestoneIdsLength,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricMeter {
    ValidChain,
    ValidPeer,
}

pub trait MetricName {
    fn name(&self) -> &'static str;
}

impl MetricName for MetricGauge {
    fn name(&self) -> &'static str {
        use MetricGauge::*;
        match self {
            LatestMilestone => "chain/milestone/latest",
            FutureMilestone => "chain/milestone/future",
            MilestoneIdsLength => "chain/milestone/idslength",
        }
    }
}

impl MetricName for MetricMeter {
    fn name(&self) -> &'static str {
        match self {
            MetricMeter::ValidChain => "chain/milestone/isvalidchain",
            MetricMeter::ValidPeer => "chain/milestone/isvalidpeer",
        }
    }
}

/// Sink for milestone telemetry, handed to the whitelist at construction.
pub trait Metrics: Send + Sync {
    fn update(&self, gauge: MetricGauge, value: i64);
    fn mark(&self, meter: MetricMeter, value: i64);
}

pub struct NoopMetrics;

impl Metrics for NoopMetrics {
    fn update(&self, _: MetricGauge, _: i64) {}
    fn mark(&self, _: MetricMeter, _: i64) {}
}

/// Snapshot of a meter: how many marks were made and their sum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeterReading {
    pub count: u64,
    pub sum: i64,
}

/// Keeps the last gauge values and meter totals in memory.
#[derive(Default)]
pub struct InMemoryMetrics {
    gauges: Mutex<HashMap<MetricGauge, i64>>,
    meters: Mutex<HashMap<MetricMeter, MeterReading>>,
}

impl InMemoryMetrics {
    pub fn gauge(&self, gauge: MetricGauge) -> Option<i64> {
        self.gauges.lock().get(&gauge).copied()
    }

    pub fn meter(&self, meter: MetricMeter) -> MeterReading {
        self.meters.lock().get(&meter).copied().unwrap_or_default()
    }

    /// All recorded values keyed by metric name.
    pub fn snapshot(&self) -> Vec<(&'static str, i64)> {
        let mut values: Vec<_> = self
            .gauges
            .lock()
            .iter()
            .map(|(gauge, value)| (gauge.name(), *value))
            .chain(
                self.meters
                    .lock()
                    .iter()
                    .map(|(meter, reading)| (meter.name(), reading.sum)),
            )
            .collect();
        values.sort();
        values
    }
}

impl Metrics for InMemoryMetrics {
    fn update(&self, gauge: MetricGauge, value: i64) {
        self.gauges.lock().insert(gauge, value);
    }

    fn mark(&self, meter: MetricMeter, value: i64) {
        let mut meters = self.meters.lock();
        let reading = meters.entry(meter).or_default();
        reading.count += 1;
        reading.sum += value;
    }
}
