//! Scoring metrics for the fraud scoring service.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Counters and latency samples collected while scoring
pub struct ScoringMetrics {
    /// Records scored
    pub records_scored: AtomicU64,
    /// Records at or above the fraud threshold
    pub records_flagged: AtomicU64,
    /// Scoring batches served
    pub batches: AtomicU64,
    /// Batch latencies (in microseconds)
    batch_times: RwLock<Vec<u64>>,
    /// Probability distribution buckets
    score_buckets: RwLock<[u64; 10]>,
    start_time: Instant,
}

impl ScoringMetrics {
    pub fn new() -> Self {
        Self {
            records_scored: AtomicU64::new(0),
            records_flagged: AtomicU64::new(0),
            batches: AtomicU64::new(0),
            batch_times: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record one scored batch
    pub fn record_batch(&self, elapsed: Duration, probabilities: &[f64], threshold: f64) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.records_scored
            .fetch_add(probabilities.len() as u64, Ordering::Relaxed);
        let flagged = probabilities.iter().filter(|&&p| p >= threshold).count();
        self.records_flagged
            .fetch_add(flagged as u64, Ordering::Relaxed);

        if let Ok(mut times) = self.batch_times.write() {
            times.push(elapsed.as_micros() as u64);
            // Keep only the most recent samples
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }

        if let Ok(mut buckets) = self.score_buckets.write() {
            for &p in probabilities {
                let bucket = (p.clamp(0.0, 1.0) * 10.0).min(9.0) as usize;
                buckets[bucket] += 1;
            }
        }
    }

    /// Batch latency statistics
    pub fn latency_stats(&self) -> LatencyStats {
        let Ok(times) = self.batch_times.read() else {
            return LatencyStats::default();
        };
        if times.is_empty() {
            return LatencyStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();
        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();
        let at = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];

        LatencyStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: at(0.5),
            p95_us: at(0.95),
            p99_us: at(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Records scored per second since creation
    pub fn throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.records_scored.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn score_distribution(&self) -> [u64; 10] {
        self.score_buckets.read().map(|b| *b).unwrap_or([0; 10])
    }

    /// Log summary statistics
    pub fn log_summary(&self) {
        let scored = self.records_scored.load(Ordering::Relaxed);
        let flagged = self.records_flagged.load(Ordering::Relaxed);
        let flag_rate = if scored > 0 {
            (flagged as f64 / scored as f64) * 100.0
        } else {
            0.0
        };
        let latency = self.latency_stats();

        info!(
            records_scored = scored,
            records_flagged = flagged,
            flag_rate_pct = format!("{:.1}", flag_rate),
            throughput = format!("{:.1} rec/s", self.throughput()),
            "scoring summary"
        );
        info!(
            batches = latency.count,
            mean_us = latency.mean_us,
            p50_us = latency.p50_us,
            p95_us = latency.p95_us,
            p99_us = latency.p99_us,
            max_us = latency.max_us,
            "scoring latency"
        );

        let distribution = self.score_distribution();
        let total: u64 = distribution.iter().sum();
        for (i, &count) in distribution.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let pct = (count as f64 / total as f64) * 100.0;
            info!(
                bucket = format!("{:.1}-{:.1}", i as f64 / 10.0, (i + 1) as f64 / 10.0),
                count,
                pct = format!("{:.1}", pct),
                "probability distribution"
            );
        }
    }
}

impl Default for ScoringMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Batch latency statistics
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}
