//! Periodic push of view snapshots to exporters.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;

use crate::stats::Stats;

/// Drives [`Stats::export_all`] on a fixed interval.
pub struct Reporter {
    stats: Stats,
    interval: Duration,
}

impl Reporter {
    pub fn new(stats: Stats, interval: Duration) -> Self {
        Self { stats, interval }
    }

    /// Export on every tick until `shutdown` fires, then export once more.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_ms = self.interval.as_millis() as u64, "Reporter starting");

        let mut ticker = time::interval(self.interval);
        // The first tick completes immediately; skip it so the first export
        // happens one interval after startup.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.stats.export_all();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Reporter received shutdown signal, flushing");
                    self.stats.export_all();
                    break;
                }
            }
        }
    }

    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::export::Exporter;
    use crate::lifecycle::Shutdown;
    use crate::stats::{Aggregation, MeasureKind, TagMap, Unit, View, ViewData};

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    impl Exporter for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn export_view(&self, _data: &ViewData) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_reporter_flushes_on_shutdown() {
        let stats = Stats::new();
        let m = stats
            .declare("ticks", "Ticks", Unit::Dimensionless, MeasureKind::Int64)
            .unwrap();
        stats.register_view(View::new(&m, Aggregation::Count)).unwrap();
        stats.record_one(&TagMap::new(), m.int(1));

        let exporter = Arc::new(Counting::default());
        stats.register_exporter(exporter.clone());

        let shutdown = Shutdown::new();
        let handle = Reporter::new(stats, Duration::from_secs(3600)).spawn(shutdown.subscribe());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(exporter.calls.load(Ordering::SeqCst), 0);

        shutdown.trigger();
        handle.await.unwrap();
        assert_eq!(exporter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reporter_exports_every_interval() {
        let stats = Stats::new();
        let m = stats
            .declare("ticks", "Ticks", Unit::Dimensionless, MeasureKind::Int64)
            .unwrap();
        stats.register_view(View::new(&m, Aggregation::Count)).unwrap();

        let exporter = Arc::new(Counting::default());
        stats.register_exporter(exporter.clone());

        let shutdown = Shutdown::new();
        let handle = Reporter::new(stats, Duration::from_secs(10)).spawn(shutdown.subscribe());

        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(exporter.calls.load(Ordering::SeqCst), 3);

        shutdown.trigger();
        handle.await.unwrap();
        assert_eq!(exporter.calls.load(Ordering::SeqCst), 4);
    }
}
