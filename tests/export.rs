//! Pull and push export paths.

use std::time::Duration;

use cluster_metrics::config::MetricsConfig;
use cluster_metrics::export::{FacadeExporter, LogExporter, Reporter};
use cluster_metrics::lifecycle::{bootstrap, Shutdown};
use cluster_metrics::stats::defaults::{PIN_COUNT, REQUEST_LATENCY};
use cluster_metrics::stats::{TagMap, DEFAULT_VIEW_NAMES};
use cluster_metrics::Exporter;

mod common;

#[test]
fn test_snapshot_serializes_to_json() {
    let (stats, d) = common::stats_with_defaults();
    let tags = TagMap::new().with(&d.service, "pin").with(&d.method, "Add");
    stats.record_one(&tags, d.request_latency.float(12.5));

    let data = stats.snapshot(REQUEST_LATENCY).unwrap();
    let json = serde_json::to_value(&data).unwrap();

    assert_eq!(json["name"], REQUEST_LATENCY);
    assert_eq!(json["unit"], "milliseconds");
    assert_eq!(json["aggregation"], "distribution");
    assert_eq!(json["rows"][0]["data"]["type"], "distribution");
    assert_eq!(json["rows"][0]["data"]["value"]["count"], 1);
    assert_eq!(json["rows"][0]["tags"][0][0], "method");
}

#[test]
fn test_export_all_pushes_every_view() {
    let (stats, d) = common::stats_with_defaults();
    let capture = common::CapturingExporter::new();
    stats.register_exporter(capture.clone());

    stats.record_one(&TagMap::new(), d.pin_count.int(1));
    stats.export_all();

    let mut names = capture.names();
    names.sort();
    let mut expected: Vec<String> = DEFAULT_VIEW_NAMES.iter().map(|s| s.to_string()).collect();
    expected.sort();
    assert_eq!(names, expected);
}

#[test]
fn test_unregister_flushes_once_then_discards() {
    let (stats, d) = common::stats_with_defaults();
    let capture = common::CapturingExporter::new();
    stats.register_exporter(capture.clone());

    stats.record_one(&TagMap::new(), d.pin_count.int(9));
    let last = stats.unregister_view(PIN_COUNT).unwrap();
    assert_eq!(common::sum_of(&last, &[]), 9.0);
    assert_eq!(capture.names(), vec![PIN_COUNT.to_string()]);

    // Later recordings against the measure go nowhere.
    stats.record_one(&TagMap::new(), d.pin_count.int(1));
    assert!(stats.snapshot(PIN_COUNT).is_none());
    assert_eq!(stats.view_names().len(), 4);

    // Installing the defaults again brings the view back, empty.
    stats.install_defaults().unwrap();
    assert!(stats.snapshot(PIN_COUNT).unwrap().rows.is_empty());
}

#[test]
fn test_builtin_exporters_accept_all_default_views() {
    // No recorder is installed, so the facade writes into the no-op recorder.
    let (stats, d) = common::stats_with_defaults();
    let tags = TagMap::new().with(&d.service, "pin").with(&d.method, "Ls");
    stats.record_one(&tags, d.request_latency.float(3.0));
    stats.record_one(&tags, d.request_count.int(1));
    stats.record_one(&TagMap::new().with(&d.host, "a"), d.peer_count.int(1));

    let facade = FacadeExporter::with_namespace("cluster");
    let log = LogExporter::new();
    for data in stats.snapshot_all() {
        facade.export_view(&data);
        log.export_view(&data);
    }
}

#[tokio::test]
async fn test_reporter_with_bootstrapped_stats() {
    let mut config = MetricsConfig::default();
    config.export.interval_ms = 20;

    let boot = bootstrap(&config).unwrap();
    let capture = common::CapturingExporter::new();
    boot.stats.register_exporter(capture.clone());
    boot.stats
        .record_one(&TagMap::new(), boot.defaults.pin_count.int(1));

    let mut shutdown = Shutdown::new();
    let handle = Reporter::new(
        boot.stats.clone(),
        Duration::from_millis(config.export.interval_ms),
    )
    .spawn(shutdown.subscribe());
    shutdown.track("reporter", handle);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(shutdown.complete(Duration::from_secs(5)).await, 1);

    // At least one tick plus the final flush, five views each.
    let received = capture.received.lock().len();
    assert!(received >= 10, "received {received}");
    assert_eq!(received % DEFAULT_VIEW_NAMES.len(), 0);
}
