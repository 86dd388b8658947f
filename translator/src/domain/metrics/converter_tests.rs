//! Tests for resource metric conversion with the built-in rules

use std::collections::HashMap;

use opentelemetry_proto::tonic::common::v1::{AnyValue, KeyValue, any_value};
use opentelemetry_proto::tonic::metrics::v1::{
    AggregationTemporality, Gauge, Metric, NumberDataPoint, ScopeMetrics, Sum, metric::Data,
    number_data_point,
};
use opentelemetry_proto::tonic::resource::v1::Resource;

use super::*;
use crate::data::{MetricType, Value};
use crate::domain::filters::resolve_exclude_metrics;
use crate::domain::translation::{AggregationMethod, Rule, default_translation_rules};

const T0: u64 = 1_596_000_000_000_000_000;
const MINUTE: u64 = 60_000_000_000;

fn kv(key: &str, value: &str) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: Some(AnyValue {
            value: Some(any_value::Value::StringValue(value.to_string())),
        }),
    }
}

fn number_dp(value: number_data_point::Value, time: u64, attrs: &[(&str, &str)]) -> NumberDataPoint {
    NumberDataPoint {
        attributes: attrs.iter().map(|(k, v)| kv(k, v)).collect(),
        time_unix_nano: time,
        value: Some(value),
        ..Default::default()
    }
}

fn int_dp(value: i64, time: u64, attrs: &[(&str, &str)]) -> NumberDataPoint {
    number_dp(number_data_point::Value::AsInt(value), time, attrs)
}

fn double_dp(value: f64, time: u64, attrs: &[(&str, &str)]) -> NumberDataPoint {
    number_dp(number_data_point::Value::AsDouble(value), time, attrs)
}

fn cumulative(name: &str, data_points: Vec<NumberDataPoint>) -> Metric {
    Metric {
        name: name.to_string(),
        data: Some(Data::Sum(Sum {
            data_points,
            aggregation_temporality: AggregationTemporality::Cumulative as i32,
            is_monotonic: true,
        })),
        ..Default::default()
    }
}

fn gauge(name: &str, data_points: Vec<NumberDataPoint>) -> Metric {
    Metric {
        name: name.to_string(),
        data: Some(Data::Gauge(Gauge { data_points })),
        ..Default::default()
    }
}

fn resource_metrics(resource_attrs: &[(&str, &str)], metrics: Vec<Metric>) -> ResourceMetrics {
    ResourceMetrics {
        resource: Some(Resource {
            attributes: resource_attrs.iter().map(|(k, v)| kv(k, v)).collect(),
            ..Default::default()
        }),
        scope_metrics: vec![ScopeMetrics {
            metrics,
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn host0(metrics: Vec<Metric>) -> ResourceMetrics {
    resource_metrics(&[("host.name", "host0")], metrics)
}

fn default_converter() -> MetricsConverter {
    let translator = MetricTranslator::new(default_translation_rules().unwrap(), 3600).unwrap();
    MetricsConverter::new(Some(Arc::new(translator)), &[], &[], "_-.").unwrap()
}

fn converter_with(rules: Vec<Rule>) -> MetricsConverter {
    let translator = MetricTranslator::new(rules, 3600).unwrap();
    MetricsConverter::new(Some(Arc::new(translator)), &[], &[], "_-.").unwrap()
}

fn named<'a>(points: &'a [DataPoint], metric: &str) -> Vec<&'a DataPoint> {
    points.iter().filter(|dp| dp.metric == metric).collect()
}

fn values_by(points: &[&DataPoint], key: &str) -> HashMap<String, Value> {
    points
        .iter()
        .map(|dp| (dp.dimension(key).unwrap_or_default().to_string(), dp.value))
        .collect()
}

// ============================================================================
// DEFAULT RULES
// ============================================================================

#[test]
fn test_memory_utilization() {
    let rm = host0(vec![Metric {
        name: "system.memory.usage".to_string(),
        data: Some(Data::Sum(Sum {
            data_points: vec![
                int_dp(4_000_000_000, T0, &[("state", "used")]),
                int_dp(6_000_000_000, T0, &[("state", "free")]),
            ],
            aggregation_temporality: AggregationTemporality::Cumulative as i32,
            is_monotonic: false,
        })),
        ..Default::default()
    }]);

    let points = default_converter().metrics_to_data_points(&rm);

    let utilization = named(&points, "memory.utilization");
    assert_eq!(utilization.len(), 1);
    assert_eq!(utilization[0].value, Value::Double(40.0));
    assert_eq!(utilization[0].dimensions, vec![Dimension::new("host", "host0")]);
    assert_eq!(named(&points, "memory.used")[0].value, Value::Int(4_000_000_000));
    assert!(named(&points, "memory.total").is_empty());
}

#[test]
fn test_disk_io_total() {
    let rm = host0(vec![cumulative(
        "system.disk.io",
        vec![
            int_dp(1_000_000_000, T0, &[("device", "sda1"), ("direction", "read")]),
            int_dp(3_000_000_000, T0, &[("device", "sda1"), ("direction", "write")]),
            int_dp(2_000_000_000, T0, &[("device", "sda2"), ("direction", "read")]),
            int_dp(8_000_000_000, T0, &[("device", "sda2"), ("direction", "write")]),
        ],
    )]);

    let points = default_converter().metrics_to_data_points(&rm);

    let total = named(&points, "system.disk.io.total");
    assert_eq!(total.len(), 2);
    for dp in &total {
        assert_eq!(dp.dimensions.len(), 2);
        assert_eq!(dp.dimensions[1].key, "direction");
        assert_eq!(dp.metric_type, MetricType::CumulativeCounter);
    }
    let by_direction = values_by(&total, "direction");
    assert_eq!(by_direction["write"], Value::Int(11_000_000_000));
    assert_eq!(by_direction["read"], Value::Int(3_000_000_000));
    assert_eq!(named(&points, "system.disk.io").len(), 4);
}

#[test]
fn test_disk_ops_total_from_two_observations() {
    let ops = |time: u64, offset: i64| {
        cumulative(
            "system.disk.operations",
            vec![
                int_dp(4_000 + offset, time, &[("device", "sda1"), ("direction", "read")]),
                int_dp(5_000 + offset, time, &[("device", "sda1"), ("direction", "write")]),
                int_dp(6_000 + offset, time, &[("device", "sda2"), ("direction", "read")]),
                int_dp(7_000 + offset, time, &[("device", "sda2"), ("direction", "write")]),
            ],
        )
    };
    let rm = host0(vec![ops(T0, 0), ops(T0 + MINUTE, 2_000)]);

    let points = default_converter().metrics_to_data_points(&rm);

    let totals = named(&points, "system.disk.operations.total");
    assert_eq!(totals.len(), 4);
    assert!(totals.iter().all(|dp| dp.dimensions.len() == 2));

    let disk_ops = named(&points, "disk_ops.total");
    assert_eq!(disk_ops.len(), 1);
    assert_eq!(disk_ops[0].value, Value::Int(8_000));
    assert_eq!(disk_ops[0].dimensions, vec![Dimension::new("host", "host0")]);
}

#[test]
fn test_network_totals() {
    let rm = resource_metrics(
        &[
            ("host.name", "host0"),
            ("k8s.node.name", "node1"),
            ("k8s.cluster.name", "cluster1"),
        ],
        vec![
            cumulative(
                "system.network.io",
                vec![
                    int_dp(1_000_000_000, T0, &[("device", "eth0"), ("direction", "receive")]),
                    int_dp(2_000_000_000, T0, &[("device", "eth0"), ("direction", "transmit")]),
                    int_dp(3_000_000_000, T0, &[("device", "eth1"), ("direction", "receive")]),
                    int_dp(4_000_000_000, T0, &[("device", "eth1"), ("direction", "transmit")]),
                ],
            ),
            cumulative(
                "system.network.packets",
                vec![
                    int_dp(100, T0, &[("device", "eth0"), ("direction", "receive")]),
                    int_dp(250, T0, &[("device", "eth1"), ("direction", "receive")]),
                ],
            ),
        ],
    );

    let points = default_converter().metrics_to_data_points(&rm);

    let io_total = named(&points, "system.network.io.total");
    assert_eq!(io_total.len(), 2);
    assert!(io_total.iter().all(|dp| dp.dimensions.len() == 4));
    let by_direction = values_by(&io_total, "direction");
    assert_eq!(by_direction["receive"], Value::Int(4_000_000_000));
    assert_eq!(by_direction["transmit"], Value::Int(6_000_000_000));

    let packets = named(&points, "system.network.packets.total");
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].value, Value::Int(350));
    assert_eq!(packets[0].dimensions.len(), 4);
    assert_eq!(packets[0].dimensions[3], Dimension::new("direction", "receive"));

    let network = named(&points, "network.total");
    assert_eq!(network.len(), 1);
    assert_eq!(network[0].value, Value::Int(10_000_000_000));
    assert_eq!(
        network[0].dimensions,
        vec![
            Dimension::new("host", "host0"),
            Dimension::new("kubernetes_node", "node1"),
            Dimension::new("kubernetes_cluster", "cluster1"),
        ]
    );
}

#[test]
fn test_cpu_utilization() {
    let cpu_time = |time: u64, user: f64, system: f64, idle: f64| {
        cumulative(
            "system.cpu.time",
            vec![
                double_dp(user, time, &[("cpu", "cpu0"), ("state", "user")]),
                double_dp(system, time, &[("cpu", "cpu0"), ("state", "system")]),
                double_dp(idle, time, &[("cpu", "cpu0"), ("state", "idle")]),
            ],
        )
    };
    let rm = host0(vec![
        cpu_time(T0, 10.0, 5.0, 85.0),
        cpu_time(T0 + MINUTE, 40.0, 15.0, 105.0),
    ]);

    let points = default_converter().metrics_to_data_points(&rm);

    let utilization = named(&points, "cpu.utilization");
    assert_eq!(utilization.len(), 1);
    assert_eq!(utilization[0].value, Value::Double(40.0 / 60.0 * 100.0));
    assert_eq!(utilization[0].dimensions, vec![Dimension::new("host", "host0")]);
    for temporary in ["system.cpu.delta", "system.cpu.usage", "system.cpu.total"] {
        assert!(named(&points, temporary).is_empty(), "{temporary} leaked");
    }
}

#[test]
fn test_filesystem_utilization() {
    // Two devices pooled under one mountpoint
    let fs = |device: &str, used: i64, free: i64| {
        let attrs = |state: &'static str| {
            [
                ("device", device),
                ("mountpoint", "/mnt/pool"),
                ("type", "ext4"),
                ("state", state),
            ]
        };
        vec![
            int_dp(used, T0, &attrs("used")),
            int_dp(free, T0, &attrs("free")),
            int_dp(5, T0, &attrs("reserved")),
        ]
    };
    let mut data_points = fs("/dev/sda1", 30, 70);
    data_points.extend(fs("/dev/sdb1", 60, 40));
    let rm = host0(vec![Metric {
        name: "system.filesystem.usage".to_string(),
        data: Some(Data::Sum(Sum {
            data_points,
            aggregation_temporality: AggregationTemporality::Cumulative as i32,
            is_monotonic: false,
        })),
        ..Default::default()
    }]);

    let points = default_converter().metrics_to_data_points(&rm);

    let utilization = named(&points, "disk.utilization");
    assert_eq!(utilization.len(), 2);
    assert!(utilization.iter().all(|dp| dp.dimensions.len() == 4));
    let by_device = values_by(&utilization, "device");
    assert_eq!(by_device["/dev/sda1"], Value::Double(30.0));
    assert_eq!(by_device["/dev/sdb1"], Value::Double(60.0));

    let summary = named(&points, "disk.summary_utilization");
    assert_eq!(summary.len(), 1);
    assert_eq!(summary[0].value, Value::Double(45.0));
    assert_eq!(
        summary[0].dimensions,
        vec![
            Dimension::new("host", "host0"),
            Dimension::new("mountpoint", "/mnt/pool"),
            Dimension::new("type", "ext4"),
        ]
    );

    for temporary in [
        "disk.total",
        "disk.summary_total",
        "df_complex.used_total",
        "system.filesystem.usage.used",
        "system.filesystem.usage.free",
    ] {
        assert!(named(&points, temporary).is_empty(), "{temporary} leaked");
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

#[test]
fn test_rate_then_aggregate_across_batches() {
    let converter = converter_with(vec![
        Rule::ComputeRate {
            mapping: HashMap::from([("system.disk.io".to_string(), "disk.io.rate".to_string())]),
        },
        Rule::AggregateMetric {
            metric_name: "disk.io.rate".to_string(),
            aggregation_method: AggregationMethod::Sum,
            without_dimensions: vec!["device".to_string()],
            dimensions: vec![],
        },
    ]);
    let io = |time: u64, sda1: i64, sda2: i64| {
        host0(vec![cumulative(
            "system.disk.io",
            vec![
                int_dp(sda1, time, &[("device", "sda1"), ("direction", "read")]),
                int_dp(sda2, time, &[("device", "sda2"), ("direction", "read")]),
            ],
        )])
    };

    let first = converter.metrics_to_data_points(&io(T0, 10_000, 20_000));
    assert!(named(&first, "disk.io.rate").is_empty());

    let second = converter.metrics_to_data_points(&io(T0 + MINUTE, 12_000, 22_000));
    let rate = named(&second, "disk.io.rate");
    assert_eq!(rate.len(), 1);
    let Value::Double(total) = rate[0].value else {
        panic!("rate must be a double");
    };
    assert!((total - (2e3 / 60.0 + 2e3 / 60.0)).abs() < 1e-9);
    assert_eq!(
        rate[0].dimensions,
        vec![Dimension::new("host.name", "host0"), Dimension::new("direction", "read")]
    );
}

#[test]
fn test_translation_failure_forwards_untranslated_batch() {
    let converter = converter_with(vec![
        Rule::RenameMetrics {
            mapping: HashMap::from([("bytes".to_string(), "renamed".to_string())]),
        },
        Rule::DivideInt {
            scale_factors_int: HashMap::from([("renamed".to_string(), 1_024)]),
        },
    ]);
    let rm = host0(vec![gauge("bytes", vec![double_dp(2_048.0, T0, &[])])]);

    let points = converter.metrics_to_data_points(&rm);
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].metric, "bytes");
    assert_eq!(points[0].value, Value::Double(2_048.0));
}

#[test]
fn test_default_rules_never_reject() {
    let converter = default_converter();
    assert!(!converter.translator().unwrap().may_reject());
}

#[test]
fn test_rejected_batch_keeps_cumulative_state() {
    let converter = converter_with(vec![
        Rule::DeltaMetric {
            mapping: HashMap::from([("ops".to_string(), "ops.delta".to_string())]),
        },
        Rule::MultiplyInt {
            scale_factors_int: HashMap::from([("ops".to_string(), 2)]),
        },
    ]);
    let batch =
        |time: u64, value: f64| host0(vec![cumulative("ops", vec![double_dp(value, time, &[])])]);

    let first = converter.metrics_to_data_points(&batch(T0, 10.0));
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].metric, "ops");
    assert_eq!(converter.translator().unwrap().tracked_series(), 1);

    // Still rejected; the series stays tracked across batches
    let second = converter.metrics_to_data_points(&batch(T0 + MINUTE, 25.0));
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].value, Value::Double(25.0));
    assert_eq!(converter.translator().unwrap().tracked_series(), 1);
}

#[test]
fn test_without_translator_only_filters() {
    let converter = MetricsConverter::new(
        None,
        &resolve_exclude_metrics(None).unwrap(),
        &[],
        "_-.",
    )
    .unwrap();
    let rm = host0(vec![
        cumulative("system.disk.io", vec![int_dp(1, T0, &[("device", "sda1")])]),
        gauge("custom.metric", vec![int_dp(2, T0, &[])]),
    ]);

    let points = converter.metrics_to_data_points(&rm);
    assert!(converter.translator().is_none());
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].metric, "custom.metric");
    assert_eq!(points[0].dimensions, vec![Dimension::new("host.name", "host0")]);
}

#[test]
fn test_default_excludes_after_translation() {
    let translator = MetricTranslator::new(default_translation_rules().unwrap(), 3600).unwrap();
    let converter = MetricsConverter::new(
        Some(Arc::new(translator)),
        &resolve_exclude_metrics(None).unwrap(),
        &[MetricFilter::for_metrics(["system.disk.operations"])],
        "_-.",
    )
    .unwrap();
    let rm = host0(vec![
        cumulative(
            "system.disk.io",
            vec![int_dp(1, T0, &[("device", "sda1"), ("direction", "read")])],
        ),
        cumulative(
            "system.disk.operations",
            vec![int_dp(1, T0, &[("device", "sda1"), ("direction", "read")])],
        ),
    ]);

    let points = converter.metrics_to_data_points(&rm);
    let names: Vec<&str> = points.iter().map(|dp| dp.metric.as_str()).collect();
    assert_eq!(names, vec!["system.disk.io.total", "system.disk.operations"]);
}

#[test]
fn test_explicit_empty_excludes_keep_everything() {
    let translator = MetricTranslator::new(vec![], 3600).unwrap();
    let converter = MetricsConverter::new(
        Some(Arc::new(translator)),
        &resolve_exclude_metrics(Some(vec![])).unwrap(),
        &[],
        "_-.",
    )
    .unwrap();
    let rm = host0(vec![cumulative("system.disk.io", vec![int_dp(1, T0, &[])])]);
    assert_eq!(converter.metrics_to_data_points(&rm).len(), 1);
}

#[test]
fn test_dimension_keys_sanitized() {
    let converter = MetricsConverter::new(None, &[], &[], "_-.").unwrap();
    let rm = resource_metrics(
        &[("k8s/pod:name", "p1")],
        vec![gauge("m", vec![int_dp(1, T0, &[("my.key-1", "v"), ("a b", "c")])])],
    );

    let points = converter.metrics_to_data_points(&rm);
    let keys: Vec<&str> = points[0].dimensions.iter().map(|d| d.key.as_str()).collect();
    assert_eq!(keys, vec!["k8s_pod_name", "my.key-1", "a_b"]);
}

#[test]
fn test_request_flattens_resources() {
    let converter = MetricsConverter::new(None, &[], &[], "_-.").unwrap();
    let request = ExportMetricsServiceRequest {
        resource_metrics: vec![
            host0(vec![gauge("a", vec![int_dp(1, T0, &[])])]),
            resource_metrics(
                &[("host.name", "host1")],
                vec![gauge("b", vec![int_dp(2, T0, &[])])],
            ),
        ],
    };

    let points = converter.request_to_data_points(&request);
    assert_eq!(points.len(), 2);
    assert_eq!(points[0].dimension("host.name"), Some("host0"));
    assert_eq!(points[1].dimension("host.name"), Some("host1"));
}

#[test]
fn test_invalid_filter_fails_construction() {
    let err = MetricsConverter::new(None, &[MetricFilter::default()], &[], "_-.")
        .err()
        .unwrap();
    assert!(matches!(err, ConverterError::Filter(_)));
}
