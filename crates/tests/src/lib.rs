//! # Integration Tests
//!
//! Cross-crate and end-to-end tests.
//!
//! Covers:
//! - Contract snapshots
//! - Config file -> adapters -> engine, with simulated producers
//! - Topology changes and shutdown while data flows

#[cfg(test)]
mod contract_tests {
    use contracts::{MeasurementKey, RouterBlueprint};

    #[test]
    fn test_key_text_form() {
        let key: MeasurementKey = "PPA:12".parse().unwrap();
        assert_eq!(key.source(), "PPA");
        assert_eq!(key.id(), 12);
        assert_eq!(key.to_string(), "PPA:12");
        assert!("PPA".parse::<MeasurementKey>().is_err());
        assert!(":1".parse::<MeasurementKey>().is_err());
        assert!("PPA:x".parse::<MeasurementKey>().is_err());
    }

    #[test]
    fn test_empty_blueprint() {
        let bp = RouterBlueprint::default();
        assert_eq!(bp.adapter_names().count(), 0);
        assert!(bp.provided_keys().is_empty());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::io::Write;
    use std::time::Duration;

    use adapters::{AdapterFactory, Topology};
    use config_loader::ConfigLoader;
    use contracts::{DispatchMode, Measurement, MeasurementKey, RouterBlueprint};
    use routing::RoutingEngine;

    const TOPOLOGY: &str = r#"
[engine]
readiness_timeout_ms = 200
shutdown_timeout_ms = 2000

[[producers]]
name = "pmu_a"
outputs = ["PPA:1", "PPA:2"]
frequency_hz = 100.0
auto_start = false

[[producers]]
name = "pmu_idle"
outputs = ["PPB:1"]
frequency_hz = 100.0
auto_start = false

[[processors]]
name = "avg"
inputs = ["PPA:1"]
outputs = ["CALC:1"]

[[sinks]]
name = "archive"
kind = "counting"
inputs = ["PPA:2", "CALC:1"]
auto_start = false

[[sinks]]
name = "orphan"
kind = "counting"
inputs = ["XYZ:1"]
auto_start = false
"#;

    fn key(s: &str) -> MeasurementKey {
        s.parse().unwrap()
    }

    fn load(content: &str) -> RouterBlueprint {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        ConfigLoader::load_from_path(file.path()).unwrap()
    }

    async fn start(blueprint: &RouterBlueprint) -> (RoutingEngine, Topology) {
        let engine = RoutingEngine::new(blueprint.engine.clone());
        let topology = AdapterFactory::build(blueprint, &engine).await.unwrap();
        settle(&engine);
        (engine, topology)
    }

    fn settle(engine: &RoutingEngine) {
        let idle = tokio::task::block_in_place(|| engine.wait_for_idle(Duration::from_secs(5)));
        assert!(idle, "route calculation did not settle");
    }

    fn enabled(topology: &Topology, name: &str) -> bool {
        topology
            .adapter_reports()
            .into_iter()
            .find(|r| r.name == name)
            .map(|r| r.enabled)
            .unwrap()
    }

    /// Config file -> adapters -> engine: routes and demand decisions
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_config_to_route_table() {
        let blueprint = load(TOPOLOGY);
        let (engine, topology) = start(&blueprint).await;

        let table = engine.route_table();
        assert!(table.generation() > 0);
        assert_eq!(table.processors_for(&key("PPA:1")), vec!["avg"]);
        assert_eq!(table.sinks_for(&key("PPA:2")), vec!["archive"]);
        assert_eq!(table.sinks_for(&key("CALC:1")), vec!["archive"]);
        assert!(table.sinks_for(&key("PPA:1")).is_empty());
        assert!(table.sinks().broadcast_slots().is_empty());

        // Demanded producer on, idle producer and unsupplied sink off
        assert!(enabled(&topology, "pmu_a"));
        assert!(!enabled(&topology, "pmu_idle"));
        assert!(enabled(&topology, "archive"));
        assert!(!enabled(&topology, "orphan"));

        topology.shutdown().await;
        assert!(engine.shutdown(Duration::from_secs(2)));
    }

    /// Simulated producers -> relay processor -> counting sink
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_e2e_simulated_pipeline() {
        let blueprint = load(TOPOLOGY);
        let (engine, topology) = start(&blueprint).await;

        topology.start_producers(engine.publisher());
        tokio::time::sleep(Duration::from_millis(200)).await;
        topology.shutdown().await;

        let archive = topology.sink("archive").and_then(|s| s.counts()).unwrap();
        assert!(archive.get(&key("PPA:2")) > 0);
        assert!(archive.get(&key("CALC:1")) > 0);
        assert_eq!(archive.get(&key("PPA:1")), 0);

        let orphan = topology.sink("orphan").and_then(|s| s.counts()).unwrap();
        assert_eq!(orphan.total(), 0);

        let idle = topology
            .producers()
            .iter()
            .find(|p| p.state().name() == "pmu_idle")
            .unwrap();
        assert_eq!(idle.emitted(), 0);

        let stats = engine.stats();
        assert!(stats.measurements > 0);
        assert_eq!(stats.delivery_failures, 0);

        assert!(engine.shutdown(Duration::from_secs(2)));
    }

    /// Removing the only consumer switches the demand-driven producer off
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_topology_change_updates_demand() {
        let blueprint = load(
            r#"
[[producers]]
name = "pmu"
outputs = ["PPA:1"]
auto_start = false

[[sinks]]
name = "archive"
inputs = ["PPA:1"]
"#,
        );
        let (engine, topology) = start(&blueprint).await;
        assert!(enabled(&topology, "pmu"));
        let before = engine.calculation_count();

        assert!(engine.remove_adapter("archive"));
        settle(&engine);

        assert!(engine.calculation_count() > before);
        assert!(!enabled(&topology, "pmu"));
        assert!(engine.route_table().sinks_for(&key("PPA:1")).is_empty());

        topology.shutdown().await;
        engine.shutdown(Duration::from_secs(2));
    }

    /// Broadcast mode delivers everything to every enabled consumer
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_broadcast_mode() {
        let blueprint = load(
            r#"
[engine]
dispatch_mode = "broadcast"

[[sinks]]
name = "narrow"
inputs = ["PPA:1"]

[[sinks]]
name = "tap"
"#,
        );
        assert_eq!(blueprint.engine.dispatch_mode, DispatchMode::Broadcast);
        let (engine, topology) = start(&blueprint).await;

        let publish = engine.publisher();
        publish(vec![
            Measurement::new(key("PPA:1"), 1.0, 0.0),
            Measurement::new(key("PPA:2"), 2.0, 0.0),
        ]);
        topology.shutdown().await;

        // Unfiltered: the narrow sink also sees PPA:2
        let narrow = topology.sink("narrow").and_then(|s| s.counts()).unwrap();
        assert_eq!(narrow.total(), 2);
        let tap = topology.sink("tap").and_then(|s| s.counts()).unwrap();
        assert_eq!(tap.total(), 2);

        engine.shutdown(Duration::from_secs(2));
    }

    /// An adapter that is slow to initialize receives everything meanwhile
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_readiness_timeout_falls_back_to_broadcast() {
        let blueprint = load(
            r#"
[[producers]]
name = "pmu"
outputs = ["PPA:1", "PPA:2"]

[[sinks]]
name = "slow"
inputs = ["PPA:1"]
readiness_timeout_ms = 20
startup_delay_ms = 60000
"#,
        );
        let (engine, topology) = start(&blueprint).await;

        let table = engine.route_table();
        assert!(table.sinks_for(&key("PPA:1")).is_empty());
        assert_eq!(table.summary().sinks.broadcast, vec!["slow".to_string()]);
        assert!(engine.stats().readiness_timeouts > 0);

        engine.dispatch(&[Measurement::new(key("PPA:2"), 1.0, 0.0)]);
        topology.shutdown().await;
        let counts = topology.sink("slow").and_then(|s| s.counts()).unwrap();
        assert_eq!(counts.get(&key("PPA:2")), 1);

        engine.shutdown(Duration::from_secs(2));
    }

    /// After shutdown the table is empty and publishing does nothing
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_stops_routing() {
        let blueprint = load(TOPOLOGY);
        let (engine, topology) = start(&blueprint).await;
        let publish = engine.publisher();

        assert!(engine.shutdown(Duration::from_secs(2)));
        assert!(engine.route_table().is_empty());
        assert!(!engine.request_calculation());

        let delivered = engine.stats().deliveries;
        publish(vec![Measurement::new(key("PPA:2"), 1.0, 0.0)]);
        assert_eq!(engine.stats().deliveries, delivered);

        topology.shutdown().await;
        let archive = topology.sink("archive").and_then(|s| s.counts()).unwrap();
        assert_eq!(archive.total(), 0);
    }
}
