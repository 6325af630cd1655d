//! End-to-end tests driving fake `sh` engines through the bridge.

#![cfg(unix)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use helio_bridge::{
    Candidate, CandidateResolver, Capability, CommandFamily, CommandRegistry, CommandSpec,
    ErrorKind, TimeoutClass, TransportMode,
};
use helio_test::{CountingProber, FakeEngine, scripts};
use serde::{Deserialize, Serialize};
use serde_json::json;

fn echo_registry() -> CommandRegistry {
    CommandRegistry::from_specs([
        CommandSpec::new(
            "echo_argv",
            CommandFamily::Catalog,
            "echo_argv.sh",
            TransportMode::Argv,
        ),
        CommandSpec::new(
            "echo_stdin",
            CommandFamily::Calculation,
            "echo_stdin.sh",
            TransportMode::Stdin,
        ),
        CommandSpec::new(
            "echo_file",
            CommandFamily::Calculation,
            "echo_file.sh",
            TransportMode::TempFile,
        )
        .with_timeout_class(TimeoutClass::Calculation),
    ])
}

fn sample_payload() -> serde_json::Value {
    json!({
        "module_quantity": 20,
        "customer": "Müller & Söhne",
        "options": {"storage": true, "wallbox": null},
        "tariffs": [0.32, 0.08]
    })
}

/// Wait until `pid` no longer exists.
async fn process_gone(pid: i32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    for _ in 0..50 {
        if kill(Pid::from_raw(pid), None).is_err() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn test_argv_round_trip() {
    let engine = FakeEngine::new();
    engine.write_script("echo_argv.sh", scripts::ECHO_LAST_ARG);
    let bridge = engine.bridge_with(echo_registry());

    let envelope = bridge
        .call_command("echo_argv", sample_payload(), None)
        .await;
    assert_eq!(envelope.data(), Some(&sample_payload()));
}

#[tokio::test]
async fn test_stdin_round_trip() {
    let engine = FakeEngine::new();
    engine.write_script("echo_stdin.sh", scripts::ECHO_STDIN);
    let bridge = engine.bridge_with(echo_registry());

    let envelope = bridge
        .call_command("echo_stdin", sample_payload(), None)
        .await;
    assert_eq!(envelope.data(), Some(&sample_payload()));
}

#[tokio::test]
async fn test_temp_file_round_trip_and_cleanup() {
    let engine = FakeEngine::new();
    engine.write_script("echo_file.sh", scripts::RECORD_REQUEST_FILE);
    let bridge = engine.bridge_with(echo_registry());

    let envelope = bridge
        .call_command("echo_file", sample_payload(), None)
        .await;
    assert_eq!(envelope.data(), Some(&sample_payload()));

    let request = PathBuf::from(engine.read_marker("request.path").unwrap());
    assert!(request.starts_with(engine.scratch_dir()));
    let name = request.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("calculation_request_"));
    assert!(name.ends_with(".json"));
    assert!(!request.exists());
    assert!(engine.scratch_entries().is_empty());
}

#[tokio::test]
async fn test_engine_error_exit_seven() {
    let engine = FakeEngine::new();
    engine.write_script("calculation_bridge.py", scripts::FAIL_BOOM);

    let envelope = engine
        .bridge()
        .call_command("perform_calculations", json!({"module_quantity": 20}), None)
        .await;

    assert_eq!(envelope.error_kind(), Some(ErrorKind::EngineError));
    let message = envelope.message().unwrap();
    assert!(message.contains("boom"));
    assert!(message.contains("exit code 7"));
    assert!(engine.scratch_entries().is_empty());
}

#[tokio::test]
async fn test_temp_file_removed_after_engine_error() {
    let engine = FakeEngine::new();
    engine.write_script("calculation_bridge.py", scripts::RECORD_AND_FAIL);

    let envelope = engine
        .bridge()
        .call_command("perform_calculations", json!({"module_quantity": 20}), None)
        .await;

    assert_eq!(envelope.error_kind(), Some(ErrorKind::EngineError));
    let request = PathBuf::from(engine.read_marker("request.path").unwrap());
    assert!(!request.exists());
    assert!(engine.scratch_entries().is_empty());
}

#[tokio::test]
async fn test_timeout_kills_engine_and_cleans_up() {
    let engine = FakeEngine::new();
    engine.write_script("calculation_bridge.py", scripts::HANG);

    let started = Instant::now();
    let envelope = engine
        .bridge()
        .call_command(
            "perform_calculations",
            json!({"module_quantity": 20}),
            Some(Duration::from_millis(1500)),
        )
        .await;

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(envelope.error_kind(), Some(ErrorKind::Timeout));
    assert!(envelope.message().unwrap().contains("1.5s"));

    let pid: i32 = engine.read_marker("engine.pid").unwrap().parse().unwrap();
    assert!(process_gone(pid).await, "engine process {pid} survived the timeout");
    assert!(engine.scratch_entries().is_empty());
}

#[tokio::test]
async fn test_dropped_call_kills_engine_and_cleans_up() {
    let engine = FakeEngine::new();
    engine.write_script("calculation_bridge.py", scripts::HANG);
    let bridge = engine.bridge();

    let call = bridge.call_command(
        "perform_calculations",
        json!({"module_quantity": 20}),
        Some(Duration::from_secs(30)),
    );
    let cancelled = tokio::time::timeout(Duration::from_millis(1500), call).await;
    assert!(cancelled.is_err());

    let pid: i32 = engine.read_marker("engine.pid").unwrap().parse().unwrap();
    assert!(process_gone(pid).await, "engine process {pid} survived cancellation");
    assert!(engine.scratch_entries().is_empty());
}

#[tokio::test]
async fn test_malformed_json_response() {
    let engine = FakeEngine::new();
    engine.write_script("calculation_bridge.py", scripts::NOT_JSON);

    let envelope = engine
        .bridge()
        .call_command("perform_calculations", json!({}), None)
        .await;

    assert_eq!(envelope.error_kind(), Some(ErrorKind::MalformedResponse));
    assert!(envelope.message().unwrap().contains("Traceback"));
}

#[tokio::test]
async fn test_missing_script_is_engine_error() {
    let engine = FakeEngine::new();

    let envelope = engine
        .bridge()
        .call_command("get_pv_manufacturers", json!(null), None)
        .await;

    assert_eq!(envelope.error_kind(), Some(ErrorKind::EngineError));
}

#[tokio::test]
async fn test_pv_manufacturers() {
    let engine = FakeEngine::new();
    engine.write_script("solar_calculator_bridge.py", scripts::CATALOG);
    let bridge = engine.bridge();

    let envelope = bridge
        .call_command("get_pv_manufacturers", json!(null), None)
        .await;
    assert!(envelope.is_success());
    assert_eq!(envelope.data(), Some(&json!(["Brand A", "Brand B"])));

    let envelope = bridge
        .call_command("get_pv_models", json!("Brand A"), None)
        .await;
    assert_eq!(
        envelope.data(),
        Some(&json!(["Brand A X1", "Brand A X2"]))
    );
}

#[tokio::test]
async fn test_perform_calculations() {
    let engine = FakeEngine::new();
    engine.write_script("calculation_bridge.py", scripts::CALCULATION);

    let envelope = engine
        .bridge()
        .call_command("perform_calculations", json!({"module_quantity": 20}), None)
        .await;

    assert_eq!(envelope.data(), Some(&json!({"anlage_kwp": 8.0})));
    assert!(engine.scratch_entries().is_empty());
}

#[tokio::test]
async fn test_calculation_commands_reach_engine_distinctly() {
    let engine = FakeEngine::new();
    engine.write_script("calculation_bridge.py", scripts::ECHO_REQUEST_FILE);
    let bridge = engine.bridge();

    let full = bridge
        .call_command("perform_calculations", json!({"x": 1}), None)
        .await;
    let live = bridge
        .call_command("calculate_live_pricing", json!({"x": 1}), None)
        .await;

    assert_eq!(
        full.data(),
        Some(&json!({"command": "perform_calculations", "x": 1}))
    );
    assert_eq!(
        live.data(),
        Some(&json!({"command": "calculate_live_pricing", "x": 1}))
    );
    assert!(engine.scratch_entries().is_empty());
}

#[tokio::test]
async fn test_spawn_failure_removes_request_file() {
    let engine = FakeEngine::new();
    engine.write_script("calculation_bridge.py", scripts::CALCULATION);

    let prober = CountingProber::default().with_executable("/nonexistent/helio-python");
    let resolver = Arc::new(CandidateResolver::with_prober(Arc::new(prober)));
    let bridge = engine.bridge().with_resolver(resolver);

    let envelope = bridge
        .call_command("perform_calculations", json!({"module_quantity": 20}), None)
        .await;

    assert_eq!(envelope.error_kind(), Some(ErrorKind::EngineUnavailable));
    assert!(engine.scratch_entries().is_empty());
}

#[tokio::test]
async fn test_env_and_working_directory_reach_engine() {
    let engine = FakeEngine::new();
    engine.write_script("solar_calculator_bridge.py", scripts::ECHO_ENVIRONMENT);
    let bridge = engine.bridge().with_env("HELIO_REGION", "DE-BY");
    assert_eq!(bridge.engine_root(), engine.root());

    let envelope = bridge
        .call_command("get_pv_manufacturers", json!(null), None)
        .await;

    let data = envelope.data().unwrap();
    assert_eq!(data["region"], json!("DE-BY"));
    let root = engine.root().canonicalize().unwrap();
    assert_eq!(data["cwd"], json!(root.to_string_lossy()));
}

#[tokio::test]
async fn test_typed_call() {
    #[derive(Serialize)]
    struct Request {
        module_quantity: u32,
    }

    #[derive(Deserialize)]
    struct Summary {
        anlage_kwp: f64,
    }

    let engine = FakeEngine::new();
    engine.write_script("calculation_bridge.py", scripts::CALCULATION);

    let summary: Summary = engine
        .bridge()
        .call(
            "perform_calculations",
            &Request {
                module_quantity: 20,
            },
            None,
        )
        .await
        .unwrap();
    assert!((summary.anlage_kwp - 8.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_products_envelope() {
    let engine = FakeEngine::new();
    engine.write_script("database_bridge.py", scripts::PRODUCTS);
    let bridge = engine.bridge();

    let found = bridge
        .call_command("get_product_by_model", json!({"model": "X1"}), None)
        .await;
    assert_eq!(found.data(), Some(&json!({"id": 1, "model": "X1"})));

    let missing = bridge
        .call_command("get_product_by_model", json!({"model": "Z9"}), None)
        .await;
    assert_eq!(missing.error_kind(), Some(ErrorKind::EngineError));
    assert!(missing.message().unwrap().contains("Product not found"));

    let malformed = bridge.call_command("list_products", json!(null), None).await;
    assert_eq!(malformed.error_kind(), Some(ErrorKind::MalformedResponse));

    let rejected = bridge.call_command("list_products", json!([1]), None).await;
    assert_eq!(rejected.error_kind(), Some(ErrorKind::MarshalFailed));
}

#[tokio::test]
async fn test_offer_pdf_text_response() {
    let engine = FakeEngine::new();
    engine.write_script("pdf_generation_bridge.py", scripts::DOCUMENT);

    let envelope = engine
        .bridge()
        .call_command("generate_offer_pdf", json!({"offer": 1}), None)
        .await;

    let expected = engine.scratch_dir().join("offer.pdf");
    assert_eq!(
        envelope.data(),
        Some(&json!(expected.to_string_lossy()))
    );
    assert!(engine.scratch_entries().is_empty());
}

#[tokio::test]
async fn test_capability_unavailable_names_every_candidate() {
    let engine = FakeEngine::new();
    engine.write_script("solar_calculator_bridge.py", scripts::CATALOG);
    let bridge = engine.bridge().with_capability(Capability::new(
        "engine-interpreter",
        vec![
            Candidate::new("helio-no-python3"),
            Candidate::new("helio-no-py").with_args(["-3"]),
        ],
    ));

    let envelope = bridge
        .call_command("get_pv_manufacturers", json!(null), None)
        .await;

    assert_eq!(envelope.error_kind(), Some(ErrorKind::CapabilityUnavailable));
    let message = envelope.message().unwrap();
    assert!(message.contains("helio-no-python3"));
    assert!(message.contains("helio-no-py -3"));
}

#[tokio::test]
async fn test_engine_info() {
    let engine = FakeEngine::new();

    let info = engine.bridge().engine_info().await;
    let data = info.data().unwrap();
    assert_eq!(data["version"], json!(helio_test::FAKE_ENGINE_VERSION));
    assert_eq!(data["candidate"], json!("sh"));
}

#[tokio::test]
async fn test_concurrent_first_use_probes_once() {
    let engine = FakeEngine::new();
    engine.write_script("solar_calculator_bridge.py", scripts::CATALOG);

    let prober = Arc::new(CountingProber::new(Duration::from_millis(200)));
    let resolver = Arc::new(CandidateResolver::with_prober(prober.clone()));
    let bridge = Arc::new(engine.bridge().with_resolver(resolver));

    let mut calls = tokio::task::JoinSet::new();
    for _ in 0..8 {
        let bridge = Arc::clone(&bridge);
        calls.spawn(async move {
            bridge
                .call_command("get_pv_manufacturers", json!(null), None)
                .await
        });
    }
    while let Some(envelope) = calls.join_next().await {
        assert!(envelope.unwrap().is_success());
    }
    assert_eq!(prober.probes(), 1);

    bridge
        .call_command("get_pv_manufacturers", json!(null), None)
        .await;
    assert_eq!(prober.probes(), 1);
}

#[tokio::test]
async fn test_resolver_shared_between_bridges() {
    let engine = FakeEngine::new();
    engine.write_script("solar_calculator_bridge.py", scripts::CATALOG);

    let prober = Arc::new(CountingProber::default());
    let resolver = Arc::new(CandidateResolver::with_prober(prober.clone()));

    for _ in 0..3 {
        let bridge = engine.bridge().with_resolver(Arc::clone(&resolver));
        let envelope = bridge
            .call_command("get_pv_manufacturers", json!(null), None)
            .await;
        assert!(envelope.is_success());
    }
    assert_eq!(prober.probes(), 1);
}
