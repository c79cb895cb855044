//! Exercises `SettingsFetcher` against a mock control plane.

use std::sync::Arc;

use trace_sampling_core::{AgentConfig, SamplerError, ServiceKey, SettingsFetcher, SettingsStore};
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config() -> AgentConfig {
    AgentConfig {
        collector: "placeholder.invalid:443".to_string(),
        service_key: ServiceKey {
            token: "test-token".to_string(),
            service_name: "my-service".to_string(),
        },
        host_name: "host-1".to_string(),
        ..Default::default()
    }
}

fn fetcher_for(server: &MockServer, store: Arc<SettingsStore>) -> SettingsFetcher {
    SettingsFetcher::new(&config(), store)
        .unwrap()
        .expect("config() has enabled: true")
        .with_base_url_override(server.uri())
}

#[tokio::test]
async fn successful_fetch_installs_a_snapshot() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/v1/settings/.*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "flags": "SAMPLE_START",
            "value": 500000,
            "ttl": 120,
            "arguments": {
                "BucketCapacity": 1000.0,
                "BucketRate": 1000.0,
            }
        })))
        .mount(&server)
        .await;

    let store = Arc::new(SettingsStore::new());
    let fetcher = fetcher_for(&server, store.clone());

    assert!(!store.has_default());
    fetcher.poll_once().await.unwrap();
    assert!(store.has_default());
    assert_eq!(store.get().unwrap().sample_rate(), 500_000);
}

#[tokio::test]
async fn auth_failure_is_reported_and_leaves_no_snapshot() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/v1/settings/.*"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let store = Arc::new(SettingsStore::new());
    let fetcher = fetcher_for(&server, store.clone());

    let result = fetcher.poll_once().await;
    assert!(matches!(result, Err(SamplerError::Auth(_))));
    assert!(!store.has_default());
}

#[tokio::test]
async fn transient_failure_retains_the_previous_snapshot() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/v1/settings/.*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "flags": "SAMPLE_START",
            "value": 1000,
            "ttl": 120,
            "arguments": {}
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/v1/settings/.*"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let store = Arc::new(SettingsStore::new());
    let fetcher = fetcher_for(&server, store.clone());

    fetcher.poll_once().await.unwrap();
    assert_eq!(store.get().unwrap().sample_rate(), 1000);

    let result = fetcher.poll_once().await;
    assert!(matches!(result, Err(SamplerError::Fetch(_))));
    assert_eq!(store.get().unwrap().sample_rate(), 1000);
}

#[tokio::test]
async fn start_then_stop_is_clean() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/v1/settings/.*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "flags": "",
            "value": 0,
            "ttl": 120,
            "arguments": {}
        })))
        .mount(&server)
        .await;

    let store = Arc::new(SettingsStore::new());
    let fetcher = Arc::new(fetcher_for(&server, store));
    let mut handle = fetcher.start().await;
    handle.stop();
    handle.stop();
}

#[tokio::test]
async fn construction_rejects_an_empty_collector() {
    let store = Arc::new(SettingsStore::new());
    let mut cfg = config();
    cfg.collector = String::new();
    let result = SettingsFetcher::new(&cfg, store);
    assert!(result.is_err());
}
