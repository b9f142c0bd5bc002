//! Request Executor Tests
//!
//! Device endpoints are wiremock servers; the resolver is an in-memory fake
//! pointing every node at the mock server.

use async_trait::async_trait;
use metrics_exporter_prometheus::PrometheusBuilder;
use df_common::{Command, NodeId};
use df_feeder::{ClientError, DispatchError, ExecutorConfig, FeederError, NodeResolver, RequestExecutor};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_ok;
use wiremock::matchers::{body_string, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const NODE: &str = "uk-sa2209-hnode-a1-00ff";

enum Resolution {
    Address(String),
    Fail(ClientError),
}

struct FakeResolver {
    resolution: Resolution,
}

impl FakeResolver {
    fn pointing_at(server: &MockServer) -> Arc<Self> {
        Arc::new(Self {
            resolution: Resolution::Address(server.address().to_string()),
        })
    }

    fn failing(error: ClientError) -> Arc<Self> {
        Arc::new(Self {
            resolution: Resolution::Fail(error),
        })
    }
}

#[async_trait]
impl NodeResolver for FakeResolver {
    async fn resolve(&self, _node: &NodeId) -> Result<String, ClientError> {
        match &self.resolution {
            Resolution::Address(address) => Ok(address.clone()),
            Resolution::Fail(e) => Err(e.clone()),
        }
    }
}

fn executor(resolver: Arc<dyn NodeResolver>) -> RequestExecutor {
    executor_with(resolver, ExecutorConfig::default())
}

fn executor_with(resolver: Arc<dyn NodeResolver>, config: ExecutorConfig) -> RequestExecutor {
    RequestExecutor::new(resolver, config).unwrap()
}

fn update_command(target: &str) -> Command {
    Command::new(target, "POST", "/devices/update", "test-body")
}

#[tokio::test]
async fn test_successful_device_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/devices/update"))
        .and(body_string("test-body"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let result = executor(FakeResolver::pointing_at(&server))
        .execute(&update_command(&format!("ukma.{}", NODE)))
        .await;

    assert_ok!(result);
}

#[tokio::test]
async fn test_node_id_is_case_insensitive() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/devices/update"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let result = executor(FakeResolver::pointing_at(&server))
        .execute(&update_command(&format!("ukma.{}", NODE.to_uppercase())))
        .await;

    assert_ok!(result);
}

#[tokio::test]
async fn test_wildcard_is_invalid_node_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = executor(FakeResolver::pointing_at(&server))
        .execute(&update_command("ukma.*"))
        .await
        .unwrap_err();

    assert!(err.is_permanent());
    assert!(matches!(err.cause(), FeederError::InvalidNodeId { .. }));
    assert!(err.to_string().contains("invalid node id"));
}

#[tokio::test]
async fn test_missing_separator_is_invalid_target() {
    let server = MockServer::start().await;

    let err = executor(FakeResolver::pointing_at(&server))
        .execute(&update_command("ukma"))
        .await
        .unwrap_err();

    assert!(err.is_permanent());
    assert!(err.to_string().contains("invalid target"));
}

#[tokio::test]
async fn test_unknown_method_is_permanent() {
    let server = MockServer::start().await;
    let command = Command::new(format!("ukma.{}", NODE), "FETCH", "/devices/update", "");

    let err = executor(FakeResolver::pointing_at(&server))
        .execute(&command)
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::Permanent(FeederError::InvalidMethod(_))));
}

#[tokio::test]
async fn test_device_404_is_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/devices/update"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let err = executor(FakeResolver::pointing_at(&server))
        .execute(&update_command(&format!("ukma.{}", NODE)))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DispatchError::Permanent(FeederError::Device4xx { status: 404 })
    ));
}

#[tokio::test]
async fn test_device_500_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/devices/update"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let err = executor(FakeResolver::pointing_at(&server))
        .execute(&update_command(&format!("ukma.{}", NODE)))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DispatchError::Transient(FeederError::Device5xx { status: 500 })
    ));
}

#[tokio::test]
async fn test_device_timeout_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/devices/update"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let config = ExecutorConfig {
        request_timeout: Duration::from_millis(200),
        ..Default::default()
    };
    let err = executor_with(FakeResolver::pointing_at(&server), config)
        .execute(&update_command(&format!("ukma.{}", NODE)))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DispatchError::Transient(FeederError::DeviceUnreachable(_))
    ));
}

#[tokio::test]
async fn test_device_port_override() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    // Resolver hands out a dead port; the configured device port wins
    let resolver = Arc::new(FakeResolver {
        resolution: Resolution::Address("127.0.0.1:1".to_string()),
    });
    let config = ExecutorConfig {
        device_port: server.address().port(),
        ..Default::default()
    };
    let command = Command::new(format!("ukma.{}", NODE), "get", "/ping", "");

    let result = executor_with(resolver, config).execute(&command).await;
    assert_ok!(result);
}

#[tokio::test]
async fn test_resolver_outage_is_transient() {
    let err = executor(FakeResolver::failing(ClientError::Unavailable("lookup down".into())))
        .execute(&update_command(&format!("ukma.{}", NODE)))
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::Transient(FeederError::Resolver(_))));
}

#[tokio::test]
async fn test_resolver_not_found_is_transient_by_default() {
    let err = executor(FakeResolver::failing(ClientError::NotFound(NODE.into())))
        .execute(&update_command(&format!("ukma.{}", NODE)))
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::Transient(FeederError::NodeNotFound(_))));
}

#[tokio::test]
async fn test_resolver_not_found_can_be_permanent() {
    let config = ExecutorConfig {
        resolver_not_found_permanent: true,
        ..Default::default()
    };
    let err = executor_with(FakeResolver::failing(ClientError::NotFound(NODE.into())), config)
        .execute(&update_command(&format!("ukma.{}", NODE)))
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::Permanent(FeederError::NodeNotFound(_))));
}

#[test]
fn test_resolution_failure_is_counted() {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    metrics::with_local_recorder(&recorder, || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let unavailable = executor(FakeResolver::failing(ClientError::Unavailable("down".into())));
            let first = unavailable.execute(&update_command(&format!("ukma.{}", NODE))).await;
            assert!(matches!(first, Err(DispatchError::Transient(_))));

            let not_found = executor_with(
                FakeResolver::failing(ClientError::NotFound("gone".into())),
                ExecutorConfig {
                    resolver_not_found_permanent: true,
                    ..Default::default()
                },
            );
            let second = not_found.execute(&update_command(&format!("ukma.{}", NODE))).await;
            assert!(matches!(second, Err(DispatchError::Permanent(_))));
        });
    });

    let rendered = handle.render();
    assert!(rendered.contains(r#"df_device_requests_total{result="failure"} 2"#));
    assert!(!rendered.contains(r#"result="success""#));
}
