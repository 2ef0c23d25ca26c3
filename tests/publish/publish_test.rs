//! Coverage for the build-and-publish pipeline.
//!
//! The upload tests run a local capture server standing in for the
//! artifact repository, so the one-request property is asserted against
//! real HTTP traffic.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::routing::any;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use clay_relay::config::PublishConfig;
use clay_relay::publish::{PublishError, Publisher};

/// One request as seen by the capture server.
struct Captured {
    method: String,
    path: String,
    authorization: Option<String>,
    body: Vec<u8>,
}

/// Shared state of the capture server.
#[derive(Clone)]
struct Capture {
    requests: Arc<Mutex<Vec<Captured>>>,
    respond_with: StatusCode,
}

async fn record(State(capture): State<Capture>, request: Request) -> (StatusCode, &'static str) {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(ToOwned::to_owned);
    let body = axum::body::to_bytes(request.into_body(), 4_194_304)
        .await
        .unwrap_or_default()
        .to_vec();
    capture.requests.lock().await.push(Captured {
        method,
        path,
        authorization,
        body,
    });
    (capture.respond_with, "captured")
}

/// Start a capture server on an ephemeral port.
async fn start_capture_server(respond_with: StatusCode) -> (SocketAddr, Capture) {
    let capture = Capture {
        requests: Arc::new(Mutex::new(Vec::new())),
        respond_with,
    };
    let app = Router::new()
        .fallback(any(record))
        .with_state(capture.clone());
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind capture server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, capture)
}

fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[tokio::test]
async fn upload_issues_exactly_one_authenticated_post() {
    let (addr, capture) = start_capture_server(StatusCode::CREATED).await;

    let dir = tempfile::tempdir().expect("tempdir");
    let artifact = dir.path().join("clay-relay.exe");
    std::fs::write(&artifact, b"fake-windows-binary").expect("write artifact");

    let publisher = Publisher::new(PublishConfig {
        base_url: format!("http://{addr}"),
        ..PublishConfig::default()
    });
    let destination = publisher.destination("1734").expect("destination");
    let status = publisher
        .upload(&artifact, destination, "secret-token")
        .await
        .expect("upload should succeed");
    assert_eq!(status, StatusCode::CREATED);

    let requests = capture.requests.lock().await;
    assert_eq!(requests.len(), 1, "exactly one upload request");
    let request = &requests[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/clay-relay/1734/");
    assert_eq!(
        request.authorization.as_deref(),
        Some("Bearer secret-token")
    );
    // Multipart body carries the artifact bytes and its file name.
    assert!(contains_subslice(&request.body, b"fake-windows-binary"));
    assert!(contains_subslice(&request.body, b"clay-relay.exe"));
}

#[tokio::test]
async fn rejected_upload_surfaces_status_and_body() {
    let (addr, capture) = start_capture_server(StatusCode::FORBIDDEN).await;

    let dir = tempfile::tempdir().expect("tempdir");
    let artifact = dir.path().join("clay-relay.exe");
    std::fs::write(&artifact, b"bytes").expect("write artifact");

    let publisher = Publisher::new(PublishConfig {
        base_url: format!("http://{addr}"),
        ..PublishConfig::default()
    });
    let destination = publisher.destination("2").expect("destination");
    let result = publisher.upload(&artifact, destination, "t").await;

    match result {
        Err(PublishError::UploadRejected { status, body }) => {
            assert_eq!(status, StatusCode::FORBIDDEN);
            assert_eq!(body, "captured");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(capture.requests.lock().await.len(), 1);
}

#[tokio::test]
async fn missing_artifact_never_reaches_the_wire() {
    let (addr, capture) = start_capture_server(StatusCode::CREATED).await;

    let publisher = Publisher::new(PublishConfig {
        base_url: format!("http://{addr}"),
        ..PublishConfig::default()
    });
    let destination = publisher.destination("3").expect("destination");
    let missing = PathBuf::from("does/not/exist/clay-relay.exe");
    let result = publisher.upload(&missing, destination, "t").await;

    assert!(matches!(result, Err(PublishError::ArtifactRead { .. })));
    assert!(capture.requests.lock().await.is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn compile_injects_target_environment() {
    let dir = tempfile::tempdir().expect("tempdir");
    let artifact = dir.path().join("out.bin");

    let publisher = Publisher::new(PublishConfig {
        compiler: "sh".to_owned(),
        compiler_args: vec![
            "-c".to_owned(),
            format!("printf '%s' \"$GOOS-$GOARCH\" > '{}'", artifact.display()),
        ],
        artifact: artifact.clone(),
        ..PublishConfig::default()
    });

    let produced = publisher.compile().await.expect("compile should succeed");
    assert_eq!(produced, artifact);
    let contents = std::fs::read_to_string(&artifact).expect("read artifact");
    assert_eq!(contents, "windows-amd64");
}

#[cfg(unix)]
#[tokio::test]
async fn compiler_failure_carries_stderr() {
    let publisher = Publisher::new(PublishConfig {
        compiler: "sh".to_owned(),
        compiler_args: vec!["-c".to_owned(), "echo boom >&2; exit 1".to_owned()],
        ..PublishConfig::default()
    });

    match publisher.compile().await {
        Err(PublishError::CompilerFailed { stderr, .. }) => {
            assert!(stderr.contains("boom"));
        }
        other => panic!("expected compiler failure, got {other:?}"),
    }
}

#[cfg(unix)]
#[tokio::test]
async fn successful_compile_without_artifact_is_an_error() {
    let publisher = Publisher::new(PublishConfig {
        compiler: "true".to_owned(),
        compiler_args: Vec::new(),
        artifact: PathBuf::from("never-produced.bin"),
        ..PublishConfig::default()
    });

    assert!(matches!(
        publisher.compile().await,
        Err(PublishError::ArtifactMissing(_))
    ));
}

#[tokio::test]
async fn dry_run_resolves_without_touching_compiler_or_network() {
    std::env::set_var("CLAY_TEST_RUN_NUMBER", "77");
    let publisher = Publisher::new(PublishConfig {
        // Unroutable base: a dry run must never connect.
        base_url: "https://artifacts.invalid".to_owned(),
        run_env: "CLAY_TEST_RUN_NUMBER".to_owned(),
        ..PublishConfig::default()
    });

    let report = publisher.run(true).await.expect("dry run should succeed");
    assert!(!report.uploaded);
    assert_eq!(
        report.destination.as_str(),
        "https://artifacts.invalid/clay-relay/77/"
    );
    assert!(report.command.starts_with("GOOS=windows GOARCH=amd64"));
}

#[tokio::test]
async fn missing_run_number_fails_before_compiling() {
    let publisher = Publisher::new(PublishConfig {
        base_url: "https://artifacts.invalid".to_owned(),
        run_env: "CLAY_TEST_RUN_NUMBER_THAT_IS_NEVER_SET".to_owned(),
        ..PublishConfig::default()
    });

    match publisher.run(false).await {
        Err(PublishError::MissingEnv(var)) => {
            assert_eq!(var, "CLAY_TEST_RUN_NUMBER_THAT_IS_NEVER_SET");
        }
        other => panic!("expected missing env error, got {other:?}"),
    }
}
