use std::{sync::Arc, time::Duration};

use serde_json::json;
use tube_drogue::{
    api::DownloadRequest,
    artifact::save_artifact,
    config::Credentials,
    view::{HistoryView, Panel, PrimaryAction},
    Backend, ClientError, Config, DownloadHandle, HttpBackend, Outcome, Session,
};
use wiremock::{
    matchers::{body_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn config(server: &MockServer) -> Config {
    Config::default()
        .with_server(server.uri())
        .with_poll_interval(Duration::from_millis(50))
}

fn backend(server: &MockServer) -> HttpBackend {
    HttpBackend::new(config(server)).unwrap()
}

#[tokio::test]
async fn environment_uses_legacy_keys() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/vercel-info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "isVercel": true,
            "downloadsEnabled": false,
            "environment": {"vercelEnv": "production", "region": "iad1", "url": "x.vercel.app"}
        })))
        .mount(&server)
        .await;

    let info = backend(&server).environment().await.unwrap();
    assert!(info.is_hosted);
    assert!(!info.downloads_enabled);
    assert_eq!(info.deployment.unwrap().region.as_deref(), Some("iad1"));
}

#[tokio::test]
async fn failure_bodies_are_read_from_error_statuses() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/download"))
        .and(body_json(json!({"url": "https://youtu.be/abc123", "format": "720p"})))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"status": "error", "error": "Invalid URL format"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let response = backend(&server)
        .start_download(&DownloadRequest {
            url: "https://youtu.be/abc123".into(),
            format: "720p".into(),
        })
        .await
        .unwrap();
    assert!(!response.success);
    assert_eq!(response.error.as_deref(), Some("Invalid URL format"));
}

#[tokio::test]
async fn undecodable_responses_are_transport_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/vercel-info"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/download"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .expect(1)
        .mount(&server)
        .await;

    let session = Session::new(Arc::new(backend(&server)), config(&server));
    // The capability check fails, so the session assumes a local deployment.
    session.init().await;
    let err = session
        .submit("https://youtu.be/abc123", "720p")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));

    let view = session.view();
    assert_eq!(view.panel, Panel::Error);
    assert!(view
        .error_message
        .unwrap()
        .starts_with("Server error: "));
}

#[tokio::test]
async fn session_polls_until_complete() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/vercel-info"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"isVercel": false, "downloadsEnabled": true})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/download"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"success": true, "download_id": "d1"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/progress/d1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "status": "complete",
            "percentage": 100,
            "speed": 1048576.0,
            "eta": 0,
            "filename": "x.mp4",
            "title": "A video",
            "format": "720p",
            "download_id": "d1"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/downloads"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "downloads": [{"download_id": "d1", "title": "A video", "format": "720p", "timestamp": 1700000000.5}]
        })))
        .mount(&server)
        .await;

    let session = Session::new(Arc::new(backend(&server)), config(&server));
    session.init().await;
    assert!(matches!(session.view().history, HistoryView::Entries(ref entries) if entries.len() == 1));

    let mut updates = session.subscribe();
    let outcome = session.submit("https://youtu.be/abc123", "720p").await.unwrap();
    assert_eq!(outcome, Outcome::Polling(DownloadHandle::new("d1")));

    tokio::time::timeout(Duration::from_secs(5), async {
        while updates.borrow_and_update().panel != Panel::Success {
            updates.changed().await.unwrap();
        }
    })
    .await
    .unwrap();

    let view = session.view();
    let success = view.success.unwrap();
    assert_eq!(success.title, "A video");
    assert_eq!(success.filename, "x.mp4");
    assert_eq!(
        success.action,
        PrimaryAction::Download {
            handle: DownloadHandle::new("d1")
        }
    );
    assert!(!session.is_polling().await);
}

#[tokio::test]
async fn credentials_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health-check"))
        .and(header("authorization", "Basic bWU6aHVudGVyMg=="))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"status": "healthy", "timestamp": 1.0})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config(&server);
    config.credentials = Some(Credentials {
        user: "me".into(),
        password: Some("hunter2".into()),
    });
    let health = HttpBackend::new(config).unwrap().health_check().await.unwrap();
    assert_eq!(health.status, "healthy");
}

#[tokio::test]
async fn artifacts_are_saved_under_the_server_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/download/d1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-disposition", r#"attachment; filename="A video.mp4""#)
                .set_body_bytes(b"not really a video".to_vec()),
        )
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let saved = save_artifact(&backend(&server), &DownloadHandle::new("d1"), None, dir.path())
        .await
        .unwrap();
    assert_eq!(saved, dir.path().join("A video.mp4"));
    assert_eq!(std::fs::read(&saved).unwrap(), b"not really a video");
    // Only the final file is left behind.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn missing_artifacts_are_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/download/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let err = save_artifact(&backend(&server), &DownloadHandle::new("gone"), None, dir.path())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::ArtifactNotFound(_)));
}

#[tokio::test]
async fn failed_saves_leave_no_partial_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/download/d1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-disposition", r#"attachment; filename="A video.mp4""#)
                .set_body_bytes(b"not really a video".to_vec()),
        )
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    // A non-empty directory already holds the final name, so the rename fails.
    std::fs::create_dir(dir.path().join("A video.mp4")).unwrap();
    std::fs::write(dir.path().join("A video.mp4").join("keep"), b"x").unwrap();

    let err = save_artifact(&backend(&server), &DownloadHandle::new("d1"), None, dir.path())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Io(_)), "{:?}", err);
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(leftovers, vec!["A video.mp4".to_string()]);
}

#[tokio::test]
async fn hosted_lookup_failures_are_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/vercel-info"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"isVercel": true, "downloadsEnabled": false})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/video-info"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/download"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let session = Session::new(Arc::new(backend(&server)), config(&server));
    assert!(session.init().await.hosted);
    let err = session
        .submit("https://youtu.be/abc123", "720p")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));

    let view = session.view();
    assert_eq!(view.panel, Panel::Error);
    assert!(view
        .error_message
        .unwrap()
        .starts_with("Server error: "));
    assert!(!session.is_polling().await);
}
