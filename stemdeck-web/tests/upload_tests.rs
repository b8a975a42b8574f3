//! POST /upload tests

mod helpers;

use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

use helpers::{body_bytes, body_json, get, post_json, upload_request, wav_fixture, TestEnv};

#[tokio::test]
async fn test_upload_round_trip_is_byte_identical() {
    let env = TestEnv::new();
    let wav = wav_fixture(env.temp.path());

    let response = env
        .app()
        .oneshot(upload_request("file", "take 1.wav", &wav))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    let filename = body["filename"].as_str().unwrap();
    let filepath = body["filepath"].as_str().unwrap();
    assert!(filename.ends_with("_take_1.wav"), "{}", filename);
    assert_eq!(filepath, format!("/static/uploads/{}", filename));

    // Timestamp token prefix: <seconds>.<6 digit micros>
    let (token, _) = filename.split_once('_').unwrap();
    let (secs, micros) = token.split_once('.').unwrap();
    assert!(secs.parse::<i64>().is_ok());
    assert_eq!(micros.len(), 6);

    let served = env.app().oneshot(get(filepath)).await.unwrap();
    assert_eq!(served.status(), StatusCode::OK);
    assert_eq!(body_bytes(served).await, wav);

    let reader = hound::WavReader::open(env.path_of(filepath)).unwrap();
    assert_eq!(reader.spec().channels, 2);
    assert_eq!(reader.spec().sample_rate, 44_100);
}

#[tokio::test]
async fn test_extension_check_is_case_insensitive() {
    let env = TestEnv::new();

    let response = env
        .app()
        .oneshot(upload_request("file", "Clip.MP4", b"not really a video"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["filename"].as_str().unwrap().ends_with("_Clip.MP4"));
}

#[tokio::test]
async fn test_disallowed_extension_writes_nothing() {
    let env = TestEnv::new();

    for name in ["notes.txt", "archive.tar.gz", "noextension", "song.mp3.exe"] {
        let response = env
            .app()
            .oneshot(upload_request("file", name, b"data"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", name);
        let body = body_json(response).await;
        assert_eq!(body["error"], "File type not allowed", "{}", name);
    }

    assert!(env.uploads().is_empty());
}

#[tokio::test]
async fn test_name_with_nothing_usable_is_rejected() {
    let env = TestEnv::new();

    let response = env
        .app()
        .oneshot(upload_request("file", "???.mp3", b"data"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "File type not allowed");
    assert!(env.uploads().is_empty());
}

#[tokio::test]
async fn test_path_components_are_stripped() {
    let env = TestEnv::new();

    let response = env
        .app()
        .oneshot(upload_request("file", "../../evil.mp3", b"data"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let filename = body["filename"].as_str().unwrap();
    assert!(!filename.contains('/'));
    assert!(!filename.contains(".."));
    assert_eq!(env.uploads(), vec![filename.to_string()]);
}

#[tokio::test]
async fn test_missing_file_part() {
    let env = TestEnv::new();

    let response = env
        .app()
        .oneshot(upload_request("attachment", "song.mp3", b"data"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "No file uploaded");
    assert!(env.uploads().is_empty());
}

#[tokio::test]
async fn test_empty_filename() {
    let env = TestEnv::new();

    let response = env
        .app()
        .oneshot(upload_request("file", "", b"data"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "No selected file");
}

#[tokio::test]
async fn test_non_multipart_body() {
    let env = TestEnv::new();

    let response = env
        .app()
        .oneshot(post_json("/upload", &json!({"file": "song.mp3"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "No file uploaded");
}

#[tokio::test]
async fn test_oversized_upload_is_refused() {
    let env = TestEnv::with_config(|config| config.max_upload_bytes = 1024);

    let response = env
        .app()
        .oneshot(upload_request("file", "big.wav", &vec![0u8; 8192]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(env.uploads().is_empty());
}
