// Handler-level tests run against the real router with stubbed speech and
// analysis seams; requests go through tower's oneshot without a socket.

use anyhow::Result;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use herdlog::analysis::{AnalysisResult, Analyze};
use herdlog::config::AudioConfig;
use herdlog::speech::{Transcribe, Transcript, TranscriptSource};
use herdlog::{
    create_router, AppState, AudioAssetStore, AudioDecoder, DecodedAudio,
    InMemoryObservationRepository, PipelineOrchestrator,
};
use std::f32::consts::TAU;
use std::fs;
use std::sync::Arc;
use tower::ServiceExt;

struct StubTranscriber;

impl Transcribe for StubTranscriber {
    fn transcribe(&self, _audio: &DecodedAudio) -> Transcript {
        Transcript {
            text: "the goat is grazing near the fence".to_string(),
            source: TranscriptSource::Ok,
        }
    }
}

struct StubAnalyzer;

#[async_trait]
impl Analyze for StubAnalyzer {
    async fn analyze(&self, _text: &str, _context: Option<&str>) -> AnalysisResult {
        AnalysisResult::not_determined()
    }
}

fn app(dir: &tempfile::TempDir) -> Result<axum::Router> {
    let config = AudioConfig {
        scratch_dir: dir.path().join("scratch").to_string_lossy().into_owned(),
        ..AudioConfig::default()
    };

    let orchestrator = PipelineOrchestrator::new(
        Arc::new(AudioAssetStore::new(&config)?),
        Arc::new(AudioDecoder::new(&config)),
        Arc::new(StubTranscriber),
        Arc::new(StubAnalyzer),
    );

    let state = AppState::new(
        Arc::new(orchestrator),
        Arc::new(InMemoryObservationRepository::new()),
    );
    Ok(create_router(state))
}

fn wav_fixture(dir: &std::path::Path) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let path = dir.join("fixture.wav");
    let mut writer = hound::WavWriter::create(&path, spec)?;
    for i in 0..32_000 {
        let t = i as f32 / 16_000.0;
        writer.write_sample(((TAU * 330.0 * t).sin() * 0.4 * i16::MAX as f32) as i16)?;
    }
    writer.finalize()?;

    Ok(fs::read(&path)?)
}

const BOUNDARY: &str = "herdlog-test-boundary";

fn multipart_request(uri: &str, parts: Vec<(&str, Option<&str>, Vec<u8>)>) -> Request<Body> {
    let mut body = Vec::new();
    for (name, filename, content) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match filename {
            Some(f) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\r\n",
                    name, f
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            ),
        }
        body.extend_from_slice(&content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoint() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let app = app(&dir)?;

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn test_upload_without_file_part_is_rejected() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let app = app(&dir)?;

    let request = multipart_request(
        "/observations/cow-12/audio",
        vec![("description", None, b"standing apart from the herd".to_vec())],
    );
    let response = app.oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn test_unreadable_description_part_does_not_fail_the_upload() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let app = app(&dir)?;
    let wav = wav_fixture(dir.path())?;

    // Description bytes are not valid UTF-8; the part is dropped with a
    // warning and the recording still goes through the pipeline
    let request = multipart_request(
        "/observations/cow-12/audio",
        vec![
            ("description", None, vec![0xff, 0xfe, 0xfd]),
            ("file", Some("session.wav"), wav),
        ],
    );
    let response = app.oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024).await?;
    let outcome: serde_json::Value = serde_json::from_slice(&bytes)?;
    assert_eq!(outcome["processing_status"], "completed");
    assert!(outcome["diagnostics"]["description"].is_null());

    Ok(())
}

#[tokio::test]
async fn test_upload_persists_record_for_subject() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let app = app(&dir)?;
    let wav = wav_fixture(dir.path())?;

    let request = multipart_request(
        "/observations/cow-12/audio",
        vec![("file", Some("session.wav"), wav)],
    );
    let response = app.clone().oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/observations/cow-12")
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024).await?;
    let records: serde_json::Value = serde_json::from_slice(&bytes)?;
    assert_eq!(records.as_array().map(|a| a.len()), Some(1));
    assert_eq!(records[0]["subject_id"], "cow-12");

    Ok(())
}
