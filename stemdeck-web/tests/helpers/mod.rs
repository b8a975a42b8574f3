//! Shared test helpers for stemdeck-web integration tests
//!
//! Every test gets its own temporary root folder. External tools are
//! replaced by small POSIX shell scripts written next to it:
//!
//! - fake ffmpeg: appends its argument list to `ffmpeg_calls.log` and copies
//!   the first `-i` input to the output path;
//! - fake separator: run as `sh <script>`, writes
//!   `<out>/<model>/<track>/{vocals,no_vocals}.mp3` like the real model.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use stemdeck_common::config::ServiceConfig;
use stemdeck_web::{build_router, AppState};

pub const MULTIPART_BOUNDARY: &str = "stemdeck-test-boundary";

/// Behavior of the fake ffmpeg
#[derive(Debug, Clone, Copy)]
pub enum FakeFfmpeg {
    /// Copies the first input to the output
    Working,
    /// Prints a diagnostic to stderr and exits 1
    Failing,
    /// Exits 0 without writing anything
    Silent,
}

/// Behavior of the fake separator
#[derive(Debug, Clone, Copy)]
pub enum FakeSeparator {
    /// Writes both stems
    Working,
    /// Creates the track directory but no stems
    Empty,
    /// Exits 0 without creating the track directory
    NoOutput,
    /// Prints `boom` to stderr and exits 3
    Failing,
    /// Sleeps past any reasonable timeout
    Slow,
}

const FFMPEG_WORKING: &str = r#"#!/bin/sh
echo "$*" >> "$(dirname "$0")/ffmpeg_calls.log"
if [ "$1" = "-version" ]; then
    echo "ffmpeg version fake"
    exit 0
fi
input=""
prev=""
last=""
for arg in "$@"; do
    if [ "$prev" = "-i" ] && [ -z "$input" ]; then
        input="$arg"
    fi
    prev="$arg"
    last="$arg"
done
cp "$input" "$last"
"#;

const FFMPEG_FAILING: &str = r#"#!/bin/sh
echo "$*" >> "$(dirname "$0")/ffmpeg_calls.log"
echo "Invalid data found when processing input" >&2
echo "Conversion failed!" >&2
exit 1
"#;

const FFMPEG_SILENT: &str = r#"#!/bin/sh
echo "$*" >> "$(dirname "$0")/ffmpeg_calls.log"
exit 0
"#;

/// Argument parsing shared by the separator fakes
const SEPARATOR_PRELUDE: &str = r#"echo "$*" >> "$(dirname "$0")/separator_calls.log"
out=""
model=""
prev=""
input=""
for arg in "$@"; do
    case "$prev" in
        --out) out="$arg" ;;
        -n) model="$arg" ;;
    esac
    prev="$arg"
    input="$arg"
done
name=$(basename "$input")
track="${name%.*}"
"#;

fn separator_script(mode: FakeSeparator) -> String {
    let body = match mode {
        FakeSeparator::Working => {
            r#"mkdir -p "$out/$model/$track"
printf 'ID3vocals' > "$out/$model/$track/vocals.mp3"
printf 'ID3accompaniment' > "$out/$model/$track/no_vocals.mp3"
"#
        }
        FakeSeparator::Empty => "mkdir -p \"$out/$model/$track\"\n",
        FakeSeparator::NoOutput => "exit 0\n",
        FakeSeparator::Failing => "echo boom >&2\nexit 3\n",
        FakeSeparator::Slow => "sleep 5\n",
    };
    format!("{}{}", SEPARATOR_PRELUDE, body)
}

/// Isolated service instance
pub struct TestEnv {
    pub temp: TempDir,
    pub tools_dir: PathBuf,
    pub state: AppState,
}

impl TestEnv {
    /// Working fake tools, default configuration
    pub fn new() -> Self {
        Self::with_tools(FakeFfmpeg::Working, FakeSeparator::Working)
    }

    pub fn with_tools(ffmpeg: FakeFfmpeg, separator: FakeSeparator) -> Self {
        Self::build(ffmpeg, separator, |_| {})
    }

    /// Working fake tools, configuration adjusted by `customize`
    pub fn with_config(customize: impl FnOnce(&mut ServiceConfig)) -> Self {
        Self::build(FakeFfmpeg::Working, FakeSeparator::Working, customize)
    }

    pub fn build(
        ffmpeg: FakeFfmpeg,
        separator: FakeSeparator,
        customize: impl FnOnce(&mut ServiceConfig),
    ) -> Self {
        let temp = TempDir::new().unwrap();
        let tools_dir = temp.path().join("tools");
        std::fs::create_dir_all(&tools_dir).unwrap();

        let ffmpeg_path = tools_dir.join("ffmpeg");
        let ffmpeg_script = match ffmpeg {
            FakeFfmpeg::Working => FFMPEG_WORKING,
            FakeFfmpeg::Failing => FFMPEG_FAILING,
            FakeFfmpeg::Silent => FFMPEG_SILENT,
        };
        write_executable(&ffmpeg_path, ffmpeg_script);

        let separator_path = tools_dir.join("separator.sh");
        std::fs::write(&separator_path, separator_script(separator)).unwrap();

        let mut config = ServiceConfig::with_root(temp.path().join("root"));
        config.ffmpeg_path = ffmpeg_path.to_string_lossy().into_owned();
        config.separator_program = "sh".to_string();
        config.separator_args = vec![separator_path.to_string_lossy().into_owned()];
        customize(&mut config);

        let state = AppState::new(config);
        state.layout.ensure_directories().unwrap();

        Self {
            temp,
            tools_dir,
            state,
        }
    }

    pub fn app(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Place a file in the uploads directory as if it had been uploaded
    pub fn put_upload(&self, filename: &str, data: &[u8]) -> PathBuf {
        let path = self.state.layout.upload_path(filename);
        std::fs::write(&path, data).unwrap();
        path
    }

    /// Place a file anywhere under the public root; returns its URL
    pub fn put_public(&self, relative: &str, data: &[u8]) -> String {
        let path = self.state.layout.public_root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, data).unwrap();
        format!("/static/{}", relative)
    }

    /// Argument lines the fake ffmpeg was called with
    pub fn ffmpeg_calls(&self) -> Vec<String> {
        read_lines(&self.tools_dir.join("ffmpeg_calls.log"))
    }

    /// Argument lines the fake separator was called with
    pub fn separator_calls(&self) -> Vec<String> {
        read_lines(&self.tools_dir.join("separator_calls.log"))
    }

    pub fn uploads(&self) -> Vec<String> {
        stemdeck_common::storage::list_dir(&self.state.layout.uploads)
    }

    pub fn exports(&self) -> Vec<String> {
        stemdeck_common::storage::list_dir(&self.state.layout.exports)
    }

    pub fn separated(&self) -> Vec<String> {
        stemdeck_common::storage::list_dir(&self.state.layout.separated)
    }

    /// Filesystem path behind a public URL
    pub fn path_of(&self, url: &str) -> PathBuf {
        self.state.layout.resolve_public_url(url).unwrap()
    }
}

fn write_executable(path: &Path, script: &str) {
    std::fs::write(path, script).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
}

fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .map(|text| text.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Test helper: GET request
pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Test helper: POST with a JSON body
pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

/// Test helper: POST with an arbitrary body and content type
pub fn post_raw(uri: &str, content_type: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, content_type)
        .body(body.into())
        .unwrap()
}

/// Multipart body with one part carrying a file
pub fn multipart_body(field: &str, filename: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", MULTIPART_BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", MULTIPART_BOUNDARY).as_bytes());
    body
}

/// Test helper: POST /upload with one file part
pub fn upload_request(field: &str, filename: &str, data: &[u8]) -> Request<Body> {
    post_raw(
        "/upload",
        &format!("multipart/form-data; boundary={}", MULTIPART_BOUNDARY),
        multipart_body(field, filename, data),
    )
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).expect("response body should be JSON")
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

/// Short stereo 16-bit 44.1 kHz sine, as WAV bytes
pub fn wav_fixture(dir: &Path) -> Vec<u8> {
    let path = dir.join("fixture.wav");
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: 44_100,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for n in 0..4_410 {
        let t = n as f32 / 44_100.0;
        let sample = ((t * 440.0 * 2.0 * std::f32::consts::PI).sin() * i16::MAX as f32 * 0.5) as i16;
        writer.write_sample(sample).unwrap();
        writer.write_sample(sample).unwrap();
    }
    writer.finalize().unwrap();
    std::fs::read(&path).unwrap()
}
