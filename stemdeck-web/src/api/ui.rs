//! UI routes - HTML pages and browser scripts
//!
//! The landing page uploads and processes a file; the results page plays the
//! stems against the video and drives `POST /export`. Scripts are compiled
//! into the binary.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use stemdeck_common::StorageLayout;

use crate::AppState;

const UPLOAD_JS: &str = include_str!("../../ui/upload.js");
const EDITOR_JS: &str = include_str!("../../ui/editor.js");

/// Build UI routes
pub fn ui_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index_page))
        .route("/results", get(results_page))
        .route("/ui/upload.js", get(serve_upload_js))
        .route("/ui/editor.js", get(serve_editor_js))
}

fn javascript(source: &'static str) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/javascript")],
        source,
    )
        .into_response()
}

/// GET /ui/upload.js
pub async fn serve_upload_js() -> Response {
    javascript(UPLOAD_JS)
}

/// GET /ui/editor.js
pub async fn serve_editor_js() -> Response {
    javascript(EDITOR_JS)
}

const PAGE_STYLE: &str = r#"
    <style>
        body {
            font-family: system-ui, -apple-system, sans-serif;
            max-width: 860px;
            margin: 40px auto;
            padding: 20px;
            line-height: 1.6;
            color: #222;
        }
        h1 {
            border-bottom: 2px solid #0066cc;
            padding-bottom: 10px;
        }
        button {
            padding: 10px 20px;
            background: #0066cc;
            color: white;
            border: none;
            border-radius: 4px;
            cursor: pointer;
        }
        button:disabled {
            background: #9bb8d6;
            cursor: default;
        }
        .drop-zone {
            border: 2px dashed #0066cc;
            border-radius: 8px;
            padding: 40px;
            text-align: center;
            cursor: pointer;
        }
        .drop-zone.dragover {
            background: #e8f1fb;
        }
        .file-name { font-weight: bold; margin-right: 12px; }
        .file-size { color: #666; }
        .progress { background: #eee; border-radius: 4px; height: 10px; margin: 16px 0 6px; }
        .progress-fill { background: #0066cc; height: 100%; width: 0; border-radius: 4px; }
        .progress-info { display: flex; justify-content: space-between; color: #555; }
        video { width: 100%; background: #000; border-radius: 6px; }
        .track {
            display: flex;
            align-items: center;
            gap: 16px;
            padding: 10px 0;
            border-bottom: 1px solid #ddd;
        }
        .track-name { width: 140px; font-weight: bold; }
        .track.broken { opacity: 0.5; }
        .mute-btn.active { background: #cc3300; }
        .empty { color: #666; }
    </style>
"#;

/// GET /
pub async fn index_page() -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Stemdeck - Stem Separation</title>
{style}
</head>
<body>
    <h1>Stemdeck</h1>
    <p>Upload a song or a video. Stemdeck splits the audio into vocals and accompaniment,
    lets you rebalance them, and exports the remix back onto the video.</p>

    <div id="dropZone" class="drop-zone">
        <p>Drop an MP3, WAV or MP4 file here, or click to choose one</p>
        <input type="file" id="fileInput" accept=".mp3,.wav,.mp4" hidden>
    </div>
    <div id="fileInfo"></div>

    <div class="progress"><div id="progressFill" class="progress-fill"></div></div>
    <div class="progress-info">
        <span id="progressText">Waiting for a file</span>
        <span id="progressPercent">0%</span>
    </div>

    <p><button id="processBtn" disabled>Separate stems</button></p>

    <p><small>Module: stemdeck-web v{version}</small></p>
    <script src="/ui/upload.js"></script>
</body>
</html>
"#,
        style = PAGE_STYLE,
        version = env!("CARGO_PKG_VERSION"),
    ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ResultsQuery {
    /// JSON object of stem name → URL
    pub tracks: Option<String>,
    /// Public URL of the video to play and export onto
    pub video: Option<String>,
}

/// Escape text for HTML element content and quoted attribute values
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Parse the `tracks` query value
///
/// Malformed JSON, a non-object, non-string values and URLs that do not
/// address the public root all reduce to fewer (possibly zero) tracks.
pub fn parse_tracks(raw: Option<&str>, layout: &StorageLayout, local_origin: &str) -> BTreeMap<String, String> {
    let value: Value = match raw {
        Some(raw) => serde_json::from_str(raw).unwrap_or_else(|e| {
            debug!(error = %e, "Ignoring malformed tracks parameter");
            Value::Null
        }),
        None => Value::Null,
    };

    let Value::Object(entries) = value else {
        return BTreeMap::new();
    };

    entries
        .into_iter()
        .filter_map(|(name, url)| match url {
            Value::String(url) => Some((name, url)),
            _ => None,
        })
        .filter(|(_, url)| {
            let relative = if local_origin.is_empty() {
                url.as_str()
            } else {
                url.strip_prefix(local_origin).unwrap_or(url.as_str())
            };
            layout.resolve_public_url(relative).is_ok()
        })
        .collect()
}

/// Keep `video` only when it addresses the public root
pub fn parse_video(raw: Option<&str>, layout: &StorageLayout) -> Option<String> {
    let video = raw?.trim();
    if video.is_empty() || video == "undefined" {
        return None;
    }
    layout.resolve_public_url(video).ok()?;
    Some(video.to_string())
}

/// GET /results
pub async fn results_page(State(state): State<AppState>, Query(query): Query<ResultsQuery>) -> Html<String> {
    let tracks = parse_tracks(
        query.tracks.as_deref(),
        &state.layout,
        &state.config.local_origin,
    );
    let video = parse_video(query.video.as_deref(), &state.layout);

    Html(render_results(&tracks, video.as_deref()))
}

/// Render the results page for `tracks` and an optional video
pub fn render_results(tracks: &BTreeMap<String, String>, video: Option<&str>) -> String {
    let mut page = String::new();
    page.push_str(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Stemdeck - Results</title>
"#,
    );
    page.push_str(PAGE_STYLE);
    page.push_str("</head>\n<body>\n    <h1>Separated stems</h1>\n");

    match video {
        Some(url) => {
            let url = escape_html(url);
            page.push_str(&format!(
                "    <video id=\"mainVideo\" controls data-src=\"{url}\">\n        <source src=\"{url}\" type=\"video/mp4\">\n    </video>\n"
            ));
        }
        None => page.push_str("    <p class=\"empty\">No video for this job.</p>\n"),
    }

    page.push_str("    <div id=\"tracks\">\n");
    if tracks.is_empty() {
        page.push_str("        <p class=\"empty\">No stems available.</p>\n");
    }
    for (name, url) in tracks {
        let name = escape_html(name);
        let url = escape_html(url);
        page.push_str(&format!(
            r#"        <div class="track" data-track="{name}" data-src="{url}">
            <span class="track-name">{name}</span>
            <button class="mute-btn" type="button">Mute</button>
            <input class="volume-slider" type="range" min="0" max="1" step="0.01" value="1">
            <a href="{url}" download>Download</a>
        </div>
"#
        ));
    }
    page.push_str("    </div>\n");

    if video.is_some() && !tracks.is_empty() {
        page.push_str("    <p><button id=\"exportBtn\" type=\"button\">Export video</button></p>\n");
    }

    page.push_str(
        r#"    <p><a href="/">Process another file</a></p>
    <script src="/ui/editor.js"></script>
</body>
</html>
"#,
    );
    page
}
