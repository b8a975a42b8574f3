//! FFmpeg media adapter
//!
//! Wraps the `ffmpeg` command-line tool for the four media operations the
//! service needs: stream copy, WAV extraction, per-track gain + mix, and
//! mux onto video. Argument lists are built by pure functions so the exact
//! command lines can be unit-tested without the tool installed.

use std::path::{Path, PathBuf};
use thiserror::Error;

use super::command::{self, CommandError, CommandSpec};

/// Sample rate of extracted waveforms
pub const WAV_SAMPLE_RATE: u32 = 44_100;

/// Channel count of extracted waveforms
pub const WAV_CHANNELS: u16 = 2;

/// Label of the final audio stream in the export filter graph
const MIX_OUTPUT_LABEL: &str = "aout";

/// Transcoder errors
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// FFmpeg could not be run
    #[error(transparent)]
    Command(#[from] CommandError),

    /// FFmpeg ran and failed
    #[error("ffmpeg exited with code {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },
}

impl TranscodeError {
    /// Full diagnostic text (stderr of the failed run, or the launch error)
    pub fn diagnostic(&self) -> String {
        match self {
            TranscodeError::Failed { stderr, .. } if !stderr.trim().is_empty() => {
                stderr.trim().to_string()
            }
            other => other.to_string(),
        }
    }

    /// First line of the diagnostic
    pub fn first_line(&self) -> String {
        let diagnostic = self.diagnostic();
        diagnostic
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("Unknown ffmpeg error")
            .to_string()
    }
}

/// One stem entering the export mix
#[derive(Debug, Clone, PartialEq)]
pub struct MixTrack {
    pub name: String,
    pub path: PathBuf,
    /// Linear gain multiplier (1.0 = unchanged)
    pub volume: f64,
}

/// FFmpeg adapter
#[derive(Debug, Clone)]
pub struct Transcoder {
    ffmpeg_path: String,
    audio_bitrate: String,
    normalize_single_track: bool,
}

impl Transcoder {
    pub fn new(
        ffmpeg_path: impl Into<String>,
        audio_bitrate: impl Into<String>,
        normalize_single_track: bool,
    ) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            audio_bitrate: audio_bitrate.into(),
            normalize_single_track,
        }
    }

    /// Copy all streams of `input` into `output` without re-encoding
    pub async fn copy_streams(&self, input: &Path, output: &Path) -> Result<(), TranscodeError> {
        self.run(copy_streams_args(input, output)).await
    }

    /// Extract the audio of `input` as 16-bit PCM, 2 channels, 44.1 kHz WAV
    pub async fn extract_wav(&self, input: &Path, output: &Path) -> Result<(), TranscodeError> {
        self.run(extract_wav_args(input, output)).await
    }

    /// Mix `tracks` (gain-adjusted) and mux the result onto the video stream
    /// of `video`
    ///
    /// The video stream is copied unchanged; audio is encoded to AAC with
    /// metadata placed up front for progressive playback.
    pub async fn mux_mix(
        &self,
        video: &Path,
        tracks: &[MixTrack],
        output: &Path,
    ) -> Result<(), TranscodeError> {
        let args = mux_mix_args(
            video,
            tracks,
            output,
            &self.audio_bitrate,
            self.normalize_single_track,
        );
        self.run(args).await
    }

    /// First line of `ffmpeg -version`, or `None` when FFmpeg is unavailable
    pub async fn version(&self) -> Option<String> {
        let spec = CommandSpec::new(&self.ffmpeg_path, vec!["-version".to_string()]);
        match command::run(&spec, None).await {
            Ok(output) if output.success() => output.stdout.lines().next().map(str::to_string),
            _ => None,
        }
    }

    async fn run(&self, args: Vec<String>) -> Result<(), TranscodeError> {
        let spec = CommandSpec::new(&self.ffmpeg_path, args);
        let output = command::run(&spec, None).await?;

        if !output.success() {
            tracing::error!(
                command = %spec,
                code = ?output.code,
                first_line = output.first_stderr_line().unwrap_or(""),
                "ffmpeg failed"
            );
            return Err(TranscodeError::Failed {
                code: output.code,
                stderr: output.stderr,
            });
        }

        Ok(())
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// `ffmpeg -y -i <input> -c:v copy -c:a copy <output>`
pub fn copy_streams_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-i".to_string(),
        path_arg(input),
        "-c:v".to_string(),
        "copy".to_string(),
        "-c:a".to_string(),
        "copy".to_string(),
        path_arg(output),
    ]
}

/// `ffmpeg -y -i <input> -vn -acodec pcm_s16le -ac 2 -ar 44100 <output>`
pub fn extract_wav_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-i".to_string(),
        path_arg(input),
        "-vn".to_string(),
        "-acodec".to_string(),
        "pcm_s16le".to_string(),
        "-ac".to_string(),
        WAV_CHANNELS.to_string(),
        "-ar".to_string(),
        WAV_SAMPLE_RATE.to_string(),
        path_arg(output),
    ]
}

/// Build the `-filter_complex` graph for `volumes.len()` audio inputs
///
/// Audio inputs start at FFmpeg input index 1 (index 0 is the video).
/// Every input gets a `volume` filter. Two or more inputs are combined with
/// `amix` and then loudness-normalized; a single input is used as-is unless
/// `normalize_single_track` is set.
pub fn build_mix_filter(volumes: &[f64], normalize_single_track: bool) -> String {
    let mut chains: Vec<String> = Vec::with_capacity(volumes.len() + 1);

    if volumes.len() == 1 {
        let chain = if normalize_single_track {
            format!("[1:a]volume={},loudnorm[{}]", volumes[0], MIX_OUTPUT_LABEL)
        } else {
            format!("[1:a]volume={}[{}]", volumes[0], MIX_OUTPUT_LABEL)
        };
        chains.push(chain);
        return chains.join(";");
    }

    let mut mix_inputs = String::new();
    for (index, volume) in volumes.iter().enumerate() {
        chains.push(format!("[{}:a]volume={}[a{}]", index + 1, volume, index));
        mix_inputs.push_str(&format!("[a{}]", index));
    }
    chains.push(format!(
        "{}amix=inputs={},loudnorm[{}]",
        mix_inputs,
        volumes.len(),
        MIX_OUTPUT_LABEL
    ));

    chains.join(";")
}

/// Full argument list of the export command
pub fn mux_mix_args(
    video: &Path,
    tracks: &[MixTrack],
    output: &Path,
    audio_bitrate: &str,
    normalize_single_track: bool,
) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-i".to_string(),
        path_arg(video),
    ];
    for track in tracks {
        args.push("-i".to_string());
        args.push(path_arg(&track.path));
    }

    let volumes: Vec<f64> = tracks.iter().map(|t| t.volume).collect();
    args.extend([
        "-filter_complex".to_string(),
        build_mix_filter(&volumes, normalize_single_track),
        "-map".to_string(),
        "0:v".to_string(),
        "-map".to_string(),
        format!("[{}]", MIX_OUTPUT_LABEL),
        "-c:v".to_string(),
        "copy".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        audio_bitrate.to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        path_arg(output),
    ]);
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(name: &str, volume: f64) -> MixTrack {
        MixTrack {
            name: name.to_string(),
            path: PathBuf::from(format!("/data/static/separated/{}.mp3", name)),
            volume,
        }
    }

    #[test]
    fn test_copy_streams_args() {
        let args = copy_streams_args(Path::new("/in/clip.mp4"), Path::new("/in/original_clip.mp4"));
        assert_eq!(
            args.join(" "),
            "-y -hide_banner -i /in/clip.mp4 -c:v copy -c:a copy /in/original_clip.mp4"
        );
    }

    #[test]
    fn test_extract_wav_args() {
        let args = extract_wav_args(Path::new("/in/clip.mp4"), Path::new("/in/clip.wav"));
        assert_eq!(
            args.join(" "),
            "-y -hide_banner -i /in/clip.mp4 -vn -acodec pcm_s16le -ac 2 -ar 44100 /in/clip.wav"
        );
    }

    #[test]
    fn test_single_track_filter_skips_mix() {
        let filter = build_mix_filter(&[0.5], false);
        assert_eq!(filter, "[1:a]volume=0.5[aout]");
        assert!(!filter.contains("amix"));
        assert!(!filter.contains("loudnorm"));
    }

    #[test]
    fn test_single_track_filter_optionally_normalized() {
        let filter = build_mix_filter(&[1.0], true);
        assert_eq!(filter, "[1:a]volume=1,loudnorm[aout]");
        assert!(!filter.contains("amix"));
    }

    #[test]
    fn test_multi_track_filter_mixes_then_normalizes() {
        let filter = build_mix_filter(&[1.0, 0.25], false);
        assert_eq!(
            filter,
            "[1:a]volume=1[a0];[2:a]volume=0.25[a1];[a0][a1]amix=inputs=2,loudnorm[aout]"
        );
        let amix = filter.find("amix").unwrap();
        let loudnorm = filter.find("loudnorm").unwrap();
        assert!(amix < loudnorm, "normalization must follow the mix");
    }

    #[test]
    fn test_mux_mix_args_layout() {
        let tracks = vec![track("no_vocals", 1.0), track("vocals", 0.0)];
        let args = mux_mix_args(
            Path::new("/data/static/uploads/original_clip.mp4"),
            &tracks,
            Path::new("/data/static/exports/export_1.mp4"),
            "192k",
            false,
        );

        // Video first, then one input per track in order
        let inputs: Vec<&String> = args
            .iter()
            .zip(args.iter().skip(1))
            .filter(|(flag, _)| *flag == "-i")
            .map(|(_, value)| value)
            .collect();
        assert_eq!(inputs.len(), 3);
        assert!(inputs[0].ends_with("original_clip.mp4"));
        assert!(inputs[1].ends_with("no_vocals.mp3"));
        assert!(inputs[2].ends_with("vocals.mp3"));

        let joined = args.join(" ");
        assert!(joined.contains("-map 0:v -map [aout]"));
        assert!(joined.contains("-c:v copy -c:a aac -b:a 192k"));
        assert!(joined.contains("-movflags +faststart"));
        assert_eq!(args.last().unwrap(), "/data/static/exports/export_1.mp4");
    }

    #[test]
    fn test_first_line_of_failure() {
        let error = TranscodeError::Failed {
            code: Some(1),
            stderr: "\nclip.mp4: Invalid data found when processing input\nConversion failed!\n"
                .to_string(),
        };
        assert_eq!(error.first_line(), "clip.mp4: Invalid data found when processing input");
        assert!(error.diagnostic().contains("Conversion failed!"));
    }

    #[test]
    fn test_first_line_of_empty_stderr() {
        let error = TranscodeError::Failed {
            code: Some(1),
            stderr: String::new(),
        };
        assert!(error.first_line().starts_with("ffmpeg exited with code"));
    }
}
