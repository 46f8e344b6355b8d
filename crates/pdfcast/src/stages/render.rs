//! Video assembly with ffmpeg: background footage, narration and burned-in
//! subtitles.

use std::path::{Path, PathBuf};
use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::RenderConfig;
use crate::error::StageError;
use crate::job::{ArtifactKind, ArtifactRef, Stage};
use crate::pipeline::JobContext;
use crate::sanitize::{redact_path, truncate_text};

use super::subtitles::{build_cues, to_srt, SubtitleTiming};
use super::StageExecutor;

const SUBTITLE_FILE: &str = "subtitles.srt";
const LOOPED_FILE: &str = "background_looped.mp4";
const MERGED_FILE: &str = "merged.mp4";
const STAGED_FILE: &str = "final.mp4";
const MAX_STDERR_CHARS: usize = 400;
const FALLBACK_CANVAS: &str = "color=c=black:s=1280x720:r=30";

/// Intermediate files of one render. They are removed when the guard drops,
/// including when the render future is cancelled by a stage timeout.
#[derive(Default)]
struct Scratch {
    paths: Vec<PathBuf>,
}

impl Scratch {
    fn track(&mut self, path: PathBuf) -> PathBuf {
        self.paths.push(path.clone());
        path
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        for path in &self.paths {
            if let Err(e) = std::fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(file = %redact_path(path), error = %e, "Failed to remove temporary file");
                }
            }
        }
    }
}

pub struct FfmpegRenderer {
    config: RenderConfig,
}

impl FfmpegRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    fn timing(&self) -> SubtitleTiming {
        SubtitleTiming::new(self.config.words_per_subtitle, self.config.seconds_per_word)
    }

    async fn run_tool(&self, program: &str, args: &[String]) -> Result<Output, StageError> {
        debug!(tool = program, "Running {} {}", program, args.join(" "));
        let output = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| StageError::Tool {
                tool: program.to_string(),
                message: format!("failed to start: {}", e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(StageError::Tool {
                tool: program.to_string(),
                message: format!(
                    "exited with {}: {}",
                    output.status,
                    truncate_text(&stderr, MAX_STDERR_CHARS)
                ),
            });
        }
        Ok(output)
    }

    async fn probe_duration(&self, media: &Path) -> Result<f64, StageError> {
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-show_entries".to_string(),
            "format=duration".to_string(),
            "-of".to_string(),
            "default=noprint_wrappers=1:nokey=1".to_string(),
            media.display().to_string(),
        ];
        let output = self.run_tool(&self.config.ffprobe, &args).await?;
        parse_duration(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| StageError::Tool {
            tool: self.config.ffprobe.clone(),
            message: format!("could not read duration of {}", redact_path(media)),
        })
    }

    /// Produces a video track at least as long as the narration, merged with
    /// the narration audio.
    async fn compose(
        &self,
        audio: &Path,
        audio_secs: f64,
        ctx: &JobContext,
        scratch: &mut Scratch,
    ) -> Result<PathBuf, StageError> {
        let merged = scratch.track(ctx.work_file(MERGED_FILE));

        let Some(background) = self.config.background_video.as_deref() else {
            let args = canvas_args(audio, audio_secs, &merged);
            self.run_tool(&self.config.ffmpeg, &args).await?;
            return Ok(merged);
        };

        let background = PathBuf::from(background);
        let video_secs = self.probe_duration(&background).await?;
        let loops = loop_count(audio_secs, video_secs);

        let source = if loops > 1 {
            let looped = scratch.track(ctx.work_file(LOOPED_FILE));
            self.run_tool(&self.config.ffmpeg, &loop_args(&background, loops, &looped))
                .await?;
            looped
        } else {
            background
        };

        debug!(loops, audio_secs, video_secs, "Merging narration with background");
        self.run_tool(&self.config.ffmpeg, &merge_args(&source, audio, &merged))
            .await?;
        Ok(merged)
    }
}

/// Parses ffprobe's bare `format=duration` output.
pub fn parse_duration(stdout: &str) -> Option<f64> {
    stdout
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs > 0.0)
}

/// How many times the background must play to cover the narration.
pub fn loop_count(audio_secs: f64, video_secs: f64) -> u32 {
    if video_secs <= 0.0 {
        return 1;
    }
    (audio_secs / video_secs).ceil().max(1.0) as u32
}

/// Escapes a path for use inside an ffmpeg filter argument.
pub fn escape_filter_path(path: &Path) -> String {
    path.display()
        .to_string()
        .replace('\\', "/")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

fn strings<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

fn loop_args(background: &Path, loops: u32, output: &Path) -> Vec<String> {
    let mut args = strings(["-y", "-stream_loop"]);
    args.push((loops - 1).to_string());
    args.push("-i".to_string());
    args.push(background.display().to_string());
    args.extend(strings(["-c", "copy"]));
    args.push(output.display().to_string());
    args
}

fn merge_args(video: &Path, audio: &Path, output: &Path) -> Vec<String> {
    let mut args = strings(["-y", "-i"]);
    args.push(video.display().to_string());
    args.push("-i".to_string());
    args.push(audio.display().to_string());
    args.extend(strings([
        "-filter_complex",
        "[0:a][1:a]amerge=inputs=2[aout]",
        "-map",
        "0:v",
        "-map",
        "[aout]",
        "-c:v",
        "copy",
        "-c:a",
        "aac",
        "-ac",
        "2",
        "-shortest",
    ]));
    args.push(output.display().to_string());
    args
}

fn canvas_args(audio: &Path, audio_secs: f64, output: &Path) -> Vec<String> {
    let mut args = strings(["-y", "-f", "lavfi", "-i"]);
    args.push(format!("{}:d={:.3}", FALLBACK_CANVAS, audio_secs));
    args.push("-i".to_string());
    args.push(audio.display().to_string());
    args.extend(strings([
        "-map", "0:v", "-map", "1:a", "-c:v", "libx264", "-pix_fmt", "yuv420p", "-c:a", "aac",
        "-ac", "2", "-shortest",
    ]));
    args.push(output.display().to_string());
    args
}

fn subtitle_args(video: &Path, srt: &Path, font_size: u32, output: &Path) -> Vec<String> {
    let mut args = strings(["-y", "-i"]);
    args.push(video.display().to_string());
    args.push("-vf".to_string());
    args.push(format!(
        "subtitles='{}':force_style='FontSize={},PrimaryColour=&HFFFFFF,OutlineColour=&H000000,\
         BorderStyle=1,Outline=1,BackColour=&H00000000,Alignment=10,MarginV=10,MarginL=0,MarginR=0'",
        escape_filter_path(srt),
        font_size
    ));
    args.extend(strings(["-c:a", "copy"]));
    args.push(output.display().to_string());
    args
}

#[async_trait]
impl StageExecutor for FfmpegRenderer {
    fn stage(&self) -> Stage {
        Stage::Render
    }

    async fn execute(&self, input: &ArtifactRef, ctx: &JobContext) -> Result<ArtifactRef, StageError> {
        let audio = input.path();
        let summary = ctx.artifact(ArtifactKind::Summary).ok_or_else(|| {
            StageError::InvalidInput("No summary available for subtitles".to_string())
        })?;
        let summary_path = summary.path();
        let narration = tokio::fs::read_to_string(&summary_path)
            .await
            .map_err(|e| StageError::ReadArtifact {
                path: summary_path.clone(),
                source: e,
            })?;

        let audio_secs = self.probe_duration(&audio).await?;

        // Everything is rendered inside the work directory. The public video
        // path only ever receives a finished file, by rename.
        let mut scratch = Scratch::default();
        let merged = self.compose(&audio, audio_secs, ctx, &mut scratch).await?;

        let cues = build_cues(&narration, self.timing());
        let finished = if cues.is_empty() {
            merged
        } else {
            let srt = scratch.track(ctx.work_file(SUBTITLE_FILE));
            tokio::fs::write(&srt, to_srt(&cues))
                .await
                .map_err(|e| StageError::WriteArtifact {
                    path: srt.clone(),
                    source: e,
                })?;

            let staged = scratch.track(ctx.work_file(STAGED_FILE));
            let args = subtitle_args(&merged, &srt, self.config.font_size, &staged);
            self.run_tool(&self.config.ffmpeg, &args).await?;
            staged
        };

        tokio::fs::rename(&finished, &ctx.video_path)
            .await
            .map_err(|e| StageError::WriteArtifact {
                path: ctx.video_path.clone(),
                source: e,
            })?;
        drop(scratch);

        info!(
            video = %redact_path(&ctx.video_path),
            duration_secs = audio_secs,
            "Rendered video"
        );
        Ok(ArtifactRef::from_path(ArtifactKind::Video, &ctx.video_path))
    }
}
