//! Audio extraction via an external ffmpeg process.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::{FfmpegEvent, LogLevel};
use formvideo_core::{AudioExtractor, StageError};
use tokio::task;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// ffmpeg messages that mean the input itself is unusable.
const UNUSABLE_INPUT_MARKERS: [&str; 4] = [
    "Invalid data found when processing input",
    "does not contain any stream",
    "Output file #0 does not contain any stream",
    "moov atom not found",
];

/// Writes a mono 16 kHz MP3 of the input's audio track under
/// `<media_root>/audio/extracted/`.
#[derive(Debug, Clone)]
pub struct FfmpegAudioExtractor {
    media_root: PathBuf,
}

impl FfmpegAudioExtractor {
    pub fn new(media_root: impl Into<PathBuf>) -> Self {
        Self {
            media_root: media_root.into(),
        }
    }
}

/// `audio/extracted/<stem>_<uuid>.mp3`, relative to the media root.
fn audio_output_ref(media_ref: &str) -> String {
    let stem = Path::new(media_ref)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("audio");
    format!("audio/extracted/{stem}_{}.mp3", Uuid::new_v4().simple())
}

/// Raises its flag when dropped, i.e. when the awaiting stage future is
/// cancelled by the stage timeout.
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

fn run_ffmpeg(input: &Path, output: &Path, cancelled: &AtomicBool) -> Result<(), StageError> {
    if cancelled.load(Ordering::SeqCst) {
        return Err(StageError::transient("audio extraction cancelled"));
    }
    let mut child = FfmpegCommand::new()
        .hide_banner()
        .overwrite()
        .input(&*input.to_string_lossy())
        .args(["-vn", "-acodec", "libmp3lame", "-ac", "1", "-ar", "16000"])
        .output(&*output.to_string_lossy())
        .spawn()
        .map_err(|e| StageError::transient(format!("failed to start ffmpeg: {e}")))?;

    let mut errors: Vec<String> = Vec::new();
    let events = child
        .iter()
        .map_err(|e| StageError::transient(format!("failed to read ffmpeg output: {e}")))?;
    for event in events {
        if cancelled.load(Ordering::SeqCst) {
            if let Err(e) = child.kill() {
                warn!(error = %e, "failed to kill cancelled ffmpeg");
            }
            let _ = child.wait();
            let _ = std::fs::remove_file(output);
            return Err(StageError::transient("audio extraction cancelled"));
        }
        match event {
            FfmpegEvent::Log(LogLevel::Error | LogLevel::Fatal, msg) => errors.push(msg),
            FfmpegEvent::Error(e) => errors.push(e),
            FfmpegEvent::Log(level, msg) => debug!("[FFmpeg {:?}] {}", level, msg),
            FfmpegEvent::Done => debug!(output = %output.display(), "ffmpeg finished"),
            _ => {}
        }
    }

    let status = child
        .wait()
        .map_err(|e| StageError::transient(format!("ffmpeg did not exit cleanly: {e}")))?;
    if status.success() {
        return Ok(());
    }

    let detail = errors.join("; ");
    if UNUSABLE_INPUT_MARKERS.iter().any(|m| detail.contains(m)) {
        Err(StageError::permanent(format!("media has no usable audio: {detail}")))
    } else {
        Err(StageError::transient(format!("ffmpeg exited with {status}: {detail}")))
    }
}

#[async_trait]
impl AudioExtractor for FfmpegAudioExtractor {
    async fn extract_audio(&self, media_ref: &str) -> Result<String, StageError> {
        let input = self.media_root.join(media_ref);
        if !tokio::fs::try_exists(&input).await.unwrap_or(false) {
            return Err(StageError::permanent(format!("media file not found: {media_ref}")));
        }

        let audio_ref = audio_output_ref(media_ref);
        let output = self.media_root.join(&audio_ref);
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StageError::transient(format!("failed to create audio directory: {e}")))?;
        }

        let cancelled = Arc::new(AtomicBool::new(false));
        let _guard = CancelOnDrop(Arc::clone(&cancelled));
        let out = output.clone();
        task::spawn_blocking(move || run_ffmpeg(&input, &out, &cancelled))
            .await
            .map_err(|e| StageError::transient(format!("ffmpeg task panicked: {e}")))??;

        let size = tokio::fs::metadata(&output).await.map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            return Err(StageError::permanent("ffmpeg produced an empty audio file"));
        }
        info!(media_ref, audio_ref = %audio_ref, size_bytes = size, "audio extracted");
        Ok(audio_ref)
    }
}
