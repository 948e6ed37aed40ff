//! External fetch tool adapter
//!
//! [`YtDlpFetcher`] shells out to `yt-dlp` (or anything flag-compatible, such
//! as `youtube-dl`) and recovers the produced file path from its output.

use crate::error::{Error, Result};
use crate::track::TrackId;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Output line markers for the post-processing step that names the final file
const OUTPUT_MARKERS: [&str; 2] = ["[ffmpeg]", "[ExtractAudio]"];

/// Metadata looked up before fetching
#[derive(Debug, Clone, PartialEq)]
pub struct TrackInfo {
    pub title: String,
    pub duration: Option<Duration>,
}

/// Fetches audio for a track id into a directory
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Look up title and duration for `id`
    async fn describe(&self, id: &TrackId) -> Result<TrackInfo>;

    /// Fetch audio for `id` into `dir`, naming the file `<stem>.<ext>`.
    /// Returns the path of the produced file.
    async fn fetch(&self, id: &TrackId, stem: &str, dir: &Path) -> Result<PathBuf>;
}

/// `yt-dlp` / `youtube-dl` subprocess fetcher
#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    tool: String,
    audio_format: String,
    max_length: Duration,
}

impl YtDlpFetcher {
    pub fn new(
        tool: impl Into<String>,
        audio_format: impl Into<String>,
        max_length: Duration,
    ) -> Self {
        Self {
            tool: tool.into(),
            audio_format: audio_format.into(),
            max_length,
        }
    }

    fn failed(id: &TrackId, reason: impl Into<String>) -> Error {
        Error::FetchFailed {
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    async fn run(&self, id: &TrackId, cmd: &mut Command) -> Result<String> {
        let output = cmd
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Self::failed(id, format!("failed to run {}: {}", self.tool, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr.lines().last().unwrap_or("").trim();
            return Err(Self::failed(
                id,
                format!("{} exited with {}: {}", self.tool, output.status, detail),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Fetcher for YtDlpFetcher {
    async fn describe(&self, id: &TrackId) -> Result<TrackInfo> {
        let mut cmd = Command::new(&self.tool);
        cmd.args(["--get-title", "--get-duration", "--", id.as_str()]);
        let stdout = self.run(id, &mut cmd).await?;
        parse_track_info(&stdout).ok_or_else(|| Self::failed(id, "empty title output"))
    }

    async fn fetch(&self, id: &TrackId, stem: &str, dir: &Path) -> Result<PathBuf> {
        let template = dir.join(format!("{}.%(ext)s", stem));

        let mut cmd = Command::new(&self.tool);
        cmd.arg("-x")
            .arg("--audio-format")
            .arg(&self.audio_format)
            .arg("-o")
            .arg(&template)
            .arg("--prefer-ffmpeg")
            .arg("--postprocessor-args")
            .arg("-ar 48000");
        if !self.max_length.is_zero() {
            cmd.arg("--match-filter")
                .arg(format!("duration <= {}", self.max_length.as_secs()));
        }
        cmd.arg("--").arg(id.as_str());

        debug!("Running {} for {}", self.tool, id);
        let stdout = self.run(id, &mut cmd).await?;

        let path = parse_output_path(&stdout, dir).ok_or_else(|| {
            Self::failed(id, "unable to determine file path from fetch tool output")
        })?;

        if tokio::fs::metadata(&path).await.is_err() {
            return Err(Self::failed(
                id,
                format!("reported file {} does not exist", path.display()),
            ));
        }

        Ok(path)
    }
}

/// Find the final audio path in fetch tool output
///
/// Looks at post-processing lines (`[ffmpeg]` / `[ExtractAudio]`) and takes
/// the text starting at the storage directory up to a closing quote, `;`, or
/// end of line. The last such line wins.
pub fn parse_output_path(output: &str, dir: &Path) -> Option<PathBuf> {
    let dir_str = dir.to_string_lossy();
    output
        .lines()
        .filter(|line| OUTPUT_MARKERS.iter().any(|m| line.contains(m)))
        .filter_map(|line| {
            let start = line.find(dir_str.as_ref())?;
            let rest = &line[start..];
            let end = rest.find(['"', ';']).unwrap_or(rest.len());
            let path = rest[..end].trim_end();
            (!path.is_empty()).then(|| PathBuf::from(path))
        })
        .last()
}

/// Parse `--get-title --get-duration` output: title line, then an optional
/// `[[h:]m:]s` duration line
pub fn parse_track_info(output: &str) -> Option<TrackInfo> {
    let mut lines = output.lines().map(str::trim).filter(|l| !l.is_empty());
    let title = lines.next()?.to_string();
    let duration = lines.last().and_then(parse_clock);
    Some(TrackInfo { title, duration })
}

/// Parse `s`, `m:ss`, or `h:mm:ss`
pub fn parse_clock(text: &str) -> Option<Duration> {
    let mut total: u64 = 0;
    let mut fields = 0;
    for part in text.split(':') {
        let value: u64 = part.trim().parse().ok()?;
        total = total.checked_mul(60)?.checked_add(value)?;
        fields += 1;
    }
    (fields <= 3).then(|| Duration::from_secs(total))
}
