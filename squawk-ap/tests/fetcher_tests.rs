//! YtDlpFetcher tests against a stand-in fetch tool script
#![cfg(unix)]

use serial_test::serial;
use squawk_ap::fetcher::{Fetcher, YtDlpFetcher};
use squawk_ap::track::TrackId;
use squawk_ap::Error;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Mimics yt-dlp: prints title and duration for `--get-title`, otherwise
/// creates the output file and reports it the way the audio extractor does
const STUB_TOOL: &str = r#"#!/bin/sh
case "$1" in
  --get-title)
    echo "Stub Title"
    echo "3:05"
    exit 0 ;;
esac
case "$*" in
  *xxxxxxxxxxx*)
    echo "ERROR: Video unavailable" >&2
    exit 1 ;;
  *nnnnnnnnnnn*)
    echo "[download] nothing to do"
    exit 0 ;;
esac
out=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "-o" ]; then out="$arg"; fi
  prev="$arg"
done
path=$(printf '%s' "$out" | sed 's/%(ext)s/ogg/')
: > "$path"
echo "[download] Destination: $path.webm"
echo "[ExtractAudio] Destination: $path"
"#;

fn install_stub(dir: &TempDir) -> PathBuf {
    let tool = dir.path().join("fake-yt-dlp");
    std::fs::write(&tool, STUB_TOOL).unwrap();
    std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
    tool
}

fn fetcher_for(tool: &Path) -> YtDlpFetcher {
    YtDlpFetcher::new(
        tool.to_string_lossy().into_owned(),
        "vorbis",
        Duration::from_secs(600),
    )
}

#[tokio::test]
#[serial]
async fn test_fetch_reports_created_file() {
    let tools = TempDir::new().unwrap();
    let audio = TempDir::new().unwrap();
    let fetcher = fetcher_for(&install_stub(&tools));
    let id = TrackId::parse("dQw4w9WgXcQ").unwrap();

    let path = fetcher
        .fetch(&id, "dQw4w9WgXcQ.req1", audio.path())
        .await
        .unwrap();

    assert_eq!(path, audio.path().join("dQw4w9WgXcQ.req1.ogg"));
    assert!(path.exists());
}

#[tokio::test]
#[serial]
async fn test_describe_reads_title_and_duration() {
    let tools = TempDir::new().unwrap();
    let fetcher = fetcher_for(&install_stub(&tools));
    let id = TrackId::parse("dQw4w9WgXcQ").unwrap();

    let info = fetcher.describe(&id).await.unwrap();
    assert_eq!(info.title, "Stub Title");
    assert_eq!(info.duration, Some(Duration::from_secs(185)));
}

#[tokio::test]
#[serial]
async fn test_tool_failure_is_fetch_failed() {
    let tools = TempDir::new().unwrap();
    let audio = TempDir::new().unwrap();
    let fetcher = fetcher_for(&install_stub(&tools));
    let id = TrackId::parse("xxxxxxxxxxx").unwrap();

    let err = fetcher.fetch(&id, "xxxxxxxxxxx.req", audio.path()).await.unwrap_err();
    match err {
        Error::FetchFailed { id, reason } => {
            assert_eq!(id, "xxxxxxxxxxx");
            assert!(reason.contains("Video unavailable"), "{}", reason);
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
#[serial]
async fn test_unparseable_output_is_fetch_failed() {
    let tools = TempDir::new().unwrap();
    let audio = TempDir::new().unwrap();
    let fetcher = fetcher_for(&install_stub(&tools));
    let id = TrackId::parse("nnnnnnnnnnn").unwrap();

    let err = fetcher.fetch(&id, "nnnnnnnnnnn.req", audio.path()).await.unwrap_err();
    assert!(matches!(err, Error::FetchFailed { .. }));
}

#[tokio::test]
#[serial]
async fn test_missing_tool_is_fetch_failed() {
    let audio = TempDir::new().unwrap();
    let fetcher = YtDlpFetcher::new("/nonexistent/yt-dlp", "vorbis", Duration::ZERO);
    let id = TrackId::parse("dQw4w9WgXcQ").unwrap();

    let err = fetcher.fetch(&id, "dQw4w9WgXcQ.req", audio.path()).await.unwrap_err();
    assert!(matches!(err, Error::FetchFailed { .. }));
    assert!(matches!(
        fetcher.describe(&id).await,
        Err(Error::FetchFailed { .. })
    ));
}
