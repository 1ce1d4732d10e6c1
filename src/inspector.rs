//! Video metadata and downloads through an external yt-dlp process.
//!
//! Both operations report failures as values: the route layer always gets
//! an outcome with `success = false` and a readable message, never an error.
//! The child process inherits no timeout, so a hung yt-dlp hangs the request.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    process::{Command, ExitStatus, Output},
    time::SystemTime,
};

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::CatalogConfig;

const DESCRIPTION_LIMIT: usize = 1000;
const NO_TEXT_PLACEHOLDER: &str = "No title or description found.";
// Combined mp4 first, then an mp4+m4a merge, then whatever is best.
const FORMAT_SELECTOR: &str = "best[ext=mp4]/bestvideo[ext=mp4]+bestaudio[ext=m4a]/best";

/// Result of a metadata lookup, serialized as the API response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetadataOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub social_text: Option<String>,
    pub message: String,
}

impl MetadataOutcome {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            duration: None,
            social_text: None,
            message: message.into(),
        }
    }
}

/// Result of a download attempt, serialized as the API response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadOutcome {
    pub success: bool,
    pub message: String,
    pub drive_path: String,
}

impl DownloadOutcome {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            drive_path: String::new(),
        }
    }
}

/// Capability to inspect and fetch social-media videos.
pub trait VideoInspector: Send + Sync {
    fn fetch_metadata(&self, url: &str) -> MetadataOutcome;
    fn download(&self, url: &str, item_id: i64) -> DownloadOutcome;
}

/// How a metadata outcome fares against the duration cap.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataVerdict {
    Accepted(MetadataOutcome),
    /// The tool succeeded but the video is longer than allowed; the outcome
    /// already carries `success = false` and the explanation.
    TooLong(MetadataOutcome),
    Failed(MetadataOutcome),
}

pub fn enforce_duration_limit(outcome: MetadataOutcome, max_secs: f64) -> MetadataVerdict {
    if !outcome.success {
        return MetadataVerdict::Failed(outcome);
    }
    match outcome.duration {
        Some(duration) if duration > max_secs => MetadataVerdict::TooLong(MetadataOutcome {
            success: false,
            message: format!(
                "Video duration ({duration:.1}s) exceeds limit ({max_secs:.0}s). Download aborted."
            ),
            ..outcome
        }),
        _ => MetadataVerdict::Accepted(outcome),
    }
}

#[derive(Debug, Deserialize)]
struct VideoInfo {
    duration: Option<f64>,
    title: Option<String>,
    description: Option<String>,
}

/// [`VideoInspector`] backed by the yt-dlp command-line tool, reusing the
/// session cookies of a locally installed browser.
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
    cookie_browser: String,
    download_dir: PathBuf,
}

impl YtDlp {
    pub fn new(
        program: impl Into<PathBuf>,
        cookie_browser: impl Into<String>,
        download_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            program: program.into(),
            cookie_browser: cookie_browser.into(),
            download_dir: download_dir.into(),
        }
    }

    pub fn from_config(config: &CatalogConfig) -> Self {
        Self::new(
            &config.yt_dlp_program,
            &config.cookie_browser,
            &config.download_dir,
        )
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("--ignore-config")
            .arg("--no-warnings")
            .arg("--cookies-from-browser")
            .arg(&self.cookie_browser);
        command
    }

    fn run(&self, mut command: Command, purpose: &str) -> Result<Output, String> {
        command.output().map_err(|err| {
            let message = if err.kind() == ErrorKind::NotFound {
                format!(
                    "Error: '{}' could not be started. Is yt-dlp installed?",
                    self.program.display()
                )
            } else {
                format!("An unexpected error occurred during {purpose}: {err}")
            };
            error!("{message}");
            message
        })
    }

    fn cookie_hint(&self, stderr: &str) -> String {
        if stderr.to_lowercase().contains("authentication") {
            format!(
                " (Tried using cookies from {}. Ensure you're logged in there and yt-dlp has access.)",
                self.cookie_browser
            )
        } else {
            String::new()
        }
    }
}

impl VideoInspector for YtDlp {
    fn fetch_metadata(&self, url: &str) -> MetadataOutcome {
        let mut command = self.command();
        command.arg("--dump-json").arg("--").arg(url);
        info!(
            "Fetching metadata for {url} (cookies from {})",
            self.cookie_browser
        );

        let output = match self.run(command, "metadata fetch") {
            Ok(output) => output,
            Err(message) => return MetadataOutcome::failure(message),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = format!(
                "yt-dlp metadata fetch failed ({}). Error: {}{}",
                describe_status(output.status),
                stderr_or_unknown(&stderr),
                self.cookie_hint(&stderr)
            );
            error!("{message}");
            return MetadataOutcome::failure(message);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let first_line = stdout.trim().lines().next().unwrap_or_default();
        let info: VideoInfo = match serde_json::from_str(first_line) {
            Ok(info) => info,
            Err(err) => {
                let preview: String = stdout.chars().take(500).collect();
                let message =
                    format!("Failed to parse yt-dlp JSON output: {err}. Output: {preview}");
                error!("{message}");
                return MetadataOutcome::failure(message);
            }
        };

        MetadataOutcome {
            success: true,
            duration: Some(info.duration.unwrap_or(0.0)),
            social_text: Some(summarize(
                info.title.as_deref(),
                info.description.as_deref(),
            )),
            message: "Metadata fetched successfully.".to_string(),
        }
    }

    fn download(&self, url: &str, item_id: i64) -> DownloadOutcome {
        if let Err(err) = fs::create_dir_all(&self.download_dir) {
            error!(
                "Could not create download directory '{}': {err}",
                self.download_dir.display()
            );
            return DownloadOutcome::failure(format!("Error creating download directory: {err}"));
        }

        let template = self
            .download_dir
            .join(format!("video_{item_id}.%(ext)s"));
        let mut command = self.command();
        command
            .arg("-f")
            .arg(FORMAT_SELECTOR)
            .arg("--merge-output-format")
            .arg("mp4")
            .arg("--force-keyframes-at-cuts")
            .arg("-o")
            .arg(&template)
            .arg("--")
            .arg(url);
        info!(
            "Downloading {url} for ID {item_id} (cookies from {})",
            self.cookie_browser
        );

        let output = match self.run(command, "download") {
            Ok(output) => output,
            Err(message) => return DownloadOutcome::failure(message),
        };

        let message = if output.status.success() {
            if let Some(path) = find_final_file(&self.download_dir, item_id) {
                let file_name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let drive_path = std::path::absolute(&path).unwrap_or(path);
                info!("Download success (ID: {item_id}): {}", drive_path.display());
                return DownloadOutcome {
                    success: true,
                    message: format!("Download successful ({file_name})."),
                    drive_path: drive_path.to_string_lossy().into_owned(),
                };
            }
            let message = format!(
                "Download process finished (Code: 0) but no final output file found for ID {item_id}."
            );
            warn!("{message}");
            message
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = format!(
                "Download failed ({}). Error: {}{}",
                describe_status(output.status),
                stderr_or_unknown(&stderr),
                self.cookie_hint(&stderr)
            );
            error!("Download failed (ID: {item_id}): {message}");
            message
        };

        let removed = remove_artifacts(&self.download_dir, item_id);
        if removed > 0 {
            info!("Removed {removed} leftover file(s) for ID {item_id}");
        }
        DownloadOutcome::failure(message.trim())
    }
}

/// Builds the text stored alongside a record from the video's title and
/// description.
pub fn summarize(title: Option<&str>, description: Option<&str>) -> String {
    let mut parts = Vec::new();
    if let Some(title) = title.filter(|title| !title.is_empty()) {
        parts.push(format!("Title: {title}"));
    }
    if let Some(description) = description.filter(|description| !description.is_empty()) {
        let mut truncated: String = description.chars().take(DESCRIPTION_LIMIT).collect();
        if description.chars().count() > DESCRIPTION_LIMIT {
            truncated.push_str("...");
        }
        parts.push(format!("Description: {truncated}"));
    }
    if parts.is_empty() {
        NO_TEXT_PLACEHOLDER.to_string()
    } else {
        parts.join("\n\n").trim().to_string()
    }
}

/// True for `video_<id>.<ext>` with a single extension. yt-dlp leaves
/// `.part`/`.ytdl` files and per-format intermediates such as
/// `video_7.f137.mp4` while it works; none of those are a finished download.
fn is_final_artifact(name: &str, item_id: i64) -> bool {
    let prefix = format!("video_{item_id}.");
    let Some(ext) = name.strip_prefix(&prefix) else {
        return false;
    };
    !ext.is_empty() && !ext.contains('.') && !matches!(ext, "part" | "ytdl" | "temp")
}

fn find_final_file(dir: &Path, item_id: i64) -> Option<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!("Scanning download directory '{}' failed: {err}", dir.display());
            return None;
        }
    };
    // Ids are positional, so an older `video_<id>.*` from a previous
    // occupant of this id may still sit next to the fresh download.
    entries
        .flatten()
        .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_file()))
        .filter(|entry| is_final_artifact(&entry.file_name().to_string_lossy(), item_id))
        .map(|entry| {
            let modified = entry
                .metadata()
                .and_then(|metadata| metadata.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, entry.path())
        })
        .max()
        .map(|(_, path)| path)
}

/// Deletes every `video_<id>.*` file and returns how many went away.
fn remove_artifacts(dir: &Path, item_id: i64) -> usize {
    let prefix = format!("video_{item_id}.");
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    let mut removed = 0;
    for entry in entries.flatten() {
        if !entry.file_name().to_string_lossy().starts_with(&prefix) {
            continue;
        }
        if !entry.file_type().is_ok_and(|kind| kind.is_file()) {
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(err) => warn!("Could not remove {}: {err}", entry.path().display()),
        }
    }
    removed
}

fn describe_status(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("Code: {code}"),
        None => "terminated by signal".to_string(),
    }
}

fn stderr_or_unknown(stderr: &str) -> &str {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        "Unknown yt-dlp error"
    } else {
        trimmed
    }
}
