//! The page as data. Every change the controller makes to what the user sees
//! goes through [`ViewState`], and only one status panel can be shown at a
//! time because the visible panel is a single enum value.

use crate::{
    api::{DownloadHandle, FormatEntry, HistoryEntry, ProgressSnapshot, Reading, VideoMetadata},
    render::human_size,
};

pub const DOWNLOAD_LABEL: &str = "DOWNLOAD";
pub const INFO_LABEL: &str = "GET VIDEO INFO";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Panel {
    /// Nothing submitted yet, only the form is showing.
    #[default]
    Idle,
    InProgress,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressFields {
    /// Progress bar width, 0-100.
    pub percentage: f64,
    pub percentage_text: String,
    pub status_text: String,
    pub speed: String,
    pub eta: String,
    pub filename: String,
    pub quality: String,
}

impl Default for ProgressFields {
    fn default() -> Self {
        ProgressFields {
            percentage: 0.0,
            percentage_text: "0%".to_string(),
            status_text: "0%".to_string(),
            speed: "Speed: 0 KB/s".to_string(),
            eta: "ETA: --:--".to_string(),
            filename: "Filename: --".to_string(),
            quality: "Quality: --".to_string(),
        }
    }
}

/// What the success panel's main button does.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimaryAction {
    /// A direct link to the finished file.
    Download { handle: DownloadHandle },
    /// Hosted deployments can only describe the video.
    SeeFormats(FormatsBrowser),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SuccessFields {
    pub title: String,
    pub quality: String,
    pub filename: String,
    pub action: PrimaryAction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormatRow {
    pub label: String,
    pub resolution: String,
    pub command: String,
}

impl FormatRow {
    fn new(format: &FormatEntry, url: &str) -> Self {
        let resolution = match (format.width, format.height) {
            (Some(width), Some(height)) => format!("{}x{}", width, height),
            (None, Some(height)) => format!("?x{}", height),
            _ => "Audio only".to_string(),
        };
        FormatRow {
            label: format
                .format
                .clone()
                .filter(|label| !label.is_empty())
                .unwrap_or_else(|| format.format_id.clone()),
            resolution,
            command: format!("yt-dlp -f {} \"{}\"", format.format_id, url),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormatsBrowser {
    pub title: String,
    pub duration: String,
    pub command: String,
    /// Only formats with a picture.
    pub rows: Vec<FormatRow>,
}

impl From<&VideoMetadata> for FormatsBrowser {
    fn from(info: &VideoMetadata) -> Self {
        FormatsBrowser {
            title: info.title.clone().unwrap_or_else(|| "Video".to_string()),
            duration: format_duration(info.duration),
            command: format!("yt-dlp \"{}\"", info.url),
            rows: info
                .formats
                .iter()
                .filter(|format| format.is_video())
                .map(|format| FormatRow::new(format, &info.url))
                .collect(),
        }
    }
}

/// `M:SS`, or "Unknown" for a missing or zero duration.
pub fn format_duration(seconds: Option<f64>) -> String {
    match seconds {
        Some(seconds) if seconds > 0.0 => clock(seconds),
        _ => "Unknown".to_string(),
    }
}

fn clock(seconds: f64) -> String {
    let seconds = seconds.max(0.0).floor() as u64;
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Raw speeds are bytes per second.
fn speed_text(reading: &Reading) -> Option<String> {
    match reading {
        Reading::Text(text) if text.is_empty() => None,
        Reading::Text(text) => Some(text.clone()),
        Reading::Number(bytes) => Some(human_size(*bytes, "/s")),
    }
}

/// Raw estimates are seconds left.
fn eta_text(reading: &Reading) -> Option<String> {
    match reading {
        Reading::Text(text) if text.is_empty() => None,
        Reading::Text(text) => Some(text.clone()),
        Reading::Number(seconds) => Some(clock(*seconds)),
    }
}

/// Whole percentages print without a fraction, like "42%".
pub fn format_percentage(percentage: f64) -> String {
    if percentage.fract() == 0.0 {
        format!("{}%", percentage as i64)
    } else {
        format!("{}%", percentage)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum HistoryView {
    /// Not loaded yet.
    #[default]
    Unloaded,
    Empty,
    Entries(Vec<HistoryEntry>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub hosted_banner: bool,
    pub submit_label: String,
    pub panel: Panel,
    pub progress: ProgressFields,
    pub success: Option<SuccessFields>,
    pub error_message: Option<String>,
    pub history: HistoryView,
}

impl Default for ViewState {
    fn default() -> Self {
        ViewState {
            hosted_banner: false,
            submit_label: DOWNLOAD_LABEL.to_string(),
            panel: Panel::Idle,
            progress: ProgressFields::default(),
            success: None,
            error_message: None,
            history: HistoryView::Unloaded,
        }
    }
}

impl ViewState {
    pub fn set_hosted(&mut self, hosted: bool) {
        self.hosted_banner = hosted;
        self.submit_label = if hosted { INFO_LABEL } else { DOWNLOAD_LABEL }.to_string();
    }

    /// Hide every panel and blank the progress fields.
    pub fn reset(&mut self) {
        self.panel = Panel::Idle;
        self.progress = ProgressFields::default();
        self.success = None;
        self.error_message = None;
    }

    pub fn show_in_progress(&mut self, status_text: Option<&str>) {
        self.panel = Panel::InProgress;
        if let Some(status_text) = status_text {
            self.progress.status_text = status_text.to_string();
        }
    }

    pub fn show_error(&mut self, message: impl Into<String>) {
        self.panel = Panel::Error;
        self.error_message = Some(message.into());
    }

    pub fn show_success(&mut self, success: SuccessFields) {
        self.panel = Panel::Success;
        self.success = Some(success);
    }

    /// The backend accepted a download, and we are about to poll it.
    pub fn show_started(&mut self, filename: Option<&str>, format: &str) {
        self.progress.filename = format!("Filename: {}", filename.unwrap_or("Preparing..."));
        self.progress.quality = format!("Quality: {}", format);
    }

    /// Copy a snapshot into the progress fields. Missing optional fields keep
    /// their previous values, but a missing percentage means 0.
    pub fn apply_progress(&mut self, snapshot: &ProgressSnapshot) {
        let percentage = snapshot.percentage.unwrap_or(0.0).clamp(0.0, 100.0);
        self.progress.percentage = percentage;
        self.progress.percentage_text = format_percentage(percentage);
        self.progress.status_text = snapshot
            .status
            .clone()
            .filter(|status| !status.is_empty())
            .unwrap_or_else(|| "Downloading...".to_string());
        if let Some(speed) = snapshot.speed.as_ref().and_then(speed_text) {
            self.progress.speed = format!("Speed: {}", speed);
        }
        if let Some(eta) = snapshot.eta.as_ref().and_then(eta_text) {
            self.progress.eta = format!("ETA: {}", eta);
        }
        if let Some(filename) = non_empty(&snapshot.filename) {
            self.progress.filename = format!("Filename: {}", filename);
        }
    }

    pub fn show_complete(&mut self, handle: &DownloadHandle, snapshot: &ProgressSnapshot) {
        self.show_success(SuccessFields {
            title: or_default(&snapshot.title, "Video"),
            quality: or_default(&snapshot.format, "Unknown"),
            filename: or_default(&snapshot.filename, "Unknown"),
            action: PrimaryAction::Download {
                handle: handle.clone(),
            },
        });
    }

    pub fn show_metadata(&mut self, info: &VideoMetadata, requested_format: &str) {
        let title = info.title.clone().unwrap_or_else(|| "Video".to_string());
        let quality = if requested_format.is_empty() {
            "Unknown".to_string()
        } else {
            requested_format.to_string()
        };
        self.show_success(SuccessFields {
            filename: format!("{}.mp4", title),
            title,
            quality,
            action: PrimaryAction::SeeFormats(FormatsBrowser::from(info)),
        });
    }

    /// Replace the history list wholesale.
    pub fn set_history(&mut self, downloads: Vec<HistoryEntry>) {
        self.history = if downloads.is_empty() {
            HistoryView::Empty
        } else {
            HistoryView::Entries(downloads)
        };
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

fn or_default(value: &Option<String>, default: &str) -> String {
    non_empty(value).unwrap_or(default).to_string()
}
