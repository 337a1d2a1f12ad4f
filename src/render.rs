use askama::Template;
use chrono::{TimeZone, Utc};

use crate::{
    api::HistoryEntry,
    view::{FormatsBrowser, HistoryView, Panel, PrimaryAction, ViewState},
};

/// The status panels, with every string worked out ahead of time since the
/// template can't do much more than print.
#[derive(Template)]
#[template(path = "status.html")]
struct StatusTemplate {
    hosted_banner: bool,
    submit_label: String,
    in_progress: bool,
    success: bool,
    error: bool,
    progress_width: String,
    status_text: String,
    percentage_text: String,
    speed: String,
    eta: String,
    filename: String,
    quality: String,
    success_title: String,
    success_quality: String,
    success_filename: String,
    action_label: String,
    /// Empty when the action is not a file link.
    download_id: String,
    error_message: String,
}

#[derive(Debug)]
struct HistoryRow {
    title: String,
    format: String,
    downloaded: String,
    download_id: String,
}

#[derive(Template)]
#[template(path = "history.html")]
struct HistoryTemplate {
    rows: Vec<HistoryRow>,
}

#[derive(Template)]
#[template(path = "formats.html")]
struct FormatsTemplate<'a> {
    browser: &'a FormatsBrowser,
}

impl From<&HistoryEntry> for HistoryRow {
    fn from(entry: &HistoryEntry) -> Self {
        HistoryRow {
            title: entry
                .title
                .clone()
                .unwrap_or_else(|| "Unknown Video".to_string()),
            format: entry.format.clone().unwrap_or_else(|| "Unknown".to_string()),
            downloaded: entry
                .timestamp
                .map(human_timestamp)
                .unwrap_or_else(|| "Unknown".to_string()),
            download_id: entry.download_id.to_string(),
        }
    }
}

pub fn render_status(view: &ViewState) -> Result<String, askama::Error> {
    let (success_title, success_quality, success_filename, action_label, download_id) =
        match &view.success {
            Some(success) => {
                let (label, download_id) = match &success.action {
                    PrimaryAction::Download { handle } => ("DOWNLOAD", handle.to_string()),
                    PrimaryAction::SeeFormats(_) => ("SEE FORMATS", String::new()),
                };
                (
                    success.title.clone(),
                    success.quality.clone(),
                    success.filename.clone(),
                    label.to_string(),
                    download_id,
                )
            }
            None => Default::default(),
        };
    let progress = &view.progress;
    StatusTemplate {
        hosted_banner: view.hosted_banner,
        submit_label: view.submit_label.clone(),
        in_progress: view.panel == Panel::InProgress,
        success: view.panel == Panel::Success,
        error: view.panel == Panel::Error,
        progress_width: progress.percentage_text.clone(),
        status_text: progress.status_text.clone(),
        percentage_text: progress.percentage_text.clone(),
        speed: progress.speed.clone(),
        eta: progress.eta.clone(),
        filename: progress.filename.clone(),
        quality: progress.quality.clone(),
        success_title,
        success_quality,
        success_filename,
        action_label,
        download_id,
        error_message: view.error_message.clone().unwrap_or_default(),
    }
    .render()
}

pub fn render_history(history: &HistoryView) -> Result<String, askama::Error> {
    let rows = match history {
        HistoryView::Entries(entries) => entries.iter().map(HistoryRow::from).collect(),
        HistoryView::Empty | HistoryView::Unloaded => Vec::new(),
    };
    HistoryTemplate { rows }.render()
}

pub fn render_formats(browser: &FormatsBrowser) -> Result<String, askama::Error> {
    FormatsTemplate { browser }.render()
}

pub fn human_timestamp(epoch_seconds: f64) -> String {
    Utc.timestamp_opt(epoch_seconds.floor() as i64, 0)
        .single()
        .map(|time| time.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

/// Binary units, with `suffix` tacked on (`"/s"` for rates).
pub fn human_size(value: f64, suffix: &str) -> String {
    let mut value = value.max(0.0);
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}{}", value.round() as u64, UNITS[0], suffix)
    } else {
        format!("{:.2} {}{}", value, UNITS[unit], suffix)
    }
}
