use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ClientError;

lazy_static! {
    // Optional scheme, optional www., a known host, then at least one more character.
    static ref VIDEO_URL: Regex =
        Regex::new(r#"^(https?://)?(www\.)?(youtube\.com|youtu\.be)/.+"#).unwrap();
}

pub fn is_valid_video_url(url: &str) -> bool {
    VIDEO_URL.is_match(url)
}

/// Trim the raw input and check it looks like a video link. Returns the
/// trimmed URL.
pub fn validate_url(raw: &str) -> Result<String, ClientError> {
    let url = raw.trim();
    if url.is_empty() {
        return Err(ClientError::EmptyUrl);
    }
    if !is_valid_video_url(url) {
        return Err(ClientError::InvalidUrl);
    }
    Ok(url.to_string())
}
