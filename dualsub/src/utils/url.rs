//! URL helpers.

use url::Url;

use crate::{Error, Result};

/// Validate a user-supplied video URL.
///
/// Accepts only absolute http(s) URLs with a host.
pub fn validate_remote_url(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Error::validation("URL is required"));
    }

    let url = Url::parse(raw).map_err(|e| Error::validation(format!("Invalid URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::validation(format!(
            "Unsupported URL scheme: {}",
            url.scheme()
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(Error::validation("URL has no host"));
    }

    Ok(url)
}
