//! Server base URLs.
//!
//! URLs are stored the way the user typed them; these helpers validate them
//! on the way in and build endpoint URLs without doubled or missing slashes
//! on the way out.

use reqwest::Url;

/// `base_url` without trailing slashes.
///
/// ```
/// use mcp_connector::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("http://localhost:11434//"), "http://localhost:11434");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_owned()
}

/// Join a server base URL and an endpoint path with exactly one slash.
///
/// ```
/// use mcp_connector::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("http://localhost:3000/", "v1/chat/completions"),
///     "http://localhost:3000/v1/chat/completions"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        normalize_base_url(base_url),
        endpoint.trim_start_matches('/')
    )
}

/// [`construct_api_url`] plus `segment` as one percent-encoded path segment.
///
/// ```
/// use mcp_connector::utils::url::construct_resource_url;
///
/// assert_eq!(
///     construct_resource_url("http://localhost:3000", "v1/models", "org/model").unwrap(),
///     "http://localhost:3000/v1/models/org%2Fmodel"
/// );
/// ```
pub fn construct_resource_url(
    base_url: &str,
    endpoint: &str,
    segment: &str,
) -> Result<String, String> {
    let mut url = Url::parse(&construct_api_url(base_url, endpoint))
        .map_err(|err| format!("Invalid server URL '{base_url}': {err}"))?;
    url.path_segments_mut()
        .map_err(|()| format!("Server URL '{base_url}' cannot take a path"))?
        .push(segment);
    Ok(url.to_string())
}

/// Check that a server URL is absolute, uses http(s) and names a host.
pub fn validate_base_url(raw: &str) -> Result<(), String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("URL must not be empty".to_string());
    }

    let parsed = Url::parse(trimmed).map_err(|err| format!("'{trimmed}' is not a valid URL ({err})"))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(format!(
                "URL must start with http:// or https:// (got '{other}://')"
            ))
        }
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(format!("'{trimmed}' has no host"));
    }

    Ok(())
}
