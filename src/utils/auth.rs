//! Authentication utilities for upstream requests

/// Add the bearer `Authorization` header when the server has an API key.
///
/// Servers without a key (typically local ones) get no header at all rather
/// than an empty bearer token, which some servers reject.
pub fn add_auth_headers(
    request: reqwest::RequestBuilder,
    api_key: Option<&str>,
) -> reqwest::RequestBuilder {
    match api_key.map(str::trim).filter(|key| !key.is_empty()) {
        Some(key) => request.header("Authorization", format!("Bearer {key}")),
        None => request,
    }
}

/// Fixed-length redaction shown wherever an API key would be echoed.
pub const MASKED_SECRET: &str = "********";

/// Render an optional secret for display: masked when set, "Not set" otherwise.
pub fn describe_secret(secret: Option<&str>) -> String {
    match secret.filter(|value| !value.is_empty()) {
        Some(_) => format!("Configured ({MASKED_SECRET})"),
        None => "Not set".to_string(),
    }
}
