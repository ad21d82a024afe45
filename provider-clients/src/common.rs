//! Shared HTTP response/error mapping for the provider adapters.

use manga_types::errors::MangaError;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: ProviderErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorDetail {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

/// Maps a non-2xx provider response onto the shared error taxonomy.
///
/// Providers are expected to report permanent rejections via a
/// `{"error":{"type":"content_filtered"|"model_not_found"|"invalid_prompt","message":"..."}}`
/// body; anything else (429, 5xx, an unparseable body) is treated as
/// transient so the caller's retry policy applies.
pub async fn map_error_response(response: reqwest::Response) -> MangaError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if let Ok(parsed) = serde_json::from_str::<ProviderErrorBody>(&body) {
        return match parsed.error.kind.as_str() {
            "content_filtered" => MangaError::ContentFiltered(parsed.error.message),
            "model_not_found" => MangaError::ModelNotFound(parsed.error.message),
            "invalid_prompt" => MangaError::InvalidPrompt(parsed.error.message),
            _ => MangaError::Transient(format!("provider error ({status}): {}", parsed.error.message)),
        };
    }

    MangaError::Transient(format!("provider request failed with status {status}: {body}"))
}

/// Maps a transport-level failure (timeout, connect refused, DNS) to `Transient`.
pub fn map_transport_error(context: &str, err: reqwest::Error) -> MangaError {
    MangaError::Transient(format!("{context}: {err}"))
}
