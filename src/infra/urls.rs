use reqwest::Url;

use crate::domain::PreviewOptions;
use crate::error::{GatewayError, Result};

/// Joins `path` onto the API endpoint, e.g. `https://host/v1` + `/account`.
pub fn api_url(endpoint: &str, path: &str) -> Result<Url> {
    let joined = format!("{}{}", endpoint.trim_end_matches('/'), path);
    Url::parse(&joined).map_err(|e| GatewayError::Config(format!("invalid endpoint URL '{}': {}", joined, e)))
}

/// Avatar image with the initials of `name`. The project id rides in the
/// query string because image views cannot send headers.
pub fn initials_avatar(endpoint: &str, project_id: &str, name: &str) -> Result<String> {
    let mut url = api_url(endpoint, "/avatars/initials")?;
    url.query_pairs_mut()
        .append_pair("name", name)
        .append_pair("project", project_id);
    Ok(url.into())
}

pub fn file_preview(
    endpoint: &str,
    project_id: &str,
    bucket_id: &str,
    file_id: &str,
    options: &PreviewOptions,
) -> Result<String> {
    let mut url = api_url(
        endpoint,
        &format!("/storage/buckets/{}/files/{}/preview", bucket_id, file_id),
    )?;
    url.query_pairs_mut()
        .append_pair("width", &options.width.to_string())
        .append_pair("height", &options.height.to_string())
        .append_pair("gravity", options.gravity)
        .append_pair("quality", &options.quality.to_string())
        .append_pair("project", project_id);
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_url_carries_rendition_params() {
        let url = file_preview(
            "https://cloud.appwrite.io/v1/",
            "proj",
            "bucket",
            "file-1",
            &PreviewOptions::default(),
        )
        .unwrap();
        assert_eq!(
            url,
            "https://cloud.appwrite.io/v1/storage/buckets/bucket/files/file-1/preview?width=2000&height=2000&gravity=top&quality=100&project=proj"
        );
    }

    #[test]
    fn test_avatar_name_is_encoded() {
        let url = initials_avatar("https://cloud.appwrite.io/v1", "proj", "Ana Ruiz").unwrap();
        assert_eq!(
            url,
            "https://cloud.appwrite.io/v1/avatars/initials?name=Ana+Ruiz&project=proj"
        );
    }

    #[test]
    fn test_bad_endpoint_is_config_error() {
        assert!(matches!(api_url("not a url", "/account"), Err(GatewayError::Config(_))));
    }
}
