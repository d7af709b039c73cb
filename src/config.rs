//! Extension configuration: the API token and backend base URL persisted
//! in `chrome.storage.local`. Both must be set before any backend call;
//! missing configuration fails the operation immediately, no retry.

pub const STORAGE_KEY_API_TOKEN: &str = "apiToken";
pub const STORAGE_KEY_BACKEND_URL: &str = "url";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionConfig {
    pub api_token: String,
    pub base_url: String,
}

impl ExtensionConfig {
    pub fn from_parts(
        api_token: Option<String>,
        base_url: Option<String>,
    ) -> Result<ExtensionConfig, String> {
        let api_token = non_empty(api_token).ok_or("No API token configured")?;
        let base_url = non_empty(base_url).ok_or("No backend URL configured")?;
        Ok(ExtensionConfig {
            api_token,
            base_url,
        })
    }

    /// Absolute URL of one backend operation.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/meta-ads/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_token_is_a_hard_failure() {
        let err = ExtensionConfig::from_parts(None, Some("https://api.example".into()))
            .unwrap_err();
        assert_eq!(err, "No API token configured");
    }

    #[test]
    fn missing_url_is_a_hard_failure() {
        let err = ExtensionConfig::from_parts(Some("token".into()), None).unwrap_err();
        assert_eq!(err, "No backend URL configured");

        let err =
            ExtensionConfig::from_parts(Some("token".into()), Some("   ".into())).unwrap_err();
        assert_eq!(err, "No backend URL configured");
    }

    #[test]
    fn endpoint_joins_without_double_slashes() {
        let config = ExtensionConfig::from_parts(
            Some("token".into()),
            Some("https://api.example/".into()),
        )
        .unwrap();
        assert_eq!(
            config.endpoint("all-saved-ads"),
            "https://api.example/meta-ads/all-saved-ads"
        );
        assert_eq!(config.endpoint("/save"), "https://api.example/meta-ads/save");
    }
}
