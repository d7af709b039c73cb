//! Wire shapes for the three messaging boundaries: page world to content
//! script (window messages), content script to background worker (runtime
//! messages), and the JS values crossing into WASM.
//!
//! Field names follow the backend's existing JSON contract, which mixes
//! camelCase and snake_case; the serde renames pin that down.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use wasm_bindgen::JsValue;

use crate::ad_data::SavedAdEntry;

/// Requests handled by the background worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RuntimeRequest {
    #[serde(rename = "PING")]
    Ping,
    #[serde(rename = "GET_ALL_SAVED_ADS")]
    GetAllSavedAds,
    #[serde(rename = "SAVE_AD")]
    SaveAd {
        #[serde(rename = "adId")]
        ad_id: String,
        #[serde(rename = "videoUrl", default)]
        video_url: Option<String>,
        #[serde(rename = "posterUrl", default)]
        poster_url: Option<String>,
        #[serde(rename = "imgUrl", default)]
        img_url: Option<String>,
        #[serde(default)]
        query_params: BTreeMap<String, String>,
        #[serde(default)]
        full_text: String,
        #[serde(default)]
        tags: Vec<String>,
    },
    #[serde(rename = "UNSAVE_AD")]
    UnsaveAd {
        #[serde(rename = "adId")]
        ad_id: String,
    },
    #[serde(rename = "UPDATE_AD_TAGS")]
    UpdateAdTags {
        #[serde(rename = "adId")]
        ad_id: String,
        #[serde(default)]
        tags: Vec<String>,
    },
    #[serde(rename = "MANAGE_GLOBAL_TAG")]
    ManageGlobalTag { action: TagAction, tag: String },
    #[serde(rename = "GET_AVAILABLE_TAGS")]
    GetAvailableTags,
    #[serde(rename = "GRAPHQL_RESPONSE")]
    CapturedResponse { data: Value },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagAction {
    Add,
    Remove,
}

/// Generic success/error reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AckResponse {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl AckResponse {
    pub fn ok() -> AckResponse {
        AckResponse {
            success: true,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> AckResponse {
        AckResponse {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Reply to `GET_ALL_SAVED_ADS`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedAdsResponse {
    pub success: bool,
    #[serde(default)]
    pub ads: Vec<SavedAdEntry>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl SavedAdsResponse {
    pub fn failure(error: impl Into<String>) -> SavedAdsResponse {
        SavedAdsResponse {
            success: false,
            ads: Vec::new(),
            tags: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// Reply to `GET_AVAILABLE_TAGS`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagsResponse {
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Reply to `PING`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingResponse {
    pub success: bool,
    pub message: String,
}

/// Messages exchanged over `window.postMessage` between the page-world tap
/// and the content-script relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PageMessage {
    #[serde(rename = "GRAPHQL_RESPONSE")]
    Capture {
        #[serde(rename = "correlationId")]
        correlation_id: u64,
        data: Value,
    },
    #[serde(rename = "GRAPHQL_RESPONSE_COMPLETED")]
    Completed {
        #[serde(rename = "correlationId")]
        correlation_id: u64,
    },
}

/// Serialize to a plain JS object (not a `Map`), so the value survives the
/// extension messaging channel's structured clone.
pub fn to_js<T: Serialize>(value: &T) -> Result<JsValue, String> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|err| format!("failed to serialize message: {err}"))
}

pub fn from_js<T: DeserializeOwned>(value: JsValue) -> Result<T, String> {
    serde_wasm_bindgen::from_value(value)
        .map_err(|err| format!("failed to decode message: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_type_tags_round_trip() {
        let request = RuntimeRequest::UnsaveAd {
            ad_id: "123".to_string(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value, json!({"type": "UNSAVE_AD", "adId": "123"}));
        let back: RuntimeRequest = serde_json::from_value(value).unwrap();
        assert_eq!(back, request);
    }

    #[test]
    fn save_request_uses_backend_field_names() {
        let request = RuntimeRequest::SaveAd {
            ad_id: "123".to_string(),
            video_url: Some("https://cdn/v.mp4".to_string()),
            poster_url: None,
            img_url: None,
            query_params: BTreeMap::from([("q".to_string(), "shoes".to_string())]),
            full_text: "Library ID: 123".to_string(),
            tags: vec!["x".to_string(), "y".to_string()],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["type"], "SAVE_AD");
        assert_eq!(value["adId"], "123");
        assert_eq!(value["videoUrl"], "https://cdn/v.mp4");
        assert_eq!(value["posterUrl"], Value::Null);
        assert_eq!(value["query_params"]["q"], "shoes");
        assert_eq!(value["tags"], json!(["x", "y"]));
    }

    #[test]
    fn save_request_tolerates_missing_optionals() {
        let back: RuntimeRequest =
            serde_json::from_value(json!({"type": "SAVE_AD", "adId": "9"})).unwrap();
        match back {
            RuntimeRequest::SaveAd {
                ad_id,
                video_url,
                tags,
                ..
            } => {
                assert_eq!(ad_id, "9");
                assert!(video_url.is_none());
                assert!(tags.is_empty());
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn manage_tag_action_is_lowercase() {
        let request = RuntimeRequest::ManageGlobalTag {
            action: TagAction::Remove,
            tag: "promo".to_string(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({"type": "MANAGE_GLOBAL_TAG", "action": "remove", "tag": "promo"})
        );
    }

    #[test]
    fn page_messages_round_trip() {
        let capture = PageMessage::Capture {
            correlation_id: 7,
            data: json!({"data": {"ad_library_main": {}}}),
        };
        let value = serde_json::to_value(&capture).unwrap();
        assert_eq!(value["type"], "GRAPHQL_RESPONSE");
        assert_eq!(value["correlationId"], 7);

        let ack: PageMessage = serde_json::from_value(
            json!({"type": "GRAPHQL_RESPONSE_COMPLETED", "correlationId": 7}),
        )
        .unwrap();
        assert_eq!(ack, PageMessage::Completed { correlation_id: 7 });
    }

    #[test]
    fn saved_ads_response_defaults() {
        let response: SavedAdsResponse =
            serde_json::from_value(json!({"success": true})).unwrap();
        assert!(response.success);
        assert!(response.ads.is_empty());
        assert!(response.tags.is_empty());
        assert!(response.error.is_none());
    }
}
