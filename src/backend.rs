//! Client for the remote save-ads backend.
//!
//! Every operation is a single request/response exchange against the
//! configured base URL, authenticated with the `x-api-key` header.
//! Transport and decoding failures map to a failure result carrying the
//! underlying message; nothing is retried here.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{Headers, Request, RequestInit, Response, Window, WorkerGlobalScope};

use crate::config::ExtensionConfig;
use crate::messages::TagAction;

/// One HTTP exchange, described independently of the Fetch API so tests
/// can run against an in-memory transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: &'static str,
    pub url: String,
    pub api_token: String,
    pub body: Option<String>,
}

#[async_trait(?Send)]
pub trait Transport {
    /// Perform the exchange and return the raw response body.
    async fn send(&self, request: HttpRequest) -> Result<String, String>;
}

/// Production transport over the browser Fetch API. Works from both the
/// content-script window and the background worker global.
pub struct FetchTransport;

#[async_trait(?Send)]
impl Transport for FetchTransport {
    async fn send(&self, request: HttpRequest) -> Result<String, String> {
        let init = RequestInit::new();
        init.set_method(request.method);

        let headers =
            Headers::new().map_err(|err| format!("failed to build headers: {err:?}"))?;
        headers
            .set("Content-Type", "application/json")
            .and_then(|_| headers.set("x-api-key", &request.api_token))
            .map_err(|err| format!("failed to set headers: {err:?}"))?;
        init.set_headers(headers.as_ref());

        if let Some(body) = &request.body {
            init.set_body(&JsValue::from_str(body));
        }

        let js_request = Request::new_with_str_and_init(&request.url, &init)
            .map_err(|err| format!("invalid request for {}: {err:?}", request.url))?;

        let response = JsFuture::from(global_fetch(&js_request)?)
            .await
            .map_err(|err| format!("request to {} failed: {err:?}", request.url))?;
        let response: Response = response
            .dyn_into()
            .map_err(|_| "fetch did not return a Response".to_string())?;

        let text_promise = response
            .text()
            .map_err(|err| format!("failed to read response body: {err:?}"))?;
        let text = JsFuture::from(text_promise)
            .await
            .map_err(|err| format!("failed to read response body: {err:?}"))?;
        text.as_string()
            .ok_or_else(|| "response body was not text".to_string())
    }
}

// The background worker has no `window`; resolve fetch off whichever
// global scope is hosting us.
fn global_fetch(request: &Request) -> Result<js_sys::Promise, String> {
    let global = js_sys::global();
    if let Some(window) = global.dyn_ref::<Window>() {
        return Ok(window.fetch_with_request(request));
    }
    if let Some(scope) = global.dyn_ref::<WorkerGlobalScope>() {
        return Ok(scope.fetch_with_request(request));
    }
    Err("no global scope with fetch available".to_string())
}

/// Body of the save operation. `full_html_text` is the backend's name for
/// the card text; `extra_data` rides along only when the capture index
/// holds an intercepted payload for the ad.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveAdBody {
    #[serde(rename = "adId")]
    pub ad_id: String,
    #[serde(rename = "videoUrl")]
    pub video_url: Option<String>,
    #[serde(rename = "posterUrl")]
    pub poster_url: Option<String>,
    #[serde(rename = "imgUrl")]
    pub img_url: Option<String>,
    pub query_params: BTreeMap<String, String>,
    pub full_html_text: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub extra_data: Option<Value>,
}

/// Backend reply to the listing operation.
#[derive(Debug, Clone, Deserialize)]
pub struct SavedAdsPayload {
    #[serde(default)]
    pub ads: Vec<crate::ad_data::SavedAdEntry>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Backend reply to mutating operations. `success` defaults to true
/// because some endpoints omit it on the happy path.
#[derive(Debug, Clone, Deserialize)]
pub struct AckPayload {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TagsPayload {
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

fn default_true() -> bool {
    true
}

pub struct BackendClient<T: Transport> {
    config: ExtensionConfig,
    transport: T,
}

impl<T: Transport> BackendClient<T> {
    pub fn new(config: ExtensionConfig, transport: T) -> BackendClient<T> {
        BackendClient { config, transport }
    }

    pub async fn list_saved_ads(&self) -> Result<SavedAdsPayload, String> {
        let body = self.get("all-saved-ads").await?;
        decode(&body)
    }

    pub async fn save_ad(&self, save: &SaveAdBody) -> Result<AckPayload, String> {
        let body = self.post("save", save).await?;
        decode(&body)
    }

    pub async fn unsave_ad(&self, ad_id: &str) -> Result<AckPayload, String> {
        let body = self
            .post("unsave", &serde_json::json!({ "adId": ad_id }))
            .await?;
        decode(&body)
    }

    pub async fn update_ad_tags(
        &self,
        ad_id: &str,
        tags: &[String],
    ) -> Result<AckPayload, String> {
        let body = self
            .post("update-tags", &serde_json::json!({ "adId": ad_id, "tags": tags }))
            .await?;
        decode(&body)
    }

    pub async fn manage_global_tag(
        &self,
        action: TagAction,
        tag: &str,
    ) -> Result<AckPayload, String> {
        let body = self
            .post("manage-tags", &serde_json::json!({ "action": action, "tag": tag }))
            .await?;
        decode(&body)
    }

    pub async fn available_tags(&self) -> Result<TagsPayload, String> {
        let body = self.get("available-tags").await?;
        decode(&body)
    }

    async fn get(&self, path: &str) -> Result<String, String> {
        self.transport
            .send(HttpRequest {
                method: "GET",
                url: self.config.endpoint(path),
                api_token: self.config.api_token.clone(),
                body: None,
            })
            .await
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<String, String> {
        let body = serde_json::to_string(body)
            .map_err(|err| format!("failed to encode request body: {err}"))?;
        self.transport
            .send(HttpRequest {
                method: "POST",
                url: self.config.endpoint(path),
                api_token: self.config.api_token.clone(),
                body: Some(body),
            })
            .await
    }
}

fn decode<R: DeserializeOwned>(body: &str) -> Result<R, String> {
    serde_json::from_str(body).map_err(|err| format!("failed to decode backend response: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn save_body_uses_backend_field_names_and_nulls() {
        let body = SaveAdBody {
            ad_id: "123".to_string(),
            video_url: None,
            poster_url: None,
            img_url: Some("https://cdn/i.jpg".to_string()),
            query_params: BTreeMap::from([("country".to_string(), "IT".to_string())]),
            full_html_text: "Library ID: 123".to_string(),
            tags: vec!["x".to_string()],
            extra_data: None,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["adId"], "123");
        // Absent media is an explicit null, matching the existing contract.
        assert_eq!(value["videoUrl"], Value::Null);
        assert_eq!(value["imgUrl"], "https://cdn/i.jpg");
        assert_eq!(value["full_html_text"], "Library ID: 123");
        assert!(value.get("extra_data").is_none());
    }

    #[test]
    fn save_body_carries_extra_data_when_present() {
        let body = SaveAdBody {
            ad_id: "123".to_string(),
            video_url: None,
            poster_url: None,
            img_url: None,
            query_params: BTreeMap::new(),
            full_html_text: String::new(),
            tags: Vec::new(),
            extra_data: Some(json!({"ad_archive_id": "123", "snapshot": {"x": 1}})),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["extra_data"]["snapshot"]["x"], 1);
    }

    #[test]
    fn ack_payload_defaults_success_to_true() {
        let ack: AckPayload = serde_json::from_str("{}").unwrap();
        assert!(ack.success);
        let ack: AckPayload =
            serde_json::from_str(r#"{"success":false,"error":"quota exceeded"}"#).unwrap();
        assert!(!ack.success);
        assert_eq!(ack.error.as_deref(), Some("quota exceeded"));
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod stub_transport_tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::BTreeMap as Map;
    use std::collections::BTreeSet;
    use serde_json::json;

    /// In-memory stand-in for the real backend: stores saved ads and the
    /// global tag set, and answers the same JSON shapes.
    #[derive(Default)]
    struct StubBackend {
        ads: RefCell<Map<String, Vec<String>>>,
        tags: RefCell<BTreeSet<String>>,
        fail_save_with: Option<String>,
    }

    #[async_trait(?Send)]
    impl Transport for StubBackend {
        async fn send(&self, request: HttpRequest) -> Result<String, String> {
            assert_eq!(request.api_token, "secret");
            let op = request
                .url
                .rsplit("/meta-ads/")
                .next()
                .unwrap()
                .to_string();
            let body: Value = request
                .body
                .as_deref()
                .map(|b| serde_json::from_str(b).unwrap())
                .unwrap_or(Value::Null);
            let reply = match op.as_str() {
                "all-saved-ads" => {
                    let ads: Vec<Value> = self
                        .ads
                        .borrow()
                        .iter()
                        .map(|(id, tags)| json!({"ad_archive_id": id, "tags": tags}))
                        .collect();
                    let tags: Vec<String> = self.tags.borrow().iter().cloned().collect();
                    json!({"ads": ads, "tags": tags})
                }
                "save" => {
                    if let Some(error) = &self.fail_save_with {
                        json!({"success": false, "error": error})
                    } else {
                        let id = body["adId"].as_str().unwrap().to_string();
                        let tags: Vec<String> = body["tags"]
                            .as_array()
                            .unwrap()
                            .iter()
                            .map(|t| t.as_str().unwrap().to_string())
                            .collect();
                        self.tags.borrow_mut().extend(tags.iter().cloned());
                        self.ads.borrow_mut().insert(id, tags);
                        json!({"success": true})
                    }
                }
                "unsave" => {
                    self.ads
                        .borrow_mut()
                        .remove(body["adId"].as_str().unwrap());
                    json!({"success": true})
                }
                "update-tags" => {
                    let id = body["adId"].as_str().unwrap().to_string();
                    let tags: Vec<String> = body["tags"]
                        .as_array()
                        .unwrap()
                        .iter()
                        .map(|t| t.as_str().unwrap().to_string())
                        .collect();
                    self.tags.borrow_mut().extend(tags.iter().cloned());
                    self.ads.borrow_mut().insert(id, tags);
                    json!({"success": true})
                }
                "manage-tags" => {
                    let tag = body["tag"].as_str().unwrap().to_string();
                    match body["action"].as_str().unwrap() {
                        "add" => {
                            self.tags.borrow_mut().insert(tag);
                        }
                        _ => {
                            self.tags.borrow_mut().remove(&tag);
                        }
                    }
                    json!({"success": true})
                }
                "available-tags" => {
                    let tags: Vec<String> = self.tags.borrow().iter().cloned().collect();
                    json!({"tags": tags})
                }
                other => panic!("unexpected operation: {other}"),
            };
            Ok(reply.to_string())
        }
    }

    fn client(stub: StubBackend) -> BackendClient<StubBackend> {
        let config = ExtensionConfig::from_parts(
            Some("secret".into()),
            Some("https://api.example".into()),
        )
        .unwrap();
        BackendClient::new(config, stub)
    }

    fn save_body(ad_id: &str, tags: &[&str]) -> SaveAdBody {
        SaveAdBody {
            ad_id: ad_id.to_string(),
            video_url: None,
            poster_url: None,
            img_url: None,
            query_params: BTreeMap::new(),
            full_html_text: String::new(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            extra_data: None,
        }
    }

    #[tokio::test]
    async fn save_then_list_round_trips_tags() {
        let client = client(StubBackend::default());
        let ack = client.save_ad(&save_body("123", &["x", "y"])).await.unwrap();
        assert!(ack.success);

        let listing = client.list_saved_ads().await.unwrap();
        let entry = listing
            .ads
            .iter()
            .find(|ad| ad.ad_archive_id == "123")
            .expect("saved ad listed");
        let tags: BTreeSet<&str> = entry.tags.iter().map(String::as_str).collect();
        assert_eq!(tags, BTreeSet::from(["x", "y"]));
    }

    #[tokio::test]
    async fn rejected_save_carries_backend_error() {
        let stub = StubBackend {
            fail_save_with: Some("quota exceeded".to_string()),
            ..StubBackend::default()
        };
        let client = client(stub);
        let ack = client.save_ad(&save_body("123", &["x"])).await.unwrap();
        assert!(!ack.success);
        assert_eq!(ack.error.as_deref(), Some("quota exceeded"));
    }

    #[tokio::test]
    async fn unsave_removes_the_ad() {
        let client = client(StubBackend::default());
        client.save_ad(&save_body("123", &["x"])).await.unwrap();
        client.unsave_ad("123").await.unwrap();
        let listing = client.list_saved_ads().await.unwrap();
        assert!(listing.ads.is_empty());
    }

    #[tokio::test]
    async fn manage_tags_round_trip() {
        let client = client(StubBackend::default());
        client
            .manage_global_tag(TagAction::Add, "promo")
            .await
            .unwrap();
        let tags = client.available_tags().await.unwrap();
        assert_eq!(tags.tags, vec!["promo".to_string()]);

        client
            .manage_global_tag(TagAction::Remove, "promo")
            .await
            .unwrap();
        let tags = client.available_tags().await.unwrap();
        assert!(tags.tags.is_empty());
    }

    #[tokio::test]
    async fn undecodable_response_is_a_decode_failure() {
        struct Garbage;
        #[async_trait(?Send)]
        impl Transport for Garbage {
            async fn send(&self, _request: HttpRequest) -> Result<String, String> {
                Ok("<html>gateway error</html>".to_string())
            }
        }
        let config = ExtensionConfig::from_parts(
            Some("secret".into()),
            Some("https://api.example".into()),
        )
        .unwrap();
        let client = BackendClient::new(config, Garbage);
        let err = client.list_saved_ads().await.unwrap_err();
        assert!(err.contains("failed to decode backend response"));
    }
}
