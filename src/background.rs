//! Background worker: routes runtime messages to the backend client and
//! indexes intercepted payloads so saves can attach them.
//!
//! The worker is single-threaded; its state lives in a thread-local cell
//! holding the cached configuration and the capture index.

use std::cell::RefCell;

use log::{error, info};
use wasm_bindgen::prelude::*;

use crate::backend::{AckPayload, BackendClient, FetchTransport, SaveAdBody};
use crate::capture::CaptureIndex;
use crate::config::{ExtensionConfig, STORAGE_KEY_API_TOKEN, STORAGE_KEY_BACKEND_URL};
use crate::messages::{
    self, AckResponse, PingResponse, RuntimeRequest, SavedAdsResponse, TagsResponse,
};

#[wasm_bindgen(module = "/js/storage.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn getStorage(key: &str) -> Result<JsValue, JsValue>;
}

#[derive(Default)]
struct Background {
    config: Option<ExtensionConfig>,
    captures: CaptureIndex,
}

thread_local! {
    static BACKGROUND: RefCell<Background> = RefCell::new(Background::default());
}

/// Handle one runtime message and produce the reply sent back over
/// `sendResponse`. Never throws; failures become `{success: false}`.
pub async fn dispatch(message: JsValue) -> JsValue {
    let request = match messages::from_js::<RuntimeRequest>(message) {
        Ok(request) => request,
        Err(err) => {
            error!("unknown message type: {err}");
            return reply(&AckResponse::failure("Unknown message type"));
        }
    };

    match request {
        RuntimeRequest::Ping => reply(&PingResponse {
            success: true,
            message: "Extension is working".to_string(),
        }),

        RuntimeRequest::CapturedResponse { data } => {
            let indexed =
                BACKGROUND.with(|cell| cell.borrow_mut().captures.index_payload(&data));
            if indexed > 0 {
                info!("indexed {indexed} intercepted ad(s)");
            }
            reply(&AckResponse::ok())
        }

        RuntimeRequest::GetAllSavedAds => match client().await {
            Err(err) => reply(&SavedAdsResponse::failure(err)),
            Ok(client) => match client.list_saved_ads().await {
                Ok(payload) => reply(&SavedAdsResponse {
                    success: true,
                    ads: payload.ads,
                    tags: payload.tags,
                    error: payload.error,
                }),
                Err(err) => reply(&SavedAdsResponse::failure(err)),
            },
        },

        RuntimeRequest::SaveAd {
            ad_id,
            video_url,
            poster_url,
            img_url,
            query_params,
            full_text,
            tags,
        } => {
            let extra_data =
                BACKGROUND.with(|cell| cell.borrow().captures.get(&ad_id).cloned());
            if extra_data.is_some() {
                info!("attaching intercepted data to save of ad {ad_id}");
            }
            let body = SaveAdBody {
                ad_id,
                video_url,
                poster_url,
                img_url,
                query_params,
                full_html_text: full_text,
                tags,
                extra_data,
            };
            match client().await {
                Err(err) => reply(&AckResponse::failure(err)),
                Ok(client) => fold_ack(client.save_ad(&body).await),
            }
        }

        RuntimeRequest::UnsaveAd { ad_id } => match client().await {
            Err(err) => reply(&AckResponse::failure(err)),
            Ok(client) => fold_ack(client.unsave_ad(&ad_id).await),
        },

        RuntimeRequest::UpdateAdTags { ad_id, tags } => match client().await {
            Err(err) => reply(&AckResponse::failure(err)),
            Ok(client) => fold_ack(client.update_ad_tags(&ad_id, &tags).await),
        },

        RuntimeRequest::ManageGlobalTag { action, tag } => match client().await {
            Err(err) => reply(&AckResponse::failure(err)),
            Ok(client) => fold_ack(client.manage_global_tag(action, &tag).await),
        },

        RuntimeRequest::GetAvailableTags => match client().await {
            Err(err) => reply(&TagsResponse {
                tags: Vec::new(),
                error: Some(err),
            }),
            Ok(client) => match client.available_tags().await {
                Ok(payload) => reply(&TagsResponse {
                    tags: payload.tags,
                    error: payload.error,
                }),
                Err(err) => reply(&TagsResponse {
                    tags: Vec::new(),
                    error: Some(err),
                }),
            },
        },
    }
}

fn fold_ack(result: Result<AckPayload, String>) -> JsValue {
    match result {
        Ok(payload) => reply(&AckResponse {
            success: payload.success,
            error: payload.error,
        }),
        Err(err) => reply(&AckResponse::failure(err)),
    }
}

/// Build a client from the cached configuration, loading it from storage
/// on first use. Missing configuration fails the operation immediately.
async fn client() -> Result<BackendClient<FetchTransport>, String> {
    if let Some(config) = BACKGROUND.with(|cell| cell.borrow().config.clone()) {
        return Ok(BackendClient::new(config, FetchTransport));
    }

    let api_token = read_storage_string(STORAGE_KEY_API_TOKEN).await;
    let base_url = read_storage_string(STORAGE_KEY_BACKEND_URL).await;
    let config = ExtensionConfig::from_parts(api_token, base_url)
        .map_err(|err| format!("{err}, go to the options page and try again."))?;

    info!(
        "backend configured, base URL length {}",
        config.base_url.len()
    );
    BACKGROUND.with(|cell| cell.borrow_mut().config = Some(config.clone()));
    Ok(BackendClient::new(config, FetchTransport))
}

async fn read_storage_string(key: &str) -> Option<String> {
    match getStorage(key).await {
        Ok(value) => value.as_string(),
        Err(err) => {
            error!("failed to read {key} from storage: {err:?}");
            None
        }
    }
}

fn reply<T: serde::Serialize>(value: &T) -> JsValue {
    messages::to_js(value).unwrap_or(JsValue::NULL)
}
