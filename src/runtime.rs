//! Small WASM-side runtime helpers shared by the content and page worlds:
//! access to the window, timers, page messaging, and the extension
//! messaging channel.

use std::collections::BTreeMap;

use js_sys::Promise;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

use crate::messages::{self, AckResponse, PageMessage, RuntimeRequest, SavedAdsResponse};

#[wasm_bindgen(module = "/js/runtime.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn sendRuntimeMessage(msg: JsValue) -> Result<JsValue, JsValue>;
}

pub fn window() -> Result<web_sys::Window, String> {
    web_sys::window().ok_or_else(|| "no window in this context".to_string())
}

pub fn document() -> Result<web_sys::Document, String> {
    window()?
        .document()
        .ok_or_else(|| "window has no document".to_string())
}

pub fn now_ms() -> f64 {
    js_sys::Date::now()
}

/// Resolve after `ms` milliseconds via `setTimeout`.
pub async fn sleep_ms(ms: i32) {
    let promise = Promise::new(&mut |resolve, _reject| {
        let set = window().and_then(|w| {
            w.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms)
                .map_err(|err| format!("setTimeout failed: {err:?}"))
        });
        if let Err(err) = set {
            log::error!("{err}");
        }
    });
    let _ = JsFuture::from(promise).await;
}

/// Send a runtime message to the background worker and return the raw
/// reply value.
pub async fn send_request(request: &RuntimeRequest) -> Result<JsValue, String> {
    let message = messages::to_js(request)?;
    sendRuntimeMessage(message)
        .await
        .map_err(|err| format!("runtime message failed: {err:?}"))
}

/// Send a runtime message and decode the generic success/error reply.
/// Channel failures fold into a failed ack so callers have one error path.
pub async fn send_for_ack(request: &RuntimeRequest) -> AckResponse {
    match send_request(request).await {
        Ok(value) => match messages::from_js::<AckResponse>(value) {
            Ok(ack) => ack,
            Err(err) => AckResponse::failure(err),
        },
        Err(err) => AckResponse::failure(err),
    }
}

pub async fn fetch_saved_ads() -> Result<SavedAdsResponse, String> {
    let value = send_request(&RuntimeRequest::GetAllSavedAds).await?;
    messages::from_js(value)
}

/// Broadcast a capture-protocol message to the page.
pub fn post_page_message(message: &PageMessage) -> Result<(), String> {
    let value = messages::to_js(message)?;
    window()?
        .post_message(&value, "*")
        .map_err(|err| format!("postMessage failed: {err:?}"))
}

/// Query parameters of the page currently being viewed.
pub fn page_query_params() -> BTreeMap<String, String> {
    let href = match window().and_then(|w| {
        w.location()
            .href()
            .map_err(|err| format!("failed to read location: {err:?}"))
    }) {
        Ok(href) => href,
        Err(err) => {
            log::error!("{err}");
            return BTreeMap::new();
        }
    };
    match url::Url::parse(&href) {
        Ok(parsed) => parsed
            .query_pairs()
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect(),
        Err(err) => {
            log::error!("failed to parse page URL: {err}");
            BTreeMap::new()
        }
    }
}
