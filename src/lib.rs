/// Ad Stash - browser extension for saving and tagging ads from the ad
/// library, built with Rust + WASM.
///
/// One WASM module, four entry points, one per extension context: the
/// page-world response tap, the content script, the background worker
/// dispatcher, and the options page.

pub mod ad_data;
pub mod backend;
pub mod background;
pub mod bridge;
pub mod capture;
pub mod config;
pub mod content;
pub mod interceptor;
pub mod matching;
pub mod messages;
pub mod runtime;
pub mod scanner;
pub mod state;
pub mod ui;
pub mod watcher;

use wasm_bindgen::prelude::*;

// Set up panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

// Content-script entry: state store, card scanning, UI injection.
#[wasm_bindgen]
pub fn start_content() {
    content::start();
}

// Page-world entry: install the response tap and its redelivery loop.
#[wasm_bindgen]
pub fn start_interceptor() {
    if let Err(err) = interceptor::install() {
        log::error!("response tap not installed: {err}");
    }
}

// Called by the page script for every completed network response.
#[wasm_bindgen]
pub fn observe_response(method: &str, url: &str, body: &str) {
    interceptor::observe_response(method, url, body);
}

// Background-worker entry, wired to chrome.runtime.onMessage by the shim.
#[wasm_bindgen]
pub async fn handle_runtime_message(message: JsValue) -> JsValue {
    background::dispatch(message).await
}

// Start the Yew app for the options page
#[wasm_bindgen]
pub fn start_options() {
    yew::Renderer::<ui::options::OptionsApp>::new().render();
}

// Manual reset hook, callable from the console for debugging.
#[wasm_bindgen]
pub fn reinitialize() {
    content::reinitialize();
}

// Re-export the id extraction for JavaScript access
#[wasm_bindgen]
pub fn extract_library_id(text: &str) -> Option<String> {
    matching::find_library_id(text)
}
