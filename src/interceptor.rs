//! Page-world response tap.
//!
//! A thin page script hooks the XHR completion event and hands every
//! response to `observe_response`; all routing happens here against a
//! registered rule table, never by mutating page prototypes from Rust.
//! Matching responses are parsed, filtered for the ad-library marker, and
//! buffered; a one-second loop re-broadcasts every pending capture to the
//! page until the content script acknowledges it. The tap never blocks or
//! alters the underlying request.

use std::cell::{Cell, RefCell};

use log::{debug, info, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::Closure;
use web_sys::MessageEvent;

use crate::capture::{self, CaptureBuffer};
use crate::messages::{self, PageMessage};
use crate::runtime;

/// Redelivery interval for unacknowledged captures, in milliseconds.
pub const REDELIVERY_INTERVAL_MS: i32 = 1_000;

/// A response is tapped when its method matches and its URL contains the
/// path fragment.
#[derive(Debug, Clone, Copy)]
pub struct TapRule {
    pub method: &'static str,
    pub path_fragment: &'static str,
}

impl TapRule {
    fn matches(&self, method: &str, url: &str) -> bool {
        method.eq_ignore_ascii_case(self.method) && url.contains(self.path_fragment)
    }
}

const DEFAULT_RULES: [TapRule; 1] = [TapRule {
    method: "POST",
    path_fragment: "/api/graphql",
}];

struct ResponseTap {
    rules: Vec<TapRule>,
    buffer: CaptureBuffer,
}

impl ResponseTap {
    fn new() -> ResponseTap {
        ResponseTap {
            rules: DEFAULT_RULES.to_vec(),
            buffer: CaptureBuffer::new(),
        }
    }

    /// Parse a tapped response and buffer every marked record. Returns how
    /// many captures were stored.
    fn observe(&mut self, method: &str, url: &str, body: &str) -> usize {
        if !self.rules.iter().any(|rule| rule.matches(method, url)) {
            return 0;
        }
        let records = capture::parse_records(body);
        if records.is_empty() {
            warn!("no valid JSON found in tapped response from {url}");
            return 0;
        }
        records
            .into_iter()
            .filter(capture::has_capture_marker)
            .map(|record| self.buffer.store(record))
            .count()
    }
}

thread_local! {
    static TAP: RefCell<ResponseTap> = RefCell::new(ResponseTap::new());
    static INSTALLED: Cell<bool> = const { Cell::new(false) };
}

/// Entry point for the page script. Installs the ack listener and the
/// redelivery loop once per page load; later calls are no-ops.
pub fn install() -> Result<(), String> {
    if INSTALLED.with(Cell::get) {
        return Ok(());
    }
    INSTALLED.with(|flag| flag.set(true));

    let window = runtime::window()?;

    let ack_listener = Closure::<dyn FnMut(MessageEvent)>::new(|event: MessageEvent| {
        let Ok(PageMessage::Completed { correlation_id }) =
            messages::from_js::<PageMessage>(event.data())
        else {
            return;
        };
        let acked = TAP.with(|tap| tap.borrow_mut().buffer.ack(correlation_id));
        if acked {
            debug!("capture {correlation_id} acknowledged");
        }
    });
    window
        .add_event_listener_with_callback("message", ack_listener.as_ref().unchecked_ref())
        .map_err(|err| format!("failed to attach ack listener: {err:?}"))?;
    ack_listener.forget();

    let redeliver = Closure::<dyn FnMut()>::new(|| {
        TAP.with(|tap| {
            let tap = tap.borrow();
            for (correlation_id, payload) in tap.buffer.pending() {
                let message = PageMessage::Capture {
                    correlation_id,
                    data: payload.clone(),
                };
                if let Err(err) = runtime::post_page_message(&message) {
                    warn!("failed to broadcast capture {correlation_id}: {err}");
                }
            }
        });
    });
    window
        .set_interval_with_callback_and_timeout_and_arguments_0(
            redeliver.as_ref().unchecked_ref(),
            REDELIVERY_INTERVAL_MS,
        )
        .map_err(|err| format!("failed to start redelivery loop: {err:?}"))?;
    redeliver.forget();

    info!("response tap installed");
    web_sys::console::log_1(&"ad-stash response tap installed".into());
    Ok(())
}

/// Called by the page script with every completed response. Observational
/// only; the response has already been delivered to the page.
pub fn observe_response(method: &str, url: &str, body: &str) {
    let stored = TAP.with(|tap| tap.borrow_mut().observe(method, url, body));
    if stored > 0 {
        debug!("buffered {stored} capture(s) from {url}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rule_matches_method_and_fragment() {
        let rule = TapRule {
            method: "POST",
            path_fragment: "/api/graphql",
        };
        assert!(rule.matches("post", "https://x.example/api/graphql/"));
        assert!(!rule.matches("GET", "https://x.example/api/graphql/"));
        assert!(!rule.matches("POST", "https://x.example/api/other"));
    }

    #[test]
    fn tap_buffers_only_marked_records() {
        let mut tap = ResponseTap::new();
        let body = json!({"data": {"ad_library_main": {"x": 1}}}).to_string();
        assert_eq!(tap.observe("POST", "https://x.example/api/graphql", &body), 1);

        let unmarked = json!({"data": {"other": 1}}).to_string();
        assert_eq!(
            tap.observe("POST", "https://x.example/api/graphql", &unmarked),
            0
        );
        assert_eq!(tap.buffer.len(), 1);
    }

    #[test]
    fn tap_ignores_unmatched_requests() {
        let mut tap = ResponseTap::new();
        let body = json!({"data": {"ad_library_main": {}}}).to_string();
        assert_eq!(tap.observe("GET", "https://x.example/api/graphql", &body), 0);
        assert_eq!(tap.observe("POST", "https://x.example/feed", &body), 0);
        assert!(tap.buffer.is_empty());
    }

    #[test]
    fn tap_handles_jsonl_bodies() {
        let mut tap = ResponseTap::new();
        let body = format!(
            "{}\n{}\nbroken line",
            json!({"data": {"ad_library_main": {"a": 1}}}),
            json!({"data": {"ad_library_main": {"b": 2}}}),
        );
        assert_eq!(tap.observe("POST", "https://x.example/api/graphql", &body), 2);
    }
}
