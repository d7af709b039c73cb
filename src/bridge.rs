//! Content-script relay between the page-world tap and the background
//! worker.
//!
//! For every capture broadcast received from the page, the relay forwards
//! the payload over the extension messaging channel and then posts exactly
//! one completion acknowledgment back to the page, whether or not the
//! forward succeeded. The ack is what stops the tap's redelivery loop.

use log::{debug, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::Closure;
use wasm_bindgen_futures::spawn_local;
use web_sys::MessageEvent;

use crate::messages::{self, PageMessage, RuntimeRequest};
use crate::runtime;

pub fn start() -> Result<(), String> {
    let listener = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
        let Ok(PageMessage::Capture {
            correlation_id,
            data,
        }) = messages::from_js::<PageMessage>(event.data())
        else {
            // Not part of the capture protocol (or our own ack echo).
            return;
        };

        debug!("relaying capture {correlation_id} to background");
        spawn_local(async move {
            let forward = RuntimeRequest::CapturedResponse { data };
            if let Err(err) = runtime::send_request(&forward).await {
                warn!("capture forward failed: {err}");
            }
            // One ack per forwarded capture, regardless of outcome.
            if let Err(err) =
                runtime::post_page_message(&PageMessage::Completed { correlation_id })
            {
                warn!("failed to ack capture {correlation_id}: {err}");
            }
        });
    });

    runtime::window()?
        .add_event_listener_with_callback("message", listener.as_ref().unchecked_ref())
        .map_err(|err| format!("failed to attach page message listener: {err:?}"))?;
    listener.forget();
    Ok(())
}
