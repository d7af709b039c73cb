//! Rescan trigger for dynamically loaded content.
//!
//! A MutationObserver on the document body fires the injection pass when
//! new nodes appear, behind a timestamp gate so mutation bursts collapse
//! into at most one pass per window. This is a debounce, not a queue:
//! mutations inside the window are dropped, later ones rescan everything.

use std::cell::RefCell;
use std::rc::Rc;

use log::{info, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::Closure;
use wasm_bindgen_futures::spawn_local;
use web_sys::{MutationObserver, MutationObserverInit, MutationRecord};

use crate::content::SharedContext;
use crate::runtime;
use crate::ui;

/// Minimum spacing between mutation-triggered rescans, in milliseconds.
pub const MUTATION_DEBOUNCE_MS: f64 = 100.0;

/// Timestamp-gated trigger: fires at most once per window.
#[derive(Debug)]
pub struct DebounceGate {
    window_ms: f64,
    last_fire: Option<f64>,
}

impl DebounceGate {
    pub fn new(window_ms: f64) -> DebounceGate {
        DebounceGate {
            window_ms,
            last_fire: None,
        }
    }

    pub fn should_fire(&mut self, now_ms: f64) -> bool {
        match self.last_fire {
            Some(last) if now_ms - last < self.window_ms => false,
            _ => {
                self.last_fire = Some(now_ms);
                true
            }
        }
    }
}

/// Observe subtree insertions under the document body and re-run the
/// injection pass for batches that added nodes.
pub fn start(ctx: SharedContext) -> Result<(), String> {
    let gate = Rc::new(RefCell::new(DebounceGate::new(MUTATION_DEBOUNCE_MS)));

    let callback = Closure::<dyn FnMut(js_sys::Array, MutationObserver)>::new(
        move |records: js_sys::Array, _observer: MutationObserver| {
            let added_nodes = records.iter().any(|record| {
                record
                    .dyn_ref::<MutationRecord>()
                    .is_some_and(|record| record.added_nodes().length() > 0)
            });
            if !added_nodes {
                return;
            }
            if !gate.borrow_mut().should_fire(runtime::now_ms()) {
                return;
            }
            let ctx = ctx.clone();
            spawn_local(async move {
                if let Err(err) = ui::insert_save_buttons(&ctx).await {
                    warn!("mutation-triggered rescan failed: {err}");
                }
            });
        },
    );

    let observer = MutationObserver::new(callback.as_ref().unchecked_ref())
        .map_err(|err| format!("failed to create MutationObserver: {err:?}"))?;
    let options = MutationObserverInit::new();
    options.set_child_list(true);
    options.set_subtree(true);

    let body = runtime::document()?
        .body()
        .ok_or_else(|| "document has no body yet".to_string())?;
    observer
        .observe_with_options(&body, &options)
        .map_err(|err| format!("failed to observe document body: {err:?}"))?;
    callback.forget();

    info!("mutation watcher running");
    Ok(())
}
