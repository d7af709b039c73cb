//! Content-script lifecycle.
//!
//! Owns the shared context (state store + card registry) for the page
//! view. The context is created at content-script start, handed to the
//! scanner, injector, and watcher by reference, and torn down with the
//! page; nothing here relies on ambient globals beyond the single
//! lifecycle cell that keeps the context alive for timers and the manual
//! reinitialize hook.

use std::cell::RefCell;
use std::rc::Rc;

use log::{error, info, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::Closure;
use wasm_bindgen_futures::spawn_local;

use crate::ad_data::CardRegistry;
use crate::state::LocalStateStore;
use crate::{bridge, runtime, ui, watcher};

/// How long to let the page settle before the first injection pass.
pub const INITIAL_SETTLE_MS: i32 = 3_000;
/// Period of the background refresh timer. The store's own 10 s gate is
/// the real rate limit; this only decides how often we ask.
pub const REFRESH_INTERVAL_MS: i32 = 30_000;

pub struct ContentContext {
    pub store: LocalStateStore,
    pub cards: CardRegistry,
}

impl ContentContext {
    pub fn new() -> ContentContext {
        ContentContext {
            store: LocalStateStore::new(),
            cards: CardRegistry::new(),
        }
    }
}

impl Default for ContentContext {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedContext = Rc<RefCell<ContentContext>>;

thread_local! {
    static CONTEXT: RefCell<Option<SharedContext>> = const { RefCell::new(None) };
}

/// Wire up the content world: capture relay, mutation watcher, refresh
/// timer, and the initial scan after the page settles.
pub fn start() {
    let ctx: SharedContext = Rc::new(RefCell::new(ContentContext::new()));
    CONTEXT.with(|cell| *cell.borrow_mut() = Some(ctx.clone()));

    if let Err(err) = bridge::start() {
        error!("capture relay not running: {err}");
    }
    if let Err(err) = watcher::start(ctx.clone()) {
        error!("mutation watcher not running: {err}");
    }
    start_refresh_timer(&ctx);

    spawn_local(async move {
        refresh(&ctx).await;
        runtime::sleep_ms(INITIAL_SETTLE_MS).await;
        if let Err(err) = ui::insert_save_buttons(&ctx).await {
            warn!("initial injection pass failed: {err}");
        }
        info!("content script ready, tracking {} card(s)", ctx.borrow().cards.len());
    });
}

/// Pull the saved-ads snapshot from the backend, honoring the rate gate.
/// Returns whether the store currently reflects a successful refresh.
pub async fn refresh(ctx: &SharedContext) -> bool {
    let proceed = ctx.borrow_mut().store.begin_refresh(runtime::now_ms());
    if !proceed {
        return ctx.borrow().store.last_refresh_ok();
    }
    run_refresh(ctx).await
}

async fn run_refresh(ctx: &SharedContext) -> bool {
    let outcome = match runtime::fetch_saved_ads().await {
        Ok(response) if response.success => {
            let mut guard = ctx.borrow_mut();
            guard.store.apply_snapshot(response.ads, response.tags);
            info!(
                "refreshed: {} saved ad(s), {} tag(s)",
                guard.store.saved_count(),
                guard.store.all_tags().len()
            );
            true
        }
        Ok(response) => {
            warn!("saved-ads refresh rejected: {:?}", response.error);
            false
        }
        Err(err) => {
            warn!("saved-ads refresh failed: {err}");
            false
        }
    };
    ctx.borrow_mut().store.finish_refresh(outcome);
    outcome
}

fn start_refresh_timer(ctx: &SharedContext) {
    let ctx = ctx.clone();
    let tick = Closure::<dyn FnMut()>::new(move || {
        let ctx = ctx.clone();
        spawn_local(async move {
            refresh(&ctx).await;
        });
    });
    let started = runtime::window().and_then(|window| {
        window
            .set_interval_with_callback_and_timeout_and_arguments_0(
                tick.as_ref().unchecked_ref(),
                REFRESH_INTERVAL_MS,
            )
            .map_err(|err| format!("setInterval failed: {err:?}"))
    });
    match started {
        Ok(_) => tick.forget(),
        Err(err) => error!("refresh timer not running: {err}"),
    }
}

/// Manual reset: drop every tracked card, refresh past the rate gate, and
/// re-run the injection pass. The only path that discards tracked cards.
pub fn reinitialize() {
    let Some(ctx) = CONTEXT.with(|cell| cell.borrow().clone()) else {
        warn!("reinitialize called before content start");
        return;
    };
    spawn_local(async move {
        {
            let mut guard = ctx.borrow_mut();
            guard.cards.clear();
            guard.store.begin_refresh_forced(runtime::now_ms());
        }
        run_refresh(&ctx).await;
        if let Err(err) = ui::insert_save_buttons(&ctx).await {
            warn!("reinitialize injection pass failed: {err}");
        }
    });
}
