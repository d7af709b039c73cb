//! The save/unsave toggle injected into each ad card.
//!
//! The button reflects the card's saved state and goes grey while a call
//! is in flight. On failure it reverts to its pre-action state; the error
//! goes to the console log only.

use log::{error, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::Closure;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Element, HtmlElement, MouseEvent};

use crate::content::{ContentContext, SharedContext};
use crate::messages::RuntimeRequest;
use crate::runtime;
use crate::ui;

pub fn attach(ctx: &SharedContext, ad_id: &str) -> Result<(), String> {
    let (root, is_saved) = {
        let guard = ctx.borrow();
        let card = guard
            .cards
            .get(ad_id)
            .ok_or_else(|| format!("ad {ad_id} is not tracked"))?;
        (card.anchor.clone(), card.is_saved)
    };

    let button = ui::create_html("button")?;
    button.set_class_name(ui::SAVE_BUTTON_CLASS);
    ui::set_styles(
        &button,
        &[
            ("margin", "4px"),
            ("border", "1px solid #ccc"),
            ("padding", "4px 8px"),
            ("cursor", "pointer"),
            ("border-radius", "4px"),
            ("font-size", "12px"),
            ("min-width", "80px"),
            ("text-align", "center"),
            ("transition", "all 0.2s ease"),
        ],
    );
    paint_idle(&button, is_saved);

    let click = {
        let ctx = ctx.clone();
        let ad_id = ad_id.to_string();
        let button = button.clone();
        Closure::<dyn FnMut(MouseEvent)>::new(move |_event: MouseEvent| {
            let ctx = ctx.clone();
            let ad_id = ad_id.clone();
            let button = button.clone();
            spawn_local(async move {
                toggle(ctx, ad_id, button).await;
            });
        })
    };
    button
        .add_event_listener_with_callback("click", click.as_ref().unchecked_ref())
        .map_err(|err| format!("failed to wire save button: {err:?}"))?;
    click.forget();

    root.append_child(&button)
        .map_err(|err| format!("failed to insert save button: {err:?}"))?;
    Ok(())
}

async fn toggle(ctx: SharedContext, ad_id: String, button: HtmlElement) {
    let was_saved = match ctx.borrow().cards.get(&ad_id) {
        Some(card) => card.is_saved,
        None => return,
    };

    if was_saved {
        paint_busy(&button, "Unsaving...");
        let ack = runtime::send_for_ack(&RuntimeRequest::UnsaveAd {
            ad_id: ad_id.clone(),
        })
        .await;
        if ack.success {
            {
                let mut guard = ctx.borrow_mut();
                let ContentContext { store, cards } = &mut *guard;
                if let Some(card) = cards.get_mut(&ad_id) {
                    card.is_saved = false;
                    card.tags.clear();
                }
                store.mark_unsaved(&ad_id);
            }
            paint_idle(&button, false);
        } else {
            error!("Unsave failed for ad {ad_id}: {:?}", ack.error);
            paint_idle(&button, true);
        }
    } else {
        paint_busy(&button, "Saving...");
        let request = match save_request(&ctx, &ad_id) {
            Ok(request) => request,
            Err(err) => {
                warn!("cannot build save request: {err}");
                paint_idle(&button, false);
                return;
            }
        };
        let ack = runtime::send_for_ack(&request).await;
        if ack.success {
            {
                let mut guard = ctx.borrow_mut();
                let ContentContext { store, cards } = &mut *guard;
                if let Some(card) = cards.get_mut(&ad_id) {
                    card.is_saved = true;
                    store.mark_saved(&ad_id, &card.tags);
                }
            }
            paint_idle(&button, true);
        } else {
            error!("Save failed for ad {ad_id}: {:?}", ack.error);
            paint_idle(&button, false);
        }
    }
}

/// Build the save request from the card's current state and the page URL.
/// Shared with the tag editor, whose mutations on unsaved cards save them
/// implicitly.
pub(crate) fn save_request(
    ctx: &SharedContext,
    ad_id: &str,
) -> Result<RuntimeRequest, String> {
    let guard = ctx.borrow();
    let card = guard
        .cards
        .get(ad_id)
        .ok_or_else(|| format!("ad {ad_id} is not tracked"))?;
    let (video_url, poster_url, img_url) = card.media_fields();
    Ok(RuntimeRequest::SaveAd {
        ad_id: ad_id.to_string(),
        video_url,
        poster_url,
        img_url,
        query_params: runtime::page_query_params(),
        full_text: card.anchor.text_content().unwrap_or_default(),
        tags: card.tags.iter().cloned().collect(),
    })
}

/// Repaint the card's save button after a state change made elsewhere
/// (the tag editor's implicit save).
pub(crate) fn refresh_button(root: &Element, is_saved: bool) {
    if let Ok(Some(button)) = root.query_selector(&ui::save_button_selector()) {
        if let Some(button) = button.dyn_ref::<HtmlElement>() {
            paint_idle(button, is_saved);
        }
    }
}

fn paint_idle(button: &HtmlElement, is_saved: bool) {
    if is_saved {
        button.set_text_content(Some("Saved ✓"));
        ui::set_styles(button, &[("background-color", "lightgreen"), ("color", "black")]);
    } else {
        button.set_text_content(Some("Save ad"));
        ui::set_styles(button, &[("background-color", "lightblue"), ("color", "black")]);
    }
}

fn paint_busy(button: &HtmlElement, label: &str) {
    button.set_text_content(Some(label));
    ui::set_styles(button, &[("background-color", "lightgray"), ("color", "black")]);
}
