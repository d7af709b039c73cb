//! Injected UI: the save toggle and tag editor added to each ad card,
//! plus the extension's own options page.

pub mod options;
pub mod save_button;
pub mod tag_editor;

use log::{debug, warn};
use wasm_bindgen::JsCast;
use web_sys::{HtmlElement, HtmlInputElement};

use crate::content::{ContentContext, SharedContext};
use crate::runtime;
use crate::scanner;

/// Marker class of the injected save button; a card containing one is
/// already decorated and is skipped on later passes.
pub const SAVE_BUTTON_CLASS: &str = "ad-stash-save";

pub(crate) fn save_button_selector() -> String {
    format!(".{SAVE_BUTTON_CLASS}")
}

/// Rescan the page, then decorate every tracked card that does not carry
/// the UI yet. Idempotent, so overlapping passes are benign.
pub async fn insert_save_buttons(ctx: &SharedContext) -> Result<(), String> {
    scanner::find_ad_cards(ctx).await?;

    let ids = ctx.borrow().cards.ids();
    if ids.is_empty() {
        debug!("no ad cards found to decorate");
        return Ok(());
    }

    for ad_id in ids {
        let root = match ctx.borrow().cards.get(&ad_id) {
            Some(card) => card.anchor.clone(),
            None => continue,
        };
        let decorated = root
            .query_selector(&save_button_selector())
            .map_err(|err| format!("marker lookup failed: {err:?}"))?
            .is_some();
        if decorated {
            continue;
        }

        // Seed the card from the store before building its controls.
        {
            let mut guard = ctx.borrow_mut();
            let ContentContext { store, cards } = &mut *guard;
            if let Some(card) = cards.get_mut(&ad_id) {
                card.is_saved = store.is_saved(&ad_id);
                card.tags = store.tags_for(&ad_id).cloned().unwrap_or_default();
            }
        }

        // One broken card must not stop the others from being decorated.
        let attached = tag_editor::attach(ctx, &ad_id)
            .and_then(|_| save_button::attach(ctx, &ad_id));
        if let Err(err) = attached {
            warn!("failed to decorate ad {ad_id}: {err}");
        }
    }
    Ok(())
}

pub(crate) fn create_html(tag: &str) -> Result<HtmlElement, String> {
    runtime::document()?
        .create_element(tag)
        .map_err(|err| format!("failed to create <{tag}>: {err:?}"))?
        .dyn_into::<HtmlElement>()
        .map_err(|_| format!("<{tag}> is not an HtmlElement"))
}

pub(crate) fn create_input() -> Result<HtmlInputElement, String> {
    runtime::document()?
        .create_element("input")
        .map_err(|err| format!("failed to create <input>: {err:?}"))?
        .dyn_into::<HtmlInputElement>()
        .map_err(|_| "<input> is not an HtmlInputElement".to_string())
}

pub(crate) fn set_styles(element: &HtmlElement, styles: &[(&str, &str)]) {
    let style = element.style();
    for (property, value) in styles {
        let _ = style.set_property(property, value);
    }
}
