//! Live-DOM discovery of ad cards.
//!
//! Cards are found by locating the localized "see details" buttons, then
//! walking ancestors until the element carrying exactly one
//! "Library ID: <digits>" label is reached; that element roots the card.
//! Media URLs are extracted best-effort with a chain of fallbacks and a
//! short polling retry, since the page loads media lazily.

use log::debug;
use wasm_bindgen::JsCast;
use web_sys::{Element, HtmlImageElement, HtmlMediaElement, HtmlSourceElement, HtmlVideoElement};

use crate::ad_data::{AdCard, MediaRef};
use crate::content::SharedContext;
use crate::matching::{self, ScopeMatch};
use crate::runtime;

/// How many times a failed media extraction is retried.
pub const MEDIA_RETRY_ATTEMPTS: u32 = 5;
/// Delay between media extraction retries, in milliseconds.
pub const MEDIA_RETRY_DELAY_MS: i32 = 200;

const CLICKABLE_SELECTOR: &str = "button, a, [role=\"button\"]";

/// Scan the page for ad cards and register every new one. Already-tracked
/// ids are skipped, so repeated scans are cheap and never duplicate.
pub async fn find_ad_cards(ctx: &SharedContext) -> Result<(), String> {
    let document = runtime::document()?;
    let clickables = document
        .query_selector_all(CLICKABLE_SELECTOR)
        .map_err(|err| format!("querySelectorAll failed: {err:?}"))?;

    for index in 0..clickables.length() {
        let Some(node) = clickables.get(index) else {
            continue;
        };
        let Some(button) = node.dyn_ref::<Element>() else {
            continue;
        };
        let text = button.text_content().unwrap_or_default();
        if !matching::is_detail_button_text(&text) {
            continue;
        }

        let Some((root, ad_id)) = locate_card_root(button) else {
            debug!("no library id found above detail button");
            continue;
        };
        if ctx.borrow().cards.contains(&ad_id) {
            continue;
        }

        let media = extract_media(&root, &ad_id).await;
        debug!(
            "tracking ad {ad_id} (media: {})",
            media.as_ref().map_or("none", |_| "found")
        );
        ctx.borrow_mut()
            .cards
            .insert(AdCard::new(ad_id, root, media));
    }
    Ok(())
}

/// Walk up from a detail button to the element rooting its card. An
/// ancestor whose text holds more than one library id spans several cards
/// and aborts the walk.
fn locate_card_root(button: &Element) -> Option<(Element, String)> {
    let mut current = Some(button.clone());
    while let Some(element) = current {
        if is_page_body(&element) {
            break;
        }
        let text = element.text_content().unwrap_or_default();
        let ids = matching::library_ids(&text);
        match ids.as_slice() {
            [] => {}
            [only] => return Some((element.clone(), only.clone())),
            _ => return None,
        }
        current = element.parent_element();
    }
    None
}

/// Best-effort media extraction for a card: video first, image otherwise.
async fn extract_media(root: &Element, ad_id: &str) -> Option<MediaRef> {
    if let Some(media) = find_video(root, ad_id).await {
        return Some(media);
    }
    find_image(root, ad_id).await
}

async fn find_video(root: &Element, target_id: &str) -> Option<MediaRef> {
    let mut current = Some(root.clone());
    while let Some(element) = current {
        if is_page_body(&element) {
            break;
        }
        let text = element.text_content().unwrap_or_default();
        match matching::classify_scope(&text, target_id) {
            ScopeMatch::Ambiguous | ScopeMatch::Foreign => break,
            ScopeMatch::Target => {
                if let Ok(Some(video)) = element.query_selector("video") {
                    // Whatever the retry yields is final for this card.
                    return extract_with_retry(&video, extract_video_url).await;
                }
            }
            ScopeMatch::None => {}
        }
        current = element.parent_element();
    }
    None
}

async fn find_image(root: &Element, target_id: &str) -> Option<MediaRef> {
    let mut current = Some(root.clone());
    while let Some(element) = current {
        if is_page_body(&element) {
            break;
        }
        let text = element.text_content().unwrap_or_default();
        match matching::classify_scope(&text, target_id) {
            ScopeMatch::Ambiguous | ScopeMatch::Foreign => break,
            ScopeMatch::Target => {
                let images = element
                    .query_selector_all("img")
                    .map_err(|err| format!("img query failed: {err:?}"))
                    .ok()?;
                if images.length() > 0 {
                    // The last image tends to be the creative; earlier ones
                    // are avatars and icons.
                    let last = images.get(images.length() - 1)?;
                    let image = last.dyn_into::<Element>().ok()?;
                    return extract_with_retry(&image, extract_image_url).await;
                }
            }
            ScopeMatch::None => {}
        }
        current = element.parent_element();
    }
    None
}

/// Run one extraction, then poll a few times to tolerate media that has
/// not finished loading.
async fn extract_with_retry(
    element: &Element,
    extract: fn(&Element) -> Option<MediaRef>,
) -> Option<MediaRef> {
    if let Some(media) = extract(element) {
        return Some(media);
    }
    for _ in 0..MEDIA_RETRY_ATTEMPTS {
        runtime::sleep_ms(MEDIA_RETRY_DELAY_MS).await;
        if let Some(media) = extract(element) {
            return Some(media);
        }
    }
    None
}

/// Video URL fallback chain: src property, src attribute, currentSrc, raw
/// attribute scan, markup regex, nested `<source>` children.
fn extract_video_url(element: &Element) -> Option<MediaRef> {
    let poster = element
        .dyn_ref::<HtmlVideoElement>()
        .map(|video| video.poster())
        .filter(|poster| !poster.is_empty())
        .or_else(|| element.get_attribute("poster"));

    if let Some(media) = element.dyn_ref::<HtmlMediaElement>() {
        if !media.src().is_empty() {
            return Some(MediaRef::video(media.src(), poster));
        }
    }
    if let Some(src) = element.get_attribute("src").filter(|src| !src.is_empty()) {
        return Some(MediaRef::video(src, poster));
    }
    if let Some(media) = element.dyn_ref::<HtmlMediaElement>() {
        if !media.current_src().is_empty() {
            return Some(MediaRef::video(media.current_src(), poster));
        }
    }
    if let Some(src) = attribute_scan(element, "src") {
        return Some(MediaRef::video(src, poster));
    }
    if let Some(src) = matching::src_from_markup(&element.outer_html()) {
        return Some(MediaRef::video(src, poster));
    }

    let sources = element.get_elements_by_tag_name("source");
    if sources.length() > 0 {
        if let Some(source) = sources.item(0) {
            let src = source
                .dyn_ref::<HtmlSourceElement>()
                .map(|s| s.src())
                .filter(|src| !src.is_empty())
                .or_else(|| source.get_attribute("src"));
            if let Some(src) = src {
                return Some(MediaRef::video(src, poster));
            }
        }
    }
    None
}

/// Image URL fallback chain: src property, src attribute, raw attribute
/// scan, markup regex.
fn extract_image_url(element: &Element) -> Option<MediaRef> {
    if let Some(image) = element.dyn_ref::<HtmlImageElement>() {
        if !image.src().is_empty() {
            return Some(MediaRef::image(image.src()));
        }
    }
    if let Some(src) = element.get_attribute("src").filter(|src| !src.is_empty()) {
        return Some(MediaRef::image(src));
    }
    if let Some(src) = attribute_scan(element, "src") {
        return Some(MediaRef::image(src));
    }
    matching::src_from_markup(&element.outer_html()).map(MediaRef::image)
}

fn attribute_scan(element: &Element, name: &str) -> Option<String> {
    let attributes = element.attributes();
    for index in 0..attributes.length() {
        if let Some(attr) = attributes.item(index) {
            if attr.name() == name && !attr.value().is_empty() {
                return Some(attr.value());
            }
        }
    }
    None
}

fn is_page_body(element: &Element) -> bool {
    runtime::document()
        .ok()
        .and_then(|document| document.body())
        .is_some_and(|body| {
            let body: &web_sys::Node = body.as_ref();
            body.is_same_node(Some(element.as_ref()))
        })
}
