//! The per-card tag editor: a selected-tags row that opens a dropdown
//! with live search, an "add new tag" affordance, and one-click removal.
//!
//! Every tag mutation syncs to the backend immediately. A mutation on a
//! card that is not saved yet sends a save with the current tags, which
//! marks the card saved on success; mutations on saved cards send a tag
//! update instead.

use log::error;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::Closure;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Event, HtmlElement, HtmlInputElement, KeyboardEvent, MouseEvent};

use crate::content::{ContentContext, SharedContext};
use crate::messages::RuntimeRequest;
use crate::runtime;
use crate::ui::{self, save_button};

/// Handles to the editor's pieces, cloned into every event closure.
#[derive(Clone)]
struct EditorUi {
    container: HtmlElement,
    selected: HtmlElement,
    dropdown: HtmlElement,
    input: HtmlInputElement,
    add_button: HtmlElement,
    list: HtmlElement,
}

pub fn attach(ctx: &SharedContext, ad_id: &str) -> Result<(), String> {
    let root = {
        let guard = ctx.borrow();
        guard
            .cards
            .get(ad_id)
            .ok_or_else(|| format!("ad {ad_id} is not tracked"))?
            .anchor
            .clone()
    };

    let editor = build_editor()?;
    render_selected(ctx, ad_id, &editor);
    render_candidates(ctx, ad_id, &editor, "");
    wire_open_close(ctx, ad_id, &editor)?;
    wire_search(ctx, ad_id, &editor)?;
    wire_add_button(ctx, ad_id, &editor)?;
    wire_enter_key(ctx, ad_id, &editor)?;
    wire_click_outside(&editor)?;

    root.append_child(&editor.container)
        .map_err(|err| format!("failed to insert tag editor: {err:?}"))?;
    Ok(())
}

fn build_editor() -> Result<EditorUi, String> {
    let container = ui::create_html("div")?;
    container.set_class_name("ad-stash-tags");
    ui::set_styles(
        &container,
        &[
            ("margin", "4px"),
            ("position", "relative"),
            ("display", "inline-block"),
            ("min-width", "200px"),
        ],
    );

    let selected = ui::create_html("div")?;
    selected.set_class_name("ad-stash-tags-selected");
    ui::set_styles(
        &selected,
        &[
            ("border", "1px solid #ccc"),
            ("padding", "4px"),
            ("min-height", "24px"),
            ("background", "white"),
            ("cursor", "pointer"),
            ("border-radius", "4px"),
            ("display", "flex"),
            ("flex-wrap", "wrap"),
            ("gap", "2px"),
        ],
    );

    let dropdown = ui::create_html("div")?;
    dropdown.set_class_name("ad-stash-tags-dropdown");
    ui::set_styles(
        &dropdown,
        &[
            ("display", "none"),
            ("position", "absolute"),
            ("background-color", "white"),
            ("min-width", "100%"),
            ("box-shadow", "0px 8px 16px 0px rgba(0,0,0,0.2)"),
            ("z-index", "1000"),
            ("border", "1px solid #ccc"),
            ("border-radius", "4px"),
            ("max-height", "200px"),
            ("overflow-y", "auto"),
        ],
    );

    let input = ui::create_input()?;
    input.set_placeholder("Search tags or add new...");
    ui::set_styles(
        &input,
        &[
            ("width", "100%"),
            ("padding", "8px"),
            ("border", "none"),
            ("border-bottom", "1px solid #eee"),
            ("outline", "none"),
        ],
    );

    let add_button = ui::create_html("button")?;
    add_button.set_text_content(Some("Add New Tag"));
    ui::set_styles(
        &add_button,
        &[
            ("width", "100%"),
            ("padding", "8px"),
            ("border", "none"),
            ("background-color", "#4CAF50"),
            ("color", "white"),
            ("cursor", "pointer"),
            ("border-bottom", "1px solid #eee"),
            ("display", "none"),
        ],
    );

    let list = ui::create_html("div")?;
    list.set_class_name("ad-stash-tags-list");

    append(&dropdown, &input)?;
    append(&dropdown, &add_button)?;
    append(&dropdown, &list)?;
    append(&container, &selected)?;
    append(&container, &dropdown)?;

    Ok(EditorUi {
        container,
        selected,
        dropdown,
        input,
        add_button,
        list,
    })
}

/// Rebuild the selected-tags row: chips with inline removal, or the
/// placeholder when the card has no tags.
fn render_selected(ctx: &SharedContext, ad_id: &str, editor: &EditorUi) {
    editor.selected.set_inner_html("");
    let tags = ctx
        .borrow()
        .cards
        .get(ad_id)
        .map(|card| card.tags.clone())
        .unwrap_or_default();

    if tags.is_empty() {
        if let Ok(placeholder) = ui::create_html("span") {
            placeholder.set_text_content(Some("Click to select tags..."));
            ui::set_styles(&placeholder, &[("color", "#999")]);
            let _ = editor.selected.append_child(&placeholder);
        }
        return;
    }

    for tag in tags {
        let Ok(chip) = ui::create_html("span") else {
            continue;
        };
        ui::set_styles(
            &chip,
            &[
                ("background-color", "#e1f5fe"),
                ("color", "#01579b"),
                ("padding", "2px 8px"),
                ("border-radius", "12px"),
                ("font-size", "12px"),
                ("display", "inline-flex"),
                ("align-items", "center"),
                ("margin", "1px"),
            ],
        );
        chip.set_text_content(Some(&tag));

        let Ok(remove) = ui::create_html("span") else {
            continue;
        };
        remove.set_text_content(Some("×"));
        ui::set_styles(
            &remove,
            &[
                ("margin-left", "4px"),
                ("cursor", "pointer"),
                ("font-weight", "bold"),
            ],
        );

        let on_remove = {
            let ctx = ctx.clone();
            let ad_id = ad_id.to_string();
            let editor = editor.clone();
            let tag = tag.clone();
            Closure::<dyn FnMut(MouseEvent)>::new(move |event: MouseEvent| {
                event.stop_propagation();
                {
                    let mut guard = ctx.borrow_mut();
                    let Some(card) = guard.cards.get_mut(&ad_id) else {
                        return;
                    };
                    if !card.tags.remove(&tag) {
                        return;
                    }
                }
                render_selected(&ctx, &ad_id, &editor);
                render_candidates(&ctx, &ad_id, &editor, "");
                sync_tags(&ctx, &ad_id);
            })
        };
        if remove
            .add_event_listener_with_callback("click", on_remove.as_ref().unchecked_ref())
            .is_ok()
        {
            on_remove.forget();
        }

        let _ = chip.append_child(&remove);
        let _ = editor.selected.append_child(&chip);
    }
}

/// Rebuild the dropdown's candidate list: every known tag not on the
/// card, filtered by the search text.
fn render_candidates(ctx: &SharedContext, ad_id: &str, editor: &EditorUi, query: &str) {
    editor.list.set_inner_html("");
    let candidates = {
        let guard = ctx.borrow();
        let assigned = guard
            .cards
            .get(ad_id)
            .map(|card| card.tags.clone())
            .unwrap_or_default();
        guard.store.candidate_tags(&assigned, query)
    };

    if candidates.is_empty() && !query.is_empty() {
        if let Ok(empty) = ui::create_html("div") {
            empty.set_text_content(Some("No matching tags found"));
            ui::set_styles(
                &empty,
                &[
                    ("padding", "8px"),
                    ("color", "#999"),
                    ("font-style", "italic"),
                    ("text-align", "center"),
                ],
            );
            let _ = editor.list.append_child(&empty);
        }
        return;
    }

    for tag in candidates {
        let Ok(item) = ui::create_html("div") else {
            continue;
        };
        item.set_text_content(Some(&tag));
        ui::set_styles(
            &item,
            &[
                ("padding", "8px"),
                ("cursor", "pointer"),
                ("border-bottom", "1px solid #eee"),
            ],
        );

        let hover_on = {
            let item = item.clone();
            Closure::<dyn FnMut(MouseEvent)>::new(move |_event: MouseEvent| {
                ui::set_styles(&item, &[("background-color", "#f5f5f5")]);
            })
        };
        let hover_off = {
            let item = item.clone();
            Closure::<dyn FnMut(MouseEvent)>::new(move |_event: MouseEvent| {
                ui::set_styles(&item, &[("background-color", "white")]);
            })
        };
        if item
            .add_event_listener_with_callback("mouseover", hover_on.as_ref().unchecked_ref())
            .is_ok()
        {
            hover_on.forget();
        }
        if item
            .add_event_listener_with_callback("mouseout", hover_off.as_ref().unchecked_ref())
            .is_ok()
        {
            hover_off.forget();
        }

        let on_pick = {
            let ctx = ctx.clone();
            let ad_id = ad_id.to_string();
            let editor = editor.clone();
            let tag = tag.clone();
            Closure::<dyn FnMut(MouseEvent)>::new(move |_event: MouseEvent| {
                add_tag(&ctx, &ad_id, &editor, tag.clone());
            })
        };
        if item
            .add_event_listener_with_callback("click", on_pick.as_ref().unchecked_ref())
            .is_ok()
        {
            on_pick.forget();
        }

        let _ = editor.list.append_child(&item);
    }
}

/// Assign a tag to the card, refresh the editor, and sync the backend.
/// The dropdown stays open so several tags can be picked in a row.
fn add_tag(ctx: &SharedContext, ad_id: &str, editor: &EditorUi, tag: String) {
    {
        let mut guard = ctx.borrow_mut();
        let ContentContext { store, cards } = &mut *guard;
        let Some(card) = cards.get_mut(ad_id) else {
            return;
        };
        if !card.tags.insert(tag.clone()) {
            return;
        }
        store.note_tag(&tag);
    }
    editor.input.set_value("");
    ui::set_styles(&editor.add_button, &[("display", "none")]);
    render_selected(ctx, ad_id, editor);
    render_candidates(ctx, ad_id, editor, "");
    sync_tags(ctx, ad_id);
}

/// Push the card's tag set to the backend. An unsaved card is saved with
/// its current tags (and becomes saved on success); a saved card gets a
/// tag update.
fn sync_tags(ctx: &SharedContext, ad_id: &str) {
    let ctx = ctx.clone();
    let ad_id = ad_id.to_string();
    spawn_local(async move {
        let (was_saved, root) = {
            let guard = ctx.borrow();
            let Some(card) = guard.cards.get(&ad_id) else {
                return;
            };
            (card.is_saved, card.anchor.clone())
        };

        let request = if was_saved {
            let tags: Vec<String> = ctx
                .borrow()
                .cards
                .get(&ad_id)
                .map(|card| card.tags.iter().cloned().collect())
                .unwrap_or_default();
            RuntimeRequest::UpdateAdTags {
                ad_id: ad_id.clone(),
                tags,
            }
        } else {
            match save_button::save_request(&ctx, &ad_id) {
                Ok(request) => request,
                Err(err) => {
                    error!("cannot build tag sync request: {err}");
                    return;
                }
            }
        };

        let ack = runtime::send_for_ack(&request).await;
        if !ack.success {
            error!("tag sync failed for ad {ad_id}: {:?}", ack.error);
            return;
        }

        {
            let mut guard = ctx.borrow_mut();
            let ContentContext { store, cards } = &mut *guard;
            if let Some(card) = cards.get_mut(&ad_id) {
                card.is_saved = true;
                store.mark_saved(&ad_id, &card.tags);
            }
        }
        if !was_saved {
            // The mutation saved the card implicitly; reflect it.
            save_button::refresh_button(&root, true);
        }
    });
}

fn wire_open_close(ctx: &SharedContext, ad_id: &str, editor: &EditorUi) -> Result<(), String> {
    let on_click = {
        let ctx = ctx.clone();
        let ad_id = ad_id.to_string();
        let editor = editor.clone();
        Closure::<dyn FnMut(MouseEvent)>::new(move |_event: MouseEvent| {
            let opening = editor
                .dropdown
                .style()
                .get_property_value("display")
                .map(|display| display != "block")
                .unwrap_or(true);
            ui::set_styles(
                &editor.dropdown,
                &[("display", if opening { "block" } else { "none" })],
            );
            if opening {
                render_selected(&ctx, &ad_id, &editor);
                render_candidates(&ctx, &ad_id, &editor, "");
                editor.input.set_value("");
                ui::set_styles(&editor.add_button, &[("display", "none")]);
                let _ = editor.input.focus();
            }
        })
    };
    editor
        .selected
        .add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref())
        .map_err(|err| format!("failed to wire dropdown toggle: {err:?}"))?;
    on_click.forget();
    Ok(())
}

fn wire_search(ctx: &SharedContext, ad_id: &str, editor: &EditorUi) -> Result<(), String> {
    let on_input = {
        let ctx = ctx.clone();
        let ad_id = ad_id.to_string();
        let editor = editor.clone();
        Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
            let query = editor.input.value().trim().to_string();
            render_candidates(&ctx, &ad_id, &editor, &query);

            let offer_new = {
                let guard = ctx.borrow();
                let assigned = guard
                    .cards
                    .get(&ad_id)
                    .map(|card| card.tags.clone())
                    .unwrap_or_default();
                guard.store.can_add_new(&assigned, &query)
            };
            if offer_new {
                editor
                    .add_button
                    .set_text_content(Some(&format!("Add \"{query}\"")));
                ui::set_styles(&editor.add_button, &[("display", "block")]);
            } else {
                ui::set_styles(&editor.add_button, &[("display", "none")]);
            }
        })
    };
    editor
        .input
        .add_event_listener_with_callback("input", on_input.as_ref().unchecked_ref())
        .map_err(|err| format!("failed to wire tag search: {err:?}"))?;
    on_input.forget();
    Ok(())
}

fn wire_add_button(ctx: &SharedContext, ad_id: &str, editor: &EditorUi) -> Result<(), String> {
    let on_click = {
        let ctx = ctx.clone();
        let ad_id = ad_id.to_string();
        let editor = editor.clone();
        Closure::<dyn FnMut(MouseEvent)>::new(move |_event: MouseEvent| {
            commit_new_tag(&ctx, &ad_id, &editor);
        })
    };
    editor
        .add_button
        .add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref())
        .map_err(|err| format!("failed to wire add-tag button: {err:?}"))?;
    on_click.forget();
    Ok(())
}

/// Enter either selects the exact-matching known tag or falls through to
/// the add-new affordance.
fn wire_enter_key(ctx: &SharedContext, ad_id: &str, editor: &EditorUi) -> Result<(), String> {
    let on_key = {
        let ctx = ctx.clone();
        let ad_id = ad_id.to_string();
        let editor = editor.clone();
        Closure::<dyn FnMut(KeyboardEvent)>::new(move |event: KeyboardEvent| {
            if event.key() != "Enter" {
                return;
            }
            let typed = editor.input.value().trim().to_string();
            let exact = ctx.borrow().store.find_exact_tag(&typed);
            match exact {
                Some(tag) => {
                    let already = ctx
                        .borrow()
                        .cards
                        .get(&ad_id)
                        .is_some_and(|card| card.tags.contains(&tag));
                    if !already {
                        add_tag(&ctx, &ad_id, &editor, tag);
                    }
                }
                None => commit_new_tag(&ctx, &ad_id, &editor),
            }
        })
    };
    editor
        .input
        .add_event_listener_with_callback("keydown", on_key.as_ref().unchecked_ref())
        .map_err(|err| format!("failed to wire enter key: {err:?}"))?;
    on_key.forget();
    Ok(())
}

fn wire_click_outside(editor: &EditorUi) -> Result<(), String> {
    let on_document_click = {
        let editor = editor.clone();
        Closure::<dyn FnMut(MouseEvent)>::new(move |event: MouseEvent| {
            let inside = event
                .target()
                .and_then(|target| target.dyn_into::<web_sys::Node>().ok())
                .is_some_and(|node| editor.container.contains(Some(&node)));
            if !inside {
                ui::set_styles(&editor.dropdown, &[("display", "none")]);
            }
        })
    };
    runtime::document()?
        .add_event_listener_with_callback("click", on_document_click.as_ref().unchecked_ref())
        .map_err(|err| format!("failed to wire click-outside close: {err:?}"))?;
    on_document_click.forget();
    Ok(())
}

fn commit_new_tag(ctx: &SharedContext, ad_id: &str, editor: &EditorUi) {
    let typed = editor.input.value().trim().to_string();
    let allowed = {
        let guard = ctx.borrow();
        let assigned = guard
            .cards
            .get(ad_id)
            .map(|card| card.tags.clone())
            .unwrap_or_default();
        guard.store.can_add_new(&assigned, &typed)
    };
    if allowed {
        add_tag(ctx, ad_id, editor, typed);
    }
}

fn append(parent: &HtmlElement, child: &HtmlElement) -> Result<(), String> {
    parent
        .append_child(child)
        .map(|_| ())
        .map_err(|err| format!("failed to assemble tag editor: {err:?}"))
}
