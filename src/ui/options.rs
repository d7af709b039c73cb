//! Options page: edits the API token and backend base URL that every
//! backend operation depends on.

use patternfly_yew::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::HtmlInputElement;
use yew::prelude::*;

use crate::config::{STORAGE_KEY_API_TOKEN, STORAGE_KEY_BACKEND_URL};
use crate::runtime;

#[wasm_bindgen(module = "/js/storage.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn getStorage(key: &str) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn setStorage(key: &str, value: JsValue) -> Result<(), JsValue>;
}

#[function_component(OptionsApp)]
pub fn options_app() -> Html {
    let api_token = use_state(String::new);
    let base_url = use_state(String::new);
    let status = use_state(|| None::<String>);

    // Load the existing configuration on mount.
    {
        let api_token = api_token.clone();
        let base_url = base_url.clone();
        use_effect_with((), move |_| {
            spawn_local(async move {
                if let Ok(value) = getStorage(STORAGE_KEY_API_TOKEN).await {
                    if let Some(value) = value.as_string() {
                        api_token.set(value);
                    }
                }
                if let Ok(value) = getStorage(STORAGE_KEY_BACKEND_URL).await {
                    if let Some(value) = value.as_string() {
                        base_url.set(value);
                    }
                }
            });
            || ()
        });
    }

    let on_token_input = {
        let api_token = api_token.clone();
        Callback::from(move |event: InputEvent| {
            if let Some(input) = event.target_dyn_into::<HtmlInputElement>() {
                api_token.set(input.value());
            }
        })
    };

    let on_url_input = {
        let base_url = base_url.clone();
        Callback::from(move |event: InputEvent| {
            if let Some(input) = event.target_dyn_into::<HtmlInputElement>() {
                base_url.set(input.value());
            }
        })
    };

    let save = {
        let api_token = api_token.clone();
        let base_url = base_url.clone();
        let status = status.clone();
        move || {
            persist((*api_token).clone(), (*base_url).clone(), status.clone());
        }
    };

    let on_save = {
        let save = save.clone();
        Callback::from(move |_: MouseEvent| save())
    };

    // Enter in either field saves, like clicking the button.
    let on_keydown = {
        let save = save.clone();
        Callback::from(move |event: KeyboardEvent| {
            if event.key() == "Enter" {
                save();
            }
        })
    };

    html! {
        <div class="options-page">
            <h1 class="options-title">{"Ad Stash"}</h1>

            if let Some(message) = (*status).clone() {
                <Alert r#type={AlertType::Success} title={message} inline={true}>
                </Alert>
            }

            <div class="options-field">
                <label for="api-token">{"API token"}</label>
                <input
                    id="api-token"
                    type="password"
                    value={(*api_token).clone()}
                    oninput={on_token_input}
                    onkeydown={on_keydown.clone()}
                />
            </div>

            <div class="options-field">
                <label for="backend-url">{"Backend URL"}</label>
                <input
                    id="backend-url"
                    type="text"
                    placeholder="https://backend.example"
                    value={(*base_url).clone()}
                    oninput={on_url_input}
                    onkeydown={on_keydown}
                />
            </div>

            <Button onclick={on_save} variant={ButtonVariant::Primary}>
                {"Save"}
            </Button>

            <p class="options-footer">
                {"Both values are required before ads can be saved."}
            </p>
        </div>
    }
}

fn persist(api_token: String, base_url: String, status: UseStateHandle<Option<String>>) {
    spawn_local(async move {
        let token_result = setStorage(STORAGE_KEY_API_TOKEN, JsValue::from_str(&api_token)).await;
        let url_result = setStorage(STORAGE_KEY_BACKEND_URL, JsValue::from_str(&base_url)).await;
        match (token_result, url_result) {
            (Ok(()), Ok(())) => {
                status.set(Some("Configuration saved!".to_string()));
                clear_status_later(status.clone());
            }
            (token_result, url_result) => {
                log::error!(
                    "failed to persist configuration: {token_result:?} {url_result:?}"
                );
                status.set(Some("Failed to save configuration".to_string()));
            }
        }
    });
}

fn clear_status_later(status: UseStateHandle<Option<String>>) {
    let clear = Closure::<dyn FnMut()>::new(move || status.set(None));
    if let Ok(window) = runtime::window() {
        let _ = window.set_timeout_with_callback_and_timeout_and_arguments_0(
            clear.as_ref().unchecked_ref(),
            3_000,
        );
    }
    clear.forget();
}
