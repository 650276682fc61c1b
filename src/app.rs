use leptos::task::spawn_local;

use leptos::prelude::*;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use leptos::web_sys::{
    Element, HashChangeEvent, KeyboardEvent, Response, ScrollBehavior, ScrollToOptions,
};

use crate::viewer_core::{
    group_episodes, is_text_entry_tag, notes_view, resolve_hash, Manifest, NotesView, ViewState,
};

async fn fetch_manifest() -> Result<Manifest, JsValue> {
    let response = JsFuture::from(window().fetch_with_str("strips.json")).await?;
    let response: Response = response.dyn_into()?;
    if !response.ok() {
        return Err(JsValue::from_str(&format!(
            "strips.json returned status {}",
            response.status()
        )));
    }
    let json = JsFuture::from(response.json()?).await?;
    serde_wasm_bindgen::from_value(json).map_err(|err| JsValue::from_str(&err.to_string()))
}

/// Fetches a notes document, folding every failure mode into `None`.
/// Notes are a non-critical enhancement; the caller hides the panel.
async fn fetch_text(url: &str) -> Option<String> {
    let response = JsFuture::from(window().fetch_with_str(url)).await.ok()?;
    let response: Response = response.dyn_into().ok()?;
    if !response.ok() {
        return None;
    }
    let body = JsFuture::from(response.text().ok()?).await.ok()?;
    body.as_string()
}

fn scroll_to_top() {
    let options = ScrollToOptions::new();
    options.set_top(0.0);
    options.set_behavior(ScrollBehavior::Smooth);
    window().scroll_to_with_scroll_to_options(&options);
}

#[component]
pub fn App() -> impl IntoView {
    let (manifest, set_manifest) = signal(None::<Manifest>);
    let (current, set_current) = signal(0usize);
    let (notes_html, set_notes_html) = signal(None::<String>);
    // Monotonic sequence for notes fetches so a stale response can never
    // overwrite the notes of a strip navigated to later.
    let notes_seq = StoredValue::new(0u64);

    Effect::new(move |_| {
        spawn_local(async move {
            match fetch_manifest().await {
                Ok(m) if m.strips.is_empty() => {
                    leptos::logging::error!("strips.json contains no strips");
                }
                Ok(m) => {
                    let hash = window().location().hash().unwrap_or_default();
                    set_current.set(resolve_hash(&m.strips, &hash).unwrap_or(0));
                    set_manifest.set(Some(m));
                }
                Err(err) => {
                    leptos::logging::error!("failed to load strips.json: {err:?}");
                }
            }
        });
    });

    let navigate = move |dir: i32| {
        let Some(m) = manifest.get_untracked() else {
            return;
        };
        let state = ViewState {
            index: current.get_untracked(),
            total: m.strips.len(),
        };
        let Some(next) = state.step(dir) else {
            return;
        };
        set_current.set(next.index);
        // Writing the fragment re-enters via hashchange; the handler
        // short-circuits because the index already matches.
        let _ = window().location().set_hash(&m.strips[next.index].id);
        scroll_to_top();
    };

    let hash_closure = Closure::<dyn FnMut(HashChangeEvent)>::new(move |_: HashChangeEvent| {
        let Some(m) = manifest.get_untracked() else {
            return;
        };
        let hash = window().location().hash().unwrap_or_default();
        let Some(target) = resolve_hash(&m.strips, &hash) else {
            return;
        };
        let state = ViewState {
            index: current.get_untracked(),
            total: m.strips.len(),
        };
        if let Some(next) = state.jump(target) {
            set_current.set(next.index);
        }
    });
    let _ = window()
        .add_event_listener_with_callback("hashchange", hash_closure.as_ref().unchecked_ref());
    hash_closure.forget();

    let key_closure = Closure::<dyn FnMut(KeyboardEvent)>::new(move |e: KeyboardEvent| {
        let tag = e
            .target()
            .and_then(|t| t.dyn_into::<Element>().ok())
            .map(|el| el.tag_name());
        if tag.as_deref().is_some_and(is_text_entry_tag) {
            return;
        }
        match e.key().as_str() {
            "ArrowLeft" => navigate(-1),
            "ArrowRight" => navigate(1),
            _ => {}
        }
    });
    let _ = document()
        .add_event_listener_with_callback("keydown", key_closure.as_ref().unchecked_ref());
    key_closure.forget();

    Effect::new(move |_| {
        let Some(m) = manifest.get() else {
            return;
        };
        let strip = m.strips[current.get()].clone();
        let seq = notes_seq.with_value(|s| *s) + 1;
        notes_seq.set_value(seq);
        match strip.notes_url() {
            None => set_notes_html.set(None),
            Some(url) => {
                let url = url.to_string();
                spawn_local(async move {
                    let body = fetch_text(&url).await;
                    if notes_seq.get_value() != seq {
                        return;
                    }
                    match notes_view(body.as_deref()) {
                        NotesView::Hidden => set_notes_html.set(None),
                        NotesView::Shown(html) => set_notes_html.set(Some(html)),
                    }
                });
            }
        }
    });

    view! {
        <main class="app-layout">
            {move || {
                manifest
                    .get()
                    .map(|m| {
                        let total = m.strips.len();
                        let subtitle = m.subtitle.clone();
                        let episodes = group_episodes(&m.strips);
                        let strips = m.strips.clone();
                        let current_strip = Memo::new(move |_| strips[current.get()].clone());
                        let state = move || ViewState {
                            index: current.get(),
                            total,
                        };
                        let counter = move || state().counter();
                        let index_view = episodes
                            .into_iter()
                            .map(|ep| {
                                let heading = ep.heading();
                                let links = ep
                                    .strips
                                    .into_iter()
                                    .map(|s| {
                                        let id = s.id.clone();
                                        let active = move || current_strip.get().id == id;
                                        view! {
                                            <a
                                                class="index-strip-link"
                                                class:active=active
                                                href=format!("#{}", s.id)
                                            >
                                                {s.title}
                                            </a>
                                        }
                                    })
                                    .collect::<Vec<_>>();
                                view! {
                                    <div class="index-episode">
                                        <div class="index-episode-title">{heading}</div>
                                        {links}
                                    </div>
                                }
                            })
                            .collect::<Vec<_>>();

                        view! {
                            <header class="site-header">
                                <h1 id="site-subtitle">
                                    <a href="#">{subtitle}</a>
                                </h1>
                            </header>
                            <section class="strip-viewer">
                                <img
                                    id="strip-image"
                                    src=move || current_strip.get().file
                                    alt=move || current_strip.get().title
                                />
                                <div class="strip-info">
                                    <div id="strip-episode">
                                        {move || current_strip.get().episode_label()}
                                    </div>
                                    <div id="strip-title">{move || current_strip.get().title}</div>
                                    <div id="strip-counter">{counter}</div>
                                </div>
                                <div class="strip-nav">
                                    <button
                                        class="nav-btn"
                                        prop:disabled=move || state().at_first()
                                        on:click=move |_| navigate(-1)
                                    >
                                        "\u{2039} Prev"
                                    </button>
                                    <button
                                        class="nav-btn"
                                        prop:disabled=move || state().at_last()
                                        on:click=move |_| navigate(1)
                                    >
                                        "Next \u{203a}"
                                    </button>
                                </div>
                            </section>
                            <aside
                                id="notes-section"
                                class:has-notes=move || notes_html.get().is_some()
                            >
                                <div
                                    id="notes-content"
                                    inner_html=move || notes_html.get().unwrap_or_default()
                                ></div>
                            </aside>
                            <nav id="index-content" class="strip-index">{index_view}</nav>
                            <footer class="site-footer">
                                <div id="footer-counter">{counter}</div>
                            </footer>
                        }
                    })
            }}
        </main>
    }
}
