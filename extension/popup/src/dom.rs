//! DOM rendering of [`PopupView`] and wiring of user input to [`Gesture`]s.
//!
//! The skeleton is built once; [`PopupDom::render`] only updates it. Input
//! listeners never touch the popup state directly, they queue gestures.

use std::cell::RefCell;

use futures::channel::mpsc::UnboundedSender;
use jarswap::protocol::SessionId;
use jarswap::{Gesture, Panel, PopupView};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, Event, EventTarget, HtmlButtonElement, HtmlElement, HtmlInputElement, KeyboardEvent};

const SKELETON: &str = r#"
<nav class="tabs">
  <button id="show-sessions" type="button">Sessions</button>
  <button id="show-settings" type="button">Settings</button>
</nav>
<div id="banner" class="banner" role="alert" hidden>
  <span id="banner-message"></span>
  <button id="banner-dismiss" type="button" title="Dismiss">&times;</button>
</div>
<section id="sessions-panel">
  <div class="create">
    <input id="session-name" type="text" placeholder="New session name" autocomplete="off">
    <button id="create-session" type="button" disabled>Create</button>
  </div>
  <p id="loading">Loading sessions&hellip;</p>
  <ul id="session-list"></ul>
</section>
<section id="settings-panel" hidden>
  <p>Active session: <strong id="active-name"></strong></p>
</section>
"#;

const ACTION_SELECT: &str = "select";
const ACTION_DELETE: &str = "delete";

pub struct PopupDom {
    document: Document,
    show_sessions: HtmlElement,
    show_settings: HtmlElement,
    banner: HtmlElement,
    banner_message: Element,
    sessions_panel: HtmlElement,
    settings_panel: HtmlElement,
    input: HtmlInputElement,
    create: HtmlButtonElement,
    loading: HtmlElement,
    list: Element,
    active_name: Element,
    /// Draft written by the last render, so typing is not overwritten.
    rendered_draft: RefCell<String>,
}

impl PopupDom {
    /// Builds the skeleton under `#app` (or `<body>`) and starts sending
    /// gestures to `gestures`.
    pub fn mount(gestures: UnboundedSender<Gesture>) -> Result<Self, JsValue> {
        let document = web_sys::window()
            .and_then(|window| window.document())
            .ok_or("no document")?;
        let root = document
            .get_element_by_id("app")
            .or_else(|| document.body().map(Element::from))
            .ok_or("no mount point")?;
        root.set_inner_html(SKELETON);

        let dom = Self {
            show_sessions: by_id(&document, "show-sessions")?,
            show_settings: by_id(&document, "show-settings")?,
            banner: by_id(&document, "banner")?,
            banner_message: by_id(&document, "banner-message")?,
            sessions_panel: by_id(&document, "sessions-panel")?,
            settings_panel: by_id(&document, "settings-panel")?,
            input: by_id(&document, "session-name")?,
            create: by_id(&document, "create-session")?,
            loading: by_id(&document, "loading")?,
            list: by_id(&document, "session-list")?,
            active_name: by_id(&document, "active-name")?,
            rendered_draft: RefCell::new(String::new()),
            document,
        };
        dom.wire(gestures)?;
        Ok(dom)
    }

    fn wire(&self, gestures: UnboundedSender<Gesture>) -> Result<(), JsValue> {
        let send = move |gesture: Gesture| {
            let _ = gestures.unbounded_send(gesture);
        };

        {
            let send = send.clone();
            let input = self.input.clone();
            listen(&self.input, "input", move |_| send(Gesture::Input(input.value())))?;
        }
        {
            let send = send.clone();
            listen(&self.input, "keydown", move |event| {
                if let Some(event) = event.dyn_ref::<KeyboardEvent>() {
                    send(Gesture::KeyDown(event.key()));
                }
            })?;
        }
        {
            let send = send.clone();
            listen(&self.create, "click", move |_| send(Gesture::Create))?;
        }
        {
            let send = send.clone();
            listen(&self.show_sessions, "click", move |_| send(Gesture::ShowPanel(Panel::Sessions)))?;
        }
        {
            let send = send.clone();
            listen(&self.show_settings, "click", move |_| send(Gesture::ShowPanel(Panel::Settings)))?;
        }
        {
            let send = send.clone();
            let dismiss: Element = by_id(&self.document, "banner-dismiss")?;
            listen(&dismiss, "click", move |_| send(Gesture::DismissError))?;
        }

        // one delegated listener for every row
        listen(&self.list, "click", move |event| {
            if let Some(gesture) = row_gesture(&event) {
                send(gesture);
            }
        })
    }

    pub fn render(&self, view: &PopupView) -> Result<(), JsValue> {
        let on_sessions = view.panel == Panel::Sessions;
        self.sessions_panel.set_hidden(!on_sessions);
        self.settings_panel.set_hidden(on_sessions);
        self.show_sessions
            .set_attribute("aria-selected", if on_sessions { "true" } else { "false" })?;
        self.show_settings
            .set_attribute("aria-selected", if on_sessions { "false" } else { "true" })?;

        match &view.error {
            Some(message) => {
                self.banner_message.set_text_content(Some(message));
                self.banner.set_hidden(false);
            }
            None => self.banner.set_hidden(true),
        }

        let mut rendered_draft = self.rendered_draft.borrow_mut();
        if *rendered_draft != view.draft {
            if self.input.value() != view.draft {
                self.input.set_value(&view.draft);
            }
            *rendered_draft = view.draft.clone();
        }
        self.create.set_disabled(!view.can_create);

        self.loading.set_hidden(!view.loading);
        self.list.set_inner_html("");
        for row in &view.rows {
            let item = self.document.create_element("li")?;
            item.set_attribute("data-action", ACTION_SELECT)?;
            item.set_attribute("data-id", row.id.as_str())?;
            if row.active {
                item.set_attribute("class", "active")?;
                item.set_attribute("aria-current", "true")?;
            }

            let label = self.document.create_element("span")?;
            label.set_attribute("class", "label")?;
            label.set_text_content(Some(&row.label));
            item.append_child(&label)?;

            let delete = self.document.create_element("button")?;
            delete.set_attribute("type", "button")?;
            delete.set_attribute("class", "delete")?;
            delete.set_attribute("title", "Delete session")?;
            delete.set_attribute("data-action", ACTION_DELETE)?;
            delete.set_attribute("data-id", row.id.as_str())?;
            delete.set_text_content(Some("\u{00d7}"));
            item.append_child(&delete)?;

            self.list.append_child(&item)?;
        }

        self.active_name
            .set_text_content(Some(view.active_name.as_deref().unwrap_or("None")));
        Ok(())
    }
}

/// Maps a click inside the session list to the row action it hit.
fn row_gesture(event: &Event) -> Option<Gesture> {
    let target = event.target()?.dyn_into::<Element>().ok()?;
    let actionable = target.closest("[data-action]").ok()??;
    let id = SessionId::from(actionable.get_attribute("data-id")?);
    match actionable.get_attribute("data-action")?.as_str() {
        ACTION_SELECT => Some(Gesture::Select(id)),
        ACTION_DELETE => Some(Gesture::Delete(id)),
        _ => None,
    }
}

fn by_id<T: JsCast>(document: &Document, id: &str) -> Result<T, JsValue> {
    document
        .get_element_by_id(id)
        .ok_or_else(|| JsValue::from_str(&format!("missing #{id}")))?
        .dyn_into::<T>()
        .map_err(|_| JsValue::from_str(&format!("#{id} has an unexpected element type")))
}

/// Adds a listener that lives as long as the page.
fn listen(target: &EventTarget, kind: &str, handler: impl FnMut(Event) + 'static) -> Result<(), JsValue> {
    let closure = Closure::<dyn FnMut(Event)>::new(handler);
    target.add_event_listener_with_callback(kind, closure.as_ref().unchecked_ref())?;
    closure.forget();
    Ok(())
}
