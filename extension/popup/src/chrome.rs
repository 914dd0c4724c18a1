//! `chrome.*` bindings and the [`Host`] implementation over them.

use std::rc::Rc;

use async_trait::async_trait;
use jarswap::handlers::next_handler_id;
use jarswap::protocol::{Cookie, CookieChange, RemovedCookie, SetCookieDetails, TabId, TabInfo, TabStatus};
use jarswap::{EventSink, Host, HostError, HostEvent, HostResult, Subscription};
use js_sys::{Object, Promise, Reflect};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

#[derive(Serialize)]
struct CreateProperties<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
    active: bool,
}

#[derive(Serialize)]
struct CookieQuery<'a> {
    url: &'a str,
}

#[derive(Serialize)]
struct CookieTarget<'a> {
    url: &'a str,
    name: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActiveInfo {
    tab_id: TabId,
}

#[derive(Default, Deserialize)]
struct ChangeInfo {
    #[serde(default)]
    status: Option<TabStatus>,
}

/// The browser, reached through the extension APIs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeHost;

#[async_trait(?Send)]
impl Host for ChromeHost {
    async fn create_tab(&self, url: Option<&str>) -> HostResult<TabInfo> {
        let properties = to_js(&CreateProperties { url, active: true }).map_err(HostError::Tabs)?;
        let tab = call(tabs_create(&properties)).await.map_err(HostError::Tabs)?;
        from_js(tab).map_err(HostError::Tabs)
    }

    async fn remove_tab(&self, tab_id: TabId) -> HostResult<()> {
        call(tabs_remove(tab_id.0)).await.map_err(HostError::Tabs)?;
        Ok(())
    }

    async fn get_tab(&self, tab_id: TabId) -> HostResult<TabInfo> {
        let tab = call(tabs_get(tab_id.0)).await.map_err(HostError::Tabs)?;
        from_js(tab).map_err(HostError::Tabs)
    }

    async fn get_all_cookies(&self, url: &str) -> HostResult<Vec<Cookie>> {
        let query = to_js(&CookieQuery { url }).map_err(HostError::Cookies)?;
        let cookies = call(cookies_get_all(&query)).await.map_err(HostError::Cookies)?;
        from_js(cookies).map_err(HostError::Cookies)
    }

    async fn set_cookie(&self, details: &SetCookieDetails) -> HostResult<()> {
        let details_js = to_js(details).map_err(HostError::Cookies)?;
        let result = call(cookies_set(&details_js)).await.map_err(HostError::Cookies)?;
        // chrome resolves with null when the cookie was rejected
        if result.is_null() || result.is_undefined() {
            return Err(HostError::Cookies(format!(
                "cookie {} rejected for {}",
                details.name, details.url
            )));
        }
        Ok(())
    }

    async fn remove_cookie(&self, url: &str, name: &str) -> HostResult<Option<RemovedCookie>> {
        let target = to_js(&CookieTarget { url, name }).map_err(HostError::Cookies)?;
        let removed = call(cookies_remove(&target)).await.map_err(HostError::Cookies)?;
        if removed.is_null() || removed.is_undefined() {
            return Ok(None);
        }
        from_js(removed).map(Some).map_err(HostError::Cookies)
    }

    async fn load(&self, key: &str) -> HostResult<Option<Value>> {
        let key_js = JsValue::from_str(key);
        let items = call(storage_local_get(&key_js)).await.map_err(HostError::Storage)?;
        let value = Reflect::get(&items, &key_js).map_err(|err| HostError::Storage(describe(err)))?;
        if value.is_undefined() {
            debug!(target = "jarswap.chrome", key, "nothing stored");
            return Ok(None);
        }
        from_js(value).map(Some).map_err(HostError::Storage)
    }

    async fn save(&self, key: &str, value: Value) -> HostResult<()> {
        let value_js = value
            .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .map_err(|err| HostError::Storage(err.to_string()))?;
        let items = Object::new();
        Reflect::set(&items, &JsValue::from_str(key), &value_js)
            .map_err(|err| HostError::Storage(describe(err)))?;
        call(storage_local_set(&items)).await.map_err(HostError::Storage)?;
        Ok(())
    }

    fn subscribe(&self, sink: EventSink) -> Subscription {
        let listeners = Listeners::attach(sink);
        Subscription::new(next_handler_id(), move |_| listeners.detach())
    }
}

/// Registered `chrome.tabs` and `chrome.cookies` listeners.
struct Listeners {
    created: Closure<dyn FnMut(JsValue)>,
    activated: Closure<dyn FnMut(JsValue)>,
    updated: Closure<dyn FnMut(JsValue, JsValue, JsValue)>,
    removed: Closure<dyn FnMut(JsValue, JsValue)>,
    cookie_changed: Closure<dyn FnMut(JsValue)>,
}

impl Listeners {
    fn attach(sink: EventSink) -> Self {
        let created = {
            let sink = Rc::clone(&sink);
            Closure::<dyn FnMut(JsValue)>::new(move |tab: JsValue| {
                forward(&sink, "tabs.onCreated", from_js(tab).map(HostEvent::TabCreated));
            })
        };

        let activated = {
            let sink = Rc::clone(&sink);
            Closure::<dyn FnMut(JsValue)>::new(move |info: JsValue| {
                let event = from_js::<ActiveInfo>(info).map(|info| HostEvent::TabActivated(info.tab_id));
                forward(&sink, "tabs.onActivated", event);
            })
        };

        let updated = {
            let sink = Rc::clone(&sink);
            Closure::<dyn FnMut(JsValue, JsValue, JsValue)>::new(
                move |tab_id: JsValue, change: JsValue, _tab: JsValue| {
                    let event = tab_id_of(&tab_id).map(|tab_id| HostEvent::TabUpdated {
                        tab_id,
                        status: from_js::<ChangeInfo>(change).unwrap_or_default().status,
                    });
                    forward(&sink, "tabs.onUpdated", event);
                },
            )
        };

        let removed = {
            let sink = Rc::clone(&sink);
            Closure::<dyn FnMut(JsValue, JsValue)>::new(move |tab_id: JsValue, _info: JsValue| {
                forward(&sink, "tabs.onRemoved", tab_id_of(&tab_id).map(HostEvent::TabRemoved));
            })
        };

        let cookie_changed = Closure::<dyn FnMut(JsValue)>::new(move |info: JsValue| {
            let event = from_js::<CookieChange>(info).map(HostEvent::CookieChanged);
            forward(&sink, "cookies.onChanged", event);
        });

        tabs_on_created_add_listener(&created);
        tabs_on_activated_add_listener(&activated);
        tabs_on_updated_add_listener(&updated);
        tabs_on_removed_add_listener(&removed);
        cookies_on_changed_add_listener(&cookie_changed);
        debug!(target = "jarswap.chrome", "host listeners attached");

        Self {
            created,
            activated,
            updated,
            removed,
            cookie_changed,
        }
    }

    fn detach(self) {
        tabs_on_created_remove_listener(&self.created);
        tabs_on_activated_remove_listener(&self.activated);
        tabs_on_updated_remove_listener(&self.updated);
        tabs_on_removed_remove_listener(&self.removed);
        cookies_on_changed_remove_listener(&self.cookie_changed);
        debug!(target = "jarswap.chrome", "host listeners detached");
    }
}

fn forward(sink: &EventSink, source: &str, event: Result<HostEvent, String>) {
    match event {
        Ok(event) => sink(event),
        Err(err) => warn!(target = "jarswap.chrome", source, error = %err, "dropping unreadable notification"),
    }
}

fn tab_id_of(value: &JsValue) -> Result<TabId, String> {
    value
        .as_f64()
        .map(|id| TabId(id as i32))
        .ok_or_else(|| format!("expected a tab id, got {value:?}"))
}

async fn call(promise: Promise) -> Result<JsValue, String> {
    JsFuture::from(promise).await.map_err(describe)
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, String> {
    serde_wasm_bindgen::to_value(value).map_err(|err| err.to_string())
}

fn from_js<T: DeserializeOwned>(value: JsValue) -> Result<T, String> {
    serde_wasm_bindgen::from_value(value).map_err(|err| err.to_string())
}

/// Best-effort message for a rejected promise or thrown value.
fn describe(err: JsValue) -> String {
    Reflect::get(&err, &JsValue::from_str("message"))
        .ok()
        .and_then(|message| message.as_string())
        .or_else(|| err.as_string())
        .or_else(|| js_sys::JSON::stringify(&err).ok()?.as_string())
        .unwrap_or_else(|| format!("{err:?}"))
}

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = ["chrome", "tabs"], js_name = create)]
    fn tabs_create(properties: &JsValue) -> Promise;

    #[wasm_bindgen(js_namespace = ["chrome", "tabs"], js_name = remove)]
    fn tabs_remove(tab_id: i32) -> Promise;

    #[wasm_bindgen(js_namespace = ["chrome", "tabs"], js_name = get)]
    fn tabs_get(tab_id: i32) -> Promise;

    #[wasm_bindgen(js_namespace = ["chrome", "cookies"], js_name = getAll)]
    fn cookies_get_all(details: &JsValue) -> Promise;

    #[wasm_bindgen(js_namespace = ["chrome", "cookies"], js_name = set)]
    fn cookies_set(details: &JsValue) -> Promise;

    #[wasm_bindgen(js_namespace = ["chrome", "cookies"], js_name = remove)]
    fn cookies_remove(details: &JsValue) -> Promise;

    #[wasm_bindgen(js_namespace = ["chrome", "storage", "local"], js_name = get)]
    fn storage_local_get(keys: &JsValue) -> Promise;

    #[wasm_bindgen(js_namespace = ["chrome", "storage", "local"], js_name = set)]
    fn storage_local_set(items: &JsValue) -> Promise;

    #[wasm_bindgen(js_namespace = ["chrome", "tabs", "onCreated"], js_name = addListener)]
    fn tabs_on_created_add_listener(cb: &Closure<dyn FnMut(JsValue)>);

    #[wasm_bindgen(js_namespace = ["chrome", "tabs", "onCreated"], js_name = removeListener)]
    fn tabs_on_created_remove_listener(cb: &Closure<dyn FnMut(JsValue)>);

    #[wasm_bindgen(js_namespace = ["chrome", "tabs", "onActivated"], js_name = addListener)]
    fn tabs_on_activated_add_listener(cb: &Closure<dyn FnMut(JsValue)>);

    #[wasm_bindgen(js_namespace = ["chrome", "tabs", "onActivated"], js_name = removeListener)]
    fn tabs_on_activated_remove_listener(cb: &Closure<dyn FnMut(JsValue)>);

    #[wasm_bindgen(js_namespace = ["chrome", "tabs", "onUpdated"], js_name = addListener)]
    fn tabs_on_updated_add_listener(cb: &Closure<dyn FnMut(JsValue, JsValue, JsValue)>);

    #[wasm_bindgen(js_namespace = ["chrome", "tabs", "onUpdated"], js_name = removeListener)]
    fn tabs_on_updated_remove_listener(cb: &Closure<dyn FnMut(JsValue, JsValue, JsValue)>);

    #[wasm_bindgen(js_namespace = ["chrome", "tabs", "onRemoved"], js_name = addListener)]
    fn tabs_on_removed_add_listener(cb: &Closure<dyn FnMut(JsValue, JsValue)>);

    #[wasm_bindgen(js_namespace = ["chrome", "tabs", "onRemoved"], js_name = removeListener)]
    fn tabs_on_removed_remove_listener(cb: &Closure<dyn FnMut(JsValue, JsValue)>);

    #[wasm_bindgen(js_namespace = ["chrome", "cookies", "onChanged"], js_name = addListener)]
    fn cookies_on_changed_add_listener(cb: &Closure<dyn FnMut(JsValue)>);

    #[wasm_bindgen(js_namespace = ["chrome", "cookies", "onChanged"], js_name = removeListener)]
    fn cookies_on_changed_remove_listener(cb: &Closure<dyn FnMut(JsValue)>);
}
