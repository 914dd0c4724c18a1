//! Popup page of the jarswap extension.
//!
//! Wires [`ChromeHost`] into a [`SessionService`], renders the popup view
//! model into the page and feeds DOM input back as gestures.

mod chrome;
mod dom;
mod logging;

use std::rc::Rc;

use futures::channel::mpsc;
use futures::StreamExt;
use jarswap::{Host, Popup, SessionConfig, SessionService};
use tracing::{error, info, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;

use crate::chrome::ChromeHost;
use crate::dom::PopupDom;

#[wasm_bindgen(start)]
pub async fn start() {
    console_error_panic_hook::set_once();

    if let Err(err) = init().await {
        error!(target = "jarswap.popup", error = ?err, "popup init failed");
    }
}

async fn init() -> Result<(), JsValue> {
    let host = ChromeHost;
    let (config, source) = SessionConfig::read(&host).await;
    logging::init_logging(config.log_level);
    source.log();
    info!(target = "jarswap.popup", storage_key = %config.storage_key, "popup starting");

    let (service, handle) = SessionService::new(host, config.clone());
    let events = host.subscribe(handle.event_sink());
    spawn_local(async move {
        service.run().await;
        drop(events);
    });

    let (gestures_tx, mut gestures) = mpsc::unbounded();
    let dom = Rc::new(PopupDom::mount(gestures_tx)?);
    let popup = Rc::new(Popup::new(handle.clone(), config.max_name_len));
    dom.render(&popup.view())?;

    let _changes = {
        let dom = Rc::clone(&dom);
        let popup = Rc::clone(&popup);
        handle.on_change(move |snapshot| {
            popup.update(snapshot);
            if let Err(err) = dom.render(&popup.view()) {
                warn!(target = "jarswap.popup", error = ?err, "render failed");
            }
        })
    };

    while let Some(gesture) = gestures.next().await {
        popup.handle(gesture).await;
        dom.render(&popup.view())?;
    }
    Ok(())
}
