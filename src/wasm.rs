//! JavaScript bindings
//!
//! `WasmArtifactSession` wraps one `ArtifactSession` for the chat front end.
//! Records and events cross the boundary as plain JS objects
//! (`serde-wasm-bindgen`, JSON-compatible mode).

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;

use crate::artifact::{ArtifactRef, ArtifactStatus, PanelTab, StoredMessage};
use crate::config::ScannerConfig;
use crate::logging;
use crate::scanner::events::EventLog;
use crate::session::ArtifactSession;
use crate::store::observer::{StoreChange, SubscriptionId};

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

fn from_js<T: DeserializeOwned>(value: JsValue) -> Result<T, JsValue> {
    serde_wasm_bindgen::from_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

#[wasm_bindgen]
pub struct WasmArtifactSession {
    inner: ArtifactSession,
    events: Rc<RefCell<EventLog>>,
}

impl WasmArtifactSession {
    fn wrap(mut inner: ArtifactSession) -> Self {
        let events = Rc::new(RefCell::new(EventLog::new()));
        inner.set_handler(Rc::clone(&events));
        Self { inner, events }
    }
}

#[wasm_bindgen]
impl WasmArtifactSession {
    #[wasm_bindgen(constructor)]
    pub fn new(session_id: Option<String>) -> Self {
        Self::wrap(ArtifactSession::new(session_id.unwrap_or_default()))
    }

    /// Build with a JSON `ScannerConfig` (custom tag names, context radius)
    #[wasm_bindgen(js_name = withConfig)]
    pub fn with_config(session_id: Option<String>, config_json: &str) -> Result<WasmArtifactSession, JsValue> {
        let config = ScannerConfig::from_json(config_json)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(Self::wrap(ArtifactSession::with_config(
            config,
            session_id.unwrap_or_default(),
        )))
    }

    #[wasm_bindgen(getter = sessionId)]
    pub fn session_id(&self) -> String {
        self.inner.session_id().to_string()
    }

    #[wasm_bindgen(setter = sessionId)]
    pub fn set_session_id(&mut self, session_id: String) {
        self.inner.set_session_id(session_id);
    }

    // ========================================================================
    // Streaming
    // ========================================================================

    /// Feed a fragment; returns the full message text so far
    #[wasm_bindgen]
    pub fn parse(&mut self, message_id: &str, fragment: &str) -> String {
        self.inner.ingest(message_id, fragment).to_string()
    }

    /// Drop the parse state of one message
    #[wasm_bindgen(js_name = resetState)]
    pub fn reset_state(&mut self, message_id: &str) -> bool {
        self.inner.scanner_mut().reset_state(message_id)
    }

    /// Returns `null` when no artifact is open
    #[wasm_bindgen(js_name = getPendingArtifact)]
    pub fn get_pending_artifact(&self, message_id: &str) -> Result<JsValue, JsValue> {
        to_js(&self.inner.pending_artifact(message_id))
    }

    #[wasm_bindgen(js_name = finishMessage)]
    pub fn finish_message(&mut self, message_id: &str) -> Result<JsValue, JsValue> {
        to_js(&self.inner.finish_message(message_id))
    }

    #[wasm_bindgen(js_name = resetMessage)]
    pub fn reset_message(&mut self, message_id: &str) -> usize {
        self.inner.reset_message(message_id)
    }

    /// Leave the conversation: parse states, records and queued events
    #[wasm_bindgen]
    pub fn clear(&mut self) {
        self.inner.leave_conversation();
        self.events.borrow_mut().take();
    }

    /// Scanner events since the last call, oldest first
    #[wasm_bindgen(js_name = takeEvents)]
    pub fn take_events(&mut self) -> Result<JsValue, JsValue> {
        let events = self.events.borrow_mut().take();
        to_js(&events)
    }

    // ========================================================================
    // Store
    // ========================================================================

    /// `messages`: `[{ id, content, createdAt? }]`. Returns artifacts found.
    #[wasm_bindgen(js_name = restoreFromMessages)]
    pub fn restore_from_messages(&mut self, messages: JsValue) -> Result<usize, JsValue> {
        let messages: Vec<StoredMessage> = from_js(messages)?;
        Ok(self.inner.restore_history(&messages))
    }

    #[wasm_bindgen(js_name = getArtifact)]
    pub fn get_artifact(&self, message_id: &str, artifact_id: &str) -> Result<JsValue, JsValue> {
        to_js(&self.inner.store().get_artifact(message_id, artifact_id))
    }

    #[wasm_bindgen(js_name = getArtifactsForMessage)]
    pub fn get_artifacts_for_message(&self, message_id: &str) -> Result<JsValue, JsValue> {
        to_js(&self.inner.store().get_artifacts_for_message(message_id))
    }

    #[wasm_bindgen(js_name = getLatestArtifactById)]
    pub fn get_latest_artifact_by_id(&self, artifact_id: &str) -> Result<JsValue, JsValue> {
        to_js(&self.inner.store().get_latest_artifact_by_id(artifact_id))
    }

    /// Both ids or neither; `null` clears the selection
    #[wasm_bindgen(js_name = setActiveArtifact)]
    pub fn set_active_artifact(&mut self, message_id: Option<String>, artifact_id: Option<String>) {
        let active = match (message_id, artifact_id) {
            (Some(m), Some(a)) => Some(ArtifactRef::new(m, a)),
            _ => None,
        };
        self.inner.store_mut().set_active_artifact(active);
    }

    #[wasm_bindgen(js_name = getActiveArtifact)]
    pub fn get_active_artifact(&self) -> Result<JsValue, JsValue> {
        to_js(&self.inner.store().active_artifact())
    }

    /// `tab`: `"editor"`, `"preview"` or undefined to keep the current one
    #[wasm_bindgen(js_name = setPanelVisible)]
    pub fn set_panel_visible(&mut self, visible: bool, tab: JsValue) -> Result<(), JsValue> {
        let tab: Option<PanelTab> = from_js(tab)?;
        self.inner.store_mut().set_panel_visible(visible, tab);
        Ok(())
    }

    #[wasm_bindgen(js_name = getPanel)]
    pub fn get_panel(&self) -> Result<JsValue, JsValue> {
        to_js(&self.inner.store().panel())
    }

    /// Sandbox status report. `status`: `"executing"`, `"ready"`, `"error"`, ...
    #[wasm_bindgen(js_name = setStatus)]
    pub fn set_status(
        &mut self,
        message_id: &str,
        artifact_id: &str,
        status: JsValue,
        error: Option<String>,
    ) -> Result<bool, JsValue> {
        let status: ArtifactStatus = from_js(status)?;
        Ok(self
            .inner
            .store_mut()
            .set_status(message_id, artifact_id, status, error))
    }

    #[wasm_bindgen]
    pub fn len(&self) -> usize {
        self.inner.store().len()
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    /// Call `callback(change)` after every store mutation. Returns an id for
    /// `unsubscribe`.
    #[wasm_bindgen]
    pub fn subscribe(&mut self, callback: js_sys::Function) -> u32 {
        let id = self
            .inner
            .store_mut()
            .subscribe(move |change: &StoreChange| {
                let payload = match to_js(change) {
                    Ok(v) => v,
                    Err(e) => {
                        logging::error("WasmArtifactSession", &format!("{:?}", e));
                        return;
                    }
                };
                if let Err(e) = callback.call1(&JsValue::NULL, &payload) {
                    logging::error("WasmArtifactSession", &format!("subscriber threw: {:?}", e));
                }
            });
        id.0 as u32
    }

    #[wasm_bindgen]
    pub fn unsubscribe(&mut self, id: u32) -> bool {
        self.inner
            .store_mut()
            .unsubscribe(SubscriptionId(u64::from(id)))
    }
}
