//! Log helpers
//!
//! In the browser we write straight to the devtools console. Native builds
//! (tests, embedding) go through `tracing`, so a host can attach whatever
//! subscriber it likes.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::JsValue;

pub(crate) fn debug(component: &str, message: &str) {
    #[cfg(target_arch = "wasm32")]
    web_sys::console::debug_1(&JsValue::from_str(&format!("[{}] {}", component, message)));

    #[cfg(not(target_arch = "wasm32"))]
    tracing::debug!(component, "{}", message);
}

pub(crate) fn warn(component: &str, message: &str) {
    #[cfg(target_arch = "wasm32")]
    web_sys::console::warn_1(&JsValue::from_str(&format!("[{}] {}", component, message)));

    #[cfg(not(target_arch = "wasm32"))]
    tracing::warn!(component, "{}", message);
}

pub(crate) fn error(component: &str, message: &str) {
    #[cfg(target_arch = "wasm32")]
    web_sys::console::error_1(&JsValue::from_str(&format!("[{}] {}", component, message)));

    #[cfg(not(target_arch = "wasm32"))]
    tracing::error!(component, "{}", message);
}
