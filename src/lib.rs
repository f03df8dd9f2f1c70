//! ArtifactCore: streaming artifact extraction for chat responses
//!
//! A Rust/WASM implementation of the artifact pipeline behind the chat panel:
//! model responses embed `<artifact>` blocks carrying TSX components, and this
//! crate pulls them out while the response is still streaming.
//!
//! # Architecture
//!
//! ## Scanner Components
//! - `grammar.rs` - TagGrammar: tag search, partial-prefix detection, entity escaping
//! - `attributes.rs` - Attribute validation for artifact and code tags
//! - `streaming.rs` - StreamingScanner: **incremental** per-message state machine
//! - `restore.rs` - HistoryRestorer: one-shot extraction from stored messages
//! - `events.rs` - ScanHandler trait, payloads, EventLog recorder
//!
//! ## Store Components
//! - `registry.rs` - ArtifactStore: versioned records, active artifact, panel
//! - `observer.rs` - StoreChange notifications
//! - `persistence.rs` - Persistence hook for completed artifacts
//!
//! ## Wiring
//! - `session.rs` - ArtifactSession: scanner events routed into the store
//! - `wasm.rs` - WasmArtifactSession: JS bindings
//!
//! # Usage (WASM)
//! ```javascript,ignore
//! import init, { WasmArtifactSession } from 'artifactcore';
//!
//! await init();
//!
//! const session = new WasmArtifactSession('chat-42');
//! session.subscribe((change) => console.log(change.type));
//!
//! // Feed fragments as they arrive from the model
//! for await (const chunk of stream) {
//!   session.parse('msg-1', chunk);
//!   console.log(session.getPendingArtifact('msg-1'));
//! }
//! session.finishMessage('msg-1');
//!
//! console.log(session.getArtifactsForMessage('msg-1'));
//! ```

pub mod artifact;
pub mod config;
pub mod error;
pub(crate) mod logging;
pub mod scanner;
pub mod session;
pub mod store;
pub mod wasm;

// Public exports - Model
pub use artifact::*;
pub use config::*;
pub use error::*;

// Public exports - Scanner
pub use scanner::*;

// Public exports - Store
pub use session::*;
pub use store::*;
pub use wasm::*;

use wasm_bindgen::prelude::*;

// When the `wee_alloc` feature is enabled, use `wee_alloc` as the global
// allocator for smaller WASM bundle size.
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Get version information
#[wasm_bindgen]
pub fn version() -> String {
    format!("artifactcore v{}", env!("CARGO_PKG_VERSION"))
}
