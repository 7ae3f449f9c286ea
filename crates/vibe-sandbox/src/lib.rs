//! VibeStack preview sandbox
//!
//! Everything that crosses the iframe boundary lives here.
//!
//! - [`SandboxRenderer`]: builds the preview document with editing affordances
//! - [`SandboxRequest`] / [`SandboxMessage`]: the message contract, validated
//!   from untrusted JSON
//! - [`host_page`]: the editor page that frames the preview and relays its
//!   messages

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod host;
mod message;
mod renderer;

pub use host::{host_page, EDIT_TOKEN_HEADER};
pub use message::{
    MessageError, SandboxMessage, SandboxRequest, COPY_REQUEST, REDO_REQUEST, REMIX_REQUEST, UNDO_REQUEST,
};
pub use renderer::{
    iframe_attributes, RenderError, RenderOptions, SandboxRenderer, CONFIG_ELEMENT_ID, DEFAULT_FRAMEWORK_SCRIPT,
    DEFAULT_ICON_STYLESHEET, IFRAME_SANDBOX,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
