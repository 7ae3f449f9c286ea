//! VibeStack core
//!
//! Editing sessions over A/B page variants, and the plain request/response
//! features around them.
//!
//! # Core Concepts
//!
//! - [`EditOrchestrator`]: remix/polish/undo/redo against one document store,
//!   one edit in flight per variant, all-or-nothing commits
//! - [`EditSession`]: generation, vibe shift and preview over an orchestrator
//! - [`Critic`]: page generation and cached screenshot critiques
//! - [`ProjectStore`] / [`GalleryStore`] / [`UserDirectory`]: injected
//!   persistence, with in-memory implementations
//! - [`UsageLimiter`]: the free plan's monthly project limit
//! - [`ErrorKind`]: the failure taxonomy every error maps onto

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod account;
mod config;
mod critic;
mod error;
mod orchestrator;
mod session;
mod store;

pub use account::{
    month_start, BillingEvent, HeaderIdentity, IdentityProvider, InMemoryUserDirectory, Plan, Usage, UsageLimiter,
    User, UserDirectory,
};
pub use config::{CoreConfig, MAX_FREE_PROJECTS};
pub use critic::Critic;
pub use error::{CoreError, EditError, ErrorKind, StoreError};
pub use orchestrator::{EditOrchestrator, EditOutcome};
pub use session::{
    template, EditSession, PageInput, SessionId, SessionSnapshot, Template, VariantView, STYLES, TEMPLATES,
};
pub use store::{
    gallery_title, GalleryId, GalleryItem, GalleryStore, InMemoryGalleryStore, InMemoryProjectStore, InputType,
    NewGalleryItem, NewProject, Project, ProjectId, ProjectStore, ProjectUpdate, UserId,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
