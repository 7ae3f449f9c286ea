//! Editing sessions
//!
//! A session is one page being designed: up to two variants, the edit
//! orchestrator over them, and the input the first page was generated from
//! (kept so a vibe shift can regenerate it under another style).

use crate::config::CoreConfig;
use crate::critic::Critic;
use crate::error::CoreError;
use crate::orchestrator::{EditOrchestrator, EditOutcome};
use crate::store::UserId;
use parking_lot::Mutex;
use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use ulid::Ulid;
use vibe_document::{DocumentStore, EditState, Revision, Variant, VariantLabel};
use vibe_genai::InlineImage;
use vibe_sandbox::{RenderOptions, SandboxRenderer, SandboxRequest};

/// Design styles offered for generation and vibe shifts
pub const STYLES: &[&str] = &["Modern Clean", "Neo-Brutalism", "Cyberpunk", "Minimalist", "Corporate", "Playful"];

/// Starting point for a new page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Template {
    pub id: &'static str,
    pub name: &'static str,
    pub prompt: &'static str,
    pub style: &'static str,
}

pub const TEMPLATES: &[Template] = &[
    Template {
        id: "saas",
        name: "SaaS Landing",
        prompt: "A modern SaaS landing page for a project management tool with a hero, feature grid, pricing tiers and testimonials",
        style: "Modern Clean",
    },
    Template {
        id: "portfolio",
        name: "Creative Portfolio",
        prompt: "A bold portfolio for a freelance designer with a project gallery, about section and contact form",
        style: "Neo-Brutalism",
    },
    Template {
        id: "ecommerce",
        name: "E-commerce Store",
        prompt: "A product launch page for premium wireless headphones with product highlights, reviews and a buy section",
        style: "Minimalist",
    },
    Template {
        id: "agency",
        name: "Digital Agency",
        prompt: "A digital agency homepage with services, case studies, team members and a call to action",
        style: "Corporate",
    },
    Template {
        id: "docs",
        name: "Documentation",
        prompt: "A developer documentation landing page with a quick start, code samples and API reference links",
        style: "Cyberpunk",
    },
];

/// Template by id
#[must_use]
pub fn template(id: &str) -> Option<&'static Template> {
    TEMPLATES.iter().find(|t| t.id.eq_ignore_ascii_case(id))
}

/// Session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Ulid);

impl SessionId {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}

/// What a page is generated from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PageInput {
    Text { prompt: String },
    Image { image: InlineImage, prompt: Option<String> },
}

impl PageInput {
    #[must_use]
    pub fn text(prompt: impl Into<String>) -> Self {
        Self::Text { prompt: prompt.into() }
    }

    fn description(&self) -> Option<&str> {
        match self {
            Self::Text { prompt } => Some(prompt),
            Self::Image { prompt, .. } => prompt.as_deref(),
        }
    }

    fn image(&self) -> Option<InlineImage> {
        match self {
            Self::Text { .. } => None,
            Self::Image { image, .. } => Some(image.clone()),
        }
    }
}

/// Serializable view of one variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantView {
    pub label: VariantLabel,
    pub style: String,
    pub revision: Revision,
    pub state: EditState,
    pub can_undo: bool,
    pub can_redo: bool,
    pub undo_depth: usize,
    pub redo_depth: usize,
    pub html: String,
    pub css: String,
}

impl From<&Variant> for VariantView {
    fn from(variant: &Variant) -> Self {
        let history = variant.history();
        Self {
            label: variant.label(),
            style: variant.style().to_owned(),
            revision: variant.revision(),
            state: variant.state(),
            can_undo: history.can_undo(),
            can_redo: history.can_redo(),
            undo_depth: history.undo_len(),
            redo_depth: history.redo_len(),
            html: variant.html().to_owned(),
            css: variant.css().to_owned(),
        }
    }
}

/// Serializable view of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: SessionId,
    /// Capability for the editor page; only the owner ever sees it
    pub edit_token: String,
    pub active: VariantLabel,
    pub variants: Vec<VariantView>,
}

/// One page under design
pub struct EditSession {
    id: SessionId,
    owner: Option<UserId>,
    edit_token: String,
    orchestrator: EditOrchestrator,
    critic: Critic,
    renderer: SandboxRenderer,
    source: Mutex<Option<PageInput>>,
}

impl std::fmt::Debug for EditSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditSession")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

impl EditSession {
    /// Empty session; nothing can be edited until [`Self::generate`] runs
    #[must_use]
    pub fn new(owner: Option<UserId>, critic: Critic, config: &CoreConfig) -> Self {
        let store = DocumentStore::new(STYLES[0]);
        Self {
            id: SessionId::new(),
            owner,
            edit_token: new_edit_token(),
            orchestrator: EditOrchestrator::new(store, critic.generator(), config),
            critic,
            renderer: SandboxRenderer::default(),
            source: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_renderer(mut self, renderer: SandboxRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    #[inline]
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    #[inline]
    #[must_use]
    pub const fn owner(&self) -> Option<&UserId> {
        self.owner.as_ref()
    }

    /// Token the editor page presents instead of the owner's identity
    #[inline]
    #[must_use]
    pub fn edit_token(&self) -> &str {
        &self.edit_token
    }

    /// Whether `token` is this session's edit token. Compares digests so the
    /// time taken does not depend on where the strings differ.
    #[must_use]
    pub fn accepts_token(&self, token: &str) -> bool {
        Revision::of_bytes(token.as_bytes()) == Revision::of_bytes(self.edit_token.as_bytes())
    }

    /// True if `user` may act on this session
    #[must_use]
    pub fn is_owned_by(&self, user: Option<&UserId>) -> bool {
        self.owner.is_none() || self.owner.as_ref() == user
    }

    #[inline]
    #[must_use]
    pub const fn orchestrator(&self) -> &EditOrchestrator {
        &self.orchestrator
    }

    /// Generate a page into `target`, replacing it wholesale, and make it
    /// the active variant
    ///
    /// # Errors
    /// Input, generation and parse errors; busy if `target` has an edit in
    /// flight
    pub async fn generate(
        &self,
        input: PageInput,
        style: &str,
        target: VariantLabel,
    ) -> Result<SessionSnapshot, CoreError> {
        let style = if style.trim().is_empty() { STYLES[0] } else { style.trim() };
        let page = self
            .critic
            .generate_page(input.description(), input.image(), Some(style))
            .await?;
        let html = self.orchestrator.prepare_markup(&page.html)?;

        let revision = self
            .orchestrator
            .install(Variant::generated(target, html, page.css, style), true)?;
        tracing::info!(session = %self.id, variant = %target, style, revision = %revision.short(), "Generated variant");

        let mut source = self.source.lock();
        if source.is_none() || target == VariantLabel::A {
            *source = Some(input);
        }
        drop(source);
        Ok(self.snapshot())
    }

    /// Regenerate the original input under a different random style into
    /// the other slot, then activate it
    ///
    /// # Errors
    /// Input error if nothing has been generated yet; otherwise as
    /// [`Self::generate`]
    pub async fn vibe_shift(&self) -> Result<SessionSnapshot, CoreError> {
        let input = self
            .source
            .lock()
            .clone()
            .ok_or_else(|| CoreError::Input("Generate a page before shifting its vibe".to_owned()))?;
        let (current_style, target) = self
            .orchestrator
            .inspect(|store| (store.active().style().to_owned(), store.active_label().other()));

        let candidates: Vec<&str> = STYLES.iter().copied().filter(|s| *s != current_style).collect();
        let style = candidates
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(STYLES[0]);
        tracing::info!(session = %self.id, from = %current_style, to = style, variant = %target, "Vibe shift");
        self.generate(input, style, target).await
    }

    /// Make `label` the variant edits apply to
    ///
    /// # Errors
    /// Returns error if the slot has not been generated
    pub fn activate(&self, label: VariantLabel) -> Result<SessionSnapshot, CoreError> {
        self.orchestrator.activate(label)?;
        Ok(self.snapshot())
    }

    /// Apply a sandbox request to the active variant
    ///
    /// # Errors
    /// See [`EditOrchestrator::handle_message`]
    pub async fn handle_message(&self, request: &SandboxRequest) -> Result<EditOutcome, CoreError> {
        Ok(self.orchestrator.handle_message(request).await?)
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.orchestrator.inspect(|store| SessionSnapshot {
            id: self.id,
            edit_token: self.edit_token.clone(),
            active: store.active_label(),
            variants: store.variants().map(VariantView::from).collect(),
        })
    }

    /// Preview document of the active variant
    ///
    /// # Errors
    /// Returns error if the preview cannot be built
    pub fn preview(&self, restore_scroll: Option<u32>) -> Result<String, CoreError> {
        let (html, css) = self
            .orchestrator
            .inspect(|store| (store.active().html().to_owned(), store.active().css().to_owned()));
        let options = RenderOptions::default().with_restore_scroll(restore_scroll);
        Ok(self.renderer.render(&html, &css, &options)?)
    }
}

fn new_edit_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}
