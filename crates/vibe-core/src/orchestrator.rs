//! Edit Orchestrator
//!
//! Turns sandbox requests into committed document edits.
//!
//! # Pipeline (remix / polish)
//! 1. Validate the request content
//! 2. Lock the store; reject with [`EditError::Busy`] if the active variant
//!    already awaits a generation; snapshot for undo; mark it
//!    `AwaitingGeneration`; unlock
//! 3. Call the generation service (no lock held)
//! 4. Parse the output, lock again, patch the variant's current document
//!    and commit (redo cleared), back to `Idle`
//!
//! Any failure after step 2 rolls the snapshot back and returns the variant
//! to `Idle`, so an edit either commits whole or leaves no trace. The
//! rollback lives in a drop guard and also runs when the caller's future is
//! dropped mid-generation.

use crate::config::CoreConfig;
use crate::error::EditError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use vibe_document::{
    annotate, apply_patch, DocumentStore, EditState, HtmlDocument, NodeAddress, Patch, Revision, Variant, VariantLabel,
};
use vibe_genai::parsers::{PolishedCopy, RemixMarkup};
use vibe_genai::{parse, prompts, GenerationService};
use vibe_sandbox::{SandboxMessage, SandboxRequest};

/// Result of a successful edit, undo or redo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditOutcome {
    /// Variant that changed
    pub variant: VariantLabel,
    /// Revision of the variant after the change
    pub revision: Revision,
    pub can_undo: bool,
    pub can_redo: bool,
    /// Short confirmation for the user
    pub notice: String,
}

impl EditOutcome {
    fn of(variant: &Variant, notice: impl Into<String>) -> Self {
        Self {
            variant: variant.label(),
            revision: variant.revision(),
            can_undo: variant.history().can_undo(),
            can_redo: variant.history().can_redo(),
            notice: notice.into(),
        }
    }
}

/// Orchestrates edits on one A/B document store
pub struct EditOrchestrator {
    store: Mutex<DocumentStore>,
    generator: Arc<dyn GenerationService>,
    remix_instruction: String,
    polish_instruction: String,
    stable_node_ids: bool,
}

impl std::fmt::Debug for EditOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditOrchestrator")
            .field("generator", &self.generator.name())
            .field("stable_node_ids", &self.stable_node_ids)
            .finish_non_exhaustive()
    }
}

impl EditOrchestrator {
    /// Orchestrator over `store`, editing through `generator`
    #[must_use]
    pub fn new(store: DocumentStore, generator: Arc<dyn GenerationService>, config: &CoreConfig) -> Self {
        Self {
            store: Mutex::new(store),
            generator,
            remix_instruction: config.remix_instruction.clone(),
            polish_instruction: config.polish_instruction.clone(),
            stable_node_ids: config.stable_node_ids,
        }
    }

    /// True if stable node ids are assigned and honoured
    #[inline]
    #[must_use]
    pub const fn stable_node_ids(&self) -> bool {
        self.stable_node_ids
    }

    /// Read the store under the lock
    pub fn inspect<R>(&self, f: impl FnOnce(&DocumentStore) -> R) -> R {
        f(&self.store.lock())
    }

    /// Dispatch a validated sandbox request to the active variant
    ///
    /// # Errors
    /// See [`Self::remix`], [`Self::polish`], [`Self::undo`], [`Self::redo`]
    pub async fn handle_message(&self, request: &SandboxRequest) -> Result<EditOutcome, EditError> {
        let address = self.address_of(request);
        match (&request.message, address) {
            (SandboxMessage::Remix { html, .. }, Some(address)) => self.remix(html, address).await,
            (SandboxMessage::Copy { text, tag_name, .. }, Some(address)) => {
                self.polish(text, tag_name, address).await
            }
            (SandboxMessage::Undo, _) => self.undo(),
            (SandboxMessage::Redo, _) => self.redo(),
            (message, None) => Err(EditError::Input(format!("{} carries no target", message.kind()))),
        }
    }

    fn address_of(&self, request: &SandboxRequest) -> Option<NodeAddress> {
        if self.stable_node_ids {
            request.address()
        } else {
            request.message.index().map(NodeAddress::Position)
        }
    }

    /// Redesign the section at `address` in the active variant
    ///
    /// # Errors
    /// Input, busy, generation, parse and addressing errors; none of them
    /// leave a trace in the store
    pub async fn remix(&self, markup: &str, address: NodeAddress) -> Result<EditOutcome, EditError> {
        if markup.trim().is_empty() {
            return Err(EditError::Input("Nothing to remix".to_owned()));
        }
        let pending = self.begin()?;
        tracing::info!(variant = %pending.label, %address, "Remixing section");

        let prompt = prompts::section_remix(markup, &self.remix_instruction);
        let raw = self.generator.generate(&prompt).await?;
        let replacement = parse::<RemixMarkup>(&raw)?.into_inner();

        let patch = Patch::ReplaceSection { address, markup: replacement };
        pending.complete(&patch, self.stable_node_ids, "Section remixed")
    }

    /// Rewrite the text leaf at `address` in the active variant
    ///
    /// # Errors
    /// Input, busy, generation, parse and addressing errors (including a
    /// tag mismatch); none of them leave a trace in the store
    pub async fn polish(&self, text: &str, tag_name: &str, address: NodeAddress) -> Result<EditOutcome, EditError> {
        if text.trim().is_empty() {
            return Err(EditError::Input("Nothing to polish".to_owned()));
        }
        if tag_name.trim().is_empty() {
            return Err(EditError::Input("Missing tag name".to_owned()));
        }
        let pending = self.begin()?;
        tracing::info!(variant = %pending.label, %address, tag = tag_name, "Polishing copy");

        let prompt = prompts::copy_polish(text, Some(&self.polish_instruction));
        let raw = self.generator.generate(&prompt).await?;
        let copy = parse::<PolishedCopy>(&raw)?;

        let patch = Patch::ReplaceText {
            address,
            expected_tag: tag_name.to_owned(),
            text: copy.text,
        };
        pending.complete(&patch, false, "Copy polished")
    }

    /// Step the active variant back one snapshot
    ///
    /// # Errors
    /// [`EditError::Busy`] while a generation is outstanding,
    /// [`EditError::History`] if there is nothing to undo
    pub fn undo(&self) -> Result<EditOutcome, EditError> {
        self.step(Variant::undo, "Undone")
    }

    /// Step the active variant forward one snapshot
    ///
    /// # Errors
    /// [`EditError::Busy`] while a generation is outstanding,
    /// [`EditError::History`] if there is nothing to redo
    pub fn redo(&self) -> Result<EditOutcome, EditError> {
        self.step(Variant::redo, "Redone")
    }

    fn step(
        &self,
        apply: fn(&mut Variant) -> Result<(), vibe_document::HistoryError>,
        notice: &str,
    ) -> Result<EditOutcome, EditError> {
        let mut store = self.store.lock();
        let label = store.active_label();
        let variant = store.require_mut(label)?;
        if variant.state() == EditState::AwaitingGeneration {
            return Err(EditError::Busy(label));
        }
        apply(variant).map_err(|err| {
            tracing::debug!(variant = %label, error = %err, "History step was a no-op");
            err
        })?;
        tracing::info!(variant = %label, undo = variant.history().undo_len(), redo = variant.history().redo_len(), "{notice}");
        Ok(EditOutcome::of(variant, notice))
    }

    /// Install a freshly generated variant, replacing its slot wholesale
    ///
    /// # Errors
    /// [`EditError::Busy`] if the slot has an edit in flight
    pub fn install(&self, variant: Variant, activate: bool) -> Result<Revision, EditError> {
        let mut store = self.store.lock();
        let label = variant.label();
        if store.get(label).is_some_and(|v| v.state() == EditState::AwaitingGeneration) {
            return Err(EditError::Busy(label));
        }
        let revision = variant.revision();
        store.replace_variant(variant);
        if activate {
            store.activate(label)?;
        }
        Ok(revision)
    }

    /// Make `label` the variant edits apply to
    ///
    /// # Errors
    /// Returns error if the slot has not been generated
    pub fn activate(&self, label: VariantLabel) -> Result<(), EditError> {
        self.store.lock().activate(label)?;
        Ok(())
    }

    /// Normalise a generated page into the markup the preview serves,
    /// annotated with stable ids when they are enabled
    ///
    /// # Errors
    /// Returns error if the page cannot be serialized
    pub fn prepare_markup(&self, html: &str) -> Result<String, EditError> {
        let prepared = if self.stable_node_ids {
            annotate(html)
        } else {
            HtmlDocument::parse(html).to_markup()
        };
        prepared.map_err(|err| EditError::Patch(err.into()))
    }

    fn begin(&self) -> Result<PendingEdit<'_>, EditError> {
        let mut store = self.store.lock();
        let label = store.active_label();
        let variant = store.require_mut(label)?;
        if variant.is_empty() {
            return Err(EditError::Input("Generate a page before editing it".to_owned()));
        }
        if variant.state() == EditState::AwaitingGeneration {
            tracing::warn!(variant = %label, "Rejected edit while another is in flight");
            return Err(EditError::Busy(label));
        }
        variant.record_for_undo();
        variant.set_state(EditState::AwaitingGeneration);
        Ok(PendingEdit {
            store: &self.store,
            label,
            armed: true,
        })
    }
}

/// An edit between snapshot and commit. Dropping it unarmed is a no-op;
/// dropping it armed rolls the snapshot back.
struct PendingEdit<'a> {
    store: &'a Mutex<DocumentStore>,
    label: VariantLabel,
    armed: bool,
}

impl PendingEdit<'_> {
    fn complete(mut self, patch: &Patch, annotate_ids: bool, notice: &str) -> Result<EditOutcome, EditError> {
        let outcome = {
            let mut store = self.store.lock();
            let variant = store.require_mut(self.label)?;
            let patched = apply_patch(variant.html(), patch).and_then(|html| {
                if annotate_ids {
                    annotate(&html).map_err(Into::into)
                } else {
                    Ok(html)
                }
            });
            match patched {
                Ok(html) => {
                    variant.commit(html);
                    variant.set_state(EditState::Idle);
                    Ok(EditOutcome::of(variant, notice))
                }
                Err(err) => Err(err),
            }
        };

        match outcome {
            Ok(outcome) => {
                self.armed = false;
                tracing::info!(variant = %self.label, revision = %outcome.revision.short(), "{notice}");
                Ok(outcome)
            }
            Err(err) => {
                tracing::warn!(variant = %self.label, error = %err, "Patch rejected");
                Err(err.into())
            }
        }
    }
}

impl Drop for PendingEdit<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut store = self.store.lock();
        if let Some(variant) = store.get_mut(self.label) {
            variant.discard_last_record();
            variant.set_state(EditState::Idle);
        }
        tracing::debug!(variant = %self.label, "Rolled back pending edit");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mockall::mock;
    use pretty_assertions::assert_eq;
    use vibe_document::HtmlDocument;
    use vibe_genai::{GenAiError, Prompt};

    mock! {
        Generator {}

        #[async_trait]
        impl GenerationService for Generator {
            async fn generate(&self, prompt: &Prompt) -> Result<String, GenAiError>;
        }
    }

    const PAGE: &str = "<!DOCTYPE html><html><head></head><body><h1>Hi</h1><p>World</p></body></html>";

    fn positional() -> CoreConfig {
        CoreConfig::default().with_stable_node_ids(false)
    }

    fn orchestrator(generator: MockGenerator, config: &CoreConfig) -> EditOrchestrator {
        let store = DocumentStore::with_variant(Variant::generated(VariantLabel::A, PAGE, "", "Modern Clean"));
        EditOrchestrator::new(store, Arc::new(generator), config)
    }

    fn replying(reply: &'static str) -> MockGenerator {
        let mut generator = MockGenerator::new();
        generator.expect_generate().returning(move |_| Ok(reply.to_owned()));
        generator
    }

    fn body(orchestrator: &EditOrchestrator) -> String {
        orchestrator.inspect(|store| HtmlDocument::parse(store.active().html()).body_markup().unwrap())
    }

    fn history(orchestrator: &EditOrchestrator) -> (usize, usize) {
        orchestrator.inspect(|store| {
            let history = store.active().history();
            (history.undo_len(), history.redo_len())
        })
    }

    #[tokio::test]
    async fn remix_then_undo_then_redo() {
        let orchestrator = orchestrator(replying("```html\n<h1>Hello</h1>\n```"), &positional());

        let outcome = orchestrator.remix("<h1>Hi</h1>", NodeAddress::Position(0)).await.unwrap();
        assert!(outcome.can_undo);
        assert!(!outcome.can_redo);
        assert_eq!(body(&orchestrator), "<h1>Hello</h1><p>World</p>");

        orchestrator.undo().unwrap();
        assert_eq!(body(&orchestrator), "<h1>Hi</h1><p>World</p>");
        orchestrator.redo().unwrap();
        assert_eq!(body(&orchestrator), "<h1>Hello</h1><p>World</p>");
    }

    #[tokio::test]
    async fn polish_checks_tag() {
        let orchestrator = orchestrator(replying("{\"text\": \"Earth\"}"), &positional());

        let err = orchestrator.polish("World", "span", NodeAddress::Position(1)).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Addressing);
        assert_eq!(body(&orchestrator), "<h1>Hi</h1><p>World</p>");
        assert_eq!(history(&orchestrator), (0, 0));

        orchestrator.polish("World", "p", NodeAddress::Position(1)).await.unwrap();
        assert_eq!(body(&orchestrator), "<h1>Hi</h1><p>Earth</p>");
    }

    #[tokio::test]
    async fn out_of_range_remix_rolls_back() {
        let orchestrator = orchestrator(replying("<h1>Hello</h1>"), &positional());
        for index in [2, -1] {
            let err = orchestrator.remix("<h1>Hi</h1>", NodeAddress::Position(index)).await.unwrap_err();
            assert_eq!(err.kind(), crate::ErrorKind::Addressing);
        }
        assert_eq!(history(&orchestrator), (0, 0));
        assert_eq!(orchestrator.inspect(|s| s.active().state()), EditState::Idle);
    }

    #[tokio::test]
    async fn generation_failure_leaves_no_trace() {
        let mut generator = MockGenerator::new();
        generator
            .expect_generate()
            .times(1)
            .returning(|_| Err(GenAiError::Exhausted { model: "m".into(), attempts: 3 }));
        let orchestrator = orchestrator(generator, &positional());

        let err = orchestrator.remix("<h1>Hi</h1>", NodeAddress::Position(0)).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ExternalTransient);
        assert_eq!(history(&orchestrator), (0, 0));
        assert_eq!(orchestrator.undo().unwrap_err().kind(), crate::ErrorKind::NoOp);
    }

    #[tokio::test]
    async fn garbled_output_is_a_parse_error() {
        let orchestrator = orchestrator(replying("Sorry, I can't do that."), &positional());
        let err = orchestrator.polish("World", "p", NodeAddress::Position(1)).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Parse);
        assert_eq!(history(&orchestrator), (0, 0));
    }

    #[tokio::test]
    async fn blank_input_never_reaches_the_service() {
        let mut generator = MockGenerator::new();
        generator.expect_generate().never();
        let orchestrator = orchestrator(generator, &positional());
        let err = orchestrator.remix("   ", NodeAddress::Position(0)).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Input);
    }

    #[tokio::test]
    async fn new_edit_clears_redo() {
        let orchestrator = orchestrator(replying("<h1>Hello</h1>"), &positional());
        orchestrator.remix("<h1>Hi</h1>", NodeAddress::Position(0)).await.unwrap();
        orchestrator.undo().unwrap();
        assert_eq!(history(&orchestrator), (0, 1));

        orchestrator.remix("<h1>Hi</h1>", NodeAddress::Position(0)).await.unwrap();
        assert_eq!(history(&orchestrator), (1, 0));
        assert_eq!(orchestrator.redo().unwrap_err().kind(), crate::ErrorKind::NoOp);
    }

    #[tokio::test]
    async fn busy_variant_rejects_everything() {
        let orchestrator = orchestrator(replying("<h1>Hello</h1>"), &positional());
        let pending = orchestrator.begin().unwrap();

        let err = orchestrator.remix("<h1>Hi</h1>", NodeAddress::Position(0)).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Busy);
        assert_eq!(orchestrator.undo().unwrap_err().kind(), crate::ErrorKind::Busy);

        drop(pending);
        assert_eq!(history(&orchestrator), (0, 0));
        orchestrator.remix("<h1>Hi</h1>", NodeAddress::Position(0)).await.unwrap();
    }

    #[tokio::test]
    async fn stable_ids_survive_earlier_edits() {
        let mut generator = MockGenerator::new();
        let mut replies = vec![
            "{\"text\": \"Earth\"}".to_owned(),
            "<section><h2>New</h2><p>Two</p></section>".to_owned(),
        ];
        generator.expect_generate().returning(move |_| Ok(replies.pop().unwrap_or_default()));

        let config = CoreConfig::default();
        let orchestrator = orchestrator(generator, &config);
        let annotated = orchestrator.prepare_markup(PAGE).unwrap();
        orchestrator
            .install(Variant::generated(VariantLabel::A, annotated, "", "Modern Clean"), true)
            .unwrap();

        // remix replaces the heading with a section holding two leaves
        let request = SandboxRequest::new(SandboxMessage::Remix { html: "<h1>Hi</h1>".into(), index: 0 })
            .with_node_id("s-0");
        orchestrator.handle_message(&request).await.unwrap();

        // "World" moved from leaf 1 to leaf 2; its id still finds it
        let request = SandboxRequest::new(SandboxMessage::Copy {
            text: "World".into(),
            index: 1,
            tag_name: "p".into(),
        })
        .with_node_id("t-1");
        orchestrator.handle_message(&request).await.unwrap();

        let body = body(&orchestrator);
        assert!(body.contains(">Earth</p>"), "{body}");
        assert!(body.contains(">Two</p>"), "{body}");
    }

    #[tokio::test]
    async fn undo_redo_messages_dispatch() {
        let orchestrator = orchestrator(replying("<h1>Hello</h1>"), &positional());
        let undo = SandboxRequest::new(SandboxMessage::Undo);
        let err = orchestrator.handle_message(&undo).await.unwrap_err();
        assert_eq!(err.user_message(), "Nothing to undo");

        let remix = SandboxRequest::new(SandboxMessage::Remix { html: "<h1>Hi</h1>".into(), index: 0 });
        orchestrator.handle_message(&remix).await.unwrap();
        let outcome = orchestrator.handle_message(&undo).await.unwrap();
        assert!(outcome.can_redo);
        assert_eq!(outcome.notice, "Undone");
    }
}
