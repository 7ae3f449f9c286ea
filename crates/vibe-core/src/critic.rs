//! Stateless generation and critique operations
//!
//! Image analyses are cached by screenshot digest; page generation, remix
//! and polish always call the service.

use crate::config::CoreConfig;
use crate::error::CoreError;
use std::sync::Arc;
use vibe_genai::parsers::{BrandKit, GeneratedPage, Heatmap, PolishedCopy, RemixMarkup, Roast, VibeScore};
use vibe_genai::prompts::{self, DEFAULT_IMAGE_DESCRIPTION};
use vibe_genai::{parse, AnalysisCache, GenerationService, InlineImage, ModelOutput, Prompt};

/// Critique and one-shot generation front end
#[derive(Clone)]
pub struct Critic {
    generator: Arc<dyn GenerationService>,
    cache: AnalysisCache,
}

impl std::fmt::Debug for Critic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Critic")
            .field("generator", &self.generator.name())
            .field("cached", &self.cache.entry_count())
            .finish()
    }
}

impl Critic {
    #[must_use]
    pub fn new(generator: Arc<dyn GenerationService>, config: &CoreConfig) -> Self {
        Self {
            generator,
            cache: AnalysisCache::new(config.cache_capacity, config.cache_ttl),
        }
    }

    /// Critic sharing an existing cache
    #[must_use]
    pub fn with_cache(generator: Arc<dyn GenerationService>, cache: AnalysisCache) -> Self {
        Self { generator, cache }
    }

    /// Underlying generation service
    #[must_use]
    pub fn generator(&self) -> Arc<dyn GenerationService> {
        Arc::clone(&self.generator)
    }

    /// Generate a whole page from a description, a reference screenshot or
    /// both
    ///
    /// # Errors
    /// Input errors if neither is given; generation and parse errors
    pub async fn generate_page(
        &self,
        description: Option<&str>,
        reference: Option<InlineImage>,
        style: Option<&str>,
    ) -> Result<GeneratedPage, CoreError> {
        let description = description.map(str::trim).filter(|d| !d.is_empty());
        let description = match (description, &reference) {
            (Some(description), _) => description,
            (None, Some(_)) => DEFAULT_IMAGE_DESCRIPTION,
            (None, None) => return Err(CoreError::Input("Prompt is required".to_owned())),
        };
        if let Some(image) = &reference {
            validate_image(image)?;
        }
        tracing::info!(style = style.unwrap_or("default"), image = reference.is_some(), "Generating page");
        self.call(&prompts::page_generation(description, style, reference)).await
    }

    /// Redesign a standalone fragment
    ///
    /// # Errors
    /// Input errors for blank markup; generation and parse errors
    pub async fn remix_fragment(&self, html: &str, instruction: &str) -> Result<String, CoreError> {
        if html.trim().is_empty() || instruction.trim().is_empty() {
            return Err(CoreError::Input("HTML and instruction are required".to_owned()));
        }
        let remix: RemixMarkup = self.call(&prompts::section_remix(html, instruction)).await?;
        Ok(remix.into_inner())
    }

    /// Rewrite a piece of copy
    ///
    /// # Errors
    /// Input errors for blank text; generation and parse errors
    pub async fn polish_text(&self, text: &str, instruction: Option<&str>) -> Result<String, CoreError> {
        if text.trim().is_empty() {
            return Err(CoreError::Input("Text is required".to_owned()));
        }
        let copy: PolishedCopy = self.call(&prompts::copy_polish(text, instruction)).await?;
        Ok(copy.text)
    }

    /// Brutally honest design feedback
    ///
    /// # Errors
    /// Input, generation and parse errors
    pub async fn roast(&self, image: InlineImage) -> Result<Roast, CoreError> {
        self.analyse(image, prompts::roast).await
    }

    /// # Errors
    /// Input, generation and parse errors
    pub async fn vibe_score(&self, image: InlineImage) -> Result<VibeScore, CoreError> {
        self.analyse(image, prompts::vibe_score).await
    }

    /// Predicted attention points
    ///
    /// # Errors
    /// Input, generation and parse errors
    pub async fn heatmap(&self, image: InlineImage) -> Result<Heatmap, CoreError> {
        self.analyse(image, prompts::heatmap).await
    }

    /// Colors, fonts and vibe of a screenshot
    ///
    /// # Errors
    /// Input, generation and parse errors
    pub async fn brand_match(&self, image: InlineImage) -> Result<BrandKit, CoreError> {
        self.analyse(image, prompts::brand_match).await
    }

    async fn analyse<T>(&self, image: InlineImage, build: fn(InlineImage) -> Prompt) -> Result<T, CoreError>
    where
        T: ModelOutput + Clone + Send + Sync + 'static,
    {
        validate_image(&image)?;
        let key = AnalysisCache::key(T::KIND, &image);
        self.cache
            .try_get_or_insert_with(key, || async move {
                tracing::info!(kind = T::KIND, "Analysing screenshot");
                self.call::<T>(&build(image)).await
            })
            .await
    }

    async fn call<T: ModelOutput>(&self, prompt: &Prompt) -> Result<T, CoreError> {
        let raw = self.generator.generate(prompt).await?;
        tracing::debug!(kind = T::KIND, chars = raw.len(), "Model responded");
        Ok(parse::<T>(&raw)?)
    }
}

fn validate_image(image: &InlineImage) -> Result<(), CoreError> {
    if image.data_base64.trim().is_empty() {
        return Err(CoreError::Input("Image is required".to_owned()));
    }
    if !image.mime_type.starts_with("image/") {
        return Err(CoreError::Input(format!("Unsupported image type: {}", image.mime_type)));
    }
    Ok(())
}
