//! Prompt builders
//!
//! Each builder states the exact output shape its parser in
//! [`crate::parsers`] expects.

use crate::service::{InlineImage, Prompt};

/// Instruction used for section remix when the caller supplies none
pub const DEFAULT_REMIX_INSTRUCTION: &str =
    "Change the layout and style of this component to be completely different but keep the content.";

/// Instruction used for copy polish when the caller supplies none
pub const DEFAULT_POLISH_INSTRUCTION: &str = "Make it more persuasive, punchy, and conversion-focused.";

/// Description used for image-to-page generation without a prompt
pub const DEFAULT_IMAGE_DESCRIPTION: &str = "Recreate this website design exactly.";

/// Whole-page generation, optionally guided by a reference screenshot
#[must_use]
pub fn page_generation(description: &str, style: Option<&str>, reference: Option<InlineImage>) -> Prompt {
    let style_line = style
        .filter(|s| !s.trim().is_empty())
        .map(|s| format!("STYLE: {s}\n"))
        .unwrap_or_default();

    let text = format!(
        "You are an expert web designer and frontend developer. \
Generate a production-ready landing page based on this description.\n\n\
DESCRIPTION: {description}\n{style_line}\n\
Return ONLY valid JSON in this exact format:\n\
{{\n  \"html\": \"<!DOCTYPE html>...\",\n  \"css\": \"body {{ ... }}\"\n}}\n\n\
Rules:\n\
1. The HTML is a complete single-page landing page with a hero, features and a footer.\n\
2. Use semantic HTML5 with top-level <header>, <section> and <footer> elements directly under <body>.\n\
3. The CSS is modern, responsive and visually striking.\n\
4. Write raw CSS in the css field; do not depend on a CSS framework there.\n\
5. The design should be unique, bold and professional."
    );

    let prompt = Prompt::text(text);
    match reference {
        Some(image) => prompt
            .with_image(image)
            .with_text("Use this image as a reference for the layout and design."),
        None => prompt,
    }
}

/// Redesign of one section's markup
#[must_use]
pub fn section_remix(markup: &str, instruction: &str) -> Prompt {
    let instruction = non_blank_or(instruction, DEFAULT_REMIX_INSTRUCTION);
    Prompt::text(format!(
        "You are a world-class UI/UX designer and creative director.\n\
Completely reimagine the design of the following HTML component based on this instruction: \"{instruction}\".\n\n\
HTML:\n{markup}\n\n\
Rules:\n\
1. Be bold: change the layout, typography and visual hierarchy, not just padding or colors.\n\
2. Use modern design trends (glassmorphism, neo-brutalism, bento grids, asymmetry) where they fit.\n\
3. Return ONLY the new HTML for this component, with no explanation and no code fences.\n\
4. Keep the content (text and images) mostly the same; re-order or re-structure it for impact.\n\
5. Use Tailwind CSS utility classes.\n\
6. Do not include <html>, <head> or <body> tags, only the component itself.\n\
7. If the instruction implies a specific style, commit to it fully."
    ))
}

/// Rewrite of one piece of copy
#[must_use]
pub fn copy_polish(text: &str, instruction: Option<&str>) -> Prompt {
    let instruction = non_blank_or(instruction.unwrap_or_default(), DEFAULT_POLISH_INSTRUCTION);
    Prompt::text(format!(
        "You are a world-class copywriter and conversion rate optimization expert.\n\
Rewrite the provided text following the instruction.\n\n\
Original Text: \"{text}\"\n\
Instruction: {instruction}\n\n\
Rules:\n\
1. Keep the length similar to the original unless instructed otherwise.\n\
2. Keep the original meaning but improve clarity and impact.\n\
3. No markdown formatting.\n\
4. A button label stays short and action-oriented; a headline becomes catchy and benefit-driven.\n\n\
Return a JSON object:\n\
{{\n  \"text\": \"Your rewritten text here\"\n}}"
    ))
}

/// Harsh but constructive design critique of a screenshot
#[must_use]
pub fn roast(image: InlineImage) -> Prompt {
    Prompt::text(
        "You are a brutal design critic. Roast this landing page design.\n\
Be funny, harsh, but constructive. Focus on typography, color palette, spacing and layout, and overall vibe.\n\n\
Return a JSON object:\n\
{\n  \"roast\": \"Your roast here...\",\n  \"score\": 42,\n  \"improvements\": [\"Fix this\", \"Change that\"]\n}\n\
score is an integer from 0 to 100.",
    )
    .with_image(image)
}

/// Aesthetic score and vibe label for a screenshot
#[must_use]
pub fn vibe_score(image: InlineImage) -> Prompt {
    Prompt::text(
        "Analyze the \"vibe\" of this website design.\n\
Return a JSON object:\n\
{\n  \"score\": 85,\n  \"vibe\": \"Cyberpunk Minimalist\",\n  \"explanation\": \"Why it has this vibe...\"\n}\n\
score is an integer from 0 to 100.",
    )
    .with_image(image)
}

/// Predicted attention focal points for a screenshot
#[must_use]
pub fn heatmap(image: InlineImage) -> Prompt {
    Prompt::text(
        "Analyze this UI screenshot and predict the top 3 areas that will capture user attention (focal points).\n\
Return ONLY a JSON array with this exact structure:\n\
[\n  { \"x\": 50, \"y\": 50, \"label\": \"Headline\", \"reason\": \"High contrast and large typography\" }\n]\n\
x and y are percentages (0-100) of the image width and height at the center of the focal point.\n\
Order them by intensity, most attention first.",
    )
    .with_image(image)
}

/// Design-system extraction from a logo or product image
#[must_use]
pub fn brand_match(image: InlineImage) -> Prompt {
    Prompt::text(
        "Analyze this brand image (logo or product) and extract its design system.\n\
Return ONLY a JSON object with this exact structure:\n\
{\n  \"vibe\": \"A short, evocative description of the brand's personality\",\n  \
\"colors\": [\n    { \"name\": \"Primary\", \"hex\": \"#HEXCODE\", \"usage\": \"Main brand color\" },\n    \
{ \"name\": \"Secondary\", \"hex\": \"#HEXCODE\", \"usage\": \"Accents and highlights\" },\n    \
{ \"name\": \"Background\", \"hex\": \"#HEXCODE\", \"usage\": \"Page background\" }\n  ],\n  \
\"fonts\": {\n    \"primary\": \"Google Font for headings\",\n    \"secondary\": \"Google Font for body text\"\n  }\n}",
    )
    .with_image(image)
}

fn non_blank_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}
