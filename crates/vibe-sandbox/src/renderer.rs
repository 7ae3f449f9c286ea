//! Preview document rendering
//!
//! The preview is a complete document served as the iframe's content. The
//! stored page is normalised through the HTML parser and then extended in
//! tree form, never by string search on `</head>`:
//!
//! - `<head>`: styling framework script, icon font, page CSS, affordance CSS
//! - `<body>` end: JSON config block and the bridge script
//!
//! Page CSS and config are escaped so they cannot close their enclosing
//! element.

use serde::Serialize;
use vibe_document::dom::append_fragment;
use vibe_document::{DomError, HtmlDocument, SECTION_ID_ATTR, TEXT_ID_ATTR, TEXT_LEAF_TAGS};

/// Styling framework loaded into every preview
pub const DEFAULT_FRAMEWORK_SCRIPT: &str = "https://cdn.tailwindcss.com";

/// Icon font loaded into every preview
pub const DEFAULT_ICON_STYLESHEET: &str = "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.0.0/css/all.min.css";

/// Sandbox permissions of the preview iframe: scripts only
pub const IFRAME_SANDBOX: &str = "allow-scripts";

/// Element id of the injected config block
pub const CONFIG_ELEMENT_ID: &str = "vibestack-sandbox-config";

const AFFORDANCE_CSS: &str = include_str!("../assets/affordances.css");
const BRIDGE_SCRIPT: &str = include_str!("../assets/bridge.js");

/// Attributes the host must put on the preview iframe
#[must_use]
pub fn iframe_attributes() -> [(&'static str, &'static str); 2] {
    [("sandbox", IFRAME_SANDBOX), ("title", "Generated Preview")]
}

/// Per-render options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Scroll offset to restore once the preview has loaded
    pub restore_scroll: Option<u32>,
    /// Inject the editing affordances
    pub interactive: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            restore_scroll: None,
            interactive: true,
        }
    }
}

impl RenderOptions {
    /// Read-only preview, as used for published pages
    #[must_use]
    pub const fn static_view() -> Self {
        Self {
            restore_scroll: None,
            interactive: false,
        }
    }

    #[must_use]
    pub const fn with_restore_scroll(mut self, scroll_y: Option<u32>) -> Self {
        self.restore_scroll = scroll_y;
        self
    }
}

/// Errors from building the preview
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("document has no {0} element")]
    MissingElement(&'static str),

    #[error(transparent)]
    Dom(#[from] DomError),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BridgeConfig<'a> {
    interactive: bool,
    restore_scroll: Option<u32>,
    section_attr: &'a str,
    text_attr: &'a str,
    leaf_tags: &'a [&'a str],
}

/// Builds preview documents
#[derive(Debug, Clone)]
pub struct SandboxRenderer {
    framework_script: String,
    icon_stylesheet: String,
}

impl Default for SandboxRenderer {
    fn default() -> Self {
        Self {
            framework_script: DEFAULT_FRAMEWORK_SCRIPT.to_owned(),
            icon_stylesheet: DEFAULT_ICON_STYLESHEET.to_owned(),
        }
    }
}

impl SandboxRenderer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_framework_script(mut self, url: impl Into<String>) -> Self {
        self.framework_script = url.into();
        self
    }

    #[must_use]
    pub fn with_icon_stylesheet(mut self, url: impl Into<String>) -> Self {
        self.icon_stylesheet = url.into();
        self
    }

    /// Render `html` + `css` as a preview document
    ///
    /// # Errors
    /// Returns error if the normalised document cannot be serialised
    pub fn render(&self, html: &str, css: &str, options: &RenderOptions) -> Result<String, RenderError> {
        let doc = HtmlDocument::parse(html);
        let head = doc.head().ok_or(RenderError::MissingElement("head"))?;
        let body = doc.body().ok_or(RenderError::MissingElement("body"))?;

        if !html.contains(&self.framework_script) {
            append_fragment(&head, &format!("<script src=\"{}\"></script>", escape_attr(&self.framework_script)));
        }
        append_fragment(
            &head,
            &format!("<link rel=\"stylesheet\" href=\"{}\">", escape_attr(&self.icon_stylesheet)),
        );
        if !css.trim().is_empty() {
            append_fragment(&head, &format!("<style>{}</style>", escape_raw_text(css)));
        }

        if options.interactive || options.restore_scroll.is_some() {
            if options.interactive {
                append_fragment(&head, &format!("<style>{AFFORDANCE_CSS}</style>"));
            }
            let config = BridgeConfig {
                interactive: options.interactive,
                restore_scroll: options.restore_scroll,
                section_attr: SECTION_ID_ATTR,
                text_attr: TEXT_ID_ATTR,
                leaf_tags: TEXT_LEAF_TAGS,
            };
            append_fragment(
                &body,
                &format!(
                    "<script type=\"application/json\" id=\"{CONFIG_ELEMENT_ID}\">{}</script><script>{BRIDGE_SCRIPT}</script>",
                    json_for_script(&config)
                ),
            );
        }

        let rendered = doc.to_markup()?;
        tracing::debug!(
            bytes = rendered.len(),
            interactive = options.interactive,
            restore_scroll = ?options.restore_scroll,
            "Rendered sandbox preview"
        );
        Ok(rendered)
    }
}

/// `</` cannot appear inside `<style>` without ending it; `<\/` is the same
/// text to the CSS tokenizer
fn escape_raw_text(text: &str) -> String {
    text.replace("</", "<\\/")
}

/// `<` only occurs inside JSON strings, where `\u003c` decodes back to it
fn json_for_script<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_owned()).replace('<', "\\u003c")
}

pub(crate) fn escape_attr(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PAGE: &str = "<!DOCTYPE html><html><head><title>t</title></head><body><h1>Hi</h1><p>World</p></body></html>";

    fn render(html: &str, css: &str, options: RenderOptions) -> String {
        SandboxRenderer::new().render(html, css, &options).unwrap()
    }

    #[test]
    fn injects_assets_into_head_and_bridge_into_body() {
        let out = render(PAGE, "h1 { color: red; }", RenderOptions::default());
        let head_end = out.find("</head>").unwrap();

        for asset in [DEFAULT_FRAMEWORK_SCRIPT, DEFAULT_ICON_STYLESHEET, "h1 { color: red; }", ".vibestack-remix-btn"] {
            let at = out.find(asset).unwrap_or_else(|| panic!("missing {asset}"));
            assert!(at < head_end, "{asset} not in head");
        }
        let bridge = out.find(CONFIG_ELEMENT_ID).unwrap();
        assert!(bridge > out.find("<p>World</p>").unwrap());
        assert!(out.starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn page_targets_are_unchanged() {
        let out = render(PAGE, "", RenderOptions::default());
        let doc = HtmlDocument::parse(&out);
        let sections: Vec<_> = doc
            .sections()
            .iter()
            .filter_map(|n| vibe_document::dom::tag_name(n).map(str::to_owned))
            .collect();
        assert_eq!(sections, ["h1", "p"]);
        assert_eq!(doc.text_leaves().len(), 2);
    }

    #[test]
    fn framework_is_not_loaded_twice() {
        let page = format!("<html><head><script src=\"{DEFAULT_FRAMEWORK_SCRIPT}\"></script></head><body></body></html>");
        let out = render(&page, "", RenderOptions::default());
        assert_eq!(out.matches(DEFAULT_FRAMEWORK_SCRIPT).count(), 1);
    }

    #[test]
    fn css_cannot_close_its_style_element() {
        let out = render(PAGE, "a::after { content: \"</style><script>alert(1)</script>\"; }", RenderOptions::default());
        assert!(!out.contains("</style><script>alert(1)"));
        assert!(out.contains("content: \"<\\/style><script>alert(1)<\\/script>\";"));
    }

    #[test]
    fn config_carries_scroll_and_escapes_markup() {
        let out = render(PAGE, "", RenderOptions::default().with_restore_scroll(Some(640)));
        assert!(out.contains("\"restoreScroll\":640"));
        assert!(out.contains("\"sectionAttr\":\"data-vibe-section\""));

        let config = json_for_script(&serde_json::json!({ "x": "</script>" }));
        assert_eq!(config, "{\"x\":\"\\u003c/script>\"}");
    }

    #[test]
    fn static_view_has_no_affordances() {
        let out = render(PAGE, "", RenderOptions::static_view());
        assert!(!out.contains(".vibestack-remix-btn"));
        assert!(!out.contains(CONFIG_ELEMENT_ID));
        assert!(out.contains(DEFAULT_FRAMEWORK_SCRIPT));
    }

    #[test]
    fn fragments_are_wrapped_in_a_document() {
        let out = render("<section>Only</section>", "", RenderOptions::default());
        assert!(out.starts_with("<!DOCTYPE html><html><head>"));
        assert!(out.contains("<body><section>Only</section>"));
    }

    #[test]
    fn bridge_script_cannot_terminate_early() {
        assert!(!BRIDGE_SCRIPT.contains("</"));
        assert!(!AFFORDANCE_CSS.contains("</"));
    }

    #[test]
    fn iframe_is_script_only() {
        assert_eq!(iframe_attributes()[0], ("sandbox", "allow-scripts"));
    }
}
