use proptest::prelude::*;
use vibe_document::{apply_patch, HistoryError, HtmlDocument, NodeAddress, Patch, Variant, VariantLabel};

const PAGE: &str = "<!DOCTYPE html><html><head></head><body><h1>Hi</h1><p>World</p><ul><li>One</li><li>Two</li></ul></body></html>";

#[derive(Debug, Clone)]
enum Op {
    Polish { index: i64, word: String },
    Remix { index: i64, word: String },
    Undo,
    Redo,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0i64..4, "[a-z]{1,8}").prop_map(|(index, word)| Op::Polish { index, word }),
        (0i64..3, "[a-z]{1,8}").prop_map(|(index, word)| Op::Remix { index, word }),
        Just(Op::Undo),
        Just(Op::Redo),
    ]
}

/// Mirror of the orchestrator's commit path without the external call
fn edit(variant: &mut Variant, patch: &Patch) -> bool {
    variant.record_for_undo();
    match apply_patch(variant.html(), patch) {
        Ok(html) => {
            variant.commit(html);
            true
        }
        Err(_) => {
            variant.discard_last_record();
            false
        }
    }
}

fn polish_patch(variant: &Variant, index: i64, word: &str) -> Patch {
    let doc = HtmlDocument::parse(variant.html());
    let tag = doc
        .text_leaves()
        .get(usize::try_from(index).unwrap_or(usize::MAX))
        .and_then(|n| vibe_document::dom::tag_name(n).map(str::to_owned))
        .unwrap_or_else(|| "p".into());
    Patch::ReplaceText {
        address: NodeAddress::Position(index),
        expected_tag: tag,
        text: word.to_owned(),
    }
}

proptest! {
    #[test]
    fn undo_after_edit_restores_and_redo_reapplies(ops in prop::collection::vec(op(), 0..24)) {
        let mut variant = Variant::generated(VariantLabel::A, PAGE, "", "Minimalist");

        for op in ops {
            match op {
                Op::Polish { index, word } => {
                    let before = variant.html().to_owned();
                    let patch = polish_patch(&variant, index, &word);
                    if edit(&mut variant, &patch) {
                        let after = variant.html().to_owned();
                        prop_assert!(!variant.history().can_redo());
                        prop_assert_eq!(variant.redo(), Err(HistoryError::NothingToRedo));
                        variant.undo().unwrap();
                        prop_assert_eq!(variant.html(), before.as_str());
                        variant.redo().unwrap();
                        prop_assert_eq!(variant.html(), after.as_str());
                    } else {
                        prop_assert_eq!(variant.html(), before.as_str());
                    }
                }
                Op::Remix { index, word } => {
                    let before = variant.html().to_owned();
                    let undo_len = variant.history().undo_len();
                    let patch = Patch::ReplaceSection {
                        address: NodeAddress::Position(index),
                        markup: format!("<section>{word}</section>"),
                    };
                    if edit(&mut variant, &patch) {
                        variant.undo().unwrap();
                        prop_assert_eq!(variant.html(), before.as_str());
                        variant.redo().unwrap();
                    } else {
                        prop_assert_eq!(variant.html(), before.as_str());
                        prop_assert_eq!(variant.history().undo_len(), undo_len);
                    }
                }
                Op::Undo => {
                    let before = variant.html().to_owned();
                    let had = variant.history().can_undo();
                    let result = variant.undo();
                    prop_assert_eq!(result.is_ok(), had);
                    if !had {
                        prop_assert_eq!(variant.html(), before.as_str());
                    }
                }
                Op::Redo => {
                    let before = variant.html().to_owned();
                    let had = variant.history().can_redo();
                    let result = variant.redo();
                    prop_assert_eq!(result.is_ok(), had);
                    if !had {
                        prop_assert_eq!(variant.html(), before.as_str());
                    }
                }
            }
        }
    }

    #[test]
    fn reserialization_is_stable(
        parts in prop::collection::vec(
            (prop::sample::select(vec!["h1", "p", "div", "span", "section", "li"]), "[a-zA-Z &>]{0,12}"),
            0..8,
        )
    ) {
        let body: String = parts.iter().map(|(tag, text)| format!("<{tag}>{text}</{tag}>")).collect();
        let markup = format!("<!DOCTYPE html><html><head></head><body>{body}</body></html>");
        let once = HtmlDocument::parse(&markup).to_markup().unwrap();
        let twice = HtmlDocument::parse(&once).to_markup().unwrap();
        prop_assert_eq!(once, twice);
    }
}

#[test]
fn remix_then_undo_scenario() {
    let page = "<!DOCTYPE html><html><head></head><body><h1>Hi</h1><p>World</p></body></html>";
    let mut variant = Variant::generated(VariantLabel::A, page, "", "Corporate");

    let remix = Patch::ReplaceSection {
        address: NodeAddress::Position(0),
        markup: "<h1>Hello</h1>".into(),
    };
    assert!(edit(&mut variant, &remix));
    let body = HtmlDocument::parse(variant.html()).body_markup().unwrap();
    assert_eq!(body, "<h1>Hello</h1><p>World</p>");

    variant.undo().unwrap();
    assert_eq!(variant.html(), page);

    let polish = Patch::ReplaceText {
        address: NodeAddress::Position(1),
        expected_tag: "p".into(),
        text: "Earth".into(),
    };
    assert!(edit(&mut variant, &polish));
    let body = HtmlDocument::parse(variant.html()).body_markup().unwrap();
    assert_eq!(body, "<h1>Hi</h1><p>Earth</p>");
    assert_eq!(variant.redo(), Err(HistoryError::NothingToRedo));

    variant.undo().unwrap();
    let mismatched = Patch::ReplaceText {
        address: NodeAddress::Position(1),
        expected_tag: "span".into(),
        text: "Earth".into(),
    };
    let before = variant.html().to_owned();
    let undo_len = variant.history().undo_len();
    assert!(!edit(&mut variant, &mismatched));
    assert_eq!(variant.html(), before);
    assert_eq!(variant.history().undo_len(), undo_len);
}
