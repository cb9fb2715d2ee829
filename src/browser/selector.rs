//! Element selectors for the dApp and wallet popups

use serde::{Deserialize, Serialize};
use std::fmt;

/// How to find one element on a page.
///
/// Deserializes from either a CSS string or `{ "tag", "text", "exact" }`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Selector {
    /// Plain CSS selector
    Css(String),
    /// Element whose text matches.
    ///
    /// With a tag, the first such element whose text contains `text`.
    /// With `exact`, the innermost element whose trimmed text equals `text`.
    Text {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tag: Option<String>,
        text: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        exact: bool,
    },
}

impl Selector {
    pub fn css(selector: impl Into<String>) -> Self {
        Selector::Css(selector.into())
    }

    /// `tag` element containing `text`
    pub fn has_text(tag: impl Into<String>, text: impl Into<String>) -> Self {
        Selector::Text {
            tag: Some(tag.into()),
            text: text.into(),
            exact: false,
        }
    }

    /// Any element whose whole text is `text`
    pub fn exact_text(text: impl Into<String>) -> Self {
        Selector::Text {
            tag: None,
            text: text.into(),
            exact: true,
        }
    }

    /// JavaScript expression evaluating to the element or `null`
    pub fn js_find(&self) -> String {
        match self {
            Selector::Css(css) => format!("document.querySelector({})", js_string(css)),
            Selector::Text { tag, text, exact } => {
                let scope = js_string(tag.as_deref().unwrap_or("*"));
                let needle = js_string(text);
                if *exact {
                    format!(
                        "(Array.from(document.querySelectorAll({scope})).find(el => \
                         el.textContent.trim() === {needle} && \
                         !Array.from(el.children).some(c => c.textContent.trim() === {needle})) || null)"
                    )
                } else {
                    format!(
                        "(Array.from(document.querySelectorAll({scope})).find(el => \
                         el.textContent.includes({needle})) || null)"
                    )
                }
            }
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Css(css) => f.write_str(css),
            Selector::Text { tag, text, exact } => match (tag, exact) {
                (Some(tag), false) => write!(f, "{}:has-text({:?})", tag, text),
                (Some(tag), true) => write!(f, "{}:text-is({:?})", tag, text),
                (None, _) => write!(f, "text={:?}", text),
            },
        }
    }
}

/// Quote a string as a JavaScript literal
pub(crate) fn js_string(value: &str) -> String {
    // JSON string literals are valid JavaScript string literals
    serde_json::Value::String(value.to_string()).to_string()
}
