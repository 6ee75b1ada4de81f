//! Fallback tool inference from plain prose.
//!
//! Some models describe an action instead of emitting the tag protocol:
//! "I'll click element [3]" or "let me go to https://example.com". The
//! [`InferencePolicy`] recovers a single implicit call from such prose.
//!
//! This is deliberately kept out of [`crate::protocol::parse`]: inference
//! is lossy and ambiguous, so it lives behind its own policy object that
//! can be disabled wholesale. Rules are evaluated in a fixed order and
//! the first match wins; that order is part of the public contract:
//!
//! 1. `click element [N]` → `browser_use { action: click_element, index: N }`
//! 2. a URL alongside a navigation verb → `browser_use { action: go_to_url, url }`

use crate::protocol::ParsedMessage;
use regex_lite::Regex;
use taskloom_core::tool::{Parameters, ToolCall};
use tracing::debug;

const BROWSER_TOOL: &str = "browser_use";

/// Disableable heuristic policy that synthesizes at most one tool call
/// from free text when the protocol parser found none.
pub struct InferencePolicy {
    enabled: bool,
    click_element: Regex,
    navigation_verb: Regex,
    url: Regex,
}

impl InferencePolicy {
    pub fn new() -> Self {
        Self::with_enabled(true)
    }

    /// A policy that never infers anything.
    pub fn disabled() -> Self {
        Self::with_enabled(false)
    }

    fn with_enabled(enabled: bool) -> Self {
        // The patterns are fixed and known-good, so compilation cannot fail.
        Self {
            enabled,
            click_element: Regex::new(r"(?i)click\s+(?:on\s+)?element\s*\[?(\d+)\]?")
                .expect("click-element pattern"),
            navigation_verb: Regex::new(r"(?i)\b(?:go\s+to|open|navigate|visit|browse)\b")
                .expect("navigation-verb pattern"),
            url: Regex::new(r#"https?://[^\s<>"]+"#).expect("url pattern"),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Try to recover one implicit call from a parsed turn.
    ///
    /// Returns `None` when disabled, when the turn already carries any
    /// tool call (complete or partial), or when no rule matches.
    pub fn infer(&self, parsed: &ParsedMessage) -> Option<ToolCall> {
        if !self.enabled || !parsed.tool_calls.is_empty() {
            return None;
        }
        self.infer_from_text(&parsed.free_text)
    }

    fn infer_from_text(&self, text: &str) -> Option<ToolCall> {
        if let Some(captures) = self.click_element.captures(text) {
            let index = &captures[1];
            debug!(index, "Inferred click action from free text");
            let params: Parameters = [("action", "click_element"), ("index", index)]
                .into_iter()
                .collect();
            return Some(ToolCall::new(BROWSER_TOOL, params));
        }

        if self.navigation_verb.is_match(text)
            && let Some(url) = self.url.find(text)
        {
            let url = url.as_str().trim_end_matches(['.', ',', ')', ']']);
            debug!(url, "Inferred navigation action from free text");
            let params: Parameters = [("action", "go_to_url"), ("url", url)]
                .into_iter()
                .collect();
            return Some(ToolCall::new(BROWSER_TOOL, params));
        }

        None
    }
}

impl Default for InferencePolicy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::parse;

    fn infer(text: &str) -> Option<ToolCall> {
        InferencePolicy::new().infer(&parse(text))
    }

    #[test]
    fn infers_click_from_bracketed_index() {
        let call = infer("I'll click element [7] to expand the menu.").unwrap();
        assert_eq!(call.name, "browser_use");
        assert_eq!(call.parameters.get("action"), Some("click_element"));
        assert_eq!(call.parameters.get("index"), Some("7"));
        assert!(!call.partial);
    }

    #[test]
    fn infers_click_without_brackets() {
        let call = infer("Let me click on element 2 first.").unwrap();
        assert_eq!(call.parameters.get("index"), Some("2"));
    }

    #[test]
    fn infers_navigation_from_verb_and_url() {
        let call = infer("I should go to https://example.com/docs now.").unwrap();
        assert_eq!(call.parameters.get("action"), Some("go_to_url"));
        assert_eq!(call.parameters.get("url"), Some("https://example.com/docs"));
    }

    #[test]
    fn url_without_navigation_verb_is_not_a_call() {
        assert!(infer("The docs live at https://example.com/docs if needed.").is_none());
    }

    #[test]
    fn navigation_verb_without_url_is_not_a_call() {
        assert!(infer("I'll open the settings panel.").is_none());
    }

    #[test]
    fn trailing_punctuation_is_stripped_from_url() {
        let call = infer("Next, visit https://example.com.").unwrap();
        assert_eq!(call.parameters.get("url"), Some("https://example.com"));
    }

    #[test]
    fn click_rule_takes_precedence_over_navigation() {
        // Both rules could match; order is fixed and click wins.
        let call = infer("I'll click element [1] then go to https://example.com").unwrap();
        assert_eq!(call.parameters.get("action"), Some("click_element"));
    }

    #[test]
    fn does_not_fire_when_structured_calls_exist() {
        let policy = InferencePolicy::new();
        let parsed = parse("click element [3]\n<search>\n<query>x</query>\n</search>");
        assert!(policy.infer(&parsed).is_none());
    }

    #[test]
    fn does_not_fire_alongside_partial_call() {
        let policy = InferencePolicy::new();
        let parsed = parse("click element [3]\n<search>");
        assert!(policy.infer(&parsed).is_none());
    }

    #[test]
    fn disabled_policy_never_infers() {
        let policy = InferencePolicy::disabled();
        assert!(!policy.is_enabled());
        assert!(policy.infer(&parse("click element [3]")).is_none());
    }

    #[test]
    fn plain_prose_infers_nothing() {
        assert!(infer("Summarizing the findings so far.").is_none());
    }
}
