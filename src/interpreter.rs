use regex::Regex;
use tracing::debug;

use crate::types::{Action, PageSnapshot};

const STOP_SIGNALS: [&str; 2] = ["no", "stop"];

/// Rule-based mapping from a spoken reply to the next session action.
///
/// Rules run in a fixed order: stop signal, search phrasing, known button
/// phrase, then `Unrecognized`. The stop check must stay first so that
/// "no, stop searching" never reads as a search command.
pub struct ActionInterpreter {
    search: Regex,
    known_actions: Vec<String>,
}

impl ActionInterpreter {
    /// `known_actions` are button phrases that are clickable on any page,
    /// in addition to the labels of the current snapshot.
    pub fn new(known_actions: Vec<String>) -> Self {
        Self {
            search: Regex::new(
                r"(?:type|enter|look up)\s+(.+?)\s+(?:in(?: the)?\s+search\s+(?:box|input))",
            )
            .expect("search pattern is valid"),
            known_actions,
        }
    }

    /// The phrase offered alongside the search box, if any.
    pub fn first_known_action(&self) -> Option<&str> {
        self.known_actions.first().map(String::as_str)
    }

    pub fn interpret(&self, reply: &str, snapshot: &PageSnapshot) -> Action {
        let reply = reply.trim().to_lowercase();

        if STOP_SIGNALS.iter().any(|signal| reply.contains(signal)) {
            return Action::Stop;
        }

        if let Some(caps) = self.search.captures(&reply) {
            let query = caps[1].trim().to_string();
            if !query.is_empty() {
                debug!(%query, "Reply asks for a search");
                return Action::TypeInSearch(query);
            }
        }

        for phrase in &self.known_actions {
            let phrase = phrase.trim().to_lowercase();
            if !phrase.is_empty() && reply.contains(&phrase) {
                debug!(%phrase, "Reply names a known action");
                return Action::ClickButton(phrase);
            }
        }

        // Page labels can be as short as "Go" or "X", so they must stand alone.
        for label in &snapshot.button_labels {
            let label = label.trim().to_lowercase();
            if !label.is_empty() && contains_word(&reply, &label) {
                debug!(%label, "Reply names a button");
                return Action::ClickButton(label);
            }
        }

        Action::Unrecognized
    }
}

/// True when `needle` occurs in `haystack` with no letter or digit directly
/// before or after it.
fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

impl Default for ActionInterpreter {
    fn default() -> Self {
        Self::new(vec!["Read Wikipedia in your language".to_string()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with_buttons(buttons: &[&str]) -> PageSnapshot {
        PageSnapshot {
            button_labels: buttons.iter().map(|b| b.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_stop_signals() {
        let interpreter = ActionInterpreter::default();
        let snapshot = PageSnapshot::default();
        assert_eq!(interpreter.interpret("stop", &snapshot), Action::Stop);
        assert_eq!(interpreter.interpret("No thanks", &snapshot), Action::Stop);
        assert_eq!(interpreter.interpret("STOP please", &snapshot), Action::Stop);
    }

    #[test]
    fn test_stop_runs_before_search_pattern() {
        let interpreter = ActionInterpreter::default();
        let snapshot = PageSnapshot::default();
        assert_eq!(
            interpreter.interpret("no, stop searching", &snapshot),
            Action::Stop
        );
        assert_eq!(
            interpreter.interpret("stop, type cats in the search box", &snapshot),
            Action::Stop
        );
    }

    #[test]
    fn test_type_in_search_box() {
        let interpreter = ActionInterpreter::default();
        let snapshot = PageSnapshot::default();
        assert_eq!(
            interpreter.interpret("type hello world in the search box", &snapshot),
            Action::TypeInSearch("hello world".to_string())
        );
        assert_eq!(
            interpreter.interpret("Enter Rust Language in search input", &snapshot),
            Action::TypeInSearch("rust language".to_string())
        );
        assert_eq!(
            interpreter.interpret("look up climate change in the search box.", &snapshot),
            Action::TypeInSearch("climate change".to_string())
        );
    }

    #[test]
    fn test_click_snapshot_button() {
        let interpreter = ActionInterpreter::default();
        let snapshot = snapshot_with_buttons(&["Submit", "Cancel"]);
        assert_eq!(
            interpreter.interpret("click the submit button", &snapshot),
            Action::ClickButton("submit".to_string())
        );
    }

    #[test]
    fn test_short_labels_must_be_whole_words() {
        let interpreter = ActionInterpreter::new(Vec::new());
        let snapshot = snapshot_with_buttons(&["Go", "X"]);
        assert_eq!(
            interpreter.interpret("search google for me", &snapshot),
            Action::Unrecognized
        );
        assert_eq!(
            interpreter.interpret("press go", &snapshot),
            Action::ClickButton("go".to_string())
        );
        assert_eq!(
            interpreter.interpret("click x.", &snapshot),
            Action::ClickButton("x".to_string())
        );
    }

    #[test]
    fn test_contains_word() {
        assert!(contains_word("sign in now", "sign in"));
        assert!(!contains_word("signing in", "sign in"));
        assert!(contains_word("go", "go"));
        assert!(!contains_word("next", "x"));
    }

    #[test]
    fn test_click_known_action_phrase() {
        let interpreter = ActionInterpreter::default();
        let snapshot = PageSnapshot::default();
        assert_eq!(
            interpreter.interpret("Read Wikipedia in your language please", &snapshot),
            Action::ClickButton("read wikipedia in your language".to_string())
        );
    }

    #[test]
    fn test_empty_labels_never_match() {
        let interpreter = ActionInterpreter::new(Vec::new());
        let snapshot = snapshot_with_buttons(&["", "  "]);
        assert_eq!(
            interpreter.interpret("click something", &snapshot),
            Action::Unrecognized
        );
    }

    #[test]
    fn test_unrecognized_and_silence() {
        let interpreter = ActionInterpreter::default();
        let snapshot = snapshot_with_buttons(&["Submit"]);
        assert_eq!(
            interpreter.interpret("what a lovely day", &snapshot),
            Action::Unrecognized
        );
        assert_eq!(interpreter.interpret("", &snapshot), Action::Unrecognized);
    }

    #[test]
    fn test_first_known_action() {
        assert_eq!(
            ActionInterpreter::default().first_known_action(),
            Some("Read Wikipedia in your language")
        );
        assert_eq!(ActionInterpreter::new(Vec::new()).first_known_action(), None);
    }
}
