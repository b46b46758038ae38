use serde::Serialize;
use uuid::Uuid;

use crate::models::Flashcard;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StudyError {
    #[error("a study session needs at least one flashcard")]
    EmptySession,

    #[error("cannot grade a card before flipping it")]
    NotFlipped,

    #[error("study session is already complete")]
    SessionComplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudyState {
    Active,
    Complete,
}

/// Running totals for one study session. `known + unknown` never exceeds
/// `total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub total: usize,
    pub known: usize,
    pub unknown: usize,
}

/// One study run over a fetched card set. The card list is fixed at
/// construction; grading advances a cursor one card at a time until the
/// session completes. Restart reuses the same set without re-fetching.
#[derive(Debug, Clone)]
pub struct StudySession {
    session_id: Uuid,
    cards: Vec<Flashcard>,
    current_index: usize,
    is_flipped: bool,
    stats: SessionStats,
}

impl StudySession {
    /// A session over zero cards is the fetch-side error state, never a
    /// valid machine.
    pub fn new(session_id: Uuid, cards: Vec<Flashcard>) -> Result<Self, StudyError> {
        if cards.is_empty() {
            return Err(StudyError::EmptySession);
        }
        let stats = SessionStats { total: cards.len(), known: 0, unknown: 0 };
        Ok(Self { session_id, cards, current_index: 0, is_flipped: false, stats })
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn state(&self) -> StudyState {
        if self.current_index >= self.cards.len() {
            StudyState::Complete
        } else {
            StudyState::Active
        }
    }

    pub fn current_card(&self) -> Option<&Flashcard> {
        self.cards.get(self.current_index)
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn is_flipped(&self) -> bool {
        self.is_flipped
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Toggles the current card between front and back; no stat effect.
    pub fn flip(&mut self) -> Result<(), StudyError> {
        if self.state() == StudyState::Complete {
            return Err(StudyError::SessionComplete);
        }
        self.is_flipped = !self.is_flipped;
        Ok(())
    }

    pub fn mark_known(&mut self) -> Result<StudyState, StudyError> {
        self.grade(true)
    }

    pub fn mark_unknown(&mut self) -> Result<StudyState, StudyError> {
        self.grade(false)
    }

    /// Grading is only valid on a flipped card: bump the stat, advance
    /// the cursor, reset the flip. Reaching the end completes the session.
    fn grade(&mut self, known: bool) -> Result<StudyState, StudyError> {
        if self.state() == StudyState::Complete {
            return Err(StudyError::SessionComplete);
        }
        if !self.is_flipped {
            return Err(StudyError::NotFlipped);
        }

        if known {
            self.stats.known += 1;
        } else {
            self.stats.unknown += 1;
        }
        self.current_index += 1;
        self.is_flipped = false;

        Ok(self.state())
    }

    /// Back to the first card with zeroed stats, on the same card set.
    pub fn restart(&mut self) {
        self.current_index = 0;
        self.is_flipped = false;
        self.stats = SessionStats { total: self.cards.len(), known: 0, unknown: 0 };
    }
}

/// Actions the keyboard layer can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudyAction {
    Flip,
    MarkKnown,
    MarkUnknown,
    Exit,
    Help,
}

/// Maps configured key sets to study actions. Keys are matched verbatim
/// against the event's key name.
#[derive(Debug, Clone)]
pub struct KeyBindings {
    pub flip: Vec<String>,
    pub known: Vec<String>,
    pub unknown: Vec<String>,
    pub exit: Vec<String>,
    pub help: Vec<String>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        fn keys(names: &[&str]) -> Vec<String> {
            names.iter().map(|k| k.to_string()).collect()
        }
        Self {
            flip: keys(&[" ", "Enter"]),
            known: keys(&["1", "k"]),
            unknown: keys(&["2", "u"]),
            exit: keys(&["Escape", "q"]),
            help: keys(&["?", "h"]),
        }
    }
}

impl KeyBindings {
    /// Resolves a key press to an action, or `None` when the key is
    /// unbound or currently unavailable. Input inside an editable element
    /// is ignored wholesale; grading keys additionally require the card
    /// to be flipped, while exit/help work regardless of flip state.
    pub fn resolve(&self, key: &str, in_editable: bool, is_flipped: bool) -> Option<StudyAction> {
        if in_editable {
            return None;
        }

        let matches = |set: &[String]| set.iter().any(|k| k == key);

        if matches(&self.exit) {
            return Some(StudyAction::Exit);
        }
        if matches(&self.help) {
            return Some(StudyAction::Help);
        }
        if matches(&self.flip) {
            return Some(StudyAction::Flip);
        }
        if matches(&self.known) {
            return is_flipped.then_some(StudyAction::MarkKnown);
        }
        if matches(&self.unknown) {
            return is_flipped.then_some(StudyAction::MarkUnknown);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FlashcardSource;
    use chrono::Utc;

    fn cards(n: usize) -> Vec<Flashcard> {
        let now = Utc::now();
        (0..n)
            .map(|i| Flashcard {
                id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                front: format!("Q{i}"),
                back: format!("A{i}"),
                source: FlashcardSource::Manual,
                generation_id: None,
                created_at: now,
                updated_at: now,
            })
            .collect()
    }

    fn session(n: usize) -> StudySession {
        StudySession::new(Uuid::new_v4(), cards(n)).unwrap()
    }

    #[test]
    fn test_empty_session_rejected() {
        assert_eq!(
            StudySession::new(Uuid::new_v4(), vec![]).unwrap_err(),
            StudyError::EmptySession
        );
    }

    #[test]
    fn test_three_card_run_to_completion() {
        let mut s = session(3);
        assert_eq!(s.state(), StudyState::Active);

        s.flip().unwrap();
        assert_eq!(s.mark_known().unwrap(), StudyState::Active);
        s.flip().unwrap();
        assert_eq!(s.mark_unknown().unwrap(), StudyState::Active);
        s.flip().unwrap();
        assert_eq!(s.mark_known().unwrap(), StudyState::Complete);

        assert_eq!(s.stats(), SessionStats { total: 3, known: 2, unknown: 1 });
        assert_eq!(s.state(), StudyState::Complete);
    }

    #[test]
    fn test_grading_requires_flip() {
        let mut s = session(2);
        assert_eq!(s.mark_known().unwrap_err(), StudyError::NotFlipped);
        assert_eq!(s.mark_unknown().unwrap_err(), StudyError::NotFlipped);
        assert_eq!(s.stats().known + s.stats().unknown, 0);
        assert_eq!(s.current_index(), 0);
    }

    #[test]
    fn test_flip_is_a_toggle_without_stat_effect() {
        let mut s = session(2);
        s.flip().unwrap();
        assert!(s.is_flipped());
        s.flip().unwrap();
        assert!(!s.is_flipped());
        assert_eq!(s.stats(), SessionStats { total: 2, known: 0, unknown: 0 });
    }

    #[test]
    fn test_grade_resets_flip_and_advances() {
        let mut s = session(2);
        s.flip().unwrap();
        s.mark_unknown().unwrap();
        assert!(!s.is_flipped());
        assert_eq!(s.current_index(), 1);
        assert_eq!(s.current_card().unwrap().front, "Q1");
    }

    #[test]
    fn test_stats_bounded_by_total() {
        let mut s = session(4);
        while s.state() == StudyState::Active {
            s.flip().unwrap();
            s.mark_known().unwrap();
            let stats = s.stats();
            assert!(stats.known + stats.unknown <= stats.total);
        }
        assert_eq!(s.stats().known, 4);
    }

    #[test]
    fn test_completed_session_rejects_further_actions() {
        let mut s = session(1);
        s.flip().unwrap();
        s.mark_known().unwrap();

        assert_eq!(s.flip().unwrap_err(), StudyError::SessionComplete);
        assert_eq!(s.mark_known().unwrap_err(), StudyError::SessionComplete);
    }

    #[test]
    fn test_restart_reuses_the_same_cards() {
        let mut s = session(2);
        let first_card = s.current_card().unwrap().id;
        s.flip().unwrap();
        s.mark_known().unwrap();
        s.flip().unwrap();
        s.mark_unknown().unwrap();
        assert_eq!(s.state(), StudyState::Complete);

        s.restart();
        assert_eq!(s.state(), StudyState::Active);
        assert_eq!(s.current_index(), 0);
        assert!(!s.is_flipped());
        assert_eq!(s.stats(), SessionStats { total: 2, known: 0, unknown: 0 });
        assert_eq!(s.current_card().unwrap().id, first_card);
    }

    #[test]
    fn test_keyboard_defaults() {
        let bindings = KeyBindings::default();

        assert_eq!(bindings.resolve(" ", false, false), Some(StudyAction::Flip));
        assert_eq!(bindings.resolve("Enter", false, true), Some(StudyAction::Flip));
        assert_eq!(bindings.resolve("k", false, true), Some(StudyAction::MarkKnown));
        assert_eq!(bindings.resolve("u", false, true), Some(StudyAction::MarkUnknown));
        assert_eq!(bindings.resolve("Escape", false, false), Some(StudyAction::Exit));
        assert_eq!(bindings.resolve("?", false, true), Some(StudyAction::Help));
        assert_eq!(bindings.resolve("z", false, true), None);
    }

    #[test]
    fn test_grading_keys_require_flip() {
        let bindings = KeyBindings::default();
        assert_eq!(bindings.resolve("k", false, false), None);
        assert_eq!(bindings.resolve("2", false, false), None);
        // exit and help stay available face-down
        assert_eq!(bindings.resolve("q", false, false), Some(StudyAction::Exit));
        assert_eq!(bindings.resolve("h", false, false), Some(StudyAction::Help));
    }

    #[test]
    fn test_editable_focus_swallows_all_keys() {
        let bindings = KeyBindings::default();
        for key in [" ", "Enter", "k", "u", "Escape", "?"] {
            assert_eq!(bindings.resolve(key, true, true), None);
        }
    }
}
