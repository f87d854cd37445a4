// src/actions.rs - Static gesture → action mapping
use crate::classifier::Gesture;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.7;

/// The fixed set of commands the system knows how to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCommand {
    OpenBrowser,
    CloseActiveWindow,
    VolumeUp,
    Screenshot,
    PageRefresh,
}

impl ActionCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionCommand::OpenBrowser => "open_browser",
            ActionCommand::CloseActiveWindow => "close_active_window",
            ActionCommand::VolumeUp => "volume_up",
            ActionCommand::Screenshot => "screenshot",
            ActionCommand::PageRefresh => "page_refresh",
        }
    }
}

impl fmt::Display for ActionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GestureAction {
    pub action: &'static str,
    pub description: &'static str,
    pub command: ActionCommand,
    pub min_confidence: f64,
}

static DEFAULT_ACTIONS: Lazy<BTreeMap<Gesture, GestureAction>> = Lazy::new(|| {
    BTreeMap::from([
        (
            Gesture::OpenHand,
            GestureAction {
                action: "open_browser",
                description: "Open web browser",
                command: ActionCommand::OpenBrowser,
                min_confidence: DEFAULT_MIN_CONFIDENCE,
            },
        ),
        (
            Gesture::ClosedFist,
            GestureAction {
                action: "close_window",
                description: "Close active window",
                command: ActionCommand::CloseActiveWindow,
                min_confidence: DEFAULT_MIN_CONFIDENCE,
            },
        ),
        (
            Gesture::ThumbsUp,
            GestureAction {
                action: "volume_up",
                description: "Raise system volume",
                command: ActionCommand::VolumeUp,
                min_confidence: DEFAULT_MIN_CONFIDENCE,
            },
        ),
        (
            Gesture::TwoFingers,
            GestureAction {
                action: "screenshot",
                description: "Take screenshot",
                command: ActionCommand::Screenshot,
                min_confidence: DEFAULT_MIN_CONFIDENCE,
            },
        ),
        (
            Gesture::RockSign,
            GestureAction {
                action: "refresh",
                description: "Refresh page (F5)",
                command: ActionCommand::PageRefresh,
                min_confidence: DEFAULT_MIN_CONFIDENCE,
            },
        ),
    ])
});

/// Immutable after construction. Gestures without an entry never fire.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionTable {
    entries: BTreeMap<Gesture, GestureAction>,
}

impl Default for ActionTable {
    fn default() -> Self {
        Self {
            entries: DEFAULT_ACTIONS.clone(),
        }
    }
}

impl ActionTable {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Defaults with per-gesture minimum confidence overrides applied.
    pub fn with_overrides(overrides: &HashMap<Gesture, f64>) -> Self {
        let mut table = Self::default();
        for (gesture, min_confidence) in overrides {
            if let Some(entry) = table.entries.get_mut(gesture) {
                entry.min_confidence = *min_confidence;
            }
        }
        table
    }

    pub fn get(&self, gesture: Gesture) -> Option<&GestureAction> {
        self.entries.get(&gesture)
    }

    pub fn min_confidence(&self, gesture: Gesture) -> Option<f64> {
        self.get(gesture).map(|a| a.min_confidence)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Gesture, &GestureAction)> {
        self.entries.iter().map(|(g, a)| (*g, a))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_gesture_has_a_default_entry() {
        let table = ActionTable::default();
        for gesture in Gesture::ALL {
            let entry = table.get(gesture).expect("missing entry");
            assert_eq!(entry.min_confidence, DEFAULT_MIN_CONFIDENCE);
        }
        assert_eq!(table.len(), Gesture::ALL.len());
    }

    #[test]
    fn commands_are_distinct() {
        let table = ActionTable::default();
        let mut commands: Vec<_> = table.iter().map(|(_, a)| a.command.as_str()).collect();
        commands.sort_unstable();
        commands.dedup();
        assert_eq!(commands.len(), table.len());
    }

    #[test]
    fn overrides_only_touch_thresholds() {
        let overrides = HashMap::from([(Gesture::RockSign, 0.9)]);
        let table = ActionTable::with_overrides(&overrides);
        assert_eq!(table.min_confidence(Gesture::RockSign), Some(0.9));
        assert_eq!(table.min_confidence(Gesture::OpenHand), Some(0.7));
        assert_eq!(
            table.get(Gesture::RockSign).map(|a| a.command),
            Some(ActionCommand::PageRefresh)
        );
    }

    #[test]
    fn empty_table_has_no_thresholds() {
        assert_eq!(ActionTable::empty().min_confidence(Gesture::OpenHand), None);
    }
}
