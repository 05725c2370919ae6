use crate::model::{Action, ActionPolicy, FailureKind, SavedRecord};
use crate::selection::SelectionTracker;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Page {
    #[default]
    Login,
    Home,
}

/// Everything a presentation layer needs to draw the screen.
#[derive(Debug, Clone)]
pub struct ViewState {
    pub page: Page,
    pub user_id: Option<Uuid>,
    pub species: String,
    pub traits: String,

    pub candidates: Vec<String>,
    pub selection: SelectionTracker,
    pub saved: Vec<SavedRecord>,

    /// Actions with a request in flight.
    pub loading: HashSet<Action>,
    /// Candidates being saved one at a time.
    pub saving: HashSet<String>,
    /// Last failure per action; cleared when the action is retried.
    pub errors: HashMap<Action, FailureKind>,

    pub image_url: Option<String>,
    pub audio_url: Option<String>,
    pub narrative: Option<String>,
    pub info: String,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            page: Page::Login,
            user_id: None,
            species: "Dog".into(),
            traits: String::new(),
            candidates: Vec::new(),
            selection: SelectionTracker::new(),
            saved: Vec::new(),
            loading: HashSet::new(),
            saving: HashSet::new(),
            errors: HashMap::new(),
            image_url: None,
            audio_url: None,
            narrative: None,
            info: String::new(),
        }
    }
}

impl ViewState {
    /// Drop everything tied to the previous identity and switch page.
    pub fn reset_session(&mut self, user_id: Option<Uuid>) {
        *self = ViewState {
            page: if user_id.is_some() {
                Page::Home
            } else {
                Page::Login
            },
            user_id,
            species: std::mem::take(&mut self.species),
            ..Default::default()
        };
    }

    pub fn is_loading(&self, action: Action) -> bool {
        self.loading.contains(&action)
    }

    pub fn is_saving(&self, name: &str) -> bool {
        self.saving.contains(name)
    }

    pub fn error(&self, action: Action) -> Option<FailureKind> {
        self.errors.get(&action).copied()
    }

    /// Whether a control for `action` is enabled. `Err` carries the reason it is not.
    pub fn can_trigger(&self, action: Action, policy: ActionPolicy) -> Result<(), String> {
        if self.user_id.is_none() {
            return Err("sign in first".into());
        }
        if self.is_loading(action) {
            return Err("already running".into());
        }
        if policy == ActionPolicy::Exclusive
            && action.is_exclusive_kind()
            && self.loading.iter().any(|a| a.is_exclusive_kind())
        {
            return Err("another action is running".into());
        }
        match action {
            Action::Speech | Action::Narrative if self.selection.is_empty() => {
                Err("select a name first".into())
            }
            _ => Ok(()),
        }
    }

    /// Whether `name` may be toggled right now.
    pub fn can_toggle(&self, name: &str) -> Result<(), String> {
        if !self.candidates.iter().any(|c| c == name) {
            return Err(format!("{name} is not a current suggestion"));
        }
        if self.is_loading(Action::Save) {
            return Err("save in progress".into());
        }
        if self.is_saving(name) {
            return Err(format!("{name} is being saved"));
        }
        Ok(())
    }

    pub fn begin(&mut self, action: Action) {
        self.loading.insert(action);
        self.errors.remove(&action);
    }

    pub fn finish(&mut self, action: Action, failure: Option<FailureKind>) {
        self.loading.remove(&action);
        if let Some(kind) = failure {
            self.record_failure(action, kind);
        }
    }

    /// Set the error flag for `action` without touching its loading flag.
    pub fn record_failure(&mut self, action: Action, kind: FailureKind) {
        self.errors.insert(action, kind);
    }

    /// Take a fetched snapshot of the saved list. Rows already acknowledged by a
    /// save but missing from the snapshot are kept, since the fetch may predate them.
    pub fn absorb_fetched(&mut self, records: Vec<SavedRecord>) {
        let mut merged = records;
        for r in self.saved.drain(..) {
            if !merged.iter().any(|m| m.id == r.id) {
                merged.push(r);
            }
        }
        merged.sort_by_key(|r| r.id);
        self.saved = merged;
    }

    /// Append acknowledged records, skipping ids already listed.
    pub fn merge_saved(&mut self, records: &[SavedRecord]) -> usize {
        let mut added = 0;
        for r in records {
            if !self.saved.iter().any(|s| s.id == r.id) {
                self.saved.push(r.clone());
                added += 1;
            }
        }
        added
    }
}
