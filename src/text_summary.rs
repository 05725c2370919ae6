//! Text and JSON summaries for CLI output.

use crate::model::{Action, ViewEvent};
use crate::orchestrator::ViewState;
use serde_json::{json, Value};

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

const REPORTED: [Action; 6] = [
    Action::Generate,
    Action::Fetch,
    Action::Save,
    Action::Image,
    Action::Speech,
    Action::Narrative,
];

/// Build a text summary of the final view state.
pub(crate) fn build_text_summary(state: &ViewState) -> TextSummary {
    let mut lines = Vec::new();

    if let Some(user) = state.user_id {
        lines.push(format!("User: {user}"));
    }
    let subject = if state.traits.trim().is_empty() {
        state.species.clone()
    } else {
        format!("{} ({})", state.species, state.traits.trim())
    };
    lines.push(format!("Suggestions for {subject}:"));
    if state.candidates.is_empty() {
        lines.push("  (none)".into());
    }
    for name in &state.candidates {
        let mark = if state.selection.contains(name) { "*" } else { " " };
        lines.push(format!("  {mark} {name}"));
    }

    lines.push(format!("Saved names ({}):", state.saved.len()));
    for rec in &state.saved {
        lines.push(format!("  #{} {}", rec.id, rec.name));
    }

    if let Some(url) = state.image_url.as_deref() {
        lines.push(format!("Image: {url}"));
    }
    if let Some(url) = state.audio_url.as_deref() {
        lines.push(format!("Audio: {url}"));
    }
    if let Some(text) = state.narrative.as_deref() {
        lines.push("Story:".into());
        lines.extend(text.lines().map(|l| format!("  {l}")));
    }

    for action in REPORTED {
        if let Some(kind) = state.error(action) {
            lines.push(format!("{action:?} failed ({kind:?})"));
        }
    }

    TextSummary { lines }
}

/// Machine-readable form of the same summary.
pub(crate) fn build_json_report(state: &ViewState) -> Value {
    let errors: serde_json::Map<String, Value> = REPORTED
        .iter()
        .filter_map(|a| {
            state
                .error(*a)
                .map(|k| (format!("{a:?}"), json!(format!("{k:?}"))))
        })
        .collect();
    json!({
        "userId": state.user_id,
        "species": state.species,
        "traits": state.traits,
        "candidates": state.candidates,
        "selected": state.selection.to_vec(),
        "saved": state.saved,
        "imageUrl": state.image_url,
        "audioUrl": state.audio_url,
        "narrative": state.narrative,
        "errors": errors,
    })
}

/// One status line per event, for stderr.
pub(crate) fn describe_event(ev: &ViewEvent) -> String {
    match ev {
        ViewEvent::IdentityChanged { user_id: Some(u) } => format!("Signed in as {u}"),
        ViewEvent::IdentityChanged { user_id: None } => "Signed out".into(),
        ViewEvent::CandidatesReady { count } => format!("Generated {count} suggestion(s)"),
        ViewEvent::SavedListUpdated { total } => format!("{total} saved name(s)"),
        ViewEvent::RecordsSaved { records } => format!("Saved {} name(s)", records.len()),
        ViewEvent::EnrichmentReady { action } => format!("{action:?} ready"),
        ViewEvent::ActionFailed { action, kind } => format!("{action:?} failed ({kind:?})"),
        ViewEvent::Info(info) => info.to_message(),
    }
}
