//! View coordinator.
//!
//! Owns the screen state, dispatches network work as tokio tasks and applies their
//! completions one at a time. Every completion is tagged with the session epoch it
//! was issued under; the epoch moves on each change of user, so a slow response from
//! an earlier session is dropped instead of leaking into the new one.

use super::state::{Page, ViewState};
use crate::engine::{Enricher, Enrichment, NameGenerator, PersistenceApi};
use crate::error::{EnrichmentError, GenerationError, PersistError};
use crate::model::{Action, ActionPolicy, Identity, InfoEvent, SavedRecord, ViewEvent};
use crate::session::{AuthProvider, IdentityChange, SessionGate};
use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;

/// Commands emitted by UI layers.
#[derive(Debug, Clone)]
pub enum UiCommand {
    Generate { species: String, traits: String },
    Toggle(String),
    SaveSelected,
    SaveOne(String),
    GenerateImage,
    GenerateSpeech,
    GenerateNarrative,
    RefreshSaved,
    SignOut,
    Quit,
}

/// Collaborators the coordinator dispatches to.
#[derive(Clone)]
pub struct Services {
    pub persistence: Arc<dyn PersistenceApi>,
    pub generator: Arc<NameGenerator>,
    pub enricher: Arc<Enricher>,
}

enum Outcome {
    Generated(Result<Vec<String>, GenerationError>),
    Fetched(Result<Vec<SavedRecord>, PersistError>),
    SavedBatch(Result<Vec<SavedRecord>, PersistError>),
    SavedOne {
        name: String,
        result: Result<Vec<SavedRecord>, PersistError>,
    },
    Enriched {
        action: Action,
        result: Result<Enrichment, EnrichmentError>,
    },
}

struct Completion {
    epoch: u64,
    outcome: Outcome,
}

impl Outcome {
    fn action(&self) -> Action {
        match self {
            Outcome::Generated(_) => Action::Generate,
            Outcome::Fetched(_) => Action::Fetch,
            Outcome::SavedBatch(_) | Outcome::SavedOne { .. } => Action::Save,
            Outcome::Enriched { action, .. } => *action,
        }
    }
}

pub struct ViewCoordinator {
    gate: SessionGate,
    gate_open: bool,
    services: Services,
    policy: ActionPolicy,
    state: ViewState,
    epoch: u64,
    pending: usize,
    done_tx: UnboundedSender<Completion>,
    done_rx: UnboundedReceiver<Completion>,
    state_tx: watch::Sender<ViewState>,
    event_tx: Option<UnboundedSender<ViewEvent>>,
}

impl ViewCoordinator {
    /// Subscribe to the auth provider and show whichever page the current identity
    /// calls for. A signed-in user gets their saved names fetched straight away.
    pub async fn connect(
        provider: Arc<dyn AuthProvider>,
        services: Services,
        policy: ActionPolicy,
    ) -> Self {
        let gate = SessionGate::connect(provider).await;
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(ViewState::default());
        let mut me = Self {
            gate,
            gate_open: true,
            services,
            policy,
            state: ViewState::default(),
            epoch: 0,
            pending: 0,
            done_tx,
            done_rx,
            state_tx,
            event_tx: None,
        };
        let identity = me.gate.current_identity().cloned();
        me.on_identity(IdentityChange {
            user_changed: identity.is_some(),
            identity,
        });
        me
    }

    /// Receive [`ViewEvent`]s as they happen.
    pub fn with_events(mut self, tx: UnboundedSender<ViewEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Snapshot feed of the view state.
    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    /// Requests dispatched but not yet applied (or dropped as stale).
    pub fn pending(&self) -> usize {
        self.pending
    }

    fn emit(&self, ev: ViewEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(ev);
        }
    }

    fn info(&mut self, info: InfoEvent) {
        self.state.info = info.to_message();
        self.emit(ViewEvent::Info(info));
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.state.clone());
    }

    fn refuse(&mut self, action: Action, reason: String) {
        tracing::debug!(?action, %reason, "action refused");
        self.info(InfoEvent::Refused { action, reason });
    }

    fn spawn<F>(&mut self, fut: F)
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        let tx = self.done_tx.clone();
        let epoch = self.epoch;
        self.pending += 1;
        tokio::spawn(async move {
            let outcome = fut.await;
            // Receiver lives as long as the coordinator.
            let _ = tx.send(Completion { epoch, outcome });
        });
    }

    /// Identity as of right now; requests never reuse an earlier snapshot.
    fn identity(&self) -> Option<Identity> {
        self.gate.current_identity().cloned()
    }

    /// Apply one UI command. Returns `false` on quit.
    pub async fn handle_command(&mut self, cmd: UiCommand) -> bool {
        match cmd {
            UiCommand::Generate { species, traits } => self.generate(species, traits),
            UiCommand::Toggle(name) => self.toggle(&name),
            UiCommand::SaveSelected => self.save_selected(),
            UiCommand::SaveOne(name) => self.save_one(name),
            UiCommand::GenerateImage => self.enrich(Action::Image),
            UiCommand::GenerateSpeech => self.enrich(Action::Speech),
            UiCommand::GenerateNarrative => self.enrich(Action::Narrative),
            UiCommand::RefreshSaved => self.fetch_saved(),
            UiCommand::SignOut => self.sign_out().await,
            UiCommand::Quit => return false,
        }
        self.publish();
        true
    }

    fn generate(&mut self, species: String, traits: String) {
        if let Err(reason) = self.state.can_trigger(Action::Generate, self.policy) {
            return self.refuse(Action::Generate, reason);
        }
        let Some(identity) = self.identity() else {
            return self.refuse(Action::Generate, "sign in first".into());
        };
        self.state.species = species.clone();
        self.state.traits = traits.clone();
        self.state.begin(Action::Generate);
        let generator = self.services.generator.clone();
        self.spawn(async move {
            Outcome::Generated(generator.generate(&identity, &species, &traits).await)
        });
    }

    fn toggle(&mut self, name: &str) {
        match self.state.can_toggle(name) {
            Ok(()) => {
                self.state.selection.toggle(name);
            }
            Err(reason) => self.info(InfoEvent::Message(format!("Cannot toggle: {reason}"))),
        }
    }

    fn save_selected(&mut self) {
        // Names already being saved on their own are left to that request.
        let names: Vec<String> = self
            .state
            .selection
            .iter()
            .filter(|n| !self.state.is_saving(n))
            .map(str::to_string)
            .collect();
        // Nothing to save: no request, no state change.
        if names.is_empty() {
            return;
        }
        if self.state.is_loading(Action::Save) {
            return self.refuse(Action::Save, "already running".into());
        }
        let Some(identity) = self.identity() else {
            return self.refuse(Action::Save, "sign in first".into());
        };
        self.state.begin(Action::Save);
        let api = self.services.persistence.clone();
        self.spawn(async move { Outcome::SavedBatch(api.save_batch(&identity, &names).await) });
    }

    fn save_one(&mut self, name: String) {
        if let Err(reason) = self.state.can_toggle(&name) {
            return self.refuse(Action::Save, reason);
        }
        let Some(identity) = self.identity() else {
            return self.refuse(Action::Save, "sign in first".into());
        };
        self.state.saving.insert(name.clone());
        self.state.errors.remove(&Action::Save);
        let api = self.services.persistence.clone();
        self.spawn(async move {
            let result = api.save_batch(&identity, std::slice::from_ref(&name)).await;
            Outcome::SavedOne { name, result }
        });
    }

    fn enrich(&mut self, action: Action) {
        if let Err(reason) = self.state.can_trigger(action, self.policy) {
            return self.refuse(action, reason);
        }
        let Some(identity) = self.identity() else {
            return self.refuse(action, "sign in first".into());
        };
        self.state.begin(action);
        let enricher = self.services.enricher.clone();
        let species = self.state.species.clone();
        let name = self.state.selection.first().map(str::to_string);
        self.spawn(async move {
            let result = match action {
                Action::Image => enricher.image(&identity, &species, name.as_deref()).await,
                Action::Speech => enricher.speech(&identity, name.as_deref()).await,
                _ => enricher.narrative(&identity, &species, name.as_deref()).await,
            };
            Outcome::Enriched { action, result }
        });
    }

    fn fetch_saved(&mut self) {
        if self.state.is_loading(Action::Fetch) {
            return;
        }
        let Some(identity) = self.identity() else {
            return;
        };
        self.state.begin(Action::Fetch);
        let api = self.services.persistence.clone();
        self.spawn(async move { Outcome::Fetched(api.fetch_saved(&identity).await) });
    }

    async fn sign_out(&mut self) {
        let change = match self.gate.sign_out().await {
            Ok(change) => change,
            Err(e) => {
                // Tear down locally regardless; the provider will catch up.
                tracing::warn!(error = %e, "provider sign-out failed");
                self.gate.apply(crate::session::AuthEvent::SignedOut)
            }
        };
        self.on_identity(change);
    }

    fn on_identity(&mut self, change: IdentityChange) {
        if !change.user_changed {
            tracing::debug!("credential refreshed");
            return;
        }
        self.epoch += 1;
        let user_id = change.identity.as_ref().map(|i| i.user_id);
        self.state.reset_session(user_id);
        tracing::info!(user = ?user_id, epoch = self.epoch, "identity changed");
        self.emit(ViewEvent::IdentityChanged { user_id });
        if self.state.page == Page::Home {
            self.fetch_saved();
        }
        self.publish();
    }

    fn apply_completion(&mut self, done: Completion) {
        self.pending = self.pending.saturating_sub(1);
        if done.epoch != self.epoch {
            let action = done.outcome.action();
            tracing::debug!(?action, epoch = done.epoch, current = self.epoch, "dropping stale response");
            self.emit(ViewEvent::Info(InfoEvent::StaleResponseDropped { action }));
            return;
        }

        match done.outcome {
            Outcome::Generated(Ok(names)) => {
                self.state.finish(Action::Generate, None);
                self.state.selection.retain_within(&names);
                self.state.candidates = names;
                self.emit(ViewEvent::CandidatesReady {
                    count: self.state.candidates.len(),
                });
            }
            Outcome::Generated(Err(e)) => {
                tracing::warn!(error = %e, "Error generating names");
                self.fail(Action::Generate, e.kind());
            }
            Outcome::Fetched(Ok(records)) => {
                self.state.finish(Action::Fetch, None);
                self.state.absorb_fetched(records);
                self.emit(ViewEvent::SavedListUpdated {
                    total: self.state.saved.len(),
                });
            }
            Outcome::Fetched(Err(e)) => {
                // Keep the stale list on screen.
                tracing::warn!(error = %e, "Error fetching names");
                self.fail(Action::Fetch, e.kind());
            }
            Outcome::SavedBatch(Ok(records)) => {
                self.state.finish(Action::Save, None);
                self.state.merge_saved(&records);
                self.state.selection.clear();
                self.saved(records);
            }
            Outcome::SavedBatch(Err(e)) => {
                tracing::error!(error = %e, "Error saving names");
                self.fail(Action::Save, e.kind());
            }
            Outcome::SavedOne { name, result } => {
                self.state.saving.remove(&name);
                match result {
                    Ok(records) => {
                        self.state.merge_saved(&records);
                        self.state.selection.remove(&name);
                        self.saved(records);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, %name, "Error saving name");
                        // A batch save may still be running; leave its busy flag.
                        let kind = e.kind();
                        self.state.record_failure(Action::Save, kind);
                        self.emit(ViewEvent::ActionFailed {
                            action: Action::Save,
                            kind,
                        });
                    }
                }
            }
            Outcome::Enriched { action, result } => match result {
                Ok(enrichment) => {
                    self.state.finish(action, None);
                    match enrichment {
                        Enrichment::Image(url) => self.state.image_url = Some(url),
                        Enrichment::Speech(url) => self.state.audio_url = Some(url),
                        Enrichment::Narrative(text) => self.state.narrative = Some(text),
                    }
                    self.emit(ViewEvent::EnrichmentReady { action });
                }
                Err(e) => {
                    tracing::warn!(?action, error = %e, "enrichment failed");
                    self.fail(action, e.kind());
                }
            },
        }
        self.publish();
    }

    fn fail(&mut self, action: Action, kind: crate::model::FailureKind) {
        self.state.finish(action, Some(kind));
        self.emit(ViewEvent::ActionFailed { action, kind });
    }

    fn saved(&mut self, records: Vec<SavedRecord>) {
        self.emit(ViewEvent::RecordsSaved {
            records: Box::new(records),
        });
        self.emit(ViewEvent::SavedListUpdated {
            total: self.state.saved.len(),
        });
    }

    /// Wait for the next identity change or completion and apply it. Identity
    /// changes win ties so a sign-out lands before any response racing it.
    pub async fn step(&mut self) {
        tokio::select! {
            biased;
            change = self.gate.next_change(), if self.gate_open => match change {
                Some(change) => self.on_identity(change),
                None => self.gate_open = false,
            },
            Some(done) = self.done_rx.recv() => self.apply_completion(done),
            else => {}
        }
    }

    /// Apply completions until nothing is in flight.
    pub async fn settle(&mut self) {
        while self.pending > 0 {
            match self.done_rx.recv().await {
                Some(done) => self.apply_completion(done),
                None => break,
            }
        }
    }

    /// Drive the coordinator from a command channel until quit or the channel closes.
    pub async fn run(mut self, mut cmd_rx: UnboundedReceiver<UiCommand>) -> Result<()> {
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(cmd) => {
                        if !self.handle_command(cmd).await {
                            break;
                        }
                    }
                    None => break,
                },
                change = self.gate.next_change(), if self.gate_open => match change {
                    Some(change) => self.on_identity(change),
                    None => self.gate_open = false,
                },
                Some(done) = self.done_rx.recv() => self.apply_completion(done),
                else => break,
            }
        }
        self.gate.close();
        Ok(())
    }
}
