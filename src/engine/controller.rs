use super::run_state::{CameraTransition, RunState};
use crate::context::{ContextError, ContextRegistry, StartOutcome};
use crate::message::{self, Action, Command, ContextEdit, CreatePolicy, Message};
use crate::network::Inbox;
use crate::scene::{FogSettings, SceneBackend, SceneDocument, Viewpoint};
use std::time::Duration;

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    /// Messages that parsed and were applied.
    pub processed: usize,
    /// Messages dropped because they failed to parse.
    pub malformed: usize,
    /// Applied messages whose action or edit was refused.
    pub rejected: usize,
    pub camera_transition: Option<CameraTransition>,
    pub load_delay_expired: bool,
    /// Longest time a drained message waited in the inbox.
    pub queue_latency: Duration,
}

/// Owns everything the tick loop mutates: the inbox consumer, the context
/// registry, the run state and the scene backend.
pub struct Controller<B: SceneBackend> {
    inbox: Inbox,
    registry: ContextRegistry,
    run_state: RunState,
    viewpoint: Viewpoint,
    fog: FogSettings,
    pushed_viewpoint: Viewpoint,
    pushed_fog: FogSettings,
    backend: B,
}

impl<B: SceneBackend> Controller<B> {
    pub fn new(inbox: Inbox, backend: B, load_delay_ticks: u32) -> Self {
        log::info!("[controller] driving {}", backend.label());
        Self {
            inbox,
            registry: ContextRegistry::new(),
            run_state: RunState::new(load_delay_ticks),
            viewpoint: Viewpoint::default(),
            fog: FogSettings::default(),
            pushed_viewpoint: Viewpoint::default(),
            pushed_fog: FogSettings::default(),
            backend,
        }
    }

    pub fn registry(&self) -> &ContextRegistry {
        &self.registry
    }

    pub fn run_state(&self) -> &RunState {
        &self.run_state
    }

    pub fn viewpoint(&self) -> &Viewpoint {
        &self.viewpoint
    }

    pub fn fog(&self) -> FogSettings {
        self.fog
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn inbox(&self) -> &Inbox {
        &self.inbox
    }

    pub fn tick(&mut self) -> TickReport {
        let tick = self.run_state.begin_tick();
        let mut report = TickReport {
            tick,
            ..TickReport::default()
        };

        while let Some(entry) = self.inbox.try_dequeue() {
            report.queue_latency = report.queue_latency.max(entry.received_at.elapsed());
            match message::parse(&entry.text) {
                Ok(message) => {
                    report.processed += 1;
                    if !self.apply(message) {
                        report.rejected += 1;
                    }
                }
                Err(err) => {
                    report.malformed += 1;
                    log::warn!(
                        "[controller] dropping message #{}: {err}: {}",
                        entry.sequence,
                        entry.text
                    );
                }
            }
        }

        report.camera_transition = self.run_state.reconcile_camera(&mut self.backend);
        if let Some(transition) = report.camera_transition {
            log::debug!("[controller] tick {tick}: camera {transition:?}");
        }
        self.push_view_settings();
        report.load_delay_expired = self.run_state.advance_delay();
        report
    }

    /// Applies one parsed message. Returns `false` if its action was refused.
    pub fn apply(&mut self, message: Message) -> bool {
        let accepted = match message.command {
            Some(Command::Position(update)) => {
                self.viewpoint.apply_position(&update);
                true
            }
            Some(Command::View(update)) => {
                self.viewpoint.apply_view(&update);
                true
            }
            Some(Command::Action { context, action }) => self.dispatch(&context, action),
            None => true,
        };
        if let Some(update) = &message.fog {
            self.fog.apply(update);
        }
        accepted
    }

    /// Clears `name`, rebuilds it from `document` and starts it. An empty
    /// document still leaves an active, empty context behind.
    pub fn replay_document(
        &mut self,
        name: &str,
        document: &SceneDocument,
    ) -> Result<StartOutcome, ContextError> {
        log::info!(
            "[controller] replaying {} cues into {name}",
            document.objects.len()
        );
        self.registry.clear(name, &mut self.fog, &mut self.backend);
        self.push_view_settings();
        self.registry.get_or_create(name, CreatePolicy::Create);
        for edit in document.edits() {
            let kind = edit.kind().to_string();
            if let Err(err) = self.registry.edit(name, edit, &mut self.backend) {
                log::warn!("[controller] {name}: {kind} edit from document refused: {err}");
            }
        }
        self.registry
            .start(name, &mut self.run_state, &mut self.backend)
    }

    /// Sends viewpoint and fog to the scene if they differ from what it last got.
    fn push_view_settings(&mut self) {
        if self.viewpoint != self.pushed_viewpoint {
            self.backend.apply_viewpoint(&self.viewpoint);
            self.pushed_viewpoint = self.viewpoint;
        }
        if self.fog != self.pushed_fog {
            self.backend.set_fog(&self.fog);
            self.pushed_fog = self.fog;
        }
    }

    fn dispatch(&mut self, context: &str, action: Action) -> bool {
        let label = action.label().to_string();
        let quiet = matches!(
            action,
            Action::EditContext(ContextEdit::MoveCue { .. })
        );

        let result = match action {
            Action::Start => self
                .registry
                .start(context, &mut self.run_state, &mut self.backend)
                .map(|outcome| {
                    log::debug!("[controller] started {context}: {outcome:?}");
                }),
            Action::Stop => self
                .registry
                .stop(context, &mut self.run_state, &mut self.backend)
                .map(|stopped| {
                    if stopped {
                        log::info!("[controller] {context} stopped the rig");
                    }
                }),
            Action::Clear => {
                self.registry.clear(context, &mut self.fog, &mut self.backend);
                Ok(())
            }
            Action::EditContext(edit) => self.registry.edit(context, edit, &mut self.backend),
            Action::Unrecognized(name) => Err(ContextError::UnrecognizedAction(name)),
        };

        match result {
            Ok(()) => true,
            Err(err) if quiet => {
                log::debug!("[controller] {label} on {context} ignored: {err}");
                false
            }
            Err(err) => {
                log::warn!("[controller] {label} on {context} ignored: {err}");
                false
            }
        }
    }
}
