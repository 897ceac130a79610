//! Core state machine implementation
//!
//! Runs on the controlling task. Owns the hotkey monitor and the armed
//! entry; hotkey notifications and client commands are both funnelled
//! through here, so registration and trigger handling never race.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::engine::{AutoType, AutoTypeError};
use crate::events::AutoTypeEvent;
use crate::hotkey::{HotkeyError, HotkeyEvent, HotkeyMonitor, HotkeySpec};
use crate::inject::{CancelToken, InjectionError};
use crate::sequence::Entry;

/// The two possible states of the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    /// Waiting for a trigger
    #[default]
    Idle,
    /// A sequence is being typed on a blocking worker
    Typing,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::Idle => write!(f, "Idle"),
            State::Typing => write!(f, "Typing"),
        }
    }
}

/// Failure reported back to a command sender
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("no entry is armed for auto-type")]
    NotArmed,

    #[error(transparent)]
    AutoType(#[from] AutoTypeError),

    #[error(transparent)]
    Hotkey(#[from] HotkeyError),

    #[error("state machine is not running")]
    Stopped,
}

impl CommandError {
    /// Stable machine-readable code for clients
    pub fn code(&self) -> &'static str {
        match self {
            CommandError::NotArmed => "not_armed",
            CommandError::AutoType(AutoTypeError::Compile(_)) => "compile_error",
            CommandError::AutoType(AutoTypeError::Injection(_)) => "injection_failed",
            CommandError::AutoType(AutoTypeError::Busy) => "busy",
            CommandError::Hotkey(_) => "hotkey_error",
            CommandError::Stopped => "internal",
        }
    }
}

/// Point-in-time view of the machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub state: State,
    /// Registered chord, `None` when unregistered
    pub hotkey: Option<String>,
    pub armed: bool,
    pub injection_available: bool,
}

type Reply<T> = oneshot::Sender<Result<T, CommandError>>;

/// Requests handled by the state machine
#[derive(Debug)]
pub enum Command {
    Status {
        reply: oneshot::Sender<StatusSnapshot>,
    },
    /// Type `entry`, or the armed entry when `None`
    AutoType {
        entry: Option<Entry>,
        template: Option<String>,
        reply: Reply<usize>,
    },
    Arm {
        entry: Entry,
        template: Option<String>,
        reply: oneshot::Sender<()>,
    },
    Disarm {
        reply: oneshot::Sender<bool>,
    },
    RegisterHotkey {
        spec: HotkeySpec,
        reply: Reply<()>,
    },
    UnregisterHotkey {
        reply: oneshot::Sender<()>,
    },
    /// Replies whether a sequence was running
    Cancel {
        reply: oneshot::Sender<bool>,
    },
    /// Release the hotkey and leave `run`
    Shutdown,
}

/// Cloneable handle for sending commands to a running `StateMachine`
#[derive(Debug, Clone)]
pub struct Controller {
    tx: mpsc::Sender<Command>,
}

impl Controller {
    pub fn new(tx: mpsc::Sender<Command>) -> Self {
        Self { tx }
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T, CommandError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| CommandError::Stopped)?;
        rx.await.map_err(|_| CommandError::Stopped)
    }

    pub async fn status(&self) -> Result<StatusSnapshot, CommandError> {
        self.request(|reply| Command::Status { reply }).await
    }

    /// Resolves once the sequence has finished typing
    pub async fn auto_type(
        &self,
        entry: Option<Entry>,
        template: Option<String>,
    ) -> Result<usize, CommandError> {
        self.request(|reply| Command::AutoType {
            entry,
            template,
            reply,
        })
        .await?
    }

    pub async fn arm(&self, entry: Entry, template: Option<String>) -> Result<(), CommandError> {
        self.request(|reply| Command::Arm {
            entry,
            template,
            reply,
        })
        .await
    }

    pub async fn disarm(&self) -> Result<bool, CommandError> {
        self.request(|reply| Command::Disarm { reply }).await
    }

    pub async fn register_hotkey(&self, spec: HotkeySpec) -> Result<(), CommandError> {
        self.request(|reply| Command::RegisterHotkey { spec, reply })
            .await?
    }

    pub async fn unregister_hotkey(&self) -> Result<(), CommandError> {
        self.request(|reply| Command::UnregisterHotkey { reply }).await
    }

    pub async fn cancel(&self) -> Result<bool, CommandError> {
        self.request(|reply| Command::Cancel { reply }).await
    }

    pub async fn shutdown(&self) {
        if self.tx.send(Command::Shutdown).await.is_err() {
            debug!("state machine already stopped");
        }
    }
}

/// Entry typed when the hotkey fires
struct Armed {
    entry: Entry,
    template: Option<String>,
}

/// Completion report from the blocking worker
struct Finished {
    actions: usize,
    started_at: Instant,
    result: Result<(), AutoTypeError>,
    reply: Option<Reply<usize>>,
}

/// The state machine that serialises triggers and commands
pub struct StateMachine {
    state: State,
    monitor: HotkeyMonitor,
    engine: Arc<AutoType>,
    armed: Option<Armed>,
    /// Stops the sequence started by the last transition to Typing
    running: Option<CancelToken>,
    event_tx: broadcast::Sender<AutoTypeEvent>,
    done_tx: mpsc::Sender<Finished>,
    done_rx: Option<mpsc::Receiver<Finished>>,
}

impl StateMachine {
    /// Create a new state machine
    pub fn new(
        monitor: HotkeyMonitor,
        engine: Arc<AutoType>,
        event_tx: broadcast::Sender<AutoTypeEvent>,
    ) -> Self {
        let (done_tx, done_rx) = mpsc::channel(4);
        Self {
            state: State::Idle,
            monitor,
            engine,
            armed: None,
            running: None,
            event_tx,
            done_tx,
            done_rx: Some(done_rx),
        }
    }

    /// Get the current state
    pub fn state(&self) -> State {
        self.state
    }

    /// Process hotkey notifications and commands until shut down or the
    /// command channel closes
    pub async fn run(
        &mut self,
        mut hotkey_rx: mpsc::Receiver<HotkeyEvent>,
        mut command_rx: mpsc::Receiver<Command>,
    ) {
        let Some(mut done_rx) = self.done_rx.take() else {
            warn!("state machine already ran");
            return;
        };
        info!("state machine started in Idle state");

        loop {
            tokio::select! {
                Some(event) = hotkey_rx.recv() => self.handle_hotkey_event(event),
                Some(finished) = done_rx.recv() => self.handle_finished(finished),
                command = command_rx.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
            }
        }

        if let Some(token) = self.running.take() {
            token.cancel();
        }
        self.monitor.unregister_hotkey();
        info!("state machine stopped");
    }

    fn handle_hotkey_event(&mut self, event: HotkeyEvent) {
        match event {
            HotkeyEvent::Triggered => {
                self.emit(AutoTypeEvent::HotkeyTriggered);
                match &self.armed {
                    Some(armed) => {
                        let entry = armed.entry.clone();
                        let template = armed.template.clone();
                        self.start_sequence(entry, template, None);
                    }
                    None => {
                        self.emit(AutoTypeEvent::TriggerRejected {
                            reason: CommandError::NotArmed.to_string(),
                        });
                    }
                }
            }
            HotkeyEvent::ListenerRestarted => {
                warn!("hotkey listener was disabled by the system and re-enabled");
                self.emit(AutoTypeEvent::ListenerRestarted);
            }
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Status { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::AutoType {
                entry,
                template,
                reply,
            } => {
                let entry = match entry {
                    Some(entry) => Some((entry, template)),
                    None => self
                        .armed
                        .as_ref()
                        .map(|armed| (armed.entry.clone(), template.or_else(|| armed.template.clone()))),
                };
                match entry {
                    Some((entry, template)) => self.start_sequence(entry, template, Some(reply)),
                    None => {
                        let _ = reply.send(Err(CommandError::NotArmed));
                    }
                }
            }
            Command::Arm {
                entry,
                template,
                reply,
            } => {
                info!(title = %entry.title, "entry armed for auto-type");
                self.armed = Some(Armed { entry, template });
                let _ = reply.send(());
            }
            Command::Disarm { reply } => {
                let was_armed = self.armed.take().is_some();
                if was_armed {
                    info!("entry disarmed");
                }
                let _ = reply.send(was_armed);
            }
            Command::RegisterHotkey { spec, reply } => {
                let _ = reply.send(self.register_hotkey(spec));
            }
            Command::UnregisterHotkey { reply } => {
                if self.monitor.is_registered() {
                    self.monitor.unregister_hotkey();
                    self.emit(AutoTypeEvent::HotkeyUnregistered);
                }
                let _ = reply.send(());
            }
            Command::Cancel { reply } => {
                let running = match &self.running {
                    Some(token) => {
                        info!("cancelling auto-type sequence");
                        token.cancel();
                        true
                    }
                    None => false,
                };
                let _ = reply.send(running);
            }
            // Handled by `run`
            Command::Shutdown => {}
        }
    }

    fn register_hotkey(&mut self, spec: HotkeySpec) -> Result<(), CommandError> {
        let was_registered = self.monitor.is_registered();
        match self.monitor.register_hotkey(spec) {
            Ok(()) => {
                self.emit(AutoTypeEvent::HotkeyRegistered {
                    hotkey: self.monitor.current_hotkey().to_string(),
                });
                Ok(())
            }
            Err(e) => {
                if was_registered {
                    self.emit(AutoTypeEvent::HotkeyUnregistered);
                }
                Err(e.into())
            }
        }
    }

    /// Compile on this task, then type on a blocking worker
    fn start_sequence(&mut self, entry: Entry, template: Option<String>, reply: Option<Reply<usize>>) {
        if self.state == State::Typing {
            self.emit(AutoTypeEvent::TriggerRejected {
                reason: AutoTypeError::Busy.to_string(),
            });
            if let Some(reply) = reply {
                let _ = reply.send(Err(AutoTypeError::Busy.into()));
            }
            return;
        }

        let sequence = match self.engine.compile(template.as_deref(), &entry) {
            Ok(sequence) => sequence,
            Err(e) => {
                warn!(error = %e, "auto-type template rejected");
                self.emit(AutoTypeEvent::SequenceFailed {
                    error: e.to_string(),
                });
                if let Some(reply) = reply {
                    let _ = reply.send(Err(AutoTypeError::from(e).into()));
                }
                return;
            }
        };
        drop(entry);

        let actions = sequence.len();
        self.transition_to(State::Typing);
        self.emit(AutoTypeEvent::SequenceStarted { actions });

        let cancel = CancelToken::new();
        self.running = Some(cancel.clone());

        let engine = Arc::clone(&self.engine);
        let done_tx = self.done_tx.clone();
        let started_at = Instant::now();
        tokio::spawn(async move {
            let worker =
                tokio::task::spawn_blocking(move || engine.try_perform_with(&sequence, cancel));
            let result = match worker.await {
                Ok(result) => result,
                Err(e) => Err(AutoTypeError::Injection(InjectionError::SynthesisFailed(
                    format!("typing worker failed: {}", e),
                ))),
            };
            let finished = Finished {
                actions,
                started_at,
                result,
                reply,
            };
            if done_tx.send(finished).await.is_err() {
                debug!("state machine gone before sequence completed");
            }
        });
    }

    fn handle_finished(&mut self, finished: Finished) {
        self.running = None;
        self.transition_to(State::Idle);

        let Finished {
            actions,
            started_at,
            result,
            reply,
        } = finished;

        match &result {
            Ok(()) => self.emit(AutoTypeEvent::SequenceFinished {
                actions,
                duration_ms: started_at.elapsed().as_millis() as u64,
            }),
            Err(e) => self.emit(AutoTypeEvent::SequenceFailed {
                error: e.to_string(),
            }),
        }

        if let Some(reply) = reply {
            let _ = reply.send(result.map(|()| actions).map_err(CommandError::from));
        }
    }

    fn snapshot(&self) -> StatusSnapshot {
        let hotkey = self.monitor.current_hotkey();
        StatusSnapshot {
            state: self.state,
            hotkey: (!hotkey.is_empty()).then(|| hotkey.to_string()),
            armed: self.armed.is_some(),
            injection_available: self.engine.is_available(),
        }
    }

    /// Perform a state transition
    fn transition_to(&mut self, new_state: State) {
        if new_state != self.state {
            info!(from = %self.state, to = %new_state, "state transition");
            self.state = new_state;
        }
    }

    fn emit(&self, event: AutoTypeEvent) {
        debug!(%event, "emitting event");
        let _ = self.event_tx.send(event);
    }
}
