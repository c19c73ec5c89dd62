//! Bridge driver - runs a coordinator on a tokio task
//!
//! Player events and API calls share one ordered channel, so the coordinator
//! sees them exactly in the order the host produced them. The same task
//! sleeps until the coordinator's stall deadline and fires it.

use crate::{
    client::ErrorSeverity,
    coordinator::{CastMetadata, CoordinatorStatus, SessionCoordinator},
    metadata::ContentMetadataOverrides,
    normalize::Attributes,
    player::PlayerEvent,
    Error, Result,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

enum Command {
    Event(PlayerEvent),
    UpdateContentMetadata(ContentMetadataOverrides),
    InitializeSession(oneshot::Sender<Result<()>>),
    CustomApplicationEvent {
        name: String,
        attributes: Option<Attributes>,
    },
    CustomPlaybackEvent {
        name: String,
        attributes: Option<Attributes>,
    },
    PlaybackDeficiency {
        message: String,
        severity: ErrorSeverity,
        end_session: bool,
    },
    CastMetadata(CastMetadata),
    Status(oneshot::Sender<CoordinatorStatus>),
    Release(oneshot::Sender<()>),
}

/// Handle to a coordinator running on its own task
#[derive(Clone)]
pub struct BridgeHandle {
    commands: mpsc::UnboundedSender<Command>,
}

/// Spawn the driver task for `coordinator`
pub fn spawn(coordinator: SessionCoordinator) -> (BridgeHandle, JoinHandle<()>) {
    let (commands, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run(coordinator, rx));
    (BridgeHandle { commands }, task)
}

async fn run(mut coordinator: SessionCoordinator, mut rx: mpsc::UnboundedReceiver<Command>) {
    debug!("Bridge driver started");

    loop {
        let deadline = coordinator.next_deadline();

        tokio::select! {
            biased;

            command = rx.recv() => match command {
                Some(command) => apply(&mut coordinator, command),
                None => break,
            },
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                coordinator.handle_timeout(Instant::now());
            }
        }
    }

    // Every handle is gone
    coordinator.release();
    info!("Bridge driver stopped");
}

fn apply(coordinator: &mut SessionCoordinator, command: Command) {
    match command {
        Command::Event(event) => coordinator.handle_event(event),
        Command::UpdateContentMetadata(overrides) => coordinator.update_content_metadata(overrides),
        Command::InitializeSession(reply) => {
            let _ = reply.send(coordinator.initialize_session());
        }
        Command::CustomApplicationEvent { name, attributes } => {
            coordinator.send_custom_application_event(&name, attributes);
        }
        Command::CustomPlaybackEvent { name, attributes } => {
            coordinator.send_custom_playback_event(&name, attributes);
        }
        Command::PlaybackDeficiency {
            message,
            severity,
            end_session,
        } => coordinator.report_playback_deficiency(&message, severity, end_session),
        Command::CastMetadata(metadata) => coordinator.handle_cast_metadata_event(metadata),
        Command::Status(reply) => {
            let _ = reply.send(coordinator.status());
        }
        Command::Release(reply) => {
            coordinator.release();
            let _ = reply.send(());
        }
    }
}

impl BridgeHandle {
    fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| Error::BridgeClosed)
    }

    /// Deliver a player event
    pub fn dispatch(&self, event: PlayerEvent) -> Result<()> {
        self.send(Command::Event(event))
    }

    pub fn update_content_metadata(&self, overrides: ContentMetadataOverrides) -> Result<()> {
        self.send(Command::UpdateContentMetadata(overrides))
    }

    pub async fn initialize_session(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::InitializeSession(tx))?;
        rx.await.map_err(|_| Error::BridgeClosed)?
    }

    pub fn send_custom_application_event(
        &self,
        name: impl Into<String>,
        attributes: Option<Attributes>,
    ) -> Result<()> {
        self.send(Command::CustomApplicationEvent {
            name: name.into(),
            attributes,
        })
    }

    pub fn send_custom_playback_event(
        &self,
        name: impl Into<String>,
        attributes: Option<Attributes>,
    ) -> Result<()> {
        self.send(Command::CustomPlaybackEvent {
            name: name.into(),
            attributes,
        })
    }

    pub fn report_playback_deficiency(
        &self,
        message: impl Into<String>,
        severity: ErrorSeverity,
        end_session: bool,
    ) -> Result<()> {
        self.send(Command::PlaybackDeficiency {
            message: message.into(),
            severity,
            end_session,
        })
    }

    pub fn handle_cast_metadata_event(&self, metadata: CastMetadata) -> Result<()> {
        self.send(Command::CastMetadata(metadata))
    }

    /// Current coordinator state; also waits for earlier commands to apply
    pub async fn status(&self) -> Result<CoordinatorStatus> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Status(tx))?;
        rx.await.map_err(|_| Error::BridgeClosed)
    }

    /// Release the coordinator. Safe to call more than once.
    pub async fn release(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        if self.send(Command::Release(tx)).is_err() {
            return Ok(());
        }
        let _ = rx.await;
        Ok(())
    }
}
