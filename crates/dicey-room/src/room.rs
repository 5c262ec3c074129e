//! Room actor: an isolated Tokio task that owns one room's state machine.
//!
//! Each room runs in its own task and talks to the outside world through
//! an mpsc channel. Commands are applied one at a time, so every operation
//! is atomic with respect to the room and checked against the state at
//! application time.

use std::sync::Arc;

use dicey_activity::{Clock, IdleCheckScheduler};
use dicey_protocol::{
    OptionId, ParticipantId, Resolution, RoomCode, RoomSnapshot, RoomSummary, TiebreakMethod,
};
use tokio::sync::{mpsc, oneshot};

use crate::machine::IdleCheck;
use crate::{RoomConfig, RoomError, RoomStateMachine};

type Reply<T> = oneshot::Sender<Result<T, RoomError>>;

/// Commands sent to a room actor. Each carries a reply channel.
pub(crate) enum RoomCommand {
    /// Join the room. A no-op for existing members.
    Join {
        who: ParticipantId,
        reply: Reply<RoomSnapshot>,
    },
    /// Read the room as `viewer` sees it, without joining.
    Snapshot {
        viewer: ParticipantId,
        reply: Reply<RoomSnapshot>,
    },
    /// A listing entry, or `None` if `participant` isn't a member.
    Summary {
        participant: ParticipantId,
        reply: oneshot::Sender<Option<RoomSummary>>,
    },
    /// Propose an option while the room is `Open`.
    AddOption {
        who: ParticipantId,
        text: String,
        reply: Reply<RoomSnapshot>,
    },
    /// Rewrite one of the caller's own options.
    EditOption {
        who: ParticipantId,
        option_id: OptionId,
        text: String,
        reply: Reply<RoomSnapshot>,
    },
    /// Withdraw one of the caller's own options.
    DeleteOption {
        who: ParticipantId,
        option_id: OptionId,
        reply: Reply<RoomSnapshot>,
    },
    /// Creator freezes the options and opens the ballot.
    StartVoting {
        who: ParticipantId,
        expected_revision: Option<u64>,
        reply: Reply<RoomSnapshot>,
    },
    /// Record the caller's single ballot.
    CastVote {
        who: ParticipantId,
        option_id: OptionId,
        reply: Reply<RoomSnapshot>,
    },
    /// Creator closes the ballot: a winner or a pending tie.
    EndVoting {
        who: ParticipantId,
        expected_revision: Option<u64>,
        reply: Reply<(Resolution, RoomSnapshot)>,
    },
    /// Creator settles a pending tie with a uniform draw.
    BreakTie {
        who: ParticipantId,
        method: TiebreakMethod,
        expected_revision: Option<u64>,
        reply: Reply<(Resolution, RoomSnapshot)>,
    },
    /// Creator files a resolved room away, or brings it back.
    SetArchived {
        who: ParticipantId,
        archived: bool,
        reply: Reply<RoomSnapshot>,
    },
    /// Stop the actor. Commands still queued are dropped.
    Shutdown,
}

/// Handle to a running room actor.
///
/// Cheap to clone. The creator is fixed at creation, so permission checks
/// that only need it (deleting a room) don't have to round-trip.
#[derive(Clone)]
pub struct RoomHandle {
    code: RoomCode,
    creator: ParticipantId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn creator(&self) -> ParticipantId {
        self.creator
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(make(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))
    }

    /// Joins `who` (idempotent) and returns their view of the room.
    pub async fn join(&self, who: ParticipantId) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::Join { who, reply }).await?
    }

    /// The room as `viewer` sees it. Doesn't join.
    pub async fn snapshot(&self, viewer: ParticipantId) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::Snapshot { viewer, reply })
            .await?
    }

    /// A listing entry, if `participant` belongs to the room.
    pub async fn summary(
        &self,
        participant: ParticipantId,
    ) -> Result<Option<RoomSummary>, RoomError> {
        self.request(|reply| RoomCommand::Summary { participant, reply })
            .await
    }

    /// Proposes an option as `who`, joining them if it is accepted.
    pub async fn add_option(
        &self,
        who: ParticipantId,
        text: impl Into<String>,
    ) -> Result<RoomSnapshot, RoomError> {
        let text = text.into();
        self.request(|reply| RoomCommand::AddOption { who, text, reply })
            .await?
    }

    /// Rewrites one of `who`'s options.
    pub async fn edit_option(
        &self,
        who: ParticipantId,
        option_id: OptionId,
        text: impl Into<String>,
    ) -> Result<RoomSnapshot, RoomError> {
        let text = text.into();
        self.request(|reply| RoomCommand::EditOption {
            who,
            option_id,
            text,
            reply,
        })
        .await?
    }

    /// Withdraws one of `who`'s options.
    pub async fn delete_option(
        &self,
        who: ParticipantId,
        option_id: OptionId,
    ) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::DeleteOption {
            who,
            option_id,
            reply,
        })
        .await?
    }

    /// Creator opens the ballot. Fails with `Conflict` if `expected_revision` is stale.
    pub async fn start_voting(
        &self,
        who: ParticipantId,
        expected_revision: Option<u64>,
    ) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::StartVoting {
            who,
            expected_revision,
            reply,
        })
        .await?
    }

    /// Records `who`'s ballot, joining them if it is accepted.
    pub async fn cast_vote(
        &self,
        who: ParticipantId,
        option_id: OptionId,
    ) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::CastVote {
            who,
            option_id,
            reply,
        })
        .await?
    }

    /// Creator closes the ballot.
    pub async fn end_voting(
        &self,
        who: ParticipantId,
        expected_revision: Option<u64>,
    ) -> Result<(Resolution, RoomSnapshot), RoomError> {
        self.request(|reply| RoomCommand::EndVoting {
            who,
            expected_revision,
            reply,
        })
        .await?
    }

    /// Creator settles a pending tie.
    pub async fn break_tie(
        &self,
        who: ParticipantId,
        method: TiebreakMethod,
        expected_revision: Option<u64>,
    ) -> Result<(Resolution, RoomSnapshot), RoomError> {
        self.request(|reply| RoomCommand::BreakTie {
            who,
            method,
            expected_revision,
            reply,
        })
        .await?
    }

    /// Creator archives or unarchives a resolved room.
    pub async fn set_archived(
        &self,
        who: ParticipantId,
        archived: bool,
    ) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::SetArchived {
            who,
            archived,
            reply,
        })
        .await?
    }

    /// Tells the room to stop. Pending commands behind this one are dropped.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))
    }
}

/// The actor itself. Lives inside the spawned task.
struct RoomActor {
    machine: RoomStateMachine,
    scheduler: IdleCheckScheduler,
    clock: Arc<dyn Clock>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    async fn run(mut self) {
        let code = self.machine.code().clone();
        tracing::info!(room = %code, "room actor started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    match cmd {
                        Some(RoomCommand::Shutdown) | None => break,
                        Some(cmd) => self.handle(cmd),
                    }
                }
                _ = self.scheduler.wait_for_check() => {
                    if let IdleCheck::Forced(resolution) = self.machine.check_idle(self.clock.now()) {
                        self.scheduler.record_forced();
                        tracing::debug!(room = %code, ?resolution, "idle check forced resolution");
                    }
                }
            }

            if !self.machine.watches_idle() && !self.scheduler.is_paused() {
                self.scheduler.pause();
            }
        }

        tracing::info!(room = %code, "room actor stopped");
    }

    fn handle(&mut self, cmd: RoomCommand) {
        let now = self.clock.now();
        let m = &mut self.machine;
        match cmd {
            RoomCommand::Join { who, reply } => {
                let result = m.join(who, now).map(|_| m.snapshot().redacted_for(who));
                let _ = reply.send(result);
            }
            RoomCommand::Snapshot { viewer, reply } => {
                let _ = reply.send(Ok(m.snapshot().redacted_for(viewer)));
            }
            RoomCommand::Summary { participant, reply } => {
                let summary = m
                    .is_participant(participant)
                    .then(|| m.snapshot().summary());
                let _ = reply.send(summary);
            }
            RoomCommand::AddOption { who, text, reply } => {
                let result = m.add_option(who, &text, now);
                let _ = reply.send(result.map(|_| m.snapshot().redacted_for(who)));
            }
            RoomCommand::EditOption {
                who,
                option_id,
                text,
                reply,
            } => {
                let result = m.edit_option(who, option_id, &text, now);
                let _ = reply.send(result.map(|_| m.snapshot().redacted_for(who)));
            }
            RoomCommand::DeleteOption {
                who,
                option_id,
                reply,
            } => {
                let result = m.delete_option(who, option_id, now);
                let _ = reply.send(result.map(|_| m.snapshot().redacted_for(who)));
            }
            RoomCommand::StartVoting {
                who,
                expected_revision,
                reply,
            } => {
                let result = m.start_voting(who, expected_revision, now);
                let _ = reply.send(result.map(|_| m.snapshot().redacted_for(who)));
            }
            RoomCommand::CastVote {
                who,
                option_id,
                reply,
            } => {
                let result = m.cast_vote(who, option_id, now);
                let _ = reply.send(result.map(|_| m.snapshot().redacted_for(who)));
            }
            RoomCommand::EndVoting {
                who,
                expected_revision,
                reply,
            } => {
                let result = m.end_voting(who, expected_revision, now);
                let _ = reply.send(result.map(|r| (r, m.snapshot().redacted_for(who))));
            }
            RoomCommand::BreakTie {
                who,
                method,
                expected_revision,
                reply,
            } => {
                let result = m.break_tie(who, method, expected_revision, now);
                let _ = reply.send(result.map(|r| (r, m.snapshot().redacted_for(who))));
            }
            RoomCommand::SetArchived {
                who,
                archived,
                reply,
            } => {
                let result = m.set_archived(who, archived, now);
                let _ = reply.send(result.map(|_| m.snapshot().redacted_for(who)));
            }
            RoomCommand::Shutdown => {}
        }
    }
}

/// Spawns a room actor for `machine` and returns a handle to it.
pub(crate) fn spawn_room(
    machine: RoomStateMachine,
    config: &RoomConfig,
    clock: Arc<dyn Clock>,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(config.command_buffer);
    let code = machine.code().clone();
    let creator = machine.room().creator;

    let actor = RoomActor {
        machine,
        scheduler: IdleCheckScheduler::new(config.idle.clone()),
        clock,
        receiver: rx,
    };
    tokio::spawn(actor.run());

    RoomHandle {
        code,
        creator,
        sender: tx,
    }
}
