//! Request dispatch: one identified request in, one response out.

use std::sync::Arc;

use dicey_protocol::{Codec, ParticipantId, Request, Response, RoomCode};
use dicey_room::{NewRoom, RoomHandle, RoomManager};

use crate::service::ServiceState;
use crate::{DiceyError, IdentitySource};

/// Applies `request` on behalf of `who`.
///
/// The manager lock is only held to look rooms up (or to create and
/// unlist them) and never across a message to a room; the room's own actor
/// serializes everything else.
pub(crate) async fn dispatch<I, C>(
    state: &Arc<ServiceState<I, C>>,
    who: ParticipantId,
    request: Request,
) -> Result<Response, DiceyError>
where
    I: IdentitySource,
    C: Codec,
{
    let response = match request {
        Request::CreateRoom {
            title,
            description,
            max_participants,
        } => {
            let (_, snapshot) = state.rooms.lock().await.create_room(
                who,
                NewRoom {
                    title,
                    description,
                    max_participants,
                },
            )?;
            snapshot_response(snapshot.redacted_for(who))
        }
        Request::JoinRoom { code } => snapshot_response(room(state, &code).await?.join(who).await?),
        Request::GetSnapshot { code } => {
            snapshot_response(room(state, &code).await?.snapshot(who).await?)
        }
        Request::AddOption { code, text } => {
            snapshot_response(room(state, &code).await?.add_option(who, text).await?)
        }
        Request::EditOption {
            code,
            option_id,
            text,
        } => snapshot_response(
            room(state, &code)
                .await?
                .edit_option(who, option_id, text)
                .await?,
        ),
        Request::DeleteOption { code, option_id } => snapshot_response(
            room(state, &code)
                .await?
                .delete_option(who, option_id)
                .await?,
        ),
        Request::StartVoting {
            code,
            expected_revision,
        } => snapshot_response(
            room(state, &code)
                .await?
                .start_voting(who, expected_revision)
                .await?,
        ),
        Request::CastVote { code, option_id } => snapshot_response(
            room(state, &code)
                .await?
                .cast_vote(who, option_id)
                .await?,
        ),
        Request::EndVoting {
            code,
            expected_revision,
        } => {
            let (resolution, snapshot) = room(state, &code)
                .await?
                .end_voting(who, expected_revision)
                .await?;
            Response::Resolution {
                resolution,
                snapshot: Box::new(snapshot),
            }
        }
        Request::BreakTie {
            code,
            method,
            expected_revision,
        } => {
            let (resolution, snapshot) = room(state, &code)
                .await?
                .break_tie(who, method, expected_revision)
                .await?;
            Response::Resolution {
                resolution,
                snapshot: Box::new(snapshot),
            }
        }
        Request::ArchiveRoom { code } => {
            snapshot_response(room(state, &code).await?.set_archived(who, true).await?)
        }
        Request::UnarchiveRoom { code } => {
            snapshot_response(room(state, &code).await?.set_archived(who, false).await?)
        }
        Request::DeleteRoom { code } => {
            let code = RoomCode::parse(&code)?;
            let handle = state.rooms.lock().await.remove_room(who, &code)?;
            // Already unlisted; a room with a full mailbox only delays this caller.
            let _ = handle.shutdown().await;
            tracing::info!(room = %code, participant = %who, "room destroyed");
            Response::Deleted {
                code: code.to_string(),
            }
        }
        Request::ListRooms { filter } => {
            let handles = state.rooms.lock().await.room_handles();
            let rooms = RoomManager::collect_summaries(handles, who, filter).await;
            Response::Rooms { rooms }
        }
    };
    Ok(response)
}

/// Converts a rejection into the reply the caller sees.
pub(crate) fn error_response(err: &DiceyError) -> Response {
    Response::Error {
        kind: err.kind(),
        message: err.to_string(),
    }
}

/// Normalizes a user-typed code and finds its room.
async fn room<I, C>(state: &Arc<ServiceState<I, C>>, raw: &str) -> Result<RoomHandle, DiceyError>
where
    I: IdentitySource,
    C: Codec,
{
    let code = RoomCode::parse(raw)?;
    Ok(state.rooms.lock().await.handle(&code)?)
}

fn snapshot_response(snapshot: dicey_protocol::RoomSnapshot) -> Response {
    Response::Snapshot {
        snapshot: Box::new(snapshot),
    }
}
