//! Room manager: creates, tracks and removes rooms by code.

use std::collections::HashMap;
use std::sync::Arc;

use dicey_activity::{Clock, SystemClock};
use dicey_protocol::{ParticipantId, RoomCode, RoomFilter, RoomSnapshot, RoomSummary};
use rand::Rng;

use crate::room::spawn_room;
use crate::{NewRoom, RoomConfig, RoomError, RoomHandle, RoomStateMachine};

/// The authoritative index of live rooms.
///
/// Room codes are unique among the rooms it holds. Per-room state lives in
/// each room's actor; the manager only routes by code.
pub struct RoomManager {
    rooms: HashMap<RoomCode, RoomHandle>,
    config: RoomConfig,
    clock: Arc<dyn Clock>,
}

impl RoomManager {
    pub fn new(config: RoomConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            rooms: HashMap::new(),
            config: config.validated(),
            clock,
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Opens a room with a fresh code and starts its actor.
    ///
    /// Returns the handle together with the creator's first snapshot.
    pub fn create_room(
        &mut self,
        creator: ParticipantId,
        new_room: NewRoom,
    ) -> Result<(RoomHandle, RoomSnapshot), RoomError> {
        let valid = new_room.validate(&self.config)?;
        let code = self.unused_code();

        let machine =
            RoomStateMachine::new(code.clone(), creator, valid, &self.config, self.clock.now());
        let snapshot = machine.snapshot();
        let handle = spawn_room(machine, &self.config, Arc::clone(&self.clock));
        self.rooms.insert(code.clone(), handle.clone());

        tracing::info!(room = %code, %creator, title = %snapshot.room.title, "room created");
        Ok((handle, snapshot))
    }

    /// Looks up a room by code.
    pub fn handle(&self, code: &RoomCode) -> Result<RoomHandle, RoomError> {
        self.rooms
            .get(code)
            .cloned()
            .ok_or_else(|| RoomError::NotFound(code.clone()))
    }

    /// Takes a room out of the index. Creator only.
    ///
    /// Returns its handle so the caller can [`shutdown`](RoomHandle::shutdown)
    /// the actor once it no longer holds the manager; nothing here awaits.
    pub fn remove_room(
        &mut self,
        who: ParticipantId,
        code: &RoomCode,
    ) -> Result<RoomHandle, RoomError> {
        let handle = self.handle(code)?;
        if handle.creator() != who {
            return Err(RoomError::NotCreator);
        }
        self.rooms.remove(code);

        tracing::info!(room = %code, "room removed");
        Ok(handle)
    }

    /// Lists the rooms `participant` belongs to that match `filter`.
    ///
    /// `Live` rooms come newest-created first; `Past` and `Archived` rooms
    /// newest-resolved first. Rooms whose actor doesn't answer are skipped.
    pub async fn list_rooms(
        &self,
        participant: ParticipantId,
        filter: RoomFilter,
    ) -> Vec<RoomSummary> {
        Self::collect_summaries(self.room_handles(), participant, filter).await
    }

    /// [`list_rooms`](Self::list_rooms) over handles cloned out earlier, so
    /// callers can query rooms without holding the manager.
    pub async fn collect_summaries(
        handles: Vec<RoomHandle>,
        participant: ParticipantId,
        filter: RoomFilter,
    ) -> Vec<RoomSummary> {
        let mut summaries = Vec::new();
        for handle in handles {
            if let Ok(Some(summary)) = handle.summary(participant).await {
                if filter.matches(&summary) {
                    summaries.push(summary);
                }
            }
        }
        match filter {
            RoomFilter::Live => summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            RoomFilter::Past | RoomFilter::Archived => {
                summaries.sort_by(|a, b| b.resolved_at.cmp(&a.resolved_at))
            }
        }
        summaries
    }

    /// Cloned handles to every room.
    pub fn room_handles(&self) -> Vec<RoomHandle> {
        self.rooms.values().cloned().collect()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn unused_code(&self) -> RoomCode {
        let mut rng = rand::rng();
        loop {
            let code = RoomCode::from_picks(|n| rng.random_range(0..n));
            if !self.rooms.contains_key(&code) {
                return code;
            }
            tracing::debug!(room = %code, "room code collision, retrying");
        }
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new(RoomConfig::default(), Arc::new(SystemClock))
    }
}
