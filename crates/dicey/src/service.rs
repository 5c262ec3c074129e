//! `DecisionService`: the host process for decision rooms.
//!
//! Ties the layers together: bytes → envelope → identity → room. The
//! service has no transport of its own. Whatever carries bytes (HTTP,
//! WebSocket, a test) calls [`DecisionService::handle_bytes`] or the typed
//! [`DecisionService::handle_request`].

use std::sync::Arc;
use std::time::Instant;

use dicey_activity::{Clock, SystemClock};
use dicey_protocol::{
    Codec, Envelope, ErrorKind, JsonCodec, ParticipantId, Request, Response, RoomCode,
    RoomSnapshot,
};
use dicey_room::{RoomConfig, RoomManager};
use tokio::sync::Mutex;

use crate::handler::{dispatch, error_response};
use crate::{DiceyError, IdentitySource};

/// Shared state behind every clone of a service.
pub(crate) struct ServiceState<I: IdentitySource, C: Codec> {
    pub(crate) rooms: Mutex<RoomManager>,
    pub(crate) identity: I,
    pub(crate) codec: C,
    pub(crate) started: Instant,
}

/// Builder for a [`DecisionService`].
///
/// ```rust,ignore
/// let service = DecisionServiceBuilder::new()
///     .room_config(RoomConfig { default_max_participants: 6, ..Default::default() })
///     .build(my_identity_source);
/// ```
pub struct DecisionServiceBuilder {
    room_config: RoomConfig,
    clock: Arc<dyn Clock>,
}

impl DecisionServiceBuilder {
    pub fn new() -> Self {
        Self {
            room_config: RoomConfig::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Replaces the wall clock, e.g. with a `ManualClock` in tests.
    pub fn clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Builds a service speaking JSON.
    pub fn build<I: IdentitySource>(self, identity: I) -> DecisionService<I, JsonCodec> {
        self.build_with_codec(identity, JsonCodec)
    }

    pub fn build_with_codec<I: IdentitySource, C: Codec>(
        self,
        identity: I,
        codec: C,
    ) -> DecisionService<I, C> {
        let state = Arc::new(ServiceState {
            rooms: Mutex::new(RoomManager::new(self.room_config, self.clock)),
            identity,
            codec,
            started: Instant::now(),
        });
        DecisionService { state }
    }
}

impl Default for DecisionServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Accepts participant requests and applies them to rooms.
///
/// Cheap to clone; clones share the same rooms.
pub struct DecisionService<I: IdentitySource, C: Codec = JsonCodec> {
    state: Arc<ServiceState<I, C>>,
}

impl<I: IdentitySource, C: Codec> Clone for DecisionService<I, C> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<I: IdentitySource, C: Codec> DecisionService<I, C> {
    /// Identifies the caller and applies `request`. Never fails: rejections
    /// come back as [`Response::Error`].
    pub async fn handle_request(&self, token: Option<&str>, request: Request) -> Response {
        let who = match self.identify(token).await {
            Ok(who) => who,
            Err(e) => {
                tracing::debug!(error = %e, "request rejected: identity");
                return error_response(&e);
            }
        };
        match dispatch(&self.state, who, request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(participant = %who, kind = ?e.kind(), error = %e, "request rejected");
                error_response(&e)
            }
        }
    }

    /// Applies an enveloped request and wraps the reply with the same `seq`.
    pub async fn handle_envelope(&self, envelope: Envelope<Request>) -> Envelope<Response> {
        let response = self
            .handle_request(envelope.token.as_deref(), envelope.body)
            .await;
        Envelope::new(envelope.seq, self.elapsed_ms(), response)
    }

    /// Decodes, applies and encodes. Input that doesn't decode gets a
    /// `BadRequest` reply with `seq` 0.
    pub async fn handle_bytes(&self, bytes: &[u8]) -> Result<Vec<u8>, DiceyError> {
        let reply = match self.state.codec.decode::<Envelope<Request>>(bytes) {
            Ok(envelope) => self.handle_envelope(envelope).await,
            Err(e) => {
                tracing::debug!(error = %e, "failed to decode request envelope");
                Envelope::new(
                    0,
                    self.elapsed_ms(),
                    Response::Error {
                        kind: ErrorKind::BadRequest,
                        message: e.to_string(),
                    },
                )
            }
        };
        Ok(self.state.codec.encode(&reply)?)
    }

    /// The current snapshot of a room as `viewer` sees it.
    pub async fn snapshot(
        &self,
        viewer: ParticipantId,
        code: &RoomCode,
    ) -> Result<RoomSnapshot, DiceyError> {
        let handle = self.state.rooms.lock().await.handle(code)?;
        Ok(handle.snapshot(viewer).await?)
    }

    /// Number of live rooms.
    pub async fn room_count(&self) -> usize {
        self.state.rooms.lock().await.room_count()
    }

    async fn identify(&self, token: Option<&str>) -> Result<ParticipantId, DiceyError> {
        let token = token.ok_or_else(|| DiceyError::Identity("missing token".into()))?;
        self.state.identity.identify(token).await
    }

    fn elapsed_ms(&self) -> u64 {
        self.state.started.elapsed().as_millis() as u64
    }
}
