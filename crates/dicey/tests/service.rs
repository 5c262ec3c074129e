//! Integration tests for the decision service: typed requests, the byte
//! path, and snapshot polling.

use std::time::Duration;

use chrono::DateTime;
use dicey::prelude::*;

const HOST: ParticipantId = ParticipantId(1);
const GUEST: ParticipantId = ParticipantId(2);

// =========================================================================
// Helpers
// =========================================================================

fn identity() -> TokenTable {
    TokenTable::new()
        .with("host", HOST)
        .with("guest", GUEST)
        .with("third", ParticipantId(3))
}

fn service_with(clock: &ManualClock) -> DecisionService<TokenTable> {
    DecisionServiceBuilder::new()
        .room_config(RoomConfig {
            idle: IdleCheckConfig {
                initial_jitter: Duration::ZERO,
                ..Default::default()
            },
            ..RoomConfig::default()
        })
        .clock(clock.clone())
        .build(identity())
}

fn manual_clock() -> ManualClock {
    ManualClock::new(DateTime::from_timestamp(1_700_000_000, 0).unwrap())
}

fn expect_snapshot(response: Response) -> RoomSnapshot {
    match response {
        Response::Snapshot { snapshot } => *snapshot,
        other => panic!("expected Snapshot, got {other:?}"),
    }
}

fn expect_error(response: Response) -> ErrorKind {
    match response {
        Response::Error { kind, .. } => kind,
        other => panic!("expected Error, got {other:?}"),
    }
}

async fn create_room(service: &DecisionService<TokenTable>, title: &str) -> RoomSnapshot {
    expect_snapshot(
        service
            .handle_request(
                Some("host"),
                Request::CreateRoom {
                    title: title.into(),
                    description: None,
                    max_participants: None,
                },
            )
            .await,
    )
}

async fn add_option(service: &DecisionService<TokenTable>, token: &str, code: &str, text: &str) -> OptionId {
    let snap = expect_snapshot(
        service
            .handle_request(
                Some(token),
                Request::AddOption {
                    code: code.into(),
                    text: text.into(),
                },
            )
            .await,
    );
    snap.options
        .iter()
        .find(|o| o.text == text)
        .map(|o| o.id)
        .unwrap()
}

// =========================================================================
// Typed requests
// =========================================================================

#[tokio::test]
async fn test_full_decision_through_service() {
    let clock = manual_clock();
    let service = service_with(&clock);
    let created = create_room(&service, "Dinner").await;
    let code = created.room.code.to_string();

    let sushi = add_option(&service, "host", &code, "Sushi").await;
    let _tacos = add_option(&service, "guest", &code, "Tacos").await;

    let snap = expect_snapshot(
        service
            .handle_request(
                Some("host"),
                Request::StartVoting {
                    code: code.clone(),
                    expected_revision: None,
                },
            )
            .await,
    );
    assert_eq!(snap.room.phase, Phase::Voting);
    assert_eq!(snap.voting_order.len(), 2);

    for token in ["host", "guest"] {
        expect_snapshot(
            service
                .handle_request(
                    Some(token),
                    Request::CastVote {
                        code: code.clone(),
                        option_id: sushi,
                    },
                )
                .await,
        );
    }

    let response = service
        .handle_request(
            Some("host"),
            Request::EndVoting {
                code: code.clone(),
                expected_revision: None,
            },
        )
        .await;
    let Response::Resolution { resolution, snapshot } = response else {
        panic!("expected Resolution, got {response:?}");
    };
    assert_eq!(
        resolution,
        Resolution::Decided {
            option_id: sushi,
            trigger: ResolutionTrigger::Creator,
            draw: None,
        }
    );
    assert_eq!(snapshot.final_option().map(|o| o.text.as_str()), Some("Sushi"));
    assert_eq!(snapshot.room.tiebreaker_method, None);
}

#[tokio::test]
async fn test_room_codes_are_case_insensitive() {
    let service = service_with(&manual_clock());
    let created = create_room(&service, "Case").await;
    let typed = format!("  {}  ", created.room.code.as_str().to_lowercase());

    let snap = expect_snapshot(
        service
            .handle_request(Some("guest"), Request::JoinRoom { code: typed })
            .await,
    );

    assert!(snap.is_participant(GUEST));
}

#[tokio::test]
async fn test_unknown_and_malformed_codes_are_not_found() {
    let service = service_with(&manual_clock());

    for code in ["QQQQQQ", "not-a-code"] {
        let kind = expect_error(
            service
                .handle_request(Some("host"), Request::GetSnapshot { code: code.into() })
                .await,
        );
        assert_eq!(kind, ErrorKind::NotFound, "{code}");
    }
}

#[tokio::test]
async fn test_missing_or_unknown_token_is_unauthorized() {
    let service = service_with(&manual_clock());
    let req = Request::ListRooms {
        filter: RoomFilter::Live,
    };

    assert_eq!(
        expect_error(service.handle_request(None, req.clone()).await),
        ErrorKind::Unauthorized
    );
    assert_eq!(
        expect_error(service.handle_request(Some("mallory"), req).await),
        ErrorKind::Unauthorized
    );
}

#[tokio::test]
async fn test_rejections_carry_their_kind() {
    let service = service_with(&manual_clock());
    let code = create_room(&service, "Rules").await.room.code.to_string();
    let only = add_option(&service, "guest", &code, "Only").await;

    let kind = expect_error(
        service
            .handle_request(
                Some("host"),
                Request::StartVoting {
                    code: code.clone(),
                    expected_revision: None,
                },
            )
            .await,
    );
    assert_eq!(kind, ErrorKind::InsufficientOptions);

    let kind = expect_error(
        service
            .handle_request(
                Some("host"),
                Request::EditOption {
                    code: code.clone(),
                    option_id: only,
                    text: "Mine now".into(),
                },
            )
            .await,
    );
    assert_eq!(kind, ErrorKind::NotAuthor);

    let kind = expect_error(
        service
            .handle_request(
                Some("guest"),
                Request::DeleteRoom { code: code.clone() },
            )
            .await,
    );
    assert_eq!(kind, ErrorKind::NotCreator);
}

#[tokio::test]
async fn test_rejected_request_from_newcomer_does_not_break_creator_revision() {
    let service = service_with(&manual_clock());
    let code = create_room(&service, "Fragile").await.room.code.to_string();
    add_option(&service, "host", &code, "A").await;
    add_option(&service, "host", &code, "B").await;
    let rc = RoomCode::parse(&code).unwrap();
    let seen = service.snapshot(HOST, &rc).await.unwrap();

    let kind = expect_error(
        service
            .handle_request(
                Some("third"),
                Request::AddOption {
                    code: code.clone(),
                    text: "   ".into(),
                },
            )
            .await,
    );
    assert_eq!(kind, ErrorKind::InvalidInput);

    let snap = expect_snapshot(
        service
            .handle_request(
                Some("host"),
                Request::StartVoting {
                    code,
                    expected_revision: Some(seen.revision),
                },
            )
            .await,
    );
    assert_eq!(snap.room.phase, Phase::Voting);
    assert!(!snap.is_participant(ParticipantId(3)));
}

#[tokio::test]
async fn test_delete_room_then_not_found() {
    let service = service_with(&manual_clock());
    let code = create_room(&service, "Short lived").await.room.code.to_string();
    let other = create_room(&service, "Stays").await.room.code;

    let response = service
        .handle_request(Some("host"), Request::DeleteRoom { code: code.clone() })
        .await;
    assert_eq!(response, Response::Deleted { code: code.clone() });
    assert_eq!(service.room_count().await, 1);
    assert!(service.snapshot(HOST, &other).await.is_ok());

    let kind = expect_error(
        service
            .handle_request(Some("host"), Request::GetSnapshot { code })
            .await,
    );
    assert_eq!(kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_list_rooms_only_shows_callers_rooms() {
    let service = service_with(&manual_clock());
    create_room(&service, "First").await;
    create_room(&service, "Second").await;

    let Response::Rooms { rooms } = service
        .handle_request(Some("host"), Request::ListRooms { filter: RoomFilter::Live })
        .await
    else {
        panic!("expected Rooms");
    };
    assert_eq!(rooms.len(), 2);

    let Response::Rooms { rooms } = service
        .handle_request(Some("guest"), Request::ListRooms { filter: RoomFilter::Live })
        .await
    else {
        panic!("expected Rooms");
    };
    assert!(rooms.is_empty());
}

// =========================================================================
// Byte path
// =========================================================================

#[tokio::test]
async fn test_handle_bytes_echoes_seq() {
    let service = service_with(&manual_clock());
    let codec = JsonCodec;
    let request = Envelope::new(
        41,
        0,
        Request::CreateRoom {
            title: "Bytes".into(),
            description: Some("over the wire".into()),
            max_participants: Some(4),
        },
    )
    .with_token("host");

    let reply = service.handle_bytes(&codec.encode(&request).unwrap()).await.unwrap();
    let reply: Envelope<Response> = codec.decode(&reply).unwrap();

    assert_eq!(reply.seq, 41);
    let snap = expect_snapshot(reply.body);
    assert_eq!(snap.room.max_participants, 4);
    assert_eq!(snap.room.description.as_deref(), Some("over the wire"));
}

#[tokio::test]
async fn test_handle_bytes_garbage_is_bad_request() {
    let service = service_with(&manual_clock());

    let reply = service.handle_bytes(b"{ not json").await.unwrap();
    let reply: Envelope<Response> = JsonCodec.decode(&reply).unwrap();

    assert_eq!(reply.seq, 0);
    assert_eq!(expect_error(reply.body), ErrorKind::BadRequest);
}

// =========================================================================
// Idle and concurrency through the service
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_idle_forced_tie_uses_default_tiebreak() {
    let clock = manual_clock();
    let service = service_with(&clock);
    let code = create_room(&service, "Stalled").await.room.code.to_string();
    let a = add_option(&service, "host", &code, "A").await;
    let b = add_option(&service, "host", &code, "B").await;
    service
        .handle_request(
            Some("host"),
            Request::StartVoting {
                code: code.clone(),
                expected_revision: None,
            },
        )
        .await;
    for (token, option_id) in [("host", a), ("guest", b)] {
        service
            .handle_request(
                Some(token),
                Request::CastVote {
                    code: code.clone(),
                    option_id,
                },
            )
            .await;
    }

    clock.advance(Duration::from_secs(40 * 60));
    tokio::time::sleep(Duration::from_secs(61)).await;

    let snap = expect_snapshot(
        service
            .handle_request(Some("guest"), Request::GetSnapshot { code })
            .await,
    );
    assert_eq!(snap.room.phase, Phase::Resolved);
    assert_eq!(snap.room.resolution_trigger, Some(ResolutionTrigger::Idle));
    assert_eq!(snap.room.tiebreaker_method, Some(TiebreakMethod::Dice));
    assert!(snap.room.final_option_id == Some(a) || snap.room.final_option_id == Some(b));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_start_voting_one_wins_other_conflicts() {
    let service = service_with(&manual_clock());
    let code = create_room(&service, "Race").await.room.code.to_string();
    add_option(&service, "host", &code, "A").await;
    add_option(&service, "host", &code, "B").await;
    let rc = RoomCode::parse(&code).unwrap();
    let revision = service.snapshot(HOST, &rc).await.unwrap().revision;

    let mut tasks = Vec::new();
    for _ in 0..2 {
        let service = service.clone();
        let code = code.clone();
        tasks.push(tokio::spawn(async move {
            service
                .handle_request(
                    Some("host"),
                    Request::StartVoting {
                        code,
                        expected_revision: Some(revision),
                    },
                )
                .await
        }));
    }

    let mut kinds = Vec::new();
    for task in tasks {
        match task.await.unwrap() {
            Response::Snapshot { .. } => kinds.push(None),
            Response::Error { kind, .. } => kinds.push(Some(kind)),
            other => panic!("unexpected {other:?}"),
        }
    }
    kinds.sort_by_key(|k| k.is_some());
    assert_eq!(kinds, vec![None, Some(ErrorKind::Conflict)]);
}

// =========================================================================
// Sync
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_sync_reconciler_publishes_new_revisions() {
    let service = service_with(&manual_clock());
    let created = create_room(&service, "Polling").await;
    let code = created.room.code.clone();

    let reconciler = SyncReconciler::new(code.clone());
    let source = ServiceSource::new(service.clone(), GUEST);
    let (mut rx, task) = reconciler.spawn(source, SyncConfig::default());

    rx.changed().await.unwrap();
    let first = rx.borrow_and_update().clone().unwrap();
    assert_eq!(first.revision, created.revision);

    add_option(&service, "host", code.as_str(), "Pancakes").await;

    rx.changed().await.unwrap();
    let second = rx.borrow_and_update().clone().unwrap();
    assert!(second.revision > first.revision);
    assert_eq!(second.options.len(), 1);

    drop(rx);
    tokio::time::sleep(Duration::from_secs(4)).await;
    assert!(task.is_finished());
}

#[tokio::test(start_paused = true)]
async fn test_sync_reconciler_stops_when_room_is_deleted() {
    let service = service_with(&manual_clock());
    let code = create_room(&service, "Doomed").await.room.code;

    let mut reconciler = SyncReconciler::new(code.clone());
    let source = ServiceSource::new(service.clone(), HOST);
    assert_eq!(reconciler.reconcile(&source).await.unwrap(), SyncOutcome::Initial);
    assert_eq!(reconciler.reconcile(&source).await.unwrap(), SyncOutcome::Unchanged);

    service
        .handle_request(Some("host"), Request::DeleteRoom { code: code.to_string() })
        .await;

    let (_rx, task) = reconciler.spawn(source, SyncConfig::default());
    tokio::time::timeout(Duration::from_secs(10), task)
        .await
        .expect("sync task should stop")
        .unwrap();
}
