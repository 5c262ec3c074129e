use dicey::prelude::*;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

const FRIENDS: [&str; 4] = ["ana", "ben", "cleo", "dev"];

/// Tokens are first names; ids follow the order in `FRIENDS`.
struct FirstNames;

impl IdentitySource for FirstNames {
    async fn identify(&self, token: &str) -> Result<ParticipantId, DiceyError> {
        FRIENDS
            .iter()
            .position(|name| *name == token)
            .map(|i| ParticipantId(i as u64 + 1))
            .ok_or_else(|| DiceyError::Identity(format!("nobody called {token}")))
    }
}

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

type Service = DecisionService<FirstNames>;
type DemoResult<T> = Result<T, Box<dyn std::error::Error>>;

async fn send(service: &Service, who: &str, request: Request) -> DemoResult<Response> {
    match service.handle_request(Some(who), request).await {
        Response::Error { kind, message } => Err(format!("{who}: {kind:?}: {message}").into()),
        response => Ok(response),
    }
}

async fn snapshot_of(service: &Service, who: &str, request: Request) -> DemoResult<RoomSnapshot> {
    match send(service, who, request).await? {
        Response::Snapshot { snapshot } => Ok(*snapshot),
        other => Err(format!("expected a snapshot, got {other:?}").into()),
    }
}

async fn resolution_of(
    service: &Service,
    who: &str,
    request: Request,
) -> DemoResult<(Resolution, RoomSnapshot)> {
    match send(service, who, request).await? {
        Response::Resolution {
            resolution,
            snapshot,
        } => Ok((resolution, *snapshot)),
        other => Err(format!("expected a resolution, got {other:?}").into()),
    }
}

fn option_named(snapshot: &RoomSnapshot, text: &str) -> DemoResult<OptionId> {
    snapshot
        .options
        .iter()
        .find(|o| o.text == text)
        .map(|o| o.id)
        .ok_or_else(|| format!("no option {text}").into())
}

async fn run(service: &Service) -> DemoResult<()> {
    // Creation goes over the byte path, the way a transport would call it.
    let create = Envelope::new(
        1,
        0,
        Request::CreateRoom {
            title: "Pizza Night".into(),
            description: Some("Friday, 8pm".into()),
            max_participants: Some(4),
        },
    )
    .with_token("ana");
    let reply = service.handle_bytes(&serde_json::to_vec(&create)?).await?;
    let reply: Envelope<Response> = serde_json::from_slice(&reply)?;
    let Response::Snapshot { snapshot } = reply.body else {
        return Err(format!("room not created: {:?}", reply.body).into());
    };
    let code = snapshot.room.code.to_string();
    tracing::info!(room = %code, "room created, share the code");

    for name in &FRIENDS[1..] {
        snapshot_of(service, name, Request::JoinRoom { code: code.clone() }).await?;
    }

    for (who, text) in [("ana", "Margherita"), ("ben", "Pepperoni"), ("cleo", "Hawaiian")] {
        snapshot_of(
            service,
            who,
            Request::AddOption {
                code: code.clone(),
                text: text.into(),
            },
        )
        .await?;
    }

    let voting = snapshot_of(
        service,
        "ana",
        Request::StartVoting {
            code: code.clone(),
            expected_revision: None,
        },
    )
    .await?;
    let pepperoni = option_named(&voting, "Pepperoni")?;
    let hawaiian = option_named(&voting, "Hawaiian")?;

    for (who, option_id) in [
        ("ana", pepperoni),
        ("ben", pepperoni),
        ("cleo", hawaiian),
        ("dev", hawaiian),
    ] {
        snapshot_of(
            service,
            who,
            Request::CastVote {
                code: code.clone(),
                option_id,
            },
        )
        .await?;
    }

    let (resolution, tied) = resolution_of(
        service,
        "ana",
        Request::EndVoting {
            code: code.clone(),
            expected_revision: None,
        },
    )
    .await?;
    tracing::info!(?resolution, tally = ?tied.tally, "voting closed");

    let (resolution, done) = resolution_of(
        service,
        "ana",
        Request::BreakTie {
            code: code.clone(),
            method: TiebreakMethod::Coin,
            expected_revision: Some(tied.revision),
        },
    )
    .await?;
    tracing::info!(?resolution, "tie broken");

    match done.final_option() {
        Some(winner) => println!("Pizza Night: {}", winner.text),
        None => println!("Pizza Night: no decision"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dicey::init_tracing();

    let service = DecisionServiceBuilder::new().build(FirstNames);
    run(&service).await
}
