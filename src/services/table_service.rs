//! Starting, driving and closing the mini-game running in a room.

use std::sync::{Arc, Weak};

use rand::{SeedableRng, rngs::StdRng};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        sse::ServerEvent,
        table::{StartTableRequest, TableClosedEvent, TableEvent, TableView},
    },
    error::ServiceError,
    games::{
        categories::CategoriesGame,
        feedback::{Feedback, FeedbackCue, FeedbackError},
        hot_seat::HotSeat,
        roster::Roster,
        runner,
        session::{Identity, Session},
        spin::SpinTable,
        trap::TrapGame,
    },
    services::{game_state_service, room_service},
    state::{
        AppState, SharedState, SseHub,
        game_state::GameStatePatch,
        tables::{
            RunningGame, Table, TableClient, TableCommand, TableInfo, TableKind, TableSnapshot,
        },
    },
};

/// SSE event carrying table snapshots.
pub const TABLE_EVENT: &str = "table";
/// SSE event sent when a table goes away.
pub const TABLE_CLOSED_EVENT: &str = "table_closed";
/// SSE event carrying feedback cues.
pub const FEEDBACK_EVENT: &str = "feedback";

fn no_table() -> ServiceError {
    ServiceError::NotFound("No game is running at this table".into())
}

/// Feedback sink broadcasting cues to the room's SSE listeners.
struct RoomFeedback {
    hub: SseHub,
}

impl Feedback for RoomFeedback {
    fn cue(&self, cue: FeedbackCue) -> Result<(), FeedbackError> {
        let event = ServerEvent::json(Some(FEEDBACK_EVENT.to_string()), &cue)
            .map_err(|err| FeedbackError(err.to_string()))?;
        if self.hub.broadcast(event) == 0 {
            return Err(FeedbackError("nobody is listening".into()));
        }
        Ok(())
    }
}

/// Start `request.kind` in the room, replacing whatever game was running.
pub async fn start_table(
    state: &SharedState,
    room_id: &str,
    user_id: &str,
    request: StartTableRequest,
) -> Result<TableView, ServiceError> {
    let room = room_service::member_room(state, room_id, user_id, "start a game").await?;

    let mut session = Session::create(Some(Identity {
        user_id: user_id.to_string(),
        email: None,
        phone: None,
    }));
    session.set_mode(request.mode);
    *session.roster_mut() = Roster::from_players(room_service::room_roster(state, &room).await?);
    for guest in &request.guests {
        session.roster_mut().add_local(guest.trim())?;
    }
    let players = session.roster().to_vec();

    let mut rng = StdRng::from_os_rng();
    let (publisher, patches) = if request.sync {
        let (tx, rx) = mpsc::unbounded_channel();
        (Some(tx), Some(rx))
    } else {
        (None, None)
    };

    let hub = state.rooms().hub(room_id);
    let game = match request.kind {
        TableKind::Spin => RunningGame::Spin(runner::spawn(
            SpinTable::new(&players, state.config().prompts().to_vec()),
            rng,
            publisher,
        )),
        TableKind::HotSeat => {
            RunningGame::HotSeat(runner::spawn(HotSeat::new(&players), rng, publisher))
        }
        TableKind::Trap => {
            let skin = request.skin.unwrap_or(state.config().trap_skin());
            let feedback: Arc<dyn Feedback> = Arc::new(RoomFeedback { hub: hub.clone() });
            let machine = TrapGame::new(skin, &players, feedback, &mut rng);
            RunningGame::Trap(runner::spawn(machine, rng, publisher))
        }
        TableKind::Categories => RunningGame::Categories(runner::spawn(
            CategoriesGame::new(state.config().categories().to_vec()),
            rng,
            publisher,
        )),
    };

    if request.sync {
        game_state_service::start_game(state, room_id).await?;
    }

    let client = game.client();
    let mut table = Table::new(session, game);
    table.attach(spawn_snapshot_forwarder(&client, hub, table.id()));
    if let Some(patches) = patches {
        table.attach(spawn_state_sync(
            Arc::downgrade(state),
            room_id.to_string(),
            patches,
        ));
    }

    let view = TableView {
        table: table.info(),
        snapshot: client.snapshot(),
    };
    if let Some(previous) = state.tables().install(room_id, table) {
        announce_closed(state, room_id, previous.id());
    }
    info!(
        room_id,
        table_id = %view.table.table_id,
        kind = request.kind.as_str(),
        players = view.table.players.len(),
        "table started"
    );
    Ok(view)
}

/// Room's running table and its latest snapshot.
pub fn table(state: &AppState, room_id: &str) -> Result<TableView, ServiceError> {
    let (info, client) = state.tables().get(room_id).ok_or_else(no_table)?;
    Ok(TableView {
        table: info,
        snapshot: client.snapshot(),
    })
}

/// Forward a command from `user_id` to the room's table.
pub async fn send_command(
    state: &AppState,
    room_id: &str,
    user_id: &str,
    command: TableCommand,
) -> Result<TableView, ServiceError> {
    let (info, client) = state.tables().get(room_id).ok_or_else(no_table)?;
    ensure_seated(&info, user_id)?;

    debug!(room_id, user_id, ?command, "table command");
    let snapshot = client.send(command).await?;
    Ok(TableView {
        table: info,
        snapshot,
    })
}

/// Tear the room's table down and put the shared game state back to idle.
pub async fn stop_table(state: &AppState, room_id: &str, user_id: &str) -> Result<(), ServiceError> {
    let (info, _) = state.tables().get(room_id).ok_or_else(no_table)?;
    ensure_seated(&info, user_id)?;
    let table_id = info.table_id;
    if state.tables().remove_if(room_id, table_id).is_none() {
        return Err(no_table());
    }

    announce_closed(state, room_id, table_id);
    game_state_service::end_game(state, room_id).await?;
    info!(room_id, table_id = %table_id, "table stopped");
    Ok(())
}

fn ensure_seated(info: &TableInfo, user_id: &str) -> Result<(), ServiceError> {
    let seated = info.players.iter().any(|player| player.id == user_id);
    if !seated && info.host.as_deref() != Some(user_id) {
        return Err(ServiceError::Unauthorized(
            "Only seated players can play at this table".into(),
        ));
    }
    Ok(())
}

fn announce_closed(state: &AppState, room_id: &str, table_id: Uuid) {
    if let Ok(event) = ServerEvent::json(
        Some(TABLE_CLOSED_EVENT.to_string()),
        &TableClosedEvent { table_id },
    ) {
        state.rooms().broadcast(room_id, event);
    }
}

fn spawn_snapshot_forwarder(client: &TableClient, hub: SseHub, table_id: Uuid) -> JoinHandle<()> {
    match client {
        TableClient::Spin(client) => tokio::spawn(forward_snapshots(
            client.subscribe(),
            TableSnapshot::Spin,
            hub,
            table_id,
        )),
        TableClient::HotSeat(client) => tokio::spawn(forward_snapshots(
            client.subscribe(),
            TableSnapshot::HotSeat,
            hub,
            table_id,
        )),
        TableClient::Trap(client) => tokio::spawn(forward_snapshots(
            client.subscribe(),
            TableSnapshot::Trap,
            hub,
            table_id,
        )),
        TableClient::Categories(client) => tokio::spawn(forward_snapshots(
            client.subscribe(),
            TableSnapshot::Categories,
            hub,
            table_id,
        )),
    }
}

async fn forward_snapshots<S>(
    mut snapshots: watch::Receiver<S>,
    wrap: fn(S) -> TableSnapshot,
    hub: SseHub,
    table_id: Uuid,
) where
    S: Clone + Send + Sync + 'static,
{
    while snapshots.changed().await.is_ok() {
        let snapshot = wrap(snapshots.borrow_and_update().clone());
        match ServerEvent::json(
            Some(TABLE_EVENT.to_string()),
            &TableEvent { table_id, snapshot },
        ) {
            Ok(event) => {
                hub.broadcast(event);
            }
            Err(err) => warn!(table_id = %table_id, error = %err, "failed to encode table snapshot"),
        }
    }
    debug!(table_id = %table_id, "table snapshot forwarder stopped");
}

/// Apply the table's game-state patches one after the other, in order.
fn spawn_state_sync(
    state: Weak<AppState>,
    room_id: String,
    mut patches: mpsc::UnboundedReceiver<GameStatePatch>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(patch) = patches.recv().await {
            let Some(state) = state.upgrade() else {
                break;
            };
            if let Err(err) = game_state_service::update_game_state(&state, &room_id, patch).await {
                warn!(room_id = %room_id, error = %err, "failed to sync game state from table");
            }
        }
    })
}
