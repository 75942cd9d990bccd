//! Registry of the mini-games running in each room.
//!
//! A room hosts at most one table. Installing a table replaces (and tears
//! down) the previous one; dropping a [`Table`] aborts its controller task
//! together with the helper tasks that forward its output.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::games::{
    categories::{CategoriesCommand, CategoriesGame, CategoriesSnapshot},
    hot_seat::{HotSeat, HotSeatCommand, HotSeatSnapshot},
    roster::Player,
    runner::{GameClient, GameError, GameHandle},
    session::{GroupMode, Session},
    spin::{SpinCommand, SpinSnapshot, SpinTable},
    trap::{TrapCommand, TrapGame, TrapSnapshot},
};

/// Mini-games a room can host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    /// Spin the bottle.
    Spin,
    /// Hot seat.
    HotSeat,
    /// Loopy or Tipsy trap.
    Trap,
    /// Categories.
    Categories,
}

impl TableKind {
    /// Label used in logs and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            TableKind::Spin => "spin",
            TableKind::HotSeat => "hot_seat",
            TableKind::Trap => "trap",
            TableKind::Categories => "categories",
        }
    }
}

/// Command addressed to whichever game runs at a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableCommand {
    /// Spin command.
    Spin(SpinCommand),
    /// Hot-seat command.
    HotSeat(HotSeatCommand),
    /// Trap command.
    Trap(TrapCommand),
    /// Categories command.
    Categories(CategoriesCommand),
}

impl TableCommand {
    fn kind(&self) -> TableKind {
        match self {
            TableCommand::Spin(_) => TableKind::Spin,
            TableCommand::HotSeat(_) => TableKind::HotSeat,
            TableCommand::Trap(_) => TableKind::Trap,
            TableCommand::Categories(_) => TableKind::Categories,
        }
    }
}

/// Read model of whichever game runs at a table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "game", content = "state", rename_all = "snake_case")]
pub enum TableSnapshot {
    /// Spin table.
    Spin(SpinSnapshot),
    /// Hot-seat table.
    HotSeat(HotSeatSnapshot),
    /// Trap table.
    Trap(TrapSnapshot),
    /// Categories table.
    Categories(CategoriesSnapshot),
}

/// Owner of a running controller, one variant per game.
pub enum RunningGame {
    /// Spin table.
    Spin(GameHandle<SpinTable>),
    /// Hot-seat table.
    HotSeat(GameHandle<HotSeat>),
    /// Trap table.
    Trap(GameHandle<TrapGame>),
    /// Categories table.
    Categories(GameHandle<CategoriesGame>),
}

impl RunningGame {
    /// Which game this is.
    pub fn kind(&self) -> TableKind {
        match self {
            RunningGame::Spin(_) => TableKind::Spin,
            RunningGame::HotSeat(_) => TableKind::HotSeat,
            RunningGame::Trap(_) => TableKind::Trap,
            RunningGame::Categories(_) => TableKind::Categories,
        }
    }

    /// Cloneable access for commands and snapshots.
    pub fn client(&self) -> TableClient {
        match self {
            RunningGame::Spin(handle) => TableClient::Spin(handle.client()),
            RunningGame::HotSeat(handle) => TableClient::HotSeat(handle.client()),
            RunningGame::Trap(handle) => TableClient::Trap(handle.client()),
            RunningGame::Categories(handle) => TableClient::Categories(handle.client()),
        }
    }

    fn is_finished(&self) -> bool {
        match self {
            RunningGame::Spin(handle) => handle.is_finished(),
            RunningGame::HotSeat(handle) => handle.is_finished(),
            RunningGame::Trap(handle) => handle.is_finished(),
            RunningGame::Categories(handle) => handle.is_finished(),
        }
    }
}

/// Cloneable client of a running table.
#[derive(Clone)]
pub enum TableClient {
    /// Spin table.
    Spin(GameClient<SpinTable>),
    /// Hot-seat table.
    HotSeat(GameClient<HotSeat>),
    /// Trap table.
    Trap(GameClient<TrapGame>),
    /// Categories table.
    Categories(GameClient<CategoriesGame>),
}

impl TableClient {
    /// Latest snapshot.
    pub fn snapshot(&self) -> TableSnapshot {
        match self {
            TableClient::Spin(client) => TableSnapshot::Spin(client.snapshot()),
            TableClient::HotSeat(client) => TableSnapshot::HotSeat(client.snapshot()),
            TableClient::Trap(client) => TableSnapshot::Trap(client.snapshot()),
            TableClient::Categories(client) => TableSnapshot::Categories(client.snapshot()),
        }
    }

    /// Forward `command` and wait for the resulting snapshot.
    pub async fn send(&self, command: TableCommand) -> Result<TableSnapshot, GameError> {
        match (self, command) {
            (TableClient::Spin(client), TableCommand::Spin(command)) => {
                client.send(command).await.map(TableSnapshot::Spin)
            }
            (TableClient::HotSeat(client), TableCommand::HotSeat(command)) => {
                client.send(command).await.map(TableSnapshot::HotSeat)
            }
            (TableClient::Trap(client), TableCommand::Trap(command)) => {
                client.send(command).await.map(TableSnapshot::Trap)
            }
            (TableClient::Categories(client), TableCommand::Categories(command)) => {
                client.send(command).await.map(TableSnapshot::Categories)
            }
            (client, command) => Err(GameError::Rejected(format!(
                "This table is playing {}, not {}",
                client.kind().as_str(),
                command.kind().as_str()
            ))),
        }
    }

    fn kind(&self) -> TableKind {
        match self {
            TableClient::Spin(_) => TableKind::Spin,
            TableClient::HotSeat(_) => TableKind::HotSeat,
            TableClient::Trap(_) => TableKind::Trap,
            TableClient::Categories(_) => TableKind::Categories,
        }
    }
}

/// Public description of a table.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TableInfo {
    /// Changes every time a table is started, even for the same game.
    pub table_id: Uuid,
    /// Running game.
    pub kind: TableKind,
    /// User who started the table.
    pub host: Option<String>,
    /// How the group was assembled.
    pub mode: Option<GroupMode>,
    /// Seated players in turn order.
    pub players: Vec<Player>,
}

/// A running mini-game and the tasks feeding its output to the room.
pub struct Table {
    id: Uuid,
    session: Session,
    game: RunningGame,
    tasks: Vec<JoinHandle<()>>,
}

impl Table {
    /// Wrap a running game. The session roster is locked for the table's lifetime.
    pub fn new(mut session: Session, game: RunningGame) -> Self {
        session.roster_mut().lock();
        Self {
            id: Uuid::new_v4(),
            session,
            game,
            tasks: Vec::new(),
        }
    }

    /// Attach a helper task that dies with the table.
    pub fn attach(&mut self, task: JoinHandle<()>) {
        self.tasks.push(task);
    }

    /// Identifier of this table instance.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Public description.
    pub fn info(&self) -> TableInfo {
        TableInfo {
            table_id: self.id,
            kind: self.game.kind(),
            host: self
                .session
                .identity()
                .map(|identity| identity.user_id.clone()),
            mode: self.session.mode(),
            players: self.session.roster().to_vec(),
        }
    }
}

impl Drop for Table {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// At most one running table per room.
#[derive(Default)]
pub struct TableRegistry {
    tables: DashMap<String, Table>,
}

impl TableRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `table` for `room_id`, returning the table it replaced.
    pub fn install(&self, room_id: &str, table: Table) -> Option<Table> {
        self.tables.insert(room_id.to_string(), table)
    }

    /// Client and description of the room's live table.
    pub fn get(&self, room_id: &str) -> Option<(TableInfo, TableClient)> {
        let table = self.tables.get(room_id)?;
        if table.game.is_finished() {
            return None;
        }
        Some((table.info(), table.game.client()))
    }

    /// Take the room's table out of the registry.
    pub fn remove(&self, room_id: &str) -> Option<Table> {
        self.tables.remove(room_id).map(|(_, table)| table)
    }

    /// Remove the table only if it is still the instance `table_id`.
    pub fn remove_if(&self, room_id: &str, table_id: Uuid) -> Option<Table> {
        self.tables
            .remove_if(room_id, |_, table| table.id == table_id)
            .map(|(_, table)| table)
    }

    /// Number of rooms with a table.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether no room has a table.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::games::{roster::Roster, runner, session::Identity};

    fn spin_table(players: &[Player]) -> Table {
        let handle = runner::spawn(
            SpinTable::new(players, vec!["Wildcard: everybody drinks!".into()]),
            StdRng::seed_from_u64(7),
            None,
        );
        let mut session = Session::create(Some(Identity {
            user_id: "host".into(),
            email: None,
            phone: None,
        }));
        *session.roster_mut() = Roster::from_players(players.to_vec());
        Table::new(session, RunningGame::Spin(handle))
    }

    #[tokio::test]
    async fn installing_a_table_replaces_the_previous_one() {
        let registry = TableRegistry::new();
        let players = [Player::remote("u1", "Ana"), Player::remote("u2", "Bo")];
        let first = spin_table(&players);
        let first_id = first.id();
        assert!(registry.install("r1", first).is_none());

        let (_, stale_client) = registry.get("r1").unwrap();
        let replaced = registry.install("r1", spin_table(&players)).unwrap();
        assert_eq!(replaced.id(), first_id);
        drop(replaced);
        tokio::task::yield_now().await;

        assert_eq!(
            stale_client.send(TableCommand::Spin(SpinCommand::Spin)).await,
            Err(GameError::Stopped)
        );
        let (info, _) = registry.get("r1").unwrap();
        assert_ne!(info.table_id, first_id);
        assert_eq!(info.host.as_deref(), Some("host"));
        assert_eq!(info.players.len(), 2);
    }

    #[tokio::test]
    async fn commands_for_another_game_are_rejected() {
        let registry = TableRegistry::new();
        registry.install("r1", spin_table(&[Player::remote("u1", "Ana")]));
        let (_, client) = registry.get("r1").unwrap();

        let result = client.send(TableCommand::Trap(TrapCommand::ResetRound)).await;
        assert!(matches!(result, Err(GameError::Rejected(_))));

        let table_id = registry.get("r1").unwrap().0.table_id;
        assert!(registry.remove_if("r1", Uuid::new_v4()).is_none());
        assert!(registry.remove_if("r1", table_id).is_some());
        assert!(registry.is_empty());
    }
}
