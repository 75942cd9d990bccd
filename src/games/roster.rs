use std::time::{SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Identifier of the synthetic seat used when nobody joined the table.
pub const SOLO_PLAYER_ID: &str = "solo";

const LOCAL_ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const LOCAL_ID_SUFFIX_LEN: usize = 6;

/// A participant seated at a table, either a remote user or a local guest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// Stable remote user id, or a locally generated token for guests.
    pub id: String,
    /// Name shown to the table. May be blank while the roster is edited.
    pub display_name: String,
}

impl Player {
    /// Build a guest player with a freshly generated local id.
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            id: local_player_id(&mut rand::rng()),
            display_name: name.into(),
        }
    }

    /// Build a player backed by a remote user account.
    pub fn remote(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: user_id.into(),
            display_name: name.into(),
        }
    }
}

/// Generate a local player token: unix millis followed by six base36 characters.
pub fn local_player_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    let suffix: String = (0..LOCAL_ID_SUFFIX_LEN)
        .map(|_| LOCAL_ID_ALPHABET[rng.random_range(0..LOCAL_ID_ALPHABET.len())] as char)
        .collect();
    format!("{millis}-{suffix}")
}

/// Failures raised while editing a roster.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    /// Edits are refused while a game is using the roster.
    #[error("the roster cannot change while a game is running")]
    Locked,
    /// No player with this id is seated.
    #[error("unknown player `{0}`")]
    UnknownPlayer(String),
    /// A player with this id is already seated.
    #[error("player `{0}` is already seated")]
    Duplicate(String),
}

/// Ordered list of participants for the current session.
///
/// Insertion order is the turn order. The roster can be locked while a game
/// runs so that nobody gets renamed mid-round.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    players: IndexMap<String, Player>,
    locked: bool,
}

impl Roster {
    /// Create an empty, unlocked roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a roster from players, keeping the first occurrence of each id.
    pub fn from_players(players: impl IntoIterator<Item = Player>) -> Self {
        let mut roster = Self::new();
        for player in players {
            roster.players.entry(player.id.clone()).or_insert(player);
        }
        roster
    }

    /// Seat a new guest at the end of the roster.
    pub fn add_local(&mut self, name: impl Into<String>) -> Result<&Player, RosterError> {
        self.insert(Player::local(name))
    }

    /// Seat a remote user at the end of the roster.
    pub fn add_remote(
        &mut self,
        user_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<&Player, RosterError> {
        self.insert(Player::remote(user_id, name))
    }

    fn insert(&mut self, player: Player) -> Result<&Player, RosterError> {
        self.ensure_unlocked()?;
        if self.players.contains_key(&player.id) {
            return Err(RosterError::Duplicate(player.id));
        }
        let (index, _) = self.players.insert_full(player.id.clone(), player);
        Ok(&self.players[index])
    }

    /// Rename a seated player.
    pub fn rename(&mut self, id: &str, name: impl Into<String>) -> Result<(), RosterError> {
        self.ensure_unlocked()?;
        let player = self
            .players
            .get_mut(id)
            .ok_or_else(|| RosterError::UnknownPlayer(id.to_string()))?;
        player.display_name = name.into();
        Ok(())
    }

    /// Remove a player while preserving the order of everybody else.
    pub fn remove(&mut self, id: &str) -> Result<Player, RosterError> {
        self.ensure_unlocked()?;
        self.players
            .shift_remove(id)
            .ok_or_else(|| RosterError::UnknownPlayer(id.to_string()))
    }

    /// Replace the whole roster.
    pub fn reset(&mut self, players: Vec<Player>) -> Result<(), RosterError> {
        self.ensure_unlocked()?;
        *self = Self::from_players(players);
        Ok(())
    }

    /// Freeze the roster for the duration of a game.
    pub fn lock(&mut self) {
        self.locked = true;
    }

    /// Allow edits again once the game is over.
    pub fn unlock(&mut self) {
        self.locked = false;
    }

    /// Whether a game currently holds the roster.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Number of seated players.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Whether nobody is seated yet.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Players in turn order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Snapshot of the players in turn order.
    pub fn to_vec(&self) -> Vec<Player> {
        self.players.values().cloned().collect()
    }

    fn ensure_unlocked(&self) -> Result<(), RosterError> {
        if self.locked {
            Err(RosterError::Locked)
        } else {
            Ok(())
        }
    }
}

/// Next index in a rotation of `len` seats.
pub fn advance(index: usize, len: usize) -> usize {
    if len == 0 { 0 } else { (index + 1) % len }
}

/// Turn rotation over a fixed snapshot of the roster.
///
/// Blank names are labelled `Player n`; an empty roster is replaced by a
/// single synthetic `Player 1` seat so the rotation never divides by zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOrder {
    seats: Vec<Player>,
    current: usize,
}

impl TurnOrder {
    /// Seat the players in order, starting with the first one.
    pub fn new(players: &[Player]) -> Self {
        let seats = if players.is_empty() {
            vec![Player::remote(SOLO_PLAYER_ID, "Player 1")]
        } else {
            players
                .iter()
                .enumerate()
                .map(|(index, player)| {
                    let trimmed = player.display_name.trim();
                    let label = if trimmed.is_empty() {
                        format!("Player {}", index + 1)
                    } else {
                        trimmed.to_string()
                    };
                    Player::remote(player.id.clone(), label)
                })
                .collect()
        };

        Self { seats, current: 0 }
    }

    /// Number of seats, always at least one.
    pub fn len(&self) -> usize {
        self.seats.len()
    }

    /// Always false: the rotation substitutes a solo seat.
    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }

    /// Seats in turn order.
    pub fn seats(&self) -> &[Player] {
        &self.seats
    }

    /// Index of the player whose turn it is.
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Player whose turn it is.
    pub fn current(&self) -> &Player {
        &self.seats[self.current]
    }

    /// Pass the turn to the next seat and return its index.
    pub fn advance(&mut self) -> usize {
        self.current = advance(self.current, self.seats.len());
        self.current
    }

    /// Jump to a given seat, wrapping out-of-range indices.
    pub fn set_current(&mut self, index: usize) {
        self.current = index % self.seats.len();
    }

    /// Go back to the first seat.
    pub fn rewind(&mut self) {
        self.current = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn players(names: &[&str]) -> Vec<Player> {
        names
            .iter()
            .enumerate()
            .map(|(index, name)| Player::remote(format!("u{index}"), *name))
            .collect()
    }

    #[test]
    fn advance_cycles_through_every_seat() {
        for len in 1..=7 {
            for start in 0..len {
                let mut visited = Vec::with_capacity(len);
                let mut index = start;
                for _ in 0..len {
                    index = advance(index, len);
                    visited.push(index);
                }
                assert_eq!(index, start, "rotation of {len} must come back to {start}");
                let mut sorted = visited.clone();
                sorted.sort_unstable();
                assert_eq!(sorted, (0..len).collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn empty_roster_gets_a_solo_seat() {
        let mut turns = TurnOrder::new(&[]);
        assert_eq!(turns.len(), 1);
        assert_eq!(turns.current().id, SOLO_PLAYER_ID);
        assert_eq!(turns.current().display_name, "Player 1");
        assert_eq!(turns.advance(), 0);
    }

    #[test]
    fn blank_names_get_positional_labels() {
        let turns = TurnOrder::new(&players(&["Ana", "  ", "Bo"]));
        let labels: Vec<_> = turns.seats().iter().map(|p| p.display_name.as_str()).collect();
        assert_eq!(labels, vec!["Ana", "Player 2", "Bo"]);
    }

    #[test]
    fn locked_roster_rejects_edits() {
        let mut roster = Roster::new();
        let id = roster.add_local("Ana").unwrap().id.clone();
        roster.lock();
        assert_eq!(roster.rename(&id, "Anna"), Err(RosterError::Locked));
        assert_eq!(roster.add_local("Bo").unwrap_err(), RosterError::Locked);
        roster.unlock();
        roster.rename(&id, "Anna").unwrap();
        assert_eq!(roster.players().next().unwrap().display_name, "Anna");
    }

    #[test]
    fn remove_keeps_turn_order() {
        let mut roster = Roster::from_players(players(&["a", "b", "c"]));
        roster.remove("u1").unwrap();
        let ids: Vec<_> = roster.players().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["u0", "u2"]);
    }

    #[test]
    fn duplicate_remote_players_are_refused() {
        let mut roster = Roster::new();
        roster.add_remote("u1", "Ana").unwrap();
        assert_eq!(
            roster.add_remote("u1", "Ana again").unwrap_err(),
            RosterError::Duplicate("u1".into())
        );
    }

    #[test]
    fn local_ids_have_millis_and_base36_suffix() {
        let mut rng = StdRng::seed_from_u64(7);
        let id = local_player_id(&mut rng);
        let (millis, suffix) = id.split_once('-').unwrap();
        assert!(millis.parse::<u128>().is_ok());
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }
}
