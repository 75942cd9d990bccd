//! Rooms: creation, membership and teardown.

use std::collections::{HashMap, HashSet};

use rand::seq::IndexedRandom;
use tracing::info;

use crate::{
    dao::{
        document_store::{Condition, Direction, Filter, WriteOp},
        models::{LocalPlayerEntity, ROOMS, RoomEntity, now_millis, timestamped_id},
    },
    dto::room::CreateRoomRequest,
    error::ServiceError,
    games::roster::Player,
    services::{chat_service, game_state_service, store_access, user_service},
    state::AppState,
};

const QUERY_CONTEXT: &str = "load Loopy rooms";
const WRITE_CONTEXT: &str = "update Loopy rooms";
const DEFAULT_ROOM_NAMES: &[&str] = &["Loopy Lounge", "Party Mix", "Sip Squad"];

fn not_found() -> ServiceError {
    ServiceError::NotFound("Room not found".into())
}

/// Open a room owned by `creator`. The creator is always the first member.
pub async fn create_room(
    state: &AppState,
    creator: &str,
    request: CreateRoomRequest,
) -> Result<RoomEntity, ServiceError> {
    let name = request
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            DEFAULT_ROOM_NAMES
                .choose(&mut rand::rng())
                .copied()
                .unwrap_or("Loopy Lounge")
                .to_string()
        });

    let mut seen = HashSet::new();
    let members: Vec<String> = std::iter::once(creator.to_string())
        .chain(request.member_ids)
        .filter(|member| seen.insert(member.clone()))
        .collect();

    let room = RoomEntity {
        id: timestamped_id("room"),
        name,
        created_by: creator.to_string(),
        members,
        local_players: request.local_players.map(|names| {
            names
                .into_iter()
                .map(|name| LocalPlayerEntity {
                    name: name.trim().to_string(),
                })
                .collect()
        }),
        created_at: now_millis(),
        is_public: request.is_public,
        status: request.status,
        max_players: request.max_players.filter(|max| *max > 0),
    };

    store_access::write(state, WRITE_CONTEXT, vec![store_access::put(&room)?]).await?;
    info!(room_id = %room.id, creator, "room created");
    Ok(room)
}

/// Room with the given id.
pub async fn get_room(state: &AppState, room_id: &str) -> Result<RoomEntity, ServiceError> {
    store_access::find(state, QUERY_CONTEXT, room_id)
        .await?
        .ok_or_else(not_found)
}

/// Room with the given id, provided `user_id` belongs to it.
///
/// `action` completes the refusal message: "Only room members can <action>".
pub async fn member_room(
    state: &AppState,
    room_id: &str,
    user_id: &str,
    action: &str,
) -> Result<RoomEntity, ServiceError> {
    let room = get_room(state, room_id).await?;
    if !room.members.iter().any(|member| member == user_id) {
        return Err(ServiceError::Unauthorized(format!(
            "Only room members can {action}"
        )));
    }
    Ok(room)
}

/// Add `user_id` to the room's members. Joining twice is a no-op.
pub async fn join_room(
    state: &AppState,
    user_id: &str,
    room_id: &str,
) -> Result<RoomEntity, ServiceError> {
    let mut room = get_room(state, room_id).await?;
    if room.members.iter().any(|member| member == user_id) {
        return Ok(room);
    }
    if let Some(max) = room.max_players {
        if room.members.len() >= max as usize {
            return Err(ServiceError::Conflict("Room is full".into()));
        }
    }

    room.members.push(user_id.to_string());
    store_access::write(state, WRITE_CONTEXT, vec![store_access::put(&room)?]).await?;
    info!(room_id, user_id, "room joined");
    Ok(room)
}

/// Query of the rooms `user_id` belongs to, newest first.
pub fn rooms_for_filter(user_id: &str) -> Filter {
    Filter::collection(ROOMS)
        .when(Condition::contains("members", user_id))
        .order_by("createdAt", Direction::Desc)
}

/// Rooms `user_id` belongs to, newest first.
pub async fn list_rooms_for(state: &AppState, user_id: &str) -> Result<Vec<RoomEntity>, ServiceError> {
    store_access::query(state, QUERY_CONTEXT, rooms_for_filter(user_id)).await
}

/// Delete the room with its game state and chat. Only members may do it.
pub async fn end_room(state: &AppState, user_id: &str, room_id: &str) -> Result<(), ServiceError> {
    member_room(state, room_id, user_id, "end the room").await?;

    if let Some(table) = state.tables().remove(room_id) {
        info!(room_id, table_id = %table.id(), "table closed with its room");
    }

    let mut ops = vec![WriteOp::delete(ROOMS, room_id)];
    ops.extend(game_state_service::delete_ops(state, room_id).await?);
    store_access::write(state, WRITE_CONTEXT, ops).await?;
    chat_service::purge_room_messages(state, room_id).await?;

    state.rooms().remove(room_id);
    info!(room_id, user_id, "room ended");
    Ok(())
}

/// Seats of the room: members in join order, then local guests.
///
/// Members are labelled with their nickname, or `Player n` when they have no
/// profile yet. Guests get the id `<roomId>_guest_<index>`, stable across reads.
pub async fn room_roster(state: &AppState, room: &RoomEntity) -> Result<Vec<Player>, ServiceError> {
    let nicknames: HashMap<String, String> = user_service::users_by_ids(state, &room.members)
        .await?
        .into_iter()
        .map(|user| (user.id, user.nickname))
        .collect();

    let members = room.members.iter().enumerate().map(|(index, member)| {
        let name = nicknames
            .get(member)
            .filter(|nickname| !nickname.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| format!("Player {}", index + 1));
        Player::remote(member.clone(), name)
    });
    let guests = room
        .local_players
        .iter()
        .flatten()
        .enumerate()
        .map(|(index, guest)| Player {
            id: guest_id(&room.id, index),
            display_name: guest.name.clone(),
        });

    Ok(members.chain(guests).collect())
}

fn guest_id(room_id: &str, index: usize) -> String {
    format!("{room_id}_guest_{index}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::memory_state;

    fn request(name: Option<&str>, members: &[&str]) -> CreateRoomRequest {
        CreateRoomRequest {
            name: name.map(String::from),
            member_ids: members.iter().map(|m| m.to_string()).collect(),
            local_players: None,
            is_public: None,
            max_players: None,
            status: None,
        }
    }

    #[tokio::test]
    async fn creator_is_a_member_exactly_once() {
        let (state, _) = memory_state().await;
        let room = create_room(&state, "u1", request(Some(" Friday "), &["u2", "u1", "u2"]))
            .await
            .unwrap();
        assert!(room.id.starts_with("room_"));
        assert_eq!(room.name, "Friday");
        assert_eq!(room.members, vec!["u1", "u2"]);

        let stored = serde_json::to_value(&room).unwrap();
        assert!(stored.get("isPublic").is_none());
        assert!(stored.get("maxPlayers").is_none());

        let unnamed = create_room(&state, "u1", request(Some("  "), &[])).await.unwrap();
        assert!(DEFAULT_ROOM_NAMES.contains(&unnamed.name.as_str()));
    }

    #[tokio::test]
    async fn joining_respects_missing_full_and_existing_members() {
        let (state, _) = memory_state().await;
        assert!(matches!(
            join_room(&state, "u2", "room_nope").await,
            Err(ServiceError::NotFound(message)) if message == "Room not found"
        ));

        let mut small = request(None, &[]);
        small.max_players = Some(2);
        let room = create_room(&state, "u1", small).await.unwrap();

        let joined = join_room(&state, "u2", &room.id).await.unwrap();
        assert_eq!(joined.members, vec!["u1", "u2"]);
        let again = join_room(&state, "u2", &room.id).await.unwrap();
        assert_eq!(again.members, vec!["u1", "u2"]);
        assert!(matches!(
            join_room(&state, "u3", &room.id).await,
            Err(ServiceError::Conflict(message)) if message == "Room is full"
        ));

        let rooms = list_rooms_for(&state, "u2").await.unwrap();
        assert_eq!(rooms.len(), 1);
        assert!(list_rooms_for(&state, "u3").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn roster_lists_members_then_guests() {
        let (state, _) = memory_state().await;
        user_service::set_nickname_unique(&state, "u1", "Ana", None).await.unwrap();
        let mut with_guests = request(Some("Den"), &["u2"]);
        with_guests.local_players = Some(vec!["Cy".into()]);
        let room = create_room(&state, "u1", with_guests).await.unwrap();

        let roster = room_roster(&state, &room).await.unwrap();
        let names: Vec<_> = roster.iter().map(|p| p.display_name.as_str()).collect();
        assert_eq!(names, vec!["Ana", "Player 2", "Cy"]);
        assert_eq!(roster[1].id, "u2");
        assert_eq!(roster[2].id, format!("{}_guest_0", room.id));

        let again = room_roster(&state, &room).await.unwrap();
        assert_eq!(again, roster);
    }

    #[tokio::test]
    async fn member_room_rejects_strangers_and_unknown_rooms() {
        let (state, _) = memory_state().await;
        let room = create_room(&state, "u1", request(Some("Den"), &[])).await.unwrap();

        assert_eq!(
            member_room(&state, &room.id, "u1", "peek").await.unwrap().id,
            room.id
        );
        assert!(matches!(
            member_room(&state, &room.id, "u2", "peek").await,
            Err(ServiceError::Unauthorized(message)) if message == "Only room members can peek"
        ));
        assert!(matches!(
            member_room(&state, "room_nope", "u1", "peek").await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn ending_a_room_removes_its_documents() {
        let (state, store) = memory_state().await;
        let room = create_room(&state, "u1", request(Some("Den"), &[])).await.unwrap();
        game_state_service::start_game(&state, &room.id).await.unwrap();
        chat_service::send_message(&state, &room.id, "u1", "bye").await.unwrap();
        assert_eq!(store.len(), 3);

        assert!(matches!(
            end_room(&state, "stranger", &room.id).await,
            Err(ServiceError::Unauthorized(_))
        ));
        end_room(&state, "u1", &room.id).await.unwrap();
        assert!(store.is_empty());
        assert!(matches!(get_room(&state, &room.id).await, Err(ServiceError::NotFound(_))));
        assert!(
            game_state_service::current_game_state(&state, &room.id)
                .await
                .unwrap()
                .is_none()
        );
    }
}
