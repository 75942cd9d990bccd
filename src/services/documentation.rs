use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Loopy Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::config::categories,
        crate::routes::config::prompts,
        crate::routes::rooms::create_room,
        crate::routes::rooms::list_rooms,
        crate::routes::rooms::get_room,
        crate::routes::rooms::join_room,
        crate::routes::rooms::end_room,
        crate::routes::game_state::current_game_state,
        crate::routes::game_state::update_game_state,
        crate::routes::game_state::start_game,
        crate::routes::game_state::end_game,
        crate::routes::messages::list_messages,
        crate::routes::messages::send_message,
        crate::routes::messages::purge_messages,
        crate::routes::table::start_table,
        crate::routes::table::current_table,
        crate::routes::table::send_command,
        crate::routes::table::stop_table,
        crate::routes::sse::room_stream,
        crate::routes::users::me,
        crate::routes::users::set_nickname,
        crate::routes::users::search,
        crate::routes::users::suggest_nickname,
        crate::routes::users::leaderboard,
        crate::routes::friends::send_request,
        crate::routes::friends::accept,
        crate::routes::friends::decline,
        crate::routes::friends::list_friends,
        crate::routes::friends::incoming,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::MessagesEvent,
            crate::dto::sse::SubscriptionErrorEvent,
            crate::dto::table::TableEvent,
            crate::dto::table::TableClosedEvent,
            crate::state::game_state::GamePayload,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "config", description = "Read-only game content"),
        (name = "rooms", description = "Rooms and their membership"),
        (name = "game-state", description = "Shared per-room game state"),
        (name = "chat", description = "Room chat"),
        (name = "tables", description = "Mini-games running in rooms"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "users", description = "Profiles, nicknames and the leaderboard"),
        (name = "friends", description = "Friend requests and friend lists"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();
        for path in [
            "/healthcheck",
            "/rooms",
            "/rooms/{id}",
            "/rooms/{id}/game-state",
            "/rooms/{id}/messages",
            "/rooms/{id}/table/commands",
            "/rooms/{id}/events",
            "/users/leaderboard",
            "/friends/requests/{id}/accept",
        ] {
            assert!(paths.contains(&path), "{path} missing from the OpenAPI document");
        }

        let schemas = doc.components.expect("components").schemas;
        assert!(schemas.contains_key("RoomView"));
        assert!(schemas.contains_key("GameStatePatchRequest"));
        assert!(schemas.contains_key("TableCommandRequest"));
    }
}
