/// Room chat.
pub mod chat_service;
/// Friend requests and friend lists.
pub mod friend_service;
/// OpenAPI document of the HTTP API.
pub mod documentation;
/// Shared per-room game-state document.
pub mod game_state_service;
/// Health check service.
pub mod health_service;
/// Rooms and their rosters.
pub mod room_service;
/// Server-Sent Events room streams.
pub mod sse_service;
/// Document store connection supervisor.
pub mod storage_supervisor;
/// Connectivity-aware store helpers.
pub mod store_access;
/// Mini-game tables running in rooms.
pub mod table_service;
/// Profiles, nicknames and the leaderboard.
pub mod user_service;
