pub mod chat;
pub mod game_state;
pub mod health;
pub mod room;
pub mod sse;
pub mod table;
pub mod user;
pub mod validation;
