//! User profiles, nickname uniqueness and the leaderboard.

use std::collections::HashSet;

use rand::{Rng, seq::IndexedRandom};
use tracing::info;

use crate::{
    dao::{
        document_store::{Condition, Direction, Filter},
        models::{USERS, UserEntity, now_millis},
    },
    dto::user::LeaderboardEntry,
    error::ServiceError,
    services::store_access,
    state::AppState,
};

const QUERY_CONTEXT: &str = "sync with friends";
const WRITE_CONTEXT: &str = "update your Loopy crew";
const SEARCH_LIMIT: usize = 10;
const CONFLICT_PROBE_LIMIT: usize = 5;
/// Leaderboard size when the caller does not ask for one.
pub const DEFAULT_LEADERBOARD_SIZE: usize = 20;

const ADJECTIVES: &[&str] = &[
    "Unhinged", "Feral", "Chaotic", "Lowkey", "Highkey", "Slay", "Vibe", "Based", "Bussin",
    "Goated", "Snatched", "Sheesh", "Valid", "Mid", "Fire", "Zesty", "Delulu", "Salty", "Boujee",
    "Goofy", "Rizz", "Skibidi", "Sigma", "Alpha", "Cracked", "Cursed", "Blessed", "Thicc", "Smol",
    "Chonky", "Beefy", "Spicy", "Crispy", "Saucy", "Cheesy", "Soggy", "Crusty", "Silly", "Gremlin",
    "Goblin",
];

const NOUNS: &[&str] = &[
    "Raccoon", "Possum", "Frog", "Shrimp", "Capybara", "Axolotl", "Blob", "Bean", "Potato",
    "Noodle", "Nugget", "Muffin", "Pickle", "Pretzel", "Burrito", "Taco", "Donut", "Waffle",
    "Bagel", "Biscuit", "Croissant", "Dumpling", "Ravioli", "Sushi", "Gecko", "Hamster", "Otter",
    "Seal", "Penguin", "Platypus", "Narwhal", "Llama", "Alpaca", "Sloth", "Koala", "Panda", "Moth",
    "Bee", "Crab", "Lobster",
];

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

fn word_pair<R: Rng + ?Sized>(rng: &mut R) -> (&'static str, &'static str) {
    let adjective = ADJECTIVES.choose(rng).copied().unwrap_or("Silly");
    let noun = NOUNS.choose(rng).copied().unwrap_or("Bean");
    (adjective, noun)
}

/// Random nickname: adjective, noun and a number below 1000.
pub fn generate_username<R: Rng + ?Sized>(rng: &mut R) -> String {
    let (adjective, noun) = word_pair(rng);
    let number = rng.random_range(0..1000u32);
    format!("{adjective}{noun}{number}")
}

/// Like [`generate_username`] but suffixed with the last four digits of the clock.
pub fn generate_unique_username<R: Rng + ?Sized>(rng: &mut R) -> String {
    let (adjective, noun) = word_pair(rng);
    format!("{adjective}{noun}{:04}", now_millis() % 10_000)
}

/// Fill in the lowercase mirror for profiles written before it existed.
fn with_mirror(mut user: UserEntity) -> UserEntity {
    if user.nickname_lower.is_none() {
        user.nickname_lower = Some(normalize(&user.nickname));
    }
    user
}

/// Claim `nickname` for `user_id`, creating or updating the profile.
pub async fn set_nickname_unique(
    state: &AppState,
    user_id: &str,
    nickname: &str,
    email: Option<String>,
) -> Result<UserEntity, ServiceError> {
    let trimmed = nickname.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::InvalidInput("Nickname cannot be empty".into()));
    }
    let normalized = normalize(trimmed);

    let candidates: Vec<UserEntity> = store_access::query(
        state,
        QUERY_CONTEXT,
        Filter::collection(USERS)
            .when(Condition::Any(vec![
                Condition::eq("nicknameLower", normalized.as_str()),
                Condition::eq("nickname", trimmed),
            ]))
            .limit(CONFLICT_PROBE_LIMIT),
    )
    .await?;
    let taken = candidates
        .iter()
        .any(|existing| existing.id != user_id && existing.nickname.to_lowercase() == normalized);
    if taken {
        return Err(ServiceError::Conflict("Nickname already taken".into()));
    }

    let existing: Option<UserEntity> = store_access::find(state, QUERY_CONTEXT, user_id).await?;
    let user = match existing {
        Some(current) => UserEntity {
            email: email.or(current.email),
            nickname: trimmed.to_string(),
            nickname_lower: Some(normalized),
            ..current
        },
        None => UserEntity {
            id: user_id.to_string(),
            email,
            phone: None,
            nickname: trimmed.to_string(),
            nickname_lower: Some(normalized),
            created_at: now_millis(),
            games_played: Some(0),
            games_won: Some(0),
            total_points: Some(0),
        },
    };

    store_access::write(state, WRITE_CONTEXT, vec![store_access::put(&user)?]).await?;
    info!(user_id, nickname = %user.nickname, "nickname claimed");
    Ok(user)
}

/// Profile of `user_id`, created with `nickname_if_new` on first sign in.
pub async fn get_or_create_user(
    state: &AppState,
    user_id: &str,
    nickname_if_new: Option<&str>,
) -> Result<UserEntity, ServiceError> {
    let existing: Option<UserEntity> = store_access::find(state, QUERY_CONTEXT, user_id).await?;
    if let Some(user) = existing {
        if user.nickname_lower.is_some() {
            return Ok(user);
        }
        let user = with_mirror(user);
        store_access::write(state, WRITE_CONTEXT, vec![store_access::put(&user)?]).await?;
        return Ok(user);
    }

    match nickname_if_new {
        Some(nickname) => set_nickname_unique(state, user_id, nickname, None).await,
        None => Err(ServiceError::InvalidInput(
            "Nickname required for first-time user".into(),
        )),
    }
}

/// Users whose nickname equals `query`, ignoring case.
pub async fn search_users_by_nickname(
    state: &AppState,
    query: &str,
) -> Result<Vec<UserEntity>, ServiceError> {
    let normalized = normalize(query);
    if normalized.is_empty() {
        return Ok(Vec::new());
    }

    let users: Vec<UserEntity> = store_access::query(
        state,
        QUERY_CONTEXT,
        Filter::collection(USERS)
            .where_eq("nicknameLower", normalized)
            .limit(SEARCH_LIMIT),
    )
    .await?;

    let mut seen = HashSet::new();
    Ok(users
        .into_iter()
        .filter(|user| seen.insert(user.id.clone()))
        .map(with_mirror)
        .collect())
}

/// Profiles of `ids`; unknown ids are skipped.
pub async fn users_by_ids(state: &AppState, ids: &[String]) -> Result<Vec<UserEntity>, ServiceError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let users: Vec<UserEntity> = store_access::query(
        state,
        QUERY_CONTEXT,
        Filter::collection(USERS)
            .when(Condition::is_in("id", ids.iter().map(String::as_str)))
            .limit(ids.len()),
    )
    .await?;
    Ok(users.into_iter().map(with_mirror).collect())
}

/// Top users by total points.
pub async fn leaderboard(
    state: &AppState,
    limit: usize,
) -> Result<Vec<LeaderboardEntry>, ServiceError> {
    let users: Vec<UserEntity> = store_access::query(
        state,
        QUERY_CONTEXT,
        Filter::collection(USERS)
            .order_by("totalPoints", Direction::Desc)
            .limit(limit),
    )
    .await?;

    Ok(users
        .into_iter()
        .enumerate()
        .map(|(index, user)| LeaderboardEntry {
            rank: index + 1,
            user_id: user.id,
            nickname: user.nickname,
            total_points: user.total_points.unwrap_or_default(),
            games_won: user.games_won.unwrap_or_default(),
            games_played: user.games_played.unwrap_or_default(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::state::test_support::memory_state;

    #[test]
    fn generated_names_use_the_word_lists() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let name = generate_username(&mut rng);
            let adjective = ADJECTIVES.iter().find(|a| name.starts_with(**a)).unwrap();
            let rest = &name[adjective.len()..];
            let noun = NOUNS.iter().find(|n| rest.starts_with(**n)).unwrap();
            let number: u32 = rest[noun.len()..].parse().unwrap();
            assert!(number < 1000);
        }

        let unique = generate_unique_username(&mut rng);
        let digits: String = unique.chars().rev().take(4).collect();
        assert!(digits.chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn nicknames_are_unique_ignoring_case() {
        let (state, _) = memory_state().await;
        let ana = set_nickname_unique(&state, "u1", "  SaltyFrog7 ", Some("ana@example.com".into()))
            .await
            .unwrap();
        assert_eq!(ana.nickname, "SaltyFrog7");
        assert_eq!(ana.nickname_lower.as_deref(), Some("saltyfrog7"));
        assert_eq!(ana.total_points, Some(0));

        let err = set_nickname_unique(&state, "u2", "saltyfrog7", None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(message) if message == "Nickname already taken"));

        let again = set_nickname_unique(&state, "u1", "SALTYFROG7", None).await.unwrap();
        assert_eq!(again.email.as_deref(), Some("ana@example.com"));
        assert_eq!(again.created_at, ana.created_at);

        let err = set_nickname_unique(&state, "u3", "   ", None).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(message) if message == "Nickname cannot be empty"));
    }

    #[tokio::test]
    async fn first_sign_in_needs_a_nickname_and_mirrors_are_backfilled() {
        let (state, _) = memory_state().await;
        assert!(matches!(
            get_or_create_user(&state, "u1", None).await,
            Err(ServiceError::InvalidInput(_))
        ));

        let legacy = UserEntity {
            id: "u2".into(),
            email: None,
            phone: Some("+15550001".into()),
            nickname: "GoofyOtter".into(),
            nickname_lower: None,
            created_at: 1,
            games_played: None,
            games_won: None,
            total_points: None,
        };
        store_access::write(&state, WRITE_CONTEXT, vec![store_access::put(&legacy).unwrap()])
            .await
            .unwrap();

        let user = get_or_create_user(&state, "u2", None).await.unwrap();
        assert_eq!(user.nickname_lower.as_deref(), Some("goofyotter"));
        let found = search_users_by_nickname(&state, " GOOFYOTTER ").await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(search_users_by_nickname(&state, "  ").await.unwrap().is_empty());

        let created = get_or_create_user(&state, "u3", Some("Bee")).await.unwrap();
        assert_eq!(created.nickname, "Bee");
    }

    #[tokio::test]
    async fn leaderboard_ranks_by_points() {
        let (state, _) = memory_state().await;
        for (id, points) in [("a", 5), ("b", 40), ("c", 12)] {
            let mut user = set_nickname_unique(&state, id, &format!("Player{id}"), None)
                .await
                .unwrap();
            user.total_points = Some(points);
            store_access::write(&state, WRITE_CONTEXT, vec![store_access::put(&user).unwrap()])
                .await
                .unwrap();
        }

        let board = leaderboard(&state, 2).await.unwrap();
        let ids: Vec<_> = board.iter().map(|entry| entry.user_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(board[0].rank, 1);

        let fetched = users_by_ids(&state, &["c".into(), "zz".into()]).await.unwrap();
        assert_eq!(fetched.len(), 1);
    }
}
