//! Friend requests and the friend graph derived from them.

use std::collections::{HashMap, HashSet};

use tracing::info;

use crate::{
    dao::{
        document_store::{Condition, Direction, Filter},
        models::{
            FRIEND_REQUESTS, FriendRequestEntity, FriendRequestStatus, UserEntity, now_millis,
            timestamped_id,
        },
    },
    dto::user::IncomingRequests,
    error::ServiceError,
    services::{store_access, user_service},
    state::AppState,
};

const QUERY_CONTEXT: &str = "sync with friends";
const WRITE_CONTEXT: &str = "update your Loopy crew";

/// Ask `to_user` to become friends with `from_user`.
pub async fn send_friend_request(
    state: &AppState,
    from_user: &str,
    to_user: &str,
) -> Result<FriendRequestEntity, ServiceError> {
    if from_user == to_user {
        return Err(ServiceError::InvalidInput(
            "You cannot send a friend request to yourself".into(),
        ));
    }

    let request = FriendRequestEntity {
        id: timestamped_id("fr"),
        from_user: from_user.to_string(),
        to_user: to_user.to_string(),
        status: FriendRequestStatus::Pending,
        created_at: now_millis(),
    };
    store_access::write(state, WRITE_CONTEXT, vec![store_access::put(&request)?]).await?;
    info!(request_id = %request.id, from_user, to_user, "friend request sent");
    Ok(request)
}

/// Accept a request addressed to `user_id`.
pub async fn accept_friend_request(
    state: &AppState,
    user_id: &str,
    request_id: &str,
) -> Result<FriendRequestEntity, ServiceError> {
    answer(state, user_id, request_id, FriendRequestStatus::Accepted).await
}

/// Decline a request addressed to `user_id`.
pub async fn decline_friend_request(
    state: &AppState,
    user_id: &str,
    request_id: &str,
) -> Result<FriendRequestEntity, ServiceError> {
    answer(state, user_id, request_id, FriendRequestStatus::Rejected).await
}

async fn answer(
    state: &AppState,
    user_id: &str,
    request_id: &str,
    status: FriendRequestStatus,
) -> Result<FriendRequestEntity, ServiceError> {
    let request: FriendRequestEntity = store_access::find(state, QUERY_CONTEXT, request_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Friend request not found".into()))?;
    if request.to_user != user_id {
        return Err(ServiceError::Unauthorized(
            "Only the recipient can answer a friend request".into(),
        ));
    }

    let request = FriendRequestEntity { status, ..request };
    store_access::write(state, WRITE_CONTEXT, vec![store_access::put(&request)?]).await?;
    info!(request_id, status = status.as_str(), "friend request answered");
    Ok(request)
}

fn between(a: &str, b: &str) -> Condition {
    Condition::All(vec![
        Condition::eq("fromUser", a),
        Condition::eq("toUser", b),
    ])
}

/// Whether an accepted request links `a` and `b`, in either direction.
pub async fn is_friend(state: &AppState, a: &str, b: &str) -> Result<bool, ServiceError> {
    let found: Option<FriendRequestEntity> = store_access::first(
        state,
        QUERY_CONTEXT,
        Filter::collection(FRIEND_REQUESTS)
            .where_eq("status", FriendRequestStatus::Accepted.as_str())
            .when(Condition::Any(vec![between(a, b), between(b, a)])),
    )
    .await?;
    Ok(found.is_some())
}

/// Query of every accepted request involving `user_id`.
pub fn friendships_filter(user_id: &str) -> Filter {
    Filter::collection(FRIEND_REQUESTS)
        .where_eq("status", FriendRequestStatus::Accepted.as_str())
        .when(Condition::Any(vec![
            Condition::eq("fromUser", user_id),
            Condition::eq("toUser", user_id),
        ]))
}

/// Profiles of everyone `user_id` is friends with.
pub async fn list_friends(state: &AppState, user_id: &str) -> Result<Vec<UserEntity>, ServiceError> {
    let requests: Vec<FriendRequestEntity> =
        store_access::query(state, QUERY_CONTEXT, friendships_filter(user_id)).await?;

    let mut seen = HashSet::new();
    let ids: Vec<String> = requests
        .into_iter()
        .map(|request| {
            if request.from_user == user_id {
                request.to_user
            } else {
                request.from_user
            }
        })
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect();

    user_service::users_by_ids(state, &ids).await
}

/// Pending requests addressed to `user_id`, with their senders.
pub async fn incoming_requests(
    state: &AppState,
    user_id: &str,
) -> Result<IncomingRequests, ServiceError> {
    let requests: Vec<FriendRequestEntity> = store_access::query(
        state,
        QUERY_CONTEXT,
        Filter::collection(FRIEND_REQUESTS)
            .where_eq("toUser", user_id)
            .where_eq("status", FriendRequestStatus::Pending.as_str())
            .order_by("createdAt", Direction::Asc),
    )
    .await?;

    let mut seen = HashSet::new();
    let senders: Vec<String> = requests
        .iter()
        .map(|request| request.from_user.clone())
        .filter(|id| seen.insert(id.clone()))
        .collect();
    let requestors: HashMap<String, UserEntity> = user_service::users_by_ids(state, &senders)
        .await?
        .into_iter()
        .map(|user| (user.id.clone(), user))
        .collect();

    Ok(IncomingRequests {
        requests,
        requestors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::memory_state;

    #[tokio::test]
    async fn accepted_requests_make_friends_both_ways() {
        let (state, _) = memory_state().await;
        user_service::set_nickname_unique(&state, "ana", "Ana", None).await.unwrap();
        user_service::set_nickname_unique(&state, "bo", "Bo", None).await.unwrap();

        let request = send_friend_request(&state, "ana", "bo").await.unwrap();
        assert!(request.id.starts_with("fr_"));
        assert!(!is_friend(&state, "ana", "bo").await.unwrap());

        let incoming = incoming_requests(&state, "bo").await.unwrap();
        assert_eq!(incoming.requests.len(), 1);
        assert_eq!(incoming.requestors["ana"].nickname, "Ana");

        assert!(matches!(
            accept_friend_request(&state, "ana", &request.id).await,
            Err(ServiceError::Unauthorized(_))
        ));
        accept_friend_request(&state, "bo", &request.id).await.unwrap();

        assert!(is_friend(&state, "bo", "ana").await.unwrap());
        assert!(incoming_requests(&state, "bo").await.unwrap().requests.is_empty());
        let friends = list_friends(&state, "bo").await.unwrap();
        assert_eq!(friends.len(), 1);
        assert_eq!(friends[0].id, "ana");
    }

    #[tokio::test]
    async fn declined_and_missing_requests() {
        let (state, _) = memory_state().await;
        let request = send_friend_request(&state, "ana", "cy").await.unwrap();
        let declined = decline_friend_request(&state, "cy", &request.id).await.unwrap();
        assert_eq!(declined.status, FriendRequestStatus::Rejected);
        assert!(!is_friend(&state, "ana", "cy").await.unwrap());

        assert!(matches!(
            accept_friend_request(&state, "cy", "fr_missing").await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            send_friend_request(&state, "ana", "ana").await,
            Err(ServiceError::InvalidInput(_))
        ));
    }
}
