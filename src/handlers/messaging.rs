use std::sync::Arc;

use axum::{extract::Path, Extension, Json};
use sqlx::SqlitePool;

use crate::{
    authentication::AuthUser,
    data_formats::{
        ConversationDetailResponse, ConversationResponse, ConversationWrapper, MessageRequest,
        MessageResponse, MessageWrapper, MultipleConversationsWrapper, StartConversationRequest,
    },
    db_helpers::{
        list_conversations_in_db, send_message_in_db, start_conversation_in_db,
        view_conversation_in_db,
    },
};

use super::JsonResult;

pub async fn list_conversations(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
) -> JsonResult<MultipleConversationsWrapper> {
    let conversations = list_conversations_in_db(&pool, user.id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(Json(MultipleConversationsWrapper { conversations }))
}

pub async fn start_conversation(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    Json(request): Json<StartConversationRequest>,
) -> JsonResult<ConversationWrapper<ConversationResponse>> {
    let (conversation, created) = start_conversation_in_db(&pool, user.id, request.user_id).await?;
    Ok(Json(ConversationWrapper {
        conversation: ConversationResponse::new(conversation),
        created: Some(created),
    }))
}

pub async fn view_conversation(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    Path(conversation_id): Path<i64>,
) -> JsonResult<ConversationWrapper<ConversationDetailResponse>> {
    let detail = view_conversation_in_db(&pool, user.id, conversation_id).await?;
    Ok(Json(ConversationWrapper {
        conversation: detail.into(),
        created: None,
    }))
}

pub async fn send_message(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    Path(conversation_id): Path<i64>,
    Json(MessageWrapper { message: request }): Json<MessageWrapper<MessageRequest>>,
) -> JsonResult<MessageWrapper<MessageResponse>> {
    let message = send_message_in_db(&pool, user.id, conversation_id, &request.content).await?;
    Ok(Json(MessageWrapper {
        message: message.into(),
    }))
}
