use sqlx::{Sqlite, SqliteConnection, SqlitePool};

use crate::{
    errors::RequestError,
    models::{Conversation, ConversationDetail, ConversationSummary, Message, UserSummary},
};

use super::{begin_write, notification_helpers::notify_new_message, require_user};

const MESSAGE_QUERY: &str = r#"
        SELECT messages.id, messages.conversation_id, messages.sender_id,
               users.username AS sender_username, messages.content,
               messages.created_at, messages.is_read
        FROM messages
        JOIN users ON users.id = messages.sender_id
"#;

async fn fetch_conversation(
    conn: &mut SqliteConnection,
    conversation_id: i64,
) -> Result<Conversation, RequestError> {
    sqlx::query_as::<Sqlite, Conversation>(
        "SELECT id, created_at, updated_at FROM conversations WHERE id = $1",
    )
    .bind(conversation_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(RequestError::NotFound("Conversation not found"))
}

/// 404 when the conversation is missing, 403 when the user is not in it.
async fn require_participant(
    conn: &mut SqliteConnection,
    conversation_id: i64,
    user_id: i64,
) -> Result<Conversation, RequestError> {
    let conversation = fetch_conversation(conn, conversation_id).await?;
    let (is_participant,): (bool,) = sqlx::query_as(
        r#"
        SELECT EXISTS (SELECT 1 FROM conversation_participants
                       WHERE conversation_id = $1 AND user_id = $2)
        "#,
    )
    .bind(conversation_id)
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;
    if !is_participant {
        return Err(RequestError::Forbidden(
            "You are not a participant of this conversation",
        ));
    }
    Ok(conversation)
}

async fn fetch_participants(
    conn: &mut SqliteConnection,
    conversation_id: i64,
) -> Result<Vec<UserSummary>, sqlx::Error> {
    sqlx::query_as::<Sqlite, UserSummary>(
        r#"
        SELECT users.id, users.username, profiles.avatar
        FROM conversation_participants
        JOIN users ON users.id = conversation_participants.user_id
        LEFT JOIN profiles ON profiles.user_id = users.id
        WHERE conversation_participants.conversation_id = $1
        ORDER BY users.username
        "#,
    )
    .bind(conversation_id)
    .fetch_all(&mut *conn)
    .await
}

/// Returns the two-person conversation between the pair, creating it when
/// there is none. The flag is `true` when a new one was created.
pub async fn start_conversation_in_db(
    pool: &SqlitePool,
    user_id: i64,
    other_user_id: i64,
) -> Result<(Conversation, bool), RequestError> {
    if user_id == other_user_id {
        return Err(RequestError::RunTimeError(
            "You cannot start a conversation with yourself",
        ));
    }
    let mut tx = begin_write(pool).await?;
    require_user(&mut tx, other_user_id).await?;

    let existing = sqlx::query_as::<Sqlite, Conversation>(
        r#"
        SELECT conversations.id, conversations.created_at, conversations.updated_at
        FROM conversations
        WHERE EXISTS (SELECT 1 FROM conversation_participants p
                      WHERE p.conversation_id = conversations.id AND p.user_id = $1)
          AND EXISTS (SELECT 1 FROM conversation_participants p
                      WHERE p.conversation_id = conversations.id AND p.user_id = $2)
          AND (SELECT COUNT(*) FROM conversation_participants p
               WHERE p.conversation_id = conversations.id) = 2
        ORDER BY conversations.id
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .bind(other_user_id)
    .fetch_optional(&mut tx)
    .await?;

    if let Some(conversation) = existing {
        tx.commit().await?;
        return Ok((conversation, false));
    }

    let conversation = sqlx::query_as::<Sqlite, Conversation>(
        "INSERT INTO conversations DEFAULT VALUES RETURNING id, created_at, updated_at",
    )
    .fetch_one(&mut tx)
    .await?;
    for participant in [user_id, other_user_id] {
        sqlx::query(
            "INSERT INTO conversation_participants (conversation_id, user_id) VALUES ($1, $2)",
        )
        .bind(conversation.id)
        .bind(participant)
        .execute(&mut tx)
        .await?;
    }
    tx.commit().await?;
    tracing::debug!(conversation_id = conversation.id, "started conversation");
    Ok((conversation, true))
}

/// The user's conversations, most recently active first.
pub async fn list_conversations_in_db(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Vec<ConversationSummary>, RequestError> {
    let mut tx = pool.begin().await?;
    let conversations = sqlx::query_as::<Sqlite, Conversation>(
        r#"
        SELECT conversations.id, conversations.created_at, conversations.updated_at
        FROM conversations
        JOIN conversation_participants p ON p.conversation_id = conversations.id
        WHERE p.user_id = $1
        ORDER BY conversations.updated_at DESC, conversations.id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut tx)
    .await?;

    let last_message_query = format!(
        "{MESSAGE_QUERY} WHERE messages.conversation_id = $1 ORDER BY messages.created_at DESC, messages.id DESC LIMIT 1"
    );
    let mut result = Vec::with_capacity(conversations.len());
    for conversation in conversations {
        let participants = fetch_participants(&mut tx, conversation.id)
            .await?
            .into_iter()
            .filter(|participant| participant.id != user_id)
            .collect();
        let last_message = sqlx::query_as::<Sqlite, Message>(&last_message_query)
            .bind(conversation.id)
            .fetch_optional(&mut tx)
            .await?;
        let (unread_count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM messages
            WHERE conversation_id = $1 AND sender_id <> $2 AND is_read = 0
            "#,
        )
        .bind(conversation.id)
        .bind(user_id)
        .fetch_one(&mut tx)
        .await?;
        result.push(ConversationSummary {
            conversation,
            participants,
            last_message,
            unread_count,
        });
    }
    tx.commit().await?;
    Ok(result)
}

/// Marks every message the viewer did not send as read, then returns the
/// history newest first.
pub async fn view_conversation_in_db(
    pool: &SqlitePool,
    user_id: i64,
    conversation_id: i64,
) -> Result<ConversationDetail, RequestError> {
    let mut tx = begin_write(pool).await?;
    let conversation = require_participant(&mut tx, conversation_id, user_id).await?;

    sqlx::query(
        "UPDATE messages SET is_read = 1 WHERE conversation_id = $1 AND sender_id <> $2 AND is_read = 0",
    )
    .bind(conversation_id)
    .bind(user_id)
    .execute(&mut tx)
    .await?;

    let participants = fetch_participants(&mut tx, conversation_id).await?;
    let query = format!(
        "{MESSAGE_QUERY} WHERE messages.conversation_id = $1 ORDER BY messages.created_at DESC, messages.id DESC"
    );
    let messages = sqlx::query_as::<Sqlite, Message>(&query)
        .bind(conversation_id)
        .fetch_all(&mut tx)
        .await?;
    tx.commit().await?;
    Ok(ConversationDetail {
        conversation,
        participants,
        messages,
    })
}

pub async fn send_message_in_db(
    pool: &SqlitePool,
    user_id: i64,
    conversation_id: i64,
    content: &str,
) -> Result<Message, RequestError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(RequestError::RunTimeError("Message cannot be empty"));
    }
    let mut tx = begin_write(pool).await?;
    require_participant(&mut tx, conversation_id, user_id).await?;
    let sender = require_user(&mut tx, user_id).await?;

    let (message_id,): (i64,) = sqlx::query_as(
        "INSERT INTO messages (conversation_id, sender_id, content) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(conversation_id)
    .bind(user_id)
    .bind(content)
    .fetch_one(&mut tx)
    .await?;
    sqlx::query(
        "UPDATE conversations SET updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now') WHERE id = $1",
    )
    .bind(conversation_id)
    .execute(&mut tx)
    .await?;
    notify_new_message(&mut tx, user_id, &sender.username, conversation_id).await?;

    let query = format!("{MESSAGE_QUERY} WHERE messages.id = $1");
    let message = sqlx::query_as::<Sqlite, Message>(&query)
        .bind(message_id)
        .fetch_one(&mut tx)
        .await?;
    tx.commit().await?;
    Ok(message)
}
