//! Comment repository
//!
//! Database operations for comments and comment threads.

use crate::db::pool::sqlite;
use crate::db::DynDatabasePool;
use crate::models::{Comment, CommentSort, CommentWithMeta, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;

/// Comment repository trait
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Create a new comment
    async fn create(&self, comment: &Comment) -> Result<Comment>;

    /// Get comment by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>>;

    /// Approved top-level comments of a post with approved replies nested
    async fn thread_for_post(&self, post_id: i64, sort: CommentSort) -> Result<Vec<CommentWithMeta>>;

    /// Whether any comment replies to `id`
    async fn has_replies(&self, id: i64) -> Result<bool>;

    /// Persist content and moderation flags
    async fn update(&self, comment: &Comment) -> Result<Comment>;

    /// Delete a comment and its replies
    async fn delete(&self, id: i64) -> Result<()>;

    /// Comments awaiting moderation, oldest first
    async fn pending(&self, params: &ListParams) -> Result<(Vec<CommentWithMeta>, i64)>;

    /// Most recent approved comments across all posts
    async fn recent(&self, limit: i64) -> Result<Vec<CommentWithMeta>>;

    /// Comments written by a user, newest first
    async fn by_user(&self, user_id: i64, params: &ListParams) -> Result<(Vec<Comment>, i64)>;

    /// Recount `users.comments_count`
    async fn refresh_author_count(&self, user_id: i64) -> Result<i64>;
}

/// SQLx-based comment repository implementation
pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, comment: &Comment) -> Result<Comment> {
        create_comment_sqlite(sqlite(&self.pool)?, comment).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>> {
        get_comment_by_id_sqlite(sqlite(&self.pool)?, id).await
    }

    async fn thread_for_post(&self, post_id: i64, sort: CommentSort) -> Result<Vec<CommentWithMeta>> {
        thread_for_post_sqlite(sqlite(&self.pool)?, post_id, sort).await
    }

    async fn has_replies(&self, id: i64) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE parent_id = ?")
            .bind(id)
            .fetch_one(sqlite(&self.pool)?)
            .await
            .context("Failed to count replies")?;
        Ok(count > 0)
    }

    async fn update(&self, comment: &Comment) -> Result<Comment> {
        let pool = sqlite(&self.pool)?;
        sqlx::query(
            r#"
            UPDATE comments
            SET content = ?, is_approved = ?, is_spam = ?, is_deleted = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&comment.content)
        .bind(comment.is_approved)
        .bind(comment.is_spam)
        .bind(comment.is_deleted)
        .bind(Utc::now())
        .bind(comment.id)
        .execute(pool)
        .await
        .context("Failed to update comment")?;

        get_comment_by_id_sqlite(pool, comment.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Comment not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id)
            .execute(sqlite(&self.pool)?)
            .await
            .context("Failed to delete comment")?;
        Ok(())
    }

    async fn pending(&self, params: &ListParams) -> Result<(Vec<CommentWithMeta>, i64)> {
        let pool = sqlite(&self.pool)?;
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM comments WHERE is_approved = 0 AND is_spam = 0 AND is_deleted = 0",
        )
        .fetch_one(pool)
        .await
        .context("Failed to count pending comments")?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM comments c
            INNER JOIN users u ON u.id = c.author_id
            WHERE c.is_approved = 0 AND c.is_spam = 0 AND c.is_deleted = 0
            ORDER BY c.created_at ASC
            LIMIT ? OFFSET ?
            "#,
            META_COLUMNS
        ))
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list pending comments")?;

        Ok((rows.iter().map(row_to_meta_sqlite).collect(), total))
    }

    async fn recent(&self, limit: i64) -> Result<Vec<CommentWithMeta>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM comments c
            INNER JOIN users u ON u.id = c.author_id
            WHERE c.is_approved = 1 AND c.is_deleted = 0
            ORDER BY c.created_at DESC, c.id DESC
            LIMIT ?
            "#,
            META_COLUMNS
        ))
        .bind(limit)
        .fetch_all(sqlite(&self.pool)?)
        .await
        .context("Failed to list recent comments")?;

        Ok(rows.iter().map(row_to_meta_sqlite).collect())
    }

    async fn by_user(&self, user_id: i64, params: &ListParams) -> Result<(Vec<Comment>, i64)> {
        let pool = sqlite(&self.pool)?;
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM comments WHERE author_id = ? AND is_deleted = 0",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
        .context("Failed to count user comments")?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM comments c
            WHERE c.author_id = ? AND c.is_deleted = 0
            ORDER BY c.created_at DESC, c.id DESC
            LIMIT ? OFFSET ?
            "#,
            COMMENT_COLUMNS
        ))
        .bind(user_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list user comments")?;

        Ok((rows.iter().map(row_to_comment_sqlite).collect(), total))
    }

    async fn refresh_author_count(&self, user_id: i64) -> Result<i64> {
        let pool = sqlite(&self.pool)?;
        sqlx::query(
            r#"
            UPDATE users
            SET comments_count = (
                SELECT COUNT(*) FROM comments WHERE author_id = ?1 AND is_deleted = 0
            )
            WHERE id = ?1
            "#,
        )
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to refresh user comment count")?;

        let count: Option<i64> = sqlx::query_scalar("SELECT comments_count FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(pool)
            .await
            .context("Failed to read user comment count")?;
        Ok(count.unwrap_or(0))
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

const COMMENT_COLUMNS: &str = r#"
    c.id, c.post_id, c.author_id, c.parent_id, c.content, c.is_approved, c.is_spam,
    c.is_deleted, c.likes_count, c.created_at, c.updated_at
"#;

const META_COLUMNS: &str = r#"
    c.id, c.post_id, c.author_id, c.parent_id, c.content, c.is_approved, c.is_spam,
    c.is_deleted, c.likes_count, c.created_at, c.updated_at, u.username, u.email
"#;

async fn create_comment_sqlite(pool: &SqlitePool, comment: &Comment) -> Result<Comment> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO comments (post_id, author_id, parent_id, content, is_approved, is_spam,
                              created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(comment.post_id)
    .bind(comment.author_id)
    .bind(comment.parent_id)
    .bind(&comment.content)
    .bind(comment.is_approved)
    .bind(comment.is_spam)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create comment")?;

    Ok(Comment {
        id: result.last_insert_rowid(),
        likes_count: 0,
        is_deleted: false,
        created_at: now,
        updated_at: now,
        ..comment.clone()
    })
}

async fn get_comment_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Comment>> {
    let row = sqlx::query(&format!("SELECT {} FROM comments c WHERE c.id = ?", COMMENT_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get comment by ID")?;

    Ok(row.as_ref().map(row_to_comment_sqlite))
}

async fn thread_for_post_sqlite(
    pool: &SqlitePool,
    post_id: i64,
    sort: CommentSort,
) -> Result<Vec<CommentWithMeta>> {
    let top_level = sqlx::query(&format!(
        r#"
        SELECT {}
        FROM comments c
        INNER JOIN users u ON u.id = c.author_id
        WHERE c.post_id = ? AND c.parent_id IS NULL AND c.is_approved = 1
        ORDER BY {}, c.id
        "#,
        META_COLUMNS,
        sort.order_clause()
    ))
    .bind(post_id)
    .fetch_all(pool)
    .await
    .context("Failed to load comments")?;

    let reply_rows = sqlx::query(&format!(
        r#"
        SELECT {}
        FROM comments c
        INNER JOIN users u ON u.id = c.author_id
        WHERE c.post_id = ? AND c.parent_id IS NOT NULL AND c.is_approved = 1
        ORDER BY c.created_at ASC, c.id ASC
        "#,
        META_COLUMNS
    ))
    .bind(post_id)
    .fetch_all(pool)
    .await
    .context("Failed to load replies")?;

    let mut replies_map: HashMap<i64, Vec<CommentWithMeta>> = HashMap::new();
    for row in &reply_rows {
        let reply = row_to_meta_sqlite(row);
        if let Some(parent_id) = reply.comment.parent_id {
            replies_map.entry(parent_id).or_default().push(reply);
        }
    }

    let mut comments: Vec<CommentWithMeta> = top_level.iter().map(row_to_meta_sqlite).collect();
    for comment in &mut comments {
        attach_replies(comment, &mut replies_map);
    }
    Ok(comments)
}

fn attach_replies(comment: &mut CommentWithMeta, replies_map: &mut HashMap<i64, Vec<CommentWithMeta>>) {
    if let Some(mut replies) = replies_map.remove(&comment.comment.id) {
        for reply in &mut replies {
            attach_replies(reply, replies_map);
        }
        comment.replies = replies;
    }
}

fn row_to_comment_sqlite(row: &sqlx::sqlite::SqliteRow) -> Comment {
    Comment {
        id: row.get("id"),
        post_id: row.get("post_id"),
        author_id: row.get("author_id"),
        parent_id: row.get("parent_id"),
        content: row.get("content"),
        is_approved: row.get("is_approved"),
        is_spam: row.get("is_spam"),
        is_deleted: row.get("is_deleted"),
        likes_count: row.get("likes_count"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_meta_sqlite(row: &sqlx::sqlite::SqliteRow) -> CommentWithMeta {
    let email: Option<String> = row.get("email");
    CommentWithMeta {
        comment: row_to_comment_sqlite(row),
        author_username: row.get("username"),
        avatar_url: CommentWithMeta::gravatar_url(email.as_deref()),
        replies: Vec::new(),
    }
}
