//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the queries for a specific entity.

pub mod bookmark;
pub mod category;
pub mod comment;
pub mod like;
pub mod notification;
pub mod post;
pub mod session;
pub mod tag;
pub mod user;
pub mod view;

pub use bookmark::{BookmarkRepository, SqlxBookmarkRepository};
pub use category::{CategoryRepository, SqlxCategoryRepository};
pub use comment::{CommentRepository, SqlxCommentRepository};
pub use like::{LikeRepository, SqlxLikeRepository};
pub use notification::{NotificationRepository, SqlxNotificationRepository};
pub use post::{PostRepository, SqlxPostRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use tag::{SqlxTagRepository, TagRepository};
pub use user::{SqlxUserRepository, UserRepository};
pub use view::{SqlxViewRepository, ViewRepository};
