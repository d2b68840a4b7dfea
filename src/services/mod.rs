//! Services layer - Business logic
//!
//! Services implement the blog's rules on top of the repositories:
//! - Validation and permission checks
//! - Keeping denormalised counters in step
//! - Cache reads and invalidation

pub mod auth;
pub mod bookmark;
pub mod category;
pub mod comment;
pub mod like;
pub mod markdown;
pub mod notification;
pub mod password;
pub mod post;
pub mod slug;
pub mod tag;
pub mod user;
pub mod view;

pub use auth::{bearer_token, AuthError, Claims, JwtManager, TokenKind, TokenPair};
pub use bookmark::{BookmarkService, BookmarkServiceError};
pub use category::{CategoryService, CategoryServiceError};
pub use comment::{CommentService, CommentServiceError};
pub use like::{LikeService, LikeServiceError};
pub use markdown::{plain_text, MarkdownRenderer};
pub use notification::{NotificationService, NotificationServiceError};
pub use password::{hash_password, verify_password};
pub use post::{PostService, PostServiceError};
pub use slug::{generate_slug, unique_slug};
pub use tag::{TagService, TagServiceError};
pub use user::{SessionPolicy, UserService, UserServiceError};
pub use view::{HistoryEntry, ViewService, ViewServiceError};
