//! Data models
//!
//! This module contains all data structures used throughout the Inkwell blog platform.
//! Models represent:
//! - Database entities (User, Session, Post, Category, Tag, Comment, Like,
//!   Bookmark, View, Notification)
//! - API request/response types
//! - Internal data transfer objects

mod category;
mod comment;
mod engagement;
mod notification;
mod post;
mod session;
mod tag;
mod user;

pub use category::{
    Category, CategoryTree, CreateCategoryInput, UpdateCategoryInput, DEFAULT_CATEGORY_COLOR,
};
pub use comment::{
    Comment, CommentSort, CommentWithMeta, CreateCommentInput, DELETED_PLACEHOLDER,
    MAX_COMMENT_LENGTH,
};
pub use engagement::{Bookmark, Like, LikeState, LikeTarget, View, ViewContext, VIEW_DEDUP_MINUTES};
pub use notification::{NewNotification, Notification, NotificationKind};
pub use post::{
    reading_time, truncate_chars, CreatePostInput, ListParams, PagedResult, Post, PostDetail,
    PostFilter, PostSort, SortOrder, UpdatePostInput, WORDS_PER_MINUTE,
};
pub use session::{ClientInfo, Session};
pub use tag::{CreateTagInput, Tag, TagCloudEntry, UpdateTagInput, DEFAULT_TAG_COLOR};
pub use user::{CreateUserInput, UpdateProfileInput, User, UserRole, UserStats};
