//! Shared application state

use std::sync::Arc;

use crate::ai::{
    ContentGenerator, ContentValidator, FactChecker, IntegratedAiSystem, Publisher,
    SafeContentGenerator, TemplateSource, WikipediaLookup,
};
use crate::cache::Cache;
use crate::config::Config;
use crate::db::repositories::{
    SqlxBookmarkRepository, SqlxCategoryRepository, SqlxCommentRepository, SqlxLikeRepository,
    SqlxNotificationRepository, SqlxPostRepository, SqlxSessionRepository, SqlxTagRepository,
    SqlxUserRepository, SqlxViewRepository,
};
use crate::db::DynDatabasePool;
use crate::services::{
    BookmarkService, CategoryService, CommentService, JwtManager, LikeService,
    NotificationService, PostService, SessionPolicy, TagService, UserService, ViewService,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub jwt: Arc<JwtManager>,
    pub user_service: Arc<UserService>,
    pub post_service: Arc<PostService>,
    pub category_service: Arc<CategoryService>,
    pub tag_service: Arc<TagService>,
    pub comment_service: Arc<CommentService>,
    pub like_service: Arc<LikeService>,
    pub bookmark_service: Arc<BookmarkService>,
    pub view_service: Arc<ViewService>,
    pub notification_service: Arc<NotificationService>,
    pub ai: Arc<IntegratedAiSystem>,
}

impl AppState {
    /// Wire repositories, services and the content pipeline over one pool
    pub fn build(pool: DynDatabasePool, cache: Arc<Cache>, config: &Config) -> Self {
        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let post_repo = SqlxPostRepository::boxed(pool.clone());
        let category_repo = SqlxCategoryRepository::boxed(pool.clone());
        let comment_repo = SqlxCommentRepository::boxed(pool.clone());

        let user_service = Arc::new(UserService::new(
            user_repo.clone(),
            SqlxSessionRepository::boxed(pool.clone()),
            SessionPolicy::from(&config.auth),
        ));
        let notification_service = Arc::new(NotificationService::new(
            SqlxNotificationRepository::boxed(pool.clone()),
            user_repo.clone(),
        ));
        let tag_service = Arc::new(TagService::new(
            SqlxTagRepository::boxed(pool.clone()),
            post_repo.clone(),
            cache.clone(),
        ));
        let category_service = Arc::new(CategoryService::new(category_repo.clone(), cache.clone()));
        let post_service = Arc::new(PostService::new(
            post_repo.clone(),
            category_repo,
            user_repo,
            tag_service.clone(),
            cache.clone(),
        ));
        let comment_service = Arc::new(CommentService::new(
            comment_repo.clone(),
            post_repo.clone(),
            notification_service.clone(),
        ));
        let like_service = Arc::new(LikeService::new(
            SqlxLikeRepository::boxed(pool.clone()),
            post_repo.clone(),
            comment_repo,
            notification_service.clone(),
        ));
        let bookmark_service = Arc::new(BookmarkService::new(
            SqlxBookmarkRepository::boxed(pool.clone()),
            post_repo.clone(),
        ));
        let view_service = Arc::new(ViewService::new(SqlxViewRepository::boxed(pool), post_repo));

        let mut fact_checker = FactChecker::new(cache);
        if config.ai.fact_check_lookup {
            fact_checker = fact_checker
                .with_lookup(Arc::new(WikipediaLookup::new(config.ai.wikipedia_url.clone())));
        }
        let validator = Arc::new(ContentValidator::new(fact_checker));
        let generator = Arc::new(ContentGenerator::new(Arc::new(TemplateSource), validator));
        let publisher = Arc::new(Publisher::new(
            post_service.clone(),
            category_service.clone(),
            user_service.clone(),
            config.ai.author_username.clone(),
        ));
        let ai = IntegratedAiSystem::new(
            SafeContentGenerator::new(
                generator,
                config.ai.thresholds.clone(),
                config.ai.max_attempts,
            ),
            config.ai.clone(),
        )
        .with_publisher(publisher);

        Self {
            jwt: Arc::new(JwtManager::new(&config.auth)),
            user_service,
            post_service,
            category_service,
            tag_service,
            comment_service,
            like_service,
            bookmark_service,
            view_service,
            notification_service,
            ai: Arc::new(ai),
        }
    }
}
