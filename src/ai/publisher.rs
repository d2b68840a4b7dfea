//! Stores approved pipeline output as published posts

use super::pipeline::ContentGenerationResult;
use crate::models::{CreatePostInput, PostDetail, User};
use crate::services::{
    CategoryService, CategoryServiceError, PostService, PostServiceError, UserService,
    UserServiceError,
};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("No author available for generated posts")]
    NoAuthor,

    #[error(transparent)]
    Category(#[from] CategoryServiceError),

    #[error(transparent)]
    Post(#[from] PostServiceError),

    #[error(transparent)]
    User(#[from] UserServiceError),
}

pub struct Publisher {
    posts: Arc<PostService>,
    categories: Arc<CategoryService>,
    users: Arc<UserService>,
    author_username: String,
}

impl Publisher {
    pub fn new(
        posts: Arc<PostService>,
        categories: Arc<CategoryService>,
        users: Arc<UserService>,
        author_username: impl Into<String>,
    ) -> Self {
        Self {
            posts,
            categories,
            users,
            author_username: author_username.into(),
        }
    }

    /// The configured author, or the first active admin
    async fn author(&self) -> Result<User, PublishError> {
        match self.users.get_by_username(&self.author_username).await {
            Ok(user) if user.is_active => return Ok(user),
            Ok(_) | Err(UserServiceError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        self.users
            .admins()
            .await?
            .into_iter()
            .next()
            .ok_or(PublishError::NoAuthor)
    }

    /// Publish `content` as a post, creating its category and tags as needed
    pub async fn publish(&self, content: &ContentGenerationResult) -> Result<PostDetail, PublishError> {
        let author = self.author().await?;
        let category = self.categories.get_or_create(&content.category).await?;

        let metadata = json!({
            "validation_score": content.quality_score,
            "status": content.validation.result,
            "quality_metrics": content.validation.quality_metrics,
            "bias_score": content.bias_score,
            "error_count": content.error_count,
            "corrections_applied": content.corrections_applied.len(),
            "generated_at": content.generated_at.to_rfc3339(),
            "ai_generated": true,
        });

        let detail = self
            .posts
            .create(
                &author,
                CreatePostInput {
                    title: content.title.clone(),
                    content: content.content.clone(),
                    excerpt: Some(content.excerpt.clone()),
                    category_id: Some(category.id),
                    tags: content.tags.clone(),
                    is_published: true,
                    allow_comments: true,
                    ai_generated: true,
                    validation_metadata: Some(metadata),
                    ..Default::default()
                },
            )
            .await?;

        tracing::info!(
            post_id = detail.post.id,
            title = %detail.post.title,
            author = %author.username,
            "Generated post published"
        );
        Ok(detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::pipeline::tests::sample_result;
    use crate::cache::MemoryCache;
    use crate::db::repositories::{
        SqlxCategoryRepository, SqlxPostRepository, SqlxSessionRepository, SqlxTagRepository,
        SqlxUserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::CreateUserInput;
    use crate::services::{SessionPolicy, TagService};
    use chrono::Duration;

    async fn setup(author_username: &str) -> (Publisher, Arc<UserService>) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let cache = Arc::new(MemoryCache::new());
        let post_repo = SqlxPostRepository::boxed(pool.clone());
        let category_repo = SqlxCategoryRepository::boxed(pool.clone());
        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let tags = Arc::new(TagService::new(
            SqlxTagRepository::boxed(pool.clone()),
            post_repo.clone(),
            cache.clone(),
        ));
        let posts = Arc::new(PostService::new(
            post_repo,
            category_repo.clone(),
            user_repo.clone(),
            tags,
            cache.clone(),
        ));
        let categories = Arc::new(CategoryService::new(category_repo, cache));
        let users = Arc::new(UserService::new(
            user_repo,
            SqlxSessionRepository::boxed(pool),
            SessionPolicy {
                lifetime: Duration::hours(24),
                remember_lifetime: Duration::days(30),
                max_active: 5,
            },
        ));
        (
            Publisher::new(posts, categories, users.clone(), author_username),
            users,
        )
    }

    fn user(name: &str) -> CreateUserInput {
        CreateUserInput {
            username: name.to_string(),
            email: format!("{name}@example.com"),
            password: "password123".to_string(),
            first_name: None,
            last_name: None,
        }
    }

    #[tokio::test]
    async fn test_publish_creates_post_category_and_tags() {
        let (publisher, users) = setup("admin").await;
        let admin = users.register(user("admin")).await.unwrap();

        let detail = publisher.publish(&sample_result(0.9, 0.95, 0.1, 0)).await.unwrap();
        assert_eq!(detail.post.author_id, admin.id);
        assert!(detail.post.is_published);
        assert!(detail.post.ai_generated);
        assert_eq!(detail.category.as_ref().map(|c| c.name.as_str()), Some("science"));
        assert_eq!(detail.tags.len(), 2);

        let metadata = detail.post.validation_metadata.unwrap();
        assert_eq!(metadata["ai_generated"], true);
        assert_eq!(metadata["status"], "approved");

        // The category is reused on the next publish
        let second = publisher.publish(&sample_result(0.9, 0.95, 0.1, 0)).await.unwrap();
        assert_eq!(second.post.category_id, detail.post.category_id);
        assert_ne!(second.post.slug, detail.post.slug);
    }

    #[tokio::test]
    async fn test_falls_back_to_first_admin() {
        let (publisher, users) = setup("ghost").await;
        let root = users.register(user("root")).await.unwrap();
        let detail = publisher.publish(&sample_result(0.9, 0.95, 0.1, 0)).await.unwrap();
        assert_eq!(detail.post.author_id, root.id);
    }

    #[tokio::test]
    async fn test_no_author_available() {
        let (publisher, _users) = setup("admin").await;
        assert!(matches!(
            publisher.publish(&sample_result(0.9, 0.95, 0.1, 0)).await,
            Err(PublishError::NoAuthor)
        ));
    }
}
