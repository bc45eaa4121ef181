//! Post service
//!
//! Implements business logic for posts:
//! - Public feeds (index, category, profile) built on `PostQuery::full_chain`
//! - The owner's own profile feed, which skips the visibility filter
//! - Detail lookup with the author bypass
//! - Author-only create/update/delete
//!
//! The current time is always passed in, so nothing here is cached.

use crate::db::query::PostQuery;
use crate::db::repositories::{CategoryRepository, LocationRepository, PostRepository};
use crate::models::{
    Category, ListParams, PagedResult, Post, PostInput, PostListItem, User, POSTS_PER_PAGE,
};
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Maximum length of a post title
pub const TITLE_MAX_LEN: usize = 256;

/// Error types for post service operations
#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    /// Post does not exist or is not visible to the viewer
    #[error("Post not found: {0}")]
    NotFound(i64),

    /// Viewer is not the post's author
    #[error("User is not the author of post {post_id}")]
    NotAuthor { post_id: i64 },

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Whether `viewer` may see the post at `now`
///
/// Published posts are visible to everybody. Otherwise only the post's own
/// author gets through; being an administrator does not help.
pub fn can_view(item: &PostListItem, viewer: Option<&User>, now: DateTime<Utc>) -> bool {
    item.is_visible_at(now) || viewer.is_some_and(|user| user.is_author_of(item.post.author_id))
}

/// Post service
pub struct PostService {
    post_repo: Arc<dyn PostRepository>,
    category_repo: Arc<dyn CategoryRepository>,
    location_repo: Arc<dyn LocationRepository>,
    per_page: u32,
}

impl PostService {
    /// Create a new post service with the default page size
    pub fn new(
        post_repo: Arc<dyn PostRepository>,
        category_repo: Arc<dyn CategoryRepository>,
        location_repo: Arc<dyn LocationRepository>,
    ) -> Self {
        Self {
            post_repo,
            category_repo,
            location_repo,
            per_page: POSTS_PER_PAGE,
        }
    }

    /// Posts per feed page
    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// Home page feed
    pub async fn index_feed(
        &self,
        now: DateTime<Utc>,
        raw_page: Option<&str>,
    ) -> Result<PagedResult<PostListItem>, PostServiceError> {
        self.paginate(PostQuery::full_chain(now), raw_page).await
    }

    /// Feed of one (published) category
    pub async fn category_feed(
        &self,
        category: &Category,
        now: DateTime<Utc>,
        raw_page: Option<&str>,
    ) -> Result<PagedResult<PostListItem>, PostServiceError> {
        let query = PostQuery::full_chain(now).in_category(category.id);
        self.paginate(query, raw_page).await
    }

    /// Posts on a profile page
    ///
    /// The owner sees every post they wrote, including drafts and scheduled
    /// ones; everybody else sees the public full chain.
    pub async fn profile_feed(
        &self,
        profile: &User,
        viewer: Option<&User>,
        now: DateTime<Utc>,
        raw_page: Option<&str>,
    ) -> Result<PagedResult<PostListItem>, PostServiceError> {
        let is_owner = viewer.is_some_and(|user| user.id == profile.id);
        let query = if is_owner {
            PostQuery::new()
                .by_author(profile.id)
                .with_relations()
                .with_comment_count()
        } else {
            PostQuery::full_chain(now).by_author(profile.id)
        };
        self.paginate(query, raw_page).await
    }

    async fn paginate(
        &self,
        query: PostQuery,
        raw_page: Option<&str>,
    ) -> Result<PagedResult<PostListItem>, PostServiceError> {
        let total = self.post_repo.count(&query).await.context("Failed to count posts")?;
        let params = ListParams::resolve(raw_page, total, self.per_page);
        let items = self
            .post_repo
            .find(&query, Some(&params))
            .await
            .context("Failed to list posts")?;

        Ok(PagedResult::new(items, total, &params))
    }

    /// A single post with its relations, if `viewer` may see it
    pub async fn detail(
        &self,
        id: i64,
        viewer: Option<&User>,
        now: DateTime<Utc>,
    ) -> Result<PostListItem, PostServiceError> {
        let query = PostQuery::new().by_id(id).with_relations().with_comment_count();
        let item = self
            .post_repo
            .find(&query, None)
            .await
            .context("Failed to get post")?
            .into_iter()
            .next()
            .ok_or(PostServiceError::NotFound(id))?;

        if !can_view(&item, viewer, now) {
            return Err(PostServiceError::NotFound(id));
        }
        Ok(item)
    }

    /// Get a post regardless of visibility
    pub async fn get(&self, id: i64) -> Result<Post, PostServiceError> {
        self.post_repo
            .get_by_id(id)
            .await
            .context("Failed to get post")?
            .ok_or(PostServiceError::NotFound(id))
    }

    /// Get a post the user is about to change
    ///
    /// # Errors
    /// - `NotFound` if the post doesn't exist
    /// - `NotAuthor` if `user` did not write it
    pub async fn get_for_author(&self, id: i64, user: &User) -> Result<Post, PostServiceError> {
        let post = self.get(id).await?;
        if !user.is_author_of(post.author_id) {
            return Err(PostServiceError::NotAuthor { post_id: id });
        }
        Ok(post)
    }

    /// Create a post owned by `author`
    pub async fn create(&self, author: &User, input: PostInput) -> Result<Post, PostServiceError> {
        self.validate(&input).await?;

        let post = self
            .post_repo
            .create(author.id, &input)
            .await
            .context("Failed to create post")?;

        tracing::info!(post_id = post.id, author_id = author.id, "Post created");
        Ok(post)
    }

    /// Replace the editable fields of a post written by `user`
    pub async fn update(&self, id: i64, user: &User, input: PostInput) -> Result<Post, PostServiceError> {
        self.get_for_author(id, user).await?;
        self.validate(&input).await?;

        let post = self
            .post_repo
            .update(id, &input)
            .await
            .context("Failed to update post")?;

        Ok(post)
    }

    /// Delete a post written by `user`, returning what was deleted
    pub async fn delete(&self, id: i64, user: &User) -> Result<Post, PostServiceError> {
        let post = self.get_for_author(id, user).await?;

        self.post_repo.delete(id).await.context("Failed to delete post")?;

        tracing::info!(post_id = id, author_id = user.id, "Post deleted");
        Ok(post)
    }

    async fn validate(&self, input: &PostInput) -> Result<(), PostServiceError> {
        if input.title.trim().is_empty() {
            return Err(PostServiceError::ValidationError("Title cannot be empty".to_string()));
        }
        if input.title.chars().count() > TITLE_MAX_LEN {
            return Err(PostServiceError::ValidationError(format!(
                "Title cannot exceed {} characters",
                TITLE_MAX_LEN
            )));
        }
        if input.text.trim().is_empty() {
            return Err(PostServiceError::ValidationError("Text cannot be empty".to_string()));
        }

        let category_id = input
            .category_id
            .ok_or_else(|| PostServiceError::ValidationError("Category is required".to_string()))?;
        if self
            .category_repo
            .get_by_id(category_id)
            .await
            .context("Failed to check category")?
            .is_none()
        {
            return Err(PostServiceError::ValidationError(format!(
                "Category {} does not exist",
                category_id
            )));
        }

        if let Some(location_id) = input.location_id {
            if self
                .location_repo
                .get_by_id(location_id)
                .await
                .context("Failed to check location")?
                .is_none()
            {
                return Err(PostServiceError::ValidationError(format!(
                    "Location {} does not exist",
                    location_id
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxCategoryRepository, SqlxLocationRepository, SqlxPostRepository, SqlxUserRepository,
        UserRepository,
    };
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{Location, UserRole};
    use chrono::Duration;

    struct Fixture {
        pool: DynDatabasePool,
        service: PostService,
        author: User,
        reader: User,
        admin: User,
        category: Category,
        hidden_category: Category,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let users = SqlxUserRepository::new(pool.clone());
        let admin = users
            .create(&User::new("admin".into(), "h".into(), UserRole::Admin))
            .await
            .unwrap();
        let author = users
            .create(&User::new("author".into(), "h".into(), UserRole::Author))
            .await
            .unwrap();
        let reader = users
            .create(&User::new("reader".into(), "h".into(), UserRole::Author))
            .await
            .unwrap();

        let categories = SqlxCategoryRepository::boxed(pool.clone());
        let category = categories
            .create(&Category::new("Travel".into(), String::new(), "travel".into()))
            .await
            .unwrap();
        let mut hidden = Category::new("Secret".into(), String::new(), "secret".into());
        hidden.is_published = false;
        let hidden_category = categories.create(&hidden).await.unwrap();

        let service = PostService::new(
            SqlxPostRepository::boxed(pool.clone()),
            categories,
            SqlxLocationRepository::boxed(pool.clone()),
        );

        Fixture {
            pool,
            service,
            author,
            reader,
            admin,
            category,
            hidden_category,
        }
    }

    fn input(title: &str, pub_date: DateTime<Utc>, category_id: i64) -> PostInput {
        PostInput {
            title: title.to_string(),
            text: "Body".to_string(),
            pub_date,
            category_id: Some(category_id),
            location_id: None,
            image: None,
            is_published: true,
        }
    }

    fn titles(page: &PagedResult<PostListItem>) -> Vec<String> {
        page.items.iter().map(|i| i.post.title.clone()).collect()
    }

    /// One visible post plus one post hidden by each rule
    async fn seed_mixed(f: &Fixture, now: DateTime<Utc>) {
        let past = now - Duration::hours(1);
        let s = &f.service;
        s.create(&f.author, input("visible", past, f.category.id)).await.unwrap();

        let mut draft = input("draft", past, f.category.id);
        draft.is_published = false;
        s.create(&f.author, draft).await.unwrap();

        s.create(&f.author, input("scheduled", now + Duration::days(1), f.category.id))
            .await
            .unwrap();
        s.create(&f.author, input("hidden category", past, f.hidden_category.id))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_public_feeds_show_only_published_posts() {
        let f = setup().await;
        let now = Utc::now();
        seed_mixed(&f, now).await;

        let index = f.service.index_feed(now, None).await.unwrap();
        assert_eq!(titles(&index), vec!["visible"]);
        assert_eq!(index.items[0].comment_count, Some(0));
        assert_eq!(index.items[0].author.as_ref().unwrap().username, "author");

        let category = f.service.category_feed(&f.category, now, None).await.unwrap();
        assert_eq!(titles(&category), vec!["visible"]);

        let profile = f
            .service
            .profile_feed(&f.author, Some(&f.reader), now, None)
            .await
            .unwrap();
        assert_eq!(titles(&profile), vec!["visible"]);

        let anonymous = f.service.profile_feed(&f.author, None, now, None).await.unwrap();
        assert_eq!(titles(&anonymous), vec!["visible"]);
    }

    #[tokio::test]
    async fn test_owner_profile_shows_everything() {
        let f = setup().await;
        let now = Utc::now();
        seed_mixed(&f, now).await;

        let own = f
            .service
            .profile_feed(&f.author, Some(&f.author), now, None)
            .await
            .unwrap();

        assert_eq!(own.total, 4);
        assert_eq!(titles(&own)[0], "scheduled");
        assert!(own.items.iter().all(|i| i.comment_count == Some(0)));
    }

    #[tokio::test]
    async fn test_feed_pagination_clamps() {
        let f = setup().await;
        let now = Utc::now();
        for i in 0..23 {
            let title = format!("post {:02}", i);
            f.service
                .create(&f.author, input(&title, now - Duration::minutes(i), f.category.id))
                .await
                .unwrap();
        }

        let first = f.service.index_feed(now, Some("oops")).await.unwrap();
        assert_eq!(first.page, 1);
        assert_eq!(first.items.len(), 10);
        assert_eq!(first.total_pages, 3);
        assert_eq!(titles(&first)[0], "post 00");

        let last = f.service.index_feed(now, Some("99")).await.unwrap();
        assert_eq!(last.page, 3);
        assert_eq!(last.items.len(), 3);
        assert!(!last.has_next);

        let low = f.service.index_feed(now, Some("-1")).await.unwrap();
        assert_eq!(low.page, 1);
    }

    #[tokio::test]
    async fn test_empty_feed_has_one_page() {
        let f = setup().await;
        let feed = f.service.index_feed(Utc::now(), Some("5")).await.unwrap();
        assert_eq!(feed.page, 1);
        assert_eq!(feed.total_pages, 1);
        assert!(feed.is_empty());
    }

    #[tokio::test]
    async fn test_detail_author_bypass_is_strict() {
        let f = setup().await;
        let now = Utc::now();
        let mut draft = input("draft", now - Duration::hours(1), f.category.id);
        draft.is_published = false;
        let post = f.service.create(&f.author, draft).await.unwrap();

        let item = f.service.detail(post.id, Some(&f.author), now).await.unwrap();
        assert_eq!(item.post.title, "draft");
        assert_eq!(item.category.as_ref().unwrap().slug, "travel");

        for viewer in [Some(&f.reader), Some(&f.admin), None] {
            assert!(matches!(
                f.service.detail(post.id, viewer, now).await,
                Err(PostServiceError::NotFound(_))
            ));
        }
        assert!(matches!(
            f.service.detail(post.id + 100, Some(&f.author), now).await,
            Err(PostServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_scheduled_post_becomes_visible() {
        let f = setup().await;
        let now = Utc::now();
        let post = f
            .service
            .create(&f.author, input("soon", now + Duration::hours(2), f.category.id))
            .await
            .unwrap();

        assert!(f.service.detail(post.id, None, now).await.is_err());
        assert!(f.service.detail(post.id, None, now + Duration::hours(3)).await.is_ok());
    }

    #[tokio::test]
    async fn test_only_author_can_change_post() {
        let f = setup().await;
        let now = Utc::now();
        let post = f
            .service
            .create(&f.author, input("mine", now, f.category.id))
            .await
            .unwrap();

        for intruder in [&f.reader, &f.admin] {
            let result = f
                .service
                .update(post.id, intruder, input("stolen", now, f.category.id))
                .await;
            assert!(matches!(result, Err(PostServiceError::NotAuthor { post_id }) if post_id == post.id));

            let result = f.service.delete(post.id, intruder).await;
            assert!(matches!(result, Err(PostServiceError::NotAuthor { .. })));
        }
        assert_eq!(f.service.get(post.id).await.unwrap().title, "mine");

        let updated = f
            .service
            .update(post.id, &f.author, input("edited", now, f.category.id))
            .await
            .unwrap();
        assert_eq!(updated.title, "edited");

        f.service.delete(post.id, &f.author).await.unwrap();
        assert!(matches!(
            f.service.get(post.id).await,
            Err(PostServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_create_validation() {
        let f = setup().await;
        let now = Utc::now();

        let mut blank = input("  ", now, f.category.id);
        assert!(matches!(
            f.service.create(&f.author, blank.clone()).await,
            Err(PostServiceError::ValidationError(_))
        ));

        blank.title = "ok".into();
        blank.category_id = None;
        assert!(matches!(
            f.service.create(&f.author, blank.clone()).await,
            Err(PostServiceError::ValidationError(_))
        ));

        blank.category_id = Some(9999);
        assert!(matches!(
            f.service.create(&f.author, blank.clone()).await,
            Err(PostServiceError::ValidationError(_))
        ));

        blank.category_id = Some(f.category.id);
        blank.location_id = Some(9999);
        assert!(matches!(
            f.service.create(&f.author, blank).await,
            Err(PostServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_location_is_joined() {
        let f = setup().await;
        let now = Utc::now();
        let location = SqlxLocationRepository::new(f.pool.clone())
            .create(&Location::new("Island".into()))
            .await
            .unwrap();

        let mut data = input("trip", now - Duration::minutes(1), f.category.id);
        data.location_id = Some(location.id);
        let post = f.service.create(&f.author, data).await.unwrap();

        let item = f.service.detail(post.id, None, now).await.unwrap();
        assert_eq!(item.location.unwrap().name, "Island");
    }

    #[test]
    fn test_can_view_without_category() {
        let now = Utc::now();
        let mut viewer = User::new("v".into(), "h".into(), UserRole::Author);
        viewer.id = 2;
        let item = PostListItem {
            post: Post {
                id: 1,
                title: "T".into(),
                text: "X".into(),
                pub_date: now,
                author_id: 1,
                location_id: None,
                category_id: None,
                image: None,
                is_published: false,
                created_at: now,
            },
            author: None,
            category: None,
            location: None,
            comment_count: None,
        };

        assert!(!can_view(&item, Some(&viewer), now));
        viewer.id = 1;
        assert!(can_view(&item, Some(&viewer), now));
    }
}
