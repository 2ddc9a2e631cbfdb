use crate::{
    forms::{CategoryInput, LocationInput, PostInput, ProfileInput},
    models::{Category, Comment, Location, Post, User},
    query::{PostQuery, PostSource},
};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

pub type RepoResult<T> = Result<T, sqlx::Error>;

/// Repository Trait
///
/// Abstract contract for all persistence operations, so handlers can run against
/// Postgres in production and an in-memory implementation in tests.
///
/// Owner-scoped mutations take the acting user's id and only touch rows that user
/// owns; they report `None`/`false` when nothing matched.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    async fn create_user(&self, user: User) -> RepoResult<User>;
    async fn update_profile(&self, id: Uuid, profile: ProfileInput) -> RepoResult<Option<User>>;

    // --- Categories ---
    // Only published categories are reachable by slug.
    async fn get_published_category(&self, slug: &str) -> RepoResult<Option<Category>>;
    async fn get_category(&self, id: i64) -> RepoResult<Option<Category>>;
    async fn list_categories(&self) -> RepoResult<Vec<Category>>;
    async fn create_category(&self, category: CategoryInput) -> RepoResult<Category>;
    async fn set_category_published(&self, id: i64, is_published: bool)
    -> RepoResult<Option<Category>>;
    // Posts of a deleted category keep existing with the category unset.
    async fn delete_category(&self, id: i64) -> RepoResult<bool>;

    // --- Locations ---
    async fn get_location(&self, id: i64) -> RepoResult<Option<Location>>;
    async fn list_locations(&self) -> RepoResult<Vec<Location>>;
    async fn create_location(&self, location: LocationInput) -> RepoResult<Location>;
    async fn set_location_published(&self, id: i64, is_published: bool)
    -> RepoResult<Option<Location>>;
    async fn delete_location(&self, id: i64) -> RepoResult<bool>;

    // --- Posts ---
    async fn count_posts(&self, query: PostQuery) -> RepoResult<i64>;
    async fn list_posts(&self, query: PostQuery, limit: i64, offset: i64)
    -> RepoResult<Vec<Post>>;
    // Unfiltered lookup with joined columns; visibility is decided by the caller.
    async fn get_post(&self, id: i64) -> RepoResult<Option<Post>>;
    async fn create_post(&self, author_id: Uuid, post: PostInput) -> RepoResult<Post>;
    async fn update_post(&self, id: i64, author_id: Uuid, post: PostInput)
    -> RepoResult<Option<Post>>;
    // Comments of a deleted post are deleted with it.
    async fn delete_post(&self, id: i64, author_id: Uuid) -> RepoResult<bool>;
    async fn set_post_published(&self, id: i64, is_published: bool) -> RepoResult<Option<Post>>;

    // --- Comments ---
    async fn get_comments(&self, post_id: i64) -> RepoResult<Vec<Comment>>;
    async fn get_comment(&self, id: i64) -> RepoResult<Option<Comment>>;
    async fn add_comment(&self, post_id: i64, author_id: Uuid, text: String)
    -> RepoResult<Comment>;
    async fn update_comment(&self, id: i64, author_id: Uuid, text: String)
    -> RepoResult<Option<Comment>>;
    async fn delete_comment(&self, id: i64, author_id: Uuid) -> RepoResult<bool>;
}

/// RepositoryState
///
/// The shared handle to the persistence layer stored in `AppState`.
pub type RepositoryState = Arc<dyn Repository>;

const USER_COLUMNS: &str = "id, username, first_name, last_name, email, role, created_at";
const CATEGORY_COLUMNS: &str = "id, title, description, slug, is_published, created_at";
const LOCATION_COLUMNS: &str = "id, name, is_published, created_at";

/// PostgresRepository
///
/// The `Repository` backed by PostgreSQL. Referential behaviour on delete (cascade
/// vs. set-null) is enforced by the schema's foreign keys.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
    }

    async fn create_user(&self, user: User) -> RepoResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, username, first_name, last_name, email, role) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {USER_COLUMNS}"
        ))
        .bind(user.id)
        .bind(user.username)
        .bind(user.first_name)
        .bind(user.last_name)
        .bind(user.email)
        .bind(user.role)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_profile(&self, id: Uuid, profile: ProfileInput) -> RepoResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET username = $2, first_name = $3, last_name = $4, email = $5 \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(profile.username)
        .bind(profile.first_name)
        .bind(profile.last_name)
        .bind(profile.email)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_published_category(&self, slug: &str) -> RepoResult<Option<Category>> {
        sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE slug = $1 AND is_published = TRUE"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_category(&self, id: i64) -> RepoResult<Option<Category>> {
        sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY title"
        ))
        .fetch_all(&self.pool)
        .await
    }

    async fn create_category(&self, category: CategoryInput) -> RepoResult<Category> {
        sqlx::query_as::<_, Category>(&format!(
            "INSERT INTO categories (title, description, slug, is_published) \
             VALUES ($1, $2, $3, $4) RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(category.title)
        .bind(category.description)
        .bind(category.slug)
        .bind(category.is_published)
        .fetch_one(&self.pool)
        .await
    }

    async fn set_category_published(
        &self,
        id: i64,
        is_published: bool,
    ) -> RepoResult<Option<Category>> {
        sqlx::query_as::<_, Category>(&format!(
            "UPDATE categories SET is_published = $2 WHERE id = $1 RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(id)
        .bind(is_published)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_category(&self, id: i64) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_location(&self, id: i64) -> RepoResult<Option<Location>> {
        sqlx::query_as::<_, Location>(&format!(
            "SELECT {LOCATION_COLUMNS} FROM locations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn list_locations(&self) -> RepoResult<Vec<Location>> {
        sqlx::query_as::<_, Location>(&format!(
            "SELECT {LOCATION_COLUMNS} FROM locations ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await
    }

    async fn create_location(&self, location: LocationInput) -> RepoResult<Location> {
        sqlx::query_as::<_, Location>(&format!(
            "INSERT INTO locations (name, is_published) VALUES ($1, $2) \
             RETURNING {LOCATION_COLUMNS}"
        ))
        .bind(location.name)
        .bind(location.is_published)
        .fetch_one(&self.pool)
        .await
    }

    async fn set_location_published(
        &self,
        id: i64,
        is_published: bool,
    ) -> RepoResult<Option<Location>> {
        sqlx::query_as::<_, Location>(&format!(
            "UPDATE locations SET is_published = $2 WHERE id = $1 RETURNING {LOCATION_COLUMNS}"
        ))
        .bind(id)
        .bind(is_published)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_location(&self, id: i64) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM locations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// count_posts
    ///
    /// Size of the filtered collection, used to resolve the requested page.
    async fn count_posts(&self, query: PostQuery) -> RepoResult<i64> {
        let mut builder = query.count_sql();
        builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
    }

    async fn list_posts(
        &self,
        query: PostQuery,
        limit: i64,
        offset: i64,
    ) -> RepoResult<Vec<Post>> {
        let mut builder = query.page_sql(limit, offset);
        builder
            .build_query_as::<Post>()
            .fetch_all(&self.pool)
            .await
    }

    async fn get_post(&self, id: i64) -> RepoResult<Option<Post>> {
        let query = PostQuery::new(PostSource::Single(id)).visible_only(false);
        let mut builder = query.select_sql();
        builder
            .build_query_as::<Post>()
            .fetch_optional(&self.pool)
            .await
    }

    async fn create_post(&self, author_id: Uuid, post: PostInput) -> RepoResult<Post> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO posts \
                 (title, text, pub_date, image, author_id, location_id, category_id, is_published) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING id",
        )
        .bind(post.title)
        .bind(post.text)
        .bind(post.pub_date)
        .bind(post.image)
        .bind(author_id)
        .bind(post.location_id)
        .bind(post.category_id)
        .bind(post.is_published)
        .fetch_one(&self.pool)
        .await?;

        self.get_post(id).await?.ok_or(sqlx::Error::RowNotFound)
    }

    /// update_post
    ///
    /// Replaces every editable field, scoped to the author. The author and creation
    /// time never change.
    async fn update_post(
        &self,
        id: i64,
        author_id: Uuid,
        post: PostInput,
    ) -> RepoResult<Option<Post>> {
        let updated = sqlx::query(
            "UPDATE posts SET title = $3, text = $4, pub_date = $5, image = $6, \
                 location_id = $7, category_id = $8, is_published = $9 \
             WHERE id = $1 AND author_id = $2",
        )
        .bind(id)
        .bind(author_id)
        .bind(post.title)
        .bind(post.text)
        .bind(post.pub_date)
        .bind(post.image)
        .bind(post.location_id)
        .bind(post.category_id)
        .bind(post.is_published)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_post(id).await
    }

    async fn delete_post(&self, id: i64, author_id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1 AND author_id = $2")
            .bind(id)
            .bind(author_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_post_published(&self, id: i64, is_published: bool) -> RepoResult<Option<Post>> {
        let updated = sqlx::query("UPDATE posts SET is_published = $2 WHERE id = $1")
            .bind(id)
            .bind(is_published)
            .execute(&self.pool)
            .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_post(id).await
    }

    async fn get_comments(&self, post_id: i64) -> RepoResult<Vec<Comment>> {
        sqlx::query_as::<_, Comment>(
            r#"
            SELECT c.id, c.text, c.post_id, c.author_id, c.is_published, c.created_at,
                   u.username AS author_username
            FROM comments c
            JOIN users u ON u.id = c.author_id
            WHERE c.post_id = $1
            ORDER BY c.created_at ASC, c.id ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_comment(&self, id: i64) -> RepoResult<Option<Comment>> {
        sqlx::query_as::<_, Comment>(
            r#"
            SELECT c.id, c.text, c.post_id, c.author_id, c.is_published, c.created_at,
                   u.username AS author_username
            FROM comments c
            JOIN users u ON u.id = c.author_id
            WHERE c.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// add_comment
    ///
    /// Inserts the comment and joins the author's username in the same statement.
    async fn add_comment(
        &self,
        post_id: i64,
        author_id: Uuid,
        text: String,
    ) -> RepoResult<Comment> {
        sqlx::query_as::<_, Comment>(
            r#"
            WITH inserted AS (
                INSERT INTO comments (text, post_id, author_id)
                VALUES ($1, $2, $3)
                RETURNING id, text, post_id, author_id, is_published, created_at
            )
            SELECT i.id, i.text, i.post_id, i.author_id, i.is_published, i.created_at,
                   u.username AS author_username
            FROM inserted i JOIN users u ON u.id = i.author_id
            "#,
        )
        .bind(text)
        .bind(post_id)
        .bind(author_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_comment(
        &self,
        id: i64,
        author_id: Uuid,
        text: String,
    ) -> RepoResult<Option<Comment>> {
        sqlx::query_as::<_, Comment>(
            r#"
            WITH updated AS (
                UPDATE comments SET text = $3
                WHERE id = $1 AND author_id = $2
                RETURNING id, text, post_id, author_id, is_published, created_at
            )
            SELECT up.id, up.text, up.post_id, up.author_id, up.is_published, up.created_at,
                   u.username AS author_username
            FROM updated up JOIN users u ON u.id = up.author_id
            "#,
        )
        .bind(id)
        .bind(author_id)
        .bind(text)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_comment(&self, id: i64, author_id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1 AND author_id = $2")
            .bind(id)
            .bind(author_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
