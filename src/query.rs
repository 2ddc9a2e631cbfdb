use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

/// PostSource
///
/// The base collection a listing starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostSource {
    All,
    Author(Uuid),
    Category(i64),
    Single(i64),
}

/// PostQuery
///
/// Describes a post listing: which posts, whether the public-visibility filter
/// applies, and whether each row carries its comment count. Renders to
/// parameterized SQL through `QueryBuilder`; every caller-supplied value is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostQuery {
    pub source: PostSource,
    pub visible_only: bool,
    pub with_comment_count: bool,
}

const POST_COLUMNS: &str = r#"
    SELECT
        p.id, p.title, p.text, p.pub_date, p.image, p.author_id,
        p.location_id, p.category_id, p.is_published, p.created_at,
        u.username AS author_username,
        c.title AS category_title,
        c.slug AS category_slug,
        c.is_published AS category_is_published,
        l.name AS location_name"#;

const COMMENT_COUNT_COLUMN: &str =
    ", (SELECT COUNT(*) FROM comments cm WHERE cm.post_id = p.id) AS comment_count";

const POST_JOINS: &str = r#"
    FROM posts p
    JOIN users u ON u.id = p.author_id
    LEFT JOIN categories c ON c.id = p.category_id
    LEFT JOIN locations l ON l.id = p.location_id"#;

impl PostQuery {
    /// Public listing defaults: visibility filter on, comment counts on.
    pub fn new(source: PostSource) -> Self {
        Self {
            source,
            visible_only: true,
            with_comment_count: true,
        }
    }

    pub fn visible_only(mut self, visible_only: bool) -> Self {
        self.visible_only = visible_only;
        self
    }

    pub fn with_comment_count(mut self, with_comment_count: bool) -> Self {
        self.with_comment_count = with_comment_count;
        self
    }

    /// `SELECT COUNT(*)` over the same filtered collection.
    pub fn count_sql(&self) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM posts p");
        builder.push(" LEFT JOIN categories c ON c.id = p.category_id");
        self.push_filters(&mut builder);
        builder
    }

    /// Page of rows ordered newest publication first.
    pub fn page_sql(&self, limit: i64, offset: i64) -> QueryBuilder<'static, Postgres> {
        let mut builder = self.select_sql();
        builder.push(" ORDER BY p.pub_date DESC, p.id DESC LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(offset);
        builder
    }

    /// Unordered, unpaginated select. Used for single-row lookups.
    pub fn select_sql(&self) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::new(POST_COLUMNS);
        if self.with_comment_count {
            builder.push(COMMENT_COUNT_COLUMN);
        }
        builder.push(POST_JOINS);
        self.push_filters(&mut builder);
        builder
    }

    fn push_filters(&self, builder: &mut QueryBuilder<'static, Postgres>) {
        builder.push(" WHERE TRUE");
        match self.source {
            PostSource::All => {}
            PostSource::Author(author_id) => {
                builder.push(" AND p.author_id = ");
                builder.push_bind(author_id);
            }
            PostSource::Category(category_id) => {
                builder.push(" AND p.category_id = ");
                builder.push_bind(category_id);
            }
            PostSource::Single(post_id) => {
                builder.push(" AND p.id = ");
                builder.push_bind(post_id);
            }
        }
        if self.visible_only {
            builder.push(
                " AND p.is_published = TRUE \
                 AND p.pub_date <= NOW() \
                 AND (p.category_id IS NULL OR c.is_published = TRUE)",
            );
        }
    }
}
