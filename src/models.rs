use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::pagination::Page;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// Local mirror of an identity issued by the identity provider (`users` table).
/// Owns posts and comments.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct User {
    // Primary key, equal to the `sub` claim of the identity token.
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    // 'user' or 'admin'. Admins manage categories, locations and post visibility.
    pub role: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_USER: &str = "user";

/// Category
///
/// Thematic grouping of posts. Hiding a category hides every post filed under it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Category {
    pub id: i64,
    pub title: String,
    pub description: String,
    // Unique, URL-safe identifier used in `/category/{slug}/`.
    pub slug: String,
    pub is_published: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Location
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Location {
    pub id: i64,
    pub name: String,
    pub is_published: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Post
///
/// A publication row from `posts`, augmented with the joined author, category and
/// location columns the listing queries select. Those joined fields fall back to
/// their defaults when a statement (e.g. `INSERT ... RETURNING`) does not select them.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub text: String,
    // May lie in the future: the post stays hidden until then (scheduled post).
    #[ts(type = "string")]
    pub pub_date: DateTime<Utc>,
    // Object-storage key of the attached image.
    pub image: Option<String>,
    pub author_id: Uuid,
    pub location_id: Option<i64>,
    pub category_id: Option<i64>,
    pub is_published: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,

    // --- Joined columns ---
    #[sqlx(default)]
    pub author_username: String,
    #[sqlx(default)]
    pub category_title: Option<String>,
    #[sqlx(default)]
    pub category_slug: Option<String>,
    #[sqlx(default)]
    pub category_is_published: Option<bool>,
    #[sqlx(default)]
    pub location_name: Option<String>,
    // Present only when the listing was annotated with comment counts.
    #[sqlx(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_count: Option<i64>,
}

impl Post {
    /// Whether an anonymous reader may see this post at `now`.
    ///
    /// Requires the post itself to be published and due, and its category (when one
    /// is set) to be published. Relies on `category_is_published` having been joined.
    pub fn is_visible_at(&self, now: DateTime<Utc>) -> bool {
        self.is_published
            && self.pub_date <= now
            && (self.category_id.is_none() || self.category_is_published == Some(true))
    }
}

/// Comment
///
/// A row from `comments` joined with the author's username. Comments are always
/// listed oldest first.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Comment {
    pub id: i64,
    pub text: String,
    pub post_id: i64,
    pub author_id: Uuid,
    pub is_published: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[sqlx(default)]
    pub author_username: String,
}

// --- Media ---

/// PresignedUrlRequest
///
/// Input payload for requesting a short-lived upload URL for a post image.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlRequest {
    /// The original filename, used to derive the file extension.
    #[schema(example = "sunset.jpg")]
    pub filename: String,
    /// The MIME type the upload is constrained to. Must be an image type.
    #[schema(example = "image/jpeg")]
    pub file_type: String,
}

/// PresignedUrlResponse
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlResponse {
    /// The time-limited URL for the PUT request.
    pub upload_url: String,
    /// The object key to submit as the post's `image` field.
    pub resource_key: String,
}

// --- Page Schemas (Output) ---

/// Listing page: index.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PostListPage {
    pub page_obj: Page<Post>,
}

/// Listing page for one published category.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CategoryPage {
    pub category: Category,
    pub page_obj: Page<Post>,
}

/// Detail page of one post with its comments, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PostDetailPage {
    pub post: Post,
    pub comments: Vec<Comment>,
}

/// Profile page: the user and their posts. Hidden and scheduled posts are only
/// included when the profile owner is the viewer.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProfilePage {
    pub profile: User,
    pub page_obj: Page<Post>,
}

/// Confirmation page shown before a post is deleted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeletePostPage {
    pub post: Post,
}

/// Confirmation page shown before a comment is deleted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteCommentPage {
    pub comment: Comment,
}
