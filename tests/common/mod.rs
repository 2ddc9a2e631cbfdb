#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use blogicum::{
    AppState,
    config::AppConfig,
    forms::{CategoryInput, LocationInput, PostInput, ProfileInput},
    models::{Category, Comment, Location, Post, ROLE_ADMIN, ROLE_USER, User},
    query::{PostQuery, PostSource},
    repository::{RepoResult, Repository},
    storage::MockStorageService,
};
use chrono::{Duration, Utc};
use serde_json::Value;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};
use tower::ServiceExt;
use uuid::Uuid;

// --- IN-MEMORY REPOSITORY ---

// Mirrors the Postgres schema's behaviour: deleting a category or location unsets
// it on posts, deleting a post or user removes what hangs off it.
#[derive(Default)]
struct Store {
    users: Vec<User>,
    categories: Vec<Category>,
    locations: Vec<Location>,
    posts: Vec<Post>,
    comments: Vec<Comment>,
    next_id: i64,
}

impl Store {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Fills the columns the SQL listing joins in.
    fn joined(&self, post: &Post) -> Post {
        let mut post = post.clone();
        post.author_username = self
            .users
            .iter()
            .find(|u| u.id == post.author_id)
            .map(|u| u.username.clone())
            .unwrap_or_default();
        let category = post
            .category_id
            .and_then(|id| self.categories.iter().find(|c| c.id == id));
        post.category_title = category.map(|c| c.title.clone());
        post.category_slug = category.map(|c| c.slug.clone());
        post.category_is_published = category.map(|c| c.is_published);
        post.location_name = post
            .location_id
            .and_then(|id| self.locations.iter().find(|l| l.id == id))
            .map(|l| l.name.clone());
        post
    }

    fn comment_with_author(&self, comment: &Comment) -> Comment {
        let mut comment = comment.clone();
        comment.author_username = self
            .users
            .iter()
            .find(|u| u.id == comment.author_id)
            .map(|u| u.username.clone())
            .unwrap_or_default();
        comment
    }

    fn matching(&self, query: PostQuery) -> Vec<Post> {
        let now = Utc::now();
        let mut posts: Vec<Post> = self
            .posts
            .iter()
            .filter(|p| match query.source {
                PostSource::All => true,
                PostSource::Author(author_id) => p.author_id == author_id,
                PostSource::Category(category_id) => p.category_id == Some(category_id),
                PostSource::Single(id) => p.id == id,
            })
            .map(|p| self.joined(p))
            .filter(|p| !query.visible_only || p.is_visible_at(now))
            .collect();
        posts.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));
        if query.with_comment_count {
            for post in &mut posts {
                let count = self.comments.iter().filter(|c| c.post_id == post.id).count();
                post.comment_count = Some(count as i64);
            }
        }
        posts
    }
}

#[derive(Default)]
pub struct InMemoryRepo {
    store: Mutex<Store>,
    /// When set, reading a user by id and creating a user fail like a lost connection.
    users_unavailable: AtomicBool,
}

impl InMemoryRepo {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    // --- Seeding helpers ---

    pub fn seed_user(&self, username: &str) -> User {
        self.seed_user_with_role(username, ROLE_USER)
    }

    pub fn seed_admin(&self, username: &str) -> User {
        self.seed_user_with_role(username, ROLE_ADMIN)
    }

    fn seed_user_with_role(&self, username: &str, role: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: format!("{username}@example.com"),
            role: role.to_string(),
            created_at: Utc::now(),
            ..User::default()
        };
        self.store.lock().unwrap().users.push(user.clone());
        user
    }

    pub fn seed_category(&self, slug: &str, is_published: bool) -> Category {
        let mut store = self.store.lock().unwrap();
        let category = Category {
            id: store.next_id(),
            title: format!("Category {slug}"),
            description: "About things".to_string(),
            slug: slug.to_string(),
            is_published,
            created_at: Utc::now(),
        };
        store.categories.push(category.clone());
        category
    }

    pub fn seed_location(&self, name: &str) -> Location {
        let mut store = self.store.lock().unwrap();
        let location = Location {
            id: store.next_id(),
            name: name.to_string(),
            is_published: true,
            created_at: Utc::now(),
        };
        store.locations.push(location.clone());
        location
    }

    /// A published post in `category`, dated `age` before now (negative for the future).
    pub fn seed_post(&self, author: &User, category: &Category, age: Duration) -> Post {
        let mut store = self.store.lock().unwrap();
        let post = Post {
            id: store.next_id(),
            title: "A post".to_string(),
            text: "Some text".to_string(),
            pub_date: Utc::now() - age,
            author_id: author.id,
            category_id: Some(category.id),
            is_published: true,
            created_at: Utc::now(),
            ..Post::default()
        };
        store.posts.push(post.clone());
        post
    }

    pub fn set_post_image(&self, post_id: i64, key: &str) {
        let mut store = self.store.lock().unwrap();
        if let Some(post) = store.posts.iter_mut().find(|p| p.id == post_id) {
            post.image = Some(key.to_string());
        }
    }

    pub fn seed_comment(&self, post: &Post, author: &User, text: &str) -> Comment {
        let mut store = self.store.lock().unwrap();
        let comment = Comment {
            id: store.next_id(),
            text: text.to_string(),
            post_id: post.id,
            author_id: author.id,
            is_published: true,
            created_at: Utc::now(),
            ..Comment::default()
        };
        store.comments.push(comment.clone());
        comment
    }

    pub fn stored_post(&self, id: i64) -> Option<Post> {
        let store = self.store.lock().unwrap();
        store.posts.iter().find(|p| p.id == id).cloned()
    }

    pub fn stored_comment(&self, id: i64) -> Option<Comment> {
        let store = self.store.lock().unwrap();
        store.comments.iter().find(|c| c.id == id).cloned()
    }

    pub fn post_count(&self) -> usize {
        self.store.lock().unwrap().posts.len()
    }

    pub fn fail_user_storage(&self) {
        self.users_unavailable.store(true, Ordering::SeqCst);
    }

    fn check_users_available(&self) -> RepoResult<()> {
        if self.users_unavailable.load(Ordering::SeqCst) {
            Err(sqlx::Error::PoolTimedOut)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Repository for InMemoryRepo {
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        self.check_users_available()?;
        let store = self.store.lock().unwrap();
        Ok(store.users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let store = self.store.lock().unwrap();
        Ok(store.users.iter().find(|u| u.username == username).cloned())
    }

    async fn create_user(&self, user: User) -> RepoResult<User> {
        self.check_users_available()?;
        self.store.lock().unwrap().users.push(user.clone());
        Ok(user)
    }

    async fn update_profile(&self, id: Uuid, profile: ProfileInput) -> RepoResult<Option<User>> {
        let mut store = self.store.lock().unwrap();
        Ok(store.users.iter_mut().find(|u| u.id == id).map(|user| {
            user.username = profile.username;
            user.first_name = profile.first_name;
            user.last_name = profile.last_name;
            user.email = profile.email;
            user.clone()
        }))
    }

    async fn get_published_category(&self, slug: &str) -> RepoResult<Option<Category>> {
        let store = self.store.lock().unwrap();
        Ok(store
            .categories
            .iter()
            .find(|c| c.slug == slug && c.is_published)
            .cloned())
    }

    async fn get_category(&self, id: i64) -> RepoResult<Option<Category>> {
        let store = self.store.lock().unwrap();
        Ok(store.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        Ok(self.store.lock().unwrap().categories.clone())
    }

    async fn create_category(&self, category: CategoryInput) -> RepoResult<Category> {
        let mut store = self.store.lock().unwrap();
        let category = Category {
            id: store.next_id(),
            title: category.title,
            description: category.description,
            slug: category.slug,
            is_published: category.is_published,
            created_at: Utc::now(),
        };
        store.categories.push(category.clone());
        Ok(category)
    }

    async fn set_category_published(
        &self,
        id: i64,
        is_published: bool,
    ) -> RepoResult<Option<Category>> {
        let mut store = self.store.lock().unwrap();
        Ok(store.categories.iter_mut().find(|c| c.id == id).map(|c| {
            c.is_published = is_published;
            c.clone()
        }))
    }

    async fn delete_category(&self, id: i64) -> RepoResult<bool> {
        let mut store = self.store.lock().unwrap();
        let before = store.categories.len();
        store.categories.retain(|c| c.id != id);
        for post in store.posts.iter_mut().filter(|p| p.category_id == Some(id)) {
            post.category_id = None;
        }
        Ok(store.categories.len() < before)
    }

    async fn get_location(&self, id: i64) -> RepoResult<Option<Location>> {
        let store = self.store.lock().unwrap();
        Ok(store.locations.iter().find(|l| l.id == id).cloned())
    }

    async fn list_locations(&self) -> RepoResult<Vec<Location>> {
        Ok(self.store.lock().unwrap().locations.clone())
    }

    async fn create_location(&self, location: LocationInput) -> RepoResult<Location> {
        let mut store = self.store.lock().unwrap();
        let location = Location {
            id: store.next_id(),
            name: location.name,
            is_published: location.is_published,
            created_at: Utc::now(),
        };
        store.locations.push(location.clone());
        Ok(location)
    }

    async fn set_location_published(
        &self,
        id: i64,
        is_published: bool,
    ) -> RepoResult<Option<Location>> {
        let mut store = self.store.lock().unwrap();
        Ok(store.locations.iter_mut().find(|l| l.id == id).map(|l| {
            l.is_published = is_published;
            l.clone()
        }))
    }

    async fn delete_location(&self, id: i64) -> RepoResult<bool> {
        let mut store = self.store.lock().unwrap();
        let before = store.locations.len();
        store.locations.retain(|l| l.id != id);
        for post in store.posts.iter_mut().filter(|p| p.location_id == Some(id)) {
            post.location_id = None;
        }
        Ok(store.locations.len() < before)
    }

    async fn count_posts(&self, query: PostQuery) -> RepoResult<i64> {
        Ok(self.store.lock().unwrap().matching(query).len() as i64)
    }

    async fn list_posts(&self, query: PostQuery, limit: i64, offset: i64) -> RepoResult<Vec<Post>> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .matching(query)
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn get_post(&self, id: i64) -> RepoResult<Option<Post>> {
        let store = self.store.lock().unwrap();
        Ok(store.posts.iter().find(|p| p.id == id).map(|p| store.joined(p)))
    }

    async fn create_post(&self, author_id: Uuid, post: PostInput) -> RepoResult<Post> {
        let mut store = self.store.lock().unwrap();
        let post = Post {
            id: store.next_id(),
            title: post.title,
            text: post.text,
            pub_date: post.pub_date,
            image: post.image,
            author_id,
            location_id: post.location_id,
            category_id: Some(post.category_id),
            is_published: post.is_published,
            created_at: Utc::now(),
            ..Post::default()
        };
        store.posts.push(post.clone());
        Ok(post)
    }

    async fn update_post(&self, id: i64, author_id: Uuid, input: PostInput) -> RepoResult<Option<Post>> {
        let mut store = self.store.lock().unwrap();
        Ok(store
            .posts
            .iter_mut()
            .find(|p| p.id == id && p.author_id == author_id)
            .map(|post| {
                post.title = input.title;
                post.text = input.text;
                post.pub_date = input.pub_date;
                post.image = input.image;
                post.location_id = input.location_id;
                post.category_id = Some(input.category_id);
                post.is_published = input.is_published;
                post.clone()
            }))
    }

    async fn delete_post(&self, id: i64, author_id: Uuid) -> RepoResult<bool> {
        let mut store = self.store.lock().unwrap();
        let before = store.posts.len();
        store.posts.retain(|p| !(p.id == id && p.author_id == author_id));
        let deleted = store.posts.len() < before;
        if deleted {
            store.comments.retain(|c| c.post_id != id);
        }
        Ok(deleted)
    }

    async fn set_post_published(&self, id: i64, is_published: bool) -> RepoResult<Option<Post>> {
        let mut store = self.store.lock().unwrap();
        if let Some(post) = store.posts.iter_mut().find(|p| p.id == id) {
            post.is_published = is_published;
        }
        Ok(store.posts.iter().find(|p| p.id == id).map(|p| store.joined(p)))
    }

    async fn get_comments(&self, post_id: i64) -> RepoResult<Vec<Comment>> {
        let store = self.store.lock().unwrap();
        let mut comments: Vec<Comment> = store
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .map(|c| store.comment_with_author(c))
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(comments)
    }

    async fn get_comment(&self, id: i64) -> RepoResult<Option<Comment>> {
        let store = self.store.lock().unwrap();
        Ok(store
            .comments
            .iter()
            .find(|c| c.id == id)
            .map(|c| store.comment_with_author(c)))
    }

    async fn add_comment(&self, post_id: i64, author_id: Uuid, text: String) -> RepoResult<Comment> {
        let mut store = self.store.lock().unwrap();
        let comment = Comment {
            id: store.next_id(),
            text,
            post_id,
            author_id,
            is_published: true,
            created_at: Utc::now(),
            ..Comment::default()
        };
        store.comments.push(comment.clone());
        Ok(comment)
    }

    async fn update_comment(
        &self,
        id: i64,
        author_id: Uuid,
        text: String,
    ) -> RepoResult<Option<Comment>> {
        let mut store = self.store.lock().unwrap();
        Ok(store
            .comments
            .iter_mut()
            .find(|c| c.id == id && c.author_id == author_id)
            .map(|c| {
                c.text = text;
                c.clone()
            }))
    }

    async fn delete_comment(&self, id: i64, author_id: Uuid) -> RepoResult<bool> {
        let mut store = self.store.lock().unwrap();
        let before = store.comments.len();
        store.comments.retain(|c| !(c.id == id && c.author_id == author_id));
        Ok(store.comments.len() < before)
    }
}

// --- TEST UTILITIES ---

pub fn test_state(repo: Arc<InMemoryRepo>, storage: MockStorageService) -> AppState {
    AppState {
        repo,
        storage: Arc::new(storage),
        config: AppConfig::default(),
    }
}

pub fn app(repo: Arc<InMemoryRepo>, storage: MockStorageService) -> Router {
    blogicum::create_router(test_state(repo, storage))
}

pub fn hours(n: i64) -> Duration {
    Duration::hours(n)
}

/// A request, optionally acting as `user` through the local `x-user-id` header.
pub fn request(method: Method, uri: &str, user: Option<&User>, form: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user.id.to_string());
    }
    match form {
        Some(form) => builder
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub fn get(uri: &str, user: Option<&User>) -> Request<Body> {
    request(Method::GET, uri, user, None)
}

pub fn post_form(uri: &str, user: Option<&User>, form: &str) -> Request<Body> {
    request(Method::POST, uri, user, Some(form))
}

/// Sends one request through the router and returns status, headers and JSON body
/// (`Value::Null` for an empty body).
pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.oneshot(request).await.unwrap();
    let (parts, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (parts.status, parts.headers, json)
}

pub fn location(headers: &HeaderMap) -> &str {
    headers
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}
