use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    models::{Comment, Post, User},
    storage::{POST_IMAGES_PREFIX, sanitize_key},
};

/// Longest title/name accepted for posts, categories and locations.
pub const MAX_LENGTH: usize = 256;
/// Longest username and first/last name.
pub const MAX_NAME_LENGTH: usize = 150;
pub const MAX_SLUG_LENGTH: usize = 64;
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Format of the `datetime-local` input used for `pub_date`.
pub const PUB_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M";

const REQUIRED: &str = "This field is required.";
pub const INVALID_CHOICE: &str =
    "Select a valid choice. That choice is not one of the available choices.";
pub const USERNAME_TAKEN: &str = "A user with that username already exists.";
pub const INVALID_IMAGE: &str = "Upload a valid image.";

/// Per-field validation messages, keyed by form field name.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// FormPage
///
/// A form re-rendered after an invalid submission (or shown blank/prefilled):
/// the submitted values plus the messages for each offending field.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct FormPage<F> {
    pub form: F,
    pub errors: FieldErrors,
}

impl<F> FormPage<F> {
    pub fn blank(form: F) -> Self {
        Self {
            form,
            errors: FieldErrors::new(),
        }
    }
}

/// Collects messages while a form is validated.
#[derive(Debug, Default)]
pub struct Validation {
    errors: FieldErrors,
}

impl Validation {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Required, trimmed, bounded text field. Returns the trimmed value.
    fn text(&mut self, field: &str, value: &str, max: Option<usize>) -> String {
        let value = value.trim();
        if value.is_empty() {
            self.add(field, REQUIRED);
        } else {
            self.max_length(field, value, max);
        }
        value.to_string()
    }

    fn max_length(&mut self, field: &str, value: &str, max: Option<usize>) {
        if let Some(max) = max {
            let len = value.chars().count();
            if len > max {
                self.add(
                    field,
                    format!("Ensure this value has at most {max} characters (it has {len})."),
                );
            }
        }
    }

    fn finish<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(self.errors)
        }
    }
}

/// HTML checkbox semantics: absent means unchecked, any value but "false"/"0" means checked.
fn checkbox(value: &Option<String>) -> bool {
    match value.as_deref() {
        None => false,
        Some(v) => !matches!(v.trim().to_ascii_lowercase().as_str(), "false" | "0" | ""),
    }
}

fn checked() -> Option<String> {
    Some("on".to_string())
}

fn optional_text(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Parses the `pub_date` input as UTC. Accepts the `datetime-local` format (with or
/// without seconds), a space-separated variant, or a full RFC 3339 timestamp.
pub fn parse_pub_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    const NAIVE_FORMATS: [&str; 4] = [
        PUB_DATE_FORMAT,
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%d %H:%M:%S",
    ];
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
}

/// URL-safe slug: ASCII letters, digits, hyphens and underscores.
pub fn is_valid_slug(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn is_valid_username(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
}

fn is_valid_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// Image keys must point into the post image prefix, without traversal.
fn is_post_image_key(key: &str) -> bool {
    key.strip_prefix(POST_IMAGES_PREFIX)
        .is_some_and(|rest| rest.starts_with('/') && rest.len() > 1)
        && sanitize_key(key) == key
}

fn parse_choice(validation: &mut Validation, field: &str, value: &str) -> Option<i64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    match value.parse::<i64>() {
        Ok(id) => Some(id),
        Err(_) => {
            validation.add(field, INVALID_CHOICE);
            None
        }
    }
}

// --- Post ---

/// PostForm
///
/// Raw post submission. `category` and `location` carry ids; `image` carries the
/// storage key returned by the presigned upload endpoint. On edit, an empty `image`
/// keeps the current one unless the `image_clear` checkbox is ticked.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(default)]
pub struct PostForm {
    pub title: String,
    pub text: String,
    #[schema(example = "2025-05-01T12:00")]
    pub pub_date: String,
    pub location: String,
    pub category: String,
    pub image: String,
    pub image_clear: Option<String>,
    pub is_published: Option<String>,
}

/// Validated post fields.
#[derive(Debug, Clone, PartialEq)]
pub struct PostInput {
    pub title: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub location_id: Option<i64>,
    pub category_id: i64,
    pub image: Option<String>,
    /// The clear checkbox was ticked: drop the current image.
    pub clear_image: bool,
    pub is_published: bool,
}

impl PostInput {
    /// Carries `current` over when the form neither uploads nor clears an image.
    pub fn keep_image_unless_changed(&mut self, current: Option<&str>) {
        if self.image.is_none() && !self.clear_image {
            self.image = current.map(str::to_string);
        }
    }
}

impl PostForm {
    /// Empty form for a new post. Publishing is checked by default.
    pub fn blank() -> Self {
        Self {
            is_published: checked(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<PostInput, FieldErrors> {
        let mut v = Validation::default();
        let title = v.text("title", &self.title, Some(MAX_LENGTH));
        let text = v.text("text", &self.text, None);

        let pub_date = if self.pub_date.trim().is_empty() {
            v.add("pub_date", REQUIRED);
            None
        } else {
            let parsed = parse_pub_date(&self.pub_date);
            if parsed.is_none() {
                v.add("pub_date", "Enter a valid date/time.");
            }
            parsed
        };

        let category_id = parse_choice(&mut v, "category", &self.category);
        if self.category.trim().is_empty() {
            v.add("category", REQUIRED);
        }
        let location_id = parse_choice(&mut v, "location", &self.location);
        let image = optional_text(&self.image);
        let clear_image = checkbox(&self.image_clear);
        if let Some(key) = &image {
            if !is_post_image_key(key) {
                v.add("image", INVALID_IMAGE);
            } else if clear_image {
                v.add(
                    "image",
                    "Please either submit a file or check the clear checkbox, not both.",
                );
            }
        }

        match (pub_date, category_id) {
            (Some(pub_date), Some(category_id)) => v.finish(PostInput {
                title,
                text,
                pub_date,
                location_id,
                category_id,
                image,
                clear_image,
                is_published: checkbox(&self.is_published),
            }),
            _ => Err(v.errors),
        }
    }
}

impl From<&Post> for PostForm {
    fn from(post: &Post) -> Self {
        Self {
            title: post.title.clone(),
            text: post.text.clone(),
            pub_date: post.pub_date.format(PUB_DATE_FORMAT).to_string(),
            location: post.location_id.map(|id| id.to_string()).unwrap_or_default(),
            category: post.category_id.map(|id| id.to_string()).unwrap_or_default(),
            image: post.image.clone().unwrap_or_default(),
            image_clear: None,
            is_published: post.is_published.then(checked).flatten(),
        }
    }
}

// --- Comment ---

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(default)]
pub struct CommentForm {
    pub text: String,
}

impl CommentForm {
    pub fn validate(&self) -> Result<String, FieldErrors> {
        let mut v = Validation::default();
        let text = v.text("text", &self.text, None);
        v.finish(text)
    }
}

impl From<&Comment> for CommentForm {
    fn from(comment: &Comment) -> Self {
        Self {
            text: comment.text.clone(),
        }
    }
}

// --- Profile ---

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(default)]
pub struct ProfileForm {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileInput {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl ProfileForm {
    pub fn validate(&self) -> Result<ProfileInput, FieldErrors> {
        let mut v = Validation::default();
        let username = validate_username(&mut v, &self.username);

        let first_name = self.first_name.trim().to_string();
        v.max_length("first_name", &first_name, Some(MAX_NAME_LENGTH));
        let last_name = self.last_name.trim().to_string();
        v.max_length("last_name", &last_name, Some(MAX_NAME_LENGTH));

        let email = self.email.trim().to_string();
        if !email.is_empty() && !is_valid_email(&email) {
            v.add("email", "Enter a valid email address.");
        }

        v.finish(ProfileInput {
            username,
            first_name,
            last_name,
            email,
        })
    }
}

impl From<&User> for ProfileForm {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
        }
    }
}

fn validate_username(v: &mut Validation, raw: &str) -> String {
    let username = v.text("username", raw, Some(MAX_NAME_LENGTH));
    if !username.is_empty() && !is_valid_username(&username) {
        v.add(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    }
    username
}

// --- Registration ---

/// RegistrationForm
///
/// The password is only forwarded to the identity provider; it is never stored,
/// logged or echoed back when the form is re-rendered.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct RegistrationForm {
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationInput {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegistrationForm {
    pub fn validate(&self) -> Result<RegistrationInput, FieldErrors> {
        let mut v = Validation::default();
        let username = validate_username(&mut v, &self.username);
        let email = v.text("email", &self.email, None);
        if !email.is_empty() && !is_valid_email(&email) {
            v.add("email", "Enter a valid email address.");
        }
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            v.add(
                "password",
                format!(
                    "This password is too short. It must contain at least {MIN_PASSWORD_LENGTH} characters."
                ),
            );
        }
        v.finish(RegistrationInput {
            username,
            email,
            password: self.password.clone(),
        })
    }
}

// --- Admin: categories & locations ---

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(default)]
pub struct CategoryForm {
    pub title: String,
    pub description: String,
    pub slug: String,
    pub is_published: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryInput {
    pub title: String,
    pub description: String,
    pub slug: String,
    pub is_published: bool,
}

impl CategoryForm {
    pub fn validate(&self) -> Result<CategoryInput, FieldErrors> {
        let mut v = Validation::default();
        let title = v.text("title", &self.title, Some(MAX_LENGTH));
        let description = v.text("description", &self.description, None);
        let slug = v.text("slug", &self.slug, Some(MAX_SLUG_LENGTH));
        if !slug.is_empty() && !is_valid_slug(&slug) {
            v.add(
                "slug",
                "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
            );
        }
        v.finish(CategoryInput {
            title,
            description,
            slug,
            is_published: checkbox(&self.is_published),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(default)]
pub struct LocationForm {
    pub name: String,
    pub is_published: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationInput {
    pub name: String,
    pub is_published: bool,
}

impl LocationForm {
    pub fn validate(&self) -> Result<LocationInput, FieldErrors> {
        let mut v = Validation::default();
        let name = v.text("name", &self.name, Some(MAX_LENGTH));
        v.finish(LocationInput {
            name,
            is_published: checkbox(&self.is_published),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    fn valid_post_form() -> PostForm {
        PostForm {
            title: "Morning walk".into(),
            text: "Down by the river.".into(),
            pub_date: "2024-03-01T09:30".into(),
            location: "".into(),
            category: "4".into(),
            image: "".into(),
            image_clear: None,
            is_published: Some("on".into()),
        }
    }

    #[test]
    fn post_form_parses_into_input() {
        let input = valid_post_form().validate().unwrap();
        assert_eq!(input.title, "Morning walk");
        assert_eq!(input.category_id, 4);
        assert_eq!(input.location_id, None);
        assert_eq!(input.image, None);
        assert!(input.is_published);
        assert_eq!(
            input.pub_date,
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap()
        );
    }

    #[test]
    fn unchecked_checkbox_means_unpublished() {
        let form = PostForm {
            is_published: None,
            ..valid_post_form()
        };
        assert!(!form.validate().unwrap().is_published);

        let form = PostForm {
            is_published: Some("false".into()),
            ..valid_post_form()
        };
        assert!(!form.validate().unwrap().is_published);
    }

    #[test]
    fn post_form_reports_every_bad_field() {
        let form = PostForm {
            title: "x".repeat(MAX_LENGTH + 1),
            text: "   ".into(),
            pub_date: "yesterday".into(),
            category: "".into(),
            location: "nowhere".into(),
            ..PostForm::default()
        };
        let errors = form.validate().unwrap_err();
        assert!(errors["title"][0].contains("at most 256"));
        assert_eq!(errors["text"], vec![REQUIRED.to_string()]);
        assert_eq!(errors["pub_date"], vec!["Enter a valid date/time.".to_string()]);
        assert_eq!(errors["category"], vec![REQUIRED.to_string()]);
        assert_eq!(errors["location"], vec![INVALID_CHOICE.to_string()]);
    }

    #[test]
    fn pub_date_accepts_seconds_and_rfc3339() {
        let with_seconds = parse_pub_date("2030-01-02T03:04:05").unwrap();
        assert_eq!(with_seconds.second(), 5);

        let rfc = parse_pub_date("2030-01-02T03:04:05+02:00").unwrap();
        assert_eq!(rfc.hour(), 1);

        assert!(parse_pub_date("02/01/2030").is_none());
    }

    #[test]
    fn prefilled_form_round_trips_a_post() {
        let post = Post {
            title: "Kept".into(),
            text: "Body".into(),
            pub_date: Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 0).unwrap(),
            category_id: Some(2),
            location_id: Some(9),
            image: Some("post_images/a.png".into()),
            is_published: true,
            ..Post::default()
        };
        let form = PostForm::from(&post);
        assert_eq!(form.pub_date, "2024-05-06T07:08");

        let input = form.validate().unwrap();
        assert_eq!(input.location_id, Some(9));
        assert_eq!(input.image.as_deref(), Some("post_images/a.png"));
        assert_eq!(input.pub_date, post.pub_date);
    }

    #[test]
    fn image_key_must_stay_under_post_images() {
        let form = PostForm {
            image: "post_images/../secrets.txt".into(),
            ..valid_post_form()
        };
        assert!(form.validate().unwrap_err().contains_key("image"));

        let form = PostForm {
            image: "avatars/me.png".into(),
            ..valid_post_form()
        };
        assert!(form.validate().unwrap_err().contains_key("image"));
    }

    #[test]
    fn empty_image_keeps_current_unless_cleared() {
        let mut input = valid_post_form().validate().unwrap();
        input.keep_image_unless_changed(Some("post_images/u/old.png"));
        assert_eq!(input.image.as_deref(), Some("post_images/u/old.png"));

        let mut input = PostForm {
            image_clear: Some("on".into()),
            ..valid_post_form()
        }
        .validate()
        .unwrap();
        input.keep_image_unless_changed(Some("post_images/u/old.png"));
        assert_eq!(input.image, None);

        let mut input = PostForm {
            image: "post_images/u/new.png".into(),
            ..valid_post_form()
        }
        .validate()
        .unwrap();
        input.keep_image_unless_changed(Some("post_images/u/old.png"));
        assert_eq!(input.image.as_deref(), Some("post_images/u/new.png"));
    }

    #[test]
    fn new_image_and_clear_checkbox_conflict() {
        let form = PostForm {
            image: "post_images/u/new.png".into(),
            image_clear: Some("on".into()),
            ..valid_post_form()
        };
        assert!(form.validate().unwrap_err().contains_key("image"));
    }

    #[test]
    fn comment_requires_text() {
        assert!(CommentForm { text: "\n".into() }.validate().is_err());
        assert_eq!(
            CommentForm { text: " nice ".into() }.validate().unwrap(),
            "nice"
        );
    }

    #[test]
    fn profile_form_checks_username_and_email() {
        let form = ProfileForm {
            username: "bad name!".into(),
            email: "not-an-email".into(),
            ..ProfileForm::default()
        };
        let errors = form.validate().unwrap_err();
        assert!(errors.contains_key("username"));
        assert!(errors.contains_key("email"));

        let ok = ProfileForm {
            username: "ada.l".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.org".into(),
        };
        assert_eq!(ok.validate().unwrap().username, "ada.l");
    }

    #[test]
    fn registration_password_is_not_serialized() {
        let form = RegistrationForm {
            username: "ada".into(),
            email: "ada@example.org".into(),
            password: "short".into(),
        };
        let errors = form.validate().unwrap_err();
        assert!(errors.contains_key("password"));

        let json = serde_json::to_string(&form).unwrap();
        assert!(!json.contains("short"));
    }

    #[test]
    fn category_slug_must_be_url_safe() {
        let form = CategoryForm {
            title: "Travel".into(),
            description: "Trips".into(),
            slug: "travel notes".into(),
            is_published: None,
        };
        assert!(form.validate().unwrap_err().contains_key("slug"));
        assert!(is_valid_slug("travel_notes-2"));
    }
}
