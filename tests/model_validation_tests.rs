use blogicum::{
    forms::{FormPage, PostForm, RegistrationForm},
    models::{Category, Post},
};
use chrono::{Duration, Utc};
use uuid::Uuid;

fn post_in(category: Option<bool>) -> Post {
    Post {
        id: 1,
        author_id: Uuid::new_v4(),
        pub_date: Utc::now() - Duration::hours(1),
        is_published: true,
        category_id: category.map(|_| 7),
        category_is_published: category,
        ..Post::default()
    }
}

#[test]
fn test_post_visibility_rule() {
    let now = Utc::now();
    assert!(post_in(Some(true)).is_visible_at(now));
    assert!(!post_in(Some(false)).is_visible_at(now));
    // A post whose category was deleted stays visible.
    assert!(post_in(None).is_visible_at(now));

    let mut draft = post_in(Some(true));
    draft.is_published = false;
    assert!(!draft.is_visible_at(now));

    let mut scheduled = post_in(Some(true));
    scheduled.pub_date = now + Duration::minutes(5);
    assert!(!scheduled.is_visible_at(now));
    assert!(scheduled.is_visible_at(now + Duration::minutes(5)));
}

#[test]
fn test_comment_count_omitted_unless_annotated() {
    let mut post = post_in(Some(true));
    let json_output = serde_json::to_string(&post).unwrap();
    assert!(!json_output.contains("comment_count"));

    post.comment_count = Some(3);
    let json_output = serde_json::to_string(&post).unwrap();
    assert!(json_output.contains(r#""comment_count":3"#));
}

#[test]
fn test_registration_form_never_echoes_password() {
    let form = RegistrationForm {
        username: "newbie".to_string(),
        email: "newbie@example.com".to_string(),
        password: "hunter2-hunter2".to_string(),
    };
    let json_output = serde_json::to_string(&FormPage::blank(form)).unwrap();
    assert!(json_output.contains("newbie"));
    assert!(!json_output.contains("hunter2"));
}

#[test]
fn test_post_form_accepts_missing_fields() {
    // Urlencoded bodies omit unchecked boxes and untouched inputs.
    let form: PostForm = serde_json::from_str(r#"{"title":"Only a title"}"#).unwrap();
    assert_eq!(form.title, "Only a title");
    assert!(form.is_published.is_none());
    assert!(form.validate().is_err());
}

#[test]
fn test_category_round_trips_through_json() {
    let category = Category {
        id: 3,
        title: "Travel".to_string(),
        description: "Trips".to_string(),
        slug: "travel".to_string(),
        is_published: true,
        created_at: Utc::now(),
    };
    let json_output = serde_json::to_string(&category).unwrap();
    let parsed: Category = serde_json::from_str(&json_output).unwrap();
    assert_eq!(parsed, category);
}
