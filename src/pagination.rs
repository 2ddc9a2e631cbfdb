use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Number of posts rendered on one listing page.
pub const POSTS_ON_PAGE: i64 = 10;

/// Page served when the request does not name a usable one.
pub const DEFAULT_NUM_PAGE: i64 = 1;

/// PageQuery
///
/// The `?page=` query parameter shared by every listing. Kept as a raw string so
/// that garbage input degrades to the default page instead of a 400.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// 1-based page number.
    pub page: Option<String>,
}

/// Paginator
///
/// Fixed-size paginator over a collection of `count` items.
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    count: i64,
    per_page: i64,
}

/// The resolved page window: which page is served and which rows to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: i64,
    pub num_pages: i64,
    pub count: i64,
    pub limit: i64,
    pub offset: i64,
}

impl Paginator {
    pub fn new(count: i64, per_page: i64) -> Self {
        Self {
            count: count.max(0),
            per_page: per_page.max(1),
        }
    }

    /// Total number of pages. An empty collection still has one (empty) page.
    pub fn num_pages(&self) -> i64 {
        if self.count == 0 {
            1
        } else {
            (self.count + self.per_page - 1) / self.per_page
        }
    }

    /// Resolves a raw `page` parameter to a valid page.
    ///
    /// Missing or non-numeric input serves the default page; numbers outside
    /// `1..=num_pages` clamp to the nearest valid page.
    pub fn window(&self, raw: Option<&str>) -> PageWindow {
        let requested = raw
            .and_then(|value| value.trim().parse::<i64>().ok())
            .unwrap_or(DEFAULT_NUM_PAGE);
        let num_pages = self.num_pages();
        let number = requested.clamp(1, num_pages);

        PageWindow {
            number,
            num_pages,
            count: self.count,
            limit: self.per_page,
            offset: (number - 1) * self.per_page,
        }
    }
}

/// Page
///
/// One page of a listing together with the navigation metadata a page renders.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct Page<T> {
    pub object_list: Vec<T>,
    pub number: i64,
    pub num_pages: i64,
    pub count: i64,
    pub has_next: bool,
    pub has_previous: bool,
    pub next_page_number: Option<i64>,
    pub previous_page_number: Option<i64>,
}

impl<T> Page<T> {
    pub fn new(window: PageWindow, object_list: Vec<T>) -> Self {
        let has_next = window.number < window.num_pages;
        let has_previous = window.number > 1;
        Self {
            object_list,
            number: window.number,
            num_pages: window.num_pages,
            count: window.count,
            has_next,
            has_previous,
            next_page_number: has_next.then_some(window.number + 1),
            previous_page_number: has_previous.then_some(window.number - 1),
        }
    }
}
