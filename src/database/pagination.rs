use serde::{Deserialize, Serialize};

use crate::{
    constants::{MAX_PAGE_SIZE, RECIPE_COUNT_PER_PAGE, USER_COUNT_PER_PAGE},
    error::ApiError,
};

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct PageContext<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Page-number pagination: `?page=N&limit=M`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageNumber {
    pub page: i64,
    pub limit: i64,
}

impl Default for PageNumber {
    fn default() -> Self {
        Self {
            page: 1,
            limit: RECIPE_COUNT_PER_PAGE,
        }
    }
}

impl PageNumber {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Result<Self, ApiError> {
        let page = page.unwrap_or(1);
        let limit = clamp_limit(limit, RECIPE_COUNT_PER_PAGE);

        // The row offset must fit in an i64 for the page to exist at all.
        if page < 1 || (page - 1).checked_mul(limit).is_none() {
            return Err(ApiError::not_found("Invalid page."));
        }

        Ok(Self { page, limit })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// `base` is the absolute URL of the listing, `params` the other query parameters
    /// to carry over into the links.
    pub fn context<T>(
        &self,
        rows: Vec<T>,
        total_rows: i64,
        base: &str,
        params: &[(String, String)],
    ) -> Result<PageContext<T>, ApiError> {
        if rows.is_empty() && self.page > 1 {
            return Err(ApiError::not_found("Invalid page."));
        }

        let link = |page: i64| {
            let mut query: Vec<(String, String)> = params.to_vec();
            if page > 1 {
                query.push((String::from("page"), page.to_string()));
            }
            query.push((String::from("limit"), self.limit.to_string()));
            page_url(base, &query)
        };

        let next = (self.offset().saturating_add(self.limit) < total_rows)
            .then(|| link(self.page.saturating_add(1)));
        let previous = (self.page > 1).then(|| link(self.page - 1));

        Ok(PageContext {
            count: total_rows,
            next,
            previous,
            results: rows,
        })
    }
}

/// Limit/offset pagination: `?limit=M&offset=N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitOffset {
    pub limit: i64,
    pub offset: i64,
}

impl Default for LimitOffset {
    fn default() -> Self {
        Self {
            limit: USER_COUNT_PER_PAGE,
            offset: 0,
        }
    }
}

impl LimitOffset {
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self {
            limit: clamp_limit(limit, USER_COUNT_PER_PAGE),
            offset: offset.unwrap_or(0).max(0),
        }
    }

    pub fn context<T>(
        &self,
        rows: Vec<T>,
        total_rows: i64,
        base: &str,
        params: &[(String, String)],
    ) -> PageContext<T> {
        let link = |offset: i64| {
            let mut query: Vec<(String, String)> = params.to_vec();
            query.push((String::from("limit"), self.limit.to_string()));
            if offset > 0 {
                query.push((String::from("offset"), offset.to_string()));
            }
            page_url(base, &query)
        };

        let end = self.offset.saturating_add(self.limit);
        let next = (end < total_rows).then(|| link(end));
        let previous = (self.offset > 0).then(|| link((self.offset - self.limit).max(0)));

        PageContext {
            count: total_rows,
            next,
            previous,
            results: rows,
        }
    }
}

fn clamp_limit(limit: Option<i64>, default: i64) -> i64 {
    match limit {
        Some(limit) if limit > 0 => limit.min(MAX_PAGE_SIZE),
        _ => default,
    }
}

fn page_url(base: &str, query: &[(String, String)]) -> String {
    if query.is_empty() {
        return base.to_string();
    }

    let query = query
        .iter()
        .map(|(key, value)| format!("{}={}", encode(key), encode(value)))
        .collect::<Vec<String>>()
        .join("&");

    format!("{base}?{query}")
}

fn encode(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{b:02X}"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://localhost/api/recipes/";

    #[test]
    fn first_page_links_forward_only() {
        let page = PageNumber::new(None, Some(2)).unwrap();
        let ctx = page.context(vec![1, 2], 5, BASE, &[]).unwrap();

        assert_eq!(ctx.count, 5);
        assert_eq!(ctx.next.as_deref(), Some("http://localhost/api/recipes/?page=2&limit=2"));
        assert_eq!(ctx.previous, None);
    }

    #[test]
    fn last_page_links_back_only() {
        let page = PageNumber::new(Some(3), Some(2)).unwrap();
        let params = vec![(String::from("tags"), String::from("lunch"))];
        let ctx = page.context(vec![5], 5, BASE, &params).unwrap();

        assert_eq!(page.offset(), 4);
        assert_eq!(ctx.next, None);
        assert_eq!(
            ctx.previous.as_deref(),
            Some("http://localhost/api/recipes/?tags=lunch&page=2&limit=2")
        );
    }

    #[test]
    fn pages_past_the_end_are_not_found() {
        let page = PageNumber::new(Some(4), Some(2)).unwrap();
        assert!(page.context(Vec::<i32>::new(), 5, BASE, &[]).is_err());
        assert!(PageNumber::new(Some(0), None).is_err());

        let empty = PageNumber::default()
            .context(Vec::<i32>::new(), 0, BASE, &[])
            .unwrap();
        assert_eq!(empty.count, 0);
        assert_eq!(empty.next, None);
    }

    #[test]
    fn limit_offset_links() {
        let window = LimitOffset::new(Some(2), Some(2));
        let ctx = window.context(vec!["c", "d"], 5, "http://x/api/users/", &[]);

        assert_eq!(ctx.next.as_deref(), Some("http://x/api/users/?limit=2&offset=4"));
        assert_eq!(ctx.previous.as_deref(), Some("http://x/api/users/?limit=2"));
    }

    #[test]
    fn limits_are_clamped() {
        assert_eq!(LimitOffset::new(Some(0), Some(-3)), LimitOffset::default());
        assert_eq!(LimitOffset::new(Some(1000), None).limit, MAX_PAGE_SIZE);
    }

    #[test]
    fn huge_pages_are_not_found() {
        assert!(PageNumber::new(Some(i64::MAX), Some(6)).is_err());
        assert!(PageNumber::new(Some(i64::MAX / 2), Some(3)).is_err());

        let last = i64::MAX / 6 + 1;
        let page = PageNumber::new(Some(last), Some(6)).unwrap();
        assert_eq!(page.offset(), (last - 1) * 6);
        assert!(page.context(vec![1], 10, BASE, &[]).unwrap().next.is_none());
    }

    #[test]
    fn huge_offsets_do_not_overflow() {
        let window = LimitOffset::new(Some(6), Some(i64::MAX));
        let ctx = window.context(Vec::<i32>::new(), 3, "http://x/api/users/", &[]);

        assert_eq!(ctx.next, None);
        assert_eq!(
            ctx.previous.as_deref(),
            Some(format!("http://x/api/users/?limit=6&offset={}", i64::MAX - 6).as_str())
        );
    }

    #[test]
    fn query_values_are_encoded() {
        assert_eq!(
            page_url("/a", &[(String::from("name"), String::from("a b&c"))]),
            "/a?name=a%20b%26c"
        );
    }
}
