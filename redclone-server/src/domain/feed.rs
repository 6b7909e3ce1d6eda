use chrono::{DateTime, Utc};

use super::post::Post;

pub(crate) const DEFAULT_PAGE_SIZE: u32 = 20;
pub(crate) const MAX_PAGE_SIZE: u32 = 100;

/// Clamps a client-supplied page size into `1..=MAX_PAGE_SIZE`.
pub(crate) fn clamp_limit(requested: Option<i64>) -> u32 {
    match requested {
        None => DEFAULT_PAGE_SIZE,
        Some(limit) => limit.clamp(1, i64::from(MAX_PAGE_SIZE)) as u32,
    }
}

/// Position of a post in feed order: newest first, ties broken by id descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct FeedKey {
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) id: i64,
}

impl From<&Post> for FeedKey {
    fn from(post: &Post) -> Self {
        Self {
            created_at: post.created_at,
            id: post.id,
        }
    }
}

/// "Resume strictly before this point". Without `id` every post sharing
/// `created_at` is excluded; with it the boundary is exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FeedCursor {
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) id: Option<i64>,
}

impl FeedCursor {
    pub(crate) fn admits(&self, key: FeedKey) -> bool {
        match self.id {
            Some(id) => (key.created_at, key.id) < (self.created_at, id),
            None => key.created_at < self.created_at,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct FeedQuery {
    pub(crate) limit: u32,
    pub(crate) cursor: Option<FeedCursor>,
}

impl FeedQuery {
    pub(crate) fn new(requested_limit: Option<i64>, cursor: Option<FeedCursor>) -> Self {
        Self {
            limit: clamp_limit(requested_limit),
            cursor,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct FeedPage {
    pub(crate) posts: Vec<Post>,
    pub(crate) total_count: i64,
    pub(crate) has_more: bool,
    pub(crate) cursor: Option<FeedCursor>,
}

impl FeedPage {
    /// Builds the page envelope from a window already sorted in feed order.
    /// `oldest` is the key of the globally oldest post. Only timestamps are
    /// compared: a window that reaches the oldest `created_at` is the end,
    /// since a timestamp-only cursor excludes every post at that instant.
    pub(crate) fn assemble(posts: Vec<Post>, total_count: i64, oldest: Option<FeedKey>) -> Self {
        let last = posts.last().map(FeedKey::from);
        let has_more = match (last, oldest) {
            (Some(last), Some(oldest)) => last.created_at != oldest.created_at,
            _ => false,
        };
        let cursor = last.map(|key| FeedCursor {
            created_at: key.created_at,
            id: Some(key.id),
        });

        Self {
            posts,
            total_count,
            has_more,
            cursor,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{FeedCursor, FeedKey, FeedPage, MAX_PAGE_SIZE, clamp_limit};
    use crate::domain::post::Post;

    #[test]
    fn clamp_limit_bounds_requests() {
        assert_eq!(clamp_limit(Some(1000)), MAX_PAGE_SIZE);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(-5)), 1);
        assert_eq!(clamp_limit(Some(7)), 7);
        assert_eq!(clamp_limit(None), 20);
    }

    #[test]
    fn cursor_without_id_excludes_equal_timestamps() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let cursor = FeedCursor {
            created_at: t,
            id: None,
        };

        assert!(!cursor.admits(FeedKey { created_at: t, id: 1 }));
        assert!(cursor.admits(FeedKey {
            created_at: t - Duration::seconds(1),
            id: 99,
        }));
    }

    #[test]
    fn cursor_with_id_keeps_ties_below_boundary() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let cursor = FeedCursor {
            created_at: t,
            id: Some(5),
        };

        assert!(cursor.admits(FeedKey { created_at: t, id: 4 }));
        assert!(!cursor.admits(FeedKey { created_at: t, id: 5 }));
        assert!(!cursor.admits(FeedKey { created_at: t, id: 6 }));
    }

    #[test]
    fn assemble_reports_more_until_oldest_is_reached() {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let posts: Vec<Post> = (1..=3)
            .rev()
            .map(|i| {
                let at = base + Duration::minutes(i);
                Post::new(i, format!("t{i}"), "body", 1, 0, at, at).unwrap()
            })
            .collect();
        let oldest = Some(FeedKey::from(&posts[2]));

        let page = FeedPage::assemble(posts[..2].to_vec(), 3, oldest);
        assert!(page.has_more);
        assert_eq!(
            page.cursor.map(|c| c.created_at),
            Some(base + Duration::minutes(2))
        );

        let page = FeedPage::assemble(posts[2..].to_vec(), 3, oldest);
        assert!(!page.has_more);
    }

    #[test]
    fn assemble_stops_when_window_reaches_oldest_timestamp() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let newer = Post::new(2, "newer", "body", 1, 0, t, t).unwrap();
        let oldest = Some(FeedKey { created_at: t, id: 1 });

        let page = FeedPage::assemble(vec![newer], 2, oldest);
        assert!(!page.has_more);
        assert_eq!(page.cursor.map(|c| (c.created_at, c.id)), Some((t, Some(2))));

        // a cursor at `t` without an id admits nothing, so there is no next page
        let cursor = FeedCursor {
            created_at: t,
            id: None,
        };
        assert!(!cursor.admits(oldest.unwrap()));
    }

    #[test]
    fn assemble_empty_window_has_no_cursor() {
        let page = FeedPage::assemble(Vec::new(), 0, None);
        assert!(!page.has_more);
        assert!(page.cursor.is_none());
    }
}
