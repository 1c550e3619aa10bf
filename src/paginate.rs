use anyhow::Result;

/// Maximum number of items per page (YouTube API limit).
pub const PAGE_SIZE: usize = 50;

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

/// Why a page loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stop {
    /// The requested number of items was reached.
    Limit,
    /// An item outside the window was seen.
    OutOfWindow,
    /// The source had no further continuation token.
    Exhausted,
    /// A page request failed; see `Collected::error`.
    Failed,
}

#[derive(Debug)]
pub struct Collected<T> {
    pub items: Vec<T>,
    pub pages: usize,
    pub stop: Stop,
    pub error: Option<anyhow::Error>,
}

/// Requests pages until `limit` items are gathered or the source runs out.
pub fn collect_pages<T, F>(limit: Option<usize>, fetch: F) -> Collected<T>
where
    F: FnMut(Option<&str>, usize) -> Result<Page<T>>,
{
    collect_pages_while(limit, |_| true, fetch)
}

/// Like [`collect_pages`], but also stops at the first item for which `keep`
/// returns false. The source must list items so that nothing wanted follows
/// an unwanted one.
///
/// `fetch` receives the previous page's continuation token and the page size
/// to request. A failed request ends the loop; items gathered up to that point
/// are kept and the error is returned alongside them.
pub fn collect_pages_while<T, P, F>(limit: Option<usize>, mut keep: P, mut fetch: F) -> Collected<T>
where
    P: FnMut(&T) -> bool,
    F: FnMut(Option<&str>, usize) -> Result<Page<T>>,
{
    let mut items = Vec::new();
    let mut pages = 0;
    let mut token: Option<String> = None;

    let stop = loop {
        let remaining = limit.map(|n| n.saturating_sub(items.len()));
        if remaining == Some(0) {
            break Stop::Limit;
        }
        let page_size = remaining.map_or(PAGE_SIZE, |r| r.min(PAGE_SIZE));

        tracing::debug!(page = pages + 1, page_size, "requesting page");
        let page = match fetch(token.as_deref(), page_size) {
            Ok(page) => page,
            Err(e) => {
                return Collected {
                    items,
                    pages,
                    stop: Stop::Failed,
                    error: Some(e),
                };
            }
        };
        pages += 1;

        let mut out_of_window = false;
        for item in page.items {
            if !keep(&item) {
                out_of_window = true;
                break;
            }
            items.push(item);
            if limit.is_some_and(|n| items.len() >= n) {
                break;
            }
        }

        if out_of_window {
            break Stop::OutOfWindow;
        }
        if limit.is_some_and(|n| items.len() >= n) {
            break Stop::Limit;
        }

        match page.next_page_token {
            Some(next) if !next.is_empty() && token.as_deref() != Some(next.as_str()) => {
                token = Some(next);
            }
            Some(next) if !next.is_empty() => {
                tracing::warn!(token = %next, "source repeated its page token, stopping");
                break Stop::Exhausted;
            }
            _ => break Stop::Exhausted,
        }
    };

    Collected {
        items,
        pages,
        stop,
        error: None,
    }
}
