//! Splits an ordered collection into numbered listing pages. The first page
//! of a listing rooted at `{root}` is `{root}/index.html`; page `n > 1` is
//! `{root}/page{n}.html`.

const INDEX_PAGE: &str = "index.html";

/// One page of a paginated listing.
#[derive(Debug, PartialEq)]
pub struct Page<'a, T> {
    /// The 1-based page number.
    pub index: usize,

    /// The number of pages in the listing.
    pub total: usize,

    pub items: &'a [T],

    /// The link of the previous page, empty on the first page.
    pub prev: String,

    /// The link of the next page, empty on the last page.
    pub next: String,

    /// The tag this listing belongs to, empty for the main feed.
    pub tag: String,

    /// The number of items across the whole listing.
    pub item_count: usize,

    /// The output path of this page, relative to the output directory.
    pub path: String,
}

/// Paginates `items` into pages of `limit` entries. There's always at least
/// one page, even when `items` is empty.
pub fn paginate<'a, T>(items: &'a [T], limit: usize, root: &str, tag: &str) -> Vec<Page<'a, T>> {
    let limit = limit.max(1);
    let total = match items.len() {
        0 => 1,
        n => (n + limit - 1) / limit,
    };

    (1..=total)
        .map(|index| {
            let start = ((index - 1) * limit).min(items.len());
            let end = (index * limit).min(items.len());
            Page {
                index,
                total,
                items: &items[start..end],
                prev: match index {
                    1 => String::new(),
                    2 => join(root, INDEX_PAGE),
                    _ => page_link(root, index - 1),
                },
                next: match index == total {
                    true => String::new(),
                    false => page_link(root, index + 1),
                },
                tag: tag.to_owned(),
                item_count: items.len(),
                path: match index {
                    1 => join(root, INDEX_PAGE),
                    _ => page_link(root, index),
                },
            }
        })
        .collect()
}

fn page_link(root: &str, index: usize) -> String {
    join(root, &format!("page{}.html", index))
}

/// Joins link segments with `/`, skipping an empty root.
pub fn join(root: &str, name: &str) -> String {
    match root.trim_end_matches('/') {
        "" => name.to_owned(),
        root => format!("{}/{}", root, name),
    }
}
