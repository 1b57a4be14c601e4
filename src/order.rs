//! The ordering of every kind of collection. Each entity supplies its own
//! comparator through [`Ordered`]; [`sort`] applies it.

use std::cmp::Ordering;

use crate::collection::{ArchiveYear, TagSummary};
use crate::document::{ArticleInfo, Document};

/// A total order for one kind of collection entry.
pub trait Ordered {
    fn order(&self, other: &Self) -> Ordering;
}

/// Sorts a collection by its entries' [`Ordered`] comparator.
pub fn sort<T: Ordered>(items: &mut [T]) {
    items.sort_by(T::order);
}

impl Ordered for Document {
    /// Pinned documents first, then most recent first. Links break ties so
    /// the order doesn't depend on the order files were found in.
    fn order(&self, other: &Self) -> Ordering {
        other
            .top
            .cmp(&self.top)
            .then_with(|| other.date.cmp(&self.date))
            .then_with(|| self.link.cmp(&other.link))
    }
}

impl Ordered for ArticleInfo {
    /// Most recent first; pinning doesn't apply inside summaries.
    fn order(&self, other: &Self) -> Ordering {
        other
            .detail_date
            .cmp(&self.detail_date)
            .then_with(|| self.link.cmp(&other.link))
    }
}

impl Ordered for ArchiveYear {
    /// Descending year. Labels are four-digit years, so comparing the
    /// strings is enough.
    fn order(&self, other: &Self) -> Ordering {
        other.year.cmp(&self.year)
    }
}

impl Ordered for TagSummary {
    /// Largest tags first, ties by descending name.
    fn order(&self, other: &Self) -> Ordering {
        other
            .count
            .cmp(&self.count)
            .then_with(|| other.name.cmp(&self.name))
    }
}
