//! Cross-category deduplication.
//!
//! The same story often comes back under several categories (a cricket
//! match in Pune is both "general" and "sports" news). [`ArticleSet`] keeps
//! the first occurrence of each identity key and drops the rest, preserving
//! fetch order.

use crate::models::Article;
use itertools::Itertools;

/// Ordered articles, unique by [`Article::identity`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArticleSet(Vec<Article>);

impl ArticleSet {
    pub fn dedup(articles: impl IntoIterator<Item = Article>) -> Self {
        Self(
            articles
                .into_iter()
                .unique_by(|a| a.identity().to_string())
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Article> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Article] {
        &self.0
    }
}
