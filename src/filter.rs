//! Caller-supplied filtering of a deduplicated article set.
//!
//! Three independent predicates, all of which must pass:
//!
//! | Predicate | Passes when |
//! |-----------|-------------|
//! | category  | criteria is `all`, or equals the article's category |
//! | recency   | criteria is `all`, the article is at most N days old, or its timestamp is unparsable |
//! | text      | search text is blank, or appears (case-insensitively) in title + description |
//!
//! The recency boundary is inclusive and measured in fractional days.
//! Unparsable timestamps pass so a malformed date never hides an article.

use crate::dedup::ArticleSet;
use crate::models::{Article, Category};
use chrono::{DateTime, Utc};
use std::num::NonZeroU32;
use std::str::FromStr;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl FromStr for CategoryFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(CategoryFilter::All)
        } else {
            s.parse().map(CategoryFilter::Only)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaxAge {
    #[default]
    All,
    Days(NonZeroU32),
}

impl FromStr for MaxAge {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(MaxAge::All);
        }
        s.parse::<NonZeroU32>()
            .map(MaxAge::Days)
            .map_err(|_| format!("expected `all` or a positive number of days, got `{s}`"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pub category: CategoryFilter,
    pub max_age: MaxAge,
    pub search_text: String,
}

impl FilterCriteria {
    fn matches_category(&self, article: &Article) -> bool {
        match self.category {
            CategoryFilter::All => true,
            CategoryFilter::Only(category) => article.category == category,
        }
    }

    fn matches_recency(&self, article: &Article, now: DateTime<Utc>) -> bool {
        let MaxAge::Days(days) = self.max_age else {
            return true;
        };
        let Some(published) = article.published_at() else {
            return true;
        };
        let age_days = (now - published).num_milliseconds() as f64 / MILLIS_PER_DAY;
        age_days <= f64::from(days.get())
    }

    fn matches_text(&self, needle: &str, article: &Article) -> bool {
        if needle.is_empty() {
            return true;
        }
        format!("{} {}", article.title, article.description)
            .to_lowercase()
            .contains(needle)
    }

    pub fn matches(&self, article: &Article, now: DateTime<Utc>) -> bool {
        let needle = self.search_text.trim().to_lowercase();
        self.matches_category(article)
            && self.matches_recency(article, now)
            && self.matches_text(&needle, article)
    }

    /// The order-preserving subsequence of `set` passing every predicate.
    pub fn apply(&self, set: &ArticleSet, now: DateTime<Utc>) -> Vec<Article> {
        set.iter()
            .filter(|a| self.matches(a, now))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::article;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        "2025-05-10T12:00:00Z".parse().unwrap()
    }

    fn dated(title: &str, desc: &str, category: Category, age: Duration) -> Article {
        let url = format!("https://e.com/{title}");
        let mut a = article(title, Some(url.as_str()), category);
        a.description = desc.to_string();
        a.published_at = (now() - age).to_rfc3339();
        a
    }

    fn days(n: u32) -> MaxAge {
        MaxAge::Days(NonZeroU32::new(n).unwrap())
    }

    #[test]
    fn test_parse_criteria_parts() {
        assert_eq!("all".parse::<CategoryFilter>().unwrap(), CategoryFilter::All);
        assert_eq!(
            "Sports".parse::<CategoryFilter>().unwrap(),
            CategoryFilter::Only(Category::Sports)
        );
        assert!("crime".parse::<CategoryFilter>().is_err());

        assert_eq!("ALL".parse::<MaxAge>().unwrap(), MaxAge::All);
        assert_eq!("7".parse::<MaxAge>().unwrap(), days(7));
        assert!("0".parse::<MaxAge>().is_err());
        assert!("-3".parse::<MaxAge>().is_err());
    }

    #[test]
    fn test_default_passes_everything() {
        let set = ArticleSet::dedup(vec![
            dated("a", "", Category::General, Duration::days(30)),
            dated("b", "", Category::Weather, Duration::hours(1)),
        ]);
        assert_eq!(FilterCriteria::default().apply(&set, now()).len(), 2);
    }

    #[test]
    fn test_combined_filter() {
        let set = ArticleSet::dedup(vec![
            dated("Cricket MATCH today", "", Category::Sports, Duration::days(1)),
            dated("Derby", "the big match is on", Category::Sports, Duration::hours(71)),
            dated("Old match", "", Category::Sports, Duration::days(4)),
            dated("Match in the assembly", "", Category::Politics, Duration::hours(2)),
            dated("Training session", "", Category::Sports, Duration::hours(2)),
        ]);
        let criteria = FilterCriteria {
            category: CategoryFilter::Only(Category::Sports),
            max_age: days(3),
            search_text: "match".to_string(),
        };

        let titles: Vec<String> = criteria
            .apply(&set, now())
            .into_iter()
            .map(|a| a.title)
            .collect();
        assert_eq!(titles, vec!["Cricket MATCH today", "Derby"]);
    }

    #[test]
    fn test_recency_boundary_inclusive() {
        let criteria = FilterCriteria {
            max_age: days(3),
            ..FilterCriteria::default()
        };
        let exactly = dated("edge", "", Category::General, Duration::days(3));
        let just_over = dated("over", "", Category::General, Duration::days(3) + Duration::seconds(1));
        assert!(criteria.matches(&exactly, now()));
        assert!(!criteria.matches(&just_over, now()));
    }

    #[test]
    fn test_unparsable_date_fails_open() {
        let criteria = FilterCriteria {
            max_age: days(1),
            ..FilterCriteria::default()
        };
        let mut a = article("undated", None, Category::General);
        a.published_at = "not a date".to_string();
        assert!(criteria.matches(&a, now()));

        a.published_at = String::new();
        assert!(criteria.matches(&a, now()));
    }

    #[test]
    fn test_future_dates_pass() {
        let criteria = FilterCriteria {
            max_age: days(1),
            ..FilterCriteria::default()
        };
        let a = dated("tomorrow", "", Category::General, Duration::days(-1));
        assert!(criteria.matches(&a, now()));
    }

    #[test]
    fn test_text_searches_description_and_trims() {
        let criteria = FilterCriteria {
            search_text: "  MONSOON ".to_string(),
            ..FilterCriteria::default()
        };
        let hit = dated("Rain update", "Monsoon arrives early", Category::Weather, Duration::hours(1));
        let miss = dated("Heatwave", "Dry spell continues", Category::Weather, Duration::hours(1));
        assert!(criteria.matches(&hit, now()));
        assert!(!criteria.matches(&miss, now()));
    }
}
