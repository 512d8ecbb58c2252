//! Tag and category indexes.
//!
//! Indexes are recomputed from scratch on every build as a fold over the
//! post summaries, never patched in place.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::render::{PostGroups, PostSummary};

/// Name -> set of post source paths.
pub type NameIndex = BTreeMap<String, BTreeSet<String>>;

/// Tag and category membership for one build.
#[derive(Debug, Default)]
pub struct SiteIndex {
    pub tags: NameIndex,
    pub categories: NameIndex,
    summaries: BTreeMap<String, PostSummary>,
}

impl SiteIndex {
    /// Build the index from the summaries of every post in the build.
    pub fn build(summaries: impl IntoIterator<Item = PostSummary>) -> Self {
        summaries
            .into_iter()
            .fold(SiteIndex::default(), |mut index, summary| {
                for tag in &summary.tags {
                    index
                        .tags
                        .entry(tag.clone())
                        .or_default()
                        .insert(summary.source_path.clone());
                }
                for category in &summary.categories {
                    index
                        .categories
                        .entry(category.clone())
                        .or_default()
                        .insert(summary.source_path.clone());
                }
                index.summaries.insert(summary.source_path.clone(), summary);
                index
            })
    }

    /// Number of posts in the index.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.summaries.len()
    }

    /// Dated posts, newest first.
    pub fn dated_posts(&self) -> Vec<&PostSummary> {
        let mut posts: Vec<&PostSummary> = self
            .summaries
            .values()
            .filter(|s| s.sort_key.is_some())
            .collect();
        sort_newest_first(&mut posts);
        posts
    }

    /// Posts carrying a name in the given index, newest first.
    pub fn posts_for<'a>(&'a self, index: &NameIndex, name: &str) -> Vec<&'a PostSummary> {
        let mut posts: Vec<&PostSummary> = index
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(|path| self.summaries.get(path))
            .collect();
        sort_newest_first(&mut posts);
        posts
    }

    /// The template-facing view of the index.
    pub fn context(&self) -> IndexContext {
        let groups = |index: &NameIndex| -> PostGroups {
            index
                .keys()
                .map(|name| {
                    let posts = self.posts_for(index, name).into_iter().cloned().collect();
                    (name.clone(), posts)
                })
                .collect()
        };

        IndexContext {
            posts: self.dated_posts().into_iter().cloned().collect(),
            tags: groups(&self.tags),
            categories: groups(&self.categories),
        }
    }
}

/// Dated posts come first, newest to oldest, then undated ones; ties break on path.
fn sort_newest_first(posts: &mut [&PostSummary]) {
    posts.sort_by(|a, b| {
        b.sort_key
            .cmp(&a.sort_key)
            .then_with(|| a.source_path.cmp(&b.source_path))
    });
}

/// Index data exposed to layouts as `index.*`.
#[derive(Debug, Default, Serialize)]
pub struct IndexContext {
    /// Dated posts, newest first
    pub posts: Vec<PostSummary>,
    pub tags: PostGroups,
    pub categories: PostGroups,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn summary(path: &str, date: Option<(i32, u32, u32)>, tags: &[&str]) -> PostSummary {
        let sort_key = date.map(|(y, m, d)| {
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        });
        PostSummary {
            title: path.to_string(),
            url: format!("/{path}/"),
            date: sort_key.map(|d| d.format("%Y-%m-%d").to_string()),
            excerpt: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            categories: vec!["java".to_string()],
            source_path: path.to_string(),
            sort_key,
        }
    }

    #[test]
    fn test_tags_collect_every_post() {
        let index = SiteIndex::build(vec![
            summary("hello.md", Some((2020, 1, 1)), &["a", "b"]),
            summary("other.md", Some((2020, 2, 1)), &["b"]),
        ]);

        assert_eq!(index.len(), 2);
        assert_eq!(
            index.tags["a"],
            BTreeSet::from(["hello.md".to_string()])
        );
        assert_eq!(
            index.tags["b"],
            BTreeSet::from(["hello.md".to_string(), "other.md".to_string()])
        );
        assert_eq!(index.categories["java"].len(), 2);
    }

    #[test]
    fn test_posts_sorted_newest_first() {
        let index = SiteIndex::build(vec![
            summary("old.md", Some((2019, 5, 1)), &["x"]),
            summary("about.md", None, &["x"]),
            summary("new.md", Some((2021, 5, 1)), &["x"]),
        ]);

        let dated: Vec<&str> = index
            .dated_posts()
            .iter()
            .map(|s| s.source_path.as_str())
            .collect();
        assert_eq!(dated, vec!["new.md", "old.md"]);

        let tagged: Vec<&str> = index
            .posts_for(&index.tags, "x")
            .iter()
            .map(|s| s.source_path.as_str())
            .collect();
        assert_eq!(tagged, vec!["new.md", "old.md", "about.md"]);
    }

    #[test]
    fn test_build_is_order_independent() {
        let posts = vec![
            summary("a.md", Some((2020, 1, 1)), &["t"]),
            summary("b.md", Some((2020, 1, 1)), &["t"]),
        ];
        let mut reversed = posts.clone();
        reversed.reverse();

        let first = serde_json::to_string(&SiteIndex::build(posts).context()).unwrap();
        let second = serde_json::to_string(&SiteIndex::build(reversed).context()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_name_is_empty() {
        let index = SiteIndex::build(vec![summary("a.md", None, &[])]);
        assert!(index.posts_for(&index.tags, "nope").is_empty());
    }
}
