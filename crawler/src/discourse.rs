use scraper::Html;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use url::Url;

#[derive(Debug, Deserialize)]
pub struct TopicListPage {
    pub topic_list: TopicList,
}

#[derive(Debug, Deserialize)]
pub struct TopicList {
    #[serde(default)]
    pub topics: Vec<TopicSummary>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopicSummary {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    pub created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TopicDetail {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub slug: String,
    pub post_stream: PostStream,
}

#[derive(Debug, Deserialize)]
pub struct PostStream {
    #[serde(default)]
    pub posts: Vec<RawPost>,
}

#[derive(Debug, Deserialize)]
pub struct RawPost {
    pub post_number: u32,
    #[serde(default)]
    pub username: String,
    pub created_at: Option<String>,
    #[serde(default)]
    pub cooked: String,
}

/// One record of the forum collection consumed by the document store.
#[derive(Debug, Serialize, PartialEq)]
pub struct ForumPost {
    pub content: String,
    pub post_url: String,
    pub topic_title: String,
    pub username: String,
    pub created_at: String,
}

/// Inclusive calendar-date window.
#[derive(Debug, Clone, Copy)]
pub struct DateRange {
    pub since: Date,
    pub until: Date,
}

impl DateRange {
    pub fn parse(since: &str, until: &str) -> anyhow::Result<Self> {
        let fmt = format_description!("[year]-[month]-[day]");
        let range = Self { since: Date::parse(since, &fmt)?, until: Date::parse(until, &fmt)? };
        anyhow::ensure!(range.since <= range.until, "--since must not be after --until");
        Ok(range)
    }

    /// Whether an RFC 3339 timestamp falls inside the window. Missing or
    /// unparseable timestamps are treated as outside.
    pub fn contains(&self, timestamp: Option<&str>) -> bool {
        timestamp
            .and_then(|ts| OffsetDateTime::parse(ts, &Rfc3339).ok())
            .map(|dt| dt.date())
            .map_or(false, |d| self.since <= d && d <= self.until)
    }
}

/// `/c/{category}.json?page=N`, or `/latest.json?page=N` without a category.
pub fn topics_url(base: &Url, category: Option<&str>, page: usize) -> anyhow::Result<Url> {
    let path = match category {
        Some(c) => format!("c/{}.json", c.trim_matches('/')),
        None => "latest.json".to_string(),
    };
    let mut url = base.join(&path)?;
    url.query_pairs_mut().append_pair("page", &page.to_string());
    Ok(url)
}

pub fn topic_url(base: &Url, topic_id: u64) -> anyhow::Result<Url> {
    Ok(base.join(&format!("t/{topic_id}.json"))?)
}

/// Strip markup from a post's rendered HTML and collapse whitespace.
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text: String = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Convert a topic's posts into forum records, keeping those inside `range`
/// and dropping posts whose text is empty.
pub fn posts_from_topic(base: &Url, topic: TopicDetail, range: &DateRange) -> Vec<ForumPost> {
    let root = base.as_str().trim_end_matches('/');
    let topic_path = if topic.slug.is_empty() { format!("{}", topic.id) } else { format!("{}/{}", topic.slug, topic.id) };
    topic
        .post_stream
        .posts
        .into_iter()
        .filter(|p| range.contains(p.created_at.as_deref()))
        .filter_map(|p| {
            let content = html_to_text(&p.cooked);
            if content.is_empty() { return None; }
            Some(ForumPost {
                content,
                post_url: format!("{root}/t/{topic_path}/{}", p.post_number),
                topic_title: topic.title.clone(),
                username: p.username,
                created_at: p.created_at.unwrap_or_default(),
            })
        })
        .collect()
}
