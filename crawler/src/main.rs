use anyhow::{anyhow, Context, Result};
use clap::Parser;
use reqwest::{header, Client, StatusCode, Url};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;
use tracing_subscriber::{fmt, EnvFilter};

mod discourse;

use discourse::{posts_from_topic, topic_url, topics_url, DateRange, ForumPost, TopicDetail, TopicListPage, TopicSummary};

#[derive(Parser, Debug)]
#[command(name = "ta-crawler")]
#[command(about = "Fetch Discourse forum posts into a forum JSON collection")]
struct Cli {
    /// Discourse instance root
    #[arg(long, default_value = "https://discourse.onlinedegree.iitm.ac.in")]
    base_url: String,
    /// Category path such as `courses/tds-kb/34`; omitted means the latest feed
    #[arg(long)]
    category: Option<String>,
    /// Number of topic list pages to scan
    #[arg(long, default_value_t = 5)]
    pages: usize,
    /// First day (inclusive), YYYY-MM-DD
    #[arg(long, default_value = "2025-01-01")]
    since: String,
    /// Last day (inclusive), YYYY-MM-DD
    #[arg(long, default_value = "2025-04-14")]
    until: String,
    /// Output JSON file path
    #[arg(long, default_value = "./data/discourse_posts.json")]
    output: String,
    /// Concurrent topic fetches
    #[arg(long, default_value_t = 4)]
    concurrency: usize,
    /// Request timeout seconds
    #[arg(long, default_value_t = 12)]
    timeout_secs: u64,
    /// Pause between topic list pages, in milliseconds
    #[arg(long, default_value_t = 500)]
    delay_ms: u64,
    #[arg(long, default_value = "ta-crawler/0.1")]
    user_agent: String,
    /// Attempts per request before giving up (transport errors, 429 and 5xx)
    #[arg(long, default_value_t = 5)]
    max_retries: u32,
}

/// Retry schedule for one request: up to `max_retries` attempts, waiting
/// `base_delay`, then twice as long, and so on between them.
#[derive(Debug, Clone, Copy)]
struct Backoff {
    max_retries: u32,
    base_delay: Duration,
}

impl Backoff {
    fn new(max_retries: u32) -> Self {
        Self { max_retries: max_retries.max(1), base_delay: Duration::from_secs(1) }
    }

    /// Wait before attempt `attempt + 1`, or `None` once attempts are used up.
    fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt + 1 >= self.max_retries {
            return None;
        }
        Some(self.base_delay.saturating_mul(2u32.saturating_pow(attempt)))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Cli::parse();

    let range = DateRange::parse(&args.since, &args.until)?;
    let base = Url::parse(&format!("{}/", args.base_url.trim_end_matches('/'))).context("invalid --base-url")?;
    ensure_parent_dir(Path::new(&args.output))?;

    let mut headers = header::HeaderMap::new();
    if let Ok(cookie) = std::env::var("DISCOURSE_COOKIE") {
        let mut value = header::HeaderValue::from_str(&format!("_t={cookie}")).context("DISCOURSE_COOKIE is not a valid header value")?;
        value.set_sensitive(true);
        headers.insert(header::COOKIE, value);
    }
    let client = Client::builder()
        .user_agent(args.user_agent.clone())
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(5))
        .timeout(Duration::from_secs(args.timeout_secs))
        .build()?;

    let backoff = Backoff::new(args.max_retries);
    let topics = list_topics(&client, &base, args.category.as_deref(), args.pages, &range, args.delay_ms, backoff).await;
    if topics.is_empty() {
        return Err(anyhow!("no topics found between {} and {}", args.since, args.until));
    }
    tracing::info!(topics = topics.len(), concurrency = args.concurrency, "fetching topics");

    let mut pending = topics.into_iter();
    let mut posts: Vec<ForumPost> = Vec::new();
    let mut failed = 0usize;
    let mut inflight: Vec<tokio::task::JoinHandle<(u64, Result<TopicDetail>)>> = Vec::new();

    loop {
        while inflight.len() < args.concurrency.max(1) {
            let Some(topic) = pending.next() else { break };
            let client_c = client.clone();
            let base_c = base.clone();
            inflight.push(tokio::spawn(async move {
                (topic.id, fetch_topic(&client_c, &base_c, topic.id, backoff).await)
            }));
        }
        if inflight.is_empty() { break; }

        let mut i = 0;
        while i < inflight.len() {
            if inflight[i].is_finished() {
                let h = inflight.swap_remove(i);
                match h.await {
                    Ok((_, Ok(detail))) => posts.extend(posts_from_topic(&base, detail, &range)),
                    Ok((id, Err(e))) => {
                        failed += 1;
                        tracing::warn!(topic = id, error = %e, "topic fetch failed");
                    }
                    Err(e) => {
                        failed += 1;
                        tracing::warn!(error = %e, "topic task panicked");
                    }
                }
            } else {
                i += 1;
            }
        }
        sleep(Duration::from_millis(10)).await;
    }

    posts.sort_by(|a, b| a.post_url.cmp(&b.post_url));
    let out = BufWriter::new(File::create(&args.output)?);
    serde_json::to_writer_pretty(out, &posts)?;
    tracing::info!(posts = posts.len(), failed_topics = failed, output = %args.output, "forum collection written");
    Ok(())
}

/// Page through the topic list until `pages` pages were read or a page comes
/// back empty or fails, keeping topics created inside `range`.
async fn list_topics(
    client: &Client,
    base: &Url,
    category: Option<&str>,
    pages: usize,
    range: &DateRange,
    delay_ms: u64,
    backoff: Backoff,
) -> Vec<TopicSummary> {
    let mut topics = Vec::new();
    for page in 0..pages {
        let url = match topics_url(base, category, page) {
            Ok(u) => u,
            Err(e) => {
                tracing::warn!(error = %e, "cannot build topic list url");
                break;
            }
        };
        let listing: TopicListPage = match get_json(client, url.clone(), backoff).await {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(%url, error = %e, "topic list page failed; stopping");
                break;
            }
        };
        if listing.topic_list.topics.is_empty() {
            tracing::debug!(page, "empty topic list page; stopping");
            break;
        }
        let before = topics.len();
        topics.extend(listing.topic_list.topics.into_iter().filter(|t| range.contains(t.created_at.as_deref())));
        tracing::debug!(page, kept = topics.len() - before, "topic list page");
        if delay_ms > 0 { sleep(Duration::from_millis(delay_ms)).await; }
    }
    topics.sort_by_key(|t| t.id);
    topics.dedup_by_key(|t| t.id);
    topics
}

async fn fetch_topic(client: &Client, base: &Url, id: u64, backoff: Backoff) -> Result<TopicDetail> {
    get_json(client, topic_url(base, id)?, backoff).await
}

/// GET `url` as JSON, retrying transport errors, 429 and 5xx responses on the
/// `backoff` schedule. Other statuses fail at once.
async fn get_json<T: serde::de::DeserializeOwned>(client: &Client, url: Url, backoff: Backoff) -> Result<T> {
    let mut attempt = 0;
    loop {
        let err = match client.get(url.clone()).header(header::ACCEPT, "application/json").send().await {
            Ok(resp) if resp.status().is_success() => return Ok(resp.json::<T>().await?),
            Ok(resp) if is_retryable(resp.status()) => anyhow!("http status {}", resp.status()),
            Ok(resp) => return Err(anyhow!("http status {}", resp.status())),
            Err(e) => anyhow::Error::new(e),
        };
        let Some(wait) = backoff.delay_after(attempt) else {
            return Err(err.context(format!("giving up on {url} after {} attempts", attempt + 1)));
        };
        tracing::warn!(%url, attempt = attempt + 1, wait_ms = wait.as_millis() as u64, error = %err, "request failed; retrying");
        sleep(wait).await;
        attempt += 1;
    }
}

fn ensure_parent_dir(output: &Path) -> Result<()> {
    if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating output directory {}", dir.display()))?;
    }
    Ok(())
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}
