use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use ta_core::persist::{load_snapshot, SnapshotPaths};
use ta_core::{Analyzer, DocumentStore, Snapshot, SourcePaths};

use crate::provider::{CompletionOptions, ProviderSettings};

const DEFAULT_ENDPOINT: &str = "https://aipipe.org/openrouter/v1";

#[derive(Parser, Debug, Clone)]
#[command(name = "ta-server")]
#[command(about = "Answer course questions with retrieved context and an LLM", long_about = None)]
pub struct Args {
    /// Prebuilt snapshot directory written by `ta-indexer build`
    #[arg(long, conflicts_with_all = ["course", "forum", "stopwords", "stem", "no_index"])]
    pub snapshot: Option<PathBuf>,
    /// Course content JSON collection (repeatable)
    #[arg(long)]
    pub course: Vec<PathBuf>,
    /// Discourse posts JSON collection (repeatable)
    #[arg(long)]
    pub forum: Vec<PathBuf>,
    /// Remove English stop words when indexing sources
    #[arg(long, default_value_t = false)]
    pub stopwords: bool,
    /// Stem terms when indexing sources
    #[arg(long, default_value_t = false)]
    pub stem: bool,
    /// Skip the TF-IDF index and rank by substring matching
    #[arg(long, default_value_t = false)]
    pub no_index: bool,
    /// Number of ranked documents sent as context
    #[arg(long, default_value_t = 5)]
    pub top_n: usize,
    /// TOML prompt policy file
    #[arg(long)]
    pub policy: Option<PathBuf>,
    /// Completion model name
    #[arg(long, default_value = "gpt-3.5-turbo")]
    pub model: String,
    /// Provider call timeout in seconds
    #[arg(long, default_value_t = 10)]
    pub timeout_secs: u64,
    /// Maximum tokens in the generated answer
    #[arg(long, default_value_t = 512)]
    pub max_tokens: u32,
    /// Sampling temperature (0.0 to 0.2)
    #[arg(long, default_value_t = 0.2)]
    pub temperature: f32,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    pub port: u16,
}

/// Where the served snapshot comes from; re-read on reload.
#[derive(Debug, Clone)]
pub enum CorpusSource {
    Prebuilt(PathBuf),
    Collections { paths: SourcePaths, analyzer: Analyzer, indexed: bool },
}

impl CorpusSource {
    /// Load and (if configured) index the corpus. Any malformed source fails
    /// the whole load.
    pub fn load(&self) -> Result<Snapshot> {
        match self {
            CorpusSource::Prebuilt(dir) => load_snapshot(&SnapshotPaths::new(dir)),
            CorpusSource::Collections { paths, analyzer, indexed } => {
                let store = DocumentStore::load(&paths.read()?)?;
                Ok(if *indexed { Snapshot::indexed(store, *analyzer) } else { Snapshot::unindexed(store) })
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub corpus: CorpusSource,
    pub provider: ProviderSettings,
    pub options: CompletionOptions,
    pub policy_path: Option<PathBuf>,
    pub top_n: usize,
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    /// Combine CLI arguments with environment: `AI_PIPE_KEY` (or
    /// `OPENAI_API_KEY`) and `OPENAI_BASE_URL`.
    pub fn from_args(args: Args) -> Result<Self> {
        let corpus = match args.snapshot {
            Some(dir) => CorpusSource::Prebuilt(dir),
            None => {
                let paths = SourcePaths { course: args.course, forum: args.forum };
                if paths.is_empty() {
                    bail!("no documents configured: pass --snapshot or at least one --course/--forum collection");
                }
                CorpusSource::Collections {
                    paths,
                    analyzer: Analyzer::new(args.stopwords, args.stem),
                    indexed: !args.no_index,
                }
            }
        };
        if args.top_n == 0 {
            bail!("--top-n must be positive");
        }
        if args.timeout_secs == 0 {
            bail!("--timeout-secs must be positive");
        }
        if !(0.0..=0.2).contains(&args.temperature) {
            bail!("--temperature must be between 0.0 and 0.2, got {}", args.temperature);
        }

        let api_key = std::env::var("AI_PIPE_KEY").or_else(|_| std::env::var("OPENAI_API_KEY")).ok();
        let endpoint = std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());

        Ok(Self {
            corpus,
            provider: ProviderSettings {
                endpoint,
                api_key,
                model: args.model,
                timeout: Duration::from_secs(args.timeout_secs),
            },
            options: CompletionOptions { max_tokens: args.max_tokens, temperature: args.temperature },
            policy_path: args.policy,
            top_n: args.top_n,
            host: args.host,
            port: args.port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_some_corpus() {
        let args = Args::parse_from(["ta-server"]);
        assert!(ServerConfig::from_args(args).is_err());
    }

    #[test]
    fn collections_build_an_indexed_source_by_default() {
        let args = Args::parse_from(["ta-server", "--course", "c.json", "--forum", "f.json", "--stem"]);
        let cfg = ServerConfig::from_args(args).unwrap();
        match cfg.corpus {
            CorpusSource::Collections { paths, analyzer, indexed } => {
                assert_eq!(paths.course, vec![PathBuf::from("c.json")]);
                assert!(analyzer.stem && !analyzer.remove_stopwords);
                assert!(indexed);
            }
            other => panic!("unexpected corpus source: {other:?}"),
        }
        assert_eq!(cfg.options, CompletionOptions::default());
        assert_eq!(cfg.provider.timeout, Duration::from_secs(10));
    }

    #[test]
    fn rejects_zero_timeout() {
        let args = Args::parse_from(["ta-server", "--forum", "f.json", "--timeout-secs", "0"]);
        assert!(ServerConfig::from_args(args).is_err());
    }

    #[test]
    fn snapshot_conflicts_with_analyzer_flags() {
        for flag in ["--stem", "--stopwords", "--no-index"] {
            assert!(Args::try_parse_from(["ta-server", "--snapshot", "snap", flag]).is_err());
        }
        assert!(Args::try_parse_from(["ta-server", "--snapshot", "snap"]).is_ok());
    }

    #[test]
    fn rejects_hot_temperature() {
        let args = Args::parse_from(["ta-server", "--forum", "f.json", "--temperature", "0.9"]);
        assert!(ServerConfig::from_args(args).is_err());
    }
}
