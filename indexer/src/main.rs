use anyhow::Result;
use clap::{Parser, Subcommand};
use ta_core::persist::{save_snapshot, SnapshotPaths};
use ta_core::{Analyzer, DocumentStore, Snapshot, SourcePaths};
use tracing_subscriber::{EnvFilter, fmt};

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

mod course;

#[derive(Parser)]
#[command(name = "ta-indexer")]
#[command(about = "Build retrieval snapshots and course content collections", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a snapshot from course and forum JSON collections
    Build {
        /// Course content JSON collection (repeatable)
        #[arg(long)]
        course: Vec<PathBuf>,
        /// Discourse posts JSON collection (repeatable)
        #[arg(long)]
        forum: Vec<PathBuf>,
        /// Output snapshot directory
        #[arg(long)]
        output: PathBuf,
        /// Remove English stop words
        #[arg(long, default_value_t = false)]
        stopwords: bool,
        /// Stem terms with the English Snowball stemmer
        #[arg(long, default_value_t = false)]
        stem: bool,
        /// Store documents only; the server will rank by substring matching
        #[arg(long, default_value_t = false)]
        no_index: bool,
    },
    /// Convert a checked-out course repository of Markdown files into a course collection
    Course {
        /// Repository root to walk
        #[arg(long)]
        repo: PathBuf,
        /// URL prefix for links, e.g. https://github.com/<owner>/<repo>/blob/main
        #[arg(long)]
        base_url: String,
        /// Output JSON file
        #[arg(long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { course, forum, output, stopwords, stem, no_index } => {
            let paths = SourcePaths { course, forum };
            anyhow::ensure!(!paths.is_empty(), "pass at least one --course or --forum collection");
            build_snapshot(&paths, &output, Analyzer::new(stopwords, stem), !no_index)
        }
        Commands::Course { repo, base_url, output } => {
            let records = course::collect(&repo, &base_url)?;
            let f = BufWriter::new(File::create(&output)?);
            serde_json::to_writer_pretty(f, &records)?;
            tracing::info!(files = records.len(), output = %output.display(), "course collection written");
            Ok(())
        }
    }
}

fn build_snapshot(paths: &SourcePaths, output: &Path, analyzer: Analyzer, indexed: bool) -> Result<()> {
    let store = DocumentStore::load(&paths.read()?)?;
    tracing::info!(num_docs = store.len(), "ingested documents");

    let snapshot = if indexed { Snapshot::indexed(store, analyzer) } else { Snapshot::unindexed(store) };
    let meta = save_snapshot(&SnapshotPaths::new(output), &snapshot)?;

    tracing::info!(output = %output.display(), num_docs = meta.num_docs, num_terms = meta.num_terms, "snapshot build complete");
    Ok(())
}
