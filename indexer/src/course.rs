use anyhow::Result;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

lazy_static! {
    static ref IMAGE: Regex = Regex::new(r"!\[([^\]]*)\]\([^)]*\)").expect("valid regex");
}

#[derive(Debug, Serialize)]
pub struct CourseRecord {
    pub content: String,
    pub url: String,
    pub file_path: String,
    pub word_count: usize,
}

/// Walk `repo` for Markdown pages (skipping READMEs and hidden directories)
/// and turn each non-empty page into a course record linked under `base_url`.
pub fn collect(repo: &Path, base_url: &str) -> Result<Vec<CourseRecord>> {
    anyhow::ensure!(repo.is_dir(), "course repository {} is not a directory", repo.display());
    let mut files: Vec<PathBuf> = WalkDir::new(repo)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable path");
                None
            }
        })
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && is_markdown_page(p))
        .collect();
    files.sort();

    let base = base_url.trim_end_matches('/');
    let mut records = Vec::with_capacity(files.len());
    for file in files {
        let raw = fs::read_to_string(&file)?;
        let content = replace_images(&raw);
        if content.trim().is_empty() {
            tracing::debug!(file = %file.display(), "skipping empty page");
            continue;
        }
        let rel = file.strip_prefix(repo).unwrap_or(&file);
        let rel_posix = rel.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/");
        records.push(CourseRecord {
            word_count: content.split_whitespace().count(),
            url: format!("{base}/{rel_posix}"),
            file_path: rel_posix,
            content,
        });
    }
    Ok(records)
}

fn is_markdown_page(p: &Path) -> bool {
    let is_md = p.extension().and_then(|s| s.to_str()).map_or(false, |e| e.eq_ignore_ascii_case("md"));
    let is_readme = p.file_name().and_then(|s| s.to_str()).map_or(false, |n| n.eq_ignore_ascii_case("readme.md"));
    is_md && !is_readme
}

/// Replace `![alt](src)` with `[Image: alt]` so alt text stays searchable.
fn replace_images(markdown: &str) -> String {
    IMAGE
        .replace_all(markdown, |caps: &regex::Captures| {
            let alt = caps[1].trim();
            if alt.is_empty() { "[Image]".to_string() } else { format!("[Image: {alt}]") }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn images_become_alt_text() {
        assert_eq!(replace_images("see ![token chart](img/a.png) and ![](b.png)"), "see [Image: token chart] and [Image]");
    }

    #[test]
    fn walks_markdown_pages_only() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("week1")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("README.md"), "readme").unwrap();
        fs::write(root.join("week1/tokens.md"), "# Tokens\n![chart](c.png)").unwrap();
        fs::write(root.join("week1/empty.md"), "  \n").unwrap();
        fs::write(root.join("notes.txt"), "not markdown").unwrap();
        fs::write(root.join(".git/HEAD.md"), "hidden").unwrap();

        let records = collect(root, "https://github.com/org/course/blob/main/").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].file_path, "week1/tokens.md");
        assert_eq!(records[0].url, "https://github.com/org/course/blob/main/week1/tokens.md");
        assert_eq!(records[0].content, "# Tokens\n[Image: chart]");
        assert_eq!(records[0].word_count, 4);
    }

    #[test]
    fn missing_repository_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(collect(&dir.path().join("absent"), "https://x").is_err());
    }
}
