use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful teaching assistant for the Tools in Data Science course. \
Answer student questions using the provided course material and Discourse posts. \
If you use information from a source, cite it by its link. \
If the context does not contain the answer, say so honestly instead of guessing.";

const DEFAULT_INSTRUCTIONS: &str = "Answer the following student question using the provided context from course content and Discourse posts.";

/// Appends `instruction` to the system prompt when the question mentions `keyword`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PromptRule {
    pub keyword: String,
    pub instruction: String,
}

/// A fixed reply for questions containing `trigger`; answered without
/// retrieval context or a provider call.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CannedAnswer {
    pub trigger: String,
    pub answer: String,
}

/// Prompt templates and question-dependent tweaks, loadable from TOML.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PromptPolicy {
    pub system_prompt: String,
    pub instructions: String,
    /// Truncate each context document to this many characters.
    pub max_context_chars: Option<usize>,
    /// Follow each context document with `(Source: <url>)`.
    pub include_source_urls: bool,
    pub rules: Vec<PromptRule>,
    pub canned: Vec<CannedAnswer>,
}

impl Default for PromptPolicy {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            max_context_chars: None,
            include_source_urls: false,
            rules: Vec::new(),
            canned: Vec::new(),
        }
    }
}

impl PromptPolicy {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let policy: PromptPolicy = toml::from_str(s)?;
        Ok(policy)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading prompt policy {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("parsing prompt policy {}", path.display()))
    }

    pub fn canned_answer(&self, question: &str) -> Option<&str> {
        let q = question.to_lowercase();
        self.canned
            .iter()
            .find(|c| !c.trigger.trim().is_empty() && q.contains(&c.trigger.to_lowercase()))
            .map(|c| c.answer.as_str())
    }

    pub fn system_prompt_for(&self, question: &str) -> String {
        let q = question.to_lowercase();
        let mut prompt = self.system_prompt.clone();
        for rule in &self.rules {
            if !rule.keyword.trim().is_empty() && q.contains(&rule.keyword.to_lowercase()) {
                prompt.push(' ');
                prompt.push_str(&rule.instruction);
            }
        }
        prompt
    }

    pub fn user_prompt(&self, question: &str, context: &str) -> String {
        format!("{}\n\nQuestion: {}\n\nContext:\n{}", self.instructions, question.trim(), context)
    }
}
