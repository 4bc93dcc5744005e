//! Answer composition: prompt assembly, the provider call and source links.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use ta_core::ScoredDocument;
use thiserror::Error;

use crate::policy::PromptPolicy;
use crate::provider::{
    Completion, CompletionOptions, CompletionProvider, CompletionRequest, ImageAttachment, ProviderError,
};

pub const MAX_LINKS: usize = 3;
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

const DESCRIBE_IMAGE_PROMPT: &str = "Describe this educational image in detail for student assistance.";
const IMAGE_ONLY_QUESTION: &str = "This image contains a question. Carefully read all visible text, \
transcribe the question, and answer it in detail. If unclear, explain what you can see.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Link {
    pub url: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerResult {
    pub answer: String,
    pub links: Vec<Link>,
}

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("question must not be empty")]
    EmptyQuestion,
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Turns a question plus ranked context into an answer with source links.
///
/// Every accepted text question costs exactly one provider call; a question
/// with an image costs one more to describe the image. Nothing is cached or
/// retried: a failed or timed-out call is returned as
/// [`ComposeError::Provider`] and the caller decides what to do.
pub struct AnswerComposer {
    provider: Arc<dyn CompletionProvider>,
    policy: PromptPolicy,
    options: CompletionOptions,
    timeout: Duration,
}

impl AnswerComposer {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            provider,
            policy: PromptPolicy::default(),
            options: CompletionOptions::default(),
            timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    pub fn with_policy(mut self, policy: PromptPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the system and user prompts for `question` over `ranked`.
    pub fn build_request(&self, question: &str, ranked: &[ScoredDocument<'_>]) -> CompletionRequest {
        CompletionRequest {
            system: self.policy.system_prompt_for(question),
            user: self.policy.user_prompt(question, &self.context_block(ranked)),
            image: None,
            options: self.options,
        }
    }

    /// Ask the provider for a description of `image`, used to widen retrieval.
    pub async fn describe_image(&self, image: &ImageAttachment) -> Result<String, ComposeError> {
        let request = CompletionRequest {
            system: self.policy.system_prompt.clone(),
            user: DESCRIBE_IMAGE_PROMPT.to_string(),
            image: Some(image.clone()),
            options: self.options,
        };
        let completion = self.complete(&request).await?;
        Ok(completion.text.trim().to_string())
    }

    /// Full answer flow for a question that may carry an image.
    ///
    /// Text-only questions go straight to [`AnswerComposer::compose`] over
    /// `retrieve(question)`. With an image, the image is described first and
    /// retrieval runs on the question plus `Image context: <description>`
    /// (or the description alone for an image-only question); the image is
    /// then attached to the answering request.
    pub async fn answer<'s, F>(
        &self,
        question: &str,
        image: Option<&ImageAttachment>,
        retrieve: F,
    ) -> Result<AnswerResult, ComposeError>
    where
        F: FnOnce(&str) -> Vec<ScoredDocument<'s>>,
    {
        let Some(image) = image else {
            if question.trim().is_empty() {
                return Err(ComposeError::EmptyQuestion);
            }
            let ranked = retrieve(question);
            return self.compose(question, &ranked).await;
        };
        if let Some(answer) = self.policy.canned_answer(question) {
            return Ok(AnswerResult { answer: answer.to_string(), links: Vec::new() });
        }

        let description = self.describe_image(image).await?;
        let question = question.trim();
        let query = if question.is_empty() {
            description
        } else {
            format!("{question}\nImage context: {description}")
        };
        let ranked = retrieve(&query);
        tracing::debug!(context_docs = ranked.len(), "retrieved with image context");

        let asked = if question.is_empty() { IMAGE_ONLY_QUESTION } else { question };
        let mut request = self.build_request(asked, &ranked);
        request.image = Some(image.clone());
        let completion = self.complete(&request).await?;
        Ok(AnswerResult { answer: completion.text, links: collect_links(&ranked) })
    }

    pub async fn compose(&self, question: &str, ranked: &[ScoredDocument<'_>]) -> Result<AnswerResult, ComposeError> {
        if question.trim().is_empty() {
            return Err(ComposeError::EmptyQuestion);
        }
        if let Some(answer) = self.policy.canned_answer(question) {
            tracing::debug!("answered from canned replies");
            return Ok(AnswerResult { answer: answer.to_string(), links: Vec::new() });
        }

        let request = self.build_request(question, ranked);
        let completion = self.complete(&request).await?;
        Ok(AnswerResult { answer: completion.text, links: collect_links(ranked) })
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ComposeError> {
        tracing::debug!(provider = self.provider.name(), image = request.image.is_some(), "requesting completion");
        match tokio::time::timeout(self.timeout, self.provider.complete(request)).await {
            Ok(res) => Ok(res?),
            Err(_) => {
                tracing::warn!(provider = self.provider.name(), timeout_secs = self.timeout.as_secs(), "completion timed out");
                Err(ProviderError::Timeout(self.timeout).into())
            }
        }
    }

    fn context_block(&self, ranked: &[ScoredDocument<'_>]) -> String {
        ranked
            .iter()
            .map(|d| {
                let mut text = match self.policy.max_context_chars {
                    Some(max) => d.document.text.chars().take(max).collect(),
                    None => d.document.text.clone(),
                };
                if self.policy.include_source_urls {
                    if let Some(url) = &d.document.url {
                        text.push_str(&format!(" (Source: {url})"));
                    }
                }
                text
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Compose with the default policy, options and timeout.
pub async fn compose(
    question: &str,
    ranked: &[ScoredDocument<'_>],
    provider: Arc<dyn CompletionProvider>,
) -> Result<AnswerResult, ComposeError> {
    AnswerComposer::new(provider).compose(question, ranked).await
}

/// First [`MAX_LINKS`] distinct URLs in rank order, labelled by origin.
pub fn collect_links(ranked: &[ScoredDocument<'_>]) -> Vec<Link> {
    let mut seen = HashSet::new();
    ranked
        .iter()
        .filter_map(|d| d.document.url.as_ref().map(|url| (url, d.document.origin)))
        .filter(|(url, _)| seen.insert(url.as_str()))
        .take(MAX_LINKS)
        .map(|(url, origin)| Link { url: url.clone(), text: origin.label().to_string() })
        .collect()
}
