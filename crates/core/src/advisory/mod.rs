//! Human-readable explanation and remediation steps for a conflict record.
//!
//! The generator asks a [`LanguageModel`] for advice and splits the reply
//! into an explanation and numbered steps. Whenever that is not possible
//! (no API key, provider error, timeout) the static table in [`fallback`]
//! answers instead.

pub mod fallback;
pub mod llm;

use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;

use regex_lite::Regex;
use tracing::{debug, info, instrument, warn};

use crate::config::AdvisoryConfig;
use crate::errors::AdvisoryError;
use crate::models::{AdvisoryResult, ConflictRecord};

pub use fallback::fallback_advice;
pub use llm::LlmClient;

/// Start of a numbered list item such as `1.` or `2)`.
static STEP_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*\d+[.)]\s+").expect("step boundary pattern is valid"));

/// Capability to turn a prompt into text.
pub trait LanguageModel: Send + Sync {
    fn generate(
        &self,
        prompt: &str,
        max_tokens: u32,
    ) -> impl Future<Output = Result<String, AdvisoryError>> + Send;
}

/// Keep at most `max` problems verbatim and summarize the rest in one line.
pub fn sample_problems(problems: &[String], max: usize) -> Vec<String> {
    let mut sample: Vec<String> = problems.iter().take(max).cloned().collect();
    if problems.len() > max {
        sample.push(format!(
            "...and {} more similar issues",
            problems.len() - max
        ));
    }
    sample
}

/// Split a model reply into the text before the first numbered item and
/// the items themselves.
pub fn parse_response(text: &str) -> AdvisoryResult {
    let mut segments = STEP_BOUNDARY.split(text);
    let explanation = segments.next().unwrap_or_default().trim().to_string();
    let steps = segments
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    AdvisoryResult { explanation, steps }
}

/// Builds prompts, calls the model and parses its answer.
pub struct AdvisoryGenerator<M> {
    model: M,
    max_tokens: u32,
    max_problems: usize,
    timeout: Duration,
}

impl<M: LanguageModel> AdvisoryGenerator<M> {
    pub fn new(model: M, config: &AdvisoryConfig) -> Self {
        Self {
            model,
            max_tokens: config.max_tokens,
            max_problems: config.max_problems,
            timeout: config.timeout(),
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn build_prompt(&self, record: &ConflictRecord) -> String {
        let problems = sample_problems(&record.problems, self.max_problems)
            .into_iter()
            .map(|p| format!("- {}", p))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "A JavaScript project's dependencies failed a pre-commit check.\n\
             \n\
             Conflict type: {kind}\n\
             Reported by: {source}\n\
             Problems:\n\
             {problems}\n\
             \n\
             Respond with:\n\
             - a concise explanation of the root cause, in one short paragraph;\n\
             - then at most 3 remediation steps as a numbered list (1., 2., 3.);\n\
             - optionally, a short code or command example inside the relevant step.\n\
             Do not add any text before the explanation.",
            kind = record.kind,
            source = record.source_file,
            problems = problems,
        )
    }

    /// Ask the model for advice. Bounded by the configured timeout.
    #[instrument(skip_all, fields(kind = %record.kind))]
    pub async fn generate(&self, record: &ConflictRecord) -> Result<AdvisoryResult, AdvisoryError> {
        let prompt = self.build_prompt(record);
        debug!(prompt_len = prompt.len(), "requesting advisory");

        let text = tokio::time::timeout(self.timeout, self.model.generate(&prompt, self.max_tokens))
            .await
            .map_err(|_| AdvisoryError::Timeout(self.timeout.as_secs()))??;

        let advice = parse_response(&text);
        if advice.explanation.is_empty() && advice.steps.is_empty() {
            return Err(AdvisoryError::MalformedResponse(
                "model returned an empty reply".into(),
            ));
        }
        info!(steps = advice.steps.len(), "advisory generated");
        Ok(advice)
    }

    /// Like [`generate`](Self::generate), but any failure yields the static
    /// advice for the record's kind.
    pub async fn advise_or_fallback(&self, record: &ConflictRecord) -> AdvisoryResult {
        match self.generate(record).await {
            Ok(advice) => advice,
            Err(e) => {
                warn!(error = %e, "advisory failed; using static advice");
                fallback_advice(record.kind)
            }
        }
    }
}

/// Advice for `record` using the configured provider, or the static table
/// when the advisory step is disabled or has no API key.
pub async fn advise(record: &ConflictRecord, config: &AdvisoryConfig) -> AdvisoryResult {
    if !config.is_available() {
        debug!("language model unavailable; using static advice");
        return fallback_advice(record.kind);
    }
    match LlmClient::from_config(config) {
        Ok(client) => {
            AdvisoryGenerator::new(client, config)
                .advise_or_fallback(record)
                .await
        }
        Err(e) => {
            warn!(error = %e, "could not build language model client; using static advice");
            fallback_advice(record.kind)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConflictKind;
    use std::sync::Mutex;

    /// Records the last prompt and replies with a canned result.
    struct FakeModel {
        reply: Result<String, u16>,
        delay: Option<Duration>,
        prompts: Mutex<Vec<String>>,
    }

    impl FakeModel {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                delay: None,
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing(status: u16) -> Self {
            Self {
                reply: Err(status),
                delay: None,
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn last_prompt(&self) -> String {
            self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    impl LanguageModel for FakeModel {
        async fn generate(&self, prompt: &str, _max_tokens: u32) -> Result<String, AdvisoryError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(status) => Err(AdvisoryError::Provider {
                    status: *status,
                    body: "overloaded".into(),
                }),
            }
        }
    }

    fn record(n: usize) -> ConflictRecord {
        let problems = (0..n).map(|i| format!("pkg-{i}@1.0.0 is invalid")).collect();
        ConflictRecord::new(ConflictKind::InvalidDependencies, problems, "package.json")
    }

    #[test]
    fn test_sample_problems_truncates() {
        let problems: Vec<String> = (0..8).map(|i| i.to_string()).collect();
        let sample = sample_problems(&problems, 5);
        assert_eq!(sample.len(), 6);
        assert_eq!(&sample[..5], &problems[..5]);
        assert_eq!(sample[5], "...and 3 more similar issues");

        let short = sample_problems(&problems[..5], 5);
        assert_eq!(short, problems[..5].to_vec());
    }

    #[test]
    fn test_prompt_contains_sampled_problems() {
        let generator = AdvisoryGenerator::new(FakeModel::replying(""), &AdvisoryConfig::default());
        let prompt = generator.build_prompt(&record(8));

        assert!(prompt.contains("Conflict type: invalid_dependencies"));
        assert!(prompt.contains("Reported by: package.json"));
        for i in 0..5 {
            assert!(prompt.contains(&format!("- pkg-{i}@1.0.0 is invalid")));
        }
        assert!(!prompt.contains("pkg-5@1.0.0"));
        assert_eq!(prompt.matches("more similar issues").count(), 1);
        assert!(prompt.contains("- ...and 3 more similar issues"));
    }

    #[test]
    fn test_parse_response_splits_steps() {
        let text = "Two sections pin different majors of left-pad.\n\n\
                    1. Pick one version.\n\
                    2) Remove the duplicate entry from devDependencies.\n   \
                    3. Run `npm install`.\n";
        let advice = parse_response(text);
        assert_eq!(
            advice.explanation,
            "Two sections pin different majors of left-pad."
        );
        assert_eq!(
            advice.steps,
            vec![
                "Pick one version.",
                "Remove the duplicate entry from devDependencies.",
                "Run `npm install`.",
            ]
        );
    }

    #[test]
    fn test_parse_response_without_list() {
        let advice = parse_response("  Just reinstall.  ");
        assert_eq!(advice.explanation, "Just reinstall.");
        assert!(advice.steps.is_empty());

        let advice = parse_response("1. Only steps\n2. here");
        assert_eq!(advice.explanation, "");
        assert_eq!(advice.steps, vec!["Only steps", "here"]);
    }

    #[test]
    fn test_parse_response_keeps_inline_numbers() {
        let advice = parse_response("Upgrade to 2.0 first.\n1. Bump react to 18.2.0 now");
        assert_eq!(advice.explanation, "Upgrade to 2.0 first.");
        assert_eq!(advice.steps, vec!["Bump react to 18.2.0 now"]);
    }

    #[tokio::test]
    async fn test_generate_passes_prompt_and_parses() {
        let model = FakeModel::replying("Root cause.\n1. Step one\n2. Step two");
        let generator = AdvisoryGenerator::new(model, &AdvisoryConfig::default());

        let advice = generator.generate(&record(2)).await.unwrap();
        assert_eq!(advice.explanation, "Root cause.");
        assert_eq!(advice.steps.len(), 2);
        assert!(generator.model().last_prompt().contains("pkg-1@1.0.0"));
    }

    #[tokio::test]
    async fn test_empty_reply_is_malformed() {
        let generator = AdvisoryGenerator::new(FakeModel::replying("  \n"), &AdvisoryConfig::default());
        let result = generator.generate(&record(1)).await;
        assert!(matches!(result, Err(AdvisoryError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_provider_error_falls_back() {
        let generator = AdvisoryGenerator::new(FakeModel::failing(529), &AdvisoryConfig::default());
        let advice = generator.advise_or_fallback(&record(1)).await;
        assert_eq!(advice, fallback_advice(ConflictKind::InvalidDependencies));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_model_times_out() {
        let model = FakeModel {
            delay: Some(Duration::from_secs(60)),
            ..FakeModel::replying("late")
        };
        let generator = AdvisoryGenerator::new(model, &AdvisoryConfig::default());

        let result = generator.generate(&record(1)).await;
        assert!(matches!(result, Err(AdvisoryError::Timeout(10))));
    }

    #[tokio::test]
    async fn test_advise_without_key_uses_table() {
        let config = AdvisoryConfig::default();
        let advice = advise(&record(1), &config).await;
        assert_eq!(advice, fallback_advice(ConflictKind::InvalidDependencies));
    }
}
