//! Priority ranking through a hosted chat-completion endpoint
//!
//! The service answers in free text with a comma-separated list of 1-based
//! positions. That answer is untrusted: anything other than an exact
//! permutation of `1..=N` is rejected before the input order is touched.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::RankingConfig;
use crate::error::{PriorityError, Result};
use crate::http::HttpTransport;
use crate::models::Message;

/// Orders messages from most to least important
#[async_trait]
pub trait PriorityRanker: Send + Sync {
    async fn rank(&self, messages: &[Message]) -> Result<Vec<Message>>;
}

/// Supplies the credential presented to the ranking endpoint
pub trait ApiKeySource: Send + Sync {
    /// `Ok(None)` means send no credential
    fn api_key(&self) -> Result<Option<String>>;
}

/// Reads the API key from an environment variable at call time
pub struct EnvApiKey {
    var: String,
}

impl EnvApiKey {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl ApiKeySource for EnvApiKey {
    fn api_key(&self) -> Result<Option<String>> {
        match std::env::var(&self.var) {
            Ok(key) if !key.trim().is_empty() => Ok(Some(key)),
            _ => Err(PriorityError::ConfigError(format!(
                "{} not set; export the ranking API key or set ranking.proxy",
                self.var
            ))),
        }
    }
}

/// For proxies that attach the credential server-side
pub struct NoApiKey;

impl ApiKeySource for NoApiKey {
    fn api_key(&self) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Pick the credential source the configuration asks for
pub fn api_key_source(config: &RankingConfig) -> Arc<dyn ApiKeySource> {
    if config.proxy {
        Arc::new(NoApiKey)
    } else {
        Arc::new(EnvApiKey::new(config.api_key_env.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionEnvelope {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

/// Build the system + user prompt for `messages`
pub fn build_prompt(messages: &[Message]) -> Vec<ChatMessage> {
    let n = messages.len();
    let system = format!(
        "You are an AI email assistant. Rank the following emails by priority based on \
         general sentiment analysis, considering the body of the message and the subject. \
         Focus on importance and urgency. Answer with nothing but a comma-separated list of \
         {n} integers between 1 and {n} inclusive, each used exactly once, giving the email \
         numbers in order of importance. Do not add any other text."
    );

    let user = messages
        .iter()
        .enumerate()
        .map(|(index, m)| format!("Email {}:\nSubject: {}\nBody: {}", index + 1, m.subject, m.snippet))
        .collect::<Vec<_>>()
        .join("\n\n");

    vec![
        ChatMessage {
            role: "system".to_string(),
            content: system,
        },
        ChatMessage {
            role: "user".to_string(),
            content: user,
        },
    ]
}

/// Parse and validate a 1-based permutation of `1..=expected`
pub fn parse_permutation(content: &str, expected: usize) -> Result<Vec<usize>> {
    let ranks = content
        .trim()
        .split(',')
        .map(|field| {
            let field = field.trim();
            field.parse::<usize>().map_err(|_| {
                PriorityError::RankParseError(format!("'{}' is not a rank", field))
            })
        })
        .collect::<Result<Vec<usize>>>()?;

    if ranks.len() != expected {
        return Err(PriorityError::RankParseError(format!(
            "expected {} ranks, got {}",
            expected,
            ranks.len()
        )));
    }

    let mut seen = HashSet::with_capacity(expected);
    for &rank in &ranks {
        if rank == 0 || rank > expected {
            return Err(PriorityError::RankParseError(format!(
                "rank {} outside 1..={}",
                rank, expected
            )));
        }
        if !seen.insert(rank) {
            return Err(PriorityError::RankParseError(format!(
                "rank {} appears more than once",
                rank
            )));
        }
    }

    Ok(ranks)
}

/// Output position `i` takes input element `permutation[i] - 1`
pub fn apply_permutation(messages: &[Message], permutation: &[usize]) -> Vec<Message> {
    permutation
        .iter()
        .map(|&rank| messages[rank - 1].clone())
        .collect()
}

/// Extract the answer text from a completion response body
fn completion_content(status: u16, body: &[u8]) -> Result<String> {
    let envelope: CompletionEnvelope = match serde_json::from_slice(body) {
        Ok(envelope) => envelope,
        Err(e) if (200..300).contains(&status) => {
            return Err(PriorityError::RankParseError(format!(
                "malformed completion response: {}",
                e
            )))
        }
        Err(_) => {
            return Err(PriorityError::HttpStatus {
                status,
                message: String::from_utf8_lossy(body).into_owned(),
            })
        }
    };

    if let Some(error) = envelope.error {
        return Err(PriorityError::RankParseError(format!(
            "ranking service error: {}",
            error.message
        )));
    }
    if !(200..300).contains(&status) {
        return Err(PriorityError::HttpStatus {
            status,
            message: "completion endpoint returned no error body".to_string(),
        });
    }

    envelope
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| PriorityError::RankParseError("response has no choices".to_string()))
}

/// Ranker backed by a chat-completion endpoint, decoding deterministically
pub struct ChatCompletionRanker {
    transport: HttpTransport,
    config: RankingConfig,
    key_source: Arc<dyn ApiKeySource>,
}

impl ChatCompletionRanker {
    pub fn new(
        transport: HttpTransport,
        config: RankingConfig,
        key_source: Arc<dyn ApiKeySource>,
    ) -> Self {
        Self {
            transport,
            config,
            key_source,
        }
    }

    pub fn request_for(&self, messages: &[Message]) -> CompletionRequest {
        CompletionRequest {
            model: self.config.model.clone(),
            messages: build_prompt(messages),
            max_tokens: self.config.max_tokens,
            temperature: 0.0,
        }
    }
}

#[async_trait]
impl PriorityRanker for ChatCompletionRanker {
    async fn rank(&self, messages: &[Message]) -> Result<Vec<Message>> {
        if messages.is_empty() {
            return Ok(Vec::new());
        }

        let key = self.key_source.api_key()?;
        let request = self.request_for(messages);

        info!(
            "Requesting ranking of {} messages from {}",
            messages.len(),
            self.config.model
        );
        let response = self
            .transport
            .post_json(&self.config.endpoint, key.as_deref(), &request)
            .await?;

        let content = completion_content(response.status.as_u16(), &response.body)?;
        debug!("Ranking response: {:?}", content);

        let permutation = parse_permutation(&content, messages.len())?;
        Ok(apply_permutation(messages, &permutation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn messages(n: usize) -> Vec<Message> {
        (1..=n)
            .map(|i| Message::new(format!("m{}", i), format!("subject {}", i), "body"))
            .collect()
    }

    #[test]
    fn test_reorders_two_messages() {
        let input = vec![
            Message::new("a", "Urgent", "Server down"),
            Message::new("b", "FYI", "Lunch"),
        ];
        let permutation = parse_permutation("2,1", 2).unwrap();
        let ranked = apply_permutation(&input, &permutation);

        let ids: Vec<_> = ranked.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_parse_tolerates_whitespace() {
        assert_eq!(parse_permutation(" 3, 1 ,2\n", 3).unwrap(), vec![3, 1, 2]);
        assert_eq!(parse_permutation("1", 1).unwrap(), vec![1]);
    }

    #[test]
    fn test_parse_rejects_length_mismatch() {
        let err = parse_permutation("1,2", 3).unwrap_err();
        assert!(err.to_string().contains("expected 3 ranks, got 2"));
    }

    #[test]
    fn test_parse_rejects_out_of_range() {
        assert!(matches!(
            parse_permutation("0,1", 2),
            Err(PriorityError::RankParseError(_))
        ));
        assert!(parse_permutation("1,3", 2)
            .unwrap_err()
            .to_string()
            .contains("outside 1..=2"));
    }

    #[test]
    fn test_parse_rejects_duplicates() {
        assert!(parse_permutation("1,1,2", 3)
            .unwrap_err()
            .to_string()
            .contains("more than once"));
    }

    #[test]
    fn test_parse_rejects_prose() {
        assert!(parse_permutation("Here is the ranking: 2,1", 2).is_err());
        assert!(parse_permutation("2,-1", 2).is_err());
        assert!(parse_permutation("", 1).is_err());
    }

    #[test]
    fn test_prompt_lists_each_message() {
        let prompt = build_prompt(&messages(2));
        assert_eq!(prompt.len(), 2);
        assert_eq!(prompt[0].role, "system");
        assert!(prompt[0].content.contains("2 integers between 1 and 2"));
        assert_eq!(
            prompt[1].content,
            "Email 1:\nSubject: subject 1\nBody: body\n\nEmail 2:\nSubject: subject 2\nBody: body"
        );
    }

    #[test]
    fn test_completion_content_success() {
        let body = br#"{"choices":[{"message":{"role":"assistant","content":"2,1"}}]}"#;
        assert_eq!(completion_content(200, body).unwrap(), "2,1");
    }

    #[test]
    fn test_completion_content_error_envelope() {
        let body = br#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        let err = completion_content(401, body).unwrap_err();
        assert!(matches!(err, PriorityError::RankParseError(_)));
        assert!(err.to_string().contains("Incorrect API key"));

        // Error envelope on a 200 is still an error
        assert!(completion_content(200, body).is_err());
    }

    #[test]
    fn test_completion_content_non_json_failure_is_http_status() {
        let err = completion_content(502, b"<html>Bad gateway</html>").unwrap_err();
        assert!(matches!(err, PriorityError::HttpStatus { status: 502, .. }));
    }

    #[test]
    fn test_completion_content_no_choices() {
        let err = completion_content(200, br#"{"choices":[]}"#).unwrap_err();
        assert!(matches!(err, PriorityError::RankParseError(_)));
    }

    #[test]
    fn test_no_api_key_source() {
        assert_eq!(NoApiKey.api_key().unwrap(), None);

        let mut config = RankingConfig::default();
        config.proxy = true;
        assert_eq!(api_key_source(&config).api_key().unwrap(), None);
    }

    proptest! {
        #[test]
        fn prop_valid_permutation_is_bijection(perm in (1usize..20).prop_flat_map(|n| {
            Just((1..=n).collect::<Vec<usize>>()).prop_shuffle()
        })) {
            let n = perm.len();
            let input = messages(n);
            let text = perm.iter().map(|r| r.to_string()).collect::<Vec<_>>().join(",");

            let parsed = parse_permutation(&text, n).unwrap();
            let ranked = apply_permutation(&input, &parsed);

            prop_assert_eq!(ranked.len(), n);
            let mut ids: Vec<_> = ranked.iter().map(|m| m.id.clone()).collect();
            ids.sort();
            let mut expected: Vec<_> = input.iter().map(|m| m.id.clone()).collect();
            expected.sort();
            prop_assert_eq!(ids, expected);

            for (i, rank) in parsed.iter().enumerate() {
                prop_assert_eq!(&ranked[i], &input[rank - 1]);
            }
        }

        #[test]
        fn prop_duplicate_always_rejected(n in 2usize..20, dup in 0usize..19) {
            let dup = dup % n;
            let mut ranks: Vec<usize> = (1..=n).collect();
            // Overwrite one slot with another slot's value
            ranks[(dup + 1) % n] = ranks[dup];
            let text = ranks.iter().map(|r| r.to_string()).collect::<Vec<_>>().join(",");
            prop_assert!(parse_permutation(&text, n).is_err());
        }

        #[test]
        fn prop_arbitrary_text_never_panics(text in ".{0,40}", n in 1usize..16) {
            if let Ok(perm) = parse_permutation(&text, n) {
                prop_assert_eq!(perm.len(), n);
                let input = messages(n);
                prop_assert_eq!(apply_permutation(&input, &perm).len(), n);
            }
        }
    }
}
