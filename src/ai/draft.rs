//! Prompt construction and reply parsing for generated email drafts

use crate::ai::{AIError, AIProvider, AIResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Language the draft is written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DraftLanguage {
    English,
    Japanese,
    #[default]
    Korean,
}

impl DraftLanguage {
    /// Name passed to the model
    pub fn display_name(&self) -> &'static str {
        match self {
            DraftLanguage::English => "English",
            DraftLanguage::Japanese => "日本語",
            DraftLanguage::Korean => "한국어",
        }
    }

    /// Opening line the body must start with
    pub fn greeting(&self, brand: &str) -> String {
        match self {
            DraftLanguage::English => format!("Hello, this is the {} team.", brand),
            DraftLanguage::Japanese => format!("こんにちは、{}です。", brand),
            DraftLanguage::Korean => format!("안녕하세요, {}입니다.", brand),
        }
    }

    /// Support paragraph placed near the end of the body
    pub fn support_info(&self, support_email: &str, inquiry_url: &str) -> String {
        match self {
            DraftLanguage::English => format!(
                "If you have any questions, feel free to reply to this email ({}) or visit our <a href=\"{}\" target=\"_blank\">inquiry page</a>.",
                support_email, inquiry_url
            ),
            DraftLanguage::Japanese => format!(
                "ご不明な点がございましたら、いつでもこのメールアドレス({})にご返信いただくか、<a href=\"{}\" target=\"_blank\">お問い合わせページ</a>をご利用ください。",
                support_email, inquiry_url
            ),
            DraftLanguage::Korean => format!(
                "궁금한 점이 있으시면 언제든지 이 이메일({})로 회신 주시거나, 저희 <a href=\"{}\" target=\"_blank\">문의 페이지</a>를 이용해주세요.",
                support_email, inquiry_url
            ),
        }
    }
}

impl fmt::Display for DraftLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for DraftLanguage {
    type Err = AIError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "english" | "en" => Ok(DraftLanguage::English),
            "日本語" | "japanese" | "ja" => Ok(DraftLanguage::Japanese),
            "한국어" | "korean" | "ko" => Ok(DraftLanguage::Korean),
            other => Err(AIError::config_error(format!(
                "Unsupported draft language: {}",
                other
            ))),
        }
    }
}

/// Brand details woven into every draft
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftBranding {
    pub brand: String,
    pub support_email: String,
    pub inquiry_url: String,
}

impl Default for DraftBranding {
    fn default() -> Self {
        Self {
            brand: "XROMEDA".to_string(),
            support_email: "help@xromeda.com".to_string(),
            inquiry_url: "https://xromeda.com/?type=inquiry".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftRequest {
    pub prompt: String,
    pub language: DraftLanguage,
}

impl DraftRequest {
    pub fn new(prompt: impl Into<String>, language: DraftLanguage) -> Self {
        Self {
            prompt: prompt.into(),
            language,
        }
    }
}

/// Generated subject and HTML body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub subject: String,
    pub body: String,
}

/// Candidate object shape; fields are checked after deserializing
#[derive(Deserialize)]
struct RawDraft {
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    body: Option<String>,
}

impl RawDraft {
    fn into_draft(self) -> Option<Draft> {
        let subject = self.subject.filter(|s| !s.trim().is_empty())?;
        let body = self.body.filter(|b| !b.trim().is_empty())?;
        Some(Draft { subject, body })
    }
}

/// Turns a short request into a complete draft via an [`AIProvider`]
#[derive(Clone)]
pub struct DraftComposer {
    provider: Arc<dyn AIProvider>,
    branding: DraftBranding,
}

impl DraftComposer {
    pub fn new(provider: Arc<dyn AIProvider>, branding: DraftBranding) -> Self {
        Self { provider, branding }
    }

    pub fn branding(&self) -> &DraftBranding {
        &self.branding
    }

    /// Build the full instruction text sent to the model
    pub fn build_prompt(&self, request: &DraftRequest) -> String {
        let greeting = request.language.greeting(&self.branding.brand);
        let support_info = request
            .language
            .support_info(&self.branding.support_email, &self.branding.inquiry_url);

        format!(
            "You are an expert email marketer and a meticulous operations manager for a service named \"{brand}\".\n\
             Your task is to write a professional and effective email based on the user's request.\n\n\
             CRITICAL INSTRUCTIONS:\n\
             1. Language: You MUST write the entire email in '{language}'.\n\
             2. Output Format: Your entire response MUST be a valid JSON object with exactly two keys: \"subject\" and \"body\". \
             The \"body\" value must be a string containing valid HTML (e.g., using <p>, <br> tags). Do NOT wrap it in markdown code blocks.\n\
             3. Content Rules:\n\
             - Greeting: The email body MUST start with this exact phrase: \"{greeting}\"\n\
             - Main Content: Address the user's core request: \"{prompt}\"\n\
             - Support Information: Towards the end of the email, include this exact support info: \"{support_info}\"\n\
             - Closing: Conclude with a professional closing.\n\n\
             Example format:\n\
             {{\"subject\": \"Subject line here\", \"body\": \"<p>{greeting}</p><p>Content...</p><p>{support_info}</p>\"}}",
            brand = self.branding.brand,
            language = request.language.display_name(),
            greeting = greeting,
            prompt = request.prompt.trim(),
            support_info = support_info,
        )
    }

    /// Generate a draft. Provider errors and unparseable replies are returned as-is.
    pub async fn compose(&self, request: &DraftRequest) -> AIResult<Draft> {
        if request.prompt.trim().is_empty() {
            return Err(AIError::config_error("Draft prompt must not be empty"));
        }

        let prompt = self.build_prompt(request);
        tracing::info!(
            "Generating {} draft with provider {}",
            request.language,
            self.provider.name()
        );

        let reply = self.provider.complete_text(&prompt).await?;
        tracing::debug!("Draft reply length: {} chars", reply.len());

        extract_draft(&reply).map_err(|e| {
            tracing::warn!("Draft reply did not contain a usable object");
            e
        })
    }
}

/// Pull the first balanced `{...}` span that parses as a non-empty draft.
///
/// Candidates are tried in order of their opening brace, so a wrapper object
/// that fails to parse still lets a nested draft object through.
pub fn extract_draft(text: &str) -> AIResult<Draft> {
    for span in balanced_object_spans(text) {
        if let Ok(raw) = serde_json::from_str::<RawDraft>(span) {
            if let Some(draft) = raw.into_draft() {
                return Ok(draft);
            }
        }
    }

    let preview: String = text.chars().take(120).collect();
    Err(AIError::draft_parse_failed(format!(
        "no object with non-empty subject and body in reply: {:?}",
        preview
    )))
}

/// Every balanced `{...}` span, ordered by opening brace, found in a single
/// pass. Quotes only open strings inside an object, so prose before the
/// first brace cannot hide it.
fn balanced_object_spans(text: &str) -> impl Iterator<Item = &str> {
    let mut open = Vec::new();
    let mut pairs = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    // Braces and quotes are ASCII, so byte offsets always land on char boundaries
    for (index, &byte) in text.as_bytes().iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b'"' if !open.is_empty() => in_string = true,
            b'{' => open.push(index),
            b'}' => {
                if let Some(start) = open.pop() {
                    pairs.push((start, index));
                }
            }
            _ => {}
        }
    }

    pairs.sort_unstable_by_key(|&(start, _)| start);
    pairs.into_iter().map(move |(start, end)| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct CannedProvider {
        reply: AIResult<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl CannedProvider {
        fn new(reply: AIResult<String>) -> Self {
            Self {
                reply,
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AIProvider for CannedProvider {
        fn name(&self) -> &str {
            "Canned"
        }

        async fn complete_text(&self, prompt: &str) -> AIResult<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone()
        }
    }

    #[test]
    fn test_plain_object() {
        let draft = extract_draft(r#"{"subject": "Launch", "body": "<p>Hi</p>"}"#).unwrap();
        assert_eq!(draft.subject, "Launch");
        assert_eq!(draft.body, "<p>Hi</p>");
    }

    #[test]
    fn test_fenced_object() {
        let reply = "```json\n{\"subject\": \"Launch\", \"body\": \"<p>Hi</p>\"}\n```";
        let draft = extract_draft(reply).unwrap();
        assert_eq!(draft.subject, "Launch");
    }

    #[test]
    fn test_prose_around_object() {
        let reply = "Sure! Here is your email:\n{\"subject\": \"Update\", \"body\": \"<p>News</p>\"}\nLet me know if you need changes {or tweaks}.";
        let draft = extract_draft(reply).unwrap();
        assert_eq!(draft.subject, "Update");
        assert_eq!(draft.body, "<p>News</p>");
    }

    #[test]
    fn test_braces_and_quotes_inside_strings() {
        let reply = r#"{"subject": "Use {curly} braces", "body": "<p>She said \"}\" twice</p>"}"#;
        let draft = extract_draft(reply).unwrap();
        assert_eq!(draft.subject, "Use {curly} braces");
        assert_eq!(draft.body, "<p>She said \"}\" twice</p>");
    }

    #[test]
    fn test_skips_unusable_first_object() {
        let reply = r#"Notes: {"tone": "friendly"} Result: {"subject": "S", "body": "B"}"#;
        let draft = extract_draft(reply).unwrap();
        assert_eq!(draft, Draft { subject: "S".into(), body: "B".into() });
    }

    #[test]
    fn test_nested_draft_inside_wrapper() {
        let reply = r#"{"email": {"subject": "Inner", "body": "<p>x</p>"}}"#;
        let draft = extract_draft(reply).unwrap();
        assert_eq!(draft.subject, "Inner");
    }

    #[test]
    fn test_many_unclosed_braces_before_draft() {
        let reply = format!(
            "{}{}",
            "{ ".repeat(50_000),
            r#"{"subject": "Late", "body": "<p>Still found</p>"}"#
        );
        let draft = extract_draft(&reply).unwrap();
        assert_eq!(draft.subject, "Late");
    }

    #[test]
    fn test_stray_quote_in_prose_is_ignored() {
        let reply = r#"A 5" screen. {"subject": "Specs", "body": "<p>x</p>"}"#;
        assert_eq!(extract_draft(reply).unwrap().subject, "Specs");
    }

    #[test]
    fn test_no_object_fails() {
        let err = extract_draft("I could not write that email.").unwrap_err();
        assert!(matches!(err, AIError::DraftParseFailed { .. }));
    }

    #[test]
    fn test_unbalanced_object_fails() {
        let err = extract_draft(r#"{"subject": "S", "body": "B""#).unwrap_err();
        assert!(matches!(err, AIError::DraftParseFailed { .. }));
    }

    #[test]
    fn test_empty_fields_fail() {
        let err = extract_draft(r#"{"subject": "", "body": "<p>x</p>"}"#).unwrap_err();
        assert!(matches!(err, AIError::DraftParseFailed { .. }));

        let err = extract_draft(r#"{"subject": "S"}"#).unwrap_err();
        assert!(matches!(err, AIError::DraftParseFailed { .. }));
    }

    #[test]
    fn test_language_parsing() {
        assert_eq!("English".parse::<DraftLanguage>().unwrap(), DraftLanguage::English);
        assert_eq!("ja".parse::<DraftLanguage>().unwrap(), DraftLanguage::Japanese);
        assert_eq!("日本語".parse::<DraftLanguage>().unwrap(), DraftLanguage::Japanese);
        assert_eq!("한국어".parse::<DraftLanguage>().unwrap(), DraftLanguage::Korean);
        assert!("klingon".parse::<DraftLanguage>().is_err());
        assert_eq!(DraftLanguage::default(), DraftLanguage::Korean);
    }

    #[test]
    fn test_prompt_contains_localized_greeting_and_support() {
        let composer = DraftComposer::new(
            Arc::new(CannedProvider::new(Ok(String::new()))),
            DraftBranding::default(),
        );
        let prompt = composer.build_prompt(&DraftRequest::new(
            "announce the spring sale",
            DraftLanguage::English,
        ));

        assert!(prompt.contains("Hello, this is the XROMEDA team."));
        assert!(prompt.contains("help@xromeda.com"));
        assert!(prompt.contains("https://xromeda.com/?type=inquiry"));
        assert!(prompt.contains("announce the spring sale"));
        assert!(prompt.contains("'English'"));
    }

    #[tokio::test]
    async fn test_compose_parses_reply() {
        let provider = Arc::new(CannedProvider::new(Ok(
            "```json\n{\"subject\": \"봄 세일\", \"body\": \"<p>안녕하세요, Acme입니다.</p>\"}\n```".to_string(),
        )));
        let branding = DraftBranding {
            brand: "Acme".to_string(),
            ..DraftBranding::default()
        };
        let composer = DraftComposer::new(provider.clone(), branding);

        let draft = composer
            .compose(&DraftRequest::new("spring sale", DraftLanguage::Korean))
            .await
            .unwrap();

        assert_eq!(draft.subject, "봄 세일");
        let prompts = provider.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("안녕하세요, Acme입니다."));
    }

    #[tokio::test]
    async fn test_compose_surfaces_parse_failure() {
        let provider = Arc::new(CannedProvider::new(Ok("no json here".to_string())));
        let composer = DraftComposer::new(provider, DraftBranding::default());

        let err = composer
            .compose(&DraftRequest::new("anything", DraftLanguage::Japanese))
            .await
            .unwrap_err();
        assert!(matches!(err, AIError::DraftParseFailed { .. }));
    }

    #[tokio::test]
    async fn test_compose_rejects_empty_prompt_without_calling_provider() {
        let provider = Arc::new(CannedProvider::new(Ok(String::new())));
        let composer = DraftComposer::new(provider.clone(), DraftBranding::default());

        assert!(composer
            .compose(&DraftRequest::new("   ", DraftLanguage::English))
            .await
            .is_err());
        assert!(provider.prompts.lock().unwrap().is_empty());
    }
}
