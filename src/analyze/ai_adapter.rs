//! Generation backends: one capability trait, the concrete HTTP backends, and
//! the ordered chain the extractor and the narrator call through.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::{Deserialize, Serialize};

use crate::config::{PipelineConfig, ProviderEndpoint};
use crate::error::{http_client, PipelineError, PipelineResult};
use crate::retry::RetryPolicy;

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// A single text-generation provider.
pub trait GenerationBackend: Send + Sync {
    fn generate<'a>(
        &'a self,
        req: &'a GenerationRequest,
    ) -> Pin<Box<dyn Future<Output = PipelineResult<String>> + Send + 'a>>;
    /// Provider name for logs/metrics.
    fn name(&self) -> &'static str;
}

pub type DynBackend = Arc<dyn GenerationBackend>;

/// Backends tried in order; a failing backend hands over to the next.
#[derive(Clone)]
pub struct BackendChain {
    backends: Vec<DynBackend>,
    retry: RetryPolicy,
}

impl BackendChain {
    pub fn new(backends: Vec<DynBackend>, retry: RetryPolicy) -> Self {
        Self { backends, retry }
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// First successful reply and the backend that produced it. Each backend
    /// gets the retry policy for transient failures only.
    pub async fn generate(
        &self,
        req: &GenerationRequest,
    ) -> PipelineResult<(String, &'static str)> {
        let mut last_err = PipelineError::Unconfigured("generation backends");
        for backend in &self.backends {
            let name = backend.name();
            match self.retry.run_transient(name, |_| backend.generate(req)).await {
                Ok(text) => return Ok((text, name)),
                Err(e) => {
                    tracing::warn!(target: "ai", backend = name, error = %e, "generation backend failed");
                    counter!("pipeline_backend_failures_total", "backend" => name).increment(1);
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }
}

/// Build the chain from `providers.generation_order`.
///
/// * `AI_TEST_MODE=mock` yields a chain with only the deterministic mock.
/// * Backends without a resolved key are skipped.
pub fn build_chain_from_config(cfg: &PipelineConfig) -> BackendChain {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return BackendChain::new(vec![Arc::new(MockBackend)], RetryPolicy::no_retry());
    }

    let p = &cfg.providers;
    let mut backends: Vec<DynBackend> = Vec::new();
    for name in &p.generation_order {
        match name.as_str() {
            "together" if p.together.has_key() => {
                backends.push(Arc::new(TogetherBackend::new(&p.together)))
            }
            "gemini" if p.gemini.has_key() => backends.push(Arc::new(GeminiBackend::new(&p.gemini))),
            "together" | "gemini" => {
                tracing::warn!(target: "ai", backend = %name, "no api key, backend skipped")
            }
            "mock" => backends.push(Arc::new(MockBackend)),
            other => tracing::warn!(target: "ai", backend = %other, "unknown generation backend"),
        }
    }
    if backends.is_empty() {
        backends.push(Arc::new(DisabledBackend));
    }
    BackendChain::new(backends, cfg.retry)
}

// ------------------------------------------------------------
// Concrete backends
// ------------------------------------------------------------

/// Together AI chat completions.
pub struct TogetherBackend {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl TogetherBackend {
    pub const DEFAULT_MODEL: &'static str = "mistralai/Mixtral-8x7B-Instruct-v0.1";

    pub fn new(endpoint: &ProviderEndpoint) -> Self {
        let timeout = endpoint.timeout();
        Self {
            http: http_client(timeout),
            base_url: endpoint.base_url.trim_end_matches('/').to_string(),
            api_key: endpoint.api_key.clone(),
            model: endpoint
                .model
                .clone()
                .unwrap_or_else(|| Self::DEFAULT_MODEL.to_string()),
            timeout,
        }
    }

    async fn generate_impl(&self, req: &GenerationRequest) -> PipelineResult<String> {
        if self.api_key.is_empty() {
            return Err(PipelineError::Unconfigured("TOGETHER_API_KEY"));
        }

        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            max_tokens: u32,
            temperature: f32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: Option<String>,
        }

        let body = Req {
            model: &self.model,
            messages: vec![Msg {
                role: "user",
                content: &req.prompt,
            }],
            max_tokens: req.max_tokens,
            temperature: req.temperature,
        };

        let resp = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::from_reqwest(e, self.timeout))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PipelineError::Status(status.as_u16()));
        }
        let parsed: Resp = resp
            .json()
            .await
            .map_err(|e| PipelineError::Malformed(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| PipelineError::Malformed("empty completion".to_string()))
    }
}

impl GenerationBackend for TogetherBackend {
    fn generate<'a>(
        &'a self,
        req: &'a GenerationRequest,
    ) -> Pin<Box<dyn Future<Output = PipelineResult<String>> + Send + 'a>> {
        Box::pin(self.generate_impl(req))
    }
    fn name(&self) -> &'static str {
        "together"
    }
}

/// Google Gemini `generateContent`.
pub struct GeminiBackend {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl GeminiBackend {
    pub const DEFAULT_MODEL: &'static str = "gemini-1.5-flash";

    pub fn new(endpoint: &ProviderEndpoint) -> Self {
        let timeout = endpoint.timeout();
        Self {
            http: http_client(timeout),
            base_url: endpoint.base_url.trim_end_matches('/').to_string(),
            api_key: endpoint.api_key.clone(),
            model: endpoint
                .model
                .clone()
                .unwrap_or_else(|| Self::DEFAULT_MODEL.to_string()),
            timeout,
        }
    }

    async fn generate_impl(&self, req: &GenerationRequest) -> PipelineResult<String> {
        if self.api_key.is_empty() {
            return Err(PipelineError::Unconfigured("GEMINI_API_KEY"));
        }

        #[derive(Serialize)]
        struct Part<'a> {
            text: &'a str,
        }
        #[derive(Serialize)]
        struct Content<'a> {
            parts: Vec<Part<'a>>,
        }
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct GenConfig {
            max_output_tokens: u32,
            temperature: f32,
        }
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Req<'a> {
            contents: Vec<Content<'a>>,
            generation_config: GenConfig,
        }
        #[derive(Deserialize)]
        struct Resp {
            #[serde(default)]
            candidates: Vec<Candidate>,
        }
        #[derive(Deserialize)]
        struct Candidate {
            content: Option<CandidateContent>,
        }
        #[derive(Deserialize)]
        struct CandidateContent {
            #[serde(default)]
            parts: Vec<RespPart>,
        }
        #[derive(Deserialize)]
        struct RespPart {
            text: Option<String>,
        }

        let body = Req {
            contents: vec![Content {
                parts: vec![Part { text: &req.prompt }],
            }],
            generation_config: GenConfig {
                max_output_tokens: req.max_tokens,
                temperature: req.temperature,
            },
        };

        let resp = self
            .http
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.model
            ))
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::from_reqwest(e, self.timeout))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PipelineError::Status(status.as_u16()));
        }
        let parsed: Resp = resp
            .json()
            .await
            .map_err(|e| PipelineError::Malformed(e.to_string()))?;
        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| PipelineError::Malformed("no candidate text".to_string()))
    }
}

impl GenerationBackend for GeminiBackend {
    fn generate<'a>(
        &'a self,
        req: &'a GenerationRequest,
    ) -> Pin<Box<dyn Future<Output = PipelineResult<String>> + Send + 'a>> {
        Box::pin(self.generate_impl(req))
    }
    fn name(&self) -> &'static str {
        "gemini"
    }
}

/// Always fails; used when no backend is configured.
pub struct DisabledBackend;

impl GenerationBackend for DisabledBackend {
    fn generate<'a>(
        &'a self,
        _req: &'a GenerationRequest,
    ) -> Pin<Box<dyn Future<Output = PipelineResult<String>> + Send + 'a>> {
        Box::pin(async { Err(PipelineError::Unconfigured("generation backends")) })
    }
    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Deterministic backend for tests and local runs. Analysis prompts get a
/// fenced JSON record, everything else a short markdown article.
#[derive(Clone, Copy, Default)]
pub struct MockBackend;

pub const MOCK_RECORD_JSON: &str = r#"{"Overall_Sentiment":"Positive","Emotion_Detection":"Optimism","Polarity_Score":0.6,"Search_Volume":"High","Revenue_Profit_Impact":"Revenue growth expected","Recession_Signals":"None observed","Supply_Demand_Gaps":"Increased demand for skilled staff","Employment_Opportunity":"Hiring growth","Sector":"Tech"}"#;

impl GenerationBackend for MockBackend {
    fn generate<'a>(
        &'a self,
        req: &'a GenerationRequest,
    ) -> Pin<Box<dyn Future<Output = PipelineResult<String>> + Send + 'a>> {
        let out = if req.prompt.contains(crate::analyze::record::KEY_SENTIMENT) {
            format!("Here is the analysis:\n```json\n{MOCK_RECORD_JSON}\n```")
        } else {
            "## Introduction\n\nMock narrative.\n\n## Key Insights\n\n- Demand is rising.\n\n## Conclusion\n\nOutlook is steady.".to_string()
        };
        Box::pin(async move { Ok(out) })
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}
