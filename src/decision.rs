//! Vision decisions: ask the model for an action and refuse unsafe answers.
//!
//! The model is untrusted input. Every answer is validated locally before it
//! can become a physical action:
//!
//! 1. `reasoning` is a non-empty string, `action` a string, `x`/`y` numbers
//! 2. `action` is one of the allowed kinds
//! 3. `x`/`y` are integers (floats are rejected even when in range)
//! 4. `x`/`y` lie inside the configured hard bounds
//!
//! A rejected first answer gets exactly one corrective retry carrying the
//! violation as feedback. A second rejection abandons the cycle.

use async_trait::async_trait;
use base64::Engine;
use serde_json::Value;
use thiserror::Error;

use crate::action::{ActionKind, ActionProposal};
use crate::config::{HardBounds, VisionSettings};
use crate::prompt;

/// Errors that end a decision.
#[derive(Error, Debug)]
pub enum DecisionError {
    #[error("Vision endpoint unreachable: {0}")]
    Transport(String),

    #[error("Vision endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Validation failed after retry: {0}")]
    ValidationFailedAfterRetry(String),
}

/// Result type for decision operations.
pub type DecisionResult<T> = Result<T, DecisionError>;

/// Outcome of checking one model answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    Invalid(String),
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid)
    }
}

/// Transport to a chat-completions style vision model.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Send `request` and return the assistant message content.
    async fn complete(&self, request: &Value) -> DecisionResult<String>;
}

/// OpenAI-compatible HTTP endpoint (LM Studio, vLLM, OpenRouter, ...).
pub struct HttpVisionModel {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpVisionModel {
    pub fn new(settings: &VisionSettings) -> DecisionResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| DecisionError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key(),
        })
    }
}

#[async_trait]
impl VisionModel for HttpVisionModel {
    async fn complete(&self, request: &Value) -> DecisionResult<String> {
        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(request);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| DecisionError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(DecisionError::Status {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| DecisionError::MalformedResponse(e.to_string()))?;

        json["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| {
                DecisionError::MalformedResponse("Missing content in response".to_string())
            })
    }
}

/// Asks the vision model for the next action and owns the retry policy.
pub struct VisionDecisionClient {
    model: Box<dyn VisionModel>,
    settings: VisionSettings,
    bounds: HardBounds,
    policy: String,
}

impl VisionDecisionClient {
    /// Create a client whose policy prompt is generated from `bounds`.
    pub fn new(model: Box<dyn VisionModel>, settings: VisionSettings, bounds: HardBounds) -> Self {
        let policy = prompt::policy_text(&bounds);
        Self {
            model,
            settings,
            bounds,
            policy,
        }
    }

    /// Replace the policy prompt. Bounds are still enforced from config.
    pub fn with_policy(mut self, policy: impl Into<String>) -> Self {
        self.policy = policy.into();
        self
    }

    /// Decide the next action for a PNG screenshot of the window.
    ///
    /// Queries at most twice: once plainly and once with the violation of the
    /// first answer as feedback.
    pub async fn decide(&self, image_png: &[u8]) -> DecisionResult<ActionProposal> {
        let first = self.query(image_png, None).await?;
        let violation = match check_proposal(&first, &self.bounds) {
            Ok(proposal) => return Ok(proposal),
            Err(reason) => reason,
        };

        tracing::warn!(reason = %violation, "proposal rejected, retrying once with feedback");

        let second = self.query(image_png, Some(&violation)).await?;
        check_proposal(&second, &self.bounds).map_err(|reason| {
            tracing::warn!(reason = %reason, "retried proposal rejected");
            DecisionError::ValidationFailedAfterRetry(reason)
        })
    }

    /// Run one query and parse the content into a JSON object.
    pub async fn query(&self, image_png: &[u8], prior_feedback: Option<&str>) -> DecisionResult<Value> {
        let request = self.build_request(image_png, prior_feedback);
        let content = self.model.complete(&request).await?;
        tracing::debug!(content = %content, "vision model answered");
        parse_content(&content)
    }

    /// Build the chat completion request body.
    pub fn build_request(&self, image_png: &[u8], prior_feedback: Option<&str>) -> Value {
        let text = match prior_feedback {
            Some(violation) => prompt::retry_text(violation),
            None => prompt::user_text(),
        };
        let image_b64 = base64::engine::general_purpose::STANDARD.encode(image_png);

        serde_json::json!({
            "model": self.settings.model,
            "messages": [
                {
                    "role": "system",
                    "content": self.policy
                },
                {
                    "role": "user",
                    "content": [
                        {
                            "type": "text",
                            "text": text
                        },
                        {
                            "type": "image_url",
                            "image_url": {
                                "url": format!("data:image/png;base64,{}", image_b64)
                            }
                        }
                    ]
                }
            ],
            "response_format": { "type": "json_object" },
            "temperature": self.settings.temperature,
            "top_p": self.settings.top_p,
            "repetition_penalty": self.settings.repetition_penalty,
            "max_tokens": self.settings.max_tokens
        })
    }
}

/// Parse message content into a JSON object.
///
/// Models sometimes wrap the object in prose or code fences, so the outermost
/// `{...}` span is tried before giving up.
pub fn parse_content(content: &str) -> DecisionResult<Value> {
    let parsed = serde_json::from_str::<Value>(content.trim()).or_else(|e| {
        match (content.find('{'), content.rfind('}')) {
            (Some(start), Some(end)) if start < end => {
                serde_json::from_str::<Value>(&content[start..=end])
            }
            _ => Err(e),
        }
    });

    match parsed {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(other) => Err(DecisionError::MalformedResponse(format!(
            "expected a JSON object, got {}",
            other
        ))),
        Err(e) => Err(DecisionError::MalformedResponse(format!(
            "{}: {}",
            e,
            content.chars().take(200).collect::<String>()
        ))),
    }
}

/// Validate one model answer against the hard bounds.
pub fn validate(value: &Value, bounds: &HardBounds) -> ValidationOutcome {
    match check_proposal(value, bounds) {
        Ok(_) => ValidationOutcome::Valid,
        Err(reason) => ValidationOutcome::Invalid(reason),
    }
}

/// Validate and convert a model answer, returning the violation on failure.
pub fn check_proposal(value: &Value, bounds: &HardBounds) -> Result<ActionProposal, String> {
    // Step 1: presence and types
    let reasoning = match value.get("reasoning").and_then(Value::as_str) {
        Some(r) if !r.trim().is_empty() => r,
        _ => return Err("reasoning must be a non-empty string".to_string()),
    };
    let action = value
        .get("action")
        .and_then(Value::as_str)
        .ok_or_else(|| "action must be a string".to_string())?;
    let x = number_field(value, "x")?;
    let y = number_field(value, "y")?;

    // Step 2: vocabulary
    let action: ActionKind = action.parse().map_err(|_| {
        format!(
            "action '{}' is not one of {}",
            action,
            ActionKind::ALL.map(|a| a.as_str()).join(", ")
        )
    })?;

    // Step 3: integers only
    let x = integer_field("x", x)?;
    let y = integer_field("y", y)?;

    // Step 4: hard bounds
    let x = match x {
        Some(v) if bounds.contains_x(v) => v as i32,
        _ => return Err(out_of_bounds("x", x, bounds.min_x, bounds.max_x)),
    };
    let y = match y {
        Some(v) if bounds.contains_y(v) => v as i32,
        _ => return Err(out_of_bounds("y", y, bounds.min_y, bounds.max_y)),
    };

    Ok(ActionProposal {
        reasoning: reasoning.to_string(),
        action,
        x,
        y,
    })
}

fn number_field<'a>(value: &'a Value, name: &str) -> Result<&'a serde_json::Number, String> {
    match value.get(name) {
        Some(Value::Number(n)) => Ok(n),
        Some(other) => Err(format!("{} must be a number, got {}", name, other)),
        None => Err(format!("{} is missing", name)),
    }
}

/// `Some(i64)` for in-range integers, `None` for integers too large for i64.
fn integer_field(name: &str, n: &serde_json::Number) -> Result<Option<i64>, String> {
    if n.is_f64() {
        return Err(format!("{} must be an integer, got {}", name, n));
    }
    Ok(n.as_i64())
}

fn out_of_bounds(name: &str, v: Option<i64>, min: i32, max: i32) -> String {
    match v {
        Some(v) => format!("{} out of bounds: {} not in [{}, {}]", name, v, min, max),
        None => format!("{} out of bounds: not in [{}, {}]", name, min, max),
    }
}
