//! Inbound generation request.

use serde::{Deserialize, Serialize};

use super::message::{ContentPart, Message};
use crate::error::{Error, ErrorContext};
use crate::Result;

/// One call to the generation service.
///
/// The message list is never empty once a request has passed
/// [`GenerationRequest::validate`]; every send path validates first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    model: String,
    messages: Vec<Message>,
    /// `None` leaves the output length unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    temperature: f64,
    #[serde(default)]
    stream: bool,
}

impl GenerationRequest {
    pub const DEFAULT_TEMPERATURE: f64 = 0.7;

    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Result<Self> {
        let req = Self {
            model: model.into(),
            messages,
            max_tokens: None,
            temperature: Self::DEFAULT_TEMPERATURE,
            stream: false,
        };
        req.validate()?;
        Ok(req)
    }

    /// Single user turn with a plain-text prompt.
    pub fn text(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: vec![Message::user(prompt)],
            max_tokens: None,
            temperature: Self::DEFAULT_TEMPERATURE,
            stream: false,
        }
    }

    /// Single user turn: the prompt as a text part, then one part per image.
    pub fn with_images(
        model: impl Into<String>,
        prompt: impl Into<String>,
        images: Vec<ContentPart>,
    ) -> Self {
        Self {
            model: model.into(),
            messages: vec![Message::user_with_images(prompt, images)],
            max_tokens: None,
            temperature: Self::DEFAULT_TEMPERATURE,
            stream: false,
        }
    }

    pub fn max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn unbounded(mut self) -> Self {
        self.max_tokens = None;
        self
    }

    pub fn temperature(mut self, temp: f64) -> Self {
        self.temperature = temp;
        self
    }

    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn token_ceiling(&self) -> Option<u32> {
        self.max_tokens
    }

    pub fn temperature_value(&self) -> f64 {
        self.temperature
    }

    pub fn is_stream(&self) -> bool {
        self.stream
    }

    pub fn has_images(&self) -> bool {
        self.messages.iter().any(Message::contains_image)
    }

    /// Text of all turns, used as the prompt echo in usage records.
    pub fn prompt_text(&self) -> String {
        self.messages
            .iter()
            .map(Message::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Copy with control characters stripped from every text part.
    pub fn sanitized(&self) -> Self {
        Self {
            messages: self.messages.iter().map(Message::sanitized).collect(),
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(Error::validation_with_context(
                "model must not be empty",
                ErrorContext::new()
                    .with_field_path("request.model")
                    .with_source("request_validator"),
            ));
        }
        if self.messages.is_empty() {
            return Err(Error::validation_with_context(
                "messages must not be empty",
                ErrorContext::new()
                    .with_field_path("request.messages")
                    .with_source("request_validator"),
            ));
        }
        if !self.temperature.is_finite() || !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::validation_with_context(
                "temperature out of range",
                ErrorContext::new()
                    .with_field_path("request.temperature")
                    .with_details(format!("expected 0.0..=2.0, got {}", self.temperature))
                    .with_source("request_validator"),
            ));
        }
        if self.max_tokens == Some(0) {
            return Err(Error::validation_with_context(
                "max_tokens must be positive when set",
                ErrorContext::new()
                    .with_field_path("request.max_tokens")
                    .with_source("request_validator"),
            ));
        }
        Ok(())
    }

    /// Wire body for the chat completions endpoint.
    pub fn to_wire(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| {
            Error::validation_with_context(
                format!("request cannot be serialized: {}", e),
                ErrorContext::new().with_source("request_encoder"),
            )
        })
    }
}
