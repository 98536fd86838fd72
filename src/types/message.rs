//! Chat message format sent to the generation service.

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, ErrorContext};

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: MessageContent,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: MessageContent::Text(text.into()),
        }
    }

    /// A user turn carrying the prompt followed by one image part per image.
    pub fn user_with_images(text: impl Into<String>, images: Vec<ContentPart>) -> Self {
        let mut parts = Vec::with_capacity(images.len() + 1);
        parts.push(ContentPart::text(text));
        parts.extend(images);
        Self {
            role: MessageRole::User,
            content: MessageContent::Parts(parts),
        }
    }

    pub fn with_content(role: MessageRole, content: MessageContent) -> Self {
        Self { role, content }
    }

    pub fn contains_image(&self) -> bool {
        match &self.content {
            MessageContent::Text(_) => false,
            MessageContent::Parts(ps) => ps.iter().any(|p| matches!(p, ContentPart::ImageUrl { .. })),
        }
    }

    /// Concatenated text of this turn, images skipped.
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(t) => t.clone(),
            MessageContent::Parts(ps) => ps
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Copy of this message with control characters removed from every text part.
    pub fn sanitized(&self) -> Self {
        let content = match &self.content {
            MessageContent::Text(t) => MessageContent::Text(strip_control_chars(t)),
            MessageContent::Parts(ps) => MessageContent::Parts(
                ps.iter()
                    .map(|p| match p {
                        ContentPart::Text { text } => ContentPart::Text {
                            text: strip_control_chars(text),
                        },
                        other => other.clone(),
                    })
                    .collect(),
            ),
        };
        Self {
            role: self.role.clone(),
            content,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// Plain text, or mixed text/image parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String, // data URL or remote URL
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn image_url(url: impl Into<String>) -> Self {
        ContentPart::ImageUrl {
            image_url: ImageUrl { url: url.into() },
        }
    }

    /// Wrap already-encoded base64 data in a data URL.
    pub fn image_base64(data: &str, media_type: &str) -> Self {
        Self::image_url(format!("data:{};base64,{}", media_type, data))
    }

    /// Encode raw JPEG bytes as a data URL part.
    pub fn image_jpeg(bytes: &[u8]) -> Self {
        let data = base64::engine::general_purpose::STANDARD.encode(bytes);
        Self::image_base64(&data, "image/jpeg")
    }

    pub fn image_from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            Error::validation_with_context(
                format!("cannot read image: {}", e),
                ErrorContext::new()
                    .with_field_path("request.messages")
                    .with_details(path.display().to_string()),
            )
        })?;
        let media_type = guess_media_type(path).unwrap_or("image/jpeg");
        let data = base64::engine::general_purpose::STANDARD.encode(bytes);
        Ok(Self::image_base64(&data, media_type))
    }
}

fn guess_media_type(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();
    let mt = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => return None,
    };
    Some(mt)
}

/// Removes C0 controls (except newline, tab and carriage return), DEL and C1 controls.
pub fn strip_control_chars(text: &str) -> String {
    text.chars()
        .filter(|c| {
            let cp = *c as u32;
            let c0 = cp <= 0x1F && !matches!(c, '\n' | '\t' | '\r');
            let c1 = (0x7F..=0x9F).contains(&cp);
            !(c0 || c1)
        })
        .collect()
}
