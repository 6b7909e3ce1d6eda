use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::DomainError;

const TEXT_SNIPPET_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Post {
    pub(crate) id: i64,
    pub(crate) title: String,
    pub(crate) text: String,
    pub(crate) user_id: i64,
    pub(crate) points: i64,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CreatePostRequest {
    pub(crate) title: String,
    pub(crate) text: String,
}

impl CreatePostRequest {
    pub(crate) fn validate(self) -> Result<Self, DomainError> {
        Ok(Self {
            title: normalize_title(&self.title)?,
            text: normalize_text(&self.text)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct UpdatePostRequest {
    pub(crate) title: String,
    pub(crate) text: String,
}

impl UpdatePostRequest {
    pub(crate) fn validate(self) -> Result<Self, DomainError> {
        Ok(Self {
            title: normalize_title(&self.title)?,
            text: normalize_text(&self.text)?,
        })
    }
}

impl Post {
    pub(crate) fn new(
        id: i64,
        title: impl Into<String>,
        text: impl Into<String>,
        user_id: i64,
        points: i64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        validate_positive_i64("id", id)?;
        validate_positive_i64("user_id", user_id)?;
        let title = normalize_title(&title.into())?;
        let text = normalize_text(&text.into())?;

        if updated_at < created_at {
            return Err(DomainError::Validation {
                field: "updated_at",
                message: "must be >= created_at",
            });
        }

        Ok(Self {
            id,
            title,
            text,
            user_id,
            points,
            created_at,
            updated_at,
        })
    }

    /// Leading slice of the body shown in feed listings.
    pub(crate) fn text_snippet(&self) -> String {
        self.text.chars().take(TEXT_SNIPPET_CHARS).collect()
    }

    pub(crate) fn is_owned_by(&self, user_id: i64) -> bool {
        self.user_id == user_id
    }
}

fn validate_positive_i64(field: &'static str, value: i64) -> Result<(), DomainError> {
    if value <= 0 {
        return Err(DomainError::Validation {
            field,
            message: "must be > 0",
        });
    }
    Ok(())
}

fn normalize_title(title: &str) -> Result<String, DomainError> {
    let title = title.trim();
    if title.is_empty() || title.chars().count() > 255 {
        return Err(DomainError::Validation {
            field: "title",
            message: "must be 1..255 chars",
        });
    }
    Ok(title.to_string())
}

fn normalize_text(text: &str) -> Result<String, DomainError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(DomainError::Validation {
            field: "text",
            message: "must not be empty",
        });
    }
    Ok(text.to_string())
}
