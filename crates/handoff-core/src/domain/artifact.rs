//! Staged artifacts: generated content held locally before it belongs to an account.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::ids::ArtifactId;

/// Generation parameters recorded alongside the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    pub prompt: String,

    /// Top-level namespace of the durable path (e.g. "images").
    #[serde(default)]
    pub category: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,

    /// MIME type of the payload, forwarded to the object store.
    #[serde(default = "default_content_type")]
    pub content_type: String,
}

fn default_content_type() -> String {
    "application/octet-stream".to_string()
}

impl Descriptor {
    pub fn new(prompt: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            category: category.into(),
            aspect_ratio: None,
            content_type: default_content_type(),
        }
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: impl Into<String>) -> Self {
        self.aspect_ratio = Some(aspect_ratio.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// File extension used for the durable object name.
    pub fn file_extension(&self) -> &'static str {
        let essence = self
            .content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "image/png" => "png",
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "bin",
        }
    }
}

/// An unconfirmed artifact in the staging store.
///
/// Invariant: `expires_at == created_at + ttl`. Once `expires_at <= now` the
/// artifact is dead and must never be reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedArtifact {
    pub id: ArtifactId,

    #[serde(skip)]
    pub payload: Vec<u8>,

    pub descriptor: Descriptor,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl StagedArtifact {
    pub fn new(
        id: ArtifactId,
        payload: Vec<u8>,
        descriptor: Descriptor,
        created_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            id,
            payload,
            descriptor,
            created_at,
            expires_at: created_at + ttl,
        }
    }

    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;
    use ulid::Ulid;

    #[test]
    fn expires_at_is_created_at_plus_ttl() {
        let created_at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let artifact = StagedArtifact::new(
            ArtifactId::from_ulid(Ulid::new()),
            vec![1, 2, 3],
            Descriptor::new("a cat", "images"),
            created_at,
            Duration::hours(2),
        );

        assert_eq!(artifact.expires_at, created_at + Duration::hours(2));
        assert!(artifact.is_live_at(created_at));
        assert!(!artifact.is_live_at(artifact.expires_at));
    }

    #[rstest]
    #[case::png("image/png", "png")]
    #[case::jpeg("image/jpeg", "jpg")]
    #[case::with_params("image/webp; q=0.8", "webp")]
    #[case::upper("IMAGE/GIF", "gif")]
    #[case::unknown("application/octet-stream", "bin")]
    fn file_extension_follows_content_type(#[case] content_type: &str, #[case] ext: &str) {
        let descriptor = Descriptor::new("p", "images").with_content_type(content_type);
        assert_eq!(descriptor.file_extension(), ext);
    }

    #[test]
    fn descriptor_defaults_missing_fields() {
        let descriptor: Descriptor = serde_json::from_str(r#"{"prompt":"sunset"}"#).unwrap();
        assert_eq!(descriptor.category, "");
        assert_eq!(descriptor.content_type, "application/octet-stream");
        assert!(descriptor.aspect_ratio.is_none());
    }
}
