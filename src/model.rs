//! Domain types shared by the search, response and queue layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of content stored in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Profile,
    Project,
    /// Free-form text stored on behalf of an owner.
    Document,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Profile => "profile",
            ContentType::Project => "project",
            ContentType::Document => "document",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimal owner reference embedded in a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileRef {
    #[serde(default)]
    pub name: String,
}

/// Developer profile as handed over by the system of record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub blurb: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pic_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter_url: Option<String>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Project as handed over by the system of record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub blurb: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub techs: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub profile_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfileRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Fields every indexed record carries regardless of its kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommonMetadata {
    /// Id of the profile or project this record was built from.
    pub id: String,
    /// Text that was embedded.
    pub text: String,
    #[serde(rename = "ownerId")]
    pub owner_id: String,
    /// Same as `ownerId`; kept for filters written against the older schema.
    #[serde(rename = "userId")]
    pub user_id: String,
    /// Legacy owner field.
    pub profile_id: String,
    pub created_at: DateTime<Utc>,
}

impl CommonMetadata {
    pub fn new(id: impl Into<String>, text: impl Into<String>, owner_id: impl Into<String>) -> Self {
        let owner_id = owner_id.into();
        Self {
            id: id.into(),
            text: text.into(),
            user_id: owner_id.clone(),
            profile_id: owner_id.clone(),
            owner_id,
            created_at: Utc::now(),
        }
    }
}

/// Profile-specific metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileMetadata {
    #[serde(flatten)]
    pub common: CommonMetadata,
    pub name: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub project_count: usize,
}

/// Project-specific metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    #[serde(flatten)]
    pub common: CommonMetadata,
    pub title: String,
    #[serde(default)]
    pub techs: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub profile_name: String,
}

/// Free-form document metadata; `attributes` are caller supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextMetadata {
    #[serde(flatten)]
    pub common: CommonMetadata,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

/// Metadata attached to a vector record, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DocumentMetadata {
    Profile(ProfileMetadata),
    Project(ProjectMetadata),
    Document(TextMetadata),
}

impl DocumentMetadata {
    pub fn content_type(&self) -> ContentType {
        match self {
            DocumentMetadata::Profile(_) => ContentType::Profile,
            DocumentMetadata::Project(_) => ContentType::Project,
            DocumentMetadata::Document(_) => ContentType::Document,
        }
    }

    pub fn common(&self) -> &CommonMetadata {
        match self {
            DocumentMetadata::Profile(m) => &m.common,
            DocumentMetadata::Project(m) => &m.common,
            DocumentMetadata::Document(m) => &m.common,
        }
    }

    pub fn text(&self) -> &str {
        &self.common().text
    }

    pub fn owner_id(&self) -> &str {
        &self.common().owner_id
    }

    /// Flat JSON view, used for equality filtering and backend payloads.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// A logical document ready to be embedded and stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Vector record id (`profile-{id}` / `project-{id}`).
    pub id: String,
    pub text: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub metadata: DocumentMetadata,
}

/// A free-form document submitted for indexing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentInput {
    /// Generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    pub text: String,
    #[serde(alias = "userId", alias = "profileId")]
    pub owner_id: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// One hit returned by semantic search. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub content_type: ContentType,
    pub content_id: String,
    pub content_text: String,
    pub similarity: f32,
}

/// Short piece of a source document returned for traceability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Excerpt {
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub id: String,
    pub text: String,
}

/// Source attribution for a generated answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sources {
    pub profiles: Vec<String>,
    pub projects: Vec<String>,
    #[serde(default)]
    pub documents: Vec<String>,
    pub excerpts: Vec<Excerpt>,
}

impl Sources {
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty() && self.projects.is_empty() && self.documents.is_empty()
    }
}

/// Generated answer plus where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub sources: Sources,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile_metadata() -> DocumentMetadata {
        DocumentMetadata::Profile(ProfileMetadata {
            common: CommonMetadata::new("p1", "Name: Ada", "p1"),
            name: "Ada".into(),
            skills: vec!["Rust".into()],
            project_count: 2,
        })
    }

    #[test]
    fn test_metadata_serializes_type_and_owner_aliases() {
        let json = profile_metadata().to_json();
        assert_eq!(json["type"], "profile");
        assert_eq!(json["text"], "Name: Ada");
        assert_eq!(json["ownerId"], "p1");
        assert_eq!(json["userId"], "p1");
        assert_eq!(json["profile_id"], "p1");
        assert_eq!(json["skills"][0], "Rust");
    }

    #[test]
    fn test_metadata_round_trips_through_json() {
        let original = profile_metadata();
        let back: DocumentMetadata = serde_json::from_value(original.to_json()).unwrap();
        assert_eq!(back, original);
        assert_eq!(back.content_type(), ContentType::Profile);
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let json = serde_json::json!({
            "type": "blog",
            "id": "x",
            "text": "t",
            "ownerId": "o",
            "userId": "o",
            "profile_id": "o",
            "created_at": "2024-01-01T00:00:00Z",
        });
        assert!(serde_json::from_value::<DocumentMetadata>(json).is_err());
    }

    #[test]
    fn test_document_metadata_keeps_attributes() {
        let mut attributes = BTreeMap::new();
        attributes.insert("source".to_string(), "notes".to_string());
        let metadata = DocumentMetadata::Document(TextMetadata {
            common: CommonMetadata::new("d1", "Met Ada at RustConf", "u1"),
            attributes,
        });
        let json = metadata.to_json();
        assert_eq!(json["type"], "document");
        assert_eq!(json["ownerId"], "u1");
        assert_eq!(json["attributes"]["source"], "notes");

        let back: DocumentMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(back, metadata);
        assert_eq!(back.content_type(), ContentType::Document);
    }

    #[test]
    fn test_document_input_accepts_legacy_owner_keys() {
        let input: DocumentInput =
            serde_json::from_str(r#"{"text":"hello","userId":"u1"}"#).unwrap();
        assert_eq!(input.owner_id, "u1");
        assert!(input.id.is_none());
        let input: DocumentInput =
            serde_json::from_str(r#"{"text":"hello","profileId":"u2"}"#).unwrap();
        assert_eq!(input.owner_id, "u2");
    }

    #[test]
    fn test_profile_deserializes_with_missing_optional_fields() {
        let profile: Profile =
            serde_json::from_str(r#"{"id":"1","name":"Grace","skills":["COBOL"]}"#).unwrap();
        assert_eq!(profile.name, "Grace");
        assert!(profile.projects.is_empty());
        assert!(profile.bio.is_empty());
    }
}
