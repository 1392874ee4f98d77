//! Text preparation for embedding.
//!
//! Turns profiles and projects into the labelled text blocks that get
//! embedded, and builds the matching typed metadata. Free-form documents
//! are embedded as given.

use chrono::Utc;

use crate::model::{
    CommonMetadata, Document, DocumentInput, DocumentMetadata, Profile, ProfileMetadata,
    Project, ProjectMetadata, TextMetadata,
};

/// Rough provider input limit: 8000 tokens at ~4 chars per token.
pub const MAX_INPUT_CHARS: usize = 8_000 * 4;

/// Collapse whitespace, strip everything but word characters and basic
/// punctuation, and lowercase.
pub fn normalize_text(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .chars()
        .filter(|c| {
            c.is_alphanumeric()
                || *c == '_'
                || *c == ' '
                || matches!(c, '.' | ',' | '!' | '?' | '-')
        })
        .collect::<String>()
        .to_lowercase()
}

/// Whether `text` fits in a single embedding request.
pub fn within_input_limit(text: &str) -> bool {
    text.chars().count() <= MAX_INPUT_CHARS
}

/// Cut `text` to at most `max_chars`, preferring whole sentences.
///
/// Falls back to a hard character cut when not even the first sentence fits.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let mut result = String::new();
    let mut result_chars = 0;
    for sentence in sentences(text) {
        let len = sentence.chars().count();
        if result_chars + len > max_chars {
            break;
        }
        result.push_str(sentence);
        result_chars += len;
    }

    let trimmed = result.trim();
    if trimmed.is_empty() {
        text.chars().take(max_chars).collect::<String>().trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Split into sentences, each keeping its terminating punctuation.
/// A trailing fragment without a terminator is dropped.
fn sentences(text: &str) -> impl Iterator<Item = &str> {
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    std::iter::from_fn(move || {
        while let Some((i, c)) = chars.next() {
            if matches!(c, '.' | '!' | '?') {
                let mut end = i + c.len_utf8();
                while let Some(&(j, next)) = chars.peek() {
                    if matches!(next, '.' | '!' | '?') {
                        end = j + next.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let sentence = &text[start..end];
                start = end;
                return Some(sentence);
            }
        }
        None
    })
}

/// Join `label: value` sections, skipping those with an empty value.
fn labelled_sections(sections: &[(&str, String)]) -> String {
    sections
        .iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .map(|(label, value)| format!("{}: {}", label, value.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text embedded for a profile.
pub fn profile_text(profile: &Profile) -> String {
    let mut sections = vec![
        ("Name", profile.name.clone()),
        ("Summary", profile.blurb.clone()),
        ("About", profile.bio.clone()),
        ("Skills", profile.skills.join(", ")),
    ];
    if !profile.projects.is_empty() {
        let titles = profile
            .projects
            .iter()
            .map(|p| p.title.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        sections.push(("Projects", titles));
    }
    truncate_text(&labelled_sections(&sections), MAX_INPUT_CHARS)
}

/// Text embedded for a project.
pub fn project_text(project: &Project) -> String {
    let description = if project.description.trim().is_empty() {
        project.blurb.clone()
    } else {
        project.description.clone()
    };
    let mut sections = vec![
        ("Title", project.title.clone()),
        ("Description", description),
        ("Technologies", project.techs.join(", ")),
    ];
    if !project.keywords.is_empty() {
        sections.push(("Keywords", project.keywords.join(", ")));
    }
    if let Some(owner) = project.profile.as_ref().filter(|p| !p.name.is_empty()) {
        sections.push(("Created by", owner.name.clone()));
    }
    truncate_text(&labelled_sections(&sections), MAX_INPUT_CHARS)
}

/// Vector record id for a profile.
pub fn profile_record_id(profile_id: &str) -> String {
    format!("profile-{}", profile_id)
}

/// Vector record id for a project.
pub fn project_record_id(project_id: &str) -> String {
    format!("project-{}", project_id)
}

/// Vector record id for a free-form document.
pub fn document_record_id(document_id: &str) -> String {
    format!("document-{}", document_id)
}

/// Build the indexable document for free-form text under `document_id`.
pub fn text_document(document_id: &str, input: &DocumentInput) -> Document {
    let text = input.text.trim().to_string();
    let metadata = DocumentMetadata::Document(TextMetadata {
        common: CommonMetadata::new(document_id, &text, &input.owner_id),
        attributes: input.metadata.clone(),
    });
    Document {
        id: document_record_id(document_id),
        owner_id: input.owner_id.clone(),
        created_at: Utc::now(),
        text,
        metadata,
    }
}

/// Build the indexable document for a profile. A profile owns itself.
pub fn profile_document(profile: &Profile) -> Document {
    let text = profile_text(profile);
    let metadata = DocumentMetadata::Profile(ProfileMetadata {
        common: CommonMetadata::new(&profile.id, &text, &profile.id),
        name: profile.name.clone(),
        skills: profile.skills.clone(),
        project_count: profile.projects.len(),
    });
    Document {
        id: profile_record_id(&profile.id),
        owner_id: profile.id.clone(),
        created_at: profile.updated_at.unwrap_or_else(Utc::now),
        text,
        metadata,
    }
}

/// Build the indexable document for a project, owned by its profile.
pub fn project_document(project: &Project) -> Document {
    let text = project_text(project);
    let metadata = DocumentMetadata::Project(ProjectMetadata {
        common: CommonMetadata::new(&project.id, &text, &project.profile_id),
        title: project.title.clone(),
        techs: project.techs.clone(),
        keywords: project.keywords.clone(),
        profile_name: project
            .profile
            .as_ref()
            .map(|p| p.name.clone())
            .unwrap_or_default(),
    });
    Document {
        id: project_record_id(&project.id),
        owner_id: project.profile_id.clone(),
        created_at: project.updated_at.unwrap_or_else(Utc::now),
        text,
        metadata,
    }
}
