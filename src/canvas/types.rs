//! Canvas REST resources, as far as the suites read them.

use serde::{Deserialize, Serialize};

use super::link::Links;

/// A course as returned by `POST /api/v1/accounts/:id/courses`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub course_code: Option<String>,
    #[serde(default)]
    pub default_view: Option<String>,
}

/// What a course shows on its home page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultView {
    Feed,
    Wiki,
    Modules,
    Assignments,
    Syllabus,
}

impl DefaultView {
    pub fn as_str(&self) -> &'static str {
        match self {
            DefaultView::Feed => "feed",
            DefaultView::Wiki => "wiki",
            DefaultView::Modules => "modules",
            DefaultView::Assignments => "assignments",
            DefaultView::Syllabus => "syllabus",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewCourse {
    pub name: String,
    pub course_code: String,
    pub default_view: DefaultView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub position: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewModule {
    pub name: String,
    pub position: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: u64,
    pub name: String,
}

/// Module item kinds the fixtures create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleItemKind {
    Assignment,
    ExternalUrl,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewModuleItem {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: ModuleItemKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
}

impl NewModuleItem {
    pub fn assignment(title: impl Into<String>, assignment_id: u64) -> Self {
        Self {
            title: title.into(),
            kind: ModuleItemKind::Assignment,
            content_id: Some(assignment_id),
            external_url: None,
        }
    }

    pub fn external_url(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            kind: ModuleItemKind::ExternalUrl,
            content_id: None,
            external_url: Some(url.into()),
        }
    }
}

/// Item types are kept as strings: Canvas knows many more than we create.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleItem {
    pub id: u64,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub module_id: Option<u64>,
    #[serde(default)]
    pub external_url: Option<String>,
}

/// Response of `GET /login/session_token`.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionToken {
    pub session_url: String,
}

/// One page of a list endpoint.
#[derive(Debug, Clone)]
pub struct Paged<T> {
    pub items: Vec<T>,
    /// Raw `Link` header, if the server sent one.
    pub link_header: Option<String>,
    pub links: Links,
}
