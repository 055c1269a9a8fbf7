//! Inputs of an export: the query, its work packages, options and context.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::i18n::Locale;

/// A column of the overview table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Attribute key looked up in [`WorkPackage::attributes`].
    pub key: String,
    pub caption: String,
}

impl Column {
    pub fn new(key: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            caption: caption.into(),
        }
    }
}

/// A file attached to a work package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    /// Filesystem path or a `data:<mime>;base64,<data>` URI.
    pub source: String,
}

impl Attachment {
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkPackage {
    pub id: u64,
    pub subject: String,
    #[serde(rename = "type", default)]
    pub type_name: String,
    /// Display values keyed by column key.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl WorkPackage {
    /// Display value for a column, falling back to the built-in fields.
    pub fn value(&self, key: &str) -> String {
        if let Some(v) = self.attributes.get(key) {
            return v.clone();
        }
        match key {
            "id" => self.id.to_string(),
            "subject" => self.subject.clone(),
            "type" => self.type_name.clone(),
            _ => String::new(),
        }
    }
}

/// The collaborator that supplies the ordered work packages to export.
pub trait WorkPackageQuery {
    /// Saved name of the query; `None` for a new, unsaved query.
    fn name(&self) -> Option<&str>;
    /// Name of the project the query belongs to, if any.
    fn project(&self) -> Option<&str>;
    /// Overview table columns, in display order.
    fn columns(&self) -> &[Column];
    /// The query results, in display order.
    fn work_packages(&self) -> &[WorkPackage];
}

/// A materialized query result, as handed over by the web layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuerySnapshot {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub work_packages: Vec<WorkPackage>,
}

impl WorkPackageQuery for QuerySnapshot {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn work_packages(&self) -> &[WorkPackage] {
        &self.work_packages
    }
}

/// Capability flags of one export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExportOptions {
    #[serde(default)]
    pub with_descriptions: bool,
    #[serde(default)]
    pub with_attachments: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserName {
    pub firstname: String,
    pub lastname: String,
}

impl UserName {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.firstname, self.lastname)
            .trim()
            .to_string()
    }
}

/// Who exports, in which language, on which day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportContext {
    #[serde(default)]
    pub user: Option<UserName>,
    #[serde(default)]
    pub locale: Locale,
    pub today: NaiveDate,
}

impl ExportContext {
    pub fn new(locale: Locale, today: NaiveDate) -> Self {
        Self {
            user: None,
            locale,
            today,
        }
    }

    pub fn with_user(mut self, firstname: &str, lastname: &str) -> Self {
        self.user = Some(UserName {
            firstname: firstname.to_string(),
            lastname: lastname.to_string(),
        });
        self
    }
}

/// A complete export request as read by the command-line tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRequest {
    pub query: QuerySnapshot,
    #[serde(default)]
    pub options: ExportOptions,
    pub context: ExportContext,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_prefers_attributes_then_builtin_fields() {
        let mut wp = WorkPackage {
            id: 42,
            subject: "Fix login".into(),
            type_name: "Bug".into(),
            attributes: BTreeMap::new(),
            description: None,
            attachments: Vec::new(),
        };
        assert_eq!(wp.value("id"), "42");
        assert_eq!(wp.value("type"), "Bug");
        assert_eq!(wp.value("status"), "");
        wp.attributes.insert("subject".into(), "Overridden".into());
        assert_eq!(wp.value("subject"), "Overridden");
    }

    #[test]
    fn request_deserializes_with_defaults() {
        let json = r#"{
            "query": {"name": "Open bugs", "work_packages": [{"id": 1, "subject": "A"}]},
            "context": {"locale": "de", "today": "2024-05-01"}
        }"#;
        let req: ExportRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.query.name(), Some("Open bugs"));
        assert_eq!(req.query.work_packages().len(), 1);
        assert!(!req.options.with_descriptions);
        assert_eq!(req.context.locale, Locale::De);
        assert!(req.context.user.is_none());
    }

    #[test]
    fn full_name_trims_missing_parts() {
        let user = UserName {
            firstname: "Ada".into(),
            lastname: String::new(),
        };
        assert_eq!(user.full_name(), "Ada");
    }
}
