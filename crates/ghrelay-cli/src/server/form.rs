//! Multipart upload form

use axum::extract::multipart::{Multipart, MultipartError};
use ghrelay_github::UploadFile;
use std::collections::HashMap;

/// Text fields and files of one multipart request
///
/// Every part that carries a filename is a file, in the order received;
/// everything else is a text field (last value wins).
#[derive(Debug, Default)]
pub struct UploadForm {
    fields: HashMap<String, String>,
    pub files: Vec<UploadFile>,
}

impl UploadForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, MultipartError> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or("").to_string();
            match field.file_name().map(|s| s.to_string()) {
                Some(filename) => {
                    let content = field.bytes().await?;
                    form.files.push(UploadFile::new(filename, content.to_vec()));
                }
                None => {
                    let value = field.text().await?;
                    form.fields.insert(name, value);
                }
            }
        }

        Ok(form)
    }

    /// Trimmed value of a text field, empty if absent
    pub fn field(&self, name: &str) -> String {
        self.fields
            .get(name)
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    }

    /// Untrimmed value of a text field, None if absent or blank
    pub fn optional(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .filter(|v| !v.trim().is_empty())
            .cloned()
    }

    #[cfg(test)]
    pub(crate) fn with_field(mut self, name: &str, value: &str) -> Self {
        self.fields.insert(name.to_string(), value.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_lookup() {
        let form = UploadForm::default()
            .with_field("owner", " acme ")
            .with_field("commitMessage", "   ");

        assert_eq!(form.field("owner"), "acme");
        assert_eq!(form.field("repo"), "");
        assert_eq!(form.optional("commitMessage"), None);
        assert_eq!(form.optional("owner").as_deref(), Some(" acme "));
    }

    #[test]
    fn test_optional_keeps_message_whitespace() {
        let message = "Add logo\n\n    indented body\n";
        let form = UploadForm::default().with_field("commitMessage", message);

        assert_eq!(form.optional("commitMessage").as_deref(), Some(message));
    }
}
