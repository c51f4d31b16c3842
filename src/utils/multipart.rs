use std::collections::HashMap;

use axum::extract::Multipart;
use bytes::Bytes;

use crate::error::{AppError, Result};

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub data: Bytes,
}

impl UploadedFile {
    pub fn new(file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            data: data.into(),
        }
    }
}

/// A fully buffered multipart body. Parts that carry a file name are files,
/// everything else is a text field. Repeated names keep their order.
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, Vec<String>>,
    files: HashMap<String, Vec<UploadedFile>>,
}

impl FormData {
    pub async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = FormData::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(format!("Invalid multipart request: {}", e)))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            let file_name = field.file_name().map(str::to_string);

            match file_name {
                Some(file_name) => {
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| AppError::BadRequest(format!("Multipart error: {}", e)))?;
                    form.add_file(
                        &name,
                        UploadedFile {
                            file_name,
                            data,
                        },
                    );
                }
                None => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| AppError::BadRequest(format!("Multipart error: {}", e)))?;
                    form.add_field(&name, text);
                }
            }
        }

        Ok(form)
    }

    pub fn add_field(&mut self, name: &str, value: impl Into<String>) {
        self.fields
            .entry(name.to_string())
            .or_default()
            .push(value.into());
    }

    pub fn add_file(&mut self, name: &str, file: UploadedFile) {
        self.files.entry(name.to_string()).or_default().push(file);
    }

    /// First value of a text field, if sent.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn require_text(&self, name: &str) -> Result<&str> {
        self.text(name)
            .ok_or_else(|| AppError::BadRequest(format!("'{}' is required", name)))
    }

    pub fn texts(&self, name: &str) -> Vec<String> {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    pub fn take_files(&mut self, name: &str) -> Vec<UploadedFile> {
        self.files.remove(name).unwrap_or_default()
    }
}

/// Form booleans accept the usual spellings.
pub fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(AppError::BadRequest(format!("'{}' must be a boolean", name))),
    }
}

pub fn parse_int(name: &str, value: &str) -> Result<i32> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("'{}' must be an integer", name)))
}

/// Clients sometimes send JSON-encoded strings as form values.
pub fn strip_quotes(value: &str) -> String {
    value.trim_matches('"').to_string()
}
