use serde::{Serialize, Serializer, ser::SerializeMap};

/// A CSV row that could not be imported: its original cells, keyed by the
/// header they appeared under, and the reason it failed.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorRow {
    pub fields: Vec<(String, String)>,
    pub error: String,
}

impl Serialize for ErrorRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.serialize_entry("error", &self.error)?;
        map.end()
    }
}

#[derive(Debug, Serialize)]
pub struct BulkImportReport {
    pub message: String,
    pub uploaded: usize,
    pub errors: usize,
    pub error_file: Option<String>,
    pub error_details: Vec<ErrorRow>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_rows_serialize_flat_with_trailing_error() {
        let row = ErrorRow {
            fields: vec![
                ("product_name".to_string(), "Tee".to_string()),
                ("price".to_string(), String::new()),
            ],
            error: "Missing required field 'price' in row 2".to_string(),
        };

        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["product_name"], "Tee");
        assert_eq!(value["price"], "");
        assert_eq!(value["error"], "Missing required field 'price' in row 2");
        assert!(value.get("brand").is_none());
    }
}
