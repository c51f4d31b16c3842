//! Shape rules for a single product variant.
//!
//! A variant arrives as a loose JSON object, either one `variants` form value
//! or a record assembled from CSV columns. Everything that is not one of the
//! [`RESERVED_KEYS`] is an attribute; the result is a typed [`VariantSpec`].

use std::{fmt, str::FromStr};

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value};

pub const RESERVED_KEYS: [&str; 5] = ["price", "stock", "discount", "shipping_time", "image_count"];

const NESTED_ATTRIBUTES: &str = "attributes";

/// Where a variant came from, used to prefix error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantLocator {
    Index(usize),
    Row(usize),
}

impl fmt::Display for VariantLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariantLocator::Index(idx) => write!(f, "variant at index {}", idx),
            VariantLocator::Row(row) => write!(f, "row {}", row),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub locator: VariantLocator,
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(locator: VariantLocator, field: &str, message: String) -> Self {
        Self {
            locator,
            field: field.to_string(),
            message,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Free-form variant attributes. Never holds a reserved key and always has a
/// non-empty string `color`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Attributes(Map<String, Value>);

impl Attributes {
    pub fn color(&self) -> &str {
        self.0.get("color").and_then(Value::as_str).unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariantSpec {
    pub price: Decimal,
    pub stock: i32,
    pub discount: i32,
    pub shipping_time: Option<i32>,
    pub attributes: Attributes,
    pub image_count: u32,
}

/// Parses one `variants` form value.
pub fn parse_variant_json(text: &str, at: VariantLocator) -> Result<VariantSpec, ValidationError> {
    let value: Value = serde_json::from_str(text).map_err(|_| {
        ValidationError::new(
            at,
            "variants",
            format!("Variant at index {} has invalid JSON format.", locator_index(at)),
        )
    })?;

    match value {
        Value::Object(record) => validate_variant(&record, at),
        _ => Err(ValidationError::new(
            at,
            "variants",
            format!("Variant data must be a JSON object in {}", at),
        )),
    }
}

pub fn validate_variant(
    record: &Map<String, Value>,
    at: VariantLocator,
) -> Result<VariantSpec, ValidationError> {
    for field in ["price", "stock"] {
        if record.get(field).is_none_or(Value::is_null) {
            return Err(ValidationError::new(
                at,
                field,
                format!("'{}' is required in {}", field, at),
            ));
        }
    }

    let price = record
        .get("price")
        .and_then(as_price)
        .ok_or_else(|| invalid(at, "price"))?;

    let stock = record
        .get("stock")
        .and_then(as_non_negative)
        .ok_or_else(|| invalid(at, "stock"))?;

    let discount = match optional(record, "discount") {
        None => 0,
        Some(value) => value
            .as_i64()
            .filter(|d| (0..=100).contains(d))
            .map(|d| d as i32)
            .ok_or_else(|| {
                ValidationError::new(
                    at,
                    "discount",
                    format!("'discount' must be between 0 and 100 at {}", at),
                )
            })?,
    };

    let shipping_time = match optional(record, "shipping_time") {
        None => None,
        Some(value) => Some(as_non_negative(value).ok_or_else(|| invalid(at, "shipping_time"))?),
    };

    let attributes = collect_attributes(record, at)?;

    let image_count = match optional(record, "image_count") {
        None => 1,
        Some(value) => value
            .as_i64()
            .filter(|n| *n >= 1 && *n <= i64::from(i32::MAX))
            .map(|n| n as u32)
            .ok_or_else(|| invalid(at, "image_count"))?,
    };

    Ok(VariantSpec {
        price,
        stock,
        discount,
        shipping_time,
        attributes,
        image_count,
    })
}

fn collect_attributes(
    record: &Map<String, Value>,
    at: VariantLocator,
) -> Result<Attributes, ValidationError> {
    let mut attributes: Map<String, Value> = record
        .iter()
        .filter(|(key, _)| key.as_str() != NESTED_ATTRIBUTES && !is_reserved(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    match record.get(NESTED_ATTRIBUTES) {
        None | Some(Value::Null) => {}
        Some(Value::Object(nested)) => {
            if let Some(key) = nested.keys().find(|key| is_reserved(key)) {
                return Err(ValidationError::new(
                    at,
                    "attributes",
                    format!("'attributes' must not contain reserved key '{}' in {}", key, at),
                ));
            }
            for (key, value) in nested {
                attributes.insert(key.clone(), value.clone());
            }
        }
        Some(_) => {
            return Err(ValidationError::new(
                at,
                "attributes",
                format!("'attributes' must be a dictionary in {}", at),
            ));
        }
    }

    match attributes.get("color") {
        None => Err(ValidationError::new(
            at,
            "color",
            format!("Missing 'color' attribute in {}", at),
        )),
        Some(Value::String(color)) if !color.trim().is_empty() => Ok(Attributes(attributes)),
        Some(_) => Err(ValidationError::new(
            at,
            "color",
            format!("Invalid 'color' attribute in {}", at),
        )),
    }
}

pub fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

fn invalid(at: VariantLocator, field: &str) -> ValidationError {
    ValidationError::new(at, field, format!("Invalid '{}' in {}", field, at))
}

fn optional<'a>(record: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    record.get(field).filter(|value| !value.is_null())
}

fn as_non_negative(value: &Value) -> Option<i32> {
    value
        .as_i64()
        .filter(|n| *n >= 0)
        .and_then(|n| i32::try_from(n).ok())
}

fn as_price(value: &Value) -> Option<Decimal> {
    let number = value.as_number()?;
    let text = number.to_string();
    let price = Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()?;
    (!price.is_sign_negative() || price.is_zero()).then_some(price)
}

fn locator_index(at: VariantLocator) -> usize {
    match at {
        VariantLocator::Index(idx) | VariantLocator::Row(idx) => idx,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    fn check(value: Value) -> Result<VariantSpec, ValidationError> {
        validate_variant(&object(value), VariantLocator::Index(0))
    }

    #[test]
    fn accepts_a_minimal_variant_with_defaults() {
        let spec = check(json!({"price": 19.99, "stock": 3, "color": "red"})).unwrap();

        assert_eq!(spec.price, Decimal::new(1999, 2));
        assert_eq!(spec.stock, 3);
        assert_eq!(spec.discount, 0);
        assert_eq!(spec.shipping_time, None);
        assert_eq!(spec.image_count, 1);
        assert_eq!(spec.attributes.color(), "red");
    }

    #[test]
    fn reserved_keys_never_reach_attributes() {
        let spec = check(json!({
            "price": 10,
            "stock": 1,
            "discount": 5,
            "shipping_time": 2,
            "image_count": 2,
            "size": "M",
            "attributes": {"color": "blue", "material": "cotton"}
        }))
        .unwrap();

        let attributes = spec.attributes.to_value();
        let keys: Vec<&String> = attributes.as_object().unwrap().keys().collect();
        assert!(keys.iter().all(|key| !is_reserved(key)));
        assert_eq!(spec.attributes.get("size"), Some(&json!("M")));
        assert_eq!(spec.attributes.get("material"), Some(&json!("cotton")));
        assert_eq!(spec.attributes.color(), "blue");
        assert_eq!(spec.image_count, 2);
    }

    #[test]
    fn missing_price_is_reported_first() {
        let err = check(json!({"stock": -1})).unwrap_err();
        assert_eq!(err.field, "price");
        assert_eq!(err.message, "'price' is required in variant at index 0");
    }

    #[test]
    fn rejects_negative_price_and_fractional_stock() {
        assert_eq!(check(json!({"price": -0.5, "stock": 1, "color": "red"})).unwrap_err().field, "price");
        assert_eq!(check(json!({"price": "10", "stock": 1, "color": "red"})).unwrap_err().field, "price");
        assert_eq!(check(json!({"price": 1, "stock": 1.5, "color": "red"})).unwrap_err().field, "stock");
        assert_eq!(check(json!({"price": 1, "stock": -2, "color": "red"})).unwrap_err().field, "stock");
    }

    #[test]
    fn discount_must_stay_within_percent_range() {
        for discount in [json!(-1), json!(101), json!(12.5), json!("10")] {
            let err = check(json!({"price": 1, "stock": 1, "discount": discount, "color": "red"}))
                .unwrap_err();
            assert_eq!(err.field, "discount");
        }
        for discount in [0, 100] {
            let spec = check(json!({"price": 1, "stock": 1, "discount": discount, "color": "red"}))
                .unwrap();
            assert_eq!(spec.discount, discount);
        }
    }

    #[test]
    fn shipping_time_is_optional_but_non_negative() {
        let spec = check(json!({"price": 1, "stock": 1, "shipping_time": null, "color": "red"})).unwrap();
        assert_eq!(spec.shipping_time, None);

        let err = check(json!({"price": 1, "stock": 1, "shipping_time": -3, "color": "red"})).unwrap_err();
        assert_eq!(err.field, "shipping_time");
    }

    #[test]
    fn color_must_be_a_non_empty_string() {
        let err = check(json!({"price": 1, "stock": 1})).unwrap_err();
        assert_eq!(err.message, "Missing 'color' attribute in variant at index 0");

        let err = check(json!({"price": 1, "stock": 1, "color": ""})).unwrap_err();
        assert_eq!(err.message, "Invalid 'color' attribute in variant at index 0");

        let err = check(json!({"price": 1, "stock": 1, "color": 7})).unwrap_err();
        assert_eq!(err.field, "color");
    }

    #[test]
    fn nested_attributes_must_be_a_clean_mapping() {
        let err = check(json!({"price": 1, "stock": 1, "attributes": ["red"]})).unwrap_err();
        assert_eq!(err.field, "attributes");

        let err = check(json!({"price": 1, "stock": 1, "attributes": {"color": "red", "price": 4}}))
            .unwrap_err();
        assert_eq!(err.field, "attributes");
    }

    #[test]
    fn image_count_must_be_positive() {
        let err = check(json!({"price": 1, "stock": 1, "color": "red", "image_count": 0})).unwrap_err();
        assert_eq!(err.field, "image_count");
    }

    #[test]
    fn attribute_errors_come_before_image_count_errors() {
        let err = check(json!({"price": 1, "stock": 1, "image_count": 0})).unwrap_err();
        assert_eq!(err.field, "color");
    }

    #[test]
    fn row_locator_shows_in_messages() {
        let err = validate_variant(&object(json!({"price": 1, "stock": 1})), VariantLocator::Row(4))
            .unwrap_err();
        assert_eq!(err.message, "Missing 'color' attribute in row 4");
    }

    #[test]
    fn form_json_must_parse_to_an_object() {
        let err = parse_variant_json("{not json", VariantLocator::Index(2)).unwrap_err();
        assert_eq!(err.message, "Variant at index 2 has invalid JSON format.");

        let err = parse_variant_json("[1, 2]", VariantLocator::Index(1)).unwrap_err();
        assert_eq!(err.field, "variants");

        let spec = parse_variant_json(r#"{"price": 5, "stock": 0, "color": "green"}"#, VariantLocator::Index(0))
            .unwrap();
        assert_eq!(spec.price, Decimal::from(5));
    }
}
