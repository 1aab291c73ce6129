//! CSS/XPath schema-driven extraction.
//!
//! A [`Schema`] declares a repeated container (`base_selector`) and a set of
//! [`Field`]s evaluated relative to each container match, mirroring the
//! grammar in the external interfaces section: `text | attribute | html |
//! regex | nested | list | nested_list`.

use crate::error::ExtractionError;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A named extraction schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    /// Human-readable schema name, carried through for debugging/caching.
    pub name: String,
    /// CSS or XPath expression selecting repeated container nodes.
    ///
    /// XPath schemas are run via [`run_xpath`]; the `xpath:` prefix
    /// convention from the wire grammar is accepted here too and stripped.
    pub base_selector: String,
    /// Fields extracted from the container node itself (e.g. its own
    /// attributes), merged into each output object alongside `fields`.
    #[serde(default)]
    pub base_fields: Vec<Field>,
    /// Per-row fields, evaluated relative to each container match.
    pub fields: Vec<Field>,
}

/// A single field within a [`Schema`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    /// Output key.
    pub name: String,
    /// Selector relative to the enclosing container (or document root for
    /// `base_fields`).
    pub selector: String,
    /// How to turn the matched node(s) into a value.
    #[serde(rename = "type")]
    pub kind: FieldType,
    /// Attribute name, required when `kind == FieldType::Attribute`.
    #[serde(default)]
    pub attribute: Option<String>,
    /// Regex source, required when `kind == FieldType::Regex`; applied to
    /// the text content of the node matched by `selector`.
    #[serde(default)]
    pub pattern: Option<String>,
    /// Value used when the selector finds nothing.
    #[serde(default)]
    pub default: Option<JsonValue>,
    /// Post-processing applied to scalar (`Text`/`Attribute`/`Html`) values.
    #[serde(default)]
    pub transform: Option<Transform>,
    /// Sub-fields, used by `Nested` and `NestedList`.
    #[serde(default)]
    pub fields: Vec<Field>,
}

/// How a field's matched node(s) become a JSON value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Trimmed text content of the first match.
    Text,
    /// Named attribute of the first match.
    Attribute,
    /// Inner HTML of the first match.
    Html,
    /// First capture group (or whole match) of a regex applied to the
    /// first match's text.
    Regex,
    /// A single sub-object, parsed by `fields`.
    Nested,
    /// Repeated scalar values (selector's own `kind` ignored; always text).
    List,
    /// Repeated sub-objects, each parsed by `fields`.
    NestedList,
}

/// Post-processing applied to a scalar extracted value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    /// Lowercase the string.
    Lowercase,
    /// Uppercase the string.
    Uppercase,
    /// Trim leading/trailing whitespace.
    Strip,
    /// Caller-registered named transform, resolved outside this crate.
    Custom(String),
}

fn apply_transform(value: String, transform: &Option<Transform>) -> String {
    match transform {
        Some(Transform::Lowercase) => value.to_lowercase(),
        Some(Transform::Uppercase) => value.to_uppercase(),
        Some(Transform::Strip) => value.trim().to_string(),
        Some(Transform::Custom(_)) | None => value,
    }
}

/// Run a CSS-selector schema against `html`, returning a JSON array.
pub fn run_css(schema: &Schema, html: &str) -> Result<JsonValue, ExtractionError> {
    use scraper::Html;

    let document = Html::parse_fragment(html);
    let base = compile_css(&schema.base_selector)?;

    let mut rows = Vec::new();
    for container in document.select(&base) {
        let mut row = serde_json::Map::new();
        for field in &schema.base_fields {
            row.insert(field.name.clone(), extract_css_field(field, container)?);
        }
        for field in &schema.fields {
            row.insert(field.name.clone(), extract_css_field(field, container)?);
        }
        rows.push(JsonValue::Object(row));
    }
    Ok(JsonValue::Array(rows))
}

fn compile_css(selector: &str) -> Result<scraper::Selector, ExtractionError> {
    scraper::Selector::parse(selector).map_err(|e| ExtractionError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

fn extract_css_field(
    field: &Field,
    container: scraper::ElementRef<'_>,
) -> Result<JsonValue, ExtractionError> {
    match field.kind {
        FieldType::Text | FieldType::Attribute | FieldType::Html | FieldType::Regex => {
            let selector = compile_css(&field.selector)?;
            let matched = container.select(&selector).next();
            let scalar = match matched {
                Some(el) => Some(scalar_from_css(field, el)?),
                None => None,
            };
            Ok(scalar
                .map(JsonValue::String)
                .unwrap_or_else(|| field.default.clone().unwrap_or(JsonValue::Null)))
        }
        FieldType::Nested => {
            let selector = compile_css(&field.selector)?;
            match container.select(&selector).next() {
                Some(el) => {
                    let mut row = serde_json::Map::new();
                    for sub in &field.fields {
                        row.insert(sub.name.clone(), extract_css_field(sub, el)?);
                    }
                    Ok(JsonValue::Object(row))
                }
                None => Ok(field.default.clone().unwrap_or(JsonValue::Null)),
            }
        }
        FieldType::List => {
            let selector = compile_css(&field.selector)?;
            let values: Vec<JsonValue> = container
                .select(&selector)
                .map(|el| JsonValue::String(el.text().collect::<String>().trim().to_string()))
                .collect();
            Ok(JsonValue::Array(values))
        }
        FieldType::NestedList => {
            let selector = compile_css(&field.selector)?;
            let mut rows = Vec::new();
            for el in container.select(&selector) {
                let mut row = serde_json::Map::new();
                for sub in &field.fields {
                    row.insert(sub.name.clone(), extract_css_field(sub, el)?);
                }
                rows.push(JsonValue::Object(row));
            }
            Ok(JsonValue::Array(rows))
        }
    }
}

fn scalar_from_css(
    field: &Field,
    el: scraper::ElementRef<'_>,
) -> Result<String, ExtractionError> {
    let raw = match field.kind {
        FieldType::Attribute => el
            .value()
            .attr(field.attribute.as_deref().unwrap_or(""))
            .unwrap_or_default()
            .to_string(),
        FieldType::Html => el.inner_html(),
        FieldType::Regex => {
            let text = el.text().collect::<String>();
            let pattern_src = field.pattern.as_deref().unwrap_or("");
            let pattern = regex::Regex::new(pattern_src).map_err(|err| {
                ExtractionError::InvalidPattern {
                    pattern: pattern_src.to_string(),
                    source: err,
                }
            })?;
            pattern
                .captures(&text)
                .and_then(|c| c.get(1).or_else(|| c.get(0)))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default()
        }
        _ => el.text().collect::<String>().trim().to_string(),
    };
    Ok(apply_transform(raw, &field.transform))
}

/// Run an XPath schema against `html`, returning a JSON array.
///
/// Built on `sxd-document`/`sxd-xpath`, which operate on well-formed XML; the
/// input is first normalized in the same way `cleaned_html` is produced
/// upstream (callers are expected to pass HTML that already round-trips as
/// XML, e.g. XHTML or output from the scraper-based cleaner).
pub fn run_xpath(schema: &Schema, html: &str) -> Result<JsonValue, ExtractionError> {
    use sxd_document::parser;
    use sxd_xpath::{Context, Factory, Value};

    let base_expr = strip_xpath_prefix(&schema.base_selector);
    let package = parser::parse(html).map_err(|e| ExtractionError::InvalidSelector {
        selector: base_expr.to_string(),
        reason: format!("document did not parse as XML: {e:?}"),
    })?;
    let document = package.as_document();
    let factory = Factory::new();
    let context = Context::new();

    let xpath = factory
        .build(base_expr)
        .map_err(|e| ExtractionError::InvalidSelector {
            selector: base_expr.to_string(),
            reason: e.to_string(),
        })?
        .ok_or_else(|| ExtractionError::InvalidSelector {
            selector: base_expr.to_string(),
            reason: "empty XPath expression".into(),
        })?;

    let value = xpath
        .evaluate(&context, document.root())
        .map_err(|e| ExtractionError::InvalidSelector {
            selector: base_expr.to_string(),
            reason: e.to_string(),
        })?;

    let nodes = match value {
        Value::Nodeset(nodes) => nodes,
        _ => sxd_xpath::nodeset::Nodeset::new(),
    };

    let mut rows = Vec::new();
    for node in nodes.iter() {
        let mut row = serde_json::Map::new();
        for field in schema.base_fields.iter().chain(schema.fields.iter()) {
            row.insert(field.name.clone(), extract_xpath_field(field, node, &factory)?);
        }
        rows.push(JsonValue::Object(row));
    }
    Ok(JsonValue::Array(rows))
}

fn strip_xpath_prefix(selector: &str) -> &str {
    selector.strip_prefix("xpath:").unwrap_or(selector)
}

fn extract_xpath_field(
    field: &Field,
    container: sxd_xpath::nodeset::Node<'_>,
    factory: &sxd_xpath::Factory,
) -> Result<JsonValue, ExtractionError> {
    use sxd_xpath::{Context, Value};

    let context = Context::new();
    let expr = strip_xpath_prefix(&field.selector);
    let xpath = factory
        .build(expr)
        .map_err(|e| ExtractionError::InvalidSelector {
            selector: expr.to_string(),
            reason: e.to_string(),
        })?
        .ok_or_else(|| ExtractionError::InvalidSelector {
            selector: expr.to_string(),
            reason: "empty XPath expression".into(),
        })?;

    let value = xpath
        .evaluate(&context, container)
        .map_err(|e| ExtractionError::InvalidSelector {
            selector: expr.to_string(),
            reason: e.to_string(),
        })?;

    match field.kind {
        FieldType::List => {
            if let Value::Nodeset(nodes) = &value {
                let values: Vec<JsonValue> = nodes
                    .iter()
                    .map(|n| JsonValue::String(apply_transform(n.string_value(), &field.transform)))
                    .collect();
                return Ok(JsonValue::Array(values));
            }
            Ok(JsonValue::Array(vec![]))
        }
        FieldType::NestedList => {
            if let Value::Nodeset(nodes) = &value {
                let mut rows = Vec::new();
                for node in nodes.iter() {
                    let mut row = serde_json::Map::new();
                    for sub in &field.fields {
                        row.insert(sub.name.clone(), extract_xpath_field(sub, node, factory)?);
                    }
                    rows.push(JsonValue::Object(row));
                }
                return Ok(JsonValue::Array(rows));
            }
            Ok(JsonValue::Array(vec![]))
        }
        FieldType::Nested => {
            if let Value::Nodeset(nodes) = &value {
                if let Some(node) = nodes.iter().next() {
                    let mut row = serde_json::Map::new();
                    for sub in &field.fields {
                        row.insert(sub.name.clone(), extract_xpath_field(sub, node, factory)?);
                    }
                    return Ok(JsonValue::Object(row));
                }
            }
            Ok(field.default.clone().unwrap_or(JsonValue::Null))
        }
        _ => {
            let raw = match &value {
                Value::Nodeset(nodes) => nodes.iter().next().map(|n| n.string_value()),
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                Value::Boolean(b) => Some(b.to_string()),
            };
            match raw {
                Some(v) => Ok(JsonValue::String(apply_transform(v, &field.transform))),
                None => Ok(field.default.clone().unwrap_or(JsonValue::Null)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, selector: &str, kind: FieldType) -> Field {
        Field {
            name: name.into(),
            selector: selector.into(),
            kind,
            attribute: None,
            pattern: None,
            default: None,
            transform: None,
            fields: vec![],
        }
    }

    #[test]
    fn missing_field_falls_back_to_default() {
        let html = r#"<div class="row"><span class="a">x</span></div>"#;
        let mut f = field("b", ".missing", FieldType::Text);
        f.default = Some(JsonValue::String("n/a".into()));
        let schema = Schema {
            name: "s".into(),
            base_selector: ".row".into(),
            base_fields: vec![],
            fields: vec![f],
        };
        let out = run_css(&schema, html).unwrap();
        assert_eq!(out, serde_json::json!([{"b": "n/a"}]));
    }

    #[test]
    fn attribute_transform_lowercases() {
        let html = r#"<div class="row"><a class="link" href="HTTPS://EXAMPLE.COM">x</a></div>"#;
        let mut f = field("href", ".link", FieldType::Attribute);
        f.attribute = Some("href".into());
        f.transform = Some(Transform::Lowercase);
        let schema = Schema {
            name: "s".into(),
            base_selector: ".row".into(),
            base_fields: vec![],
            fields: vec![f],
        };
        let out = run_css(&schema, html).unwrap();
        assert_eq!(out, serde_json::json!([{"href": "https://example.com"}]));
    }
}
