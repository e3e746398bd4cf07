//! Immutable, typed key/value configuration with dotted-path lookup.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::ConfigError;

/// The expected type of a declared property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    Bool,
    Integer,
    Float,
    String,
    List,
    Map,
    Any,
}

impl PropertyKind {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            PropertyKind::Bool => value.is_boolean(),
            PropertyKind::Integer => value.is_i64() || value.is_u64(),
            PropertyKind::Float => value.is_number(),
            PropertyKind::String => value.is_string(),
            PropertyKind::List => value.is_array(),
            PropertyKind::Map => value.is_object(),
            PropertyKind::Any => true,
        }
    }
}

impl std::fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyKind::Bool => write!(f, "bool"),
            PropertyKind::Integer => write!(f, "integer"),
            PropertyKind::Float => write!(f, "float"),
            PropertyKind::String => write!(f, "string"),
            PropertyKind::List => write!(f, "list"),
            PropertyKind::Map => write!(f, "map"),
            PropertyKind::Any => write!(f, "any"),
        }
    }
}

/// Declaration of a configuration property an extension understands.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertySpec {
    pub name: String,
    pub kind: PropertyKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl PropertySpec {
    pub fn new(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            default: None,
            description: String::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// An immutable configuration tree.
///
/// Lookups take dotted paths (`executor.maxConcurrency`). A literal top-level key
/// containing dots wins over the nested interpretation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration {
    values: Map<String, Value>,
}

impl Configuration {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Wraps a JSON object. Any other value is rejected.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        match value {
            Value::Object(values) => Ok(Self { values }),
            Value::Null => Ok(Self::empty()),
            other => Err(ConfigError::InvalidType {
                name: "<root>".to_string(),
                expected: PropertyKind::Map.to_string(),
                found: type_name(&other).to_string(),
            }),
        }
    }

    /// Builds a configuration from dotted keys, nesting as needed.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let mut values = Map::new();
        for (key, value) in pairs {
            set_path(&mut values, key.as_ref(), value);
        }
        Self { values }
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        if let Some(value) = self.values.get(path) {
            return Some(value);
        }
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.values.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get_bool(&self, path: &str) -> Result<Option<bool>, ConfigError> {
        self.typed(path, PropertyKind::Bool, Value::as_bool)
    }

    pub fn get_bool_or(&self, path: &str, default: bool) -> Result<bool, ConfigError> {
        Ok(self.get_bool(path)?.unwrap_or(default))
    }

    pub fn get_str(&self, path: &str) -> Result<Option<&str>, ConfigError> {
        self.typed(path, PropertyKind::String, Value::as_str)
    }

    pub fn get_i64(&self, path: &str) -> Result<Option<i64>, ConfigError> {
        self.typed(path, PropertyKind::Integer, Value::as_i64)
    }

    /// Reads a list of strings. A single string is accepted as a one-element list.
    pub fn get_string_list(&self, path: &str) -> Result<Vec<String>, ConfigError> {
        match self.get(path) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::String(s)) => Ok(vec![s.clone()]),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| ConfigError::InvalidType {
                            name: path.to_string(),
                            expected: "list of strings".to_string(),
                            found: format!("list containing {}", type_name(item)),
                        })
                })
                .collect(),
            Some(other) => Err(mismatch(path, PropertyKind::List, other)),
        }
    }

    /// Reads a map whose values are scalars, rendering them as strings.
    pub fn get_string_map(&self, path: &str) -> Result<BTreeMap<String, String>, ConfigError> {
        match self.get(path) {
            None | Some(Value::Null) => Ok(BTreeMap::new()),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(k, v)| match v {
                    Value::String(s) => Ok((k.clone(), s.clone())),
                    Value::Bool(_) | Value::Number(_) => Ok((k.clone(), v.to_string())),
                    other => Err(ConfigError::InvalidType {
                        name: format!("{}.{}", path, k),
                        expected: PropertyKind::String.to_string(),
                        found: type_name(other).to_string(),
                    }),
                })
                .collect(),
            Some(other) => Err(mismatch(path, PropertyKind::Map, other)),
        }
    }

    /// Returns the sub-tree at `path`, or an empty configuration.
    pub fn section(&self, path: &str) -> Configuration {
        match self.get(path) {
            Some(Value::Object(map)) => Configuration {
                values: map.clone(),
            },
            _ => Configuration::empty(),
        }
    }

    /// Returns a new configuration with `overlay` deep-merged on top of this one.
    pub fn merge(&self, overlay: &Configuration) -> Configuration {
        let mut values = self.values.clone();
        for (key, value) in &overlay.values {
            match (values.get_mut(key), value) {
                (Some(Value::Object(base)), Value::Object(top)) => {
                    let merged = Configuration {
                        values: base.clone(),
                    }
                    .merge(&Configuration {
                        values: top.clone(),
                    });
                    *base = merged.values;
                }
                _ => {
                    values.insert(key.clone(), value.clone());
                }
            }
        }
        Configuration { values }
    }

    /// Checks this configuration against declared properties and fills in defaults.
    pub fn resolve(&self, specs: &[PropertySpec]) -> Result<Configuration, ConfigError> {
        let mut values = self.values.clone();
        for spec in specs {
            match self.get(&spec.name) {
                Some(value) if !value.is_null() => {
                    if !spec.kind.matches(value) {
                        return Err(mismatch(&spec.name, spec.kind, value));
                    }
                }
                _ => match &spec.default {
                    Some(default) => set_path(&mut values, &spec.name, default.clone()),
                    None if spec.required => {
                        return Err(ConfigError::MissingProperty {
                            name: spec.name.clone(),
                        })
                    }
                    None => {}
                },
            }
        }
        Ok(Configuration { values })
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.values.clone())
    }

    fn typed<'a, T>(
        &'a self,
        path: &str,
        kind: PropertyKind,
        extract: impl Fn(&'a Value) -> Option<T>,
    ) -> Result<Option<T>, ConfigError> {
        match self.get(path) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => extract(value)
                .map(Some)
                .ok_or_else(|| mismatch(path, kind, value)),
        }
    }
}

fn set_path(values: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            values.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = values
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(child) = entry {
                set_path(child, rest, value);
            }
        }
    }
}

fn mismatch(name: &str, expected: PropertyKind, found: &Value) -> ConfigError {
    ConfigError::InvalidType {
        name: name.to_string(),
        expected: expected.to_string(),
        found: type_name(found).to_string(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Configuration {
        Configuration::from_value(json!({
            "dryRun": true,
            "executor": { "maxConcurrency": 4 },
            "selectors": ["kind IN (Topic)"],
            "labels": { "team": "data", "tier": 1 },
            "legacy.key": "literal"
        }))
        .unwrap()
    }

    #[test]
    fn test_dotted_lookup() {
        let config = sample();
        assert_eq!(config.get_bool("dryRun").unwrap(), Some(true));
        assert_eq!(config.get_i64("executor.maxConcurrency").unwrap(), Some(4));
        assert_eq!(config.get_str("legacy.key").unwrap(), Some("literal"));
        assert!(config.get("executor.missing").is_none());
        assert!(config.get("dryRun.nested").is_none());
    }

    #[test]
    fn test_type_mismatch_is_an_error() {
        let config = sample();
        let err = config.get_bool("executor").unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidType {
                name: "executor".to_string(),
                expected: "bool".to_string(),
                found: "map".to_string(),
            }
        );
    }

    #[test]
    fn test_string_list_and_map() {
        let config = sample();
        assert_eq!(
            config.get_string_list("selectors").unwrap(),
            vec!["kind IN (Topic)".to_string()]
        );
        assert!(config.get_string_list("missing").unwrap().is_empty());

        let labels = config.get_string_map("labels").unwrap();
        assert_eq!(labels.get("team").map(String::as_str), Some("data"));
        assert_eq!(labels.get("tier").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_from_pairs_nests_dotted_keys() {
        let config = Configuration::from_pairs([
            ("executor.maxConcurrency", json!(2)),
            ("executor.timeoutSecs", json!(30)),
        ]);
        assert_eq!(config.get_i64("executor.maxConcurrency").unwrap(), Some(2));
        assert_eq!(config.section("executor").get_i64("timeoutSecs").unwrap(), Some(30));
    }

    #[test]
    fn test_merge_is_deep_and_does_not_mutate() {
        let base = sample();
        let overlay = Configuration::from_value(json!({
            "dryRun": false,
            "executor": { "timeoutSecs": 10 }
        }))
        .unwrap();

        let merged = base.merge(&overlay);
        assert_eq!(merged.get_bool("dryRun").unwrap(), Some(false));
        assert_eq!(merged.get_i64("executor.maxConcurrency").unwrap(), Some(4));
        assert_eq!(merged.get_i64("executor.timeoutSecs").unwrap(), Some(10));
        assert_eq!(base.get_bool("dryRun").unwrap(), Some(true));
    }

    #[test]
    fn test_resolve_applies_defaults_and_requires() {
        let specs = vec![
            PropertySpec::new("pattern", PropertyKind::String).required(),
            PropertySpec::new("limits.max", PropertyKind::Integer).default_value(json!(10)),
        ];

        let missing = Configuration::empty().resolve(&specs).unwrap_err();
        assert_eq!(
            missing,
            ConfigError::MissingProperty {
                name: "pattern".to_string()
            }
        );

        let resolved = Configuration::from_pairs([("pattern", json!("^[a-z]+$"))])
            .resolve(&specs)
            .unwrap();
        assert_eq!(resolved.get_i64("limits.max").unwrap(), Some(10));

        let wrong = Configuration::from_pairs([("pattern", json!(5))]).resolve(&specs);
        assert!(matches!(wrong, Err(ConfigError::InvalidType { .. })));
    }

    #[test]
    fn test_from_value_rejects_non_objects() {
        assert!(Configuration::from_value(json!([1, 2])).is_err());
        assert!(Configuration::from_value(Value::Null).unwrap().is_empty());
    }
}
