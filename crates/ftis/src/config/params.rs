//! Declared analyser parameters and their resolution against user overrides.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use log::warn;
use serde_json::{Map, Number, Value};

use crate::error::ConfigError;

/// Name of the option every stage carries regardless of its own schema.
pub const CACHE: &str = "cache";

/// User-supplied option values for one stage.
pub type Overrides = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Bool,
    Integer,
    Float,
    Text,
    IntegerList,
    TextList,
}

impl ParamKind {
    fn accepts(self, value: &Value) -> bool {
        match self {
            ParamKind::Bool => value.is_boolean(),
            ParamKind::Integer => value.is_i64() || value.is_u64(),
            ParamKind::Float => value.is_number(),
            ParamKind::Text => value.is_string(),
            ParamKind::IntegerList => value
                .as_array()
                .is_some_and(|a| a.iter().all(|v| v.is_i64() || v.is_u64())),
            ParamKind::TextList => value
                .as_array()
                .is_some_and(|a| a.iter().all(Value::is_string)),
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamKind::Bool => "bool",
            ParamKind::Integer => "integer",
            ParamKind::Float => "float",
            ParamKind::Text => "text",
            ParamKind::IntegerList => "list of integers",
            ParamKind::TextList => "list of text",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub default: Value,
}

/// Ordered set of options an analyser declares, each with a kind and a default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSchema {
    specs: Vec<ParamSpec>,
}

impl ParameterSchema {
    pub fn new() -> Self {
        Self::default()
    }

    fn declare(mut self, name: &'static str, kind: ParamKind, default: Value) -> Self {
        self.specs.retain(|s| s.name != name);
        self.specs.push(ParamSpec {
            name,
            kind,
            default,
        });
        self
    }

    pub fn bool(self, name: &'static str, default: bool) -> Self {
        self.declare(name, ParamKind::Bool, Value::Bool(default))
    }

    pub fn integer(self, name: &'static str, default: i64) -> Self {
        self.declare(name, ParamKind::Integer, Value::from(default))
    }

    pub fn float(self, name: &'static str, default: f64) -> Self {
        self.declare(name, ParamKind::Float, float_value(default))
    }

    pub fn text(self, name: &'static str, default: &str) -> Self {
        self.declare(name, ParamKind::Text, Value::from(default))
    }

    pub fn integer_list(self, name: &'static str, default: &[i64]) -> Self {
        self.declare(name, ParamKind::IntegerList, Value::from(default.to_vec()))
    }

    pub fn text_list(self, name: &'static str, default: &[&str]) -> Self {
        let values = default.iter().map(|s| Value::from(*s)).collect();
        self.declare(name, ParamKind::TextList, Value::Array(values))
    }

    pub fn specs(&self) -> &[ParamSpec] {
        &self.specs
    }

    /// Looks up a declared option; `cache` resolves even when undeclared.
    pub fn kind_of(&self, name: &str) -> Option<ParamKind> {
        if name == CACHE {
            return Some(ParamKind::Bool);
        }
        self.specs.iter().find(|s| s.name == name).map(|s| s.kind)
    }
}

fn float_value(value: f64) -> Value {
    Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Merges declared defaults with overrides.
///
/// Overrides of the wrong kind are rejected. Keys the schema does not declare
/// are kept (so newer configs still load) but logged, and never reach the
/// config identity. Integers given for a
/// float option are stored as floats so `1` and `1.0` resolve identically.
pub fn validate_parameters(
    stage: &str,
    schema: &ParameterSchema,
    overrides: &Overrides,
) -> Result<Parameters, ConfigError> {
    let mut params = Parameters::defaults(stage, schema);

    for (name, value) in overrides {
        let value = match schema.kind_of(name) {
            Some(kind) if !kind.accepts(value) => {
                return Err(ConfigError::InvalidParameter {
                    stage: stage.to_string(),
                    name: name.clone(),
                    reason: format!("expected {}, got {}", kind, value),
                });
            }
            Some(ParamKind::Float) => value
                .as_f64()
                .map(float_value)
                .unwrap_or_else(|| value.clone()),
            Some(_) => value.clone(),
            None => {
                warn!("{}: unknown parameter '{}' kept as given", stage, name);
                params.undeclared.insert(name.clone());
                value.clone()
            }
        };
        params.values.insert(name.clone(), value);
    }

    Ok(params)
}

/// Resolved option values for one stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameters {
    stage: String,
    values: BTreeMap<String, Value>,
    undeclared: BTreeSet<String>,
}

impl Parameters {
    pub fn defaults(stage: &str, schema: &ParameterSchema) -> Self {
        let mut values = BTreeMap::new();
        values.insert(CACHE.to_string(), Value::Bool(false));
        for spec in schema.specs() {
            values.insert(spec.name.to_string(), spec.default.clone());
        }
        Self {
            stage: stage.to_string(),
            values,
            undeclared: BTreeSet::new(),
        }
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn cache_enabled(&self) -> bool {
        self.values
            .get(CACHE)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Keys given in the overrides that the schema does not declare.
    pub fn undeclared(&self) -> &BTreeSet<String> {
        &self.undeclared
    }

    /// Canonical description of everything that affects a stage's output.
    ///
    /// Only declared options take part. `cache` is excluded so toggling it
    /// keeps prior artifacts valid.
    pub fn config_identity(&self, analyser: &str) -> String {
        let params: Map<String, Value> = self
            .values
            .iter()
            .filter(|(k, _)| k.as_str() != CACHE && !self.undeclared.contains(k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut identity = Map::new();
        identity.insert("analyser".to_string(), Value::from(analyser));
        identity.insert("parameters".to_string(), Value::Object(params));
        Value::Object(identity).to_string()
    }

    fn invalid(&self, name: &str, reason: impl Into<String>) -> ConfigError {
        ConfigError::InvalidParameter {
            stage: self.stage.clone(),
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    fn require(&self, name: &str) -> Result<&Value, ConfigError> {
        self.values
            .get(name)
            .ok_or_else(|| self.invalid(name, "not declared"))
    }

    pub fn bool(&self, name: &str) -> Result<bool, ConfigError> {
        self.require(name)?
            .as_bool()
            .ok_or_else(|| self.invalid(name, "expected bool"))
    }

    pub fn integer(&self, name: &str) -> Result<i64, ConfigError> {
        self.require(name)?
            .as_i64()
            .ok_or_else(|| self.invalid(name, "expected integer"))
    }

    /// Integer option that must be zero or positive.
    pub fn count(&self, name: &str) -> Result<usize, ConfigError> {
        let value = self.integer(name)?;
        usize::try_from(value).map_err(|_| self.invalid(name, format!("{} is negative", value)))
    }

    pub fn float(&self, name: &str) -> Result<f64, ConfigError> {
        self.require(name)?
            .as_f64()
            .ok_or_else(|| self.invalid(name, "expected float"))
    }

    pub fn text(&self, name: &str) -> Result<&str, ConfigError> {
        self.require(name)?
            .as_str()
            .ok_or_else(|| self.invalid(name, "expected text"))
    }

    pub fn text_list(&self, name: &str) -> Result<Vec<String>, ConfigError> {
        self.require(name)?
            .as_array()
            .and_then(|items| {
                items
                    .iter()
                    .map(|v| v.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
            })
            .ok_or_else(|| self.invalid(name, "expected list of text"))
    }

    pub fn integer_list(&self, name: &str) -> Result<Vec<i64>, ConfigError> {
        self.require(name)?
            .as_array()
            .and_then(|items| items.iter().map(Value::as_i64).collect::<Option<Vec<_>>>())
            .ok_or_else(|| self.invalid(name, "expected list of integers"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> ParameterSchema {
        ParameterSchema::new()
            .integer("windowsize", 1024)
            .float("mindist", 0.01)
            .text_list("spec", &["mean", "max"])
    }

    fn overrides(value: Value) -> Overrides {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_defaults_include_cache() {
        let params = validate_parameters("Flux", &schema(), &Overrides::new()).unwrap();
        assert!(!params.cache_enabled());
        assert_eq!(params.integer("windowsize").unwrap(), 1024);
        assert_eq!(params.text_list("spec").unwrap(), vec!["mean", "max"]);
    }

    #[test]
    fn test_overrides_replace_defaults() {
        let params = validate_parameters(
            "Flux",
            &schema(),
            &overrides(json!({"windowsize": 2048, "cache": true})),
        )
        .unwrap();
        assert!(params.cache_enabled());
        assert_eq!(params.integer("windowsize").unwrap(), 2048);
    }

    #[test]
    fn test_wrong_kind_is_rejected() {
        let err = validate_parameters(
            "Flux",
            &schema(),
            &overrides(json!({"windowsize": "big"})),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidParameter { ref name, .. } if name == "windowsize"
        ));

        let err = validate_parameters("Flux", &schema(), &overrides(json!({"cache": 1})));
        assert!(err.is_err());
    }

    #[test]
    fn test_unknown_keys_are_kept() {
        let params = validate_parameters(
            "Flux",
            &schema(),
            &overrides(json!({"future_option": 3})),
        )
        .unwrap();
        assert_eq!(params.get("future_option"), Some(&json!(3)));
        assert!(params.undeclared().contains("future_option"));
    }

    #[test]
    fn test_config_identity_ignores_undeclared_keys() {
        let plain =
            validate_parameters("Flux", &schema(), &overrides(json!({"windowsize": 1024})))
                .unwrap();
        let commented = validate_parameters(
            "Flux",
            &schema(),
            &overrides(json!({"comment": "run 2", "windowsize": 1024})),
        )
        .unwrap();
        assert_eq!(plain.config_identity("Flux"), commented.config_identity("Flux"));
        assert!(!plain.config_identity("Flux").contains("comment"));
    }

    #[test]
    fn test_integer_for_float_resolves_like_float() {
        let a = validate_parameters("UMAP", &schema(), &overrides(json!({"mindist": 1}))).unwrap();
        let b =
            validate_parameters("UMAP", &schema(), &overrides(json!({"mindist": 1.0}))).unwrap();
        assert_eq!(a.config_identity("UMAP"), b.config_identity("UMAP"));
        assert_eq!(a.float("mindist").unwrap(), 1.0);
    }

    #[test]
    fn test_config_identity_ignores_cache() {
        let plain = validate_parameters("Flux", &schema(), &Overrides::new()).unwrap();
        let cached =
            validate_parameters("Flux", &schema(), &overrides(json!({"cache": true}))).unwrap();
        assert_eq!(plain.config_identity("Flux"), cached.config_identity("Flux"));

        let changed =
            validate_parameters("Flux", &schema(), &overrides(json!({"windowsize": 512})))
                .unwrap();
        assert_ne!(plain.config_identity("Flux"), changed.config_identity("Flux"));
        assert_ne!(plain.config_identity("Flux"), plain.config_identity("Other"));
    }

    #[test]
    fn test_count_rejects_negative() {
        let params =
            validate_parameters("Flux", &schema(), &overrides(json!({"windowsize": -4}))).unwrap();
        assert!(params.count("windowsize").is_err());
    }

    #[test]
    fn test_redeclaring_replaces_previous_spec() {
        let schema = ParameterSchema::new().integer("n", 1).integer("n", 2);
        assert_eq!(schema.specs().len(), 1);
        assert_eq!(schema.specs()[0].default, json!(2));
    }
}
