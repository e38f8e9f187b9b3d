//! Catalog validation

use crate::schema::{RawCatalog, RawItem, RawResponseProcessing, RawVariable};
use qti_types::{
    BaseType, Cardinality, Duration, Value, VariableDeclaration, VariableKind, is_built_in,
};
use qti_util::validate_identifier;
use std::collections::HashSet;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Item '{item_id}': {message}")]
    ItemError { item_id: String, message: String },

    #[error("Duplicate item ID: {0}")]
    DuplicateItemId(String),

    #[error("Item '{item_id}': invalid duration '{value}' for {field}: {message}")]
    InvalidDuration {
        item_id: String,
        field: &'static str,
        value: String,
        message: String,
    },

    #[error("Item '{item_id}': min_time {min_time} exceeds max_time {max_time}")]
    MinExceedsMax {
        item_id: String,
        min_time: Duration,
        max_time: Duration,
    },

    #[error("Item '{item_id}': variable '{identifier}': {message}")]
    VariableError {
        item_id: String,
        identifier: String,
        message: String,
    },

    #[error("Item '{item_id}': duplicate variable '{identifier}'")]
    DuplicateVariable { item_id: String, identifier: String },

    #[error("Item '{item_id}': '{identifier}' is a built-in variable")]
    ReservedVariable { item_id: String, identifier: String },

    #[error("Global config error: {0}")]
    GlobalError(String),
}

/// Validate a raw catalog
pub fn validate_catalog(catalog: &RawCatalog) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(latency) = &catalog.session.acceptable_latency
        && let Err(e) = Duration::parse(latency)
    {
        errors.push(ValidationError::GlobalError(format!(
            "invalid acceptable_latency '{}': {}",
            latency, e
        )));
    }

    // Check for duplicate item IDs
    let mut seen_ids = HashSet::new();
    for item in &catalog.items {
        if !seen_ids.insert(&item.id) {
            errors.push(ValidationError::DuplicateItemId(item.id.clone()));
        }
    }

    for item in &catalog.items {
        errors.extend(validate_item(item));
    }

    errors
}

fn validate_item(item: &RawItem) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Err(e) = validate_identifier(&item.id) {
        errors.push(ValidationError::ItemError {
            item_id: item.id.clone(),
            message: e.to_string(),
        });
    }

    if let Some(limits) = &item.time_limits {
        let min_time = check_duration(item, "min_time", limits.min_time.as_deref(), &mut errors);
        let max_time = check_duration(item, "max_time", limits.max_time.as_deref(), &mut errors);

        if let Some(max_time) = max_time
            && max_time.is_zero()
        {
            errors.push(ValidationError::ItemError {
                item_id: item.id.clone(),
                message: "max_time must be longer than PT0S".into(),
            });
        }

        if let (Some(min_time), Some(max_time)) = (min_time, max_time)
            && max_time.shorter_than(&min_time)
        {
            errors.push(ValidationError::MinExceedsMax {
                item_id: item.id.clone(),
                min_time,
                max_time,
            });
        }
    }

    let mut declarations = Vec::new();
    let mut seen = HashSet::new();
    for raw in &item.variables {
        if is_built_in(&raw.identifier) {
            errors.push(ValidationError::ReservedVariable {
                item_id: item.id.clone(),
                identifier: raw.identifier.clone(),
            });
            continue;
        }
        if !seen.insert(raw.identifier.as_str()) {
            errors.push(ValidationError::DuplicateVariable {
                item_id: item.id.clone(),
                identifier: raw.identifier.clone(),
            });
            continue;
        }
        match declaration_from_raw(raw) {
            Ok(decl) => declarations.push(decl),
            Err(message) => errors.push(ValidationError::VariableError {
                item_id: item.id.clone(),
                identifier: raw.identifier.clone(),
                message,
            }),
        }
    }

    if let Some(RawResponseProcessing::MatchCorrect { response, outcome }) =
        &item.response_processing
    {
        errors.extend(validate_match_correct(item, &declarations, response, outcome));
    }

    errors
}

fn check_duration(
    item: &RawItem,
    field: &'static str,
    value: Option<&str>,
    errors: &mut Vec<ValidationError>,
) -> Option<Duration> {
    let value = value?;
    match Duration::parse(value) {
        Ok(d) => Some(d),
        Err(e) => {
            errors.push(ValidationError::InvalidDuration {
                item_id: item.id.clone(),
                field,
                value: value.to_string(),
                message: e.to_string(),
            });
            None
        }
    }
}

fn validate_match_correct(
    item: &RawItem,
    declarations: &[VariableDeclaration],
    response: &str,
    outcome: &str,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let error = |message: String| ValidationError::ItemError {
        item_id: item.id.clone(),
        message,
    };

    match declarations.iter().find(|d| d.identifier == response) {
        Some(decl) if decl.kind != VariableKind::Response => errors.push(error(format!(
            "match_correct response '{}' is not a response variable",
            response
        ))),
        Some(decl) if decl.correct_response.is_none() => errors.push(error(format!(
            "match_correct response '{}' has no correct_response",
            response
        ))),
        Some(_) => {}
        None => errors.push(error(format!(
            "match_correct response '{}' is not declared",
            response
        ))),
    }

    match declarations.iter().find(|d| d.identifier == outcome) {
        Some(decl)
            if decl.kind != VariableKind::Outcome
                || decl.cardinality != Cardinality::Single
                || decl.base_type != BaseType::Float =>
        {
            errors.push(error(format!(
                "match_correct outcome '{}' must be a single float outcome",
                outcome
            )))
        }
        Some(_) => {}
        None => errors.push(error(format!(
            "match_correct outcome '{}' is not declared",
            outcome
        ))),
    }

    errors
}

/// Build a declaration from its raw form, checking names, types and values
pub fn declaration_from_raw(raw: &RawVariable) -> Result<VariableDeclaration, String> {
    validate_identifier(&raw.identifier).map_err(|e| e.to_string())?;

    let kind = parse_kind(&raw.kind)?;
    let base_type = parse_base_type(&raw.base_type)?;
    let cardinality = match &raw.cardinality {
        Some(c) => parse_cardinality(c)?,
        None => Cardinality::Single,
    };

    let mut decl = VariableDeclaration::new(raw.identifier.clone(), kind, base_type, cardinality);

    if let Some(default) = &raw.default {
        let value = value_from_toml(base_type, cardinality, default)
            .map_err(|e| format!("invalid default: {}", e))?;
        decl = decl.with_default(value);
    }

    if let Some(correct) = &raw.correct_response {
        if kind != VariableKind::Response {
            return Err("only response variables can have a correct_response".into());
        }
        let value = value_from_toml(base_type, cardinality, correct)
            .map_err(|e| format!("invalid correct_response: {}", e))?;
        decl = decl.with_correct_response(value);
    }

    Ok(decl)
}

/// Parse a variable kind
pub fn parse_kind(s: &str) -> Result<VariableKind, String> {
    match s.to_lowercase().as_str() {
        "response" => Ok(VariableKind::Response),
        "outcome" => Ok(VariableKind::Outcome),
        "template" => Ok(VariableKind::Template),
        other => Err(format!("Unknown variable kind: {}", other)),
    }
}

/// Parse a base type name
pub fn parse_base_type(s: &str) -> Result<BaseType, String> {
    match s.to_lowercase().as_str() {
        "boolean" => Ok(BaseType::Boolean),
        "integer" => Ok(BaseType::Integer),
        "float" => Ok(BaseType::Float),
        "string" => Ok(BaseType::String),
        "identifier" => Ok(BaseType::Identifier),
        "duration" => Ok(BaseType::Duration),
        other => Err(format!("Unknown base type: {}", other)),
    }
}

/// Parse a cardinality name
pub fn parse_cardinality(s: &str) -> Result<Cardinality, String> {
    match s.to_lowercase().as_str() {
        "single" => Ok(Cardinality::Single),
        "multiple" => Ok(Cardinality::Multiple),
        "ordered" => Ok(Cardinality::Ordered),
        other => Err(format!("Unknown cardinality: {}", other)),
    }
}

/// Convert a TOML value into a typed value. Containers are written as arrays.
pub fn value_from_toml(
    base_type: BaseType,
    cardinality: Cardinality,
    raw: &toml::Value,
) -> Result<Value, String> {
    match (cardinality, raw) {
        (Cardinality::Single, toml::Value::Array(_)) => {
            Err("expected a single value, found an array".into())
        }
        (Cardinality::Single, single) => single_from_toml(base_type, single),
        (_, toml::Value::Array(items)) => {
            let values = items
                .iter()
                .map(|item| single_from_toml(base_type, item))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(if cardinality == Cardinality::Multiple {
                Value::Multiple(values)
            } else {
                Value::Ordered(values)
            })
        }
        (_, _) => Err(format!("expected an array of {} values", base_type)),
    }
}

fn single_from_toml(base_type: BaseType, raw: &toml::Value) -> Result<Value, String> {
    match (base_type, raw) {
        (BaseType::Boolean, toml::Value::Boolean(b)) => Ok(Value::Boolean(*b)),
        (BaseType::Integer, toml::Value::Integer(i)) => Ok(Value::Integer(*i)),
        (BaseType::Float, toml::Value::Float(f)) => Ok(Value::Float(*f)),
        (BaseType::Float, toml::Value::Integer(i)) => Ok(Value::Float(*i as f64)),
        (
            BaseType::String | BaseType::Identifier | BaseType::Duration,
            toml::Value::String(s),
        ) => Value::parse_single(base_type, s).map_err(|e| e.to_string()),
        (_, other) => Err(format!("expected {}, found {}", base_type, other.type_str())),
    }
}
