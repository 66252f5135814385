//! Response-tree builder: turns nested response descriptors into the flat list
//! of internally evaluated responses and the weighted dependency graph.
//!
//! Descriptors are read as `serde_json::Value` so a missing or mistyped field
//! is reported with the path of the offending descriptor.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, instrument};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::{DependencyGraph, InternalResponse, ResponseId, ResponseNode, ResponseType};

const IDENTIFIER: &str = "identifier";
const WEIGHT: &str = "weight";
const TYPE: &str = "type";
const USE_KRATOS: &str = "use_kratos";
const KRATOS_SETTINGS: &str = "kratos_response_settings";
const IS_COMBINED: &str = "is_combined";
const COMBINED_RESPONSES: &str = "combined_responses";

/// Objectives and constraints of one optimization run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptimizationSettings {
    pub objectives: Vec<Value>,
    pub constraints: Vec<Value>,
}

impl OptimizationSettings {
    /// Parse the optimization settings document.
    ///
    /// Both `objectives` and `constraints` are optional and default to empty.
    pub fn from_json_str(content: &str) -> DomainResult<Self> {
        let root: Value = serde_json::from_str(content)
            .map_err(|e| DomainError::configuration(format!("invalid optimization settings: {e}")))?;
        Self::from_value(&root)
    }

    pub fn from_value(root: &Value) -> DomainResult<Self> {
        let root = root
            .as_object()
            .ok_or_else(|| DomainError::configuration("optimization settings must be an object"))?;

        let list = |key: &str| -> DomainResult<Vec<Value>> {
            match root.get(key) {
                None => Ok(Vec::new()),
                Some(Value::Array(items)) => Ok(items.clone()),
                Some(_) => Err(DomainError::configuration(format!("'{key}' must be an array"))),
            }
        };

        Ok(Self {
            objectives: list("objectives")?,
            constraints: list("constraints")?,
        })
    }

    /// Internal responses of objectives followed by those of constraints.
    pub fn internal_responses(&self) -> DomainResult<Vec<InternalResponse>> {
        let mut responses = identify_internal_responses_at(&self.objectives, "objectives")?;
        responses.extend(identify_internal_responses_at(&self.constraints, "constraints")?);
        Ok(responses)
    }

    /// Dependency graph over the objectives.
    pub fn dependency_graph(&self) -> DomainResult<(DependencyGraph, bool)> {
        build_dependency_graph_at(&self.objectives, "objectives")
    }

    /// Identifiers of the top-level objectives, in configuration order.
    pub fn objective_ids(&self) -> DomainResult<Vec<ResponseId>> {
        self.objectives
            .iter()
            .enumerate()
            .map(|(idx, descriptor)| required_str(descriptor, IDENTIFIER, &format!("objectives[{idx}]")))
            .collect()
    }

    /// Declared `type` of every response at any depth; undeclared ones are omitted.
    pub fn response_types(&self) -> DomainResult<BTreeMap<ResponseId, ResponseType>> {
        let mut types = BTreeMap::new();
        collect_types(&self.objectives, "objectives", &mut types)?;
        collect_types(&self.constraints, "constraints", &mut types)?;
        Ok(types)
    }
}

/// Collect every descriptor, at any depth, flagged for internal evaluation.
///
/// The flag is read per descriptor. Sub-responses of a combined response are
/// listed before the combined response itself.
pub fn identify_internal_responses(descriptors: &[Value]) -> DomainResult<Vec<InternalResponse>> {
    identify_internal_responses_at(descriptors, "responses")
}

/// Build the dependency graph from top-level descriptors.
///
/// Returns the graph of combined responses and whether any combined response
/// exists. Plain top-level responses are validated but not part of the graph.
pub fn build_dependency_graph(descriptors: &[Value]) -> DomainResult<(DependencyGraph, bool)> {
    build_dependency_graph_at(descriptors, "responses")
}

fn identify_internal_responses_at(
    descriptors: &[Value],
    path: &str,
) -> DomainResult<Vec<InternalResponse>> {
    let mut internal = Vec::new();

    for (idx, descriptor) in descriptors.iter().enumerate() {
        let here = format!("{path}[{idx}]");

        if is_combined(descriptor, &here)? {
            let children = combined_responses(descriptor, &here)?;
            internal.extend(identify_internal_responses_at(
                children,
                &format!("{here}.{COMBINED_RESPONSES}"),
            )?);
        }

        if optional_bool(descriptor, USE_KRATOS, &here)?.unwrap_or(false) {
            let id = required_str(descriptor, IDENTIFIER, &here)?;
            let settings = descriptor
                .get(KRATOS_SETTINGS)
                .cloned()
                .unwrap_or_else(|| Value::Object(Default::default()));
            debug!("internal response: {}", id);
            internal.push(InternalResponse { id, settings });
        }
    }

    Ok(internal)
}

#[instrument(level = "debug", skip(descriptors))]
fn build_dependency_graph_at(
    descriptors: &[Value],
    path: &str,
) -> DomainResult<(DependencyGraph, bool)> {
    let mut roots = Vec::new();

    for (idx, descriptor) in descriptors.iter().enumerate() {
        let here = format!("{path}[{idx}]");
        required_str(descriptor, IDENTIFIER, &here)?;

        if is_combined(descriptor, &here)? {
            roots.push(build_node(descriptor, &here)?);
        } else if descriptor.get(WEIGHT).is_some() {
            required_f64(descriptor, WEIGHT, &here)?;
        }
    }

    let exist_dependencies = !roots.is_empty();
    debug!("dependency graph: {} combined responses", roots.len());
    Ok((DependencyGraph::new(roots), exist_dependencies))
}

fn build_node(descriptor: &Value, path: &str) -> DomainResult<ResponseNode> {
    let id = required_str(descriptor, IDENTIFIER, path)?;
    let weight = required_f64(descriptor, WEIGHT, path)?;

    if !is_combined(descriptor, path)? {
        return Ok(ResponseNode::Leaf { id, weight });
    }

    let children = combined_responses(descriptor, path)?;
    if children.is_empty() {
        return Err(DomainError::configuration(format!(
            "{path}: combined response '{id}' lists no '{COMBINED_RESPONSES}'"
        )));
    }

    let children = children
        .iter()
        .enumerate()
        .map(|(idx, child)| build_node(child, &format!("{path}.{COMBINED_RESPONSES}[{idx}]")))
        .collect::<DomainResult<Vec<_>>>()?;

    Ok(ResponseNode::Composite {
        id,
        weight,
        children,
    })
}

fn collect_types(
    descriptors: &[Value],
    path: &str,
    types: &mut BTreeMap<ResponseId, ResponseType>,
) -> DomainResult<()> {
    for (idx, descriptor) in descriptors.iter().enumerate() {
        let here = format!("{path}[{idx}]");
        if let Some(raw) = optional_str(descriptor, TYPE, &here)? {
            let response_type: ResponseType = serde_json::from_value(Value::String(raw.clone()))
                .map_err(|_| {
                    DomainError::configuration(format!("{here}: unknown response type '{raw}'"))
                })?;
            types.insert(required_str(descriptor, IDENTIFIER, &here)?, response_type);
        }
        if is_combined(descriptor, &here)? {
            let children = combined_responses(descriptor, &here)?;
            collect_types(children, &format!("{here}.{COMBINED_RESPONSES}"), types)?;
        }
    }
    Ok(())
}

fn is_combined(descriptor: &Value, path: &str) -> DomainResult<bool> {
    Ok(optional_bool(descriptor, IS_COMBINED, path)?.unwrap_or(false))
}

fn combined_responses<'a>(descriptor: &'a Value, path: &str) -> DomainResult<&'a [Value]> {
    match descriptor.get(COMBINED_RESPONSES) {
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(mistyped(path, COMBINED_RESPONSES, "an array")),
        None => Err(missing(path, COMBINED_RESPONSES)),
    }
}

fn required_str(descriptor: &Value, key: &str, path: &str) -> DomainResult<String> {
    optional_str(descriptor, key, path)?.ok_or_else(|| missing(path, key))
}

fn optional_str(descriptor: &Value, key: &str, path: &str) -> DomainResult<Option<String>> {
    match descriptor.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(mistyped(path, key, "a string")),
    }
}

fn required_f64(descriptor: &Value, key: &str, path: &str) -> DomainResult<f64> {
    match descriptor.get(key) {
        None => Err(missing(path, key)),
        Some(value) => value.as_f64().ok_or_else(|| mistyped(path, key, "a number")),
    }
}

fn optional_bool(descriptor: &Value, key: &str, path: &str) -> DomainResult<Option<bool>> {
    match descriptor.get(key) {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(mistyped(path, key, "a boolean")),
    }
}

fn missing(path: &str, key: &str) -> DomainError {
    DomainError::configuration(format!("{path}: missing required field '{key}'"))
}

fn mistyped(path: &str, key: &str, expected: &str) -> DomainError {
    DomainError::configuration(format!("{path}: field '{key}' must be {expected}"))
}
