use futures::future::BoxFuture;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Keyword arguments handed to a capability handler.
pub type Arguments = serde_json::Map<String, Value>;

/// A capability body: runs against one receiver with keyword arguments.
///
/// Handlers return either a JSON string or a JSON object; anything else is
/// rejected by the binder as a contract violation.
pub type Handler<R> = fn(Arc<R>, Arguments) -> BoxFuture<'static, anyhow::Result<Value>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Integer,
    Boolean,
    Array,
    Object,
}

/// One parameter of a capability, rendered without `null` valued keys.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertySpec {
    #[serde(rename = "type")]
    pub kind: PropertyType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<PropertySpec>>,
    #[serde(skip)]
    pub required: bool,
}

impl PropertySpec {
    pub fn new(kind: PropertyType) -> Self {
        Self {
            kind,
            description: None,
            enum_values: None,
            items: None,
            required: true,
        }
    }

    pub fn string() -> Self {
        Self::new(PropertyType::String)
    }

    pub fn integer() -> Self {
        Self::new(PropertyType::Integer)
    }

    pub fn boolean() -> Self {
        Self::new(PropertyType::Boolean)
    }

    pub fn object() -> Self {
        Self::new(PropertyType::Object)
    }

    pub fn array(items: PropertySpec) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::new(PropertyType::Array)
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// Object schema with properties kept in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSchema {
    properties: Vec<(String, PropertySpec)>,
}

impl ParameterSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn property(mut self, name: impl Into<String>, spec: PropertySpec) -> Self {
        self.properties.push((name.into(), spec));
        self
    }

    pub fn properties(&self) -> &[(String, PropertySpec)] {
        &self.properties
    }

    pub fn get(&self, name: &str) -> Option<&PropertySpec> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, spec)| spec)
    }

    pub fn required(&self) -> Vec<&str> {
        self.properties
            .iter()
            .filter(|(_, spec)| spec.required)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

struct OrderedProperties<'a>(&'a [(String, PropertySpec)]);

impl Serialize for OrderedProperties<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, spec) in self.0 {
            map.serialize_entry(name, spec)?;
        }
        map.end()
    }
}

impl Serialize for ParameterSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let required = self.required();
        let len = if required.is_empty() { 2 } else { 3 };
        let mut state = serializer.serialize_struct("ParameterSchema", len)?;
        state.serialize_field("type", "object")?;
        state.serialize_field("properties", &OrderedProperties(&self.properties))?;
        if required.is_empty() {
            state.skip_field("required")?;
        } else {
            state.serialize_field("required", &required)?;
        }
        state.end()
    }
}

/// Function descriptor in the shape the model's function-calling API expects.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionSchema {
    pub name: String,
    pub description: String,
    pub parameters: ParameterSchema,
}

/// A named, schema-described operation over a receiver of type `R`.
pub struct Capability<R> {
    name: String,
    description: String,
    parameters: ParameterSchema,
    handler: Handler<R>,
}

impl<R> Capability<R> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn parameters(&self) -> &ParameterSchema {
        &self.parameters
    }

    pub fn handler(&self) -> Handler<R> {
        self.handler
    }

    pub fn to_wire_schema(&self) -> FunctionSchema {
        FunctionSchema {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
        }
    }
}

impl<R> Clone for Capability<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
            handler: self.handler,
        }
    }
}

impl<R> fmt::Debug for Capability<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .finish()
    }
}

/// Pairs schema metadata with a handler. The name is passed verbatim to the
/// model, so it must be a plain identifier.
pub fn declare<R>(
    name: impl Into<String>,
    description: impl Into<String>,
    parameters: ParameterSchema,
    handler: Handler<R>,
) -> Capability<R> {
    let name = name.into();
    debug_assert!(
        is_valid_function_name(&name),
        "capability name '{}' is not a valid function identifier",
        name
    );
    Capability {
        name,
        description: description.into(),
        parameters,
        handler,
    }
}

pub fn is_valid_function_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
