pub mod binder;
pub mod registry;
pub mod schema;

pub use binder::{bind, BoundCapability, Invocable};
pub use registry::{
    bind_provider, construct_and_bind, get_capabilities, wire_schemas, CapabilitySet, Provider,
};
pub use schema::{
    declare, Arguments, Capability, FunctionSchema, Handler, ParameterSchema, PropertySpec,
    PropertyType,
};

use serde::de::DeserializeOwned;

/// Deserializes handler keyword arguments into a typed struct.
pub fn typed_arguments<T: DeserializeOwned>(arguments: Arguments) -> anyhow::Result<T> {
    serde_json::from_value(serde_json::Value::Object(arguments))
        .map_err(|e| anyhow::anyhow!("invalid arguments: {}", e))
}
