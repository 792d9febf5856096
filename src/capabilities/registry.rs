use log::warn;
use std::sync::Arc;

use super::binder::{bind, Invocable};
use super::schema::{Capability, FunctionSchema};

/// A device platform or plugin that owns a fixed list of capabilities.
///
/// The list is built once per process and never mutated, so repeated calls
/// yield the same capabilities in the same order.
pub trait Provider: Send + Sync + Sized + 'static {
    type Settings;

    fn vendor_name() -> &'static str;

    fn capabilities() -> &'static [Capability<Self>];

    fn construct(settings: Self::Settings) -> anyhow::Result<Self>;
}

pub fn get_capabilities<P: Provider>() -> &'static [Capability<P>] {
    P::capabilities()
}

pub fn wire_schemas<P: Provider>() -> Vec<FunctionSchema> {
    P::capabilities()
        .iter()
        .map(Capability::to_wire_schema)
        .collect()
}

/// Binds every capability of `P` to one shared receiver.
pub fn bind_provider<P: Provider>(receiver: P) -> Vec<Box<dyn Invocable>> {
    let receiver = Arc::new(receiver);
    P::capabilities()
        .iter()
        .map(|capability| Box::new(bind(capability, receiver.clone())) as Box<dyn Invocable>)
        .collect()
}

pub fn construct_and_bind<P: Provider>(settings: P::Settings) -> anyhow::Result<Vec<Box<dyn Invocable>>> {
    Ok(bind_provider(P::construct(settings)?))
}

/// The functions offered to the model for one request, unique by name.
#[derive(Default)]
pub struct CapabilitySet {
    entries: Vec<Box<dyn Invocable>>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds bound capabilities; a name already offered keeps its first binding.
    pub fn extend(&mut self, bound: impl IntoIterator<Item = Box<dyn Invocable>>) {
        for invocable in bound {
            if self.get(invocable.name()).is_some() {
                warn!(
                    "Capability {} is offered twice; keeping the first binding",
                    invocable.name()
                );
                continue;
            }
            self.entries.push(invocable);
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Invocable> {
        self.entries
            .iter()
            .find(|entry| entry.name() == name)
            .map(|entry| entry.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.name()).collect()
    }

    pub fn wire_schemas(&self) -> Vec<FunctionSchema> {
        self.entries.iter().map(|entry| entry.wire_schema()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<Box<dyn Invocable>> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Box<dyn Invocable>>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}
