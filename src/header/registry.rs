//! Registry of header kinds and bindings.

use std::sync::Arc;

use crate::error::{Error, PacketError};
use crate::packet::binding::{Binding, BindingTable};

use super::{Header, Schema};

/// Table of header kinds plus the binding table linking them.
///
/// A registry is populated during initialization and read-only afterwards
/// (the process-wide default is built once inside a `LazyLock`, which gives
/// the required happens-before between registration and first use). Tests
/// and embedders can build their own and inject it into `Packet`.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    kinds: Vec<Arc<Schema>>,
    bindings: BindingTable,
}

impl Registry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a header kind.
    pub fn register(&mut self, schema: Schema) -> Arc<Schema> {
        let schema = Arc::new(schema);
        self.register_arc(Arc::clone(&schema));
        schema
    }

    /// Register an already-shared header kind (catalog statics).
    pub fn register_arc(&mut self, schema: Arc<Schema>) {
        self.kinds.push(schema);
    }

    /// Look up a kind by name.
    pub fn get(&self, name: &str) -> Option<&Arc<Schema>> {
        self.kinds.iter().find(|s| s.name() == name)
    }

    /// Instantiate a header of the named kind with default field values.
    pub fn header(&self, name: &str) -> Result<Header, Error> {
        match self.get(name) {
            Some(schema) => Ok(Header::new(Arc::clone(schema))),
            None => Err(PacketError::UnknownHeader {
                name: name.to_string(),
            }
            .into()),
        }
    }

    /// Register an upper-layer dispatch rule.
    pub fn bind(&mut self, binding: Binding) {
        self.bindings.register(binding);
    }

    /// The binding table.
    pub fn bindings(&self) -> &BindingTable {
        &self.bindings
    }

    /// Number of registered kinds.
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldType;
    use crate::header::FieldDef;

    #[test]
    fn test_register_and_instantiate() {
        let mut reg = Registry::new();
        let mut s = Schema::new("X", "X header");
        s.define_field(FieldDef::new("v", FieldType::u8()).with_default(9u8));
        reg.register(s);

        assert_eq!(reg.len(), 1);
        let h = reg.header("X").unwrap();
        assert_eq!(h.value_u64("v"), Some(9));
    }

    #[test]
    fn test_unknown_kind() {
        let reg = Registry::new();
        assert!(reg.get("nope").is_none());
        assert!(matches!(
            reg.header("nope"),
            Err(Error::Packet(PacketError::UnknownHeader { .. }))
        ));
    }
}
