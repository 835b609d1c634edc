use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::core::errors::{Result, TetherError};
use crate::types::typedef::TypeDef;
use crate::types::value::Value;

/// Ordered field table of a struct type: (field name, field type) pairs.
///
/// Field types are shared registry entries, never copied.
#[derive(Debug)]
pub struct StructDef {
    name: String,
    fields: Vec<(String, Arc<TypeDef>)>,
}

impl StructDef {
    pub fn new<S: Into<String>>(name: S, fields: Vec<(String, Arc<TypeDef>)>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> &[(String, Arc<TypeDef>)] {
        &self.fields
    }

    pub fn field_type(&self, index: usize) -> Option<&Arc<TypeDef>> {
        self.fields.get(index).map(|(_, t)| t)
    }

    /// Resolve a field name to its position; unknown names are an error
    pub fn field_index(&self, field: &str) -> Result<usize> {
        self.fields
            .iter()
            .position(|(name, _)| name == field)
            .ok_or_else(|| TetherError::no_such_field(&self.name, field))
    }
}

/// Fixed-arity typed record value.
///
/// Created with every slot absent, mutated in place by position or by field
/// name, never resized. Equality and hashing combine the definition identity
/// (its qualified name) with the value array.
#[derive(Debug, Clone)]
pub struct StructValue {
    def: Arc<StructDef>,
    values: Vec<Option<Value>>,
}

impl StructValue {
    pub fn new(def: Arc<StructDef>) -> Self {
        let values = vec![None; def.arity()];
        Self { def, values }
    }

    pub fn def(&self) -> &Arc<StructDef> {
        &self.def
    }

    pub fn arity(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index).and_then(|slot| slot.as_ref())
    }

    pub fn get_by_name(&self, field: &str) -> Result<Option<&Value>> {
        let index = self.def.field_index(field)?;
        Ok(self.get(index))
    }

    pub fn set(&mut self, index: usize, value: Value) -> Result<()> {
        let slot = self.values.get_mut(index).ok_or_else(|| {
            TetherError::no_such_field(self.def.name(), format!("#{}", index))
        })?;
        *slot = Some(value);
        Ok(())
    }

    pub fn set_by_name(&mut self, field: &str, value: Value) -> Result<()> {
        let index = self.def.field_index(field)?;
        self.values[index] = Some(value);
        Ok(())
    }

    pub fn clear(&mut self, index: usize) -> Result<()> {
        let slot = self.values.get_mut(index).ok_or_else(|| {
            TetherError::no_such_field(self.def.name(), format!("#{}", index))
        })?;
        *slot = None;
        Ok(())
    }

    /// Member value at a position, absent slots read as null
    pub fn member(&self, index: usize) -> Value {
        self.get(index).cloned().unwrap_or(Value::Null)
    }
}

impl PartialEq for StructValue {
    fn eq(&self, other: &Self) -> bool {
        self.def.name() == other.def.name() && self.values == other.values
    }
}

impl Eq for StructValue {}

impl Hash for StructValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.def.name().hash(state);
        self.values.hash(state);
    }
}
