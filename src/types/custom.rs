use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::core::errors::{Result, TetherError};
use crate::types::value::Value;

/// String to value conversion function
pub type MakeObject = Arc<dyn Fn(&str) -> anyhow::Result<Value> + Send + Sync>;
/// Value to string conversion function
pub type MakeString = Arc<dyn Fn(&Value) -> anyhow::Result<String> + Send + Sync>;

/// A registered string<->value conversion pair for one representation id.
///
/// Both directions are supplied explicitly at registration; there is no
/// runtime introspection to discover converters.
#[derive(Clone)]
pub struct Conversion {
    make_object: MakeObject,
    make_string: MakeString,
}

impl Conversion {
    pub fn new(make_object: MakeObject, make_string: MakeString) -> Self {
        Self {
            make_object,
            make_string,
        }
    }
}

/// Registry of custom-value conversions keyed by representation id.
///
/// A representation that is absent at first use is a configuration defect
/// surfaced as a [`TetherError::Representation`] error, never a silent
/// pass-through.
pub struct CustomFactory {
    bindings: DashMap<String, Conversion>,
}

impl CustomFactory {
    /// Empty factory with no bindings at all
    pub fn empty() -> Self {
        Self {
            bindings: DashMap::new(),
        }
    }

    /// Factory pre-loaded with the built-in primitive representations:
    /// `string`, `boolean`, `integer` and `real`
    pub fn with_builtins() -> Self {
        let factory = Self::empty();
        factory
            .register(
                "string",
                Conversion::new(
                    Arc::new(|s| Ok(Value::Str(s.to_string()))),
                    Arc::new(|v| match v {
                        Value::Str(s) => Ok(s.clone()),
                        other => anyhow::bail!("expected string value, got {}", other.kind_name()),
                    }),
                ),
            )
            .expect("builtin registration");
        factory
            .register(
                "boolean",
                Conversion::new(
                    Arc::new(|s| {
                        s.parse::<bool>()
                            .map(Value::Bool)
                            .map_err(|e| anyhow::anyhow!("bad boolean '{}': {}", s, e))
                    }),
                    Arc::new(|v| match v {
                        Value::Bool(b) => Ok(b.to_string()),
                        other => anyhow::bail!("expected boolean value, got {}", other.kind_name()),
                    }),
                ),
            )
            .expect("builtin registration");
        factory
            .register(
                "integer",
                Conversion::new(
                    Arc::new(|s| {
                        s.parse::<i64>()
                            .map(Value::Int)
                            .map_err(|e| anyhow::anyhow!("bad integer '{}': {}", s, e))
                    }),
                    Arc::new(|v| match v {
                        Value::Int(i) => Ok(i.to_string()),
                        other => anyhow::bail!("expected integer value, got {}", other.kind_name()),
                    }),
                ),
            )
            .expect("builtin registration");
        factory
            .register(
                "real",
                Conversion::new(
                    Arc::new(|s| {
                        s.parse::<f64>()
                            .map(Value::Real)
                            .map_err(|e| anyhow::anyhow!("bad real '{}': {}", s, e))
                    }),
                    Arc::new(|v| match v {
                        Value::Real(r) => Ok(r.to_string()),
                        other => anyhow::bail!("expected real value, got {}", other.kind_name()),
                    }),
                ),
            )
            .expect("builtin registration");
        factory
    }

    /// Register a conversion pair, validated eagerly.
    ///
    /// Fails with a Representation error on an empty id or when the id is
    /// already bound (rebinding a live representation would silently change
    /// marshaling behavior under running invocations).
    pub fn register<S: Into<String>>(&self, repr: S, conversion: Conversion) -> Result<()> {
        let repr = repr.into();
        if repr.is_empty() {
            return Err(TetherError::representation(
                repr,
                "representation id must not be empty",
            ));
        }
        if self.bindings.contains_key(&repr) {
            return Err(TetherError::representation(
                repr,
                "representation already bound",
            ));
        }
        debug!(repr = %repr, "registered custom conversion");
        self.bindings.insert(repr, conversion);
        Ok(())
    }

    pub fn is_bound(&self, repr: &str) -> bool {
        self.bindings.contains_key(repr)
    }

    /// Convert a rendered string back to a native value
    pub fn make_object(&self, repr: &str, text: &str) -> Result<Value> {
        let binding = self.bindings.get(repr).ok_or_else(|| {
            TetherError::representation(repr, "no conversion registered")
        })?;
        (binding.make_object)(text)
            .map_err(|e| TetherError::representation(repr, e.to_string()))
    }

    /// Render a native value to its string form
    pub fn make_string(&self, repr: &str, value: &Value) -> Result<String> {
        let binding = self.bindings.get(repr).ok_or_else(|| {
            TetherError::representation(repr, "no conversion registered")
        })?;
        (binding.make_string)(value)
            .map_err(|e| TetherError::representation(repr, e.to_string()))
    }
}

impl Default for CustomFactory {
    fn default() -> Self {
        Self::with_builtins()
    }
}
