use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use crate::bus::message::MessagePayload;
use crate::bus::transport::MessageBus;
use crate::core::errors::{Result, TetherError};
use crate::types::custom::CustomFactory;
use crate::types::registry::TypeRegistry;
use crate::types::structure::StructDef;
use crate::types::typedef::{SingletonPolicy, TypeBody, TypeDef};

/// Format version tag carried by serialized type documents
pub const DOCUMENT_VERSION: u32 = 1;

/// Type persistence capability backed by an external storage provider
#[async_trait]
pub trait TypeStorage: Send + Sync {
    async fn load_type(&self, name: &str) -> Result<Arc<TypeDef>>;
    async fn list_types(&self) -> Result<Vec<String>>;
    async fn put_type(&self, def: &TypeDef) -> Result<()>;
}

/// Serialize a type declaration to its structured document form
pub fn to_document(def: &TypeDef) -> JsonValue {
    let mut doc = document_node(def);
    doc["version"] = json!(DOCUMENT_VERSION);
    doc
}

fn document_node(def: &TypeDef) -> JsonValue {
    match def.body() {
        TypeBody::Primitive { repr } => json!({
            "name": def.name(),
            "kind": "primitive",
            "repr": repr,
        }),
        TypeBody::Nullable { element } => json!({
            "name": def.name(),
            "kind": "nullable",
            "element": document_node(element),
        }),
        TypeBody::List {
            element,
            permutable,
            singleton,
        } => {
            let mut doc = json!({
                "name": def.name(),
                "kind": "list",
                "element": document_node(element),
                "permutable": permutable,
            });
            if let Some(policy) = singleton {
                doc["singleton"] = json!(match policy {
                    SingletonPolicy::First => "first",
                    SingletonPolicy::Last => "last",
                    SingletonPolicy::Only => "only",
                });
            }
            doc
        }
        TypeBody::Bag { element } => json!({
            "name": def.name(),
            "kind": "bag",
            "element": document_node(element),
        }),
        TypeBody::Struct { def: struct_def } => json!({
            "name": struct_def.name(),
            "kind": "struct",
            "fields": struct_def
                .fields()
                .iter()
                .map(|(name, field_type)| json!({
                    "name": name,
                    "type": document_node(field_type),
                }))
                .collect::<Vec<_>>(),
        }),
        TypeBody::Custom { repr } => json!({
            "name": def.name(),
            "kind": "custom",
            "repr": repr,
        }),
    }
}

/// Rebuild a type declaration from its document form, interning it (and
/// every nested element type) into the registry.
pub fn from_document(
    doc: &JsonValue,
    registry: &TypeRegistry,
    factory: &CustomFactory,
) -> Result<Arc<TypeDef>> {
    let version = doc
        .get("version")
        .and_then(JsonValue::as_u64)
        .ok_or_else(|| {
            TetherError::structural_decode("versioned type document", "missing version")
        })? as u32;
    if version != DOCUMENT_VERSION {
        return Err(TetherError::serialization_version(version, DOCUMENT_VERSION));
    }
    decode_node(doc, registry, factory)
}

fn decode_node(
    doc: &JsonValue,
    registry: &TypeRegistry,
    factory: &CustomFactory,
) -> Result<Arc<TypeDef>> {
    let name = field_str(doc, "name")?;
    let kind = field_str(doc, "kind")?;
    let def = match kind {
        "primitive" => TypeDef::primitive(name, field_str(doc, "repr")?),
        "nullable" => TypeDef::nullable(name, decode_element(doc, registry, factory)?),
        "list" => {
            let permutable = doc
                .get("permutable")
                .and_then(JsonValue::as_bool)
                .unwrap_or(false);
            let singleton = match doc.get("singleton").and_then(JsonValue::as_str) {
                None => None,
                Some("first") => Some(SingletonPolicy::First),
                Some("last") => Some(SingletonPolicy::Last),
                Some("only") => Some(SingletonPolicy::Only),
                Some(other) => {
                    return Err(TetherError::structural_decode(
                        "singleton policy",
                        other.to_string(),
                    ))
                }
            };
            TypeDef::list_with(
                name,
                decode_element(doc, registry, factory)?,
                permutable,
                singleton,
            )
        }
        "bag" => TypeDef::bag(name, decode_element(doc, registry, factory)?),
        "struct" => {
            let fields = doc
                .get("fields")
                .and_then(JsonValue::as_array)
                .ok_or_else(|| TetherError::structural_decode("field array", "missing fields"))?;
            let mut decoded = Vec::with_capacity(fields.len());
            for field in fields {
                let field_name = field_str(field, "name")?.to_string();
                let type_doc = field.get("type").ok_or_else(|| {
                    TetherError::structural_decode("field type document", "missing type")
                })?;
                decoded.push((field_name, decode_node(type_doc, registry, factory)?));
            }
            TypeDef::structure(Arc::new(StructDef::new(name, decoded)))
        }
        "custom" => TypeDef::custom(name, field_str(doc, "repr")?, factory)?,
        other => {
            return Err(TetherError::structural_decode(
                "type kind",
                other.to_string(),
            ))
        }
    };
    Ok(registry.intern(def))
}

fn decode_element(
    doc: &JsonValue,
    registry: &TypeRegistry,
    factory: &CustomFactory,
) -> Result<Arc<TypeDef>> {
    let element = doc
        .get("element")
        .ok_or_else(|| TetherError::structural_decode("element document", "missing element"))?;
    decode_node(element, registry, factory)
}

fn field_str<'d>(doc: &'d JsonValue, key: &str) -> Result<&'d str> {
    doc.get(key).and_then(JsonValue::as_str).ok_or_else(|| {
        TetherError::structural_decode(format!("string field '{}'", key), "absent")
    })
}

/// Type storage reached over the bus.
///
/// Loaded declarations are interned into the shared registry, so repeated
/// loads resolve locally without another round trip.
pub struct RemoteTypeStorage {
    bus: Arc<dyn MessageBus>,
    registry: Arc<TypeRegistry>,
    factory: Arc<CustomFactory>,
}

impl RemoteTypeStorage {
    pub fn new(
        bus: Arc<dyn MessageBus>,
        registry: Arc<TypeRegistry>,
        factory: Arc<CustomFactory>,
    ) -> Self {
        Self {
            bus,
            registry,
            factory,
        }
    }
}

#[async_trait]
impl TypeStorage for RemoteTypeStorage {
    async fn load_type(&self, name: &str) -> Result<Arc<TypeDef>> {
        if let Some(def) = self.registry.get(name) {
            return Ok(def);
        }
        let replies = self
            .bus
            .gather(
                MessagePayload::TypeQuery {
                    name: name.to_string(),
                },
                self.bus.default_timeout(),
            )
            .await?;
        for reply in replies {
            if let MessagePayload::TypeResult {
                document: Some(document),
                ..
            } = reply.payload
            {
                debug!(name, provider = %reply.sender, "type loaded from storage");
                return from_document(&document, &self.registry, &self.factory);
            }
        }
        Err(TetherError::missing_action(name))
    }

    async fn list_types(&self) -> Result<Vec<String>> {
        let replies = self
            .bus
            .gather(MessagePayload::TypeListQuery, self.bus.default_timeout())
            .await?;
        let mut names = Vec::new();
        for reply in replies {
            if let MessagePayload::TypeListResult { names: batch } = reply.payload {
                for name in batch {
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
            }
        }
        Ok(names)
    }

    async fn put_type(&self, def: &TypeDef) -> Result<()> {
        let replies = self
            .bus
            .gather(
                MessagePayload::TypeStoreRequest {
                    name: def.name().to_string(),
                    document: to_document(def),
                },
                self.bus.default_timeout(),
            )
            .await?;
        for reply in replies {
            if let MessagePayload::TypeStoreResult { accepted: true } = reply.payload {
                return Ok(());
            }
        }
        Err(TetherError::remote(
            "type store",
            format!("no storage provider accepted '{}'", def.name()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_roundtrip() {
        let registry = TypeRegistry::new();
        let factory = CustomFactory::with_builtins();
        let int_type = Arc::new(TypeDef::primitive("core/integer", "integer"));
        let original = TypeDef::list_with(
            "demo/ints",
            int_type,
            true,
            Some(SingletonPolicy::Only),
        );

        let doc = to_document(&original);
        let back = from_document(&doc, &registry, &factory).unwrap();
        assert_eq!(back.name(), "demo/ints");
        assert!(back.is_permutable());
        assert_eq!(back.singleton_policy(), Some(SingletonPolicy::Only));
        assert_eq!(back.element().unwrap().name(), "core/integer");
        // element was interned alongside the list type
        assert!(registry.contains("core/integer"));
    }

    #[test]
    fn test_wrong_version_rejected() {
        let registry = TypeRegistry::new();
        let factory = CustomFactory::with_builtins();
        let mut doc = to_document(&TypeDef::primitive("core/string", "string"));
        doc["version"] = json!(99);
        let err = from_document(&doc, &registry, &factory).unwrap_err();
        assert!(matches!(
            err,
            TetherError::SerializationVersion {
                found: 99,
                supported: DOCUMENT_VERSION
            }
        ));
    }
}
