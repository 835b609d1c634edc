//! Polymorphic type-marshaling layer: values move losslessly among native
//! form, a size-accountable string form, and the term form exchanged with
//! the reasoning engine.

pub mod custom;
pub mod registry;
pub mod storage;
pub mod structure;
pub mod term;
pub mod typedef;
pub mod value;

pub use custom::{Conversion, CustomFactory};
pub use registry::TypeRegistry;
pub use storage::{from_document, to_document, RemoteTypeStorage, TypeStorage, DOCUMENT_VERSION};
pub use structure::{StructDef, StructValue};
pub use term::{Literal, Term};
pub use typedef::{SingletonPolicy, TypeBody, TypeDef, BAG_FUNCTOR, LIST_FUNCTOR};
pub use value::{StringForm, Value};
