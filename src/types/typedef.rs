use std::sync::Arc;

use crate::core::errors::{Result, TetherError};
use crate::types::custom::CustomFactory;
use crate::types::structure::{StructDef, StructValue};
use crate::types::term::{Literal, Term};
use crate::types::value::{StringForm, Value};

/// Functor name used by bag term encodings
pub const BAG_FUNCTOR: &str = "bagOf";
/// Functor name accepted for list term encodings (lists normally encode as
/// literal-list terms; the functor form is produced by older peers)
pub const LIST_FUNCTOR: &str = "listOf";

/// How external generalization logic collapses a singleton list.
///
/// Carried on list types for the learning layer; it has no effect on
/// marshaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingletonPolicy {
    First,
    Last,
    Only,
}

/// Declared type with its marshaling behavior.
///
/// Identity is the qualified type name. Collection kinds hold their element
/// type as a shared registry entry; nothing here is ever deep-copied.
#[derive(Debug)]
pub struct TypeDef {
    name: String,
    body: TypeBody,
}

#[derive(Debug)]
pub enum TypeBody {
    Primitive {
        repr: String,
    },
    Nullable {
        element: Arc<TypeDef>,
    },
    List {
        element: Arc<TypeDef>,
        permutable: bool,
        singleton: Option<SingletonPolicy>,
    },
    Bag {
        element: Arc<TypeDef>,
    },
    Struct {
        def: Arc<StructDef>,
    },
    Custom {
        repr: String,
    },
}

impl TypeDef {
    pub fn primitive<N: Into<String>, R: Into<String>>(name: N, repr: R) -> Self {
        Self {
            name: name.into(),
            body: TypeBody::Primitive { repr: repr.into() },
        }
    }

    pub fn nullable<N: Into<String>>(name: N, element: Arc<TypeDef>) -> Self {
        Self {
            name: name.into(),
            body: TypeBody::Nullable { element },
        }
    }

    pub fn list<N: Into<String>>(name: N, element: Arc<TypeDef>) -> Self {
        Self::list_with(name, element, false, None)
    }

    pub fn list_with<N: Into<String>>(
        name: N,
        element: Arc<TypeDef>,
        permutable: bool,
        singleton: Option<SingletonPolicy>,
    ) -> Self {
        Self {
            name: name.into(),
            body: TypeBody::List {
                element,
                permutable,
                singleton,
            },
        }
    }

    pub fn bag<N: Into<String>>(name: N, element: Arc<TypeDef>) -> Self {
        Self {
            name: name.into(),
            body: TypeBody::Bag { element },
        }
    }

    pub fn structure(def: Arc<StructDef>) -> Self {
        Self {
            name: def.name().to_string(),
            body: TypeBody::Struct { def },
        }
    }

    /// Declare a custom type backed by a registered representation.
    ///
    /// The conversion binding is resolved eagerly: a missing binding is a
    /// configuration defect reported at setup, not deferred to first use.
    pub fn custom<N: Into<String>, R: Into<String>>(
        name: N,
        repr: R,
        factory: &CustomFactory,
    ) -> Result<Self> {
        let repr = repr.into();
        if !factory.is_bound(&repr) {
            return Err(TetherError::representation(
                repr,
                "no conversion registered at type setup",
            ));
        }
        Ok(Self {
            name: name.into(),
            body: TypeBody::Custom { repr },
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> &TypeBody {
        &self.body
    }

    /// Element type of a collection or nullable kind
    pub fn element(&self) -> Option<&Arc<TypeDef>> {
        match &self.body {
            TypeBody::Nullable { element }
            | TypeBody::List { element, .. }
            | TypeBody::Bag { element } => Some(element),
            _ => None,
        }
    }

    pub fn is_permutable(&self) -> bool {
        matches!(&self.body, TypeBody::List { permutable: true, .. })
    }

    pub fn singleton_policy(&self) -> Option<SingletonPolicy> {
        match &self.body {
            TypeBody::List { singleton, .. } => *singleton,
            _ => None,
        }
    }

    /// Functor name used by this type's application-term encoding, if any
    pub fn functor(&self) -> Option<&str> {
        match &self.body {
            TypeBody::List { .. } => Some(LIST_FUNCTOR),
            TypeBody::Bag { .. } => Some(BAG_FUNCTOR),
            TypeBody::Struct { def } => Some(def.name()),
            _ => None,
        }
    }

    /// Structural validity of a value for this type.
    ///
    /// Collections recurse into every member; struct members validate
    /// positionally against their field types with absent slots read as null.
    pub fn is_value_of(&self, value: &Value) -> bool {
        match &self.body {
            TypeBody::Primitive { repr } => match (repr.as_str(), value) {
                ("string", Value::Str(_)) => true,
                ("boolean", Value::Bool(_)) => true,
                ("integer", Value::Int(_)) => true,
                ("real", Value::Real(_)) => true,
                _ => false,
            },
            TypeBody::Nullable { element } => {
                value.is_null() || element.is_value_of(value)
            }
            TypeBody::List { element, .. } => match value {
                Value::List(members) => members.iter().all(|m| element.is_value_of(m)),
                _ => false,
            },
            TypeBody::Bag { element } => match value {
                Value::Bag(members) => members.iter().all(|m| element.is_value_of(m)),
                _ => false,
            },
            TypeBody::Struct { def } => match value {
                Value::Struct(sv) => {
                    sv.def().name() == def.name()
                        && sv.arity() == def.arity()
                        && (0..def.arity()).all(|i| match sv.get(i) {
                            // structs are created empty and filled in place,
                            // so an unset slot is valid for any field type
                            None => true,
                            Some(member) => def
                                .field_type(i)
                                .map(|t| t.is_value_of(member))
                                .unwrap_or(false),
                        })
                }
                _ => false,
            },
            TypeBody::Custom { .. } => !value.is_null(),
        }
    }

    /// Convert a value to its size-accountable string form.
    ///
    /// Exact inverse of [`unstringify`](Self::unstringify) for any value
    /// accepted by [`is_value_of`](Self::is_value_of).
    pub fn stringify(&self, value: &Value, factory: &CustomFactory) -> Result<StringForm> {
        if !self.is_value_of(value) {
            return Err(TetherError::structural_decode(
                self.name.clone(),
                value.kind_name(),
            ));
        }
        self.stringify_unchecked(value, factory)
    }

    fn stringify_unchecked(&self, value: &Value, factory: &CustomFactory) -> Result<StringForm> {
        match &self.body {
            TypeBody::Primitive { repr } | TypeBody::Custom { repr } => {
                Ok(StringForm::Atom(factory.make_string(repr, value)?))
            }
            TypeBody::Nullable { element } => {
                if value.is_null() {
                    Ok(StringForm::Absent)
                } else {
                    element.stringify_unchecked(value, factory)
                }
            }
            TypeBody::List { element, .. } | TypeBody::Bag { element } => {
                let members = match value {
                    Value::List(m) | Value::Bag(m) => m,
                    _ => unreachable!("validated above"),
                };
                let forms = members
                    .iter()
                    .map(|m| element.stringify_unchecked(m, factory))
                    .collect::<Result<Vec<_>>>()?;
                Ok(StringForm::Seq(forms))
            }
            TypeBody::Struct { def } => {
                let sv = match value {
                    Value::Struct(sv) => sv,
                    _ => unreachable!("validated above"),
                };
                let mut forms = Vec::with_capacity(def.arity());
                for (i, (_, field_type)) in def.fields().iter().enumerate() {
                    forms.push(match sv.get(i) {
                        None => StringForm::Absent,
                        Some(member) => field_type.stringify_unchecked(member, factory)?,
                    });
                }
                Ok(StringForm::Seq(forms))
            }
        }
    }

    /// Rebuild a value from its string form
    pub fn unstringify(&self, form: &StringForm, factory: &CustomFactory) -> Result<Value> {
        match &self.body {
            TypeBody::Primitive { repr } | TypeBody::Custom { repr } => match form {
                StringForm::Atom(text) => factory.make_object(repr, text),
                other => Err(TetherError::structural_decode("atom", other.kind_name())),
            },
            TypeBody::Nullable { element } => match form {
                StringForm::Absent => Ok(Value::Null),
                present => element.unstringify(present, factory),
            },
            TypeBody::List { element, .. } => match form {
                StringForm::Seq(members) => {
                    let values = members
                        .iter()
                        .map(|m| element.unstringify(m, factory))
                        .collect::<Result<Vec<_>>>()?;
                    Ok(Value::List(values))
                }
                other => Err(TetherError::structural_decode(
                    "sequence",
                    other.kind_name(),
                )),
            },
            TypeBody::Bag { element } => match form {
                StringForm::Seq(members) => {
                    let values = members
                        .iter()
                        .map(|m| element.unstringify(m, factory))
                        .collect::<Result<Vec<_>>>()?;
                    Ok(Value::Bag(values))
                }
                other => Err(TetherError::structural_decode(
                    "sequence",
                    other.kind_name(),
                )),
            },
            TypeBody::Struct { def } => match form {
                StringForm::Seq(members) if members.len() == def.arity() => {
                    let mut sv = StructValue::new(def.clone());
                    for (i, member) in members.iter().enumerate() {
                        if matches!(member, StringForm::Absent) {
                            continue;
                        }
                        let field_type = def.field_type(i).expect("arity checked");
                        sv.set(i, field_type.unstringify(member, factory)?)?;
                    }
                    Ok(Value::Struct(sv))
                }
                StringForm::Seq(members) => Err(TetherError::structural_decode(
                    format!("sequence of {}", def.arity()),
                    format!("sequence of {}", members.len()),
                )),
                other => Err(TetherError::structural_decode(
                    "sequence",
                    other.kind_name(),
                )),
            },
        }
    }

    /// Additive string-size metric: 0 for null/empty, sum over collection
    /// members, rendered length for primitives and custom values
    pub fn string_size(&self, value: &Value, factory: &CustomFactory) -> Result<u64> {
        Ok(self.stringify(value, factory)?.size())
    }

    /// Enforce a configured maximum payload size
    pub fn check_size(&self, value: &Value, factory: &CustomFactory, limit: u64) -> Result<()> {
        let size = self.string_size(value, factory)?;
        if size > limit {
            return Err(TetherError::size_limit(size, limit));
        }
        Ok(())
    }

    /// Convert a value to the term representation used by the reasoning
    /// engine.
    ///
    /// Lists encode as literal-list terms, bags and structs as functor
    /// applications, primitives as untagged literals.
    pub fn to_term(&self, value: &Value, factory: &CustomFactory) -> Result<Term> {
        if !self.is_value_of(value) {
            return Err(TetherError::structural_decode(
                self.name.clone(),
                value.kind_name(),
            ));
        }
        self.to_term_unchecked(value, factory)
    }

    fn to_term_unchecked(&self, value: &Value, factory: &CustomFactory) -> Result<Term> {
        match &self.body {
            TypeBody::Primitive { .. } => Ok(Term::Literal(match value {
                Value::Bool(b) => Literal::Bool(*b),
                Value::Int(i) => Literal::Int(*i),
                Value::Real(r) => Literal::Real(*r),
                Value::Str(s) => Literal::Str(s.clone()),
                _ => unreachable!("validated above"),
            })),
            TypeBody::Nullable { element } => {
                if value.is_null() {
                    Ok(Term::Null)
                } else {
                    element.to_term_unchecked(value, factory)
                }
            }
            TypeBody::List { element, .. } => {
                let members = match value {
                    Value::List(m) => m,
                    _ => unreachable!("validated above"),
                };
                let args = members
                    .iter()
                    .map(|m| element.to_term_unchecked(m, factory))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Term::List(args))
            }
            TypeBody::Bag { element } => {
                let members = match value {
                    Value::Bag(m) => m,
                    _ => unreachable!("validated above"),
                };
                let args = members
                    .iter()
                    .map(|m| element.to_term_unchecked(m, factory))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Term::application(BAG_FUNCTOR, args))
            }
            TypeBody::Struct { def } => {
                let sv = match value {
                    Value::Struct(sv) => sv,
                    _ => unreachable!("validated above"),
                };
                let mut args = Vec::with_capacity(def.arity());
                for (i, (_, field_type)) in def.fields().iter().enumerate() {
                    args.push(match sv.get(i) {
                        None => Term::Null,
                        Some(member) => field_type.to_term_unchecked(member, factory)?,
                    });
                }
                Ok(Term::application(def.name(), args))
            }
            TypeBody::Custom { repr } => Ok(Term::Literal(Literal::Str(
                factory.make_string(repr, value)?,
            ))),
        }
    }

    /// Rebuild a value from a term.
    ///
    /// Collections accept both the literal-list and the functor-application
    /// encoding; a functor application whose name does not match the type's
    /// declared functor is a structural decode error. A string literal whose
    /// declared representation is not string is run through the registered
    /// string-to-value conversion (booleans and numbers arriving as strings).
    pub fn from_term(&self, term: &Term, factory: &CustomFactory) -> Result<Value> {
        match &self.body {
            TypeBody::Primitive { repr } => match term {
                Term::Literal(literal) => match (repr.as_str(), literal) {
                    ("string", Literal::Str(s)) => Ok(Value::Str(s.clone())),
                    ("boolean", Literal::Bool(b)) => Ok(Value::Bool(*b)),
                    ("integer", Literal::Int(i)) => Ok(Value::Int(*i)),
                    ("real", Literal::Real(r)) => Ok(Value::Real(*r)),
                    (_, Literal::Str(s)) => factory.make_object(repr, s),
                    (_, other) => Err(TetherError::structural_decode(
                        repr.clone(),
                        format!("{:?}", other),
                    )),
                },
                other => Err(TetherError::structural_decode(
                    "literal",
                    other.kind_name(),
                )),
            },
            TypeBody::Nullable { element } => match term {
                Term::Null => Ok(Value::Null),
                present => element.from_term(present, factory),
            },
            TypeBody::List { element, .. } => {
                let args = self.collection_args(term, LIST_FUNCTOR)?;
                let values = args
                    .iter()
                    .map(|a| element.from_term(a, factory))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::List(values))
            }
            TypeBody::Bag { element } => {
                let args = self.collection_args(term, BAG_FUNCTOR)?;
                let values = args
                    .iter()
                    .map(|a| element.from_term(a, factory))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Bag(values))
            }
            TypeBody::Struct { def } => match term {
                Term::Application { functor, args } => {
                    if functor != def.name() {
                        return Err(TetherError::structural_decode(
                            format!("functor '{}'", def.name()),
                            format!("functor '{}'", functor),
                        ));
                    }
                    if args.len() != def.arity() {
                        return Err(TetherError::structural_decode(
                            format!("arity {}", def.arity()),
                            format!("arity {}", args.len()),
                        ));
                    }
                    let mut sv = StructValue::new(def.clone());
                    for (i, arg) in args.iter().enumerate() {
                        // null members stay absent so decode mirrors the
                        // freshly created struct shape
                        if matches!(arg, Term::Null) {
                            continue;
                        }
                        let field_type = def.field_type(i).expect("arity checked");
                        let member = field_type.from_term(arg, factory)?;
                        if !member.is_null() {
                            sv.set(i, member)?;
                        }
                    }
                    Ok(Value::Struct(sv))
                }
                other => Err(TetherError::structural_decode(
                    "application",
                    other.kind_name(),
                )),
            },
            TypeBody::Custom { repr } => match term {
                Term::Literal(Literal::Str(s)) => factory.make_object(repr, s),
                other => Err(TetherError::structural_decode(
                    "string literal",
                    other.kind_name(),
                )),
            },
        }
    }

    /// Member terms of either collection encoding, enforcing the functor
    fn collection_args<'t>(&self, term: &'t Term, expected: &str) -> Result<&'t [Term]> {
        match term {
            Term::List(args) => Ok(args),
            Term::Application { functor, args } => {
                if functor == expected {
                    Ok(args)
                } else {
                    Err(TetherError::structural_decode(
                        format!("functor '{}'", expected),
                        format!("functor '{}'", functor),
                    ))
                }
            }
            other => Err(TetherError::structural_decode(
                "list or application",
                other.kind_name(),
            )),
        }
    }
}

// Identity is the qualified name; registries never hold two defs with the
// same name.
impl PartialEq for TypeDef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for TypeDef {}
