// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Room Field Simulation Suite ("The Room") - Tagged Node Storage

//! Schema-typed storage bag.
//!
//! Tags are zero-sized marker types carrying a name and a value type. The
//! tuple store of the configuration lists `(name, kind)` pairs; a program's
//! tags are resolved against it once, at simulator construction, and every
//! later access is a slot index plus a kind check.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::{ConfigError, FieldError};
use crate::geometry::Vec3;
use crate::types::{Color, SatMap, Shape, StorageValue, ValueKind};

// ─── Stored values ──────────────────────────────────────────────────────────

/// Rust types that can live in a storage slot.
pub trait Stored: Clone + Send + Sync + 'static {
    const KIND: ValueKind;

    fn into_value(self) -> StorageValue;

    fn from_value(value: &StorageValue) -> Option<Self>;
}

macro_rules! stored_variant {
    ($t:ty, $variant:ident) => {
        impl Stored for $t {
            const KIND: ValueKind = ValueKind::$variant;

            fn into_value(self) -> StorageValue {
                StorageValue::$variant(self)
            }

            fn from_value(value: &StorageValue) -> Option<Self> {
                match value {
                    StorageValue::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }
    };
}

stored_variant!(f64, Real);
stored_variant!(i64, Int);
stored_variant!(bool, Bool);
stored_variant!(Vec3, Point);
stored_variant!(Color, Color);
stored_variant!(Shape, Shape);
stored_variant!(SatMap, CellMap);

/// Application enums stored by ordinal.
pub trait Discrete: Copy + Send + Sync + 'static {
    fn ordinal(self) -> u32;

    fn from_ordinal(ordinal: u32) -> Option<Self>;
}

// ─── Tags ───────────────────────────────────────────────────────────────────

/// A storage tag: a name plus the type of the value it holds.
pub trait Tag: 'static {
    const NAME: &'static str;
    const KIND: ValueKind;
    type Value: Clone + Send + Sync + 'static;

    fn encode(value: Self::Value) -> StorageValue;

    fn decode(value: &StorageValue) -> Option<Self::Value>;
}

/// Declare storage tags as unit structs.
///
/// ```ignore
/// storage_tags! {
///     pub Preference: f64 = "preference";
///     pub NodeStateTag: discrete NodeState = "node_state";
/// }
/// ```
#[macro_export]
macro_rules! storage_tags {
    () => {};
    ($vis:vis $name:ident : discrete $t:ty = $label:literal; $($rest:tt)*) => {
        #[derive(Debug, Clone, Copy)]
        $vis struct $name;

        impl $crate::field::storage::Tag for $name {
            const NAME: &'static str = $label;
            const KIND: $crate::types::ValueKind = $crate::types::ValueKind::Discrete;
            type Value = $t;

            fn encode(value: $t) -> $crate::types::StorageValue {
                $crate::types::StorageValue::Discrete(
                    <$t as $crate::field::storage::Discrete>::ordinal(value),
                )
            }

            fn decode(value: &$crate::types::StorageValue) -> Option<$t> {
                match value {
                    $crate::types::StorageValue::Discrete(o) => {
                        <$t as $crate::field::storage::Discrete>::from_ordinal(*o)
                    }
                    _ => None,
                }
            }
        }

        $crate::storage_tags!($($rest)*);
    };
    ($vis:vis $name:ident : $t:ty = $label:literal; $($rest:tt)*) => {
        #[derive(Debug, Clone, Copy)]
        $vis struct $name;

        impl $crate::field::storage::Tag for $name {
            const NAME: &'static str = $label;
            const KIND: $crate::types::ValueKind = <$t as $crate::field::storage::Stored>::KIND;
            type Value = $t;

            fn encode(value: $t) -> $crate::types::StorageValue {
                <$t as $crate::field::storage::Stored>::into_value(value)
            }

            fn decode(value: &$crate::types::StorageValue) -> Option<$t> {
                <$t as $crate::field::storage::Stored>::from_value(value)
            }
        }

        $crate::storage_tags!($($rest)*);
    };
}

// ─── Schema ─────────────────────────────────────────────────────────────────

/// One entry of the tuple store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagDecl {
    pub name: String,
    pub kind: ValueKind,
}

impl TagDecl {
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self { name: name.into(), kind }
    }

    pub fn of<T: Tag>() -> Self {
        Self::new(T::NAME, T::KIND)
    }
}

/// Resolved tuple store: tag name to slot index and kind.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    decls: Vec<TagDecl>,
    slots: BTreeMap<String, usize>,
}

impl Schema {
    pub fn new(decls: Vec<TagDecl>) -> Result<Self, ConfigError> {
        let mut slots = BTreeMap::new();
        for (i, d) in decls.iter().enumerate() {
            if slots.insert(d.name.clone(), i).is_some() {
                return Err(ConfigError::DuplicateTag(d.name.clone()));
            }
        }
        Ok(Self { decls, slots })
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    pub fn decls(&self) -> &[TagDecl] {
        &self.decls
    }

    pub fn slot(&self, name: &str) -> Option<(usize, ValueKind)> {
        self.slots.get(name).map(|&i| (i, self.decls[i].kind))
    }

    /// Startup check that a tag used by the program is declared with the
    /// same kind.
    pub fn require(&self, used: &TagDecl) -> Result<usize, ConfigError> {
        match self.slot(&used.name) {
            None => Err(ConfigError::UndeclaredTag(used.name.clone())),
            Some((_, declared)) if declared != used.kind => Err(ConfigError::KindMismatch {
                tag: used.name.clone(),
                declared,
                used: used.kind,
            }),
            Some((i, _)) => Ok(i),
        }
    }
}

// ─── Storage ────────────────────────────────────────────────────────────────

/// A node's storage bag. Cloned at the start of every round so a failed
/// round can be discarded wholesale.
#[derive(Debug, Clone)]
pub struct Storage {
    schema: Arc<Schema>,
    values: Vec<Option<StorageValue>>,
}

impl Storage {
    pub fn new(schema: Arc<Schema>) -> Self {
        let values = vec![None; schema.len()];
        Self { schema, values }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    fn resolve<T: Tag>(&self) -> Result<usize, FieldError> {
        match self.schema.slot(T::NAME) {
            None => Err(FieldError::UndeclaredTag(T::NAME)),
            Some((_, declared)) if declared != T::KIND => Err(FieldError::KindMismatch {
                tag: T::NAME,
                declared,
                used: T::KIND,
            }),
            Some((i, _)) => Ok(i),
        }
    }

    /// Typed read; `Ok(None)` while the slot has never been written.
    pub fn get<T: Tag>(&self) -> Result<Option<T::Value>, FieldError> {
        let i = self.resolve::<T>()?;
        Ok(self.values[i].as_ref().and_then(T::decode))
    }

    pub fn set<T: Tag>(&mut self, value: T::Value) -> Result<(), FieldError> {
        let i = self.resolve::<T>()?;
        self.values[i] = Some(T::encode(value));
        Ok(())
    }

    /// Untyped write used for configured initial values.
    pub fn set_raw(&mut self, name: &str, value: StorageValue) -> Result<(), ConfigError> {
        let used = TagDecl::new(name, value.kind());
        let i = self.schema.require(&used)?;
        self.values[i] = Some(value);
        Ok(())
    }

    pub fn get_raw(&self, name: &str) -> Option<&StorageValue> {
        self.schema
            .slot(name)
            .and_then(|(i, _)| self.values[i].as_ref())
    }

    /// Name-ordered copy of every written slot.
    pub fn snapshot(&self) -> BTreeMap<String, StorageValue> {
        self.schema
            .decls()
            .iter()
            .zip(&self.values)
            .filter_map(|(d, v)| v.clone().map(|v| (d.name.clone(), v)))
            .collect()
    }
}
