//! Identifier metadata published by a model: which user-visible variables
//! and functions exist, under what names, and where their storage lives.

use std::collections::{BTreeMap, HashMap};
use std::ffi::c_void;
use std::sync::Arc;

use crate::{IdentifierHandle, INVALID_IDENTIFIER_HANDLE};


/// Type tag of an identifier's value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ValueType {
    None,
    Boolean,
    Integer,
    Real,
    Complex,
    Set,
    Tuple,
    MatrixBoolean,
    MatrixInteger,
    MatrixReal,
    MatrixComplex,
    Variant,
}

/// Address of an identifier's backing storage or function, owned by the
/// compiled model. The runtime never dereferences it; it is carried for the
/// embedder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StorageAddress(pub *const c_void);

impl StorageAddress {
    pub const NULL: StorageAddress = StorageAddress(std::ptr::null());
}

// The address is an opaque token on this side of the boundary; whoever
// dereferences it owns the synchronization.
unsafe impl Send for StorageAddress {}
unsafe impl Sync for StorageAddress {}

/// Descriptor of one user-visible identifier.
///
/// Equality is by handle, matching the database's primary index.
#[derive(Clone, Debug)]
pub struct IdentifierData {
    handle: IdentifierHandle,
    name: String,
    subscript: String,
    is_function: bool,
    value_type: ValueType,
    address: StorageAddress,
}

impl IdentifierData {
    pub fn new(
        handle: IdentifierHandle,
        name: impl Into<String>,
        subscript: impl Into<String>,
        is_function: bool,
        value_type: ValueType,
        address: StorageAddress,
    ) -> Self {
        Self {
            handle,
            name: name.into(),
            subscript: subscript.into(),
            is_function,
            value_type,
            address,
        }
    }

    /// A descriptor carrying the reserved invalid handle, for embedders
    /// that prefer sentinel values over options.
    pub fn invalid() -> Self {
        Self::new(
            INVALID_IDENTIFIER_HANDLE,
            "",
            "",
            false,
            ValueType::None,
            StorageAddress::NULL,
        )
    }

    pub fn is_valid(&self) -> bool {
        self.handle != INVALID_IDENTIFIER_HANDLE
    }

    pub fn handle(&self) -> IdentifierHandle {
        self.handle
    }

    /// UTF-8 primary name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// UTF-8 subscript; empty when the identifier has none.
    pub fn subscript(&self) -> &str {
        &self.subscript
    }

    pub fn is_function(&self) -> bool {
        self.is_function
    }

    pub fn is_variable(&self) -> bool {
        !self.is_function
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn address(&self) -> StorageAddress {
        self.address
    }
}

impl PartialEq for IdentifierData {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Eq for IdentifierData {}

#[derive(Clone, Default)]
struct Inner {
    // Handle order doubles as iteration order.
    by_handle: BTreeMap<IdentifierHandle, IdentifierData>,
    by_name: HashMap<(String, String), IdentifierHandle>,
}

/// Dual-index descriptor database with copy-on-write value semantics.
///
/// Lookup runs by handle or by `(name, subscript)` pair; both indices always
/// agree. Cloning shares storage; mutation under shared ownership clones
/// first.
#[derive(Clone, Default)]
pub struct IdentifierDatabase {
    inner: Arc<Inner>,
}

impl IdentifierDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.by_handle.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.by_handle.len()
    }

    /// Insert a descriptor. Fails if either the handle or the
    /// `(name, subscript)` pair is already present.
    pub fn insert(&mut self, entry: IdentifierData) -> bool {
        if entry.handle == INVALID_IDENTIFIER_HANDLE {
            return false;
        }

        let key = (entry.name.clone(), entry.subscript.clone());
        if self.inner.by_handle.contains_key(&entry.handle) || self.inner.by_name.contains_key(&key)
        {
            return false;
        }

        let inner = Arc::make_mut(&mut self.inner);
        inner.by_name.insert(key, entry.handle);
        inner.by_handle.insert(entry.handle, entry);
        true
    }

    pub fn by_handle(&self, handle: IdentifierHandle) -> Option<&IdentifierData> {
        self.inner.by_handle.get(&handle)
    }

    /// Look up by primary name and subscript; pass an empty subscript for
    /// identifiers without one.
    pub fn by_name(&self, name: &str, subscript: &str) -> Option<&IdentifierData> {
        let handle = self
            .inner
            .by_name
            .get(&(name.to_owned(), subscript.to_owned()))?;
        self.inner.by_handle.get(handle)
    }

    /// Descriptors in ascending handle order.
    pub fn iter(&self) -> impl Iterator<Item = &IdentifierData> {
        self.inner.by_handle.values()
    }
}

impl<'a> IntoIterator for &'a IdentifierDatabase {
    type Item = &'a IdentifierData;
    type IntoIter = std::collections::btree_map::Values<'a, IdentifierHandle, IdentifierData>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.by_handle.values()
    }
}
