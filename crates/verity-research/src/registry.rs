//! Object identity registry.
//!
//! Search results hand out opaque [`ObjectHandle`]s that a later fetch call
//! resolves. A handle is derived from what it refers to, so the same company,
//! filing or fact always gets the same handle, and registration is
//! idempotent. Resolution never guesses: a handle that was not issued (or was
//! evicted) is [`ResearchError::UnknownHandle`].
//!
//! The registry is an explicit service object. Share it with `Arc`.

use crate::error::{ResearchError, Result};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Hex characters kept from the digest.
const HANDLE_LEN: usize = 16;

/// Kinds of objects a handle can refer to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// An SEC registrant
    #[display("company")]
    Company,
    /// One filing
    #[display("filing")]
    Filing,
    /// One extracted financial fact
    #[display("fact")]
    Fact,
}

impl EntityKind {
    /// All kinds, in ranking tie-break order.
    pub const ALL: [Self; 3] = [Self::Company, Self::Filing, Self::Fact];

    /// Parse a kind name, singular or plural (`"financials"` means facts).
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "company" | "companies" => Some(Self::Company),
            "filing" | "filings" => Some(Self::Filing),
            "fact" | "facts" | "financials" => Some(Self::Fact),
            _ => None,
        }
    }
}

/// What a handle refers to: a kind and a natural key (CIK, accession number, fact key).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    /// Kind of object
    pub kind: EntityKind,
    /// Natural key within the kind
    pub key: String,
}

impl EntityRef {
    /// Create a reference.
    pub fn new(kind: EntityKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
        }
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.key)
    }
}

/// Opaque, stable identifier for a searchable object.
///
/// The first 16 hex characters of `SHA-256("{kind}:{key}")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectHandle(String);

impl ObjectHandle {
    /// Derive the handle of a referent.
    pub fn derive(kind: EntityKind, key: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(kind.to_string().as_bytes());
        hasher.update(b":");
        hasher.update(key.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        Self(digest[..HANDLE_LEN].to_string())
    }

    /// Wrap a caller-supplied identifier. It is not validated until resolved.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    /// The handle as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectHandle {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A registered object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// The issued handle
    pub handle: ObjectHandle,
    /// What it refers to
    pub entity: EntityRef,
    /// Summary recorded at first registration
    pub summary: String,
}

/// Registry configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Bound on live entries; oldest registrations are evicted first. Unbounded when absent.
    pub max_entries: Option<usize>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<ObjectHandle, RegistryEntry>,
    order: VecDeque<ObjectHandle>,
}

/// Thread-safe registry of issued handles.
#[derive(Debug, Default)]
pub struct ObjectRegistry {
    config: RegistryConfig,
    inner: RwLock<Inner>,
}

impl ObjectRegistry {
    /// Create a registry.
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            inner: RwLock::default(),
        }
    }

    /// Registry configuration.
    pub const fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register a referent and return its handle.
    ///
    /// Registering the same referent again returns the same handle and keeps
    /// the first summary. A different referent hashing to an issued handle is
    /// a [`ResearchError::HandleCollision`].
    pub fn register(
        &self,
        kind: EntityKind,
        key: &str,
        summary: impl Into<String>,
    ) -> Result<ObjectHandle> {
        let entity = EntityRef::new(kind, key);
        let handle = ObjectHandle::derive(kind, key);

        if let Some(existing) = self.read()?.entries.get(&handle) {
            return same_referent(existing, &entity).map(|()| handle);
        }

        let mut inner = self.write()?;
        if let Some(existing) = inner.entries.get(&handle) {
            return same_referent(existing, &entity).map(|()| handle);
        }

        inner.entries.insert(
            handle.clone(),
            RegistryEntry {
                handle: handle.clone(),
                entity,
                summary: summary.into(),
            },
        );
        inner.order.push_back(handle.clone());

        if let Some(max) = self.config.max_entries {
            while inner.order.len() > max {
                if let Some(oldest) = inner.order.pop_front() {
                    inner.entries.remove(&oldest);
                    debug!(handle = %oldest, "Evicted object handle");
                }
            }
        }

        Ok(handle)
    }

    /// Resolve a handle to its referent.
    pub fn resolve(&self, handle: &ObjectHandle) -> Result<EntityRef> {
        self.entry(handle).map(|entry| entry.entity)
    }

    /// Resolve a handle to its full registry entry.
    pub fn entry(&self, handle: &ObjectHandle) -> Result<RegistryEntry> {
        self.read()?
            .entries
            .get(handle)
            .cloned()
            .ok_or_else(|| ResearchError::UnknownHandle(handle.to_string()))
    }

    /// Number of live entries.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.entries.len())
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.entries.is_empty())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| ResearchError::LockPoisoned("registry"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| ResearchError::LockPoisoned("registry"))
    }
}

fn same_referent(existing: &RegistryEntry, incoming: &EntityRef) -> Result<()> {
    if &existing.entity == incoming {
        Ok(())
    } else {
        Err(ResearchError::HandleCollision {
            handle: existing.handle.to_string(),
            existing: existing.entity.to_string(),
            incoming: incoming.to_string(),
        })
    }
}
