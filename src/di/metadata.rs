//! Process-wide annotation store.
//!
//! Annotations are written while types are annotated (before a kernel boots)
//! and read while injectors and routes are built. Entries are keyed by an
//! annotation key, the annotated type's token and an optional member key
//! (an action name, a property name).

use super::token::Token;
use dashmap::DashMap;
use std::any::Any;
use std::fmt;
use std::sync::{Arc, LazyLock};

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MetadataKey(&'static str);

impl MetadataKey {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Debug for MetadataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

pub mod keys {
    use super::MetadataKey;

    pub const ANNOTATION_NAME: MetadataKey = MetadataKey::new("octavo:annotationname");
    pub const INJECTION_KIND: MetadataKey = MetadataKey::new("octavo:injectionkind");
    pub const CONSTRUCTOR_INJECTIONS: MetadataKey = MetadataKey::new("octavo:constructorinjections");
    pub const PROPERTY_INJECTIONS: MetadataKey = MetadataKey::new("octavo:propertyinjections");
    pub const PROVIDERS: MetadataKey = MetadataKey::new("octavo:providers");
    pub const ACTIONS: MetadataKey = MetadataKey::new("octavo:actions");
    pub const REQUEST: MetadataKey = MetadataKey::new("octavo:request");
    pub const RESPONSE: MetadataKey = MetadataKey::new("octavo:response");
    pub const VIEW: MetadataKey = MetadataKey::new("octavo:view");
    pub const DESCRIPTION: MetadataKey = MetadataKey::new("octavo:description");
    pub const FORMATTER: MetadataKey = MetadataKey::new("octavo:formatter");
    pub const CASTS: MetadataKey = MetadataKey::new("octavo:casts");
    pub const BLUEPRINT: MetadataKey = MetadataKey::new("octavo:blueprint");
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct Slot {
    key: MetadataKey,
    target: Token,
    member: Option<String>,
}

impl Slot {
    fn new(key: MetadataKey, target: &Token, member: Option<&str>) -> Self {
        Self {
            key,
            target: target.clone(),
            member: member.map(str::to_owned),
        }
    }
}

/// Side table of annotation payloads.
#[derive(Default)]
pub struct MetadataStore {
    entries: DashMap<Slot, Arc<dyn Any + Send + Sync>>,
}

static GLOBAL: LazyLock<MetadataStore> = LazyLock::new(MetadataStore::default);

impl MetadataStore {
    pub fn global() -> &'static MetadataStore {
        &GLOBAL
    }

    pub fn get<T: Clone + Send + Sync + 'static>(
        &self,
        key: MetadataKey,
        target: &Token,
        member: Option<&str>,
    ) -> Option<T> {
        let entry = self.entries.get(&Slot::new(key, target, member))?;
        entry.value().downcast_ref::<T>().cloned()
    }

    pub fn define<T: Send + Sync + 'static>(
        &self,
        key: MetadataKey,
        value: T,
        target: &Token,
        member: Option<&str>,
    ) {
        self.entries
            .insert(Slot::new(key, target, member), Arc::new(value));
    }

    pub fn has(&self, key: MetadataKey, target: &Token, member: Option<&str>) -> bool {
        self.entries.contains_key(&Slot::new(key, target, member))
    }

    /// Member keys annotated with `key` on `target`, sorted.
    pub fn members(&self, key: MetadataKey, target: &Token) -> Vec<String> {
        let mut members: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.key().key == key && &entry.key().target == target)
            .filter_map(|entry| entry.key().member.clone())
            .collect();
        members.sort();
        members
    }
}

/// Typed getter/setter pair over one annotation key of the global store.
///
/// ```
/// use octavo::di::metadata::{Metadata, MetadataKey};
/// use octavo::di::Token;
///
/// static TAGS: Metadata<Vec<&'static str>> = Metadata::new(MetadataKey::new("app:tags"), Vec::new);
///
/// struct Report;
///
/// assert!(TAGS.get(&Token::of::<Report>()).is_empty());
/// TAGS.update(&Token::of::<Report>(), |tags| tags.push("daily"));
/// assert_eq!(TAGS.get(&Token::of::<Report>()), vec!["daily"]);
/// ```
pub struct Metadata<T> {
    key: MetadataKey,
    default: fn() -> T,
}

impl<T: Clone + Send + Sync + 'static> Metadata<T> {
    pub const fn new(key: MetadataKey, default: fn() -> T) -> Self {
        Self { key, default }
    }

    pub fn key(&self) -> MetadataKey {
        self.key
    }

    pub fn get(&self, target: &Token) -> T {
        self.lookup(target, None)
    }

    pub fn get_member(&self, target: &Token, member: &str) -> T {
        self.lookup(target, Some(member))
    }

    pub fn set(&self, value: T, target: &Token) {
        MetadataStore::global().define(self.key, value, target, None);
    }

    pub fn set_member(&self, value: T, target: &Token, member: &str) {
        MetadataStore::global().define(self.key, value, target, Some(member));
    }

    pub fn has(&self, target: &Token) -> bool {
        MetadataStore::global().has(self.key, target, None)
    }

    /// Read-modify-write of the entry, starting from the default when absent.
    pub fn update(&self, target: &Token, f: impl FnOnce(&mut T)) {
        let mut value = self.get(target);
        f(&mut value);
        self.set(value, target);
    }

    pub fn members(&self, target: &Token) -> Vec<String> {
        MetadataStore::global().members(self.key, target)
    }

    fn lookup(&self, target: &Token, member: Option<&str>) -> T {
        MetadataStore::global()
            .get(self.key, target, member)
            .unwrap_or_else(self.default)
    }
}
