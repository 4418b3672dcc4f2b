//! Interned server identifiers.
//!
//! A `ServerId` names one of the user's configured NNTP servers. Tasks
//! carry sets of these, pools are keyed by them, and the scheduler compares
//! and hashes them constantly, so equality and hashing need to be O(1)
//! regardless of how long the underlying hostname/label is.
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, OnceLock};

fn table() -> &'static Mutex<HashSet<Arc<str>>> {
    static TABLE: OnceLock<Mutex<HashSet<Arc<str>>>> = OnceLock::new();
    TABLE.get_or_init(|| Mutex::new(HashSet::new()))
}

/// An interned, cheaply-cloned server identifier.
///
/// Two `ServerId`s built from equal strings always intern to the same
/// `Arc`, so `Eq`/`Hash` can be implemented in terms of the pointer rather
/// than the string contents.
#[derive(Clone)]
pub struct ServerId(Arc<str>);

impl ServerId {
    pub fn new(name: impl AsRef<str>) -> ServerId {
        let name = name.as_ref();
        let mut table = table().lock().expect("server id table poisoned");
        if let Some(existing) = table.get(name) {
            return ServerId(existing.clone());
        }
        let interned: Arc<str> = Arc::from(name);
        table.insert(interned.clone());
        ServerId(interned)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for ServerId {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for ServerId {}

impl Hash for ServerId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as *const () as usize).hash(state)
    }
}

impl fmt::Debug for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServerId({:?})", self.0)
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServerId {
    fn from(s: &str) -> ServerId {
        ServerId::new(s)
    }
}
impl From<String> for ServerId {
    fn from(s: String) -> ServerId {
        ServerId::new(&s)
    }
}
