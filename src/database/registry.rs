use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::database::{DatabaseError, MemoryDatabase};

/// The `mem:` namespace: every in-memory database reachable by name.
///
/// Nodes register their database here; the TCP server resolves the
/// `database` startup parameter of each connection against it.
#[derive(Default)]
pub struct Databases {
    databases: RwLock<HashMap<String, Arc<MemoryDatabase>>>,
}

impl Databases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates and registers an empty database.
    pub fn create(&self, name: &str) -> Result<Arc<MemoryDatabase>, DatabaseError> {
        let mut databases = self.databases.write();
        if databases.contains_key(name) {
            return Err(DatabaseError::DuplicateDatabase {
                name: name.to_string(),
            });
        }
        let db = Arc::new(MemoryDatabase::new(name));
        databases.insert(name.to_string(), db.clone());
        Ok(db)
    }

    /// Looks up a database by exact name.
    pub fn get(&self, name: &str) -> Option<Arc<MemoryDatabase>> {
        self.databases.read().get(name).cloned()
    }

    /// Unregisters a database. Open sessions keep their handle.
    pub fn remove(&self, name: &str) -> Option<Arc<MemoryDatabase>> {
        self.databases.write().remove(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.databases.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_get() {
        let databases = Databases::new();
        let db = databases.create("notaryDb").unwrap();
        assert_eq!(db.name(), "notaryDb");
        assert!(Arc::ptr_eq(&db, &databases.get("notaryDb").unwrap()));
        assert!(databases.get("notarydb").is_none());
    }

    #[test]
    fn test_create_duplicate() {
        let databases = Databases::new();
        databases.create("partyA").unwrap();
        assert_eq!(
            databases.create("partyA").unwrap_err(),
            DatabaseError::DuplicateDatabase {
                name: "partyA".to_string()
            }
        );
    }

    #[test]
    fn test_remove_and_names() {
        let databases = Databases::new();
        databases.create("partyB").unwrap();
        databases.create("partyA").unwrap();
        assert_eq!(databases.names(), vec!["partyA", "partyB"]);

        let removed = databases.remove("partyA").unwrap();
        assert_eq!(removed.name(), "partyA");
        assert_eq!(databases.names(), vec!["partyB"]);
        assert!(databases.remove("partyA").is_none());
    }
}
