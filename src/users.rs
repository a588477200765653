use std::sync::Arc;

use anyhow::Result;

use crate::api::User;
use crate::data::UserService;

/// User lookups for the author join and the profile view. Nothing is
/// cached here: each profile request goes to the network.
#[derive(Clone)]
pub struct UserLookup {
    service: Arc<dyn UserService + Send + Sync>,
}

impl UserLookup {
    pub fn new(service: Arc<dyn UserService + Send + Sync>) -> Self {
        Self { service }
    }

    pub fn fetch_one(&self, id: u64) -> Result<User> {
        self.service.load_user(id)
    }

    pub fn fetch_authors(&self) -> Result<Vec<Arc<User>>> {
        let users = self.service.list_authors()?;
        Ok(users.into_iter().map(Arc::new).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBackend;

    #[test]
    fn fetch_one_is_never_cached() {
        let backend = Arc::new(FakeBackend::seeded());
        let lookup = UserLookup::new(backend.clone());
        let first = lookup.fetch_one(1).unwrap();
        let second = lookup.fetch_one(1).unwrap();
        assert_eq!(first, second);
        assert_eq!(backend.calls("load_user"), 2);
    }

    #[test]
    fn missing_user_is_an_error() {
        let backend = Arc::new(FakeBackend::seeded());
        let lookup = UserLookup::new(backend);
        assert!(lookup.fetch_one(999).is_err());
    }

    #[test]
    fn author_listing_is_shared() {
        let backend = Arc::new(FakeBackend::seeded());
        let lookup = UserLookup::new(backend.clone());
        let authors = lookup.fetch_authors().unwrap();
        assert_eq!(authors.len(), 2);
        assert_eq!(backend.calls("list_authors"), 1);
    }
}
