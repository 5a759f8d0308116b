//! Bean store layered over a named attribute map

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use super::{BoundBeanStore, ContextualInstance, ConversationNamingScheme};
use crate::storage::ScopeAttribute;

/// Attribute map a bean store writes through to once attached
pub trait AttributeBacking: Send {
    /// Read an attribute
    fn attribute(&self, name: &str) -> Option<ScopeAttribute>;

    /// Write an attribute
    fn set_attribute(&self, name: &str, value: ScopeAttribute);

    /// Remove an attribute
    fn remove_attribute(&self, name: &str);

    /// Names of all attributes
    fn attribute_names(&self) -> Vec<String>;
}

/// Bean store keeping a local copy of its instances and, while attached, mirroring
/// them into an [`AttributeBacking`] under names from its naming scheme.
pub struct AttributeBeanStore<B> {
    naming: Arc<ConversationNamingScheme>,
    backing: B,
    local: HashMap<String, Arc<dyn ContextualInstance>>,
    attached: bool,
}

impl<B: AttributeBacking> AttributeBeanStore<B> {
    /// Create a detached bean store
    pub fn new(naming: Arc<ConversationNamingScheme>, backing: B) -> Self {
        Self {
            naming,
            backing,
            local: HashMap::new(),
            attached: false,
        }
    }

    /// Naming scheme of the store
    pub fn naming(&self) -> &Arc<ConversationNamingScheme> {
        &self.naming
    }

    fn backed_instances(&self) -> Vec<(String, Arc<dyn ContextualInstance>)> {
        self.backing
            .attribute_names()
            .into_iter()
            .filter_map(|name| {
                let id = self.naming.deprefix(&name)?;
                match self.backing.attribute(&name)? {
                    ScopeAttribute::Instance(instance) => Some((id, instance)),
                    _ => None,
                }
            })
            .collect()
    }
}

impl<B: AttributeBacking> BoundBeanStore for AttributeBeanStore<B> {
    fn get(&self, id: &str) -> Option<Arc<dyn ContextualInstance>> {
        if let Some(instance) = self.local.get(id) {
            return Some(Arc::clone(instance));
        }
        if !self.attached {
            return None;
        }
        match self.backing.attribute(&self.naming.prefix(id))? {
            ScopeAttribute::Instance(instance) => Some(instance),
            _ => None,
        }
    }

    fn put(&mut self, id: &str, instance: Arc<dyn ContextualInstance>) {
        if self.attached {
            self.backing.set_attribute(
                &self.naming.prefix(id),
                ScopeAttribute::Instance(Arc::clone(&instance)),
            );
        }
        self.local.insert(id.to_string(), instance);
    }

    fn remove(&mut self, id: &str) -> Option<Arc<dyn ContextualInstance>> {
        let mut removed = self.local.remove(id);
        if self.attached {
            let name = self.naming.prefix(id);
            if removed.is_none() {
                if let Some(ScopeAttribute::Instance(instance)) = self.backing.attribute(&name) {
                    removed = Some(instance);
                }
            }
            self.backing.remove_attribute(&name);
        }
        removed
    }

    fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.local.keys().cloned().collect();
        if self.attached {
            for (id, _) in self.backed_instances() {
                if !self.local.contains_key(&id) {
                    ids.push(id);
                }
            }
        }
        ids
    }

    fn attach(&mut self) -> bool {
        if self.attached {
            return false;
        }
        self.attached = true;

        for (id, instance) in self.backed_instances() {
            self.local.entry(id).or_insert(instance);
        }
        for (id, instance) in &self.local {
            self.backing.set_attribute(
                &self.naming.prefix(id),
                ScopeAttribute::Instance(Arc::clone(instance)),
            );
        }
        trace!(cid = %self.naming.cid(), instances = self.local.len(), "Bean store attached");
        true
    }

    fn detach(&mut self) -> bool {
        if !self.attached {
            return false;
        }
        self.attached = false;
        trace!(cid = %self.naming.cid(), "Bean store detached");
        true
    }

    fn is_attached(&self) -> bool {
        self.attached
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use parking_lot::Mutex;
    use std::any::Any;

    #[derive(Clone, Default)]
    struct MapBacking {
        attributes: Arc<Mutex<HashMap<String, ScopeAttribute>>>,
    }

    impl AttributeBacking for MapBacking {
        fn attribute(&self, name: &str) -> Option<ScopeAttribute> {
            self.attributes.lock().get(name).cloned()
        }

        fn set_attribute(&self, name: &str, value: ScopeAttribute) {
            self.attributes.lock().insert(name.to_string(), value);
        }

        fn remove_attribute(&self, name: &str) {
            self.attributes.lock().remove(name);
        }

        fn attribute_names(&self) -> Vec<String> {
            self.attributes.lock().keys().cloned().collect()
        }
    }

    struct Value(&'static str);

    impl ContextualInstance for Value {
        fn bean_id(&self) -> &str {
            self.0
        }

        fn instance(&self) -> Arc<dyn Any + Send + Sync> {
            Arc::new(self.0)
        }

        fn destroy(&self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_detached_store_stays_local() {
        let backing = MapBacking::default();
        let naming = Arc::new(ConversationNamingScheme::transient("test"));
        let mut store = AttributeBeanStore::new(naming, backing.clone());

        store.put("a", Arc::new(Value("a")));
        assert!(store.get("a").is_some());
        assert!(backing.attribute_names().is_empty());
        assert!(!store.detach());
    }

    #[test]
    fn test_attach_publishes_under_renamed_cid() {
        let backing = MapBacking::default();
        let naming = Arc::new(ConversationNamingScheme::transient("test"));
        let mut store = AttributeBeanStore::new(Arc::clone(&naming), backing.clone());
        store.put("a", Arc::new(Value("a")));

        naming.set_cid("4");
        assert!(store.attach());
        assert!(!store.attach());
        assert_eq!(backing.attribute_names(), vec!["test[4]#a".to_string()]);

        store.put("b", Arc::new(Value("b")));
        assert!(backing.attribute("test[4]#b").is_some());

        store.remove("a");
        assert!(backing.attribute("test[4]#a").is_none());
    }

    #[test]
    fn test_attach_restores_published_instances() {
        let backing = MapBacking::default();
        let mut first = AttributeBeanStore::new(
            Arc::new(ConversationNamingScheme::new("test", "9")),
            backing.clone(),
        );
        first.attach();
        first.put("wizard", Arc::new(Value("wizard")));
        first.detach();

        let mut second = AttributeBeanStore::new(
            Arc::new(ConversationNamingScheme::new("test", "9")),
            backing.clone(),
        );
        assert!(second.get("wizard").is_none());
        second.attach();
        assert_eq!(second.get("wizard").unwrap().bean_id(), "wizard");
        assert_eq!(second.ids(), vec!["wizard".to_string()]);

        let other = AttributeBeanStore::new(
            Arc::new(ConversationNamingScheme::new("test", "10")),
            backing,
        );
        assert!(other.ids().is_empty());
    }
}
