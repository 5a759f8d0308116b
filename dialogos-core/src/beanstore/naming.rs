//! Attribute naming for conversation bean stores

use parking_lot::RwLock;

/// Cid used by bean stores of conversations that have no id yet
pub const TRANSIENT_CID: &str = "transient";

const DELIMITER: char = '#';

/// Maps bean ids to attribute names partitioned by conversation id.
///
/// Names look like `prefix[cid]#bean`. The cid can be changed after the bean store
/// was created, which is how a conversation begun mid-request gets its storage
/// renamed before it is attached.
#[derive(Debug)]
pub struct ConversationNamingScheme {
    prefix: String,
    cid: RwLock<String>,
}

impl ConversationNamingScheme {
    /// Create a naming scheme for `cid`
    pub fn new(prefix: impl Into<String>, cid: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            cid: RwLock::new(cid.into()),
        }
    }

    /// Create a naming scheme for a conversation without an id
    pub fn transient(prefix: impl Into<String>) -> Self {
        Self::new(prefix, TRANSIENT_CID)
    }

    /// Current conversation id
    pub fn cid(&self) -> String {
        self.cid.read().clone()
    }

    /// Rename the partition
    pub fn set_cid(&self, cid: impl Into<String>) {
        *self.cid.write() = cid.into();
    }

    fn partition(&self) -> String {
        format!("{}[{}]{}", self.prefix, self.cid.read(), DELIMITER)
    }

    /// Whether `name` belongs to this partition
    pub fn accept(&self, name: &str) -> bool {
        name.starts_with(&self.partition())
    }

    /// Attribute name for a bean id
    pub fn prefix(&self, id: &str) -> String {
        format!("{}{}", self.partition(), id)
    }

    /// Bean id for an attribute name of this partition
    pub fn deprefix(&self, name: &str) -> Option<String> {
        name.strip_prefix(&self.partition()).map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_and_deprefix() {
        let naming = ConversationNamingScheme::new("dialogos", "3");
        let name = naming.prefix("cart");

        assert_eq!(name, "dialogos[3]#cart");
        assert!(naming.accept(&name));
        assert_eq!(naming.deprefix(&name).as_deref(), Some("cart"));
        assert!(!naming.accept("dialogos[30]#cart"));
        assert!(naming.deprefix("other").is_none());
    }

    #[test]
    fn test_rename() {
        let naming = ConversationNamingScheme::transient("dialogos");
        assert_eq!(naming.cid(), TRANSIENT_CID);

        naming.set_cid("12");
        assert_eq!(naming.prefix("wizard"), "dialogos[12]#wizard");
    }
}
