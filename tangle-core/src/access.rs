//! Write authorization configuration
//!
//! A log may restrict who can append to it with an allow-list of writer
//! keys. An empty list means the log is open; the `Any` wildcard admits
//! every signed writer.

use tangle_model::PubKey;

/// One entry in a log's allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKey {
    /// Wildcard: any key may write.
    Any,
    /// A specific writer key.
    Key(PubKey),
}

impl AccessKey {
    pub fn is_wildcard(&self) -> bool {
        matches!(self, AccessKey::Any)
    }
}

/// Whether a writer holding `key` may append under this allow-list.
pub fn permits(list: &[AccessKey], key: Option<&PubKey>) -> bool {
    if list.is_empty() {
        return true;
    }
    if list.iter().any(AccessKey::is_wildcard) {
        return true;
    }
    match key {
        Some(key) => list
            .iter()
            .any(|entry| matches!(entry, AccessKey::Key(k) if k == key)),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> PubKey {
        PubKey::from([byte; 32])
    }

    #[test]
    fn empty_list_permits_everyone() {
        assert!(permits(&[], Some(&key(1))));
        assert!(permits(&[], None));
    }

    #[test]
    fn wildcard_permits_everyone() {
        let list = [AccessKey::Key(key(1)), AccessKey::Any];
        assert!(permits(&list, Some(&key(9))));
        assert!(permits(&list, None));
    }

    #[test]
    fn explicit_list_permits_members_only() {
        let list = [AccessKey::Key(key(1))];
        assert!(permits(&list, Some(&key(1))));
        assert!(!permits(&list, Some(&key(2))));
    }

    #[test]
    fn explicit_list_rejects_missing_key() {
        let list = [AccessKey::Key(key(1))];
        assert!(!permits(&list, None));
    }
}
