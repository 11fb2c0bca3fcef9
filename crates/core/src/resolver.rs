//! Entity resolver: per-entity namespaced metadata.
//!
//! Each node holds one address binding, free-form text records and ordered
//! text lists. The store is self-service: a caller may only write under the
//! node derived from its own address.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use crate::{Address, CallerContext, Error, Hash, Result};

/// Namespace key for an entity's metadata.
pub type Node = Hash;

/// Node owned by `address`: `BLAKE3(address)`.
pub fn entity_id(address: &Address) -> Node {
    Hash::of(address.as_bytes())
}

/// A four-byte capability tag.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InterfaceId(pub [u8; 4]);

impl InterfaceId {
    /// XOR of the leading four bytes of `BLAKE3(signature)` over every method
    /// in the capability.
    pub fn of(signatures: &[&str]) -> Self {
        let mut tag = [0u8; 4];
        for sig in signatures {
            let digest = Hash::of(sig.as_bytes());
            for (t, d) in tag.iter_mut().zip(digest.0.iter()) {
                *t ^= d;
            }
        }
        Self(tag)
    }
}

impl fmt::Debug for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InterfaceId(0x{})", hex::encode(self.0))
    }
}

pub const META_SIGNATURES: &[&str] = &["supportsInterface(bytes4)"];
pub const ADDR_SIGNATURES: &[&str] = &["addr(bytes32)"];
pub const TEXT_SIGNATURES: &[&str] = &["text(bytes32,string)"];
pub const LIST_TEXT_SIGNATURES: &[&str] = &[
    "list(bytes32,string)",
    "listText(bytes32,string,uint256)",
];

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
struct EntityRecord {
    addr: Address,
    texts: BTreeMap<String, String>,
    lists: BTreeMap<String, Vec<String>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityResolver {
    records: BTreeMap<Node, EntityRecord>,
}

impl EntityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn supports_interface(&self, id: InterfaceId) -> bool {
        [
            META_SIGNATURES,
            ADDR_SIGNATURES,
            TEXT_SIGNATURES,
            LIST_TEXT_SIGNATURES,
        ]
        .iter()
        .any(|sigs| InterfaceId::of(sigs) == id)
    }

    pub fn get_entity_id(&self, address: &Address) -> Node {
        entity_id(address)
    }

    pub fn set_addr(&mut self, ctx: &CallerContext, node: &Node, address: Address) -> Result<()> {
        self.record_mut(ctx, node)?.addr = address;
        debug!(%node, %address, "addr set");
        Ok(())
    }

    /// Bound address, or [`Address::ZERO`] when unset.
    pub fn addr(&self, node: &Node) -> Address {
        self.records.get(node).map_or(Address::ZERO, |r| r.addr)
    }

    pub fn set_text(&mut self, ctx: &CallerContext, node: &Node, key: &str, value: String) -> Result<()> {
        self.record_mut(ctx, node)?.texts.insert(key.to_string(), value);
        debug!(%node, key, "text set");
        Ok(())
    }

    /// Text value, or `""` when unset.
    pub fn text(&self, node: &Node, key: &str) -> &str {
        self.records
            .get(node)
            .and_then(|r| r.texts.get(key))
            .map_or("", String::as_str)
    }

    pub fn set_list_text(
        &mut self,
        ctx: &CallerContext,
        node: &Node,
        key: &str,
        index: usize,
        value: String,
    ) -> Result<()> {
        let list = self.list_mut(ctx, node, key, index)?;
        let len = list.len();
        let slot = list
            .get_mut(index)
            .ok_or(Error::IndexOutOfRange { index, len })?;
        *slot = value;
        debug!(%node, key, index, "list item set");
        Ok(())
    }

    /// Append to a list, returning its new length.
    pub fn push_list_text(&mut self, ctx: &CallerContext, node: &Node, key: &str, value: String) -> Result<usize> {
        self.authorize(ctx, node)?;
        let list = self
            .records
            .entry(*node)
            .or_default()
            .lists
            .entry(key.to_string())
            .or_default();
        list.push(value);
        debug!(%node, key, len = list.len(), "list item pushed");
        Ok(list.len())
    }

    /// Remove the element at `index`, shifting later elements down by one.
    pub fn remove_list_index(&mut self, ctx: &CallerContext, node: &Node, key: &str, index: usize) -> Result<()> {
        let list = self.list_mut(ctx, node, key, index)?;
        if index >= list.len() {
            return Err(Error::IndexOutOfRange {
                index,
                len: list.len(),
            });
        }
        list.remove(index);
        debug!(%node, key, index, "list item removed");
        Ok(())
    }

    /// The whole list, empty when unset.
    pub fn list(&self, node: &Node, key: &str) -> &[String] {
        self.records
            .get(node)
            .and_then(|r| r.lists.get(key))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn list_text(&self, node: &Node, key: &str, index: usize) -> Result<&str> {
        let list = self.list(node, key);
        list.get(index)
            .map(String::as_str)
            .ok_or(Error::IndexOutOfRange {
                index,
                len: list.len(),
            })
    }

    fn authorize(&self, ctx: &CallerContext, node: &Node) -> Result<()> {
        if entity_id(&ctx.sender) != *node {
            return Err(Error::Unauthorized(ctx.sender));
        }
        Ok(())
    }

    fn record_mut(&mut self, ctx: &CallerContext, node: &Node) -> Result<&mut EntityRecord> {
        self.authorize(ctx, node)?;
        Ok(self.records.entry(*node).or_default())
    }

    /// Existing list for in-place edits. A missing list reads as empty, so
    /// any index into it is out of range.
    fn list_mut(
        &mut self,
        ctx: &CallerContext,
        node: &Node,
        key: &str,
        index: usize,
    ) -> Result<&mut Vec<String>> {
        self.authorize(ctx, node)?;
        self.records
            .get_mut(node)
            .and_then(|r| r.lists.get_mut(key))
            .ok_or(Error::IndexOutOfRange { index, len: 0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: Address = Address([1u8; 20]);
    const OTHER: Address = Address([2u8; 20]);

    fn owner() -> (CallerContext, Node) {
        (CallerContext::new(OWNER, 0), entity_id(&OWNER))
    }

    #[test]
    fn capability_tags() {
        let resolver = EntityResolver::new();
        assert!(resolver.supports_interface(InterfaceId::of(META_SIGNATURES)));
        assert!(resolver.supports_interface(InterfaceId::of(TEXT_SIGNATURES)));
        assert!(resolver.supports_interface(InterfaceId::of(LIST_TEXT_SIGNATURES)));
        assert!(!resolver.supports_interface(InterfaceId([0xff; 4])));
    }

    #[test]
    fn unset_values_read_as_sentinels() {
        let resolver = EntityResolver::new();
        let node = entity_id(&OWNER);
        assert_eq!(resolver.addr(&node), Address::ZERO);
        assert_eq!(resolver.text(&node, "name"), "");
        assert!(resolver.list(&node, "langs").is_empty());
    }

    #[test]
    fn text_last_write_wins() {
        let mut resolver = EntityResolver::new();
        let (ctx, node) = owner();
        resolver.set_text(&ctx, &node, "name", "v1".into()).unwrap();
        resolver.set_text(&ctx, &node, "name", "v2".into()).unwrap();
        assert_eq!(resolver.text(&node, "name"), "v2");
    }

    #[test]
    fn writes_scoped_to_own_node() {
        let mut resolver = EntityResolver::new();
        let (_, node) = owner();
        let other = CallerContext::new(OTHER, 0);

        assert!(matches!(resolver.set_addr(&other, &node, OTHER), Err(Error::Unauthorized(_))));
        assert!(matches!(resolver.set_text(&other, &node, "k", "v".into()), Err(Error::Unauthorized(_))));
        assert!(matches!(resolver.push_list_text(&other, &node, "k", "v".into()), Err(Error::Unauthorized(_))));
        assert!(matches!(resolver.set_list_text(&other, &node, "k", 0, "v".into()), Err(Error::Unauthorized(_))));
        assert!(matches!(resolver.remove_list_index(&other, &node, "k", 0), Err(Error::Unauthorized(_))));
        assert_eq!(resolver, EntityResolver::new());
    }

    #[test]
    fn list_push_set_remove() {
        let mut resolver = EntityResolver::new();
        let (ctx, node) = owner();
        assert_eq!(resolver.push_list_text(&ctx, &node, "k", "a".into()).unwrap(), 1);
        assert_eq!(resolver.push_list_text(&ctx, &node, "k", "b".into()).unwrap(), 2);
        assert_eq!(resolver.push_list_text(&ctx, &node, "k", "c".into()).unwrap(), 3);

        resolver.set_list_text(&ctx, &node, "k", 1, "B".into()).unwrap();
        resolver.remove_list_index(&ctx, &node, "k", 0).unwrap();
        assert_eq!(resolver.list(&node, "k"), ["B", "c"]);
        assert_eq!(resolver.list_text(&node, "k", 1).unwrap(), "c");
    }

    #[test]
    fn list_index_errors() {
        let mut resolver = EntityResolver::new();
        let (ctx, node) = owner();
        assert!(matches!(
            resolver.remove_list_index(&ctx, &node, "k", 0),
            Err(Error::IndexOutOfRange { index: 0, len: 0 })
        ));
        resolver.push_list_text(&ctx, &node, "k", "a".into()).unwrap();
        assert!(matches!(
            resolver.list_text(&node, "k", 1),
            Err(Error::IndexOutOfRange { index: 1, len: 1 })
        ));
    }
}
