//! Receipts: how each drain handled one posted item

use crate::ItemId;
use identity::ConduitId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Disposition of an item at one drain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReceiptKind {
    /// Queued, not yet consumed (pull drains)
    Acceptance,
    /// Handled synchronously, or a first/all-drain wait declared it complete
    Delivery,
    /// The drain declined or ignored the item
    Unwanted,
}

impl fmt::Display for ReceiptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiptKind::Acceptance => write!(f, "ACCEPTANCE"),
            ReceiptKind::Delivery => write!(f, "DELIVERY"),
            ReceiptKind::Unwanted => write!(f, "UNWANTED"),
        }
    }
}

/// Acknowledgment from a single drain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Identity of the drain that produced the receipt
    pub source: ConduitId,
    /// Item the receipt refers to
    pub item: ItemId,
    /// Drain-local, strictly increasing token
    pub token: u64,
    /// What the drain did with the item
    pub kind: ReceiptKind,
}

impl Receipt {
    /// Creates a new receipt
    pub fn new(source: ConduitId, item: ItemId, token: u64, kind: ReceiptKind) -> Self {
        Self {
            source,
            item,
            token,
            kind,
        }
    }

    /// Creates an acceptance receipt
    pub fn acceptance(source: ConduitId, item: ItemId, token: u64) -> Self {
        Self::new(source, item, token, ReceiptKind::Acceptance)
    }

    /// Creates a delivery receipt
    pub fn delivery(source: ConduitId, item: ItemId, token: u64) -> Self {
        Self::new(source, item, token, ReceiptKind::Delivery)
    }

    /// Marks the item as delivered (an acceptance confirmed by a drain wait)
    pub fn delivered(mut self) -> Self {
        if self.kind == ReceiptKind::Acceptance {
            self.kind = ReceiptKind::Delivery;
        }
        self
    }

    /// Checks if this receipt reports a delivery
    pub fn is_delivery(&self) -> bool {
        self.kind == ReceiptKind::Delivery
    }
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} #{} from {}", self.kind, self.item, self.token, self.source)
    }
}

/// Ordered receipts from one post, one entry per drain visited
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptList {
    receipts: Vec<Receipt>,
}

impl ReceiptList {
    /// Creates an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a receipt
    pub fn push(&mut self, receipt: Receipt) {
        self.receipts.push(receipt);
    }

    /// Returns the number of receipts
    pub fn len(&self) -> usize {
        self.receipts.len()
    }

    /// Checks if no drain produced a receipt
    pub fn is_empty(&self) -> bool {
        self.receipts.is_empty()
    }

    /// Iterates over receipts in visit order
    pub fn iter(&self) -> std::slice::Iter<'_, Receipt> {
        self.receipts.iter()
    }

    /// Returns the receipt at `index`
    pub fn get(&self, index: usize) -> Option<&Receipt> {
        self.receipts.get(index)
    }

    /// Mutable access by index (used to confirm deliveries after a wait)
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Receipt> {
        self.receipts.get_mut(index)
    }

    /// Counts receipts of a given kind
    pub fn count(&self, kind: ReceiptKind) -> usize {
        self.receipts.iter().filter(|r| r.kind == kind).count()
    }

    /// Checks if any drain reported a delivery
    pub fn has_delivery(&self) -> bool {
        self.receipts.iter().any(Receipt::is_delivery)
    }

    /// Returns the receipt produced by a given drain
    pub fn from_source(&self, source: &ConduitId) -> Option<&Receipt> {
        self.receipts.iter().find(|r| &r.source == source)
    }

    /// Consumes the list, returning the receipts
    pub fn into_vec(self) -> Vec<Receipt> {
        self.receipts
    }
}

impl IntoIterator for ReceiptList {
    type Item = Receipt;
    type IntoIter = std::vec::IntoIter<Receipt>;

    fn into_iter(self) -> Self::IntoIter {
        self.receipts.into_iter()
    }
}

impl<'a> IntoIterator for &'a ReceiptList {
    type Item = &'a Receipt;
    type IntoIter = std::slice::Iter<'a, Receipt>;

    fn into_iter(self) -> Self::IntoIter {
        self.receipts.iter()
    }
}

impl Extend<Receipt> for ReceiptList {
    fn extend<I: IntoIterator<Item = Receipt>>(&mut self, iter: I) {
        self.receipts.extend(iter);
    }
}

impl FromIterator<Receipt> for ReceiptList {
    fn from_iter<I: IntoIterator<Item = Receipt>>(iter: I) -> Self {
        Self {
            receipts: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(name: &str) -> ConduitId {
        ConduitId::new("test.conduit").birth_my_child(name)
    }

    #[test]
    fn test_delivered_upgrades_acceptance_only() {
        let item = ItemId::new();
        let accepted = Receipt::acceptance(drain("pull-1"), item, 1);
        assert_eq!(accepted.delivered().kind, ReceiptKind::Delivery);

        let unwanted = Receipt::new(drain("push-1"), item, 1, ReceiptKind::Unwanted);
        assert_eq!(unwanted.delivered().kind, ReceiptKind::Unwanted);
    }

    #[test]
    fn test_list_preserves_order_and_counts() {
        let item = ItemId::new();
        let mut list = ReceiptList::new();
        assert!(list.is_empty());

        list.push(Receipt::acceptance(drain("pull-1"), item, 1));
        list.push(Receipt::delivery(drain("push-1"), item, 1));
        list.push(Receipt::new(drain("push-2"), item, 1, ReceiptKind::Unwanted));

        assert_eq!(list.len(), 3);
        assert_eq!(list.get(0).unwrap().source, drain("pull-1"));
        assert_eq!(list.count(ReceiptKind::Acceptance), 1);
        assert_eq!(list.count(ReceiptKind::Delivery), 1);
        assert_eq!(list.count(ReceiptKind::Unwanted), 1);
        assert!(list.has_delivery());
    }

    #[test]
    fn test_from_source_lookup() {
        let item = ItemId::new();
        let list: ReceiptList = vec![
            Receipt::acceptance(drain("pull-1"), item, 4),
            Receipt::delivery(drain("push-1"), item, 9),
        ]
        .into_iter()
        .collect();

        assert_eq!(list.from_source(&drain("push-1")).unwrap().token, 9);
        assert!(list.from_source(&drain("push-2")).is_none());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ReceiptKind::Acceptance.to_string(), "ACCEPTANCE");
        assert_eq!(ReceiptKind::Delivery.to_string(), "DELIVERY");
        assert_eq!(ReceiptKind::Unwanted.to_string(), "UNWANTED");
    }
}
