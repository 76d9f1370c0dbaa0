use std::collections::HashMap;

use super::{ConsolidatedItem, ProductKind};

/// Per-product billing accumulator for a single generation pass.
/// Rows keep their first-seen order until the caller sorts them.
#[derive(Debug, Default)]
pub struct Consolidation {
    items: Vec<ConsolidatedItem>,
    index: HashMap<(ProductKind, String), usize>,
}

impl Consolidation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `quantity` of a product. The unit and price recorded on first
    /// sight are kept for the rest of the pass.
    pub fn add(
        &mut self,
        kind: ProductKind,
        product_id: &str,
        product_name: &str,
        unit: &str,
        unit_price: f64,
        quantity: f64,
    ) {
        let key = (kind, product_id.to_string());
        match self.index.get(&key) {
            Some(&pos) => {
                let item = &mut self.items[pos];
                item.quantity += quantity;
                item.subtotal += quantity * item.unit_price;
            }
            None => {
                self.index.insert(key, self.items.len());
                self.items.push(ConsolidatedItem {
                    product_id: product_id.to_string(),
                    product_name: product_name.to_string(),
                    kind,
                    quantity,
                    unit: unit.to_string(),
                    unit_price,
                    subtotal: quantity * unit_price,
                });
            }
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<ConsolidatedItem> {
        self.items
    }
}
