/// Identifier of a product row. Stable and immutable.
pub type ProductId = u64;

/// A product in the inventory.
///
/// `stock` is only mutated inside a committed reservation transaction and can
/// never go negative. `version` is bumped exactly once per committed
/// optimistic update; the pessimistic path leaves it untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub stock: u32,
    pub version: u64,
}

impl Product {
    pub fn new(id: ProductId, name: impl Into<String>, stock: u32) -> Self {
        Self {
            id,
            name: name.into(),
            stock,
            version: 1,
        }
    }
}
