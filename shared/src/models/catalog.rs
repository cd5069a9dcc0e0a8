//! Product Catalog Models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Product type, mirrors the order item type it produces
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    Physical,
    Vip,
    Design,
}

/// Catalog product (read-mostly collaborator data)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub product_type: ProductType,
    pub is_published: bool,
    /// Set for design-backed products
    pub design_id: Option<i64>,
}

/// Purchasable SKU under a product
///
/// `stock` uses -1 for unlimited and 0 for none.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sku {
    pub id: i64,
    pub product_id: i64,
    pub name: String,
    /// Price in currency units
    pub price: Decimal,
    pub stock: i32,
    pub is_enabled: bool,
    pub vip_plan_id: Option<i64>,
    pub license_plan_id: Option<i64>,
    pub design_id: Option<i64>,
}

impl Sku {
    /// Whether at least one unit can be sold
    #[inline]
    pub fn has_stock(&self) -> bool {
        self.stock != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_sentinel() {
        let mut sku = Sku {
            id: 1,
            product_id: 1,
            name: "default".into(),
            price: Decimal::new(990, 2),
            stock: -1,
            is_enabled: true,
            vip_plan_id: None,
            license_plan_id: None,
            design_id: None,
        };
        assert!(sku.has_stock());
        sku.stock = 0;
        assert!(!sku.has_stock());
        sku.stock = 3;
        assert!(sku.has_stock());
    }
}
