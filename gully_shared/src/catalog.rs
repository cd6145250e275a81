//! Purchase catalog.
//!
//! Static, read-only at runtime. Items are sent verbatim in `shopOpened`,
//! so the wire spelling of the slot key is `type`.

use serde::{Deserialize, Serialize};

/// Clothing slots an item can dress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClothingSlot {
    Shirt,
    Pants,
    Hat,
}

/// One purchasable entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub label: String,
    pub price: u32,
    #[serde(rename = "type")]
    pub slot: ClothingSlot,
    pub color: String,
}

/// The full item list, looked up by id for purchases.
#[derive(Debug, Clone)]
pub struct Catalog {
    items: Vec<CatalogItem>,
}

impl Catalog {
    /// The stock catalog shipped with the world.
    pub fn standard() -> Self {
        Self {
            items: vec![
                CatalogItem {
                    id: "shirt-red".to_string(),
                    label: "Red Shirt".to_string(),
                    price: 50,
                    slot: ClothingSlot::Shirt,
                    color: "#e05a44".to_string(),
                },
                CatalogItem {
                    id: "pants-blue".to_string(),
                    label: "Blue Pants".to_string(),
                    price: 40,
                    slot: ClothingSlot::Pants,
                    color: "#131133".to_string(),
                },
            ],
        }
    }

    pub fn get(&self, id: &str) -> Option<&CatalogItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_catalog_lookup() {
        let c = Catalog::standard();
        let shirt = c.get("shirt-red").unwrap();
        assert_eq!(shirt.price, 50);
        assert_eq!(shirt.slot, ClothingSlot::Shirt);
        assert!(c.get("hat-gold").is_none());
    }

    #[test]
    fn item_wire_shape_uses_type_key() {
        let c = Catalog::standard();
        let j = serde_json::to_value(c.get("pants-blue").unwrap()).unwrap();
        assert_eq!(j["type"], "pants");
        assert_eq!(j["label"], "Blue Pants");
    }
}
