//! Cart aggregate as the choreography sees it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// One product line in a cart.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineItem {
    /// The product in this line.
    pub product_id: Uuid,
    /// Product name snapshot from the add event.
    pub name: String,
    /// Unit price snapshot from the add event.
    pub price: Decimal,
    /// How many units; duplicate add events increment this.
    pub quantity: u32,
}

/// A cart record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cart {
    /// Cart id, unique across the system.
    pub id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// Current line items.
    pub items: Vec<LineItem>,
    /// When the cart was created.
    pub created_at: DateTime<Utc>,
    /// Last mutation through the choreography.
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// An empty cart created now.
    #[must_use]
    pub const fn new(id: Uuid, user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether any line references the given product.
    #[must_use]
    pub fn contains_product(&self, product_id: Uuid) -> bool {
        self.items.iter().any(|item| item.product_id == product_id)
    }
}
