//! User aggregate as the choreography sees it.

use uuid::Uuid;

/// A user record.
///
/// Only the fields the choreography touches; credentials and profile data
/// belong to the excluded storage layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserRecord {
    /// Account id.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Contact email.
    pub email: String,
    /// The user's cart, once `cart.created` has been processed.
    pub cart_id: Option<Uuid>,
    /// Products this user created, maintained by `product_created` /
    /// `product_deleted`.
    pub created_product_ids: Vec<Uuid>,
}

impl UserRecord {
    /// A fresh record with no cart and no products.
    #[must_use]
    pub const fn new(id: Uuid, name: String, email: String) -> Self {
        Self {
            id,
            name,
            email,
            cart_id: None,
            created_product_ids: Vec::new(),
        }
    }
}
