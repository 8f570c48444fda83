//! Cart-side broker topology.

use shopwire_core::topology::{
    CART_EXCHANGE, CART_ITEM_ADDED_KEY, ExchangeSpec, PRODUCT_DELETED_KEY, Topology, USER_CREATED_KEY,
    USER_DELETED_KEY, USER_EXCHANGE,
};

/// Queue for `user.created` (creates the user's cart).
pub const USER_CREATED_QUEUE: &str = "cart_user_created_queue";

/// Queue for `user.deleted` (deletes the cart, revokes the credential).
pub const USER_DELETED_QUEUE: &str = "cart_user_deleted_queue";

/// Queue for `cart.item_added`. Keeps its historical unprefixed name.
pub const CART_ITEM_ADDED_QUEUE: &str = "cart_item_added_queue";

/// Queue for `product_deleted` (sweeps line items out of every cart).
pub const PRODUCT_DELETED_QUEUE: &str = "cart_product_deleted_queue";

/// Everything the cart service declares at startup.
#[must_use]
pub fn topology() -> Topology {
    Topology::new()
        .with_dead_lettering()
        .exchange(ExchangeSpec::topic(USER_EXCHANGE))
        .exchange(ExchangeSpec::topic(CART_EXCHANGE))
        .consuming_queue(USER_CREATED_QUEUE, USER_EXCHANGE, USER_CREATED_KEY)
        .consuming_queue(USER_DELETED_QUEUE, USER_EXCHANGE, USER_DELETED_KEY)
        .consuming_queue(CART_ITEM_ADDED_QUEUE, CART_EXCHANGE, CART_ITEM_ADDED_KEY)
        .consuming_queue(PRODUCT_DELETED_QUEUE, CART_EXCHANGE, PRODUCT_DELETED_KEY)
}
