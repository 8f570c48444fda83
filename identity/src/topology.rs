//! Identity-side broker topology.

use shopwire_core::topology::{
    CART_CREATED_KEY, CART_EXCHANGE, ExchangeSpec, PRODUCT_CREATED_KEY, PRODUCT_DELETED_KEY,
    Topology, USER_EXCHANGE,
};

/// Queue for `cart.created` (sets the user's cart reference).
pub const CART_CREATED_QUEUE: &str = "identity_cart_created_queue";

/// Queue for `product_created` (appends to the creator's product list).
pub const PRODUCT_CREATED_QUEUE: &str = "identity_product_created_queue";

/// Queue for `product_deleted` (removes from the creator's product list).
pub const PRODUCT_DELETED_QUEUE: &str = "identity_product_deleted_queue";

/// Everything the identity service declares at startup.
///
/// Both exchanges appear although the service only publishes to one:
/// declarations are convergent across services, and declaring the consumed
/// exchange too means startup order between services does not matter.
#[must_use]
pub fn topology() -> Topology {
    Topology::new()
        .with_dead_lettering()
        .exchange(ExchangeSpec::topic(USER_EXCHANGE))
        .exchange(ExchangeSpec::topic(CART_EXCHANGE))
        .consuming_queue(CART_CREATED_QUEUE, USER_EXCHANGE, CART_CREATED_KEY)
        .consuming_queue(PRODUCT_CREATED_QUEUE, USER_EXCHANGE, PRODUCT_CREATED_KEY)
        .consuming_queue(PRODUCT_DELETED_QUEUE, CART_EXCHANGE, PRODUCT_DELETED_KEY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_consuming_queue_dead_letters() {
        let topology = topology();
        for queue in topology.queues() {
            if queue.name == shopwire_core::topology::DEAD_LETTER_QUEUE {
                continue;
            }
            assert!(
                queue.dead_letter.is_some(),
                "{} has no dead-letter wiring",
                queue.name
            );
        }
    }
}
