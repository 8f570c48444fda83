//! # Shopwire Catalog
//!
//! The catalog service's side of the choreography. It consumes nothing:
//! product lifecycle actions (create, delete, add-to-cart) fan out as
//! events for the identity and cart services to react to. Product
//! persistence and image storage are the excluded storage layer's
//! business and never pass through the message core.

pub mod topology {
    //! Catalog-side broker topology.
    //!
    //! Publish-only, so just the two exchanges - declared here too because
    //! topology is convergent and the catalog must not depend on another
    //! service having started first.

    use shopwire_core::topology::{CART_EXCHANGE, ExchangeSpec, Topology, USER_EXCHANGE};

    /// Everything the catalog service declares at startup.
    #[must_use]
    pub fn topology() -> Topology {
        Topology::new()
            .exchange(ExchangeSpec::topic(USER_EXCHANGE))
            .exchange(ExchangeSpec::topic(CART_EXCHANGE))
    }
}

use rust_decimal::Decimal;
use shopwire_core::events::{CartItemAdded, ProductCreated, ProductDeleted};
use shopwire_core::publisher::{EventPublisher, PublishError};
use uuid::Uuid;

/// Publishes the catalog service's domain events.
#[derive(Clone)]
pub struct CatalogEvents {
    publisher: EventPublisher,
}

impl CatalogEvents {
    /// Wrap the service's publisher.
    #[must_use]
    pub const fn new(publisher: EventPublisher) -> Self {
        Self { publisher }
    }

    /// Announce a successful product creation.
    ///
    /// The identity service appends the product to the creator's list.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] if the broker does not accept the frame.
    pub async fn product_created(
        &self,
        creator_id: Uuid,
        product_id: Uuid,
    ) -> Result<(), PublishError> {
        self.publisher
            .publish(&ProductCreated {
                creator_id,
                product_id,
            })
            .await
    }

    /// Announce a product deletion.
    ///
    /// Cascades: every cart drops its matching line items and the creator
    /// loses the id from their product list.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] if the broker does not accept the frame.
    pub async fn product_deleted(
        &self,
        creator_id: Uuid,
        product_id: Uuid,
    ) -> Result<(), PublishError> {
        self.publisher
            .publish(&ProductDeleted {
                creator_id,
                product_id,
            })
            .await
    }

    /// Announce a product being placed into a cart.
    ///
    /// Name and price ride along as snapshots so the cart service never
    /// has to call back into the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] if the broker does not accept the frame.
    pub async fn product_added_to_cart(
        &self,
        cart_id: Uuid,
        product_id: Uuid,
        name: String,
        price: Decimal,
    ) -> Result<(), PublishError> {
        self.publisher
            .publish(&CartItemAdded {
                cart_id,
                product_id,
                name,
                price,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use shopwire_core::broker::BrokerChannel;
    use shopwire_core::topology::{CART_EXCHANGE, CART_ITEM_ADDED_KEY, QueueSpec, Topology};
    use shopwire_testing::InMemoryBroker;
    use std::sync::Arc;

    #[tokio::test]
    async fn added_to_cart_reaches_a_bound_queue_with_snapshots() {
        let broker = InMemoryBroker::new();
        topology::topology()
            .queue(QueueSpec::durable("capture"))
            .bind("capture", CART_EXCHANGE, CART_ITEM_ADDED_KEY)
            .declare(&broker)
            .await
            .unwrap();

        let channel: Arc<dyn BrokerChannel> = Arc::new(broker.clone());
        let events = CatalogEvents::new(EventPublisher::new(channel));
        events
            .product_added_to_cart(
                Uuid::new_v4(),
                Uuid::new_v4(),
                "Keyboard".to_string(),
                Decimal::new(4999, 2),
            )
            .await
            .unwrap();

        let payloads = broker.buffered_payloads("capture");
        assert_eq!(payloads.len(), 1);
        let value: serde_json::Value = serde_json::from_slice(&payloads[0]).unwrap();
        assert_eq!(value["name"], "Keyboard");
        assert_eq!(value["price"], "49.99");
    }
}
