//! Cart-side event handlers.
//!
//! All four are idempotent transitions over the cart repository; the
//! `user.created` handler additionally emits the `cart.created` reply that
//! closes the user/cart causal chain.

use crate::records::{Cart, LineItem};
use crate::repository::CartRepository;
use crate::topology::{
    CART_ITEM_ADDED_QUEUE, PRODUCT_DELETED_QUEUE, USER_CREATED_QUEUE, USER_DELETED_QUEUE,
};
use shopwire_core::broker::{BoxFuture, Delivery};
use shopwire_core::clock::Clock;
use shopwire_core::events::{CartCreated, CartItemAdded, ProductDeleted, UserCreated, UserDeleted};
use shopwire_core::handler::{EventHandler, HandlerError, HandlerResult, decode};
use shopwire_core::publisher::EventPublisher;
use shopwire_revocation::{RevocationCache, RevocationConfig, RevocationError};
use std::sync::Arc;
use uuid::Uuid;

/// Creates a cart for every new account and replies with `cart.created`.
pub struct UserCreatedHandler<R> {
    repository: R,
    publisher: EventPublisher,
    clock: Arc<dyn Clock>,
}

impl<R> UserCreatedHandler<R> {
    /// Create the handler over the cart repository and the service
    /// publisher.
    pub fn new(repository: R, publisher: EventPublisher, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            publisher,
            clock,
        }
    }
}

impl<R: CartRepository> EventHandler for UserCreatedHandler<R> {
    fn queue(&self) -> &str {
        USER_CREATED_QUEUE
    }

    fn handle<'a>(&'a self, delivery: &'a Delivery) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let event: UserCreated = decode(delivery)?;

            if let Some(existing) = self.repository.find_by_user(event.user_id).await? {
                // Create-if-absent. On a broker redelivery the earlier
                // attempt may have died between the cart write and the
                // reply publish, so re-emit the reply; the downstream
                // handler is idempotent. A duplicate that was never
                // nacked needs no reply at all.
                if delivery.redelivered {
                    self.publisher
                        .publish(&CartCreated {
                            user_id: event.user_id,
                            cart_id: existing.id,
                        })
                        .await?;
                }
                tracing::debug!(user_id = %event.user_id, "cart already exists, skipping create");
                return Ok(());
            }

            let cart = Cart::new(Uuid::new_v4(), event.user_id, self.clock.now());
            let cart_id = cart.id;
            self.repository.upsert(cart).await?;
            self.publisher
                .publish(&CartCreated {
                    user_id: event.user_id,
                    cart_id,
                })
                .await?;

            tracing::info!(user_id = %event.user_id, cart_id = %cart_id, "cart created");
            Ok(())
        })
    }
}

/// Deletes the cart and blacklists the credential on account deletion.
///
/// The only write path into the revocation cache. Both steps tolerate
/// duplicate delivery: deleting an absent cart is a no-op and re-revoking
/// a token just refreshes its entry.
pub struct UserDeletedHandler<R, C> {
    repository: R,
    cache: C,
    revocation: RevocationConfig,
}

impl<R, C> UserDeletedHandler<R, C> {
    /// Create the handler over the cart repository and the shared
    /// revocation cache.
    pub const fn new(repository: R, cache: C, revocation: RevocationConfig) -> Self {
        Self {
            repository,
            cache,
            revocation,
        }
    }
}

impl<R: CartRepository, C: RevocationCache> EventHandler for UserDeletedHandler<R, C> {
    fn queue(&self) -> &str {
        USER_DELETED_QUEUE
    }

    fn handle<'a>(&'a self, delivery: &'a Delivery) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let event: UserDeleted = decode(delivery)?;

            self.repository.delete(event.cart_id).await?;
            self.cache
                .revoke(&event.revocation_token, self.revocation.ttl)
                .await
                .map_err(|e: RevocationError| HandlerError::Transient(e.to_string()))?;

            tracing::info!(cart_id = %event.cart_id, "cart deleted and credential revoked");
            Ok(())
        })
    }
}

/// Adds a product to a cart, or bumps the quantity if it is already there.
pub struct CartItemAddedHandler<R> {
    repository: R,
    clock: Arc<dyn Clock>,
}

impl<R> CartItemAddedHandler<R> {
    /// Create the handler over the cart repository.
    pub fn new(repository: R, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }
}

impl<R: CartRepository> EventHandler for CartItemAddedHandler<R> {
    fn queue(&self) -> &str {
        CART_ITEM_ADDED_QUEUE
    }

    fn handle<'a>(&'a self, delivery: &'a Delivery) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let event: CartItemAdded = decode(delivery)?;

            // A duplicate submit racing a cart deletion lands here with no
            // cart; dropping is correct, the cart is not coming back.
            let mut cart = self
                .repository
                .find_by_id(event.cart_id)
                .await?
                .ok_or_else(|| {
                    HandlerError::NotFound(format!("cart {} does not exist", event.cart_id))
                })?;

            match cart
                .items
                .iter_mut()
                .find(|item| item.product_id == event.product_id)
            {
                Some(item) => item.quantity += 1,
                None => cart.items.push(LineItem {
                    product_id: event.product_id,
                    name: event.name.clone(),
                    price: event.price,
                    quantity: 1,
                }),
            }
            cart.updated_at = self.clock.now();
            let cart_id = cart.id;
            self.repository.upsert(cart).await?;

            tracing::info!(
                cart_id = %cart_id,
                product_id = %event.product_id,
                "line item added or incremented"
            );
            Ok(())
        })
    }
}

/// Sweeps a deleted product out of every cart.
///
/// A set difference per cart: carts without the product are untouched, so
/// applying the event twice changes nothing the second time.
pub struct ProductDeletedHandler<R> {
    repository: R,
    clock: Arc<dyn Clock>,
}

impl<R> ProductDeletedHandler<R> {
    /// Create the handler over the cart repository.
    pub fn new(repository: R, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }
}

impl<R: CartRepository> EventHandler for ProductDeletedHandler<R> {
    fn queue(&self) -> &str {
        PRODUCT_DELETED_QUEUE
    }

    fn handle<'a>(&'a self, delivery: &'a Delivery) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let event: ProductDeleted = decode(delivery)?;

            let mut swept = 0usize;
            for mut cart in self.repository.list().await? {
                if !cart.contains_product(event.product_id) {
                    continue;
                }
                cart.items.retain(|item| item.product_id != event.product_id);
                cart.updated_at = self.clock.now();
                self.repository.upsert(cart).await?;
                swept += 1;
            }

            tracing::info!(
                product_id = %event.product_id,
                carts_touched = swept,
                "deleted product swept from carts"
            );
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::InMemoryCartRepository;
    use rust_decimal::Decimal;
    use shopwire_core::events::DomainEvent;
    use shopwire_revocation::InMemoryRevocationCache;

    fn delivery_for<E: DomainEvent>(event: &E) -> Delivery {
        Delivery {
            delivery_tag: 1,
            exchange: E::EXCHANGE.to_string(),
            routing_key: E::ROUTING_KEY.to_string(),
            payload: event.to_payload().unwrap(),
            message_id: Some(Uuid::new_v4().to_string()),
            redelivered: false,
        }
    }

    fn clock() -> Arc<dyn Clock> {
        Arc::new(shopwire_core::clock::SystemClock)
    }

    fn item_added(cart_id: Uuid, product_id: Uuid) -> CartItemAdded {
        CartItemAdded {
            cart_id,
            product_id,
            name: "Keyboard".to_string(),
            price: Decimal::new(4999, 2),
        }
    }

    fn seeded_cart(repository: &InMemoryCartRepository) -> Cart {
        let cart = Cart::new(Uuid::new_v4(), Uuid::new_v4(), chrono::Utc::now());
        repository.seed(cart.clone());
        cart
    }

    #[tokio::test]
    async fn duplicate_item_added_increments_one_line() {
        let repository = InMemoryCartRepository::new();
        let cart = seeded_cart(&repository);
        let product_id = Uuid::new_v4();
        let fixed = shopwire_testing::test_clock();
        let handler = CartItemAddedHandler::new(repository.clone(), Arc::new(fixed.clone()));

        let delivery = delivery_for(&item_added(cart.id, product_id));
        handler.handle(&delivery).await.unwrap();
        handler.handle(&delivery).await.unwrap();

        let stored = repository.get(cart.id).unwrap();
        assert_eq!(stored.items.len(), 1, "one line item, not two");
        assert_eq!(stored.items[0].quantity, 2);
        assert_eq!(stored.items[0].price, Decimal::new(4999, 2));
        assert_eq!(stored.updated_at, fixed.now());
    }

    #[tokio::test]
    async fn item_added_without_a_cart_is_not_found_and_harmless() {
        let repository = InMemoryCartRepository::new();
        let handler = CartItemAddedHandler::new(repository.clone(), clock());
        let cart_id = Uuid::new_v4();
        let product_id = Uuid::new_v4();

        let delivery = delivery_for(&item_added(cart_id, product_id));
        let outcome = handler.handle(&delivery).await;
        assert!(matches!(outcome, Err(HandlerError::NotFound(_))));
        assert!(repository.is_empty(), "no state left behind");

        // Once the cart exists (out-of-order resolved), the same event
        // applies cleanly.
        repository.seed(Cart::new(cart_id, Uuid::new_v4(), chrono::Utc::now()));
        handler.handle(&delivery).await.unwrap();
        assert_eq!(repository.get(cart_id).unwrap().items[0].quantity, 1);
    }

    #[tokio::test]
    async fn product_deleted_sweeps_every_cart_and_repeats_as_a_no_op() {
        let repository = InMemoryCartRepository::new();
        let first = seeded_cart(&repository);
        let second = seeded_cart(&repository);
        let product_id = Uuid::new_v4();
        let add = CartItemAddedHandler::new(repository.clone(), clock());
        add.handle(&delivery_for(&item_added(first.id, product_id)))
            .await
            .unwrap();
        add.handle(&delivery_for(&item_added(second.id, product_id)))
            .await
            .unwrap();

        let handler = ProductDeletedHandler::new(repository.clone(), clock());
        let delivery = delivery_for(&ProductDeleted {
            creator_id: Uuid::new_v4(),
            product_id,
        });

        handler.handle(&delivery).await.unwrap();
        assert!(repository.get(first.id).unwrap().items.is_empty());
        assert!(repository.get(second.id).unwrap().items.is_empty());

        let before = repository.get(first.id).unwrap();
        handler.handle(&delivery).await.unwrap();
        assert_eq!(
            repository.get(first.id).unwrap(),
            before,
            "second application must not touch the cart"
        );
    }

    async fn reply_capture() -> (shopwire_testing::InMemoryBroker, EventPublisher) {
        use shopwire_core::broker::BrokerChannel;
        use shopwire_core::topology::{
            CART_CREATED_KEY, ExchangeSpec, QueueSpec, Topology, USER_EXCHANGE,
        };

        let broker = shopwire_testing::InMemoryBroker::new();
        Topology::new()
            .exchange(ExchangeSpec::topic(USER_EXCHANGE))
            .queue(QueueSpec::durable("capture"))
            .bind("capture", USER_EXCHANGE, CART_CREATED_KEY)
            .declare(&broker)
            .await
            .unwrap();
        let channel: Arc<dyn BrokerChannel> = Arc::new(broker.clone());
        (broker, EventPublisher::new(channel))
    }

    fn user_created(user_id: Uuid) -> UserCreated {
        UserCreated {
            user_id,
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
        }
    }

    #[tokio::test]
    async fn user_created_creates_the_cart_and_replies() {
        let (broker, publisher) = reply_capture().await;
        let repository = InMemoryCartRepository::new();
        let handler = UserCreatedHandler::new(repository.clone(), publisher, clock());
        let user_id = Uuid::new_v4();

        handler
            .handle(&delivery_for(&user_created(user_id)))
            .await
            .unwrap();

        let cart = repository.get_by_user(user_id).expect("cart created");
        let replies = broker.buffered_payloads("capture");
        assert_eq!(replies.len(), 1);
        let reply = CartCreated::from_payload(&replies[0]).unwrap();
        assert_eq!(reply, CartCreated { user_id, cart_id: cart.id });
    }

    #[tokio::test]
    async fn duplicate_user_created_makes_no_second_cart_or_reply() {
        let (broker, publisher) = reply_capture().await;
        let repository = InMemoryCartRepository::new();
        let handler = UserCreatedHandler::new(repository.clone(), publisher, clock());
        let user_id = Uuid::new_v4();

        let delivery = delivery_for(&user_created(user_id));
        handler.handle(&delivery).await.unwrap();
        let first_cart = repository.get_by_user(user_id).unwrap();

        handler.handle(&delivery).await.unwrap();
        assert_eq!(repository.get_by_user(user_id).unwrap(), first_cart);
        assert_eq!(broker.buffered_payloads("capture").len(), 1);
    }

    #[tokio::test]
    async fn redelivered_user_created_reemits_the_reply() {
        let (broker, publisher) = reply_capture().await;
        let repository = InMemoryCartRepository::new();
        let handler = UserCreatedHandler::new(repository.clone(), publisher, clock());
        let user_id = Uuid::new_v4();

        handler
            .handle(&delivery_for(&user_created(user_id)))
            .await
            .unwrap();

        // A redelivery means the first attempt may have died between the
        // cart write and the reply; the reply must be re-emitted for the
        // (idempotent) identity handler.
        let mut redelivery = delivery_for(&user_created(user_id));
        redelivery.redelivered = true;
        handler.handle(&redelivery).await.unwrap();

        let cart_id = repository.get_by_user(user_id).unwrap().id;
        let replies = broker.buffered_payloads("capture");
        assert_eq!(replies.len(), 2);
        for payload in replies {
            assert_eq!(CartCreated::from_payload(&payload).unwrap().cart_id, cart_id);
        }
    }

    #[tokio::test]
    async fn user_deleted_removes_cart_and_revokes_token() {
        let repository = InMemoryCartRepository::new();
        let cart = seeded_cart(&repository);
        let cache = InMemoryRevocationCache::new();
        let handler = UserDeletedHandler::new(
            repository.clone(),
            cache.clone(),
            RevocationConfig::default(),
        );

        let delivery = delivery_for(&UserDeleted {
            cart_id: cart.id,
            revocation_token: "jwt.to.revoke".to_string(),
        });
        handler.handle(&delivery).await.unwrap();

        assert!(repository.get(cart.id).is_none());
        assert!(cache.is_revoked("jwt.to.revoke").await.unwrap());

        // Redelivery after a partial failure: both steps repeat safely.
        handler.handle(&delivery).await.unwrap();
        assert!(cache.is_revoked("jwt.to.revoke").await.unwrap());
    }
}
