//! In-process implementation of the storage traits.
//!
//! Mirrors the constraints of the `PostgreSQL` schema (unique emails, one
//! line per product per cart, non-negative stock, ordered products cannot be
//! deleted) so services behave the same against either store.
//!
//! A [`MemoryUnitOfWork`] holds the store's lock for its whole lifetime and
//! works on a private copy of the state; commit swaps the copy in. Units of
//! work are therefore serialized, and nothing a unit does is visible before
//! commit. Do not call other store methods from the task that holds a unit of
//! work: they wait for the same lock.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use vidriera_core::{
    CartId, Email, OrderId, OrderNumber, OrderStatus, ProductId, Role, ShippingInfo, StatusEntry,
    UserId,
};

use super::{CartStore, CatalogStore, OrderStore, RepositoryError, Store, UnitOfWork, UserStore};
use crate::models::{Cart, CartLine, NewOrder, Order, Product, ProductDraft, ProductFilter, User};

/// Storage kept in process memory. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Clone, Default)]
struct Sequences {
    product: i32,
    user: i32,
    cart: i32,
    order: i32,
}

#[derive(Clone, Default)]
struct MemoryState {
    seq: Sequences,
    order_counter: i64,
    products: BTreeMap<ProductId, Product>,
    users: BTreeMap<UserId, User>,
    carts: BTreeMap<CartId, Cart>,
    orders: BTreeMap<OrderId, Order>,
}

impl MemoryState {
    fn create_cart(&mut self, user: UserId) -> Cart {
        self.seq.cart += 1;
        let cart = Cart {
            id: CartId::new(self.seq.cart),
            user_id: user,
            lines: Vec::new(),
        };
        self.carts.insert(cart.id, cart.clone());
        cart
    }

    fn user_mut(&mut self, id: UserId) -> Result<&mut User, RepositoryError> {
        self.users.get_mut(&id).ok_or(RepositoryError::NotFound)
    }

    fn product_is_ordered(&self, id: ProductId) -> bool {
        self.orders
            .values()
            .any(|order| order.lines.iter().any(|line| line.product_id == id))
    }
}

/// Newest first, matching the `PostgreSQL` ordering.
fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    orders
}

fn product_from_draft(id: ProductId, draft: &ProductDraft, created_at: chrono::DateTime<Utc>) -> Product {
    Product {
        id,
        brand: draft.brand.clone(),
        model: draft.model.clone(),
        category: draft.category.clone(),
        size: draft.size,
        base_price: draft.base_price,
        offer_price: draft.offer_price,
        description: draft.description.clone(),
        color: draft.color.clone(),
        stock: draft.stock,
        images: draft.images.clone(),
        created_at,
        updated_at: Utc::now(),
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CatalogStore for MemoryStore {
    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let state = self.state.lock().await;
        let category = filter.category();
        let needle = filter.search_term();
        Ok(state
            .products
            .values()
            .filter(|p| category.is_none_or(|c| p.category == c))
            .filter(|p| needle.as_deref().is_none_or(|n| p.matches_search(n)))
            .cloned()
            .collect())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .products
            .values()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn create_product(&self, draft: &ProductDraft) -> Result<Product, RepositoryError> {
        let mut state = self.state.lock().await;
        state.seq.product += 1;
        let product = product_from_draft(ProductId::new(state.seq.product), draft, Utc::now());
        state.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn update_product(
        &self,
        id: ProductId,
        draft: &ProductDraft,
    ) -> Result<Product, RepositoryError> {
        let mut state = self.state.lock().await;
        let existing = state.products.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        *existing = product_from_draft(id, draft, existing.created_at);
        Ok(existing.clone())
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        if !state.products.contains_key(&id) {
            return Err(RepositoryError::NotFound);
        }
        if state.product_is_ordered(id) {
            return Err(RepositoryError::Conflict("product has been ordered".into()));
        }
        state.products.remove(&id);
        for cart in state.carts.values_mut() {
            cart.lines.retain(|line| line.product_id != id);
        }
        Ok(())
    }
}

impl CartStore for MemoryStore {
    async fn cart_for_user(&self, user: UserId) -> Result<Option<Cart>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.carts.values().find(|c| c.user_id == user).cloned())
    }

    async fn ensure_cart(&self, user: UserId) -> Result<Cart, RepositoryError> {
        let mut state = self.state.lock().await;
        if !state.users.contains_key(&user) {
            return Err(RepositoryError::NotFound);
        }
        if let Some(cart) = state.carts.values().find(|c| c.user_id == user) {
            return Ok(cart.clone());
        }
        Ok(state.create_cart(user))
    }

    async fn upsert_line(&self, cart: CartId, line: CartLine) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        if !state.products.contains_key(&line.product_id) {
            return Err(RepositoryError::Conflict("save cart line: product missing".into()));
        }
        let cart = state
            .carts
            .get_mut(&cart)
            .ok_or_else(|| RepositoryError::Conflict("save cart line: cart missing".into()))?;

        match cart.lines.binary_search_by_key(&line.product_id, |l| l.product_id) {
            Ok(pos) => {
                if let Some(existing) = cart.lines.get_mut(pos) {
                    *existing = line;
                }
            }
            Err(pos) => cart.lines.insert(pos, line),
        }
        Ok(())
    }

    async fn delete_line(&self, cart: CartId, product: ProductId) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        let Some(cart) = state.carts.get_mut(&cart) else {
            return Ok(false);
        };
        let before = cart.lines.len();
        cart.lines.retain(|line| line.product_id != product);
        Ok(cart.lines.len() != before)
    }

    async fn clear_lines(&self, cart: CartId) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        if let Some(cart) = state.carts.get_mut(&cart) {
            cart.lines.clear();
        }
        Ok(())
    }
}

impl UserStore for MemoryStore {
    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .find(|u| u.google_id.as_deref() == Some(google_id))
            .cloned())
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|u| &u.email == email).cloned())
    }

    async fn create_user(
        &self,
        email: &Email,
        google_id: Option<&str>,
        role: Role,
    ) -> Result<User, RepositoryError> {
        let mut state = self.state.lock().await;
        let taken = state.users.values().any(|u| {
            &u.email == email || (google_id.is_some() && u.google_id.as_deref() == google_id)
        });
        if taken {
            return Err(RepositoryError::Conflict("user already exists".into()));
        }

        state.seq.user += 1;
        let now = Utc::now();
        let user = User {
            id: UserId::new(state.seq.user),
            email: email.clone(),
            google_id: google_id.map(str::to_owned),
            role,
            shipping: ShippingInfo::default(),
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());
        state.create_cart(user.id);
        Ok(user)
    }

    async fn link_google_id(&self, id: UserId, google_id: &str) -> Result<User, RepositoryError> {
        let mut state = self.state.lock().await;
        let taken = state
            .users
            .values()
            .any(|u| u.id != id && u.google_id.as_deref() == Some(google_id));
        if taken {
            return Err(RepositoryError::Conflict("google account already linked".into()));
        }
        let user = state.user_mut(id)?;
        user.google_id = Some(google_id.to_owned());
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn set_role(&self, id: UserId, role: Role) -> Result<User, RepositoryError> {
        let mut state = self.state.lock().await;
        let user = state.user_mut(id)?;
        user.role = role;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn update_shipping(
        &self,
        id: UserId,
        shipping: &ShippingInfo,
    ) -> Result<User, RepositoryError> {
        let mut state = self.state.lock().await;
        let user = state.user_mut(id)?;
        user.shipping = ShippingInfo {
            tracking_number: None,
            shipping_company: None,
            ..shipping.clone()
        };
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn list_users(&self) -> Result<Vec<User>, RepositoryError> {
        Ok(self.state.lock().await.users.values().cloned().collect())
    }

    async fn delete_user(&self, id: UserId) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        if !state.users.contains_key(&id) {
            return Err(RepositoryError::NotFound);
        }
        if state.orders.values().any(|o| o.user_id == id) {
            return Err(RepositoryError::Conflict("user has orders".into()));
        }
        state.users.remove(&id);
        state.carts.retain(|_, cart| cart.user_id != id);
        Ok(())
    }
}

impl OrderStore for MemoryStore {
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn orders_for_user(&self, user: UserId) -> Result<Vec<Order>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(newest_first(
            state
                .orders
                .values()
                .filter(|o| o.user_id == user)
                .cloned()
                .collect(),
        ))
    }

    async fn all_orders(&self) -> Result<Vec<Order>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(newest_first(state.orders.values().cloned().collect()))
    }

    async fn append_status(
        &self,
        id: OrderId,
        entry: StatusEntry,
        tracking_number: Option<&str>,
        shipping_company: Option<&str>,
    ) -> Result<Order, RepositoryError> {
        let mut state = self.state.lock().await;
        let order = state.orders.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        order.history.push(entry);
        if let Some(tracking) = tracking_number {
            order.shipping.tracking_number = Some(tracking.to_owned());
        }
        if let Some(company) = shipping_company {
            order.shipping.shipping_company = Some(company.to_owned());
        }
        Ok(order.clone())
    }
}

impl Store for MemoryStore {
    type Tx = MemoryUnitOfWork;

    async fn begin(&self) -> Result<MemoryUnitOfWork, RepositoryError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let staged = guard.clone();
        Ok(MemoryUnitOfWork { guard, staged })
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

/// Unit of work over a private copy of the store state.
pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

impl UnitOfWork for MemoryUnitOfWork {
    async fn reserve_stock(&mut self, product: ProductId, quantity: i32) -> Result<bool, RepositoryError> {
        match self.staged.products.get_mut(&product) {
            Some(p) if p.stock >= quantity => {
                p.stock -= quantity;
                p.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn next_order_number(&mut self) -> Result<OrderNumber, RepositoryError> {
        self.staged.order_counter += 1;
        Ok(OrderNumber::new(self.staged.order_counter))
    }

    async fn insert_order(&mut self, order: &NewOrder) -> Result<Order, RepositoryError> {
        if !self.staged.users.contains_key(&order.user_id) {
            return Err(RepositoryError::Conflict("insert order: user missing".into()));
        }
        if self.staged.orders.values().any(|o| o.number == order.number) {
            return Err(RepositoryError::Conflict("insert order: duplicate number".into()));
        }

        self.staged.seq.order += 1;
        let stored = Order {
            id: OrderId::new(self.staged.seq.order),
            number: order.number,
            user_id: order.user_id,
            lines: order.lines.clone(),
            shipping: order.shipping.clone(),
            total: order.total(),
            payment_method: order.payment_method,
            history: vec![StatusEntry {
                status: OrderStatus::Created,
                timestamp: order.placed_at,
            }],
            created_at: order.placed_at,
        };
        self.staged.orders.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn take_cart_lines(&mut self, cart: CartId) -> Result<Vec<CartLine>, RepositoryError> {
        Ok(self
            .staged
            .carts
            .get_mut(&cart)
            .map(|cart| std::mem::take(&mut cart.lines))
            .unwrap_or_default())
    }

    async fn commit(self) -> Result<(), RepositoryError> {
        let Self { mut guard, staged } = self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn draft(stock: i32) -> ProductDraft {
        ProductDraft {
            brand: "Philips".into(),
            model: "HD9200".into(),
            category: "cocina".into(),
            size: Decimal::new(41, 1),
            base_price: Decimal::new(120_000, 0),
            offer_price: None,
            description: "Freidora de aire".into(),
            color: "negro".into(),
            stock,
            images: vec!["https://cdn.tienda.com.ar/hd9200.jpg".into()],
        }
    }

    #[tokio::test]
    async fn test_uncommitted_unit_of_work_changes_nothing() {
        let store = MemoryStore::new();
        let product = store.create_product(&draft(3)).await.unwrap();

        {
            let mut tx = store.begin().await.unwrap();
            assert!(tx.reserve_stock(product.id, 2).await.unwrap());
            assert_eq!(tx.next_order_number().await.unwrap(), OrderNumber::new(1));
        }

        let after = store.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(after.stock, 3);

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.next_order_number().await.unwrap(), OrderNumber::new(1));
        tx.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_reserve_refuses_short_stock() {
        let store = MemoryStore::new();
        let product = store.create_product(&draft(1)).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(!tx.reserve_stock(product.id, 2).await.unwrap());
        assert!(tx.reserve_stock(product.id, 1).await.unwrap());
        assert!(!tx.reserve_stock(product.id, 1).await.unwrap());
        tx.commit().await.unwrap();

        assert_eq!(store.get_product(product.id).await.unwrap().unwrap().stock, 0);
    }

    #[tokio::test]
    async fn test_taking_cart_lines_is_staged_until_commit() {
        let store = MemoryStore::new();
        let product = store.create_product(&draft(5)).await.unwrap();
        let user = store
            .create_user(&Email::parse("sol@tienda.com.ar").unwrap(), None, Role::User)
            .await
            .unwrap();
        let cart = store.ensure_cart(user.id).await.unwrap();
        let line = CartLine {
            product_id: product.id,
            quantity: 2,
            price: Decimal::ONE,
        };
        store.upsert_line(cart.id, line).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.take_cart_lines(cart.id).await.unwrap(), vec![line]);
        tx.rollback().await.unwrap();
        assert_eq!(store.cart_for_user(user.id).await.unwrap().unwrap().lines, vec![line]);

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.take_cart_lines(cart.id).await.unwrap(), vec![line]);
        tx.commit().await.unwrap();

        // A second unit finds the cart already taken.
        let mut tx = store.begin().await.unwrap();
        assert!(tx.take_cart_lines(cart.id).await.unwrap().is_empty());
        tx.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_create_user_creates_cart_and_rejects_duplicates() {
        let store = MemoryStore::new();
        let email = Email::parse("ana@tienda.com.ar").unwrap();
        let user = store.create_user(&email, Some("g-1"), Role::User).await.unwrap();

        let cart = store.cart_for_user(user.id).await.unwrap().unwrap();
        assert!(cart.is_empty());

        let dup = store.create_user(&email, None, Role::User).await;
        assert!(matches!(dup, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_cart_lines_stay_sorted_and_unique() {
        let store = MemoryStore::new();
        let a = store.create_product(&draft(5)).await.unwrap();
        let b = store.create_product(&draft(5)).await.unwrap();
        let user = store
            .create_user(&Email::parse("leo@tienda.com.ar").unwrap(), None, Role::User)
            .await
            .unwrap();
        let cart = store.ensure_cart(user.id).await.unwrap();

        let line = |product_id, quantity| CartLine {
            product_id,
            quantity,
            price: Decimal::ONE,
        };
        store.upsert_line(cart.id, line(b.id, 1)).await.unwrap();
        store.upsert_line(cart.id, line(a.id, 1)).await.unwrap();
        store.upsert_line(cart.id, line(b.id, 4)).await.unwrap();

        let cart = store.cart_for_user(user.id).await.unwrap().unwrap();
        let lines: Vec<_> = cart.lines.iter().map(|l| (l.product_id, l.quantity)).collect();
        assert_eq!(lines, vec![(a.id, 1), (b.id, 4)]);
    }
}
