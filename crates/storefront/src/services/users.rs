//! User directory.

use tracing::instrument;

use vidriera_core::{Email, Role, ShippingInfo, UserId};

use super::{Action, Resource, ShopError, authorize};
use crate::db::{RepositoryError, UserStore};
use crate::models::{CurrentUser, ProfileUpdate, User};

pub struct UserService<'a, S> {
    store: &'a S,
}

impl<'a, S: UserStore + Sync> UserService<'a, S> {
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Resolve a Google sign-in to an account.
    ///
    /// Matches by Google subject first, then by email (linking the subject
    /// to the existing account), and otherwise registers a new user with an
    /// empty cart.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::Internal` if storage fails.
    #[instrument(skip(self, email), fields(email = %email))]
    pub async fn find_or_create_google(&self, google_id: &str, email: &Email) -> Result<User, ShopError> {
        if let Some(user) = self.store.find_by_google_id(google_id).await? {
            return Ok(user);
        }
        if let Some(user) = self.store.find_by_email(email).await? {
            tracing::info!(user_id = %user.id, "Linking Google account to existing user");
            return Ok(self.store.link_google_id(user.id, google_id).await?);
        }

        match self.store.create_user(email, Some(google_id), Role::User).await {
            Ok(user) => {
                tracing::info!(user_id = %user.id, "User registered");
                Ok(user)
            }
            // A concurrent callback for the same account registered it first.
            Err(RepositoryError::Conflict(_)) => self
                .store
                .find_by_google_id(google_id)
                .await?
                .ok_or_else(|| ShopError::Conflict("account registration raced".into())),
            Err(e) => Err(e.into()),
        }
    }

    /// # Errors
    ///
    /// Returns `ShopError::Forbidden` unless the actor is the user or an
    /// admin, and `ShopError::NotFound` if the user does not exist.
    pub async fn get(&self, actor: &CurrentUser, id: UserId) -> Result<User, ShopError> {
        authorize(actor, Action::View, Resource::User(id))?;
        self.user(id).await
    }

    /// # Errors
    ///
    /// Returns `ShopError::Forbidden` for non-admins.
    pub async fn list(&self, actor: &CurrentUser) -> Result<Vec<User>, ShopError> {
        authorize(actor, Action::View, Resource::AllUsers)?;
        Ok(self.store.list_users().await?)
    }

    /// Merge a partial edit into the actor's saved shipping profile.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::NotFound` if the account no longer exists.
    #[instrument(skip(self, actor, update), fields(user_id = %actor.id))]
    pub async fn update_profile(&self, actor: &CurrentUser, update: ProfileUpdate) -> Result<User, ShopError> {
        authorize(actor, Action::Edit, Resource::User(actor.id))?;
        let current = self.user(actor.id).await?;
        let shipping = update.apply(&current.shipping);
        self.save_shipping(actor.id, &shipping).await
    }

    /// Replace the actor's saved shipping profile with a complete one.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::IncompleteShippingInfo` if any required field is
    /// blank.
    #[instrument(skip(self, actor, shipping), fields(user_id = %actor.id))]
    pub async fn update_shipping(&self, actor: &CurrentUser, shipping: ShippingInfo) -> Result<User, ShopError> {
        authorize(actor, Action::Edit, Resource::User(actor.id))?;
        let shipping = shipping.trimmed();
        let missing = shipping.missing_fields();
        if !missing.is_empty() {
            return Err(ShopError::IncompleteShippingInfo { missing });
        }
        self.save_shipping(actor.id, &shipping).await
    }

    /// # Errors
    ///
    /// - `ShopError::Forbidden` for non-admins
    /// - `ShopError::NotFound` if the user does not exist
    /// - `ShopError::Conflict` if the user has placed orders
    #[instrument(skip(self, actor), fields(user_id = %actor.id))]
    pub async fn delete(&self, actor: &CurrentUser, id: UserId) -> Result<(), ShopError> {
        authorize(actor, Action::Delete, Resource::User(id))?;
        match self.store.delete_user(id).await {
            Ok(()) => {
                tracing::info!(deleted = %id, "User deleted");
                Ok(())
            }
            Err(RepositoryError::NotFound) => Err(ShopError::NotFound("user")),
            Err(e) => Err(e.into()),
        }
    }

    /// Set the role of the account registered under `email`.
    ///
    /// Operator path used by the CLI; no actor is involved.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::NotFound` if no account uses `email`.
    pub async fn set_role_by_email(&self, email: &Email, role: Role) -> Result<User, ShopError> {
        let user = self
            .store
            .find_by_email(email)
            .await?
            .ok_or(ShopError::NotFound("user"))?;
        let user = self.store.set_role(user.id, role).await?;
        tracing::info!(user_id = %user.id, ?role, "Role updated");
        Ok(user)
    }

    async fn user(&self, id: UserId) -> Result<User, ShopError> {
        self.store
            .get_user(id)
            .await?
            .ok_or(ShopError::NotFound("user"))
    }

    async fn save_shipping(&self, id: UserId, shipping: &ShippingInfo) -> Result<User, ShopError> {
        match self.store.update_shipping(id, shipping).await {
            Ok(user) => Ok(user),
            Err(RepositoryError::NotFound) => Err(ShopError::NotFound("user")),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::{CartStore, MemoryStore};

    async fn account(store: &MemoryStore, email: &str, role: Role) -> CurrentUser {
        store
            .create_user(&Email::parse(email).unwrap(), None, role)
            .await
            .unwrap()
            .session_identity()
    }

    #[tokio::test]
    async fn test_find_or_create_google_links_by_email() {
        let store = MemoryStore::new();
        let users = UserService::new(&store);
        let email = Email::parse("ana@tienda.com.ar").unwrap();

        let created = users.find_or_create_google("sub-1", &email).await.unwrap();
        assert_eq!(created.google_id.as_deref(), Some("sub-1"));
        assert_eq!(created.role, Role::User);
        assert!(store.cart_for_user(created.id).await.unwrap().is_some());

        let again = users.find_or_create_google("sub-1", &email).await.unwrap();
        assert_eq!(again.id, created.id);

        let operator = Email::parse("ops@tienda.com.ar").unwrap();
        let existing = store.create_user(&operator, None, Role::Admin).await.unwrap();
        let linked = users.find_or_create_google("sub-2", &operator).await.unwrap();
        assert_eq!(linked.id, existing.id);
        assert_eq!(linked.google_id.as_deref(), Some("sub-2"));
        assert!(linked.role.is_admin());
    }

    #[tokio::test]
    async fn test_users_see_only_themselves() {
        let store = MemoryStore::new();
        let ana = account(&store, "ana@tienda.com.ar", Role::User).await;
        let beto = account(&store, "beto@tienda.com.ar", Role::User).await;
        let admin = account(&store, "admin@tienda.com.ar", Role::Admin).await;
        let users = UserService::new(&store);

        assert_eq!(users.get(&ana, ana.id).await.unwrap().email, ana.email);
        assert!(matches!(users.get(&ana, beto.id).await, Err(ShopError::Forbidden)));
        assert!(matches!(users.list(&ana).await, Err(ShopError::Forbidden)));
        assert_eq!(users.list(&admin).await.unwrap().len(), 3);
        assert!(matches!(
            users.get(&admin, UserId::new(404)).await,
            Err(ShopError::NotFound("user"))
        ));
    }

    #[tokio::test]
    async fn test_profile_update_merges_fields() {
        let store = MemoryStore::new();
        let ana = account(&store, "ana@tienda.com.ar", Role::User).await;
        let users = UserService::new(&store);

        users
            .update_profile(
                &ana,
                ProfileUpdate {
                    name: Some("Ana".into()),
                    ..ProfileUpdate::default()
                },
            )
            .await
            .unwrap();
        let user = users
            .update_profile(
                &ana,
                ProfileUpdate {
                    city: Some("Rosario".into()),
                    ..ProfileUpdate::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(user.shipping.name, "Ana");
        assert_eq!(user.shipping.city, "Rosario");
    }

    #[tokio::test]
    async fn test_update_shipping_requires_complete_info() {
        let store = MemoryStore::new();
        let ana = account(&store, "ana@tienda.com.ar", Role::User).await;
        let users = UserService::new(&store);

        let partial = ShippingInfo {
            name: "Ana".into(),
            ..ShippingInfo::default()
        };
        match users.update_shipping(&ana, partial).await {
            Err(ShopError::IncompleteShippingInfo { missing }) => {
                assert!(missing.contains(&"surname"));
                assert!(!missing.contains(&"name"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_only_admin_deletes() {
        let store = MemoryStore::new();
        let ana = account(&store, "ana@tienda.com.ar", Role::User).await;
        let admin = account(&store, "admin@tienda.com.ar", Role::Admin).await;
        let users = UserService::new(&store);

        assert!(matches!(users.delete(&ana, ana.id).await, Err(ShopError::Forbidden)));
        users.delete(&admin, ana.id).await.unwrap();
        assert!(matches!(
            users.delete(&admin, ana.id).await,
            Err(ShopError::NotFound("user"))
        ));
    }

    #[tokio::test]
    async fn test_set_role_by_email() {
        let store = MemoryStore::new();
        let ana = account(&store, "ana@tienda.com.ar", Role::User).await;
        let users = UserService::new(&store);

        let promoted = users.set_role_by_email(&ana.email, Role::Admin).await.unwrap();
        assert!(promoted.role.is_admin());

        let missing = Email::parse("nadie@tienda.com.ar").unwrap();
        assert!(matches!(
            users.set_role_by_email(&missing, Role::Admin).await,
            Err(ShopError::NotFound("user"))
        ));
    }
}
