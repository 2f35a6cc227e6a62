//! Catalog service.

use tracing::instrument;

use vidriera_core::ProductId;

use super::{Action, Resource, ShopError, authorize};
use crate::db::{CatalogStore, RepositoryError};
use crate::models::{CurrentUser, Product, ProductDraft, ProductFilter};

pub struct CatalogService<'a, S> {
    store: &'a S,
}

impl<'a, S: CatalogStore + Sync> CatalogService<'a, S> {
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// # Errors
    ///
    /// Returns `ShopError::Internal` if storage fails.
    pub async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>, ShopError> {
        Ok(self.store.list_products(filter).await?)
    }

    /// # Errors
    ///
    /// Returns `ShopError::NotFound` if the product does not exist.
    pub async fn get(&self, id: ProductId) -> Result<Product, ShopError> {
        self.store
            .get_product(id)
            .await?
            .ok_or(ShopError::NotFound("product"))
    }

    /// # Errors
    ///
    /// Returns `ShopError::Forbidden` for non-admins and
    /// `ShopError::InvalidProduct` for an invalid draft.
    #[instrument(skip(self, actor, draft), fields(user_id = %actor.id))]
    pub async fn create(&self, actor: &CurrentUser, draft: ProductDraft) -> Result<Product, ShopError> {
        authorize(actor, Action::Edit, Resource::Catalog)?;
        let draft = draft.validated().map_err(ShopError::InvalidProduct)?;
        let product = self.store.create_product(&draft).await?;
        tracing::info!(product_id = %product.id, "Product created");
        Ok(product)
    }

    /// Replace a product's fields. Cart lines keep the price they captured.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::NotFound` if the product does not exist.
    #[instrument(skip(self, actor, draft), fields(user_id = %actor.id))]
    pub async fn update(
        &self,
        actor: &CurrentUser,
        id: ProductId,
        draft: ProductDraft,
    ) -> Result<Product, ShopError> {
        authorize(actor, Action::Edit, Resource::Catalog)?;
        let draft = draft.validated().map_err(ShopError::InvalidProduct)?;
        match self.store.update_product(id, &draft).await {
            Ok(product) => Ok(product),
            Err(RepositoryError::NotFound) => Err(ShopError::NotFound("product")),
            Err(e) => Err(e.into()),
        }
    }

    /// # Errors
    ///
    /// Returns `ShopError::NotFound` if the product does not exist and
    /// `ShopError::Conflict` if it appears in any order.
    #[instrument(skip(self, actor), fields(user_id = %actor.id))]
    pub async fn delete(&self, actor: &CurrentUser, id: ProductId) -> Result<(), ShopError> {
        authorize(actor, Action::Delete, Resource::Catalog)?;
        match self.store.delete_product(id).await {
            Ok(()) => {
                tracing::info!("Product deleted");
                Ok(())
            }
            Err(RepositoryError::NotFound) => Err(ShopError::NotFound("product")),
            Err(e) => Err(e.into()),
        }
    }
}
