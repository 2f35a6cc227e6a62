//! User repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use vidriera_core::{Email, Role, ShippingInfo, UserId};

use super::{RepositoryError, classify};
use crate::models::User;

const USER_COLUMNS: &str = "id, email, google_id, role, shipping_name, shipping_surname, \
     shipping_province, shipping_city, shipping_street, shipping_number, \
     shipping_postal_code, shipping_phone, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    email: String,
    google_id: Option<String>,
    role: String,
    shipping_name: String,
    shipping_surname: String,
    shipping_province: String,
    shipping_city: String,
    shipping_street: String,
    shipping_number: String,
    shipping_postal_code: String,
    shipping_phone: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        let role = row
            .role
            .parse::<Role>()
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;

        Ok(Self {
            id: row.id,
            email,
            google_id: row.google_id,
            role,
            shipping: ShippingInfo {
                name: row.shipping_name,
                surname: row.shipping_surname,
                province: row.shipping_province,
                city: row.shipping_city,
                street: row.shipping_street,
                number: row.shipping_number,
                postal_code: row.shipping_postal_code,
                phone: row.shipping_phone,
                tracking_number: None,
                shipping_company: None,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_user(row: Option<UserRow>) -> Result<Option<User>, RepositoryError> {
    row.map(User::try_from).transpose()
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM storefront.user WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        into_user(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_google_id(&self, google_id: &str) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM storefront.user WHERE google_id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(google_id)
            .fetch_optional(self.pool)
            .await?;
        into_user(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM storefront.user WHERE email = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email.as_str())
            .fetch_optional(self.pool)
            .await?;
        into_user(row)
    }

    /// Create a user and their empty cart in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email or Google id already exists.
    pub async fn create(
        &self,
        email: &Email,
        google_id: Option<&str>,
        role: Role,
    ) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO storefront.user (email, google_id, role)
             VALUES ($1, $2, $3)
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email.as_str())
            .bind(google_id)
            .bind(role.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| classify(e, "user already exists"))?;

        sqlx::query("INSERT INTO storefront.cart (user_id) VALUES ($1)")
            .bind(row.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        row.try_into()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns `RepositoryError::Conflict` if the Google id belongs to another user.
    pub async fn link_google_id(&self, id: UserId, google_id: &str) -> Result<User, RepositoryError> {
        let sql = format!(
            "UPDATE storefront.user SET google_id = $2, updated_at = now()
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(google_id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| classify(e, "google account already linked"))?;
        into_user(row)?.ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn set_role(&self, id: UserId, role: Role) -> Result<User, RepositoryError> {
        let sql = format!(
            "UPDATE storefront.user SET role = $2, updated_at = now()
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(role.as_str())
            .fetch_optional(self.pool)
            .await?;
        into_user(row)?.ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn update_shipping(
        &self,
        id: UserId,
        shipping: &ShippingInfo,
    ) -> Result<User, RepositoryError> {
        let sql = format!(
            "UPDATE storefront.user
             SET shipping_name = $2, shipping_surname = $3, shipping_province = $4,
                 shipping_city = $5, shipping_street = $6, shipping_number = $7,
                 shipping_postal_code = $8, shipping_phone = $9, updated_at = now()
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(&shipping.name)
            .bind(&shipping.surname)
            .bind(&shipping.province)
            .bind(&shipping.city)
            .bind(&shipping.street)
            .bind(&shipping.number)
            .bind(&shipping.postal_code)
            .bind(&shipping.phone)
            .fetch_optional(self.pool)
            .await?;
        into_user(row)?.ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if any stored row is invalid.
    pub async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM storefront.user ORDER BY id");
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(self.pool)
            .await?;
        rows.into_iter().map(User::try_from).collect()
    }

    /// The cart goes with the user (`ON DELETE CASCADE`).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns `RepositoryError::Conflict` if the user has orders.
    pub async fn delete(&self, id: UserId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.user WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| classify(e, "user has orders"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
