use crate::{
    db::DbPool,
    entities::{
        client::{self, Entity as ClientEntity},
        product::{self, Entity as ProductEntity},
    },
    errors::ServiceError,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Client contact data copied onto quotes and delivery notes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
pub struct ClientSnapshot {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
}

impl From<client::Model> for ClientSnapshot {
    fn from(client: client::Model) -> Self {
        Self {
            name: client.name,
            email: client.email,
            phone: client.phone,
            city: client.city,
            address: client.address,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub code: Option<String>,
    pub description: Option<String>,
    pub price: Decimal,
    #[validate(range(min = 0))]
    pub stock: i32,
}

#[derive(Clone)]
pub struct ClientService {
    db_pool: Arc<DbPool>,
}

impl ClientService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self, snapshot), fields(name = %snapshot.name))]
    pub async fn create(&self, snapshot: ClientSnapshot) -> Result<client::Model, ServiceError> {
        snapshot.validate()?;

        let model = client::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(snapshot.name),
            email: Set(snapshot.email),
            phone: Set(snapshot.phone),
            city: Set(snapshot.city),
            address: Set(snapshot.address),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db_pool)
        .await?;

        info!(client_id = %model.id, "client created");
        Ok(model)
    }

    pub async fn get(&self, id: Uuid) -> Result<client::Model, ServiceError> {
        Self::get_in(&*self.db_pool, id).await
    }

    pub async fn get_in<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<client::Model, ServiceError> {
        ClientEntity::find_by_id(id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Client", id))
    }
}

#[derive(Clone)]
pub struct ProductService {
    db_pool: Arc<DbPool>,
}

impl ProductService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create(&self, request: CreateProductRequest) -> Result<product::Model, ServiceError> {
        request.validate()?;
        if request.price.is_sign_negative() {
            return Err(ServiceError::ValidationError(
                "price must not be negative".to_string(),
            ));
        }

        let now = Utc::now();
        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            code: Set(request.code),
            description: Set(request.description),
            price: Set(request.price),
            stock: Set(request.stock),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db_pool)
        .await?;

        info!(product_id = %model.id, stock = model.stock, "product created");
        Ok(model)
    }

    pub async fn get(&self, id: Uuid) -> Result<product::Model, ServiceError> {
        Self::get_in(&*self.db_pool, id).await
    }

    pub async fn get_in<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<product::Model, ServiceError> {
        ProductEntity::find_by_id(id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product", id))
    }
}
