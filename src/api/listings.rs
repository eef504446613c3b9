//! Read-side queries behind the listing and dashboard views.

use tracing::debug;

use super::client::GatewayClient;
use super::operations::{
    BookingSummary, BookingsByUser, IdVariables, ManagedProperty, MyProperties, NoVariables, Properties,
    PropertiesVariables, Property, PropertyDetail, PropertySummary,
};
use crate::error::{AppError, AppResult};
use crate::identity::AuthController;

#[derive(Clone)]
pub struct Catalog {
    gateway: GatewayClient,
    auth: AuthController,
}

impl Catalog {
    pub fn new(gateway: GatewayClient, auth: AuthController) -> Self { Self { gateway, auth } }

    /// Public search; results are cached until the next credential change.
    pub async fn properties(&self, filter: &PropertiesVariables) -> AppResult<Vec<PropertySummary>> {
        if let Some(max) = filter.max_price {
            if max < 0 {
                return Err(AppError::validation("invalid_max_price", "Maximum price cannot be negative"));
            }
        }
        let found = self.gateway.query_cached::<Properties>(filter).await?;
        debug!(target: "gateway", count = found.len(), location = filter.location.as_deref().unwrap_or("-"), "properties");
        Ok(found)
    }

    pub async fn property(&self, id: &str) -> AppResult<PropertyDetail> {
        let id = id.trim();
        if id.is_empty() {
            return Err(AppError::validation("empty_property_id", "Property id is required"));
        }
        self.gateway
            .query_cached::<Property>(&IdVariables { id: id.to_string() })
            .await?
            .ok_or_else(|| AppError::business("property_not_found", "Property not found"))
    }

    /// The signed-in traveler's bookings with their payment reference and status.
    pub async fn my_bookings(&self) -> AppResult<Vec<BookingSummary>> {
        let result = self.gateway.execute::<BookingsByUser>(&NoVariables {}).await;
        self.auth.intercept_auth(result)
    }

    pub async fn my_properties(&self) -> AppResult<Vec<ManagedProperty>> {
        let result = self.gateway.execute::<MyProperties>(&NoVariables {}).await;
        self.auth.intercept_auth(result)
    }
}
