//! PostgreSQL implementation of DeviceRepository

use async_trait::async_trait;
use sqlx::PgPool;
use std::net::IpAddr;
use tracing::instrument;

use chat_core::entities::Device;
use chat_core::traits::{DeviceRepository, RepoResult};
use chat_core::value_objects::ClientId;

use crate::models::DeviceModel;

use super::error::map_db_error;

/// PostgreSQL implementation of DeviceRepository
#[derive(Clone)]
pub struct PgDeviceRepository {
    pool: PgPool,
}

impl PgDeviceRepository {
    /// Create a new PgDeviceRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeviceRepository for PgDeviceRepository {
    #[instrument(skip(self))]
    async fn is_ip_verified(&self, ip: IpAddr) -> RepoResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM devices WHERE ip = $1)")
            .bind(ip.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)
    }

    #[instrument(skip(self))]
    async fn is_device_verified(&self, client_id: ClientId, ip: IpAddr) -> RepoResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM devices WHERE client_id = $1 AND ip = $2)",
        )
        .bind(client_id.into_inner())
        .bind(ip.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    #[instrument(skip(self, device), fields(client_id = %device.client_id, ip = %device.ip))]
    async fn register_device(&self, device: &Device) -> RepoResult<()> {
        sqlx::query(
            r"
            INSERT INTO devices (client_id, ip, info, logged_in_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (client_id, ip)
            DO UPDATE SET info = EXCLUDED.info, logged_in_at = EXCLUDED.logged_in_at
            ",
        )
        .bind(device.client_id.into_inner())
        .bind(device.ip.to_string())
        .bind(&device.info)
        .bind(device.logged_in_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn devices_of(&self, client_id: ClientId) -> RepoResult<Vec<Device>> {
        let rows = sqlx::query_as::<_, DeviceModel>(
            r"
            SELECT client_id, ip, info, logged_in_at
            FROM devices
            WHERE client_id = $1
            ORDER BY logged_in_at
            ",
        )
        .bind(client_id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        rows.into_iter().map(Device::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn logout(&self, client_id: ClientId, ip: IpAddr) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM devices WHERE client_id = $1 AND ip = $2")
            .bind(client_id.into_inner())
            .bind(ip.to_string())
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn logout_all_devices(&self, client_id: ClientId) -> RepoResult<u64> {
        let result = sqlx::query("DELETE FROM devices WHERE client_id = $1")
            .bind(client_id.into_inner())
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(result.rows_affected())
    }
}
