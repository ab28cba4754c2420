//! Device registry CRUD operations

use crate::error::AppError;
use crate::models::Device;

use super::SqliteDb;

impl SqliteDb {
    /// Get all registered devices ordered by name
    pub async fn list_devices(&self) -> Result<Vec<Device>, AppError> {
        let devices = sqlx::query_as::<_, Device>(
            r#"
            SELECT id, name, location
            FROM devices
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(devices)
    }

    /// Get a single device by ID
    pub async fn get_device(&self, id: &str) -> Result<Option<Device>, AppError> {
        let device = sqlx::query_as::<_, Device>(
            r#"
            SELECT id, name, location
            FROM devices
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(device)
    }

    /// Insert a device, replacing any existing row with the same ID
    pub async fn upsert_device(
        &self,
        id: &str,
        name: &str,
        location: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO devices (id, name, location)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(location)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Delete a device
    pub async fn delete_device(&self, id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM devices WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_and_list_ordered_by_name() {
        let db = SqliteDb::connect_in_memory().await;

        db.upsert_device("b", "Zulu Pump", "shed").await.unwrap();
        db.upsert_device("a", "Alpha Pump", "").await.unwrap();

        let devices = db.list_devices().await.unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].name, "Alpha Pump");
        assert_eq!(devices[1].name, "Zulu Pump");
        assert_eq!(devices[0].location, "");
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing() {
        let db = SqliteDb::connect_in_memory().await;

        db.upsert_device("d1", "Old Name", "").await.unwrap();
        db.upsert_device("d1", "New Name", "barn").await.unwrap();

        let devices = db.list_devices().await.unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].name, "New Name");
        assert_eq!(devices[0].location, "barn");
    }

    #[tokio::test]
    async fn test_get_and_delete() {
        let db = SqliteDb::connect_in_memory().await;

        db.upsert_device("d1", "Pump", "").await.unwrap();
        assert!(db.get_device("d1").await.unwrap().is_some());
        assert!(db.get_device("missing").await.unwrap().is_none());

        assert!(db.delete_device("d1").await.unwrap());
        assert!(!db.delete_device("d1").await.unwrap());
        assert!(db.get_device("d1").await.unwrap().is_none());
    }
}
