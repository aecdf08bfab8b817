//! Postgres gateway.
//!
//! Writes run inside a transaction that is committed on success; any error
//! drops the transaction, which rolls it back.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::{debug, info, instrument};

use crate::clock::Clock;
use crate::config::DatabaseConfig;
use crate::models::{ActuationEvent, Prediction, SensorRecord, TriggerSource};
use crate::persistence::{PersistenceError, PersistenceGateway, PersistenceResult};

const SCHEMA: [&str; 6] = [
    r#"
    CREATE TABLE IF NOT EXISTS sensor_readings (
        id BIGSERIAL PRIMARY KEY,
        plant_id TEXT NOT NULL,
        timestamp TIMESTAMPTZ NOT NULL,
        temperature DOUBLE PRECISION,
        humidity DOUBLE PRECISION,
        soil_moisture DOUBLE PRECISION,
        light_level DOUBLE PRECISION,
        pressure DOUBLE PRECISION
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_sensor_readings_plant_ts ON sensor_readings (plant_id, timestamp DESC)",
    r#"
    CREATE TABLE IF NOT EXISTS predictions (
        id BIGSERIAL PRIMARY KEY,
        plant_id TEXT NOT NULL,
        timestamp TIMESTAMPTZ NOT NULL,
        should_water BOOLEAN NOT NULL,
        confidence DOUBLE PRECISION NOT NULL,
        method TEXT NOT NULL,
        temperature DOUBLE PRECISION NOT NULL,
        humidity DOUBLE PRECISION NOT NULL,
        soil_moisture DOUBLE PRECISION NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_predictions_plant_ts ON predictions (plant_id, timestamp DESC)",
    r#"
    CREATE TABLE IF NOT EXISTS watering_events (
        id BIGSERIAL PRIMARY KEY,
        plant_id TEXT NOT NULL,
        timestamp TIMESTAMPTZ NOT NULL,
        duration INTEGER NOT NULL,
        water_amount DOUBLE PRECISION,
        triggered_by TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_watering_events_ts ON watering_events (timestamp DESC)",
];

#[derive(Debug, Clone)]
pub struct PgGateway {
    pool: PgPool,
    clock: Clock,
}

impl PgGateway {
    /// Wrap an existing pool; stored instants are read back in `clock`'s zone
    pub fn new(pool: PgPool, clock: Clock) -> Self {
        Self { pool, clock }
    }

    /// Open a pool from configuration
    pub async fn connect(url: &str, config: &DatabaseConfig, clock: Clock) -> PersistenceResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .connect(url)
            .await?;

        info!(max_connections = config.max_connections, "Connected persistence pool");
        Ok(Self::new(pool, clock))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the tables and indexes if they do not exist
    #[instrument(skip(self))]
    pub async fn ensure_schema(&self) -> PersistenceResult<()> {
        let mut tx = self.pool.begin().await?;
        for statement in SCHEMA {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;

        debug!("Persistence schema ready");
        Ok(())
    }

    pub async fn health_check(&self) -> PersistenceResult<bool> {
        let row = sqlx::query("SELECT 1 AS health").fetch_one(&self.pool).await?;
        let health: i32 = row.try_get("health")?;
        Ok(health == 1)
    }

    fn record_from_row(&self, row: &PgRow) -> PersistenceResult<SensorRecord> {
        let timestamp: DateTime<Utc> = row.try_get("timestamp")?;
        let mandatory = |column: &str| -> PersistenceResult<f64> {
            row.try_get::<Option<f64>, _>(column)?
                .ok_or_else(|| PersistenceError::InvalidRow(format!("{column} is null")))
        };

        Ok(SensorRecord {
            device_id: row.try_get("plant_id")?,
            timestamp: self.clock.localize(timestamp),
            temperature: mandatory("temperature")?,
            humidity: mandatory("humidity")?,
            soil_moisture: mandatory("soil_moisture")?,
            light_level: row.try_get("light_level")?,
            pressure: row.try_get("pressure")?,
        })
    }

    fn event_from_row(&self, row: &PgRow) -> PersistenceResult<ActuationEvent> {
        let timestamp: DateTime<Utc> = row.try_get("timestamp")?;
        let duration: i32 = row.try_get("duration")?;
        let trigger: String = row.try_get("triggered_by")?;

        Ok(ActuationEvent {
            device_id: row.try_get("plant_id")?,
            timestamp: self.clock.localize(timestamp),
            duration_seconds: u32::try_from(duration)
                .map_err(|_| PersistenceError::InvalidRow(format!("negative duration {duration}")))?,
            water_amount: row.try_get("water_amount")?,
            triggered_by: TriggerSource::parse(&trigger)
                .ok_or_else(|| PersistenceError::InvalidRow(format!("unknown trigger {trigger}")))?,
        })
    }
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl PersistenceGateway for PgGateway {
    #[instrument(skip(self, record), fields(device_id = %record.device_id))]
    async fn write_sensor_record(&self, record: &SensorRecord) -> PersistenceResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO sensor_readings
            (plant_id, timestamp, temperature, humidity, soil_moisture, light_level, pressure)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&record.device_id)
        .bind(record.timestamp)
        .bind(record.temperature)
        .bind(record.humidity)
        .bind(record.soil_moisture)
        .bind(record.light_level)
        .bind(record.pressure)
        .execute(&mut *tx)
        .await
        .map_err(|e| PersistenceError::write_failed("sensor_readings", e.to_string()))?;

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self, prediction), fields(device_id = %prediction.device_id))]
    async fn write_prediction(&self, prediction: &Prediction) -> PersistenceResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO predictions
            (plant_id, timestamp, should_water, confidence, method, temperature, humidity, soil_moisture)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&prediction.device_id)
        .bind(prediction.timestamp)
        .bind(prediction.should_water)
        .bind(prediction.confidence)
        .bind(prediction.method.as_str())
        .bind(prediction.temperature)
        .bind(prediction.humidity)
        .bind(prediction.soil_moisture)
        .execute(&mut *tx)
        .await
        .map_err(|e| PersistenceError::write_failed("predictions", e.to_string()))?;

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self, event), fields(device_id = %event.device_id))]
    async fn write_actuation_event(&self, event: &ActuationEvent) -> PersistenceResult<()> {
        let duration = i32::try_from(event.duration_seconds).map_err(|_| {
            PersistenceError::write_failed("watering_events", "duration out of range")
        })?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO watering_events
            (plant_id, timestamp, duration, water_amount, triggered_by)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&event.device_id)
        .bind(event.timestamp)
        .bind(duration)
        .bind(event.water_amount)
        .bind(event.triggered_by.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| PersistenceError::write_failed("watering_events", e.to_string()))?;

        tx.commit().await?;
        Ok(())
    }

    async fn latest_record(&self, device_id: &str) -> PersistenceResult<Option<SensorRecord>> {
        let row = sqlx::query(
            r#"
            SELECT plant_id, timestamp, temperature, humidity, soil_moisture, light_level, pressure
            FROM sensor_readings
            WHERE plant_id = $1
            ORDER BY timestamp DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| self.record_from_row(&row)).transpose()
    }

    async fn recent_records(
        &self,
        device_id: &str,
        limit: usize,
    ) -> PersistenceResult<Vec<SensorRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT plant_id, timestamp, temperature, humidity, soil_moisture, light_level, pressure
            FROM sensor_readings
            WHERE plant_id = $1
            ORDER BY timestamp DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(device_id)
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|row| self.record_from_row(row)).collect()
    }

    async fn recent_actuation_events(&self, limit: usize) -> PersistenceResult<Vec<ActuationEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT plant_id, timestamp, duration, water_amount, triggered_by
            FROM watering_events
            ORDER BY timestamp DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|row| self.event_from_row(row)).collect()
    }
}
