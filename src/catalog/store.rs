//! SQLite-backed mirror catalog.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDateTime;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, warn};

use super::models::{Mirror, NewMirror, Subnet, Url};
use super::{CatalogError, CatalogResult};
use crate::observability::metrics;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Also accepts fractional seconds, as written by other catalog tools.
const TIMESTAMP_READ_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Persisted set of mirrors with their subnets and urls.
#[derive(Debug, Clone)]
pub struct MirrorCatalog {
    pool: Pool<Sqlite>,
}

impl MirrorCatalog {
    /// Open (creating if needed) the catalog database at `db_path`.
    pub async fn open(db_path: &Path, max_connections: u32) -> CatalogResult<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                CatalogError::Database(sqlx::Error::Configuration(
                    format!("Failed to create database directory {}: {}", parent.display(), e)
                        .into(),
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let catalog = Self { pool };
        catalog.init_schema().await?;

        info!(path = %db_path.display(), "Mirror catalog opened");
        Ok(catalog)
    }

    /// A private in-memory catalog. Used by tests and offline tooling.
    pub async fn in_memory() -> CatalogResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        // Every connection to :memory: is a separate database, so keep exactly one alive.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let catalog = Self { pool };
        catalog.init_schema().await?;
        Ok(catalog)
    }

    /// Initialize the database schema.
    async fn init_schema(&self) -> CatalogResult<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS mirrors (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT UNIQUE NOT NULL,
                continent TEXT NOT NULL,
                country TEXT NOT NULL,
                ip TEXT NOT NULL,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                is_expired BOOLEAN NOT NULL DEFAULT FALSE,
                update_frequency TEXT NOT NULL,
                sponsor_name TEXT NOT NULL,
                sponsor_url TEXT NOT NULL,
                email TEXT NOT NULL,
                asn TEXT
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS subnets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                subnet TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS urls (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL,
                type TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS mirrors_subnets (
                mirror_id INTEGER NOT NULL REFERENCES mirrors(id) ON DELETE CASCADE,
                subnet_id INTEGER NOT NULL REFERENCES subnets(id) ON DELETE CASCADE
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS mirrors_urls (
                mirror_id INTEGER NOT NULL REFERENCES mirrors(id) ON DELETE CASCADE,
                url_id INTEGER NOT NULL REFERENCES urls(id) ON DELETE CASCADE
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_mirrors_subnets_mirror ON mirrors_subnets(mirror_id)",
            "CREATE INDEX IF NOT EXISTS idx_mirrors_urls_mirror ON mirrors_urls(mirror_id)",
        ];

        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Register a mirror, replacing any existing mirror with the same name.
    pub async fn insert_mirror(&self, new: &NewMirror) -> CatalogResult<Mirror> {
        new.validate()?;

        let mut tx = self.pool.begin().await?;

        let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM mirrors WHERE name = ?")
            .bind(&new.name)
            .fetch_optional(&mut *tx)
            .await?;
        if let Some(id) = existing {
            delete_mirror_rows(&mut tx, id).await?;
            debug!(mirror = %new.name, "Replacing existing mirror");
        }

        let email = new.email.clone().unwrap_or_else(|| "unknown".to_string());
        let mirror_id = sqlx::query(
            r#"
            INSERT INTO mirrors (name, continent, country, ip, latitude, longitude, is_expired,
                                 update_frequency, sponsor_name, sponsor_url, email, asn)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&new.name)
        .bind(&new.continent)
        .bind(&new.country)
        .bind(&new.ip)
        .bind(new.latitude)
        .bind(new.longitude)
        .bind(new.is_expired)
        .bind(new.update_frequency.format(TIMESTAMP_FORMAT).to_string())
        .bind(&new.sponsor_name)
        .bind(&new.sponsor_url)
        .bind(&email)
        .bind(new.asn.as_deref())
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        let mut subnets = Vec::with_capacity(new.subnets.len());
        for cidr in &new.subnets {
            let cidr = cidr.trim().to_string();
            let id = sqlx::query("INSERT INTO subnets (subnet) VALUES (?)")
                .bind(&cidr)
                .execute(&mut *tx)
                .await?
                .last_insert_rowid();
            sqlx::query("INSERT INTO mirrors_subnets (mirror_id, subnet_id) VALUES (?, ?)")
                .bind(mirror_id)
                .bind(id)
                .execute(&mut *tx)
                .await?;
            subnets.push(Subnet { id, cidr });
        }

        let mut urls = Vec::with_capacity(new.urls.len());
        for (protocol, endpoint) in &new.urls {
            let id = sqlx::query("INSERT INTO urls (url, type) VALUES (?, ?)")
                .bind(endpoint)
                .bind(protocol)
                .execute(&mut *tx)
                .await?
                .last_insert_rowid();
            sqlx::query("INSERT INTO mirrors_urls (mirror_id, url_id) VALUES (?, ?)")
                .bind(mirror_id)
                .bind(id)
                .execute(&mut *tx)
                .await?;
            urls.push(Url {
                id,
                protocol: protocol.clone(),
                endpoint: endpoint.clone(),
            });
        }

        tx.commit().await?;
        info!(mirror = %new.name, subnets = subnets.len(), urls = urls.len(), "Mirror registered");

        Ok(Mirror {
            id: mirror_id,
            name: new.name.clone(),
            continent: new.continent.clone(),
            country: new.country.clone(),
            ip: new.ip.clone(),
            latitude: new.latitude,
            longitude: new.longitude,
            is_expired: new.is_expired,
            update_frequency: new.update_frequency,
            sponsor_name: new.sponsor_name.clone(),
            sponsor_url: new.sponsor_url.clone(),
            email,
            asn: new.asn.clone(),
            subnets,
            urls,
        })
    }

    /// Remove a mirror and its subnet/url associations. Returns false if absent.
    pub async fn delete_mirror(&self, name: &str) -> CatalogResult<bool> {
        let mut tx = self.pool.begin().await?;
        let id: Option<i64> = sqlx::query_scalar("SELECT id FROM mirrors WHERE name = ?")
            .bind(name)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(id) = id else {
            return Ok(false);
        };
        delete_mirror_rows(&mut tx, id).await?;
        tx.commit().await?;

        info!(mirror = %name, "Mirror removed");
        Ok(true)
    }

    /// Consistent snapshot of every mirror, in catalog (id) order.
    pub async fn list_mirrors(&self) -> CatalogResult<Vec<Mirror>> {
        let mut tx = self.pool.begin().await?;

        let mirror_rows = sqlx::query(
            r#"
            SELECT id, name, continent, country, ip, latitude, longitude, is_expired,
                   update_frequency, sponsor_name, sponsor_url, email, asn
            FROM mirrors ORDER BY id
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;

        let subnet_rows = sqlx::query(
            r#"
            SELECT ms.mirror_id, s.id, s.subnet
            FROM mirrors_subnets ms JOIN subnets s ON s.id = ms.subnet_id
            ORDER BY ms.mirror_id, s.id
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;

        let url_rows = sqlx::query(
            r#"
            SELECT mu.mirror_id, u.id, u.url, u.type
            FROM mirrors_urls mu JOIN urls u ON u.id = mu.url_id
            ORDER BY mu.mirror_id, u.id
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut subnets: HashMap<i64, Vec<Subnet>> = HashMap::new();
        for row in &subnet_rows {
            subnets.entry(row.get(0)).or_default().push(Subnet {
                id: row.get(1),
                cidr: row.get(2),
            });
        }

        let mut urls: HashMap<i64, Vec<Url>> = HashMap::new();
        for row in &url_rows {
            urls.entry(row.get(0)).or_default().push(Url {
                id: row.get(1),
                endpoint: row.get(2),
                protocol: row.get(3),
            });
        }

        let mirrors: Vec<Mirror> = mirror_rows
            .iter()
            .map(|row| {
                let mut mirror = row_to_mirror(row);
                mirror.subnets = subnets.remove(&mirror.id).unwrap_or_default();
                mirror.urls = urls.remove(&mirror.id).unwrap_or_default();
                mirror
            })
            .collect();

        metrics::record_catalog_size(mirrors.len());
        Ok(mirrors)
    }

    /// Sorted distinct protocol labels across all urls.
    pub async fn url_types(&self) -> CatalogResult<Vec<String>> {
        let types = sqlx::query_scalar("SELECT DISTINCT type FROM urls ORDER BY type")
            .fetch_all(&self.pool)
            .await?;
        Ok(types)
    }

    /// Number of registered mirrors.
    pub async fn count(&self) -> CatalogResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM mirrors")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// Delete a mirror row together with the subnet/url rows it owns.
async fn delete_mirror_rows(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    mirror_id: i64,
) -> CatalogResult<()> {
    sqlx::query(
        "DELETE FROM subnets WHERE id IN (SELECT subnet_id FROM mirrors_subnets WHERE mirror_id = ?)",
    )
    .bind(mirror_id)
    .execute(&mut **tx)
    .await?;
    sqlx::query("DELETE FROM urls WHERE id IN (SELECT url_id FROM mirrors_urls WHERE mirror_id = ?)")
        .bind(mirror_id)
        .execute(&mut **tx)
        .await?;
    sqlx::query("DELETE FROM mirrors WHERE id = ?")
        .bind(mirror_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Parse a stored timestamp: space or `T` separated, optional fractional seconds.
fn parse_timestamp(text: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, TIMESTAMP_READ_FORMAT).or_else(|_| text.parse())
}

fn row_to_mirror(row: &SqliteRow) -> Mirror {
    let name: String = row.get("name");
    let update_frequency_str: String = row.get("update_frequency");
    let update_frequency = parse_timestamp(&update_frequency_str).unwrap_or_else(|e| {
        warn!(mirror = %name, value = %update_frequency_str, error = %e, "Unparsable update_frequency");
        NaiveDateTime::default()
    });

    Mirror {
        id: row.get("id"),
        name,
        continent: row.get("continent"),
        country: row.get("country"),
        ip: row.get("ip"),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        is_expired: row.get("is_expired"),
        update_frequency,
        sponsor_name: row.get("sponsor_name"),
        sponsor_url: row.get("sponsor_url"),
        email: row.get("email"),
        asn: row.get("asn"),
        subnets: Vec::new(),
        urls: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn new_mirror(name: &str) -> NewMirror {
        NewMirror {
            name: name.into(),
            continent: "North America".into(),
            country: "United States".into(),
            ip: "203.0.113.5".into(),
            latitude: 40.0,
            longitude: -74.0,
            is_expired: false,
            update_frequency: NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_opt(6, 0, 0)
                .unwrap(),
            sponsor_name: "Sponsor".into(),
            sponsor_url: "https://sponsor.example".into(),
            email: Some("ops@sponsor.example".into()),
            asn: Some("64501".into()),
            subnets: vec!["203.0.113.0/24".into()],
            urls: vec![
                ("http".into(), format!("http://{name}/pub")),
                ("rsync".into(), format!("rsync://{name}/pub")),
            ],
        }
    }

    async fn count(catalog: &MirrorCatalog, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&catalog.pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_list() {
        let catalog = MirrorCatalog::in_memory().await.unwrap();
        catalog.insert_mirror(&new_mirror("a.example")).await.unwrap();
        catalog.insert_mirror(&new_mirror("b.example")).await.unwrap();

        let mirrors = catalog.list_mirrors().await.unwrap();
        assert_eq!(mirrors.len(), 2);
        assert_eq!(mirrors[0].name, "a.example");
        assert_eq!(mirrors[1].name, "b.example");
        assert_eq!(mirrors[0].subnets[0].cidr, "203.0.113.0/24");
        assert_eq!(mirrors[0].url_for("rsync"), Some("rsync://a.example/pub"));
        assert_eq!(mirrors[0].update_hour(), "06");
        assert_eq!(mirrors[0].asn.as_deref(), Some("64501"));
    }

    #[tokio::test]
    async fn test_reads_timestamps_written_by_other_tools() {
        let catalog = MirrorCatalog::in_memory().await.unwrap();
        catalog.insert_mirror(&new_mirror("a.example")).await.unwrap();

        for (stored, hour) in [
            ("2024-05-01 07:00:00.000000", "07"),
            ("2024-05-01 08:15:30.123", "08"),
            ("2024-05-01T09:00:00", "09"),
            ("2024-05-01 10:00:00", "10"),
        ] {
            sqlx::query("UPDATE mirrors SET update_frequency = ?")
                .bind(stored)
                .execute(&catalog.pool)
                .await
                .unwrap();
            let mirrors = catalog.list_mirrors().await.unwrap();
            assert_eq!(mirrors[0].update_hour(), hour, "stored as {stored:?}");
        }
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp("yesterday").is_err());
        assert!(parse_timestamp("").is_err());
    }

    #[tokio::test]
    async fn test_email_defaults_to_unknown() {
        let catalog = MirrorCatalog::in_memory().await.unwrap();
        let mut m = new_mirror("a.example");
        m.email = None;
        let stored = catalog.insert_mirror(&m).await.unwrap();
        assert_eq!(stored.email, "unknown");
        assert_eq!(catalog.list_mirrors().await.unwrap()[0].email, "unknown");
    }

    #[tokio::test]
    async fn test_reinsert_replaces_by_name() {
        let catalog = MirrorCatalog::in_memory().await.unwrap();
        catalog.insert_mirror(&new_mirror("a.example")).await.unwrap();

        let mut updated = new_mirror("a.example");
        updated.is_expired = true;
        updated.subnets = vec![];
        catalog.insert_mirror(&updated).await.unwrap();

        let mirrors = catalog.list_mirrors().await.unwrap();
        assert_eq!(mirrors.len(), 1);
        assert!(mirrors[0].is_expired);
        assert!(mirrors[0].subnets.is_empty());
        assert_eq!(count(&catalog, "subnets").await, 0);
        assert_eq!(count(&catalog, "urls").await, 2);
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let catalog = MirrorCatalog::in_memory().await.unwrap();
        catalog.insert_mirror(&new_mirror("a.example")).await.unwrap();
        catalog.insert_mirror(&new_mirror("b.example")).await.unwrap();

        assert!(catalog.delete_mirror("a.example").await.unwrap());
        assert!(!catalog.delete_mirror("a.example").await.unwrap());

        assert_eq!(catalog.count().await.unwrap(), 1);
        assert_eq!(count(&catalog, "mirrors_subnets").await, 1);
        assert_eq!(count(&catalog, "mirrors_urls").await, 2);
        assert_eq!(count(&catalog, "subnets").await, 1);
        assert_eq!(count(&catalog, "urls").await, 2);
    }

    #[tokio::test]
    async fn test_invalid_mirror_not_written() {
        let catalog = MirrorCatalog::in_memory().await.unwrap();
        let mut m = new_mirror("a.example");
        m.subnets.push("10.0.0.1/8".into());
        assert!(matches!(
            catalog.insert_mirror(&m).await,
            Err(CatalogError::InvalidSubnet(_))
        ));
        assert_eq!(catalog.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_url_types() {
        let catalog = MirrorCatalog::in_memory().await.unwrap();
        let mut m = new_mirror("a.example");
        m.urls.push(("https".into(), "https://a.example/pub".into()));
        catalog.insert_mirror(&m).await.unwrap();
        catalog.insert_mirror(&new_mirror("b.example")).await.unwrap();

        assert_eq!(
            catalog.url_types().await.unwrap(),
            vec!["http", "https", "rsync"]
        );
    }

    #[tokio::test]
    async fn test_empty_catalog() {
        let catalog = MirrorCatalog::in_memory().await.unwrap();
        assert!(catalog.list_mirrors().await.unwrap().is_empty());
        assert!(catalog.url_types().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bad_subnet_row_survives_snapshot() {
        let catalog = MirrorCatalog::in_memory().await.unwrap();
        let stored = catalog.insert_mirror(&new_mirror("a.example")).await.unwrap();
        sqlx::query("UPDATE subnets SET subnet = 'bogus'")
            .execute(&catalog.pool)
            .await
            .unwrap();

        let mirrors = catalog.list_mirrors().await.unwrap();
        assert_eq!(mirrors[0].id, stored.id);
        assert!(mirrors[0].subnets[0].network().is_err());
    }
}
