//! Repository functions for views, root zones and their records.
use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

/// A named visibility partition ("public", "private", ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    pub id: i64,
    pub name: String,
}

/// A zone apex and its SOA parameters.
#[derive(Debug, Clone)]
pub struct RootZone {
    pub id: i64,
    pub name: String,
    pub is_reverse: bool,
    /// Serial the database believes is published.
    pub serial: u32,
    /// Set by record mutations, cleared by a successful build of this zone.
    pub dirty: bool,
    pub is_signed: bool,
    pub primary_ns: String,
    pub contact: String,
    pub ttl: u32,
    pub refresh: u32,
    pub retry: u32,
    pub expire: u32,
    pub minimum: u32,
    pub updated_at: DateTime<Utc>,
}

/// Input for [`insert_zone`].
#[derive(Debug, Clone)]
pub struct NewZone {
    pub name: String,
    pub is_reverse: bool,
    pub serial: u32,
    pub dirty: bool,
    pub is_signed: bool,
    pub primary_ns: String,
    pub contact: String,
}

impl NewZone {
    pub fn forward(name: impl Into<String>, serial: u32) -> Self {
        Self {
            name: name.into(),
            is_reverse: false,
            serial,
            dirty: false,
            is_signed: false,
            primary_ns: "ns1.example.net.".into(),
            contact: "hostmaster.example.net.".into(),
        }
    }
}

/// One resource record as stored, owner name relative to the zone or `@`.
#[derive(Debug, Clone)]
pub struct ZoneRecord {
    pub name: String,
    pub ttl: Option<u32>,
    pub rtype: String,
    pub data: String,
}

fn u32_col(row: &SqliteRow, col: &str) -> anyhow::Result<u32> {
    let raw: i64 = row.get(col);
    u32::try_from(raw).with_context(|| format!("column {col} out of range: {raw}"))
}

fn zone_from_row(row: &SqliteRow) -> anyhow::Result<RootZone> {
    Ok(RootZone {
        id: row.get("id"),
        name: row.get("name"),
        is_reverse: row.get::<i64, _>("is_reverse") != 0,
        serial: u32_col(row, "serial")?,
        dirty: row.get::<i64, _>("dirty") != 0,
        is_signed: row.get::<i64, _>("is_signed") != 0,
        primary_ns: row.get("primary_ns"),
        contact: row.get("contact"),
        ttl: u32_col(row, "ttl")?,
        refresh: u32_col(row, "refresh")?,
        retry: u32_col(row, "retry")?,
        expire: u32_col(row, "expire")?,
        minimum: u32_col(row, "minimum")?,
        updated_at: row.get::<DateTime<Utc>, _>("updated_at"),
    })
}

const ZONE_COLUMNS: &str = r#"
    id, name, is_reverse, serial, dirty, is_signed, primary_ns, contact,
    ttl, refresh, retry, expire, minimum, updated_at
"#;

pub async fn list_views(db: &SqlitePool) -> sqlx::Result<Vec<View>> {
    let rows = sqlx::query("SELECT id, name FROM views ORDER BY id")
        .fetch_all(db)
        .await?;
    Ok(rows
        .into_iter()
        .map(|row| View {
            id: row.get("id"),
            name: row.get("name"),
        })
        .collect())
}

pub async fn insert_view(db: &SqlitePool, name: &str) -> sqlx::Result<i64> {
    let res = sqlx::query("INSERT INTO views (name) VALUES (?)")
        .bind(name)
        .execute(db)
        .await?;
    Ok(res.last_insert_rowid())
}

pub async fn list_zones(db: &SqlitePool) -> anyhow::Result<Vec<RootZone>> {
    let rows = sqlx::query(&format!(
        "SELECT {ZONE_COLUMNS} FROM root_zones ORDER BY id"
    ))
    .fetch_all(db)
    .await?;
    rows.iter().map(zone_from_row).collect()
}

pub async fn find_zone_by_name(db: &SqlitePool, name: &str) -> anyhow::Result<Option<RootZone>> {
    let row = sqlx::query(&format!(
        "SELECT {ZONE_COLUMNS} FROM root_zones WHERE name = ?"
    ))
    .bind(name.trim_end_matches('.'))
    .fetch_optional(db)
    .await?;
    row.as_ref().map(zone_from_row).transpose()
}

pub async fn insert_zone(db: &SqlitePool, zone: &NewZone) -> sqlx::Result<i64> {
    let res = sqlx::query(
        r#"
        INSERT INTO root_zones (
            name, is_reverse, serial, dirty, is_signed, primary_ns, contact, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(zone.name.trim_end_matches('.'))
    .bind(zone.is_reverse as i64)
    .bind(zone.serial as i64)
    .bind(zone.dirty as i64)
    .bind(zone.is_signed as i64)
    .bind(&zone.primary_ns)
    .bind(&zone.contact)
    .bind(Utc::now())
    .execute(db)
    .await?;
    Ok(res.last_insert_rowid())
}

pub async fn set_dirty(db: &SqlitePool, zone_id: i64, dirty: bool) -> sqlx::Result<()> {
    sqlx::query("UPDATE root_zones SET dirty = ?, updated_at = ? WHERE id = ?")
        .bind(dirty as i64)
        .bind(Utc::now())
        .bind(zone_id)
        .execute(db)
        .await?;
    Ok(())
}

/// Leaves `dirty` alone: record edits may have set it again mid-build.
pub async fn set_serial(db: &SqlitePool, zone_id: i64, serial: u32) -> sqlx::Result<()> {
    sqlx::query("UPDATE root_zones SET serial = ?, updated_at = ? WHERE id = ?")
        .bind(serial as i64)
        .bind(Utc::now())
        .bind(zone_id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn insert_record(
    db: &SqlitePool,
    zone_id: i64,
    view_id: i64,
    record: &ZoneRecord,
) -> sqlx::Result<i64> {
    let res = sqlx::query(
        r#"
        INSERT INTO zone_records (zone_id, view_id, name, ttl, rtype, data)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(zone_id)
    .bind(view_id)
    .bind(&record.name)
    .bind(record.ttl.map(i64::from))
    .bind(&record.rtype)
    .bind(&record.data)
    .execute(db)
    .await?;
    Ok(res.last_insert_rowid())
}

/// Records of one zone visible in one view, in output order.
pub async fn records_for(
    db: &SqlitePool,
    zone_id: i64,
    view_id: i64,
) -> anyhow::Result<Vec<ZoneRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT name, ttl, rtype, data
        FROM zone_records
        WHERE zone_id = ? AND view_id = ?
        ORDER BY name, rtype, data
        "#,
    )
    .bind(zone_id)
    .bind(view_id)
    .fetch_all(db)
    .await?;

    rows.iter()
        .map(|row| {
            let ttl = row
                .get::<Option<i64>, _>("ttl")
                .map(u32::try_from)
                .transpose()
                .context("record ttl out of range")?;
            Ok(ZoneRecord {
                name: row.get("name"),
                ttl,
                rtype: row.get("rtype"),
                data: row.get("data"),
            })
        })
        .collect()
}
