//! Zone body rendering from stored records.
use std::fmt::Write as _;

use async_trait::async_trait;

use crate::db::Db;
use crate::db::zone_repo::{self, RootZone, View, ZoneRecord};

/// Stand-in for the serial inside a rendered body; filled in by the build
/// once the serial for this run is known.
pub const SERIAL_PLACEHOLDER: &str = "{serial}";

/// Zone file text with the serial still unresolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneBody(String);

impl ZoneBody {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Fills in the first placeholder at or after the SOA record. Record
    /// data that happens to contain the placeholder text is left alone.
    pub fn with_serial(&self, serial: u32) -> String {
        let from = soa_line_start(&self.0).unwrap_or(0);
        match self.0[from..].find(SERIAL_PLACEHOLDER) {
            Some(at) => {
                let at = from + at;
                let mut out = String::with_capacity(self.0.len() + 10);
                out.push_str(&self.0[..at]);
                out.push_str(&serial.to_string());
                out.push_str(&self.0[at + SERIAL_PLACEHOLDER.len()..]);
                out
            }
            None => self.0.clone(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Byte offset of the first line carrying an `SOA` token.
fn soa_line_start(text: &str) -> Option<usize> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let record = line.split(';').next().unwrap_or_default();
        if record
            .split_whitespace()
            .any(|tok| tok.eq_ignore_ascii_case("SOA"))
        {
            return Some(offset);
        }
        offset += line.len();
    }
    None
}

#[async_trait]
pub trait ZoneRenderer: Send + Sync {
    /// `Ok(None)` when the zone has nothing to publish in this view.
    async fn render(&self, view: &View, zone: &RootZone) -> anyhow::Result<Option<ZoneBody>>;
}

/// Renders straight from the `zone_records` table.
#[derive(Clone)]
pub struct SqlZoneRenderer {
    db: Db,
}

impl SqlZoneRenderer {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ZoneRenderer for SqlZoneRenderer {
    async fn render(&self, view: &View, zone: &RootZone) -> anyhow::Result<Option<ZoneBody>> {
        let records = zone_repo::records_for(&self.db, zone.id, view.id).await?;
        if records.is_empty() {
            return Ok(None);
        }
        Ok(Some(render_zone(zone, &records)))
    }
}

pub fn render_zone(zone: &RootZone, records: &[ZoneRecord]) -> ZoneBody {
    let mut out = String::new();
    let origin = zone.name.trim_end_matches('.');
    // Writing into a String cannot fail.
    let _ = writeln!(out, "$ORIGIN {origin}.");
    let _ = writeln!(out, "$TTL {}", zone.ttl);
    let _ = writeln!(out, "@ IN SOA {} {} (", zone.primary_ns, zone.contact);
    let _ = writeln!(out, "\t\t{SERIAL_PLACEHOLDER}\t; serial");
    let _ = writeln!(out, "\t\t{}\t; refresh", zone.refresh);
    let _ = writeln!(out, "\t\t{}\t; retry", zone.retry);
    let _ = writeln!(out, "\t\t{}\t; expire", zone.expire);
    let _ = writeln!(out, "\t\t{}\t; minimum", zone.minimum);
    let _ = writeln!(out, ")");
    out.push('\n');

    for rec in records {
        let ttl = rec.ttl.map(|t| t.to_string()).unwrap_or_default();
        let _ = writeln!(
            out,
            "{:<30} {:<6} IN {:<6} {}",
            rec.name, ttl, rec.rtype, rec.data
        );
    }

    ZoneBody(out)
}
