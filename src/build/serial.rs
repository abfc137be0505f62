//! Serial reconciliation between the database and the published zone files.
use std::io::ErrorKind;
use std::path::Path;

use chrono::Utc;

use crate::error::{BuildError, Result};

/// What the last published file says about a zone's serial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciliation {
    pub force_rebuild: bool,
    /// Replacement base serial; the rebuilt file gets this plus one.
    pub new_serial: Option<u32>,
}

impl Reconciliation {
    pub const IN_SYNC: Reconciliation = Reconciliation {
        force_rebuild: false,
        new_serial: None,
    };
}

/// Compare the database serial against the published one.
///
/// * nothing published, or no readable serial: new zone, serial from `now`
/// * serials differ: the file was edited by hand, rebuild from the larger
/// * otherwise nothing to do for serial reasons
pub fn reconcile(db_serial: u32, published: Option<u32>, now: u32) -> Reconciliation {
    match published {
        None => Reconciliation {
            force_rebuild: true,
            new_serial: Some(now),
        },
        Some(serial) if serial != db_serial => Reconciliation {
            force_rebuild: true,
            new_serial: Some(serial.max(db_serial)),
        },
        Some(_) => Reconciliation::IN_SYNC,
    }
}

/// Seconds since the epoch, truncated to the serial space.
pub fn time_serial() -> u32 {
    Utc::now().timestamp() as u32
}

/// Serial arithmetic is mod 2^32.
pub fn next_serial(serial: u32) -> u32 {
    serial.wrapping_add(1)
}

/// Serial of the zone file at `path`; `None` when the file is missing or its
/// SOA serial is not an unsigned integer.
pub fn published_serial(path: &Path) -> Result<Option<u32>> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(parse_soa_serial(&text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) if e.kind() == ErrorKind::InvalidData => Ok(None),
        Err(e) => Err(BuildError::io(path, e)),
    }
}

/// Third field after the `SOA` token (mname, rname, serial), reading across
/// parentheses, line breaks and `;` comments.
pub fn parse_soa_serial(text: &str) -> Option<u32> {
    let mut tokens = text
        .lines()
        .map(|line| line.split(';').next().unwrap_or(""))
        .flat_map(|line| line.split(|c: char| c.is_whitespace() || c == '(' || c == ')'))
        .filter(|t| !t.is_empty());

    tokens.by_ref().find(|t| t.eq_ignore_ascii_case("SOA"))?;
    tokens.nth(2)?.parse().ok()
}
