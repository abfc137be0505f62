//! Where a (view, zone) pair's zone file lives in each tree.
use std::path::{Path, PathBuf};

use crate::db::zone_repo::{RootZone, View};
use crate::error::{BuildError, Result};
use crate::validation::{validate_label, validate_zone_name};

/// The three roots a zone file path is resolved against.
#[derive(Debug, Clone)]
pub struct TreeLayout {
    pub stage_dir: PathBuf,
    pub prod_dir: PathBuf,
    /// What the name server calls `prod_dir`.
    pub bind_prefix: PathBuf,
}

/// Derived paths for one view's zone file. Pure function of the view name,
/// zone name, reverse flag and layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    pub rel_zone_dir: PathBuf,
    /// `<zone>.<view>`
    pub file_name: String,
    pub rel_file_name: PathBuf,
    pub stage_path: PathBuf,
    pub prod_path: PathBuf,
    /// Path as written in the `file` clause of the zone statement.
    pub config_path: PathBuf,
}

impl FileMeta {
    pub fn new(view: &View, zone: &RootZone, layout: &TreeLayout) -> Result<Self> {
        validate_label(&view.name).map_err(|e| BuildError::InvalidViewName {
            view: view.name.clone(),
            reason: e.to_string(),
        })?;
        let rel_zone_dir = zone_dir(zone)?;
        let file_name = format!("{}.{}", zone_name(zone), view.name);
        let rel_file_name = rel_zone_dir.join(&file_name);
        Ok(Self {
            stage_path: layout.stage_dir.join(&rel_file_name),
            prod_path: layout.prod_dir.join(&rel_file_name),
            config_path: layout.bind_prefix.join(&rel_file_name),
            rel_zone_dir,
            file_name,
            rel_file_name,
        })
    }

    pub fn relative(&self) -> &Path {
        &self.rel_file_name
    }
}

fn zone_name(zone: &RootZone) -> &str {
    zone.name.trim_end_matches('.')
}

/// Relative directory for a zone's files.
///
/// Reverse zones share one directory per address family; forward zones get
/// their labels reversed, so `a.b.com` lands in `com/b/a/`.
pub fn zone_dir(zone: &RootZone) -> Result<PathBuf> {
    let name = zone_name(zone);
    validate_zone_name(name).map_err(|e| BuildError::InvalidZoneName {
        zone: zone.name.clone(),
        reason: e.to_string(),
    })?;

    if zone.is_reverse {
        if name.ends_with("ipv6") {
            Ok(PathBuf::from("reverse/in-addr.ipv6"))
        } else if name.ends_with("arpa") {
            Ok(PathBuf::from("reverse/in-addr.arpa"))
        } else {
            Err(BuildError::InvalidReverseZone {
                zone: zone.name.clone(),
            })
        }
    } else {
        Ok(name.rsplit('.').collect())
    }
}
