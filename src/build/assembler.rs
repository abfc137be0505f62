//! Per-view BIND config fragments built from zone statements.
use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::build::file_meta::FileMeta;
use crate::build::validator::Validator;
use crate::build::writer::StageWriter;
use crate::db::zone_repo::RootZone;
use crate::error::Result;

/// Replaced by the server role ("master") when a fragment is assembled.
pub const ROLE_PLACEHOLDER: &str = "{role}";

/// The `zone "..." { ... };` block for one (view, zone) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneStatement(String);

impl ZoneStatement {
    pub fn render(zone: &RootZone, meta: &FileMeta) -> Self {
        let suffix = if zone.is_signed { ".signed" } else { "" };
        Self(format!(
            "zone \"{}\" IN {{\n\ttype {ROLE_PLACEHOLDER};\n\tfile \"{}{}\";\n}};\n",
            zone.name.trim_end_matches('.'),
            meta.config_path.display(),
            suffix
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Zone statements grouped by view. Within a view, statements keep the
/// order they were pushed in, which is the zone iteration order.
#[derive(Debug, Default)]
pub struct ConfigAssembler {
    by_view: BTreeMap<String, Vec<ZoneStatement>>,
}

impl ConfigAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, view: &str, stmt: ZoneStatement) {
        self.by_view.entry(view.to_string()).or_default().push(stmt);
    }

    pub fn is_empty(&self) -> bool {
        self.by_view.is_empty()
    }

    pub fn statements(&self, view: &str) -> &[ZoneStatement] {
        self.by_view.get(view).map(Vec::as_slice).unwrap_or_default()
    }

    /// Write and check one `<role>.<view>` fragment per view.
    pub async fn assemble(
        &self,
        role: &str,
        writer: &StageWriter,
        validator: &Validator,
    ) -> Result<Vec<PathBuf>> {
        info!(views = self.by_view.len(), "building config files");
        let mut written = Vec::with_capacity(self.by_view.len());
        for (view, stmts) in &self.by_view {
            debug!(%view, zones = stmts.len(), "building config for view");
            let text = render_fragment(stmts, role);
            let path = writer.write_config(&format!("{role}.{view}"), &text).await?;
            validator.check_config(&path).await?;
            written.push(path);
        }
        Ok(written)
    }
}

pub fn render_fragment(stmts: &[ZoneStatement], role: &str) -> String {
    stmts
        .iter()
        .map(ZoneStatement::as_str)
        .collect::<Vec<_>>()
        .join("\n")
        .replace(ROLE_PLACEHOLDER, role)
}
