use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use scholar_gateway::{HttpGateway, HttpGatewayOptions, MemoryGateway, QueryGateway};
use scholar_services::{IS_SCHOOL_ADMIN_FOR_SCHOOL, IS_SUPER_ADMIN};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::GatewayKind;

/// Relations from a `{"relation": [rows...]}` JSON file.
fn seeded(gateway: MemoryGateway, path: &Path) -> Result<MemoryGateway> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading seed file {}", path.display()))?;
    let parsed: Value = serde_json::from_str(&raw).with_context(|| format!("parsing seed file {}", path.display()))?;
    let Value::Object(relations) = parsed else {
        anyhow::bail!("seed file {} must hold a JSON object of relations", path.display());
    };

    let mut gateway = gateway;
    for (relation, rows) in relations {
        let rows = match rows {
            Value::Array(rows) => rows,
            _ => {
                warn!(relation = %relation, "seed entry is not an array, skipped");
                continue;
            }
        };
        info!(relation = %relation, rows = rows.len(), "seeding relation");
        gateway = gateway.with_rows(&relation, rows);
    }
    Ok(gateway)
}

/// The gateway selected by `gateway.kind`.
///
/// The in-memory gateway has no row policy, so both authorization RPCs
/// answer `true` there.
pub fn connect(kind: &GatewayKind) -> Result<Arc<dyn QueryGateway>> {
    match kind {
        GatewayKind::Memory { seed } => {
            let mut gateway = MemoryGateway::new()
                .with_rpc(IS_SUPER_ADMIN, |_| Ok(json!(true)))
                .with_rpc(IS_SCHOOL_ADMIN_FOR_SCHOOL, |_| Ok(json!(true)));
            if let Some(path) = seed {
                gateway = seeded(gateway, path)?;
            }
            warn!("using the in-memory gateway; data is not persisted");
            Ok(Arc::new(gateway))
        }
        GatewayKind::Http { url, anon_key, timeout } => {
            let options = HttpGatewayOptions::new(url.as_str(), anon_key.as_str()).with_timeout(*timeout);
            let gateway = HttpGateway::new(options).map_err(|e| e.into_anyhow())?;
            info!(url = %url, "connected http gateway");
            Ok(Arc::new(gateway))
        }
    }
}
