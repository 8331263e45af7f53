use std::sync::Arc;

use anyhow::Result;
use futures::future::try_join_all;
use scholar_core::TenantContext;
use scholar_gateway::{QueryGateway, Select};
use serde::Serialize;
use tracing::debug;

use crate::entities::{classes, hostel_rooms, lessons, mediums, routes, student_types};

/// Row counts feeding the dashboard widgets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub school_id: Option<String>,
    pub classes: usize,
    pub mediums: usize,
    pub student_types: usize,
    pub routes: usize,
    pub lessons: usize,
    pub hostel_rooms: usize,
}

#[derive(Clone)]
pub struct Dashboard {
    gateway: Arc<dyn QueryGateway>,
}

impl Dashboard {
    pub fn new(gateway: Arc<dyn QueryGateway>) -> Self {
        Self { gateway }
    }

    async fn count(&self, relation: &'static str, school_id: Option<&str>) -> Result<usize> {
        let mut query = Select::from(relation).columns("id");
        if let Some(school_id) = school_id {
            query = query.eq("school_id", school_id);
        }
        let rows = self.gateway.select(&query).await.map_err(|e| e.into_anyhow())?;
        Ok(rows.len())
    }

    /// Counts for the school in scope, or for everything the row policy
    /// lets the caller see when no school is selected.
    pub async fn summary(&self, ctx: &TenantContext) -> Result<DashboardSummary> {
        let school = ctx.school_id.as_deref();
        let relations = [
            classes::SPEC.relation,
            mediums::SPEC.relation,
            student_types::SPEC.relation,
            routes::SPEC.relation,
            lessons::SPEC.relation,
            hostel_rooms::SPEC.relation,
        ];

        let counts = try_join_all(relations.iter().map(|r| self.count(r, school))).await?;
        debug!(tenant_id = %ctx.tenant_id, school_id = ?school, ?counts, "dashboard summary");

        Ok(DashboardSummary {
            school_id: ctx.school_id.clone(),
            classes: counts[0],
            mediums: counts[1],
            student_types: counts[2],
            routes: counts[3],
            lessons: counts[4],
            hostel_rooms: counts[5],
        })
    }
}
