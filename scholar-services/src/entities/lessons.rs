//! Lessons carry an ordered list of chapters stored in their own
//! relation. Chapters travel inline on the lesson payload and are
//! replaced wholesale whenever a write includes them.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use scholar_core::{ScholarService, ServiceCapabilities, ServiceParams, TenantContext};
use scholar_gateway::{Filter, QueryGateway, Select};
use scholar_schema::SchemaHook;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use validator::Validate;

use super::{mount, PortalApp};
use crate::adapter::{EntitySpec, GatewayCrud};

pub const SERVICE: &str = "lessons";
pub const CHAPTERS: &str = "lesson_chapters";

pub const SPEC: EntitySpec = EntitySpec {
    relation: "lessons",
    label: "Lesson",
    filter_columns: &["class_id", "subject"],
    order_by: "name",
};

#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ChapterInput {
    #[validate(length(min = 1, max = 150, message = "title must be 1-150 characters"))]
    pub title: String,

    #[validate(range(min = 1, message = "position must be at least 1"))]
    pub position: u32,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CreateLesson {
    #[validate(length(min = 1, max = 150, message = "name must be 1-150 characters"))]
    pub name: String,

    #[validate(length(min = 1, message = "class_id is required"))]
    pub class_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 100))]
    pub subject: Option<String>,

    #[serde(default)]
    #[validate(nested)]
    pub chapters: Vec<ChapterInput>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_id: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PatchLesson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 150, message = "name must be 1-150 characters"))]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "class_id is required"))]
    pub class_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 100))]
    pub subject: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub chapters: Option<Vec<ChapterInput>>,
}

/// Lesson rows plus their `lesson_chapters`.
pub struct LessonsService {
    crud: GatewayCrud,
}

impl LessonsService {
    pub fn new(gateway: Arc<dyn QueryGateway>) -> Self {
        Self {
            crud: GatewayCrud::new(SPEC, gateway),
        }
    }

    fn gateway(&self) -> &Arc<dyn QueryGateway> {
        &self.crud.gateway
    }

    async fn chapters_of(&self, lesson_ids: Vec<String>) -> Result<HashMap<String, Vec<Value>>> {
        let mut grouped: HashMap<String, Vec<Value>> = HashMap::new();
        if lesson_ids.is_empty() {
            return Ok(grouped);
        }

        let query = Select::from(CHAPTERS)
            .is_in("lesson_id", lesson_ids)
            .order("position", true);
        let rows = self.gateway().select(&query).await.map_err(|e| e.into_anyhow())?;
        for row in rows {
            let Some(lesson_id) = row.get("lesson_id").and_then(Value::as_str).map(str::to_string) else {
                continue;
            };
            grouped.entry(lesson_id).or_default().push(row);
        }
        Ok(grouped)
    }

    async fn replace_chapters(&self, lesson_id: &str, chapters: Vec<Value>) -> Result<Vec<Value>> {
        let by_lesson = [Filter::Eq("lesson_id".to_string(), Value::String(lesson_id.to_string()))];
        self.gateway()
            .delete(CHAPTERS, &by_lesson)
            .await
            .map_err(|e| e.into_anyhow())?;

        if chapters.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<Value> = chapters
            .into_iter()
            .filter_map(|c| match c {
                Value::Object(mut obj) => {
                    obj.insert("lesson_id".to_string(), Value::String(lesson_id.to_string()));
                    Some(Value::Object(obj))
                }
                _ => None,
            })
            .collect();
        debug!(lesson_id, count = rows.len(), "replacing lesson chapters");

        let mut inserted = self
            .gateway()
            .insert(CHAPTERS, Value::Array(rows))
            .await
            .map_err(|e| e.into_anyhow())?;
        inserted.sort_by_key(position);
        Ok(inserted)
    }

    async fn write(&self, id: &str, data: Value) -> Result<Value> {
        let (lesson, chapters) = split_chapters(data);
        let mut row = self.crud.update_row(id, Value::Object(lesson)).await?;
        let chapters = match chapters {
            Some(chapters) => self.replace_chapters(id, chapters).await?,
            None => self.chapters_of(vec![id.to_string()]).await?.remove(id).unwrap_or_default(),
        };
        attach(&mut row, chapters);
        Ok(row)
    }
}

fn position(row: &Value) -> u64 {
    row.get("position").and_then(Value::as_u64).unwrap_or(u64::MAX)
}

fn split_chapters(data: Value) -> (Map<String, Value>, Option<Vec<Value>>) {
    let Value::Object(mut obj) = data else {
        return (Map::new(), None);
    };
    let chapters = match obj.remove("chapters") {
        Some(Value::Array(items)) => Some(items),
        Some(Value::Null) | None => None,
        Some(other) => Some(vec![other]),
    };
    (obj, chapters)
}

fn attach(row: &mut Value, chapters: Vec<Value>) {
    if let Value::Object(obj) = row {
        obj.insert("chapters".to_string(), Value::Array(chapters));
    }
}

fn row_id(row: &Value) -> Option<String> {
    row.get("id").and_then(Value::as_str).map(str::to_string)
}

#[async_trait]
impl ScholarService<Value, ServiceParams> for LessonsService {
    fn capabilities(&self) -> ServiceCapabilities {
        ServiceCapabilities::standard_crud()
    }

    async fn find(&self, ctx: &TenantContext, params: ServiceParams) -> Result<Vec<Value>> {
        let mut lessons = self.crud.find_rows(ctx, &params).await?;
        let ids: Vec<String> = lessons.iter().filter_map(row_id).collect();
        let mut chapters = self.chapters_of(ids).await?;
        for lesson in &mut lessons {
            let own = row_id(lesson)
                .and_then(|id| chapters.remove(&id))
                .unwrap_or_default();
            attach(lesson, own);
        }
        Ok(lessons)
    }

    async fn get(&self, _ctx: &TenantContext, id: &str, _params: ServiceParams) -> Result<Value> {
        let mut lesson = self.crud.get_row(id).await?;
        let chapters = self.chapters_of(vec![id.to_string()]).await?.remove(id).unwrap_or_default();
        attach(&mut lesson, chapters);
        Ok(lesson)
    }

    async fn create(&self, _ctx: &TenantContext, data: Value, _params: ServiceParams) -> Result<Value> {
        let (lesson, chapters) = split_chapters(data);
        let mut row = self.crud.insert_row(Value::Object(lesson)).await?;
        let chapters = match (row_id(&row), chapters) {
            (Some(id), Some(chapters)) => self.replace_chapters(&id, chapters).await?,
            _ => Vec::new(),
        };
        attach(&mut row, chapters);
        Ok(row)
    }

    async fn update(&self, _ctx: &TenantContext, id: &str, data: Value, _params: ServiceParams) -> Result<Value> {
        self.write(id, data).await
    }

    async fn patch(&self, _ctx: &TenantContext, id: &str, data: Value, _params: ServiceParams) -> Result<Value> {
        self.write(id, data).await
    }

    async fn remove(&self, _ctx: &TenantContext, id: &str, _params: ServiceParams) -> Result<Value> {
        // Chapters go only once the lesson itself is gone.
        let mut row = self.crud.delete_row(id).await?;
        let by_lesson = [Filter::Eq("lesson_id".to_string(), Value::String(id.to_string()))];
        let mut chapters = self
            .gateway()
            .delete(CHAPTERS, &by_lesson)
            .await
            .map_err(|e| e.into_anyhow())?;
        chapters.sort_by_key(position);
        attach(&mut row, chapters);
        Ok(row)
    }
}

pub fn register(app: &PortalApp, gateway: &Arc<dyn QueryGateway>) -> Result<()> {
    let schema = SchemaHook::<CreateLesson, PatchLesson>::new("Lessons schema validation failed");
    let service = Arc::new(LessonsService::new(Arc::clone(gateway)));
    mount(app, gateway, SERVICE, SPEC.relation, service, Arc::new(schema))
}
