use std::marker::PhantomData;

use anyhow::Result;
use async_trait::async_trait;
use scholar_core::{BeforeHook, HookContext, ServiceMethodKind};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use validator::Validate;

use crate::validate::validate_into_value;

/// Before hook validating `create`/`update` payloads against `C` and
/// `patch` payloads against `Pt`, replacing `ctx.data` with the
/// normalized value.
pub struct SchemaHook<C, Pt> {
    error_message: &'static str,
    _marker: PhantomData<fn() -> (C, Pt)>,
}

impl<C, Pt> SchemaHook<C, Pt> {
    pub fn new(error_message: &'static str) -> Self {
        Self {
            error_message,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<C, Pt, P> BeforeHook<Value, P> for SchemaHook<C, Pt>
where
    C: DeserializeOwned + Serialize + Validate + 'static,
    Pt: DeserializeOwned + Serialize + Validate + 'static,
    P: Send + Sync + 'static,
{
    async fn run(&self, ctx: &mut HookContext<Value, P>) -> Result<()> {
        let Some(data) = ctx.data.as_ref() else {
            return Ok(());
        };

        let normalized = match ctx.method {
            ServiceMethodKind::Create | ServiceMethodKind::Update => {
                validate_into_value::<C>(data, self.error_message)?
            }
            ServiceMethodKind::Patch => validate_into_value::<Pt>(data, self.error_message)?,
            _ => return Ok(()),
        };

        ctx.data = Some(normalized);
        Ok(())
    }
}
