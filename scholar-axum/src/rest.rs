use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::rejection::JsonRejection,
    extract::{OriginalUri, Path, Query, State},
    http::HeaderMap,
    routing, Json, Router,
};
use scholar_core::errors::ScholarError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use crate::{
    params::{FromRestParams, RestParams},
    scoped_context, ScholarAxumError, ScholarAxumState,
};

pub(crate) fn map_json_rejection(rejection: JsonRejection) -> ScholarAxumError {
    ScholarError::bad_request("Failed to parse the request body as JSON")
        .with_errors(json!({"_schema": [rejection.to_string()]}))
        .into()
}

fn rest_params<P: FromRestParams>(
    headers: &HeaderMap,
    query: HashMap<String, String>,
    method: &str,
    uri: &axum::http::Uri,
) -> P {
    P::from_rest_params(RestParams::from_parts("rest", headers, query, method, uri))
}

/// CRUD routes for the registered service `service_name`.
///
/// Every call runs under the tenant context of the current session.
pub fn service_router<R, P>(service_name: Arc<String>, state: ScholarAxumState<R, P>) -> Router<()>
where
    R: Serialize + DeserializeOwned + Send + Sync + 'static,
    P: FromRestParams + Send + Sync + Clone + 'static,
{
    Router::new()
        .route(
            "/",
            routing::get({
                let service_name = Arc::clone(&service_name);
                move |State(state): State<ScholarAxumState<R, P>>,
                      headers: HeaderMap,
                      Query(query): Query<HashMap<String, String>>,
                      OriginalUri(uri): OriginalUri| async move {
                    let tenant = scoped_context(&state.scope).await?;
                    let params = rest_params::<P>(&headers, query, "GET", &uri);

                    let svc = state.app.service(&service_name)?;
                    let res = svc.find(tenant, params).await?;
                    Ok::<_, ScholarAxumError>(Json(res))
                }
            })
            .post({
                let service_name = Arc::clone(&service_name);
                move |State(state): State<ScholarAxumState<R, P>>,
                      headers: HeaderMap,
                      Query(query): Query<HashMap<String, String>>,
                      OriginalUri(uri): OriginalUri,
                      data: Result<Json<R>, JsonRejection>| async move {
                    let Json(data) = data.map_err(map_json_rejection)?;
                    let tenant = scoped_context(&state.scope).await?;
                    let params = rest_params::<P>(&headers, query, "POST", &uri);

                    let svc = state.app.service(&service_name)?;
                    let res = svc.create(tenant, data, params).await?;
                    Ok::<_, ScholarAxumError>(Json(res))
                }
            }),
        )
        .route(
            "/{id}",
            routing::get({
                let service_name = Arc::clone(&service_name);
                move |State(state): State<ScholarAxumState<R, P>>,
                      headers: HeaderMap,
                      Query(query): Query<HashMap<String, String>>,
                      OriginalUri(uri): OriginalUri,
                      Path(id): Path<String>| async move {
                    let tenant = scoped_context(&state.scope).await?;
                    let params = rest_params::<P>(&headers, query, "GET", &uri);

                    let svc = state.app.service(&service_name)?;
                    let res = svc.get(tenant, &id, params).await?;
                    Ok::<_, ScholarAxumError>(Json(res))
                }
            })
            .put({
                let service_name = Arc::clone(&service_name);
                move |State(state): State<ScholarAxumState<R, P>>,
                      headers: HeaderMap,
                      Query(query): Query<HashMap<String, String>>,
                      OriginalUri(uri): OriginalUri,
                      Path(id): Path<String>,
                      data: Result<Json<R>, JsonRejection>| async move {
                    let Json(data) = data.map_err(map_json_rejection)?;
                    let tenant = scoped_context(&state.scope).await?;
                    let params = rest_params::<P>(&headers, query, "PUT", &uri);

                    let svc = state.app.service(&service_name)?;
                    let res = svc.update(tenant, &id, data, params).await?;
                    Ok::<_, ScholarAxumError>(Json(res))
                }
            })
            .patch({
                let service_name = Arc::clone(&service_name);
                move |State(state): State<ScholarAxumState<R, P>>,
                      headers: HeaderMap,
                      Query(query): Query<HashMap<String, String>>,
                      OriginalUri(uri): OriginalUri,
                      Path(id): Path<String>,
                      data: Result<Json<R>, JsonRejection>| async move {
                    let Json(data) = data.map_err(map_json_rejection)?;
                    let tenant = scoped_context(&state.scope).await?;
                    let params = rest_params::<P>(&headers, query, "PATCH", &uri);

                    let svc = state.app.service(&service_name)?;
                    let res = svc.patch(tenant, &id, data, params).await?;
                    Ok::<_, ScholarAxumError>(Json(res))
                }
            })
            .delete({
                let service_name = Arc::clone(&service_name);
                move |State(state): State<ScholarAxumState<R, P>>,
                      headers: HeaderMap,
                      Query(query): Query<HashMap<String, String>>,
                      OriginalUri(uri): OriginalUri,
                      Path(id): Path<String>| async move {
                    let tenant = scoped_context(&state.scope).await?;
                    let params = rest_params::<P>(&headers, query, "DELETE", &uri);

                    let svc = state.app.service(&service_name)?;
                    let res = svc.remove(tenant, &id, params).await?;
                    Ok::<_, ScholarAxumError>(Json(res))
                }
            }),
        )
        .with_state(state)
}
