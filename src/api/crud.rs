//! Generic CRUD routes, instantiated once per [`Resource`].

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, error, info, instrument};

use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::config::Pagination;
use crate::db::{self, ColumnValues};
use crate::model::{Envelope, Record};
use crate::resource::{Resource, Schema};
use crate::validate::{parse_id, validate, validate_document, IdPurpose, ValidationError};

type RecordsBody = Json<Envelope<Vec<Record>>>;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub start: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub limit: Option<i64>,
}

/// `?start=` means "use the default", not a parse error.
fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(de::Error::custom),
    }
}

/// Routes for one resource. PUT and DELETE are mounted only when its `ops` allow.
pub(crate) fn routes(resource: &'static Resource) -> Router<AppState> {
    let mut collection = get(
        move |state: State<AppState>, query: Result<Query<ListParams>, QueryRejection>| {
            list(resource, state, query)
        },
    )
    .post(
        move |state: State<AppState>, body: Result<Json<Value>, JsonRejection>| {
            create(resource, state, body)
        },
    );
    if resource.ops.update {
        collection = collection.put(
            move |state: State<AppState>, body: Result<Json<Value>, JsonRejection>| {
                update(resource, state, body)
            },
        );
    }
    if resource.ops.delete {
        collection = collection.delete(
            move |state: State<AppState>, body: Result<Json<Value>, JsonRejection>| {
                remove(resource, state, body)
            },
        );
    }

    Router::new().route(resource.path, collection).route(
        &format!("{}/:id", resource.path),
        get(
            move |state: State<AppState>, id: Result<Path<i64>, PathRejection>| {
                show(resource, state, id)
            },
        ),
    )
}

/// Resolve `start`/`limit` against the configured bounds.
pub fn page_bounds(params: &ListParams, cfg: &Pagination) -> ApiResult<(i64, i64)> {
    let start = params.start.unwrap_or(0);
    if start < 0 {
        return Err(ApiError::Parse(
            "start must be a non-negative integer.".into(),
        ));
    }
    let limit = params.limit.unwrap_or(cfg.default_limit);
    if limit <= 0 {
        return Err(ApiError::Parse("limit must be a positive integer.".into()));
    }
    Ok((start, limit.min(cfg.max_limit)))
}

fn store_failure(resource: &Resource, verb: &str, noun: &str, err: anyhow::Error) -> ApiError {
    error!(table = resource.table, error = ?err, "store operation failed");
    ApiError::Store(format!("Failed to {verb} {}.", noun.to_lowercase()))
}

fn parse_object(body: Result<Json<Value>, JsonRejection>) -> ApiResult<Map<String, Value>> {
    match body {
        Ok(Json(Value::Object(map))) => Ok(map),
        Ok(Json(other)) => {
            debug!(kind = json_kind(&other), "request body is not an object");
            Err(ApiError::Parse("Invalid request body.".into()))
        }
        Err(rejection) => {
            debug!(reason = %rejection.body_text(), "rejected request body");
            Err(ApiError::Parse("Invalid request body.".into()))
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn check_body(resource: &Resource, body: &Map<String, Value>) -> Result<(), ValidationError> {
    match resource.schema {
        Schema::Fields(rules) => validate(body, rules),
        Schema::Document => validate_document(body),
    }
}

#[instrument(skip_all, fields(table = resource.table))]
async fn list(
    resource: &'static Resource,
    State(state): State<AppState>,
    query: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<RecordsBody> {
    let Query(params) = query.map_err(|rejection| {
        debug!(reason = %rejection.body_text(), "rejected query string");
        ApiError::Parse("Invalid pagination parameters.".into())
    })?;
    let (start, limit) = page_bounds(&params, &state.pagination)?;
    let records = db::list_records(&state.pool, resource, start, limit)
        .await
        .map_err(|err| store_failure(resource, "fetch", resource.plural, err))?;
    Ok(Json(Envelope::ok(
        records,
        format!("{} fetched successfully.", resource.plural),
    )))
}

#[instrument(skip_all, fields(table = resource.table))]
async fn show(
    resource: &'static Resource,
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Envelope<Record>>> {
    let Path(id) = id.map_err(|_| ApiError::Parse("Invalid id.".into()))?;
    match db::get_record(&state.pool, resource, id)
        .await
        .map_err(|err| store_failure(resource, "fetch", resource.label, err))?
    {
        Some(record) => Ok(Json(Envelope::ok(
            record,
            format!("{} fetched successfully.", resource.label),
        ))),
        None => Err(ApiError::NotFound(format!("{} not found.", resource.label))),
    }
}

#[instrument(skip_all, fields(table = resource.table))]
async fn create(
    resource: &'static Resource,
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, RecordsBody)> {
    let body = parse_object(body)?;
    check_body(resource, &body)?;

    let values = ColumnValues::for_insert(resource, &body)
        .map_err(|err| store_failure(resource, "create", resource.label, err))?;
    let record = db::insert_record(&state.pool, resource, &values)
        .await
        .map_err(|err| store_failure(resource, "create", resource.label, err))?;
    info!(id = record.id, "record created");

    Ok((
        StatusCode::CREATED,
        Json(Envelope::ok(
            vec![record],
            format!("{} created successfully.", resource.label),
        )),
    ))
}

#[instrument(skip_all, fields(table = resource.table))]
async fn update(
    resource: &'static Resource,
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<RecordsBody> {
    let body = parse_object(body)?;
    let id = parse_id(&body, IdPurpose::Update)?;
    check_body(resource, &body)?;

    let values = ColumnValues::for_update(resource, &body)
        .map_err(|err| store_failure(resource, "update", resource.label, err))?;
    let updated = db::update_record(&state.pool, resource, id, &values)
        .await
        .map_err(|err| store_failure(resource, "update", resource.label, err))?;
    let Some(record) = updated else {
        return Err(ApiError::NotFound(format!("{} not found.", resource.label)));
    };
    info!(id, "record updated");

    Ok(Json(Envelope::ok(
        vec![record],
        format!("{} updated successfully.", resource.label),
    )))
}

#[instrument(skip_all, fields(table = resource.table))]
async fn remove(
    resource: &'static Resource,
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<RecordsBody> {
    let body = parse_object(body)?;
    let id = parse_id(&body, IdPurpose::Delete)?;

    let deleted = db::delete_record(&state.pool, resource, id)
        .await
        .map_err(|err| store_failure(resource, "delete", resource.label, err))?;
    let Some(record) = deleted else {
        return Err(ApiError::NotFound(format!("{} not found.", resource.label)));
    };
    info!(id, "record deleted");

    Ok(Json(Envelope::ok(
        vec![record],
        format!("{} deleted successfully.", resource.label),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_bounds_defaults_and_clamps() {
        let cfg = Pagination {
            default_limit: 10,
            max_limit: 50,
        };
        assert_eq!(page_bounds(&ListParams::default(), &cfg).unwrap(), (0, 10));
        let params = ListParams {
            start: Some(4),
            limit: Some(500),
        };
        assert_eq!(page_bounds(&params, &cfg).unwrap(), (4, 50));
    }

    #[test]
    fn empty_params_fall_back_to_defaults() {
        let params: ListParams =
            serde_json::from_value(serde_json::json!({"start": "", "limit": " 5 "})).unwrap();
        assert_eq!((params.start, params.limit), (None, Some(5)));
        assert!(serde_json::from_value::<ListParams>(serde_json::json!({"start": "x"})).is_err());
        let params: ListParams = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(params.start.is_none());
    }

    #[test]
    fn page_bounds_rejects_out_of_range() {
        let cfg = Pagination::default();
        let negative = ListParams {
            start: Some(-1),
            limit: None,
        };
        assert!(matches!(page_bounds(&negative, &cfg), Err(ApiError::Parse(_))));
        let zero = ListParams {
            start: None,
            limit: Some(0),
        };
        assert!(matches!(page_bounds(&zero, &cfg), Err(ApiError::Parse(_))));
    }
}
