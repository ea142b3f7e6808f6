use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Query, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use serde::Deserialize;

use super::auth::{IdentityProvider, Session};
use super::domain::{
    CleaningId, CleaningPatch, CleaningStatus, HouseId, HousePatch, NewCleaning, NewHouse,
    ProfileId, RoleChange,
};
use super::error::SchedulingError;
use super::service::SchedulingService;
use super::store::EntityStore;

type SharedService<S, I> = Arc<SchedulingService<S, I>>;

/// Router builder exposing the scheduling API under `/api/v1`.
pub fn scheduling_router<S, I>(service: SharedService<S, I>) -> Router
where
    S: EntityStore + 'static,
    I: IdentityProvider + 'static,
{
    Router::new()
        .route("/api/v1/me", get(me_handler::<S, I>))
        .route(
            "/api/v1/cleanings",
            get(list_cleanings_handler::<S, I>).post(create_cleaning_handler::<S, I>),
        )
        .route(
            "/api/v1/cleanings/:cleaning_id",
            get(get_cleaning_handler::<S, I>)
                .patch(update_cleaning_handler::<S, I>)
                .delete(delete_cleaning_handler::<S, I>),
        )
        .route(
            "/api/v1/houses",
            get(list_houses_handler::<S, I>).post(create_house_handler::<S, I>),
        )
        .route(
            "/api/v1/houses/:house_id",
            patch(update_house_handler::<S, I>).delete(delete_house_handler::<S, I>),
        )
        .route("/api/v1/users", get(list_users_handler::<S, I>))
        .route(
            "/api/v1/users/:user_id",
            axum::routing::delete(delete_user_handler::<S, I>),
        )
        .route(
            "/api/v1/users/:user_id/role",
            patch(change_role_handler::<S, I>),
        )
        .with_state(service)
}

pub(crate) fn session_from(headers: &HeaderMap) -> Session {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    Session::from_authorization(value)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListCleaningsParams {
    #[serde(default)]
    pub(crate) status: Option<String>,
}

/// Unwrap a JSON body, reporting malformed payloads as validation errors.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, SchedulingError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| SchedulingError::validation("body", rejection.body_text()))
}

fn path_id<T>(
    field: &'static str,
    raw: Result<Path<T>, PathRejection>,
) -> Result<T, SchedulingError> {
    raw.map(|Path(value)| value)
        .map_err(|rejection| SchedulingError::validation(field, rejection.body_text()))
}

/// Malformed input is only reported to callers holding a valid session.
fn checked<T, S, I>(
    service: &SharedService<S, I>,
    session: &Session,
    parsed: Result<T, SchedulingError>,
) -> Result<T, SchedulingError>
where
    S: EntityStore + 'static,
    I: IdentityProvider + 'static,
{
    if parsed.is_err() {
        service.authenticate(session)?;
    }
    parsed
}

fn parse_status_filter(raw: Option<&str>) -> Result<Option<CleaningStatus>, SchedulingError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(value) => CleaningStatus::parse(value).map(Some).ok_or_else(|| {
            SchedulingError::validation(
                "status",
                format!("unknown status '{value}' (expected pending, in_progress, completed or cancelled)"),
            )
        }),
    }
}

pub(crate) async fn me_handler<S, I>(
    State(service): State<SharedService<S, I>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, SchedulingError>
where
    S: EntityStore + 'static,
    I: IdentityProvider + 'static,
{
    let profile = service.whoami(&session_from(&headers))?;
    Ok(Json(profile))
}

pub(crate) async fn list_cleanings_handler<S, I>(
    State(service): State<SharedService<S, I>>,
    headers: HeaderMap,
    Query(params): Query<ListCleaningsParams>,
) -> Result<impl IntoResponse, SchedulingError>
where
    S: EntityStore + 'static,
    I: IdentityProvider + 'static,
{
    let session = session_from(&headers);
    let status = parse_status_filter(params.status.as_deref())?;
    let records = service.list_cleanings(&session, status)?;
    Ok(Json(records))
}

pub(crate) async fn create_cleaning_handler<S, I>(
    State(service): State<SharedService<S, I>>,
    headers: HeaderMap,
    request: Result<Json<NewCleaning>, JsonRejection>,
) -> Result<impl IntoResponse, SchedulingError>
where
    S: EntityStore + 'static,
    I: IdentityProvider + 'static,
{
    let session = session_from(&headers);
    let request = checked(&service, &session, json_body(request))?;
    let record = service.create_cleaning(&session, request)?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub(crate) async fn get_cleaning_handler<S, I>(
    State(service): State<SharedService<S, I>>,
    headers: HeaderMap,
    cleaning_id: Result<Path<CleaningId>, PathRejection>,
) -> Result<impl IntoResponse, SchedulingError>
where
    S: EntityStore + 'static,
    I: IdentityProvider + 'static,
{
    let session = session_from(&headers);
    let cleaning_id = checked(&service, &session, path_id("cleaning_id", cleaning_id))?;
    let record = service.get_cleaning(&session, cleaning_id)?;
    Ok(Json(record))
}

pub(crate) async fn update_cleaning_handler<S, I>(
    State(service): State<SharedService<S, I>>,
    headers: HeaderMap,
    cleaning_id: Result<Path<CleaningId>, PathRejection>,
    patch: Result<Json<CleaningPatch>, JsonRejection>,
) -> Result<impl IntoResponse, SchedulingError>
where
    S: EntityStore + 'static,
    I: IdentityProvider + 'static,
{
    let session = session_from(&headers);
    let cleaning_id = checked(&service, &session, path_id("cleaning_id", cleaning_id))?;
    let patch = checked(&service, &session, json_body(patch))?;
    let update = service.update_cleaning(&session, cleaning_id, patch)?;
    Ok(Json(update))
}

pub(crate) async fn delete_cleaning_handler<S, I>(
    State(service): State<SharedService<S, I>>,
    headers: HeaderMap,
    cleaning_id: Result<Path<CleaningId>, PathRejection>,
) -> Result<impl IntoResponse, SchedulingError>
where
    S: EntityStore + 'static,
    I: IdentityProvider + 'static,
{
    let session = session_from(&headers);
    let cleaning_id = checked(&service, &session, path_id("cleaning_id", cleaning_id))?;
    let record = service.delete_cleaning(&session, cleaning_id)?;
    Ok(Json(record))
}

pub(crate) async fn list_houses_handler<S, I>(
    State(service): State<SharedService<S, I>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, SchedulingError>
where
    S: EntityStore + 'static,
    I: IdentityProvider + 'static,
{
    let houses = service.list_houses(&session_from(&headers))?;
    Ok(Json(houses))
}

pub(crate) async fn create_house_handler<S, I>(
    State(service): State<SharedService<S, I>>,
    headers: HeaderMap,
    request: Result<Json<NewHouse>, JsonRejection>,
) -> Result<impl IntoResponse, SchedulingError>
where
    S: EntityStore + 'static,
    I: IdentityProvider + 'static,
{
    let session = session_from(&headers);
    let request = checked(&service, &session, json_body(request))?;
    let house = service.create_house(&session, request)?;
    Ok((StatusCode::CREATED, Json(house)))
}

pub(crate) async fn update_house_handler<S, I>(
    State(service): State<SharedService<S, I>>,
    headers: HeaderMap,
    house_id: Result<Path<HouseId>, PathRejection>,
    patch: Result<Json<HousePatch>, JsonRejection>,
) -> Result<impl IntoResponse, SchedulingError>
where
    S: EntityStore + 'static,
    I: IdentityProvider + 'static,
{
    let session = session_from(&headers);
    let house_id = checked(&service, &session, path_id("house_id", house_id))?;
    let patch = checked(&service, &session, json_body(patch))?;
    let house = service.update_house(&session, house_id, patch)?;
    Ok(Json(house))
}

pub(crate) async fn delete_house_handler<S, I>(
    State(service): State<SharedService<S, I>>,
    headers: HeaderMap,
    house_id: Result<Path<HouseId>, PathRejection>,
) -> Result<impl IntoResponse, SchedulingError>
where
    S: EntityStore + 'static,
    I: IdentityProvider + 'static,
{
    let session = session_from(&headers);
    let house_id = checked(&service, &session, path_id("house_id", house_id))?;
    let house = service.delete_house(&session, house_id)?;
    Ok(Json(house))
}

pub(crate) async fn list_users_handler<S, I>(
    State(service): State<SharedService<S, I>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, SchedulingError>
where
    S: EntityStore + 'static,
    I: IdentityProvider + 'static,
{
    let profiles = service.list_profiles(&session_from(&headers))?;
    Ok(Json(profiles))
}

pub(crate) async fn change_role_handler<S, I>(
    State(service): State<SharedService<S, I>>,
    headers: HeaderMap,
    user_id: Result<Path<ProfileId>, PathRejection>,
    change: Result<Json<RoleChange>, JsonRejection>,
) -> Result<impl IntoResponse, SchedulingError>
where
    S: EntityStore + 'static,
    I: IdentityProvider + 'static,
{
    let session = session_from(&headers);
    let user_id = checked(&service, &session, path_id("user_id", user_id))?;
    let change = checked(&service, &session, json_body(change))?;
    let profile = service.change_user_role(&session, user_id, change.role)?;
    Ok(Json(profile))
}

pub(crate) async fn delete_user_handler<S, I>(
    State(service): State<SharedService<S, I>>,
    headers: HeaderMap,
    user_id: Result<Path<ProfileId>, PathRejection>,
) -> Result<impl IntoResponse, SchedulingError>
where
    S: EntityStore + 'static,
    I: IdentityProvider + 'static,
{
    let session = session_from(&headers);
    let user_id = checked(&service, &session, path_id("user_id", user_id))?;
    let profile = service.delete_user(&session, user_id)?;
    Ok(Json(profile))
}
