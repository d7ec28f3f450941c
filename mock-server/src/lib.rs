//! In-memory emulation of the Staffomatic v3 endpoints.
//!
//! # Design
//! One `Store` behind a tokio `RwLock` holds every record; ids come from a
//! single counter so they never collide across resource kinds. Collection
//! routes honour `page`/`per_page` and advertise the page count in a `Pages`
//! header (switchable off to exercise clients that loop until an empty page).
//! Single-record routes take the id segment with its `.json` suffix and strip
//! it themselves. Every route sits behind HTTP Basic auth.

use std::{collections::BTreeMap, fmt::Display, sync::Arc};

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, FixedOffset, NaiveDate};
use log::{debug, info, warn};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};

pub const DEFAULT_PER_PAGE: usize = 300;

pub type Fields = Map<String, Value>;

/// Account identity and server behaviour.
#[derive(Clone, Debug)]
pub struct MockConfig {
    pub username: String,
    pub password: String,
    pub account_name: String,
    pub time_zone: String,
    /// Send the `Pages` header on collection responses.
    pub page_count_header: bool,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: "secret".to_string(),
            account_name: "Demo".to_string(),
            time_zone: "Europe/London".to_string(),
            page_count_header: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub id: i64,
    pub name: String,
    #[serde(flatten)]
    pub extra: Fields,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Department {
    pub id: i64,
    pub location_id: i64,
    pub name: String,
    pub user_ids: Vec<i64>,
    #[serde(flatten)]
    pub extra: Fields,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub state: String,
    pub location_ids: Vec<i64>,
    pub department_ids: Vec<i64>,
    #[serde(flatten)]
    pub extra: Fields,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Schedule {
    pub id: i64,
    pub location_id: i64,
    pub bop: NaiveDate,
    pub eop: NaiveDate,
    pub state: String,
    #[serde(flatten)]
    pub extra: Fields,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Shift {
    pub id: i64,
    pub schedule_id: i64,
    pub location_id: i64,
    pub department_id: i64,
    pub starts_at: DateTime<FixedOffset>,
    pub ends_at: DateTime<FixedOffset>,
    pub desired_coverage: u32,
    pub note: String,
    pub user_ids: Vec<i64>,
    #[serde(flatten)]
    pub extra: Fields,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub starts_at: DateTime<FixedOffset>,
    pub ends_at: DateTime<FixedOffset>,
}

#[derive(Debug, Default)]
pub struct Store {
    last_id: i64,
    pub locations: BTreeMap<i64, Location>,
    pub departments: BTreeMap<i64, Department>,
    pub users: BTreeMap<i64, User>,
    pub schedules: BTreeMap<i64, Schedule>,
    pub shifts: BTreeMap<i64, Shift>,
    pub events: BTreeMap<i64, Event>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    pub fn add_location(&mut self, name: &str) -> i64 {
        let id = self.next_id();
        self.locations.insert(
            id,
            Location {
                id,
                name: name.to_string(),
                extra: Fields::new(),
            },
        );
        id
    }

    pub fn add_department(&mut self, location_id: i64, name: &str) -> i64 {
        let id = self.next_id();
        self.departments.insert(
            id,
            Department {
                id,
                location_id,
                name: name.to_string(),
                user_ids: Vec::new(),
                extra: Fields::new(),
            },
        );
        id
    }

    pub fn add_user(&mut self, location_id: i64, first_name: &str, last_name: &str) -> i64 {
        let id = self.next_id();
        self.users.insert(
            id,
            User {
                id,
                first_name: Some(first_name.to_string()),
                last_name: Some(last_name.to_string()),
                email: None,
                state: "active".to_string(),
                location_ids: vec![location_id],
                department_ids: Vec::new(),
                extra: Fields::new(),
            },
        );
        id
    }

    pub fn add_schedule(&mut self, location_id: i64, bop: NaiveDate, eop: NaiveDate) -> i64 {
        let id = self.next_id();
        self.schedules.insert(
            id,
            Schedule {
                id,
                location_id,
                bop,
                eop,
                state: "draft".to_string(),
                extra: Fields::new(),
            },
        );
        id
    }

    pub fn add_shift(
        &mut self,
        schedule_id: i64,
        department_id: i64,
        starts_at: DateTime<FixedOffset>,
        ends_at: DateTime<FixedOffset>,
    ) -> i64 {
        let id = self.next_id();
        let location_id = self
            .schedules
            .get(&schedule_id)
            .map_or(0, |schedule| schedule.location_id);
        self.shifts.insert(
            id,
            Shift {
                id,
                schedule_id,
                location_id,
                department_id,
                starts_at,
                ends_at,
                desired_coverage: 1,
                note: String::new(),
                user_ids: Vec::new(),
                extra: Fields::new(),
            },
        );
        id
    }

    pub fn add_event(
        &mut self,
        title: &str,
        starts_at: DateTime<FixedOffset>,
        ends_at: DateTime<FixedOffset>,
    ) -> i64 {
        let id = self.next_id();
        self.events.insert(
            id,
            Event {
                id,
                title: title.to_string(),
                starts_at,
                ends_at,
            },
        );
        id
    }

    fn location(&self, id: i64) -> Result<&Location, Rejection> {
        self.locations
            .get(&id)
            .ok_or_else(|| Rejection::not_found("location"))
    }

    fn department(&self, location_id: i64, id: i64) -> Result<&Department, Rejection> {
        self.departments
            .get(&id)
            .filter(|department| department.location_id == location_id)
            .ok_or_else(|| Rejection::not_found("department"))
    }

    fn department_mut(&mut self, location_id: i64, id: i64) -> Result<&mut Department, Rejection> {
        self.departments
            .get_mut(&id)
            .filter(|department| department.location_id == location_id)
            .ok_or_else(|| Rejection::not_found("department"))
    }

    fn location_schedule_mut(&mut self, location_id: i64, id: i64) -> Result<&mut Schedule, Rejection> {
        self.schedules
            .get_mut(&id)
            .filter(|schedule| schedule.location_id == location_id)
            .ok_or_else(|| Rejection::not_found("schedule"))
    }

    fn location_user_mut(&mut self, location_id: i64, id: i64) -> Result<&mut User, Rejection> {
        self.users
            .get_mut(&id)
            .filter(|user| user.location_ids.contains(&location_id))
            .ok_or_else(|| Rejection::not_found("user"))
    }

    fn schedule_shift_mut(&mut self, schedule_id: i64, id: i64) -> Result<&mut Shift, Rejection> {
        self.shifts
            .get_mut(&id)
            .filter(|shift| shift.schedule_id == schedule_id)
            .ok_or_else(|| Rejection::not_found("shift"))
    }

    fn location_name_taken(&self, name: &str, except: Option<i64>) -> bool {
        self.locations
            .values()
            .any(|location| location.name == name && Some(location.id) != except)
    }

    fn department_name_taken(&self, location_id: i64, name: &str, except: Option<i64>) -> bool {
        self.departments.values().any(|department| {
            department.location_id == location_id
                && department.name == name
                && Some(department.id) != except
        })
    }
}

/// Error response with a JSON body.
#[derive(Debug)]
pub struct Rejection {
    status: StatusCode,
    body: Value,
}

impl Rejection {
    fn not_found(what: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            body: json!({ "error": format!("{what} not found") }),
        }
    }

    fn invalid(field: &str, message: impl Display) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            body: json!({ "errors": { field: [message.to_string()] } }),
        }
    }

    fn bad_request(message: impl Display) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: json!({ "error": message.to_string() }),
        }
    }

    fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            body: json!({ "error": "Invalid credentials" }),
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[derive(Clone)]
pub struct AppState {
    config: Arc<MockConfig>,
    store: Arc<RwLock<Store>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    page: Option<usize>,
    per_page: Option<usize>,
    from: Option<String>,
    until: Option<String>,
    state: Option<String>,
    #[serde(rename = "department_ids[]")]
    department_id: Option<i64>,
}

#[derive(Deserialize)]
struct UserIds {
    user_ids: Vec<i64>,
}

pub fn app(config: MockConfig, store: Store) -> Router {
    let state = AppState {
        config: Arc::new(config),
        store: Arc::new(RwLock::new(store)),
    };
    Router::new()
        .route("/account.json", get(account))
        .route("/locations.json", get(list_locations).post(create_location))
        .route("/locations/{loc}", get(get_location).put(update_location))
        .route(
            "/locations/{loc}/departments.json",
            get(list_departments).post(create_department),
        )
        .route(
            "/locations/{loc}/departments/{dep}",
            get(get_department).put(update_department),
        )
        .route(
            "/locations/{loc}/departments/{dep}/add_users.json",
            put(add_department_users),
        )
        .route(
            "/locations/{loc}/departments/{dep}/remove_users.json",
            put(remove_department_users),
        )
        .route(
            "/locations/{loc}/schedules.json",
            get(list_location_schedules).post(create_schedule),
        )
        .route(
            "/locations/{loc}/schedules/{sch}",
            get(get_location_schedule).put(update_schedule),
        )
        .route("/locations/{loc}/shifts.json", get(list_location_shifts))
        .route(
            "/locations/{loc}/users.json",
            get(list_location_users).post(create_user),
        )
        .route("/locations/{loc}/users/{user}", put(update_user))
        .route("/schedules.json", get(list_schedules))
        .route("/schedules/{sch}", get(get_schedule))
        .route(
            "/schedules/{sch}/shifts.json",
            get(list_schedule_shifts).post(create_shift),
        )
        .route("/schedules/{sch}/shifts/{shift}", put(update_shift))
        .route("/schedules/{sch}/shifts/{shift}/assign.json", put(assign_shift))
        .route("/users.json", get(list_users))
        .route("/events.json", get(list_events))
        .layer(middleware::from_fn_with_state(state.clone(), require_basic_auth))
        .with_state(state)
}

pub async fn run(listener: TcpListener, app: Router) -> Result<(), std::io::Error> {
    axum::serve(listener, app).await
}

async fn require_basic_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let expected = format!("{}:{}", state.config.username, state.config.password);
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Basic "))
        .and_then(|encoded| STANDARD.decode(encoded).ok())
        .is_some_and(|decoded| decoded == expected.as_bytes());
    if authorized {
        next.run(request).await
    } else {
        warn!("Rejected unauthenticated {} {}", request.method(), request.uri());
        Rejection::unauthorized().into_response()
    }
}

/// Numeric id from a path segment such as `5` or `5.json`.
fn record_id(segment: &str) -> Result<i64, Rejection> {
    segment
        .strip_suffix(".json")
        .unwrap_or(segment)
        .parse()
        .map_err(|_| Rejection::not_found("record"))
}

/// Remove `key` from a request body and decode it. `null` counts as absent.
fn take<T: DeserializeOwned>(fields: &mut Fields, key: &str) -> Result<Option<T>, Rejection> {
    fields
        .remove(key)
        .filter(|value| !value.is_null())
        .map(serde_json::from_value::<T>)
        .transpose()
        .map_err(|e| Rejection::invalid(key, e))
}

fn required<T: DeserializeOwned>(fields: &mut Fields, key: &str) -> Result<T, Rejection> {
    take(fields, key)?.ok_or_else(|| Rejection::invalid(key, "can't be blank"))
}

fn required_name(fields: &mut Fields) -> Result<String, Rejection> {
    let name: String = required(fields, "name")?;
    if name.trim().is_empty() {
        return Err(Rejection::invalid("name", "can't be blank"));
    }
    Ok(name)
}

fn timestamp(raw: &str) -> Result<DateTime<FixedOffset>, Rejection> {
    // Clients that leave `+` unencoded in the query send it as a space.
    DateTime::parse_from_rfc3339(&raw.replace(' ', "+"))
        .map_err(|_| Rejection::bad_request(format!("invalid timestamp '{raw}'")))
}

struct Window {
    from: DateTime<FixedOffset>,
    until: DateTime<FixedOffset>,
}

impl Window {
    fn from_params(params: &ListParams) -> Result<Option<Self>, Rejection> {
        match (&params.from, &params.until) {
            (None, None) => Ok(None),
            (Some(from), Some(until)) => Ok(Some(Self {
                from: timestamp(from)?,
                until: timestamp(until)?,
            })),
            _ => Err(Rejection::bad_request("from and until go together")),
        }
    }

    fn contains(&self, instant: &DateTime<FixedOffset>) -> bool {
        *instant >= self.from && *instant <= self.until
    }

    fn overlaps_days(&self, bop: NaiveDate, eop: NaiveDate) -> bool {
        bop <= self.until.date_naive() && eop >= self.from.date_naive()
    }
}

fn paged<T: Serialize>(items: Vec<T>, params: &ListParams, config: &MockConfig) -> Response {
    let per_page = params.per_page.unwrap_or(DEFAULT_PER_PAGE).max(1);
    let page = params.page.unwrap_or(1).max(1);
    let pages = items.len().div_ceil(per_page).max(1);
    debug!("Serving page {page}/{pages} of {} records", items.len());
    let slice: Vec<T> = items
        .into_iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .collect();
    let mut response = Json(slice).into_response();
    if config.page_count_header {
        response
            .headers_mut()
            .insert(HeaderName::from_static("pages"), HeaderValue::from(pages));
    }
    response
}

fn created<T: Serialize>(record: T) -> Response {
    (StatusCode::CREATED, Json(record)).into_response()
}

fn push_unique(ids: &mut Vec<i64>, id: i64) {
    if !ids.contains(&id) {
        ids.push(id);
    }
}

async fn account(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "id": 1,
        "name": state.config.account_name,
        "time_zone": state.config.time_zone,
    }))
}

// --- locations ---

async fn list_locations(State(state): State<AppState>, Query(params): Query<ListParams>) -> Response {
    let store = state.store.read().await;
    paged(store.locations.values().cloned().collect(), &params, &state.config)
}

async fn create_location(
    State(state): State<AppState>,
    Json(mut fields): Json<Fields>,
) -> Result<Response, Rejection> {
    let name = required_name(&mut fields)?;
    fields.remove("id");
    let mut store = state.store.write().await;
    if store.location_name_taken(&name, None) {
        return Err(Rejection::invalid("name", "has already been taken"));
    }
    let id = store.add_location(&name);
    let location = store
        .locations
        .get_mut(&id)
        .ok_or_else(|| Rejection::not_found("location"))?;
    location.extra = fields;
    info!("Created location {id} '{name}'");
    Ok(created(location.clone()))
}

async fn get_location(
    State(state): State<AppState>,
    Path(loc): Path<String>,
) -> Result<Json<Location>, Rejection> {
    let store = state.store.read().await;
    Ok(Json(store.location(record_id(&loc)?)?.clone()))
}

async fn update_location(
    State(state): State<AppState>,
    Path(loc): Path<String>,
    Json(mut fields): Json<Fields>,
) -> Result<Json<Location>, Rejection> {
    let id = record_id(&loc)?;
    let mut store = state.store.write().await;
    store.location(id)?;
    let name: Option<String> = take(&mut fields, "name")?;
    if let Some(name) = &name {
        if name.trim().is_empty() {
            return Err(Rejection::invalid("name", "can't be blank"));
        }
        if store.location_name_taken(name, Some(id)) {
            return Err(Rejection::invalid("name", "has already been taken"));
        }
    }
    fields.remove("id");
    let location = store
        .locations
        .get_mut(&id)
        .ok_or_else(|| Rejection::not_found("location"))?;
    if let Some(name) = name {
        info!("Renamed location {id} from '{}' to '{name}'", location.name);
        location.name = name;
    }
    location.extra.extend(fields);
    Ok(Json(location.clone()))
}

// --- departments ---

async fn list_departments(
    State(state): State<AppState>,
    Path(loc): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Response, Rejection> {
    let location_id = record_id(&loc)?;
    let store = state.store.read().await;
    store.location(location_id)?;
    let departments = store
        .departments
        .values()
        .filter(|department| department.location_id == location_id)
        .cloned()
        .collect();
    Ok(paged(departments, &params, &state.config))
}

async fn create_department(
    State(state): State<AppState>,
    Path(loc): Path<String>,
    Json(mut fields): Json<Fields>,
) -> Result<Response, Rejection> {
    let location_id = record_id(&loc)?;
    let name = required_name(&mut fields)?;
    fields.remove("id");
    fields.remove("location_id");
    let mut store = state.store.write().await;
    store.location(location_id)?;
    if store.department_name_taken(location_id, &name, None) {
        return Err(Rejection::invalid("name", "has already been taken"));
    }
    let id = store.add_department(location_id, &name);
    let department = store.department_mut(location_id, id)?;
    department.extra = fields;
    info!("Created department {id} '{name}' in location {location_id}");
    Ok(created(department.clone()))
}

async fn get_department(
    State(state): State<AppState>,
    Path((loc, dep)): Path<(String, String)>,
) -> Result<Json<Department>, Rejection> {
    let store = state.store.read().await;
    Ok(Json(store.department(record_id(&loc)?, record_id(&dep)?)?.clone()))
}

async fn update_department(
    State(state): State<AppState>,
    Path((loc, dep)): Path<(String, String)>,
    Json(mut fields): Json<Fields>,
) -> Result<Json<Department>, Rejection> {
    let (location_id, id) = (record_id(&loc)?, record_id(&dep)?);
    let mut store = state.store.write().await;
    store.department(location_id, id)?;
    let name: Option<String> = take(&mut fields, "name")?;
    if let Some(name) = &name {
        if name.trim().is_empty() {
            return Err(Rejection::invalid("name", "can't be blank"));
        }
        if store.department_name_taken(location_id, name, Some(id)) {
            return Err(Rejection::invalid("name", "has already been taken"));
        }
    }
    for key in ["id", "location_id", "user_ids"] {
        fields.remove(key);
    }
    let department = store.department_mut(location_id, id)?;
    if let Some(name) = name {
        info!("Renamed department {id} from '{}' to '{name}'", department.name);
        department.name = name;
    }
    department.extra.extend(fields);
    Ok(Json(department.clone()))
}

async fn add_department_users(
    State(state): State<AppState>,
    Path((loc, dep)): Path<(String, String)>,
    Json(body): Json<UserIds>,
) -> Result<Json<Department>, Rejection> {
    let (location_id, id) = (record_id(&loc)?, record_id(&dep)?);
    let mut store = state.store.write().await;
    let department = store.department_mut(location_id, id)?;
    for user_id in &body.user_ids {
        push_unique(&mut department.user_ids, *user_id);
    }
    let department = department.clone();
    for user_id in &body.user_ids {
        if let Some(user) = store.users.get_mut(user_id) {
            push_unique(&mut user.department_ids, id);
            push_unique(&mut user.location_ids, location_id);
        }
    }
    Ok(Json(department))
}

async fn remove_department_users(
    State(state): State<AppState>,
    Path((loc, dep)): Path<(String, String)>,
    Json(body): Json<UserIds>,
) -> Result<Json<Department>, Rejection> {
    let (location_id, id) = (record_id(&loc)?, record_id(&dep)?);
    let mut store = state.store.write().await;
    let department = store.department_mut(location_id, id)?;
    department
        .user_ids
        .retain(|user_id| !body.user_ids.contains(user_id));
    let department = department.clone();
    for user_id in &body.user_ids {
        if let Some(user) = store.users.get_mut(user_id) {
            user.department_ids.retain(|department_id| *department_id != id);
        }
    }
    Ok(Json(department))
}

// --- schedules ---

fn schedules_in(
    store: &Store,
    location_id: Option<i64>,
    params: &ListParams,
) -> Result<Vec<Schedule>, Rejection> {
    let window = Window::from_params(params)?;
    Ok(store
        .schedules
        .values()
        .filter(|schedule| location_id.map_or(true, |id| schedule.location_id == id))
        .filter(|schedule| {
            window
                .as_ref()
                .map_or(true, |window| window.overlaps_days(schedule.bop, schedule.eop))
        })
        .cloned()
        .collect())
}

async fn list_schedules(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Response, Rejection> {
    let store = state.store.read().await;
    let schedules = schedules_in(&store, None, &params)?;
    Ok(paged(schedules, &params, &state.config))
}

async fn list_location_schedules(
    State(state): State<AppState>,
    Path(loc): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Response, Rejection> {
    let location_id = record_id(&loc)?;
    let store = state.store.read().await;
    store.location(location_id)?;
    let schedules = schedules_in(&store, Some(location_id), &params)?;
    Ok(paged(schedules, &params, &state.config))
}

async fn get_schedule(
    State(state): State<AppState>,
    Path(sch): Path<String>,
) -> Result<Json<Schedule>, Rejection> {
    let store = state.store.read().await;
    store
        .schedules
        .get(&record_id(&sch)?)
        .cloned()
        .map(Json)
        .ok_or_else(|| Rejection::not_found("schedule"))
}

async fn get_location_schedule(
    State(state): State<AppState>,
    Path((loc, sch)): Path<(String, String)>,
) -> Result<Json<Schedule>, Rejection> {
    let (location_id, id) = (record_id(&loc)?, record_id(&sch)?);
    let store = state.store.read().await;
    store
        .schedules
        .get(&id)
        .filter(|schedule| schedule.location_id == location_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| Rejection::not_found("schedule"))
}

async fn create_schedule(
    State(state): State<AppState>,
    Path(loc): Path<String>,
    Json(mut fields): Json<Fields>,
) -> Result<Response, Rejection> {
    let location_id = record_id(&loc)?;
    let bop: NaiveDate = required(&mut fields, "bop")?;
    let eop: NaiveDate = required(&mut fields, "eop")?;
    if eop < bop {
        return Err(Rejection::invalid("eop", "must not be before bop"));
    }
    for key in ["id", "location_id", "state"] {
        fields.remove(key);
    }
    let mut store = state.store.write().await;
    store.location(location_id)?;
    let id = store.add_schedule(location_id, bop, eop);
    let schedule = store.location_schedule_mut(location_id, id)?;
    schedule.extra = fields;
    info!("Created schedule {id} ({bop} to {eop}) in location {location_id}");
    Ok(created(schedule.clone()))
}

async fn update_schedule(
    State(state): State<AppState>,
    Path((loc, sch)): Path<(String, String)>,
    Json(mut fields): Json<Fields>,
) -> Result<Json<Schedule>, Rejection> {
    let (location_id, id) = (record_id(&loc)?, record_id(&sch)?);
    let action: Option<String> = take(&mut fields, "do")?;
    let bop: Option<NaiveDate> = take(&mut fields, "bop")?;
    let eop: Option<NaiveDate> = take(&mut fields, "eop")?;
    let mut store = state.store.write().await;
    let schedule = store.location_schedule_mut(location_id, id)?;
    match action.as_deref() {
        None => {}
        Some("publish") => {
            fields.remove("message");
            fields.remove("deliver_emails");
            schedule.state = "published".to_string();
            info!("Published schedule {id}");
        }
        Some(other) => return Err(Rejection::invalid("do", format!("unknown action '{other}'"))),
    }
    if let Some(bop) = bop {
        schedule.bop = bop;
    }
    if let Some(eop) = eop {
        schedule.eop = eop;
    }
    if let Some(new_state) = take::<String>(&mut fields, "state")? {
        schedule.state = new_state;
    }
    for key in ["id", "location_id"] {
        fields.remove(key);
    }
    schedule.extra.extend(fields);
    Ok(Json(schedule.clone()))
}

// --- shifts ---

async fn list_schedule_shifts(
    State(state): State<AppState>,
    Path(sch): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Response, Rejection> {
    let schedule_id = record_id(&sch)?;
    let store = state.store.read().await;
    if !store.schedules.contains_key(&schedule_id) {
        return Err(Rejection::not_found("schedule"));
    }
    let shifts = store
        .shifts
        .values()
        .filter(|shift| shift.schedule_id == schedule_id)
        .cloned()
        .collect();
    Ok(paged(shifts, &params, &state.config))
}

async fn list_location_shifts(
    State(state): State<AppState>,
    Path(loc): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Response, Rejection> {
    let location_id = record_id(&loc)?;
    let window = Window::from_params(&params)?;
    let store = state.store.read().await;
    store.location(location_id)?;
    let shifts = store
        .shifts
        .values()
        .filter(|shift| shift.location_id == location_id)
        .filter(|shift| params.department_id.map_or(true, |id| shift.department_id == id))
        .filter(|shift| window.as_ref().map_or(true, |window| window.contains(&shift.starts_at)))
        .cloned()
        .collect();
    Ok(paged(shifts, &params, &state.config))
}

async fn create_shift(
    State(state): State<AppState>,
    Path(sch): Path<String>,
    Json(mut fields): Json<Fields>,
) -> Result<Response, Rejection> {
    let schedule_id = record_id(&sch)?;
    let starts_at: DateTime<FixedOffset> = required(&mut fields, "starts_at")?;
    let ends_at: DateTime<FixedOffset> = required(&mut fields, "ends_at")?;
    if ends_at <= starts_at {
        return Err(Rejection::invalid("ends_at", "must be after starts_at"));
    }
    let department_id: i64 = required(&mut fields, "department_id")?;
    let location_id: Option<i64> = take(&mut fields, "location_id")?;
    let desired_coverage: Option<u32> = take(&mut fields, "desired_coverage")?;
    let note: Option<String> = take(&mut fields, "note")?;
    fields.remove("id");

    let mut store = state.store.write().await;
    let schedule_location = store
        .schedules
        .get(&schedule_id)
        .map(|schedule| schedule.location_id)
        .ok_or_else(|| Rejection::not_found("schedule"))?;
    let location_id = location_id.unwrap_or(schedule_location);
    store.department(location_id, department_id)?;
    let id = store.add_shift(schedule_id, department_id, starts_at, ends_at);
    let shift = store.schedule_shift_mut(schedule_id, id)?;
    shift.location_id = location_id;
    shift.desired_coverage = desired_coverage.unwrap_or(1);
    shift.note = note.unwrap_or_default();
    shift.extra = fields;
    info!("Created shift {id} in schedule {schedule_id} starting {starts_at}");
    Ok(created(shift.clone()))
}

async fn update_shift(
    State(state): State<AppState>,
    Path((sch, shift)): Path<(String, String)>,
    Json(mut fields): Json<Fields>,
) -> Result<Json<Shift>, Rejection> {
    let (schedule_id, id) = (record_id(&sch)?, record_id(&shift)?);
    let starts_at: Option<DateTime<FixedOffset>> = take(&mut fields, "starts_at")?;
    let ends_at: Option<DateTime<FixedOffset>> = take(&mut fields, "ends_at")?;
    let desired_coverage: Option<u32> = take(&mut fields, "desired_coverage")?;
    let note: Option<String> = take(&mut fields, "note")?;
    for key in ["id", "schedule_id", "location_id", "department_id", "user_ids"] {
        fields.remove(key);
    }
    let mut store = state.store.write().await;
    let shift = store.schedule_shift_mut(schedule_id, id)?;
    let starts_at = starts_at.unwrap_or(shift.starts_at);
    let ends_at = ends_at.unwrap_or(shift.ends_at);
    if ends_at <= starts_at {
        return Err(Rejection::invalid("ends_at", "must be after starts_at"));
    }
    shift.starts_at = starts_at;
    shift.ends_at = ends_at;
    if let Some(desired_coverage) = desired_coverage {
        shift.desired_coverage = desired_coverage;
    }
    if let Some(note) = note {
        shift.note = note;
    }
    shift.extra.extend(fields);
    Ok(Json(shift.clone()))
}

async fn assign_shift(
    State(state): State<AppState>,
    Path((sch, shift)): Path<(String, String)>,
    Json(body): Json<UserIds>,
) -> Result<Json<Shift>, Rejection> {
    let (schedule_id, id) = (record_id(&sch)?, record_id(&shift)?);
    let mut store = state.store.write().await;
    if let Some(unknown) = body
        .user_ids
        .iter()
        .find(|user_id| !store.users.contains_key(*user_id))
    {
        return Err(Rejection::invalid("user_ids", format!("unknown user {unknown}")));
    }
    let shift = store.schedule_shift_mut(schedule_id, id)?;
    for user_id in body.user_ids {
        push_unique(&mut shift.user_ids, user_id);
    }
    Ok(Json(shift.clone()))
}

// --- users ---

async fn list_users(State(state): State<AppState>, Query(params): Query<ListParams>) -> Response {
    let store = state.store.read().await;
    let users = store
        .users
        .values()
        .filter(|user| params.state.as_ref().map_or(true, |wanted| user.state == *wanted))
        .cloned()
        .collect();
    paged(users, &params, &state.config)
}

async fn list_location_users(
    State(state): State<AppState>,
    Path(loc): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Response, Rejection> {
    let location_id = record_id(&loc)?;
    let store = state.store.read().await;
    store.location(location_id)?;
    let users = store
        .users
        .values()
        .filter(|user| user.location_ids.contains(&location_id))
        .filter(|user| {
            params
                .department_id
                .map_or(true, |id| user.department_ids.contains(&id))
        })
        .cloned()
        .collect();
    Ok(paged(users, &params, &state.config))
}

async fn create_user(
    State(state): State<AppState>,
    Path(loc): Path<String>,
    Json(mut fields): Json<Fields>,
) -> Result<Response, Rejection> {
    let location_id = record_id(&loc)?;
    let action: Option<String> = take(&mut fields, "do")?;
    let invited = match action.as_deref() {
        None => false,
        Some("send_invitation") => true,
        Some(other) => return Err(Rejection::invalid("do", format!("unknown action '{other}'"))),
    };
    let email: Option<String> = if invited {
        Some(required(&mut fields, "email")?)
    } else {
        take(&mut fields, "email")?
    };
    let first_name: Option<String> = if invited {
        take(&mut fields, "first_name")?
    } else {
        Some(required(&mut fields, "first_name")?)
    };
    let last_name: Option<String> = take(&mut fields, "last_name")?;
    let department_ids: Vec<i64> = take(&mut fields, "department_ids")?.unwrap_or_default();
    for key in ["id", "state", "location_ids"] {
        fields.remove(key);
    }

    let mut store = state.store.write().await;
    store.location(location_id)?;
    if let Some(email) = &email {
        if store.users.values().any(|user| user.email.as_ref() == Some(email)) {
            return Err(Rejection::invalid("email", "has already been taken"));
        }
    }
    for department_id in &department_ids {
        store.department(location_id, *department_id)?;
    }
    let id = store.add_user(location_id, "", "");
    for department_id in &department_ids {
        if let Some(department) = store.departments.get_mut(department_id) {
            push_unique(&mut department.user_ids, id);
        }
    }
    let user = store
        .users
        .get_mut(&id)
        .ok_or_else(|| Rejection::not_found("user"))?;
    user.first_name = first_name;
    user.last_name = last_name;
    user.email = email;
    user.department_ids = department_ids;
    user.extra = fields;
    if invited {
        user.state = "invited".to_string();
    }
    info!("Created user {id} in location {location_id} ({})", user.state);
    Ok(created(user.clone()))
}

async fn update_user(
    State(state): State<AppState>,
    Path((loc, user)): Path<(String, String)>,
    Json(mut fields): Json<Fields>,
) -> Result<Json<User>, Rejection> {
    let (location_id, id) = (record_id(&loc)?, record_id(&user)?);
    let action: Option<String> = take(&mut fields, "do")?;
    let new_state = match action.as_deref() {
        None => None,
        Some("lock") => Some("locked"),
        Some("unlock") => Some("active"),
        Some(other) => return Err(Rejection::invalid("do", format!("unknown action '{other}'"))),
    };
    let first_name: Option<String> = take(&mut fields, "first_name")?;
    let last_name: Option<String> = take(&mut fields, "last_name")?;
    let email: Option<String> = take(&mut fields, "email")?;
    for key in ["id", "state", "location_ids", "department_ids"] {
        fields.remove(key);
    }
    let mut store = state.store.write().await;
    let user = store.location_user_mut(location_id, id)?;
    if let Some(new_state) = new_state {
        info!("User {id} is now {new_state}");
        user.state = new_state.to_string();
    }
    if first_name.is_some() {
        user.first_name = first_name;
    }
    if last_name.is_some() {
        user.last_name = last_name;
    }
    if email.is_some() {
        user.email = email;
    }
    user.extra.extend(fields);
    Ok(Json(user.clone()))
}

// --- events ---

async fn list_events(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Response, Rejection> {
    let window = Window::from_params(&params)?;
    let store = state.store.read().await;
    let events = store
        .events
        .values()
        .filter(|event| window.as_ref().map_or(true, |window| window.contains(&event.starts_at)))
        .cloned()
        .collect();
    Ok(paged(events, &params, &state.config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_id_accepts_json_suffix() {
        assert_eq!(record_id("5.json").unwrap(), 5);
        assert_eq!(record_id("51").unwrap(), 51);
        assert_eq!(record_id("abc.json").unwrap_err().status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn timestamp_accepts_offset_sent_as_space() {
        let parsed = timestamp("2023-06-01T00:00:00 01:00").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2023-06-01T00:00:00+01:00");
        assert_eq!(timestamp("yesterday").unwrap_err().status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn window_requires_both_bounds() {
        let params = ListParams {
            from: Some("2023-06-01T00:00:00+01:00".to_string()),
            ..ListParams::default()
        };
        assert!(Window::from_params(&params).is_err());
        assert!(Window::from_params(&ListParams::default()).unwrap().is_none());
    }

    #[test]
    fn window_compares_instants_across_offsets() {
        let window = Window {
            from: timestamp("2023-06-01T00:00:00+01:00").unwrap(),
            until: timestamp("2023-06-01T23:59:59+01:00").unwrap(),
        };
        assert!(window.contains(&timestamp("2023-05-31T23:30:00+00:00").unwrap()));
        assert!(!window.contains(&timestamp("2023-06-01T23:30:00+00:00").unwrap()));
    }

    #[test]
    fn take_treats_null_as_absent() {
        let mut fields = json!({ "note": null, "desired_coverage": "two" })
            .as_object()
            .cloned()
            .unwrap();
        assert_eq!(take::<String>(&mut fields, "note").unwrap(), None);
        let err = take::<u32>(&mut fields, "desired_coverage").unwrap_err();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(fields.is_empty());
    }

    #[test]
    fn store_ids_are_unique_across_kinds() {
        let mut store = Store::new();
        let location = store.add_location("Soho");
        let department = store.add_department(location, "Kitchen");
        let user = store.add_user(location, "Ada", "Lovelace");
        assert_eq!((location, department, user), (1, 2, 3));
        assert!(store.location_name_taken("Soho", None));
        assert!(!store.location_name_taken("Soho", Some(location)));
        assert!(store.department_name_taken(location, "Kitchen", None));
    }

    #[test]
    fn location_serializes_settings_inline() {
        let mut extra = Fields::new();
        extra.insert("swap_shifts".to_string(), json!(true));
        let location = Location {
            id: 5,
            name: "Soho".to_string(),
            extra,
        };
        assert_eq!(
            serde_json::to_value(&location).unwrap(),
            json!({ "id": 5, "name": "Soho", "swap_shifts": true })
        );
    }
}
