//! Stateless HTTP request builder and response parser for the Staffomatic API.
//!
//! # Design
//! `StaffoClient` holds only the base URL and the credential. Each endpoint
//! has a `build_*` method producing an `HttpRequest`; responses go through
//! `parse_*`. Collection requests are handed to the `Paginator`, which adds
//! the paging parameters itself. Endpoint paths match the backend's
//! `.json`-suffixed routes byte for byte.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::Credential;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{Account, Fields, MutationOutcome, Payload, UserAction, UserIds};
use crate::window::DateWindow;

#[derive(Debug, Clone)]
pub struct StaffoClient {
    base_url: String,
    credential: Credential,
}

impl StaffoClient {
    pub fn new(base_url: &str, credential: Credential) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credential,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    fn get(&self, path: &str) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            path: self.url(path),
            query: Vec::new(),
            headers: vec![
                ("authorization".to_string(), self.credential.authorization()),
                ("accept".to_string(), "application/json".to_string()),
            ],
            body: None,
        }
    }

    fn send<B: Serialize + ?Sized>(
        &self,
        method: HttpMethod,
        path: &str,
        body: &B,
    ) -> Result<HttpRequest, ApiError> {
        let body =
            serde_json::to_string(body).map_err(|e| ApiError::Serialization(e.to_string()))?;
        Ok(HttpRequest {
            method,
            path: self.url(path),
            query: Vec::new(),
            headers: vec![
                ("authorization".to_string(), self.credential.authorization()),
                ("accept".to_string(), "application/json".to_string()),
                ("content-type".to_string(), "application/json".to_string()),
            ],
            body: Some(body),
        })
    }

    fn send_payload<P: Payload>(
        &self,
        method: HttpMethod,
        path: &str,
        payload: &P,
    ) -> Result<HttpRequest, ApiError> {
        self.send(method, path, &payload.to_body()?)
    }

    fn windowed(mut request: HttpRequest, window: Option<&DateWindow>) -> HttpRequest {
        if let Some(window) = window {
            request.query.extend(window.query());
        }
        request
    }

    // --- reads ---

    pub fn build_account(&self) -> HttpRequest {
        self.get("account.json")
    }

    pub fn build_list_locations(&self) -> HttpRequest {
        self.get("locations.json")
    }

    pub fn build_get_location(&self, location_id: i64) -> HttpRequest {
        self.get(&format!("locations/{location_id}.json"))
    }

    pub fn build_list_departments(&self, location_id: i64) -> HttpRequest {
        self.get(&format!("locations/{location_id}/departments.json"))
    }

    pub fn build_get_department(&self, location_id: i64, department_id: i64) -> HttpRequest {
        self.get(&format!(
            "locations/{location_id}/departments/{department_id}.json"
        ))
    }

    pub fn build_list_users(&self, state: Option<&str>) -> HttpRequest {
        let mut request = self.get("users.json");
        if let Some(state) = state {
            request.query.push(("state".to_string(), state.to_string()));
        }
        request
    }

    pub fn build_list_location_users(
        &self,
        location_id: i64,
        department_id: Option<i64>,
    ) -> HttpRequest {
        let mut request = self.get(&format!("locations/{location_id}/users.json"));
        if let Some(department_id) = department_id {
            request
                .query
                .push(("department_ids[]".to_string(), department_id.to_string()));
        }
        request
    }

    pub fn build_list_schedules(&self, window: Option<&DateWindow>) -> HttpRequest {
        Self::windowed(self.get("schedules.json"), window)
    }

    pub fn build_get_schedule(&self, schedule_id: i64) -> HttpRequest {
        self.get(&format!("schedules/{schedule_id}.json"))
    }

    pub fn build_list_location_schedules(
        &self,
        location_id: i64,
        window: Option<&DateWindow>,
    ) -> HttpRequest {
        Self::windowed(
            self.get(&format!("locations/{location_id}/schedules.json")),
            window,
        )
    }

    pub fn build_get_location_schedule(&self, location_id: i64, schedule_id: i64) -> HttpRequest {
        self.get(&format!(
            "locations/{location_id}/schedules/{schedule_id}.json"
        ))
    }

    pub fn build_list_schedule_shifts(&self, schedule_id: i64) -> HttpRequest {
        self.get(&format!("schedules/{schedule_id}/shifts.json"))
    }

    pub fn build_list_location_shifts(
        &self,
        location_id: i64,
        department_id: Option<i64>,
        window: Option<&DateWindow>,
    ) -> HttpRequest {
        let mut request = self.get(&format!("locations/{location_id}/shifts.json"));
        if let Some(department_id) = department_id {
            request
                .query
                .push(("department_ids[]".to_string(), department_id.to_string()));
        }
        Self::windowed(request, window)
    }

    pub fn build_list_events(&self, window: Option<&DateWindow>) -> HttpRequest {
        Self::windowed(self.get("events.json"), window)
    }

    // --- mutations ---

    pub fn build_add_users(
        &self,
        location_id: i64,
        department_id: i64,
        user_ids: &[i64],
    ) -> Result<HttpRequest, ApiError> {
        self.send(
            HttpMethod::Put,
            &format!("locations/{location_id}/departments/{department_id}/add_users.json"),
            &UserIds {
                user_ids: user_ids.to_vec(),
            },
        )
    }

    pub fn build_remove_users(
        &self,
        location_id: i64,
        department_id: i64,
        user_ids: &[i64],
    ) -> Result<HttpRequest, ApiError> {
        self.send(
            HttpMethod::Put,
            &format!("locations/{location_id}/departments/{department_id}/remove_users.json"),
            &UserIds {
                user_ids: user_ids.to_vec(),
            },
        )
    }

    pub fn build_update_location(
        &self,
        location_id: i64,
        changes: &Fields,
    ) -> Result<HttpRequest, ApiError> {
        self.send(HttpMethod::Put, &format!("locations/{location_id}.json"), changes)
    }

    pub fn build_update_department(
        &self,
        location_id: i64,
        department_id: i64,
        changes: &Fields,
    ) -> Result<HttpRequest, ApiError> {
        self.send(
            HttpMethod::Put,
            &format!("locations/{location_id}/departments/{department_id}.json"),
            changes,
        )
    }

    pub fn build_update_schedule<P: Serialize + ?Sized>(
        &self,
        location_id: i64,
        schedule_id: i64,
        changes: &P,
    ) -> Result<HttpRequest, ApiError> {
        self.send(
            HttpMethod::Put,
            &format!("locations/{location_id}/schedules/{schedule_id}.json"),
            changes,
        )
    }

    pub fn build_update_user(
        &self,
        location_id: i64,
        user_id: i64,
        changes: &Fields,
    ) -> Result<HttpRequest, ApiError> {
        self.send(
            HttpMethod::Put,
            &format!("locations/{location_id}/users/{user_id}.json"),
            changes,
        )
    }

    pub fn build_user_action(
        &self,
        location_id: i64,
        user_id: i64,
        action: &UserAction,
    ) -> Result<HttpRequest, ApiError> {
        self.send(
            HttpMethod::Put,
            &format!("locations/{location_id}/users/{user_id}.json"),
            action,
        )
    }

    pub fn build_update_shift(
        &self,
        schedule_id: i64,
        shift_id: i64,
        changes: &Fields,
    ) -> Result<HttpRequest, ApiError> {
        self.send(
            HttpMethod::Put,
            &format!("schedules/{schedule_id}/shifts/{shift_id}.json"),
            changes,
        )
    }

    pub fn build_assign_shift(
        &self,
        schedule_id: i64,
        shift_id: i64,
        user_ids: &[i64],
    ) -> Result<HttpRequest, ApiError> {
        self.send(
            HttpMethod::Put,
            &format!("schedules/{schedule_id}/shifts/{shift_id}/assign.json"),
            &UserIds {
                user_ids: user_ids.to_vec(),
            },
        )
    }

    pub fn build_create_location<P: Payload>(&self, location: &P) -> Result<HttpRequest, ApiError> {
        self.send_payload(HttpMethod::Post, "locations.json", location)
    }

    pub fn build_create_department<P: Payload>(
        &self,
        location_id: i64,
        department: &P,
    ) -> Result<HttpRequest, ApiError> {
        self.send_payload(
            HttpMethod::Post,
            &format!("locations/{location_id}/departments.json"),
            department,
        )
    }

    pub fn build_create_schedule<P: Payload>(
        &self,
        location_id: i64,
        schedule: &P,
    ) -> Result<HttpRequest, ApiError> {
        self.send_payload(
            HttpMethod::Post,
            &format!("locations/{location_id}/schedules.json"),
            schedule,
        )
    }

    /// Used for both user creation and invitations.
    pub fn build_create_user<P: Payload>(
        &self,
        location_id: i64,
        user: &P,
    ) -> Result<HttpRequest, ApiError> {
        self.send_payload(
            HttpMethod::Post,
            &format!("locations/{location_id}/users.json"),
            user,
        )
    }

    pub fn build_create_shift<P: Payload>(
        &self,
        schedule_id: i64,
        shift: &P,
    ) -> Result<HttpRequest, ApiError> {
        self.send_payload(
            HttpMethod::Post,
            &format!("schedules/{schedule_id}/shifts.json"),
            shift,
        )
    }

    // --- parsing ---

    /// The account is the first thing fetched; any refusal means the
    /// credentials or subdomain are wrong.
    pub fn parse_account(&self, response: HttpResponse) -> Result<Account, ApiError> {
        if !response.is_success() {
            return Err(ApiError::Authentication {
                status: response.status,
                body: response.body,
            });
        }
        decode(&response.body)
    }

    pub fn parse_record<R: DeserializeOwned>(&self, response: HttpResponse) -> Result<R, ApiError> {
        check_status(&response)?;
        decode(&response.body)
    }

    pub fn parse_mutation(&self, response: HttpResponse) -> MutationOutcome {
        MutationOutcome {
            status: response.status,
            body: response.body,
        }
    }
}

fn decode<R: DeserializeOwned>(body: &str) -> Result<R, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::Deserialization(e.to_string()))
}

/// Map non-success status codes to the appropriate `ApiError` variant.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    if response.status == 404 {
        return Err(ApiError::NotFound(response.body.clone()));
    }
    Err(ApiError::Http {
        status: response.status,
        body: response.body.clone(),
    })
}
