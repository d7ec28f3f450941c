//! Account handle composing the client, paginator, time zone and name caches.
//!
//! # Design
//! Opening a session costs one account fetch plus N+1 paginated fetches for
//! N locations (the location list, then each location's departments). After
//! that every name-addressed call resolves locally. The caches change only
//! after a mutation the backend confirmed with a success status, and then
//! they follow the record the backend returned rather than the caller's
//! arguments.
//!
//! There is no internal locking: reads take `&self`, index-patching
//! mutations take `&mut self`. Share a session between threads behind a
//! `Mutex`.

use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::client::StaffoClient;
use crate::config::SessionConfig;
use crate::error::ApiError;
use crate::http::HttpRequest;
use crate::index::{DepartmentIndex, Directory, LocationIndex, NameIndex};
use crate::paginate::Paginator;
use crate::transport::{Transport, UreqTransport};
use crate::types::{
    Account, Department, Event, Fields, Invitation, Location, MutationOutcome, NewDepartment,
    NewLocation, NewSchedule, NewShift, NewUser, Payload, PublishSchedule, Schedule, Shift,
    ShiftPayload, User, UserAction,
};
use crate::window::{DateWindow, Timezone};

/// The part of a location or department response the caches care about.
#[derive(Deserialize)]
struct Named {
    id: i64,
    name: String,
}

pub struct Session<T: Transport = UreqTransport> {
    client: StaffoClient,
    transport: T,
    paginator: Paginator,
    timezone: Timezone,
    directory: Directory,
}

impl Session<UreqTransport> {
    /// Connect over HTTP and build the name caches.
    pub fn open(config: SessionConfig) -> Result<Self, ApiError> {
        Self::open_with(config, UreqTransport::new())
    }
}

impl<T: Transport> Session<T> {
    pub fn open_with(config: SessionConfig, transport: T) -> Result<Self, ApiError> {
        let client = StaffoClient::new(&config.base_url, config.credential);
        let paginator = Paginator::new(config.page_policy);

        let account = client.parse_account(transport.execute(&client.build_account())?)?;
        let timezone = Timezone::parse(&account.time_zone)?;
        let directory = load_directory(&client, &transport, &paginator)?;
        info!(
            "Opened session for {} ({} locations, time zone {})",
            client.base_url(),
            directory.locations().len(),
            timezone.name()
        );

        Ok(Self {
            client,
            transport,
            paginator,
            timezone,
            directory,
        })
    }

    /// Throw the caches away and rebuild them from the backend.
    pub fn reload_directory(&mut self) -> Result<(), ApiError> {
        self.directory = load_directory(&self.client, &self.transport, &self.paginator)?;
        Ok(())
    }

    pub fn client(&self) -> &StaffoClient {
        &self.client
    }

    pub fn timezone(&self) -> &Timezone {
        &self.timezone
    }

    pub fn locations(&self) -> &LocationIndex {
        self.directory.locations()
    }

    pub fn departments(&self) -> &DepartmentIndex {
        self.directory.departments()
    }

    pub fn location_id(&self, location: &str) -> Result<i64, ApiError> {
        self.directory.location_id(location)
    }

    pub fn department_id(&self, location: &str, department: &str) -> Result<i64, ApiError> {
        self.directory.department_id(location, department)
    }

    fn fetch<R: DeserializeOwned>(&self, request: HttpRequest) -> Result<R, ApiError> {
        self.client.parse_record(self.transport.execute(&request)?)
    }

    fn fetch_all<R: DeserializeOwned>(&self, request: HttpRequest) -> Result<Vec<R>, ApiError> {
        self.paginator.fetch_all(&self.transport, &request)
    }

    fn mutate(&self, request: HttpRequest) -> Result<MutationOutcome, ApiError> {
        let outcome = self.client.parse_mutation(self.transport.execute(&request)?);
        if !outcome.is_success() {
            warn!(
                "{} {} rejected with HTTP {}",
                request.method.as_str(),
                request.path,
                outcome.status
            );
        }
        Ok(outcome)
    }

    fn window(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Option<DateWindow> {
        DateWindow::optional(&self.timezone, start, end)
    }

    // --- reads ---

    pub fn account(&self) -> Result<Account, ApiError> {
        self.client
            .parse_account(self.transport.execute(&self.client.build_account())?)
    }

    pub fn location(&self, location: &str) -> Result<Location, ApiError> {
        let location_id = self.location_id(location)?;
        self.fetch(self.client.build_get_location(location_id))
    }

    pub fn department(&self, location: &str, department: &str) -> Result<Department, ApiError> {
        let location_id = self.location_id(location)?;
        let department_id = self.department_id(location, department)?;
        self.fetch(self.client.build_get_department(location_id, department_id))
    }

    /// All users of the account, optionally only those in `state`.
    pub fn users(&self, state: Option<&str>) -> Result<Vec<User>, ApiError> {
        self.fetch_all(self.client.build_list_users(state))
    }

    pub fn location_users(
        &self,
        location: &str,
        department: Option<&str>,
    ) -> Result<Vec<User>, ApiError> {
        let location_id = self.location_id(location)?;
        let department_id = department
            .map(|department| self.department_id(location, department))
            .transpose()?;
        self.fetch_all(
            self.client
                .build_list_location_users(location_id, department_id),
        )
    }

    pub fn schedule(&self, schedule_id: i64) -> Result<Schedule, ApiError> {
        self.fetch(self.client.build_get_schedule(schedule_id))
    }

    /// Schedules of every location. Without `start` no date filter is sent;
    /// without `end` the window closes now.
    pub fn schedules(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<Schedule>, ApiError> {
        let window = self.window(start, end);
        self.fetch_all(self.client.build_list_schedules(window.as_ref()))
    }

    pub fn location_schedule(&self, location: &str, schedule_id: i64) -> Result<Schedule, ApiError> {
        let location_id = self.location_id(location)?;
        self.fetch(
            self.client
                .build_get_location_schedule(location_id, schedule_id),
        )
    }

    pub fn location_schedules(
        &self,
        location: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<Schedule>, ApiError> {
        let location_id = self.location_id(location)?;
        let window = self.window(start, end);
        self.fetch_all(
            self.client
                .build_list_location_schedules(location_id, window.as_ref()),
        )
    }

    pub fn schedule_shifts(&self, schedule_id: i64) -> Result<Vec<Shift>, ApiError> {
        self.fetch_all(self.client.build_list_schedule_shifts(schedule_id))
    }

    pub fn location_shifts(
        &self,
        location: &str,
        department: Option<&str>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<Shift>, ApiError> {
        let location_id = self.location_id(location)?;
        let department_id = department
            .map(|department| self.department_id(location, department))
            .transpose()?;
        let window = self.window(start, end);
        self.fetch_all(self.client.build_list_location_shifts(
            location_id,
            department_id,
            window.as_ref(),
        ))
    }

    pub fn events(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<Event>, ApiError> {
        let window = self.window(start, end);
        self.fetch_all(self.client.build_list_events(window.as_ref()))
    }

    // --- mutations that patch the caches ---

    /// Apply `changes` to a location. A confirmed rename is reflected in both
    /// caches, keyed by the id the backend returned.
    pub fn update_location(
        &mut self,
        location: &str,
        changes: &Fields,
    ) -> Result<MutationOutcome, ApiError> {
        let location_id = self.location_id(location)?;
        let outcome = self.mutate(self.client.build_update_location(location_id, changes)?)?;
        if outcome.is_success() {
            match confirmed_name(&outcome, location_id, changes) {
                Some((id, name)) => {
                    self.directory.location_renamed(id, &name);
                    info!("Location {id} is now cached as '{name}'");
                }
                None => warn!("Location {location_id} updated but its name could not be confirmed"),
            }
        }
        Ok(outcome)
    }

    pub fn update_department(
        &mut self,
        location: &str,
        department: &str,
        changes: &Fields,
    ) -> Result<MutationOutcome, ApiError> {
        let location_id = self.location_id(location)?;
        let department_id = self.department_id(location, department)?;
        let outcome = self.mutate(self.client.build_update_department(
            location_id,
            department_id,
            changes,
        )?)?;
        if outcome.is_success() {
            match confirmed_name(&outcome, department_id, changes) {
                Some((id, name)) => match self.directory.department_renamed(id, &name) {
                    Some((owner, old_name)) => {
                        info!("Department {id} in '{owner}' renamed from '{old_name}' to '{name}'")
                    }
                    None => debug!("Department {id} is not cached; nothing to rename"),
                },
                None => {
                    warn!("Department {department_id} updated but its name could not be confirmed")
                }
            }
        }
        Ok(outcome)
    }

    pub fn create_location(&mut self, location: &NewLocation) -> Result<MutationOutcome, ApiError> {
        let outcome = self.mutate(self.client.build_create_location(location)?)?;
        if outcome.is_success() {
            match outcome.json::<Named>() {
                Ok(created) => {
                    self.directory.location_created(&created.name, created.id);
                    info!("Location '{}' cached with id {}", created.name, created.id);
                }
                Err(e) => warn!("Location '{}' created but not cached: {e}", location.name),
            }
        }
        Ok(outcome)
    }

    pub fn create_department(
        &mut self,
        location: &str,
        department: &NewDepartment,
    ) -> Result<MutationOutcome, ApiError> {
        let location_id = self.location_id(location)?;
        let outcome = self.mutate(
            self.client
                .build_create_department(location_id, department)?,
        )?;
        if outcome.is_success() {
            match outcome.json::<Named>() {
                Ok(created) => {
                    self.directory
                        .department_created(location, &created.name, created.id);
                    info!(
                        "Department '{}' in '{location}' cached with id {}",
                        created.name, created.id
                    );
                }
                Err(e) => warn!("Department '{}' created but not cached: {e}", department.name),
            }
        }
        Ok(outcome)
    }

    // --- other mutations ---

    pub fn add_users(
        &self,
        location: &str,
        department: &str,
        user_ids: &[i64],
    ) -> Result<MutationOutcome, ApiError> {
        let location_id = self.location_id(location)?;
        let department_id = self.department_id(location, department)?;
        self.mutate(
            self.client
                .build_add_users(location_id, department_id, user_ids)?,
        )
    }

    pub fn remove_users(
        &self,
        location: &str,
        department: &str,
        user_ids: &[i64],
    ) -> Result<MutationOutcome, ApiError> {
        let location_id = self.location_id(location)?;
        let department_id = self.department_id(location, department)?;
        self.mutate(
            self.client
                .build_remove_users(location_id, department_id, user_ids)?,
        )
    }

    /// Publishing is a separate call: see [`Session::publish_schedule`].
    pub fn update_schedule(
        &self,
        location: &str,
        schedule_id: i64,
        changes: &Fields,
    ) -> Result<MutationOutcome, ApiError> {
        let location_id = self.location_id(location)?;
        self.mutate(
            self.client
                .build_update_schedule(location_id, schedule_id, changes)?,
        )
    }

    pub fn publish_schedule(
        &self,
        location: &str,
        schedule_id: i64,
    ) -> Result<MutationOutcome, ApiError> {
        let location_id = self.location_id(location)?;
        let body = PublishSchedule::default().to_body()?;
        self.mutate(
            self.client
                .build_update_schedule(location_id, schedule_id, &body)?,
        )
    }

    pub fn update_user(
        &self,
        location: &str,
        user_id: i64,
        changes: &Fields,
    ) -> Result<MutationOutcome, ApiError> {
        let location_id = self.location_id(location)?;
        self.mutate(self.client.build_update_user(location_id, user_id, changes)?)
    }

    pub fn lock_user(&self, location: &str, user_id: i64) -> Result<MutationOutcome, ApiError> {
        let location_id = self.location_id(location)?;
        self.mutate(
            self.client
                .build_user_action(location_id, user_id, &UserAction::lock())?,
        )
    }

    pub fn unlock_user(&self, location: &str, user_id: i64) -> Result<MutationOutcome, ApiError> {
        let location_id = self.location_id(location)?;
        self.mutate(
            self.client
                .build_user_action(location_id, user_id, &UserAction::unlock())?,
        )
    }

    pub fn update_shift(
        &self,
        schedule_id: i64,
        shift_id: i64,
        changes: &Fields,
    ) -> Result<MutationOutcome, ApiError> {
        self.mutate(self.client.build_update_shift(schedule_id, shift_id, changes)?)
    }

    pub fn assign_shift(
        &self,
        schedule_id: i64,
        shift_id: i64,
        user_ids: &[i64],
    ) -> Result<MutationOutcome, ApiError> {
        self.mutate(
            self.client
                .build_assign_shift(schedule_id, shift_id, user_ids)?,
        )
    }

    pub fn create_schedule(
        &self,
        location: &str,
        schedule: &NewSchedule,
    ) -> Result<MutationOutcome, ApiError> {
        let location_id = self.location_id(location)?;
        self.mutate(self.client.build_create_schedule(location_id, schedule)?)
    }

    pub fn create_user(&self, location: &str, user: &NewUser) -> Result<MutationOutcome, ApiError> {
        let location_id = self.location_id(location)?;
        self.mutate(self.client.build_create_user(location_id, user)?)
    }

    /// Invite `email` to the location, joining the given departments.
    pub fn invite_user(
        &self,
        location: &str,
        email: &str,
        department_ids: &[i64],
    ) -> Result<MutationOutcome, ApiError> {
        let location_id = self.location_id(location)?;
        let invitation = Invitation::new(email, department_ids.to_vec());
        self.mutate(self.client.build_create_user(location_id, &invitation)?)
    }

    /// Create a shift; its local start and end get the account's offset.
    pub fn create_shift(
        &self,
        location: &str,
        department: &str,
        schedule_id: i64,
        shift: &NewShift,
    ) -> Result<MutationOutcome, ApiError> {
        let payload = ShiftPayload {
            starts_at: self.timezone.format_local(shift.starts_at),
            ends_at: self.timezone.format_local(shift.ends_at),
            location_id: self.location_id(location)?,
            department_id: self.department_id(location, department)?,
            desired_coverage: shift.desired_coverage,
            note: shift.note.clone(),
            overrides: shift.overrides.clone(),
        };
        self.mutate(self.client.build_create_shift(schedule_id, &payload)?)
    }
}

fn load_directory<T: Transport + ?Sized>(
    client: &StaffoClient,
    transport: &T,
    paginator: &Paginator,
) -> Result<Directory, ApiError> {
    let locations: Vec<Location> = paginator.fetch_all(transport, &client.build_list_locations())?;
    let mut directory = Directory::new();
    for location in locations {
        let departments: Vec<Department> =
            paginator.fetch_all(transport, &client.build_list_departments(location.id))?;
        debug!(
            "Location '{}' ({}) has {} departments",
            location.name,
            location.id,
            departments.len()
        );
        let departments: NameIndex = departments
            .into_iter()
            .map(|department| (department.name, department.id))
            .collect();
        directory.insert_location(&location.name, location.id, departments);
    }
    Ok(directory)
}

/// Id and name after a successful update: the backend's record when the body
/// decodes, otherwise the addressed id with the requested name.
fn confirmed_name(outcome: &MutationOutcome, addressed_id: i64, changes: &Fields) -> Option<(i64, String)> {
    match outcome.json::<Named>() {
        Ok(record) => Some((record.id, record.name)),
        Err(_) => changes
            .get("name")
            .and_then(Value::as_str)
            .map(|name| (addressed_id, name.to_string())),
    }
}
