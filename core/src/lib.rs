//! Blocking client for the Staffomatic scheduling API.
//!
//! # Overview
//! A [`Session`] logs into one account, learns its time zone and caches the
//! location and department names so callers can address records by name.
//! Collection reads are paginated transparently; create and update calls
//! report the backend's verdict as a [`MutationOutcome`].
//!
//! # Design
//! - `StaffoClient` is stateless apart from base URL and credential. It splits
//!   every operation into `build_*` (produces an `HttpRequest`) and `parse_*`
//!   (consumes an `HttpResponse`), so the I/O boundary stays explicit.
//! - The round-trip itself goes through the [`Transport`] trait. `UreqTransport`
//!   is the default; tests substitute a scripted one.
//! - `Paginator` and the name caches are independent of each other and of the
//!   transport, and are only composed in `Session`.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod index;
pub mod paginate;
pub mod session;
pub mod transport;
pub mod types;
pub mod window;

#[cfg(test)]
mod testing;

pub use client::StaffoClient;
pub use config::{Credential, SessionConfig};
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use index::{DepartmentIndex, Directory, LocationIndex, NameIndex};
pub use paginate::{PagePolicy, Paginator};
pub use session::Session;
pub use transport::{Transport, UreqTransport};
pub use types::{
    Account, Department, Event, Fields, Invitation, Location, MutationOutcome, NewDepartment,
    NewLocation, NewSchedule, NewShift, NewUser, Payload, PublishSchedule, Schedule, Shift,
    ShiftPayload, User, UserAction, UserIds,
};
pub use window::{DateWindow, Timezone};
