//! End-to-end session tests against the live mock server.
//!
//! # Design
//! Each test starts the mock server on a random port in its own thread, then
//! drives a `Session` over real HTTP through `UreqTransport`. This checks the
//! request shapes, the paging contract and the cache patching against an
//! actual backend instead of scripted responses.

use std::net::SocketAddr;

use chrono::NaiveDate;
use mock_server::{MockConfig, Store};
use serde_json::json;
use staffo_core::{
    ApiError, Credential, Fields, NewDepartment, NewLocation, NewSchedule, NewShift, NewUser,
    PagePolicy, Schedule, Session, SessionConfig,
};

const USERS: usize = 647;

/// Start the mock server on a random port and return its address.
fn spawn(config: MockConfig, store: Store) -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener, mock_server::app(config, store)).await
        })
        .unwrap();
    });

    addr
}

/// Soho with Kitchen and Bar, Mayfair with Kitchen, and `USERS` staff in Soho.
fn seeded() -> Store {
    let mut store = Store::new();
    let soho = store.add_location("Soho");
    store.add_department(soho, "Kitchen");
    store.add_department(soho, "Bar");
    let mayfair = store.add_location("Mayfair");
    store.add_department(mayfair, "Kitchen");
    for n in 0..USERS {
        store.add_user(soho, "Staff", &n.to_string());
    }
    store
}

fn session_config(addr: SocketAddr, password: &str) -> SessionConfig {
    SessionConfig::new(&format!("http://{addr}"), Credential::new("admin", password))
}

fn changes(value: serde_json::Value) -> Fields {
    value.as_object().cloned().unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn session_lifecycle() {
    let addr = spawn(MockConfig::default(), seeded());

    // Step 1: open, which builds both caches.
    let mut session = Session::open(session_config(addr, "secret")).unwrap();
    assert_eq!(session.timezone().name(), "Europe/London");
    assert_eq!(session.locations().len(), 2);
    let soho = session.location_id("Soho").unwrap();
    let soho_kitchen = session.department_id("Soho", "Kitchen").unwrap();
    let mayfair_kitchen = session.department_id("Mayfair", "Kitchen").unwrap();
    assert_ne!(soho_kitchen, mayfair_kitchen);

    // Step 2: paginated read spans three pages.
    let users = session.users(None).unwrap();
    assert_eq!(users.len(), USERS);
    let mut ids: Vec<i64> = users.iter().map(|user| user.id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), USERS);

    // Step 3: confirmed rename moves the department mapping.
    let outcome = session
        .update_location("Soho", &changes(json!({ "name": "Fitzrovia" })))
        .unwrap();
    assert!(outcome.is_success());
    assert_eq!(session.location_id("Fitzrovia").unwrap(), soho);
    assert!(matches!(session.location_id("Soho"), Err(ApiError::NotFound(_))));
    assert_eq!(session.department_id("Fitzrovia", "Bar").unwrap(), soho_kitchen + 1);
    assert_eq!(session.location("Fitzrovia").unwrap().name, "Fitzrovia");

    // Step 4: a rejected rename leaves the caches alone.
    let outcome = session
        .update_location("Mayfair", &changes(json!({ "name": "Fitzrovia" })))
        .unwrap();
    assert_eq!(outcome.status, 422);
    assert_eq!(session.location_id("Fitzrovia").unwrap(), soho);
    assert!(session.location_id("Mayfair").is_ok());

    // Step 5: created records become addressable by name.
    let outcome = session
        .create_department("Mayfair", &NewDepartment::new("Bar"))
        .unwrap();
    assert_eq!(outcome.status, 201);
    let mayfair_bar = session.department_id("Mayfair", "Bar").unwrap();
    assert_eq!(session.department("Mayfair", "Bar").unwrap().id, mayfair_bar);

    session.create_location(&NewLocation::new("Camden")).unwrap();
    assert!(session.location("Camden").is_ok());

    // Step 6: department rename stays inside its location.
    session
        .update_department("Fitzrovia", "Kitchen", &changes(json!({ "name": "Pastry" })))
        .unwrap();
    assert_eq!(session.department_id("Fitzrovia", "Pastry").unwrap(), soho_kitchen);
    assert_eq!(session.department_id("Mayfair", "Kitchen").unwrap(), mayfair_kitchen);
}

#[test]
fn schedule_and_shift_flow() {
    let addr = spawn(MockConfig::default(), seeded());
    let session = Session::open(session_config(addr, "secret")).unwrap();

    let outcome = session
        .create_schedule("Soho", &NewSchedule::new("2023-06-05", "2023-06-11"))
        .unwrap();
    assert_eq!(outcome.status, 201);
    let schedule: Schedule = outcome.json().unwrap();

    let shift = NewShift::new(
        date(2023, 6, 6).and_hms_opt(9, 0, 0).unwrap(),
        date(2023, 6, 6).and_hms_opt(17, 0, 0).unwrap(),
    )
    .desired_coverage(2);
    let outcome = session
        .create_shift("Soho", "Kitchen", schedule.id, &shift)
        .unwrap();
    assert_eq!(outcome.status, 201);

    let shifts = session
        .location_shifts("Soho", Some("Kitchen"), Some(date(2023, 6, 6)), Some(date(2023, 6, 6)))
        .unwrap();
    assert_eq!(shifts.len(), 1);
    assert_eq!(shifts[0].starts_at.as_deref(), Some("2023-06-06T09:00:00+01:00"));
    assert_eq!(shifts[0].desired_coverage, Some(2));

    let none = session
        .location_shifts("Soho", Some("Bar"), Some(date(2023, 6, 6)), Some(date(2023, 6, 6)))
        .unwrap();
    assert!(none.is_empty());

    let user = session.users(None).unwrap()[0].id;
    assert!(session.assign_shift(schedule.id, shifts[0].id, &[user]).unwrap().is_success());

    let schedules = session
        .location_schedules("Soho", Some(date(2023, 6, 1)), Some(date(2023, 6, 30)))
        .unwrap();
    assert_eq!(schedules.len(), 1);
    assert!(session.publish_schedule("Soho", schedule.id).unwrap().is_success());
    assert_eq!(
        session.location_schedule("Soho", schedule.id).unwrap().state.as_deref(),
        Some("published")
    );
}

#[test]
fn user_management_flow() {
    let addr = spawn(MockConfig::default(), seeded());
    let session = Session::open(session_config(addr, "secret")).unwrap();
    let bar = session.department_id("Soho", "Bar").unwrap();

    let outcome = session
        .invite_user("Mayfair", "grace@example.com", &[])
        .unwrap();
    assert_eq!(outcome.status, 201);
    let duplicate = session
        .invite_user("Mayfair", "grace@example.com", &[])
        .unwrap();
    assert_eq!(duplicate.status, 422);

    let outcome = session
        .create_user("Soho", &NewUser::new("Ada", "Lovelace").department_ids(vec![bar]))
        .unwrap();
    let ada: staffo_core::User = outcome.json().unwrap();

    assert!(session.lock_user("Soho", ada.id).unwrap().is_success());
    let locked = session.users(Some("locked")).unwrap();
    assert_eq!(locked.len(), 1);
    assert_eq!(locked[0].id, ada.id);
    assert!(session.unlock_user("Soho", ada.id).unwrap().is_success());

    let in_bar = session.location_users("Soho", Some("Bar")).unwrap();
    assert_eq!(in_bar.len(), 1);
    assert!(session.remove_users("Soho", "Bar", &[ada.id]).unwrap().is_success());
    assert!(session.location_users("Soho", Some("Bar")).unwrap().is_empty());
}

#[test]
fn loop_policy_pages_without_header() {
    let config = MockConfig {
        page_count_header: false,
        ..MockConfig::default()
    };
    let addr = spawn(config, seeded());

    let header_session = Session::open(session_config(addr, "secret")).unwrap();
    assert_eq!(header_session.users(None).unwrap().len(), 300);

    let config = session_config(addr, "secret").page_policy(PagePolicy::UntilEmpty);
    let session = Session::open(config).unwrap();
    assert_eq!(session.users(None).unwrap().len(), USERS);
}

#[test]
fn bad_credentials_fail_to_open() {
    let addr = spawn(MockConfig::default(), seeded());

    let err = Session::open(session_config(addr, "wrong")).err().unwrap();

    assert!(matches!(err, ApiError::Authentication { status: 401, .. }));
}

#[test]
fn unreachable_backend_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = Session::open(session_config(addr, "secret")).err().unwrap();

    assert!(matches!(err, ApiError::Transport(_)));
}
