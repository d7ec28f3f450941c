//! Verify build/parse methods against JSON test vectors stored in `test-vectors/`.
//!
//! Each vector file describes inputs plus the expected request, date window
//! or parse result. Comparing parsed JSON (not raw strings) avoids false
//! negatives from field-ordering differences.

use chrono::NaiveDate;
use serde_json::Value;
use staffo_core::{
    Account, ApiError, Credential, DateWindow, Fields, HttpMethod, HttpRequest, HttpResponse,
    Invitation, Location, NewDepartment, NewLocation, StaffoClient, Timezone, UserAction,
};

fn load(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap()
}

fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        "PUT" => HttpMethod::Put,
        other => panic!("unknown method: {other}"),
    }
}

fn pairs(value: &Value) -> Vec<(String, String)> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|pair| {
            let pair = pair.as_array().unwrap();
            (pair[0].as_str().unwrap().to_string(), pair[1].as_str().unwrap().to_string())
        })
        .collect()
}

fn date(value: &Value) -> NaiveDate {
    NaiveDate::parse_from_str(value.as_str().unwrap(), "%Y-%m-%d").unwrap()
}

fn window(args: &Value) -> Option<DateWindow> {
    args.get("window").map(|window| {
        let timezone = Timezone::parse(window["time_zone"].as_str().unwrap()).unwrap();
        DateWindow::new(&timezone, date(&window["start"]), Some(date(&window["end"])))
    })
}

fn ids(value: &Value) -> Vec<i64> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|id| id.as_i64().unwrap())
        .collect()
}

fn fields(value: &Value) -> Fields {
    value.as_object().cloned().unwrap_or_default()
}

/// Dispatch a vector's `op` to the matching builder.
fn build(client: &StaffoClient, op: &str, args: &Value) -> HttpRequest {
    let id = |key: &str| args[key].as_i64().unwrap();
    let optional_id = |key: &str| args.get(key).and_then(Value::as_i64);
    let window = window(args);
    match op {
        "account" => client.build_account(),
        "list_locations" => client.build_list_locations(),
        "get_location" => client.build_get_location(id("location_id")),
        "list_departments" => client.build_list_departments(id("location_id")),
        "get_department" => client.build_get_department(id("location_id"), id("department_id")),
        "list_users" => client.build_list_users(args.get("state").and_then(Value::as_str)),
        "list_location_users" => {
            client.build_list_location_users(id("location_id"), optional_id("department_id"))
        }
        "list_schedules" => client.build_list_schedules(window.as_ref()),
        "get_schedule" => client.build_get_schedule(id("schedule_id")),
        "list_location_schedules" => {
            client.build_list_location_schedules(id("location_id"), window.as_ref())
        }
        "get_location_schedule" => {
            client.build_get_location_schedule(id("location_id"), id("schedule_id"))
        }
        "list_schedule_shifts" => client.build_list_schedule_shifts(id("schedule_id")),
        "list_location_shifts" => client.build_list_location_shifts(
            id("location_id"),
            optional_id("department_id"),
            window.as_ref(),
        ),
        "list_events" => client.build_list_events(window.as_ref()),
        "add_users" => client
            .build_add_users(id("location_id"), id("department_id"), &ids(&args["user_ids"]))
            .unwrap(),
        "remove_users" => client
            .build_remove_users(id("location_id"), id("department_id"), &ids(&args["user_ids"]))
            .unwrap(),
        "update_location" => client
            .build_update_location(id("location_id"), &fields(&args["changes"]))
            .unwrap(),
        "update_department" => client
            .build_update_department(
                id("location_id"),
                id("department_id"),
                &fields(&args["changes"]),
            )
            .unwrap(),
        "update_schedule" => client
            .build_update_schedule(id("location_id"), id("schedule_id"), &fields(&args["changes"]))
            .unwrap(),
        "update_user" => client
            .build_update_user(id("location_id"), id("user_id"), &fields(&args["changes"]))
            .unwrap(),
        "unlock_user" => client
            .build_user_action(id("location_id"), id("user_id"), &UserAction::unlock())
            .unwrap(),
        "update_shift" => client
            .build_update_shift(id("schedule_id"), id("shift_id"), &fields(&args["changes"]))
            .unwrap(),
        "assign_shift" => client
            .build_assign_shift(id("schedule_id"), id("shift_id"), &ids(&args["user_ids"]))
            .unwrap(),
        "create_location" => client
            .build_create_location(&NewLocation::new(args["name"].as_str().unwrap()))
            .unwrap(),
        "create_department" => {
            let department = fields(&args["overrides"]).into_iter().fold(
                NewDepartment::new(args["name"].as_str().unwrap()),
                |department, (key, value)| department.set(&key, value),
            );
            client
                .build_create_department(id("location_id"), &department)
                .unwrap()
        }
        "invite_user" => client
            .build_create_user(
                id("location_id"),
                &Invitation::new(args["email"].as_str().unwrap(), ids(&args["department_ids"])),
            )
            .unwrap(),
        other => panic!("unknown op: {other}"),
    }
}

#[test]
fn request_test_vectors() {
    let vectors = load(include_str!("../../test-vectors/requests.json"));
    let base_url = vectors["base_url"].as_str().unwrap();
    let client = StaffoClient::new(
        base_url,
        Credential::new(
            vectors["username"].as_str().unwrap(),
            vectors["password"].as_str().unwrap(),
        ),
    );
    let read_headers = pairs(&vectors["read_headers"]);
    let write_headers = pairs(&vectors["write_headers"]);

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let expected = &case["expected_request"];
        let req = build(&client, case["op"].as_str().unwrap(), &case["args"]);

        assert_eq!(req.method, parse_method(expected["method"].as_str().unwrap()), "{name}: method");
        assert_eq!(
            req.path,
            format!("{base_url}{}", expected["path"].as_str().unwrap()),
            "{name}: path"
        );
        assert_eq!(req.query, pairs(&expected["query"]), "{name}: query");

        match expected.get("body") {
            Some(body) => {
                assert_eq!(req.headers, write_headers, "{name}: headers");
                let sent: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
                assert_eq!(&sent, body, "{name}: body");
            }
            None => {
                assert_eq!(req.headers, read_headers, "{name}: headers");
                assert!(req.body.is_none(), "{name}: unexpected body");
            }
        }
    }
}

#[test]
fn window_test_vectors() {
    let vectors = load(include_str!("../../test-vectors/windows.json"));

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let timezone = Timezone::parse(case["time_zone"].as_str().unwrap()).unwrap();
        let window = DateWindow::new(&timezone, date(&case["start"]), Some(date(&case["end"])));

        assert_eq!(window.from(), case["from"].as_str().unwrap(), "{name}: from");
        assert_eq!(window.until(), case["until"].as_str().unwrap(), "{name}: until");
    }
}

fn error_kind(err: &ApiError) -> &'static str {
    match err {
        ApiError::Authentication { .. } => "Authentication",
        ApiError::PageFailed { .. } => "PageFailed",
        ApiError::NotFound(_) => "NotFound",
        ApiError::Http { .. } => "Http",
        ApiError::Transport(_) => "Transport",
        ApiError::Deserialization(_) => "Deserialization",
        ApiError::Serialization(_) => "Serialization",
        ApiError::UnknownTimezone(_) => "UnknownTimezone",
        ApiError::Config(_) => "Config",
    }
}

#[test]
fn response_test_vectors() {
    let vectors = load(include_str!("../../test-vectors/responses.json"));
    let client = StaffoClient::new("http://localhost:3000", Credential::new("admin", "secret"));

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let response = HttpResponse {
            status: case["status"].as_u64().unwrap() as u16,
            headers: Vec::new(),
            body: case["body"].as_str().unwrap().to_string(),
        };
        let result: Result<Value, ApiError> = match case["parser"].as_str().unwrap() {
            "account" => client
                .parse_account(response)
                .map(|account: Account| serde_json::to_value(account).unwrap()),
            "location" => client
                .parse_record::<Location>(response)
                .map(|location| serde_json::to_value(location).unwrap()),
            "mutation" => {
                let outcome = client.parse_mutation(response);
                Ok(serde_json::json!({
                    "status": outcome.status,
                    "success": outcome.is_success(),
                }))
            }
            other => panic!("unknown parser: {other}"),
        };

        let expected = &case["expected"];
        match (result, expected.get("ok"), expected.get("error")) {
            (Ok(value), Some(ok), None) => assert_eq!(&value, ok, "{name}: value"),
            (Err(err), None, Some(kind)) => {
                assert_eq!(error_kind(&err), kind.as_str().unwrap(), "{name}: error kind")
            }
            (result, _, _) => panic!("{name}: unexpected result {result:?}"),
        }
    }
}
