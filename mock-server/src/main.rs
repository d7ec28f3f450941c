use chrono::{NaiveDate, TimeZone, Utc};
use log::info;
use mock_server::{MockConfig, Store};
use tokio::net::TcpListener;

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

/// Two locations sharing a department name, a handful of users and one
/// schedule with shifts.
fn demo_store() -> Store {
    let mut store = Store::new();
    let soho = store.add_location("Soho");
    let kitchen = store.add_department(soho, "Kitchen");
    store.add_department(soho, "Bar");
    let mayfair = store.add_location("Mayfair");
    store.add_department(mayfair, "Kitchen");
    for (first, last) in [("Ada", "Lovelace"), ("Grace", "Hopper"), ("Alan", "Turing")] {
        store.add_user(soho, first, last);
    }

    let week = NaiveDate::from_ymd_opt(2023, 6, 5).zip(NaiveDate::from_ymd_opt(2023, 6, 11));
    if let Some((bop, eop)) = week {
        let schedule = store.add_schedule(soho, bop, eop);
        for day in 0..5 {
            let start = Utc.with_ymd_and_hms(2023, 6, 5 + day, 8, 0, 0).single();
            let end = Utc.with_ymd_and_hms(2023, 6, 5 + day, 16, 0, 0).single();
            if let Some((start, end)) = start.zip(end) {
                store.add_shift(schedule, kitchen, start.fixed_offset(), end.fixed_offset());
            }
        }
    }
    store
}

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let defaults = MockConfig::default();
    let config = MockConfig {
        username: env_or("MOCK_USERNAME", defaults.username),
        password: env_or("MOCK_PASSWORD", defaults.password),
        account_name: defaults.account_name,
        time_zone: env_or("MOCK_TIME_ZONE", defaults.time_zone),
        page_count_header: std::env::var("MOCK_PAGES_HEADER").map_or(true, |v| v != "0"),
    };

    let port = env_or("PORT", "3000".to_string());
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!("listening on {addr} (time zone {})", config.time_zone);
    mock_server::run(listener, mock_server::app(config, demo_store())).await
}
