//! Integration tests for the pickup-locator CLI

use std::io::Write;
use std::process::Command;

fn cli() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_pickup-locator"));
    // keep tests independent of a developer's keys and config
    command
        .env_remove("GOOGLE_MAPS_API_KEY")
        .env_remove("OPENWEATHER_API_KEY")
        .env_remove("RUST_LOG");
    command
}

/// Config pointing every provider at a closed local port, so lookups fail fast
fn offline_config() -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
[geocoding]
nominatim_base_url = "http://127.0.0.1:9"
postal_base_url = "http://127.0.0.1:9"
timeout_seconds = 1
max_retries = 0

[weather]
open_meteo_base_url = "http://127.0.0.1:9"
timeout_seconds = 1
max_retries = 0

[logging]
level = "error"
"#
    )
    .unwrap();
    file
}

#[test]
fn test_cli_help() {
    let output = cli().arg("--help").output().expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("pickup-locator"));
    assert!(stdout.contains("recommend"));
    assert!(stdout.contains("resolve"));
}

#[test]
fn test_distance_is_offline() {
    let output = cli()
        .args(["distance", "--from", "29.6516,-82.3248", "--to", "29.6606,-82.3248"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), "1.0 km N");
}

#[test]
fn test_distance_json() {
    let output = cli()
        .args(["distance", "--json", "--from", "29.6516,-82.3248", "--to", "29.6516,-82.3248"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["distance_km"], 0.0);
}

#[test]
fn test_invalid_coordinates_rejected_by_parser() {
    let output = cli()
        .args(["distance", "--from", "95,0", "--to", "0,0"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("out of range"));
}

#[test]
fn test_resolve_coordinates_without_providers() {
    let config = offline_config();
    let output = cli()
        .args(["--config"])
        .arg(config.path())
        .args(["--json", "resolve", "--coords", "29.6500,-82.3500"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["formatted_address"], "29.6500, -82.3500");
    assert_eq!(value["source"], "RAW_COORDINATES");
    assert_eq!(value["precise"], true);
}

#[test]
fn test_resolve_empty_query_fails() {
    let config = offline_config();
    let output = cli()
        .args(["--config"])
        .arg(config.path())
        .args(["resolve", "--location", "   "])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid input"));
}

#[test]
fn test_weather_placeholder_when_offline() {
    let config = offline_config();
    let output = cli()
        .args(["--config"])
        .arg(config.path())
        .args(["--json", "weather", "--coords", "29.65,-82.35", "--at", "2026-10-17T18:00"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["source"], "placeholder");
    assert_eq!(value["outdoor_friendly"], true);
}

#[test]
fn test_recommend_from_venue_file() {
    let config = offline_config();
    let mut venues = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(
        venues,
        r#"[
            {{"id": "swrc", "name": "Southwest Rec Center",
              "coordinates": {{"latitude": 29.6387, "longitude": -82.3686}},
              "venue_type": "INDOOR", "supported_sports": ["Basketball"],
              "average_rating": 4.6, "total_ratings": 38}},
            {{"id": "field", "name": "Flavet Field",
              "coordinates": {{"latitude": 29.6490, "longitude": -82.3530}},
              "venue_type": "OUTDOOR", "supported_sports": ["Soccer"],
              "average_rating": 4.2, "total_ratings": 25}}
        ]"#
    )
    .unwrap();

    let output = cli()
        .args(["--config"])
        .arg(config.path())
        .args(["--json", "recommend", "--coords", "29.65,-82.35", "--sport", "basketball"])
        .args(["--at", "2026-10-17T18:00", "--venues"])
        .arg(venues.path())
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let recommendations = value["recommendations"].as_array().unwrap();
    assert_eq!(recommendations.len(), 1);
    assert_eq!(recommendations[0]["venue"]["id"], "swrc");
}
