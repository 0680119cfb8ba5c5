mod common;

use std::{collections::BTreeMap, path::Path, time::Duration};

use birdbox_fixture::{BirdBox, ServerMode, StartConfig, process::ProcessHandle, readiness};
use color_eyre::Result;
use serde_json::json;

use common::stub::StubServer;

#[tokio::test]
async fn attach_waits_for_readiness_and_stops() -> Result<()> {
    let server = StubServer::start(json!([])).await;

    let birdbox = BirdBox::attach(&server.api_url).await?;
    assert_eq!(birdbox.api_url(), server.api_url);

    birdbox.stop().await?;
    Ok(())
}

#[tokio::test]
async fn readiness_gives_up_on_a_dead_endpoint() {
    let port = portpicker::pick_unused_port().expect("no free ports");
    let api_url = format!("http://127.0.0.1:{port}/cubejs-api");

    let result = readiness::wait_until_ready_with(&api_url, Duration::from_millis(50), 3).await;

    assert!(result.is_err());
}

#[tokio::test]
async fn local_mode_requires_a_binary_path() {
    std::env::remove_var("BIRDBOX_SERVER_BINARY");

    let result = BirdBox::start(
        ServerMode::Local,
        &StartConfig {
            db_type: "athena".to_string(),
            ..StartConfig::default()
        },
    )
    .await;

    let err = result.err().expect("start should fail without a binary");
    assert!(err.to_string().contains("BIRDBOX_SERVER_BINARY"));
}

#[test]
fn process_stop_kills_the_child() {
    let handle =
        ProcessHandle::spawn(Path::new("sleep"), &["300"], &BTreeMap::new(), 0).unwrap();
    let pid = handle.id();

    handle.stop();

    assert!(!Path::new(&format!("/proc/{pid}")).exists());
}

#[test]
fn dropping_an_unstopped_handle_reaps_the_child() {
    let handle =
        ProcessHandle::spawn(Path::new("sleep"), &["300"], &BTreeMap::new(), 0).unwrap();
    let pid = handle.id();

    drop(handle);

    assert!(!Path::new(&format!("/proc/{pid}")).exists());
}

#[test]
fn exited_process_reports_dead() {
    let mut handle = ProcessHandle::spawn(Path::new("true"), &[], &BTreeMap::new(), 0).unwrap();

    std::thread::sleep(Duration::from_millis(200));

    assert!(handle.is_dead());
    handle.stop();
}

#[test]
fn log_tail_captures_process_output() {
    let handle = ProcessHandle::spawn(
        Path::new("sh"),
        &["-c", "echo ready to rumble"],
        &BTreeMap::new(),
        0,
    )
    .unwrap();

    std::thread::sleep(Duration::from_millis(200));

    assert!(handle.log_tail().contains("ready to rumble"));
    handle.stop();
}
