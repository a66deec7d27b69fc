//! Coverage of the dashboard fan-out path: change-feed driven snapshot
//! pushes, explicit pulls, and the degrade-not-crash behavior when the
//! store has no change feed.

mod support;

use seamline_core::protocol::{FRAME_RFID_SCAN_SUCCESS, TOPIC_SCAN_UPDATES};
use seamline_core::{MemoryScanStore, ScanStore, StoreChange};
use seamline_model::ScanEvent;
use seamline_server::broadcast::ChangeFeedBroadcaster;
use seamline_server::handlers::dashboard::process_dashboard_frame;
use seamline_server::handlers::device::process_device_frame;
use std::{sync::Arc, time::Duration};
use support::{
    attach_dashboard, attach_device, build_test_app, build_test_app_with_store, scan_frame,
};

fn event(id: &str) -> ScanEvent {
    ScanEvent {
        id: id.to_string(),
        tag_id: "T1".to_string(),
        station_id: "ST1".to_string(),
        timestamp: 1000,
    }
}

async fn recv_frame(
    rx: &mut tokio::sync::mpsc::Receiver<seamline_core::protocol::TopicFrame>,
) -> seamline_core::protocol::TopicFrame {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for a topic frame")
        .expect("channel closed")
}

#[tokio::test]
async fn each_change_notification_produces_one_push_per_dashboard() {
    let app = build_test_app();
    let (_a, mut a_rx) = attach_dashboard(&app.state);
    let (_b, mut b_rx) = attach_dashboard(&app.state);

    let broadcaster = ChangeFeedBroadcaster::new(app.state.store.clone(), app.state.dashboards.clone());
    let handle = broadcaster.start().await.expect("change feed available");

    for id in ["S1", "S2", "S3"] {
        app.store.insert_scan(&event(id)).await.unwrap();
    }

    // Three notifications, three pushes per dashboard - no coalescing.
    for rx in [&mut a_rx, &mut b_rx] {
        for _ in 0..3 {
            let frame = recv_frame(rx).await;
            assert_eq!(frame.topic, TOPIC_SCAN_UPDATES);
            assert!(frame.data.is_array());
        }
        // The final push reflects the full store state at query time.
    }

    // Nothing further without another change.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(a_rx.try_recv().is_err());
    assert!(b_rx.try_recv().is_err());

    handle.abort();
}

#[tokio::test]
async fn final_snapshot_carries_the_full_record_set() {
    let app = build_test_app();
    let (_dash, mut rx) = attach_dashboard(&app.state);

    let broadcaster = ChangeFeedBroadcaster::new(app.state.store.clone(), app.state.dashboards.clone());
    let handle = broadcaster.start().await.unwrap();

    for id in ["S1", "S2"] {
        app.store.insert_scan(&event(id)).await.unwrap();
    }

    let mut last = recv_frame(&mut rx).await;
    if let Ok(frame) =
        tokio::time::timeout(Duration::from_millis(200), rx.recv()).await
    {
        last = frame.expect("channel closed");
    }

    let records = last.data.as_array().expect("snapshot is an array");
    assert_eq!(records.len(), 2, "full collection, not a delta");
    assert_eq!(records[0]["id"], "S1");
    assert_eq!(records[1]["id"], "S2");

    handle.abort();
}

#[tokio::test]
async fn any_operation_type_triggers_a_refresh() {
    let app = build_test_app();
    let (_dash, mut rx) = attach_dashboard(&app.state);

    let broadcaster = ChangeFeedBroadcaster::new(app.state.store.clone(), app.state.dashboards.clone());
    let handle = broadcaster.start().await.unwrap();

    // Mutations that did not come through ingestion still fan out.
    app.store.notify(StoreChange::Update);
    let frame = recv_frame(&mut rx).await;
    assert_eq!(frame.topic, TOPIC_SCAN_UPDATES);

    app.store.notify(StoreChange::Delete);
    let frame = recv_frame(&mut rx).await;
    assert_eq!(frame.topic, TOPIC_SCAN_UPDATES);

    handle.abort();
}

#[tokio::test]
async fn missing_change_feed_degrades_without_breaking_ingestion() {
    let app = build_test_app_with_store(Arc::new(MemoryScanStore::without_change_feed()));

    let broadcaster = ChangeFeedBroadcaster::new(app.state.store.clone(), app.state.dashboards.clone());
    assert!(broadcaster.start().await.is_none());

    // Ingestion and the direct broadcast path keep working.
    let (device, mut rx) = attach_device(&app.state);
    process_device_frame(&app.state, &device, &scan_frame("S1")).await;
    assert_eq!(
        rx.try_recv().unwrap().frame_type,
        FRAME_RFID_SCAN_SUCCESS
    );
    assert_eq!(app.store.len(), 1);
}

#[tokio::test]
async fn failed_snapshot_query_does_not_stop_the_watch() {
    let app = build_test_app_with_store(Arc::new(MemoryScanStore::failing_snapshots()));
    let (_dash, mut rx) = attach_dashboard(&app.state);

    let broadcaster = ChangeFeedBroadcaster::new(app.state.store.clone(), app.state.dashboards.clone());
    let handle = broadcaster.start().await.unwrap();

    app.store.notify(StoreChange::Insert);
    app.store.notify(StoreChange::Insert);
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(rx.try_recv().is_err(), "no snapshot could be pushed");
    assert!(!handle.is_finished(), "the watch keeps running");

    handle.abort();
}

#[tokio::test]
async fn snapshot_pull_answers_only_the_requester() {
    let app = build_test_app();
    app.store.insert_scan(&event("S1")).await.unwrap();

    let (requester, mut requester_rx) = attach_dashboard(&app.state);
    let (_other, mut other_rx) = attach_dashboard(&app.state);

    process_dashboard_frame(&app.state, &requester, r#"{"action":"request_snapshot"}"#).await;

    let frame = requester_rx.try_recv().expect("requester gets the snapshot");
    assert_eq!(frame.topic, TOPIC_SCAN_UPDATES);
    assert_eq!(frame.data.as_array().unwrap().len(), 1);

    assert!(other_rx.try_recv().is_err(), "pull never broadcasts");
}

#[tokio::test]
async fn unusable_dashboard_frames_are_dropped_quietly() {
    let app = build_test_app();
    let (dash, mut rx) = attach_dashboard(&app.state);

    process_dashboard_frame(&app.state, &dash, "garbage{").await;
    process_dashboard_frame(&app.state, &dash, r#"{"action":"subscribe","data":{}}"#).await;

    assert!(rx.try_recv().is_err(), "no reply and no disconnect");
}

#[tokio::test]
async fn ingestion_writes_reach_dashboards_through_the_feed() {
    let app = build_test_app();
    let (device, mut device_rx) = attach_device(&app.state);
    let (_dash, mut dash_rx) = attach_dashboard(&app.state);

    let broadcaster = ChangeFeedBroadcaster::new(app.state.store.clone(), app.state.dashboards.clone());
    let handle = broadcaster.start().await.unwrap();

    process_device_frame(&app.state, &device, &scan_frame("S1")).await;
    assert_eq!(
        device_rx.try_recv().unwrap().frame_type,
        FRAME_RFID_SCAN_SUCCESS
    );

    let frame = recv_frame(&mut dash_rx).await;
    assert_eq!(frame.topic, TOPIC_SCAN_UPDATES);
    let records = frame.data.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["id"], "S1");

    handle.abort();
}
