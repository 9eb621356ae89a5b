use crate::common::*;
use monero_connection_manager::core::connection::RpcConnection;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

#[tokio::test]
async fn test_best_available_falls_through_to_unranked() {
    let transport = ScriptedTransport::new();
    transport.set("A", MockOutcome::Offline);
    transport.set("B", MockOutcome::Online(30));
    let manager = manager_with(&transport);
    manager
        .add_connection(RpcConnection::new("A").with_priority(5))
        .unwrap();
    manager.add_connection_uri("B").unwrap();

    let best = manager.get_best_available_connection(&[]).await.unwrap();

    assert_eq!(best.unwrap().uri(), "B");
}

#[tokio::test]
async fn test_best_available_stops_at_first_connected_group() {
    let transport = ScriptedTransport::new();
    transport.set("high", MockOutcome::Online(90));
    transport.set("low", MockOutcome::Online(5));
    let manager = manager_with(&transport);
    manager
        .add_connection(RpcConnection::new("low").with_priority(1))
        .unwrap();
    manager
        .add_connection(RpcConnection::new("high").with_priority(8))
        .unwrap();

    let best = manager.get_best_available_connection(&[]).await.unwrap();

    assert_eq!(best.unwrap().uri(), "high");
    assert_eq!(transport.calls_for("low"), 0);
    // Finding a candidate does not select it
    assert!(manager.get_connection().is_none());
}

#[tokio::test]
async fn test_best_available_respects_registration_order_within_group() {
    let transport = ScriptedTransport::new();
    transport.set("first", MockOutcome::Online(80));
    transport.set("second", MockOutcome::Online(5));
    let manager = manager_with(&transport);
    manager.add_connection_uri("first").unwrap();
    manager.add_connection_uri("second").unwrap();

    let best = manager.get_best_available_connection(&[]).await.unwrap();

    assert_eq!(best.unwrap().uri(), "first");
}

#[tokio::test]
async fn test_best_available_honors_exclusions() {
    let transport = ScriptedTransport::new();
    transport.set("A", MockOutcome::Online(10));
    transport.set("B", MockOutcome::Online(10));
    let manager = manager_with(&transport);
    let a = manager.add_connection_uri("A").unwrap();
    manager.add_connection_uri("B").unwrap();

    let best = manager.get_best_available_connection(&[a]).await.unwrap();

    assert_eq!(best.unwrap().uri(), "B");
    assert_eq!(transport.calls_for("A"), 0);
}

#[tokio::test]
async fn test_best_available_none_when_all_offline() {
    let transport = ScriptedTransport::new();
    let manager = manager_with(&transport);
    manager
        .add_connection(RpcConnection::new("A").with_priority(2))
        .unwrap();
    manager.add_connection_uri("B").unwrap();

    assert!(manager
        .get_best_available_connection(&[])
        .await
        .unwrap()
        .is_none());
    assert_eq!(transport.calls().len(), 2);
}

#[tokio::test]
async fn test_check_connection_fails_over_when_current_drops() {
    let transport = ScriptedTransport::new();
    transport.set("A", MockOutcome::Offline);
    transport.set("B", MockOutcome::Online(40));
    let manager = manager_with(&transport);
    let a = manager
        .add_connection(RpcConnection::new("A").with_priority(5))
        .unwrap();
    manager.add_connection_uri("B").unwrap();
    manager.set_connection(Some(a)).unwrap();
    let listener = RecordingListener::new();
    manager.add_listener(listener.clone());

    manager.check_connection().await.unwrap();

    assert_eq!(manager.get_connection().unwrap().uri(), "B");
    assert!(manager.is_connected());
    // The failed current is not probed twice
    assert_eq!(transport.calls_for("A"), 1);
    assert_eq!(listener.events().last(), Some(&Some("B".to_string())));
}

#[tokio::test]
async fn test_check_connection_stays_put_without_auto_switch() {
    let transport = ScriptedTransport::new();
    transport.set("A", MockOutcome::Offline);
    transport.set("B", MockOutcome::Online(40));
    let manager = manager_with(&transport);
    manager.set_auto_switch(false);
    manager.add_connection_uri("B").unwrap();
    manager.set_connection_uri("A").unwrap();

    manager.check_connection().await.unwrap();

    assert_eq!(manager.get_connection().unwrap().uri(), "A");
    assert_eq!(transport.calls_for("B"), 0);
}

#[tokio::test]
async fn test_check_connections_selects_first_connected_when_disconnected() {
    let transport = ScriptedTransport::new();
    transport.set("A", MockOutcome::Offline);
    transport.set("B", MockOutcome::Online(40));
    transport.set("C", MockOutcome::Online(10));
    let manager = manager_with(&transport);
    manager.add_connection_uri("A").unwrap();
    manager.add_connection_uri("B").unwrap();
    manager.add_connection_uri("C").unwrap();
    let listener = RecordingListener::new();
    manager.add_listener(listener.clone());

    let all = manager.get_connections();
    assert!(manager.check_connections(&all, &[]).await.unwrap());

    // First connected in listing order; C is faster but has a single sample
    assert_eq!(manager.get_connection().unwrap().uri(), "B");
    assert_eq!(listener.events().first(), Some(&Some("B".to_string())));
}

#[tokio::test]
async fn test_check_connections_prefers_higher_priority() {
    let transport = ScriptedTransport::new();
    transport.set("low", MockOutcome::Online(5));
    transport.set("high", MockOutcome::Online(120));
    let manager = manager_with(&transport);
    let low = manager
        .add_connection(RpcConnection::new("low").with_priority(1))
        .unwrap();
    manager
        .add_connection(RpcConnection::new("high").with_priority(3))
        .unwrap();
    manager.set_connection(Some(low)).unwrap();

    let all = manager.get_connections();
    manager.check_connections(&all, &[]).await.unwrap();

    assert_eq!(manager.get_connection().unwrap().uri(), "high");
}

#[tokio::test]
async fn test_check_connections_skips_excluded() {
    let transport = ScriptedTransport::new();
    transport.set("A", MockOutcome::Online(10));
    transport.set("B", MockOutcome::Online(10));
    let manager = manager_with(&transport);
    let a = manager.add_connection_uri("A").unwrap();
    let b = manager.add_connection_uri("B").unwrap();

    let excluded = [Arc::new(RpcConnection::new("A"))];
    manager
        .check_connections(&[a.clone(), b], &excluded)
        .await
        .unwrap();

    assert_eq!(transport.calls_for("A"), 0);
    assert_eq!(transport.calls_for("B"), 1);
    assert!(a.is_online().as_option().is_none());
}

#[tokio::test]
async fn test_check_connections_without_auto_switch_only_probes() {
    let transport = ScriptedTransport::new();
    transport.set("A", MockOutcome::Online(10));
    let manager = manager_with(&transport);
    manager.set_auto_switch(false);
    let a = manager.add_connection_uri("A").unwrap();

    assert!(manager.check_connections(&[a], &[]).await.unwrap());
    assert!(manager.get_connection().is_none());
}

#[tokio::test]
async fn test_manual_selection_survives_recompute_when_connected() {
    let transport = ScriptedTransport::new();
    transport.set("A", MockOutcome::Online(60));
    transport.set("B", MockOutcome::Online(10));
    let manager = manager_with(&transport);
    manager.add_connection_uri("A").unwrap();
    let b = manager.add_connection_uri("B").unwrap();

    let all = manager.get_connections();
    manager.check_connections(&all, &[]).await.unwrap();
    manager.set_connection_uri("A").unwrap();

    // One fast sample is not enough to leave an equal-priority current
    assert!(manager.recompute_best_in_priority().unwrap().is_none());
    assert_eq!(manager.get_connection().unwrap().uri(), "A");
    assert!(b.is_connected());
}

#[tokio::test]
async fn test_connection_removed_during_batch_stays_removed() {
    let transport = ScriptedTransport::new();
    transport.set(
        "X",
        MockOutcome::Slow {
            delay_ms: 200,
            latency_ms: 10,
        },
    );
    let manager = manager_with(&transport);
    let x = manager.add_connection_uri("X").unwrap();
    let listener = RecordingListener::new();
    manager.add_listener(listener.clone());

    let batch = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.check_connections(&[x], &[]).await })
    };
    sleep(Duration::from_millis(50)).await;
    manager.remove_connection("X").unwrap();
    batch.await.unwrap().unwrap();

    assert!(!manager.has_connection("X"));
    assert!(manager.get_connection().is_none());
    assert!(manager.get_connections().is_empty());
    assert_eq!(listener.count(), 0);
}

#[tokio::test]
async fn test_clear_during_batch_is_not_undone() {
    let transport = ScriptedTransport::new();
    for uri in ["A", "B"] {
        transport.set(
            uri,
            MockOutcome::Slow {
                delay_ms: 200,
                latency_ms: 10,
            },
        );
    }
    let manager = manager_with(&transport);
    manager.add_connection_uri("A").unwrap();
    manager.add_connection_uri("B").unwrap();

    let batch = {
        let manager = manager.clone();
        let all = manager.get_connections();
        tokio::spawn(async move { manager.check_connections(&all, &[]).await })
    };
    sleep(Duration::from_millis(50)).await;
    manager.clear();
    batch.await.unwrap().unwrap();

    assert!(manager.get_connections().is_empty());
    assert!(manager.get_connection().is_none());
}

#[tokio::test]
async fn test_failover_target_removed_during_search_is_not_selected() {
    let transport = ScriptedTransport::new();
    transport.set("A", MockOutcome::Offline);
    transport.set(
        "B",
        MockOutcome::Slow {
            delay_ms: 200,
            latency_ms: 10,
        },
    );
    let manager = manager_with(&transport);
    manager.add_connection_uri("B").unwrap();
    manager.set_connection_uri("A").unwrap();

    let check = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.check_connection().await })
    };
    sleep(Duration::from_millis(50)).await;
    manager.remove_connection("B").unwrap();
    check.await.unwrap().unwrap();

    assert_eq!(manager.get_connection().unwrap().uri(), "A");
    assert!(!manager.has_connection("B"));
}
