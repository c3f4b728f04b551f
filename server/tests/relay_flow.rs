// End-to-end relay flows over a scripted upstream feed
use serde_json::json;
use std::time::Duration;
use tickrelay_common::{FeedCommand, RelayError};
use tickrelay_server::testkit::{
    parse_commands, scripted_app_state, wait_for, FeedScript, MockClient,
};

fn trade(symbol: &str, price: f64) -> String {
    format!(
        r#"{{"type":"trade","data":[{{"s":"{}","p":{},"t":1700000000000,"v":42}}]}}"#,
        symbol, price
    )
}

fn subscribes_in(frames: &[String]) -> Vec<String> {
    parse_commands(frames)
        .into_iter()
        .filter_map(|cmd| match cmd {
            FeedCommand::Subscribe { symbol } => Some(symbol.to_string()),
            FeedCommand::Unsubscribe { .. } => None,
        })
        .collect()
}

#[tokio::test]
async fn trades_flow_from_the_feed_to_interested_clients() {
    let (state, probe) = scripted_app_state(vec![FeedScript::Piped]);
    state.feed.connect().await.unwrap();

    let apple_fan = MockClient::new();
    let micro_fan = MockClient::new();
    let c1 = state.registry.add(apple_fan.clone()).await;
    let c2 = state.registry.add(micro_fan.clone()).await;
    state.router.subscribe(c1, &["AAPL".to_string()]).await;
    state.router.subscribe(c2, &["MSFT".to_string()]).await;

    probe.push(&trade("AAPL", 190.5));

    wait_for("apple delivery", || apple_fan.received().len() == 1).await;
    assert!(micro_fan.received().is_empty());

    let delivered = serde_json::to_value(&apple_fan.received()[0]).unwrap();
    assert_eq!(
        delivered,
        json!({
            "type": "price_update",
            "symbol": "AAPL",
            "data": {
                "price": 190.5,
                "volume": 42.0,
                "timestamp": 1_700_000_000_000i64,
            }
        })
    );
}

#[tokio::test]
async fn case_folded_subscriptions_share_one_upstream_entry() {
    let (state, probe) = scripted_app_state(vec![FeedScript::Piped]);
    state.feed.connect().await.unwrap();

    let lower = MockClient::new();
    let upper = MockClient::new();
    let c1 = state.registry.add(lower.clone()).await;
    let c2 = state.registry.add(upper.clone()).await;
    state.router.subscribe(c1, &["aapl".to_string()]).await;
    state.router.subscribe(c2, &["AAPL".to_string()]).await;

    // One routing entry, one upstream subscription.
    assert_eq!(subscribes_in(&probe.sent_in_session(0)), vec!["AAPL"]);
    assert_eq!(state.router.active_symbols().await, vec!["AAPL"]);

    probe.push(&trade("AAPL", 191.0));
    wait_for("both deliveries", || {
        lower.received().len() == 1 && upper.received().len() == 1
    })
    .await;

    // The first leaver changes nothing upstream; the last one releases it.
    state.router.unsubscribe(c1, &["AAPL".to_string()]).await;
    assert_eq!(parse_commands(&probe.sent_in_session(0)).len(), 1);

    state.router.unsubscribe_all(c2).await;
    let sent = parse_commands(&probe.sent_in_session(0));
    assert!(matches!(
        sent.last(),
        Some(FeedCommand::Unsubscribe { symbol }) if symbol.as_str() == "AAPL"
    ));
}

#[tokio::test]
async fn reconnect_replays_only_the_surviving_interest() {
    let (state, probe) = scripted_app_state(vec![FeedScript::Piped, FeedScript::Piped]);
    state.feed.connect().await.unwrap();

    let stayer = MockClient::new();
    let leaver = MockClient::new();
    let c1 = state.registry.add(stayer.clone()).await;
    let c2 = state.registry.add(leaver).await;
    state
        .router
        .subscribe(c1, &["AAPL".to_string(), "NVDA".to_string()])
        .await;
    state.router.subscribe(c2, &["MSFT".to_string()]).await;

    // The second client disconnects before the feed drops.
    state.router.unsubscribe_all(c2).await;
    state.registry.remove(c2).await;

    probe.close_pipe();
    wait_for("second dial", || probe.dial_count() == 2).await;
    wait_for("replayed interest", || {
        probe.sent_in_session(1).len() >= 2
    })
    .await;

    // Exactly the two surviving symbols, each subscribed once.
    let mut replayed = subscribes_in(&probe.sent_in_session(1));
    replayed.sort();
    assert_eq!(replayed, vec!["AAPL", "NVDA"]);
    assert_eq!(parse_commands(&probe.sent_in_session(1)).len(), 2);

    // The replayed subscription still routes.
    probe.push(&trade("AAPL", 192.25));
    wait_for("post-reconnect delivery", || stayer.received().len() == 1).await;
}

#[tokio::test]
async fn interest_collected_while_down_replays_on_the_first_connect() {
    let (state, probe) = scripted_app_state(vec![FeedScript::Reject, FeedScript::Piped]);

    // Startup connect fails; the relay keeps serving and retries behind
    // the scenes.
    assert!(state.feed.connect().await.is_err());
    state.feed.begin_reconnect().await;

    let client = MockClient::new();
    let c1 = state.registry.add(client.clone()).await;
    state.router.subscribe(c1, &["NVDA".to_string()]).await;

    wait_for("feed recovery", || state.feed.is_connected()).await;
    wait_for("replayed interest", || {
        subscribes_in(&probe.sent_in_session(0)).contains(&"NVDA".to_string())
    })
    .await;

    probe.push(&trade("NVDA", 495.0));
    wait_for("delivery after recovery", || client.received().len() == 1).await;
}

#[tokio::test]
async fn failed_delivery_purges_the_client_but_not_the_batch() {
    let (state, probe) = scripted_app_state(vec![FeedScript::Piped]);
    state.feed.connect().await.unwrap();

    let flaky = MockClient::failing();
    let steady = MockClient::new();
    let c1 = state.registry.add(flaky).await;
    let c2 = state.registry.add(steady.clone()).await;
    state.router.subscribe(c1, &["AAPL".to_string()]).await;
    state.router.subscribe(c2, &["MSFT".to_string()]).await;

    probe.push(&trade("AAPL", 190.0));
    probe.push(&trade("MSFT", 410.0));

    wait_for("steady delivery", || steady.received().len() == 1).await;
    wait_for("flaky client purged", || {
        // Purge pulls the client out of the registry and the maps, and
        // releases its exclusive symbol upstream.
        parse_commands(&probe.sent_in_session(0)).iter().any(|cmd| {
            matches!(cmd, FeedCommand::Unsubscribe { symbol } if symbol.as_str() == "AAPL")
        })
    })
    .await;
    assert_eq!(state.registry.count().await, 1);
    assert_eq!(state.router.active_symbols().await, vec!["MSFT"]);
}

#[tokio::test]
async fn shutdown_is_terminal_and_stops_the_retry_loop() {
    let (state, probe) = scripted_app_state(vec![FeedScript::Piped]);
    state.feed.connect().await.unwrap();

    // Drop the feed with nothing scripted after it: the link keeps
    // retrying until shutdown.
    probe.close_pipe();
    wait_for("retry attempts", || probe.dial_count() >= 2).await;

    state.feed.shutdown().await;
    let dials = probe.dial_count();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(probe.dial_count(), dials);
    assert!(matches!(
        state.feed.connect().await,
        Err(RelayError::ShutDown)
    ));
}
