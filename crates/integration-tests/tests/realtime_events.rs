use integration_tests::TestApp;
use serde_json::Value;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::broadcast::Receiver;

async fn next_frame(rx: &mut Receiver<String>) -> Value {
    let raw = rx.recv().await.expect("event broadcast");
    serde_json::from_str(&raw).expect("JSON frame")
}

#[tokio::test]
async fn test_state_changes_are_broadcast() {
    let app = TestApp::new();
    let mut rx = app.state.realtime.subscribe();

    let id = app.create_meme("Doge HODL", &["crypto"]).await;
    let frame = next_frame(&mut rx).await;
    assert_eq!(frame["event"], "meme_created");
    assert_eq!(frame["payload"]["id"], id.to_string());
    assert_eq!(frame["payload"]["title"], "Doge HODL");

    app.vote(id, "up", "matrixdoge").await;
    let frame = next_frame(&mut rx).await;
    assert_eq!(frame["event"], "vote_update");
    assert_eq!(frame["payload"]["meme_id"], id.to_string());
    assert_eq!(frame["payload"]["upvotes"], 1);
    assert_eq!(frame["payload"]["user_vote"], "up");

    app.vote(id, "up", "matrixdoge").await;
    let frame = next_frame(&mut rx).await;
    assert_eq!(frame["payload"]["upvotes"], 0);
    assert!(frame["payload"]["user_vote"].is_null());

    app.bid(id, 42, "neonhacker").await;
    let frame = next_frame(&mut rx).await;
    assert_eq!(frame["event"], "bid_update");
    assert_eq!(frame["payload"]["credits"], 42);
    assert_eq!(frame["payload"]["user_id"], "neonhacker");
}

#[tokio::test]
async fn test_rejected_requests_broadcast_nothing() {
    let app = TestApp::new();
    let id = app.create_meme("Quiet", &[]).await;
    let mut rx = app.state.realtime.subscribe();

    app.vote(id, "sideways", "matrixdoge").await;
    app.bid(id, 0, "neonhacker").await;
    app.bid(uuid::Uuid::now_v7(), 10, "neonhacker").await;

    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn test_reads_broadcast_nothing() {
    let app = TestApp::new();
    app.create_meme("Read only", &[]).await;
    let mut rx = app.state.realtime.subscribe();

    app.get("/api/memes").await;
    app.get("/api/leaderboard").await;

    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}
