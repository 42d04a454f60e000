use crate::integration::{create_test_relay, init_tracing};
use crate::utils::TestSession;
use meshroom_core::SignalMessage;

#[tokio::test]
async fn test_answer_to_departed_peer_is_dropped() {
    init_tracing();
    let relay = create_test_relay();

    let mut a = TestSession::connect(&relay, "a", "r1").await.unwrap();
    let mut b = TestSession::connect(&relay, "b", "r1").await.unwrap();
    a.join_and_roster().await.unwrap();
    b.join_and_roster().await.unwrap();
    a.expect_peer_joined().await.unwrap();

    a.answer("ghost", "late answer").await.unwrap();
    a.ice_candidate("ghost", "candidate:0").await.unwrap();
    a.offer("b", "real offer").await.unwrap();

    // The sender is not told about the drop and stays connected.
    a.expect_silence().await.unwrap();

    let SignalMessage::Offer { sdp, .. } = b.recv().await.unwrap() else {
        panic!("b should still receive the offer");
    };
    assert_eq!(sdp, "real offer");
    b.expect_silence().await.unwrap();

    let stats = relay.stats().await.unwrap();
    assert_eq!(stats.joined_sessions, 2);
}

#[tokio::test]
async fn test_receiver_in_other_room_is_unreachable() {
    init_tracing();
    let relay = create_test_relay();

    let mut a = TestSession::connect(&relay, "a", "r1").await.unwrap();
    let mut b = TestSession::connect(&relay, "b", "r2").await.unwrap();
    a.join_and_roster().await.unwrap();
    b.join_and_roster().await.unwrap();

    a.offer("b", "cross-room").await.unwrap();

    b.expect_silence().await.unwrap();
    a.expect_silence().await.unwrap();
}
