use crate::integration::{create_test_relay, init_tracing};
use crate::utils::{TestSession, ids};
use meshroom_core::{ParticipantId, RoomId, SignalMessage};

#[tokio::test]
async fn test_rejoin_other_room_leaves_previous() {
    init_tracing();
    let relay = create_test_relay();

    let mut a = TestSession::connect(&relay, "a", "r1").await.unwrap();
    let mut b = TestSession::connect(&relay, "b", "r1").await.unwrap();
    a.join_and_roster().await.unwrap();
    b.join_and_roster().await.unwrap();
    a.expect_peer_joined().await.unwrap();

    b.send(SignalMessage::JoinRoom {
        room_id: RoomId::from("r2"),
        participant_id: ParticipantId::from("b"),
    })
    .await
    .unwrap();

    assert!(b.expect_roster().await.unwrap().is_empty());
    assert_eq!(a.expect_peer_left().await.unwrap().as_str(), "b");

    assert_eq!(relay.members_of(RoomId::from("r1")).await.unwrap(), ids(&["a"]));
    assert_eq!(relay.members_of(RoomId::from("r2")).await.unwrap(), ids(&["b"]));
}

#[tokio::test]
async fn test_stale_session_cannot_evict_new_owner() {
    init_tracing();
    let relay = create_test_relay();

    let mut a = TestSession::connect(&relay, "a", "r1").await.unwrap();
    let mut old_b = TestSession::connect(&relay, "b", "r1").await.unwrap();
    let mut new_b = TestSession::connect(&relay, "b", "r1").await.unwrap();

    a.join_and_roster().await.unwrap();
    old_b.join_and_roster().await.unwrap();
    a.expect_peer_joined().await.unwrap();

    // Same participant id reconnects on a fresh transport.
    assert_eq!(new_b.join_and_roster().await.unwrap(), ids(&["a"]));
    assert_eq!(a.expect_peer_left().await.unwrap().as_str(), "b");
    assert_eq!(a.expect_peer_joined().await.unwrap().as_str(), "b");

    // The replaced session no longer speaks for "b".
    old_b.offer("a", "sdp-from-old-b").await.unwrap();
    assert!(matches!(old_b.recv().await.unwrap(), SignalMessage::Error { .. }));
    a.expect_silence().await.unwrap();

    old_b.drop_transport().await.unwrap();
    a.expect_silence().await.unwrap();
    assert_eq!(
        relay.members_of(RoomId::from("r1")).await.unwrap(),
        ids(&["a", "b"])
    );

    a.offer("b", "sdp-for-new-b").await.unwrap();
    assert!(matches!(new_b.recv().await.unwrap(), SignalMessage::Offer { .. }));
}

#[tokio::test]
async fn test_repeated_join_on_same_session_is_silent() {
    init_tracing();
    let relay = create_test_relay();

    let mut a = TestSession::connect(&relay, "a", "r1").await.unwrap();
    let mut b = TestSession::connect(&relay, "b", "r1").await.unwrap();
    a.join_and_roster().await.unwrap();
    b.join_and_roster().await.unwrap();
    a.expect_peer_joined().await.unwrap();

    assert_eq!(b.join_and_roster().await.unwrap(), ids(&["a"]));
    a.expect_silence().await.unwrap();
}
