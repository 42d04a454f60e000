use crate::integration::{create_test_relay, init_tracing};
use crate::utils::TestSession;
use meshroom_core::SignalMessage;

#[tokio::test]
async fn test_offer_reaches_only_its_receiver() {
    init_tracing();
    let relay = create_test_relay();

    let mut a = TestSession::connect(&relay, "a", "r1").await.unwrap();
    let mut b = TestSession::connect(&relay, "b", "r1").await.unwrap();
    let mut c = TestSession::connect(&relay, "c", "r1").await.unwrap();
    a.join_and_roster().await.unwrap();
    b.join_and_roster().await.unwrap();
    c.join_and_roster().await.unwrap();
    a.expect_peer_joined().await.unwrap();
    a.expect_peer_joined().await.unwrap();
    b.expect_peer_joined().await.unwrap();

    a.offer("b", "v=0 offer-a-to-b").await.unwrap();

    let SignalMessage::Offer {
        sender_id,
        receiver_id,
        sdp,
        ..
    } = b.recv().await.unwrap()
    else {
        panic!("b should receive the offer");
    };
    assert_eq!(sender_id.as_str(), "a");
    assert_eq!(receiver_id.as_str(), "b");
    assert_eq!(sdp, "v=0 offer-a-to-b");

    c.expect_silence().await.unwrap();
    a.expect_silence().await.unwrap();
}

#[tokio::test]
async fn test_messages_between_pair_keep_send_order() {
    init_tracing();
    let relay = create_test_relay();

    let mut a = TestSession::connect(&relay, "a", "r1").await.unwrap();
    let mut b = TestSession::connect(&relay, "b", "r1").await.unwrap();
    a.join_and_roster().await.unwrap();
    b.join_and_roster().await.unwrap();
    a.expect_peer_joined().await.unwrap();

    a.offer("b", "offer").await.unwrap();
    for i in 0..20 {
        a.ice_candidate("b", &format!("candidate:{}", i)).await.unwrap();
    }

    assert!(matches!(b.recv().await.unwrap(), SignalMessage::Offer { .. }));
    for i in 0..20 {
        let SignalMessage::IceCandidate { candidate, .. } = b.recv().await.unwrap() else {
            panic!("expected ice-candidate #{}", i);
        };
        assert_eq!(candidate["candidate"], format!("candidate:{}", i));
    }
}

#[tokio::test]
async fn test_answer_and_candidate_payloads_forwarded_verbatim() {
    init_tracing();
    let relay = create_test_relay();

    let mut a = TestSession::connect(&relay, "a", "r1").await.unwrap();
    let mut b = TestSession::connect(&relay, "b", "r1").await.unwrap();
    a.join_and_roster().await.unwrap();
    b.join_and_roster().await.unwrap();
    a.expect_peer_joined().await.unwrap();

    b.answer("a", "v=0\r\nanswer-body\r\n").await.unwrap();
    b.ice_candidate("a", "candidate:1 1 udp 2122260223 10.0.0.2 50000 typ host")
        .await
        .unwrap();

    let SignalMessage::Answer { sdp, .. } = a.recv().await.unwrap() else {
        panic!("a should receive the answer");
    };
    assert_eq!(sdp, "v=0\r\nanswer-body\r\n");

    let SignalMessage::IceCandidate { candidate, .. } = a.recv().await.unwrap() else {
        panic!("a should receive the candidate");
    };
    assert_eq!(
        candidate["candidate"],
        "candidate:1 1 udp 2122260223 10.0.0.2 50000 typ host"
    );
    assert_eq!(candidate["sdpMid"], "0");
}
