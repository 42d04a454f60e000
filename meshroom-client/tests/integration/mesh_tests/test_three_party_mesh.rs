use crate::integration::{create_test_relay, init_tracing};
use crate::utils::{MeshPeer, candidate, connect_negotiated, settle};
use meshroom_client::{LinkState, TransportEventKind};
use meshroom_core::ParticipantId;

#[tokio::test]
async fn test_three_party_mesh() {
    init_tracing();
    let relay = create_test_relay();

    let mut a = MeshPeer::connect(&relay, "a", "r1").await.unwrap();
    let mut b = MeshPeer::connect(&relay, "b", "r1").await.unwrap();
    let mut c = MeshPeer::connect(&relay, "c", "r1").await.unwrap();

    a.session.join().await.unwrap();
    settle(&mut [&mut a, &mut b, &mut c]).await;
    b.session.join().await.unwrap();
    settle(&mut [&mut a, &mut b, &mut c]).await;
    c.session.join().await.unwrap();
    settle(&mut [&mut a, &mut b, &mut c]).await;

    connect_negotiated(&mut [&mut a, &mut b, &mut c]).await;

    for peer in [&a, &b, &c] {
        assert_eq!(peer.session.registry().len(), 2, "{} links", peer.id());
        assert_eq!(peer.factory.created().len(), 2, "{} transports", peer.id());
        for remote in peer.session.registry().remote_ids() {
            assert_eq!(peer.session.link_state(&remote), Some(LinkState::Stable));
        }
    }

    // One offer per pair, always from the smaller id.
    assert_eq!(a.factory.total_offers(), 2);
    assert_eq!(b.factory.total_offers(), 1);
    assert_eq!(c.factory.total_offers(), 0);

    assert_eq!(
        c.session.roster(),
        vec![ParticipantId::from("a"), ParticipantId::from("b")]
    );
}

#[tokio::test]
async fn test_candidates_reach_only_their_receiver() {
    init_tracing();
    let relay = create_test_relay();

    let mut a = MeshPeer::connect(&relay, "a", "r1").await.unwrap();
    let mut b = MeshPeer::connect(&relay, "b", "r1").await.unwrap();
    let mut c = MeshPeer::connect(&relay, "c", "r1").await.unwrap();

    for peer in [&mut a, &mut b, &mut c] {
        peer.session.join().await.unwrap();
    }
    settle(&mut [&mut a, &mut b, &mut c]).await;

    a.factory
        .latest("b")
        .report(TransportEventKind::CandidateGenerated(candidate(7)))
        .await;
    settle(&mut [&mut a, &mut b, &mut c]).await;

    assert_eq!(b.factory.latest("a").added_candidates(), vec![candidate(7)]);
    assert!(b.factory.latest("c").added_candidates().is_empty());
    assert!(c.factory.latest("a").added_candidates().is_empty());
}
