use crate::integration::{create_test_relay, init_tracing};
use crate::utils::{MeshPeer, connect_negotiated, settle};
use meshroom_client::LinkState;

#[tokio::test]
async fn test_leave_tears_down_both_sides() {
    init_tracing();
    let relay = create_test_relay();

    let mut a = MeshPeer::connect(&relay, "a", "r1").await.unwrap();
    let mut b = MeshPeer::connect(&relay, "b", "r1").await.unwrap();
    a.session.join().await.unwrap();
    b.session.join().await.unwrap();
    settle(&mut [&mut a, &mut b]).await;
    connect_negotiated(&mut [&mut a, &mut b]).await;
    assert_eq!(a.session.link_state(&b.id()), Some(LinkState::Stable));

    b.session.leave().await;
    settle(&mut [&mut a, &mut b]).await;

    assert!(b.session.registry().is_empty());
    assert!(b.factory.latest("a").is_closed());
    assert!(!b.media.is_active());

    assert!(a.session.registry().is_empty());
    assert!(a.session.roster().is_empty());
    assert!(a.factory.latest("b").is_closed());
}

#[tokio::test]
async fn test_abrupt_disconnect_closes_remote_links() {
    init_tracing();
    let relay = create_test_relay();

    let mut a = MeshPeer::connect(&relay, "a", "r1").await.unwrap();
    let mut b = MeshPeer::connect(&relay, "b", "r1").await.unwrap();
    let mut c = MeshPeer::connect(&relay, "c", "r1").await.unwrap();
    for peer in [&mut a, &mut b, &mut c] {
        peer.session.join().await.unwrap();
    }
    settle(&mut [&mut a, &mut b, &mut c]).await;
    connect_negotiated(&mut [&mut a, &mut b, &mut c]).await;

    relay.disconnect(b.session_id).await.unwrap();
    settle(&mut [&mut a, &mut c]).await;

    assert_eq!(a.session.registry().remote_ids(), vec![c.id()]);
    assert_eq!(c.session.registry().remote_ids(), vec![a.id()]);
    assert_eq!(a.session.link_state(&c.id()), Some(LinkState::Stable));
}

#[tokio::test]
async fn test_rejoin_after_leave_builds_fresh_link() {
    init_tracing();
    let relay = create_test_relay();

    let mut a = MeshPeer::connect(&relay, "a", "r1").await.unwrap();
    let mut b = MeshPeer::connect(&relay, "b", "r1").await.unwrap();
    a.session.join().await.unwrap();
    b.session.join().await.unwrap();
    settle(&mut [&mut a, &mut b]).await;

    b.session.leave().await;
    settle(&mut [&mut a, &mut b]).await;
    b.session.join().await.unwrap();
    settle(&mut [&mut a, &mut b]).await;
    connect_negotiated(&mut [&mut a, &mut b]).await;

    let transports = a.factory.created_for("b");
    assert_eq!(transports.len(), 2);
    assert!(transports[0].is_closed());
    assert_eq!(a.session.link_state(&b.id()), Some(LinkState::Stable));
    assert_eq!(b.media.times_acquired(), 2);
}

#[tokio::test]
async fn test_reconnect_on_fresh_session_renegotiates() {
    init_tracing();
    let relay = create_test_relay();

    let mut a = MeshPeer::connect(&relay, "a", "r1").await.unwrap();
    let mut b = MeshPeer::connect(&relay, "b", "r1").await.unwrap();
    a.session.join().await.unwrap();
    b.session.join().await.unwrap();
    settle(&mut [&mut a, &mut b]).await;
    connect_negotiated(&mut [&mut a, &mut b]).await;
    assert_eq!(a.session.link_state(&b.id()), Some(LinkState::Stable));

    // "b" comes back on a new relay session before the old one is gone.
    let mut b2 = MeshPeer::connect(&relay, "b", "r1").await.unwrap();
    b2.session.join().await.unwrap();
    settle(&mut [&mut a, &mut b, &mut b2]).await;

    relay.disconnect(b.session_id).await.unwrap();
    settle(&mut [&mut a, &mut b2]).await;
    connect_negotiated(&mut [&mut a, &mut b2]).await;

    let transports = a.factory.created_for("b");
    assert_eq!(transports.len(), 2);
    assert!(transports[0].is_closed());
    assert!(!transports[1].is_closed());
    assert_eq!(a.session.link_state(&b2.id()), Some(LinkState::Stable));
    assert_eq!(a.session.roster(), vec![b2.id()]);

    assert_eq!(b2.session.registry().remote_ids(), vec![a.id()]);
    assert_eq!(b2.session.link_state(&a.id()), Some(LinkState::Stable));
}
