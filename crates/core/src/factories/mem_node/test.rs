use super::*;
use cidpull_test_utils::*;

fn peer(i: usize) -> PeerId {
    TEST_PEER_IDS[i].parse().unwrap()
}

fn cid(seed: u8) -> ContentId {
    test_cid(seed).parse().unwrap()
}

#[tokio::test]
async fn get_inserted_block() {
    let node = MemContentNode::create();
    node.insert(cid(1), bytes::Bytes::from_static(b"hello"));

    let obj = node.get(cid(1)).await.unwrap();
    assert_eq!(5, obj.size());
    assert_eq!(1, node.get_calls());

    let err = node.get(cid(2)).await.unwrap_err();
    assert!(err.to_string().contains("not found"), "{err}");
    assert_eq!(None, err.partial_size);
    assert_eq!(2, node.get_calls());
}

#[tokio::test]
async fn injected_failures_run_out() {
    let node = MemContentNode::create();
    node.insert(cid(1), bytes::Bytes::from_static(b"hello"));
    node.fail_next(cid(1), 2, Some(4));

    assert_eq!(Some(4), node.get(cid(1)).await.unwrap_err().partial_size);
    assert!(node.get(cid(1)).await.is_err());
    assert!(node.get(cid(1)).await.is_ok());
}

#[tokio::test]
async fn connect_needs_addresses_and_reachability() {
    let node = MemContentNode::create();

    assert!(node.connect(peer(0)).await.is_err());

    node.add_addresses(
        peer(0),
        vec!["/ip4/10.0.0.1/tcp/4001".parse().unwrap()],
        Duration::from_secs(60),
    );
    let err = node.connect(peer(0)).await.unwrap_err();
    assert!(err.to_string().contains("refused"), "{err}");
    assert!(!node.is_connected(&peer(0)));

    node.set_reachable(peer(0));
    node.connect(peer(0)).await.unwrap();
    assert!(node.is_connected(&peer(0)));
    assert_eq!(vec![peer(0); 3], node.connect_attempts());
}

#[tokio::test]
async fn trim_keeps_protected() {
    let node = MemContentNode::create();
    for i in 0..2 {
        node.add_addresses(
            peer(i),
            vec!["/ip4/10.0.0.1/tcp/4001".parse().unwrap()],
            Duration::from_secs(60),
        );
        node.set_reachable(peer(i));
        node.connect(peer(i)).await.unwrap();
    }
    node.protect(&peer(1), "pinning");

    assert_eq!(1, node.trim_connections());
    assert!(!node.is_connected(&peer(0)));
    assert!(node.is_connected(&peer(1)));
    assert!(node.is_protected(&peer(1), "pinning"));
}
