use super::*;
use crate::{ConcurrencyGate, FetchConfig, FetchWorker};
use cidpull_api::id::CODEC_RAW;
use cidpull_test_utils::*;
use std::io::Write;
use std::net::TcpListener;
use std::sync::atomic::AtomicUsize;

fn cid(seed: u8) -> ContentId {
    test_cid(seed).parse().unwrap()
}

fn data_cid(data: &[u8]) -> ContentId {
    block_cid(data).parse().unwrap()
}

fn peer(i: usize) -> PeerId {
    TEST_PEER_IDS[i].parse().unwrap()
}

/// Answer `count` http requests with `status` and `body`, recording the
/// request heads.
fn serve(
    count: usize,
    status: &'static str,
    body: &'static [u8],
) -> (String, std::thread::JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let task = std::thread::spawn(move || {
        let mut heads = Vec::new();
        for _ in 0..count {
            let (mut sock, _) = listener.accept().unwrap();
            let mut head = Vec::new();
            let mut byte = [0_u8; 1];
            while !head.ends_with(b"\r\n\r\n") {
                if sock.read(&mut byte).unwrap() == 0 {
                    break;
                }
                head.push(byte[0]);
            }
            heads.push(String::from_utf8_lossy(&head).to_string());
            write!(
                sock,
                "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            )
            .unwrap();
            sock.write_all(body).unwrap();
        }
        heads
    });
    (url, task)
}

/// Accept connections and never answer them. Also returns the count of
/// connections the client has not closed yet.
fn serve_silently() -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let open = Arc::new(AtomicUsize::new(0));
    let open2 = open.clone();
    std::thread::spawn(move || {
        for sock in listener.incoming() {
            let Ok(mut sock) = sock else { break };
            open2.fetch_add(1, Ordering::SeqCst);
            let open = open2.clone();
            std::thread::spawn(move || {
                let mut buf = [0_u8; 1024];
                while matches!(sock.read(&mut buf), Ok(n) if n > 0) {}
                open.fetch_sub(1, Ordering::SeqCst);
            });
        }
    });
    (url, open)
}

fn node(url: &str, repo: &std::path::Path) -> Arc<GatewayNode> {
    GatewayNode::create(GatewayNodeConfig {
        gateway_url: url.into(),
        repo: repo.into(),
        ..Default::default()
    })
    .unwrap()
}

#[test]
fn block_url_shape() {
    let dir = tempfile::tempdir().unwrap();
    let n = node("https://dweb.link", dir.path());
    assert_eq!(
        format!("https://dweb.link/ipfs/{}?format=raw", test_cid(1)),
        n.block_url(&cid(1)).as_str(),
    );
}

#[test]
fn invalid_gateway_url() {
    let dir = tempfile::tempdir().unwrap();
    let err = GatewayNode::create(GatewayNodeConfig {
        gateway_url: "not a url".into(),
        repo: dir.path().into(),
        ..Default::default()
    })
    .unwrap_err();
    assert!(err.to_string().contains("invalid gateway url"), "{err}");
}

#[test]
fn tcp_targets() {
    let t = |s: &str| tcp_target(&s.parse().unwrap());
    assert_eq!(Some(("1.2.3.4".into(), 4001)), t("/ip4/1.2.3.4/tcp/4001"));
    assert_eq!(Some(("::1".into(), 80)), t("/ip6/::1/tcp/80"));
    assert_eq!(
        Some(("bacalhau.dokterbob.net".into(), 4001)),
        t("/dns/bacalhau.dokterbob.net/tcp/4001"),
    );
    assert_eq!(None, t("/dns/bacalhau.dokterbob.net/udp/4001/quic"));
}

#[tokio::test(flavor = "multi_thread")]
async fn fetches_then_serves_from_cache() {
    let dir = tempfile::tempdir().unwrap();
    let (url, server) = serve(1, "200 OK", b"block-bytes");
    let n = node(&url, dir.path());
    let id = data_cid(b"block-bytes");

    let obj = n.get(id).await.unwrap();
    assert_eq!(&b"block-bytes"[..], &obj.data[..]);

    let heads = server.join().unwrap();
    let head = heads[0].to_lowercase();
    assert!(
        head.starts_with(&format!("get /ipfs/{id}?format=raw ")),
        "{head}",
    );
    assert!(head.contains("accept: application/vnd.ipld.raw"), "{head}");

    let blocks = dir.path().join("blocks");
    assert!(blocks.join(id.to_string()).exists());
    let leftovers = std::fs::read_dir(&blocks)
        .unwrap()
        .filter(|e| {
            e.as_ref().unwrap().file_name().to_string_lossy().ends_with(".tmp")
        })
        .count();
    assert_eq!(0, leftovers);

    // the server has gone away, this must come from the cache
    let obj = n.get(id).await.unwrap();
    assert_eq!(11, obj.size());
}

#[tokio::test(flavor = "multi_thread")]
async fn rejects_block_not_matching_cid() {
    let dir = tempfile::tempdir().unwrap();
    let (url, server) = serve(1, "200 OK", b"not the block this cid hashes");
    let n = node(&url, dir.path());

    let err = n.get(cid(9)).await.unwrap_err();
    assert!(err.to_string().contains("does not hash to cid"), "{err}");
    assert_eq!(Some(29), err.partial_size);
    server.join().unwrap();
    assert!(!dir.path().join("blocks").join(test_cid(9)).exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn corrupt_cache_entry_is_evicted_and_refetched() {
    let dir = tempfile::tempdir().unwrap();
    let (url, server) = serve(1, "200 OK", b"block-bytes");
    let n = node(&url, dir.path());
    let id = data_cid(b"block-bytes");
    let path = dir.path().join("blocks").join(id.to_string());

    // a truncated write left behind by an earlier run
    std::fs::write(&path, b"bl").unwrap();

    let obj = n.get(id).await.unwrap();
    assert_eq!(11, obj.size());
    server.join().unwrap();
    assert_eq!(b"block-bytes".to_vec(), std::fs::read(&path).unwrap());
}

#[test]
fn verify_identity_and_unsupported_hashes() {
    let inline = |code: u64, data: &[u8]| -> ContentId {
        let mh = cid::multihash::Multihash::<64>::wrap(code, data).unwrap();
        ContentId(cid::Cid::new_v1(CODEC_RAW, mh))
    };

    assert!(verify_block(&inline(MH_IDENTITY, b"hi"), b"hi").is_ok());
    assert!(verify_block(&inline(MH_IDENTITY, b"hi"), b"ho").is_err());

    let err = verify_block(&inline(0x1e, &[7_u8; 32]), b"x").unwrap_err();
    assert!(err.to_string().contains("unsupported multihash"), "{err}");

    assert!(verify_block(&data_cid(b"abc"), b"abc").is_ok());
    assert!(verify_block(&data_cid(b"abc"), b"abd").is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn stalled_request_ends_by_itself() {
    let dir = tempfile::tempdir().unwrap();
    let (url, open) = serve_silently();
    let n = GatewayNode::create(GatewayNodeConfig {
        gateway_url: url,
        repo: dir.path().into(),
        request_timeout_ms: 100,
    })
    .unwrap();

    // no outer deadline: the request must give up on its own
    let res =
        tokio::time::timeout(Duration::from_secs(10), n.get(cid(5))).await;
    assert!(matches!(res, Ok(Err(_))), "{res:?}");

    wait_closed(&open).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn stalled_gateway_keeps_requests_within_gate() {
    let dir = tempfile::tempdir().unwrap();
    let (url, open) = serve_silently();
    let n = GatewayNode::create(GatewayNodeConfig {
        gateway_url: url,
        repo: dir.path().into(),
        request_timeout_ms: 50,
    })
    .unwrap();

    let w = FetchWorker::new(
        n,
        ConcurrencyGate::new(1),
        FetchConfig {
            fetch_timeout_ms: 2_000,
            max_retries: 0,
            ..Default::default()
        },
        tokio_util::sync::CancellationToken::new(),
    );

    for seed in 0..5 {
        let out = w.fetch(test_cid(seed)).await;
        assert!(
            matches!(out.error(), Some(FetchError::Retrieve { .. })),
            "{out:?}",
        );
        assert_eq!(0, w.gate().in_flight());
    }
    assert_eq!(1, w.gate().peak());

    wait_closed(&open).await;
}

async fn wait_closed(open: &AtomicUsize) {
    for _ in 0..200 {
        if open.load(Ordering::SeqCst) == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{} gateway requests still open", open.load(Ordering::SeqCst));
}

#[tokio::test(flavor = "multi_thread")]
async fn gateway_error_status() {
    let dir = tempfile::tempdir().unwrap();
    let (url, server) = serve(1, "404 Not Found", b"nope");
    let n = node(&url, dir.path());

    let err = n.get(cid(4)).await.unwrap_err();
    assert!(err.to_string().contains("gateway request"), "{err}");
    server.join().unwrap();
    assert!(!dir.path().join("blocks").join(test_cid(4)).exists());
}

#[tokio::test]
async fn dial_and_trim() {
    let dir = tempfile::tempdir().unwrap();
    let n = node("https://dweb.link", dir.path());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let accept = tokio::task::spawn(async move {
        let mut socks = Vec::new();
        for _ in 0..2 {
            socks.push(listener.accept().await.unwrap());
        }
        socks
    });

    for i in 0..2 {
        n.add_addresses(
            peer(i),
            vec![
                "/dns/example.invalid/udp/4001/quic".parse().unwrap(),
                format!("/ip4/127.0.0.1/tcp/{port}").parse().unwrap(),
            ],
            Duration::from_secs(60),
        );
        n.connect(peer(i)).await.unwrap();
        assert!(n.is_connected(&peer(i)));
    }
    let _socks = accept.await.unwrap();

    n.protect(&peer(0), "pinning");
    assert_eq!(1, n.trim_connections());
    assert!(n.is_connected(&peer(0)));
    assert!(!n.is_connected(&peer(1)));
}

#[tokio::test]
async fn closed_peer_is_not_connected() {
    let dir = tempfile::tempdir().unwrap();
    let n = node("https://dweb.link", dir.path());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    n.add_addresses(
        peer(0),
        vec![format!("/ip4/127.0.0.1/tcp/{port}").parse().unwrap()],
        Duration::from_secs(60),
    );

    let (dial, accept) = tokio::join!(n.connect(peer(0)), listener.accept());
    dial.unwrap();
    let (sock, _) = accept.unwrap();
    assert!(n.is_connected(&peer(0)));

    drop(sock);
    for _ in 0..200 {
        if !n.is_connected(&peer(0)) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("closed peer still reported as connected");
}

#[tokio::test]
async fn connect_without_tcp_address() {
    let dir = tempfile::tempdir().unwrap();
    let n = node("https://dweb.link", dir.path());

    let err = n.connect(peer(0)).await.unwrap_err();
    assert!(err.to_string().contains("no tcp addresses"), "{err}");

    n.add_addresses(
        peer(0),
        vec!["/dns/example.invalid/udp/4001/quic".parse().unwrap()],
        Duration::from_secs(60),
    );
    assert!(n.connect(peer(0)).await.is_err());
    assert!(!n.is_connected(&peer(0)));
}
