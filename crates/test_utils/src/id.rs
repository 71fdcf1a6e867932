//! Test utilities associated with ids.

/// Multicodec for raw blocks.
const RAW: u64 = 0x55;

/// Multihash code for sha2-256.
const SHA2_256: u64 = 0x12;

/// A well-formed CIDv1 string, deterministic in `seed`.
///
/// The digest is not a real hash of anything, it is only distinct per seed.
pub fn test_cid(seed: u8) -> String {
    let mut digest = [0_u8; 32];
    for (i, b) in digest.iter_mut().enumerate() {
        *b = seed.wrapping_add(i as u8);
    }
    let mh = cid::multihash::Multihash::<64>::wrap(SHA2_256, &digest)
        .expect("32 byte digest fits a 64 byte multihash");
    cid::Cid::new_v1(RAW, mh).to_string()
}

/// The CIDv1 (raw codec, sha2-256) that actually addresses `data`.
pub fn block_cid(data: &[u8]) -> String {
    use sha2::Digest;

    let digest = sha2::Sha256::digest(data);
    let mh = cid::multihash::Multihash::<64>::wrap(SHA2_256, &digest)
        .expect("32 byte digest fits a 64 byte multihash");
    cid::Cid::new_v1(RAW, mh).to_string()
}

/// `count` distinct well-formed CIDv1 strings.
pub fn test_cids(count: u8) -> Vec<String> {
    (0..count).map(test_cid).collect()
}

/// Well-formed peer ids of public bootstrap nodes.
pub const TEST_PEER_IDS: [&str; 4] = [
    "12D3KooWB5HcweB1wdgK8bjfTRHcZdvMFd6ffrn6XqMMyUG7pakP",
    "QmNnooDu7bfjPFoTZYxMNLWUQJyrVwtbZg5gBMjTezGAJN",
    "QmQCU2EcMqAqQPR2i9bChDtGNJchTbq5TbXJJ16u19uLTa",
    "QmbLHAnMoJPWSCR5Zhtx6BHJX9KiKNN6tpvbUcqanj75Nb",
];
