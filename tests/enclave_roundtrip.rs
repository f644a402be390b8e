use fidovault::cipher::{SealBackend, SoftwareBackend};
use fidovault::enclave::UserRecord;
use fidovault::key::{KeyHandle, KeyStore};
use fidovault::{Bucket, Enclave, EnclaveError};

const KEY_HEX: &str = "15308490f1e4026284594dd08d31291bc8ef2aeac730d0daf6ff87bb92d4336c";

fn open(path: &std::path::Path) -> Enclave {
    Enclave::open_with_hex_key(path, KEY_HEX).unwrap()
}

#[test]
fn test_enclave_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("enclave.bin");

    {
        let enclave = open(&path);
        enclave.put(Bucket::USERS, b"alice", b"alice's record").unwrap();
        enclave.put(Bucket::KEY_HANDLES, b"cred-1", b"key material").unwrap();
        enclave.close();
    }

    // Reopen from disk with the same key
    let enclave = open(&path);
    assert_eq!(enclave.record_count(Bucket::USERS).unwrap(), 1);
    assert_eq!(enclave.record_count(Bucket::KEY_HANDLES).unwrap(), 1);
    assert_eq!(
        enclave.get(Bucket::USERS, b"alice").unwrap().as_deref(),
        Some(&b"alice's record"[..])
    );
    assert_eq!(
        enclave.get_existing(Bucket::KEY_HANDLES, b"cred-1").unwrap(),
        b"key material"
    );
}

#[test]
fn test_buckets_are_separate() {
    let dir = tempfile::tempdir().unwrap();
    let enclave = open(&dir.path().join("enclave.bin"));

    enclave.put(Bucket::USERS, b"same-key", b"user").unwrap();
    assert_eq!(enclave.get(Bucket::KEY_HANDLES, b"same-key").unwrap(), None);
    assert_eq!(enclave.record_count(Bucket::KEY_HANDLES).unwrap(), 0);
}

#[test]
fn test_put_upserts() {
    let dir = tempfile::tempdir().unwrap();
    let enclave = open(&dir.path().join("enclave.bin"));

    enclave.put(Bucket::USERS, b"bob", b"first").unwrap();
    enclave.put(Bucket::USERS, b"bob", b"second").unwrap();

    assert_eq!(enclave.record_count(Bucket::USERS).unwrap(), 1);
    assert_eq!(enclave.get_existing(Bucket::USERS, b"bob").unwrap(), b"second");
}

#[test]
fn test_absent_record() {
    let dir = tempfile::tempdir().unwrap();
    let enclave = open(&dir.path().join("enclave.bin"));

    assert_eq!(enclave.get(Bucket::USERS, b"nobody").unwrap(), None);
    match enclave.get_existing(Bucket::USERS, b"nobody") {
        Err(EnclaveError::NotFound { bucket, key }) => {
            assert_eq!(bucket, Bucket::USERS);
            assert_eq!(key, "nobody");
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn test_wrong_key_fails_to_decrypt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("enclave.bin");

    open(&path).put(Bucket::USERS, b"carol", b"secret").unwrap();

    // The lookup digest is unkeyed, so another key still finds the record
    // but cannot open it
    let other = Enclave::open(&path, SoftwareBackend::new(&[0x42; 32]).unwrap()).unwrap();
    assert!(matches!(
        other.get(Bucket::USERS, b"carol"),
        Err(EnclaveError::Crypto(_))
    ));
    assert_eq!(other.get(Bucket::USERS, b"nobody").unwrap(), None);
}

#[test]
fn test_digest_stable_across_instances() {
    let a = SoftwareBackend::from_hex(KEY_HEX).unwrap();
    let b = SoftwareBackend::from_hex(KEY_HEX).unwrap();
    assert_eq!(a.digest(b"credential"), b.digest(b"credential"));
}

#[test]
fn test_file_holds_no_plaintext() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("enclave.bin");

    let enclave = open(&path);
    enclave
        .put(Bucket::USERS, b"plaintext-user-name", b"plaintext-payload")
        .unwrap();

    let raw = std::fs::read(&path).unwrap();
    let contains = |needle: &[u8]| raw.windows(needle.len()).any(|w| w == needle);
    assert!(!contains(b"plaintext-user-name"));
    assert!(!contains(b"plaintext-payload"));

    // The lookup key is stored as its hex digest
    let backend = SoftwareBackend::from_hex(KEY_HEX).unwrap();
    let digest = hex::encode(backend.digest(b"plaintext-user-name"));
    assert!(contains(digest.as_bytes()));
}

#[test]
fn test_wipe_then_reopen_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("enclave.bin");

    let enclave = open(&path);
    enclave.put(Bucket::KEY_HANDLES, b"cred", b"key").unwrap();
    enclave.wipe().unwrap();
    assert!(!enclave.is_open());
    assert!(!path.exists());

    // Repeating the wipe is harmless
    enclave.wipe().unwrap();

    let fresh = open(&path);
    assert_eq!(fresh.get(Bucket::KEY_HANDLES, b"cred").unwrap(), None);
    assert_eq!(fresh.record_count(Bucket::KEY_HANDLES).unwrap(), 0);
}

#[test]
fn test_closed_enclave_rejects_operations() {
    let dir = tempfile::tempdir().unwrap();
    let enclave = open(&dir.path().join("enclave.bin"));
    enclave.close();

    assert!(matches!(
        enclave.put(Bucket::USERS, b"x", b"y"),
        Err(EnclaveError::Closed)
    ));
    assert!(matches!(enclave.get(Bucket::USERS, b"x"), Err(EnclaveError::Closed)));
    assert!(matches!(enclave.record_count(Bucket::USERS), Err(EnclaveError::Closed)));
}

#[test]
fn test_malformed_key_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("enclave.bin");
    assert!(matches!(
        Enclave::open_with_hex_key(&path, "abcd"),
        Err(EnclaveError::Storage(_))
    ));
    assert!(Enclave::open_with_hex_key(&path, "zz").is_err());
}

#[test]
fn test_isolated_enclaves_in_parallel() {
    let dir = tempfile::tempdir().unwrap();
    let a = open(&dir.path().join("a.bin"));
    let b = open(&dir.path().join("b.bin"));

    a.put(Bucket::USERS, b"dave", b"in a").unwrap();
    assert_eq!(b.get(Bucket::USERS, b"dave").unwrap(), None);
}

#[test]
fn test_user_records() {
    let dir = tempfile::tempdir().unwrap();
    let enclave = open(&dir.path().join("enclave.bin"));

    let user = UserRecord::new("erin", b"wallet".to_vec()).with_credential(&[7; 32]);
    enclave.put_user(&user).unwrap();

    let loaded = enclave.get_existing_user("erin").unwrap();
    assert_eq!(loaded, user);
    assert_eq!(loaded.credentials, vec![vec![7u8; 32]]);
    assert!(enclave.get_user("frank").unwrap().is_none());
    assert!(matches!(
        enclave.get_existing_user("frank"),
        Err(EnclaveError::NotFound { .. })
    ));
}

#[test]
fn test_handles_on_same_path_keep_each_others_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("enclave.bin");
    let a = open(&path);
    let b = open(&path);

    let from_a = a.new_key_handle().unwrap();
    a.store_credential(&from_a, None).unwrap();
    let from_b = b.new_key_handle().unwrap();
    b.store_credential(&from_b, Some(("grace", &b"handle"[..]))).unwrap();

    // Each handle sees the other's writes without reopening
    assert!(b.is_owned(from_a.id()).unwrap());
    assert!(a.is_owned(from_b.id()).unwrap());
    assert!(a.get_user("grace").unwrap().is_some());

    let reopened = open(&path);
    assert_eq!(reopened.record_count(Bucket::KEY_HANDLES).unwrap(), 2);
    assert!(reopened.is_owned(from_a.id()).unwrap());
    assert!(reopened.is_owned(from_b.id()).unwrap());
}

#[test]
fn test_concurrent_writers_lose_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("enclave.bin");
    open(&path);

    let workers: Vec<_> = (0..4u8)
        .map(|worker| {
            let path = path.clone();
            std::thread::spawn(move || {
                let enclave = open(&path);
                for i in 0..5u8 {
                    enclave.put(Bucket::USERS, &[worker, i], &[worker, i]).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let enclave = open(&path);
    assert_eq!(enclave.record_count(Bucket::USERS).unwrap(), 20);
    assert_eq!(enclave.get_existing(Bucket::USERS, &[3, 4]).unwrap(), vec![3, 4]);
}

#[test]
fn test_new_key_handle_is_not_persisted_alone() {
    let dir = tempfile::tempdir().unwrap();
    let enclave = open(&dir.path().join("enclave.bin"));

    let handle = enclave.new_key_handle().unwrap();
    assert!(!enclave.is_owned(handle.id()).unwrap());

    enclave.store_credential(&handle, Some(("heidi", &b"h"[..]))).unwrap();
    assert!(enclave.is_owned(handle.id()).unwrap());
    assert_eq!(
        enclave.get_existing_user("heidi").unwrap().credentials,
        vec![handle.id().to_vec()]
    );
}

#[test]
fn test_put_all_stores_every_record() {
    let dir = tempfile::tempdir().unwrap();
    let enclave = open(&dir.path().join("enclave.bin"));

    enclave
        .put_all(&[
            (Bucket::USERS, &b"ivan"[..], &b"user"[..]),
            (Bucket::KEY_HANDLES, &b"cred"[..], &b"key"[..]),
        ])
        .unwrap();
    assert_eq!(enclave.get_existing(Bucket::USERS, b"ivan").unwrap(), b"user");
    assert_eq!(enclave.get_existing(Bucket::KEY_HANDLES, b"cred").unwrap(), b"key");
}
