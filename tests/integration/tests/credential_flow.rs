//! End-to-end credential and SSH key flows across several nodes sharing one
//! remote store.

use std::sync::Arc;
use std::time::Duration;

use xanthus_core::SecretString;
use xanthus_integration_tests::{account, node};
use xanthus_secrets::{keys, AccountContext, KeySource, KvStore, MemoryKvStore, SecretError};

#[tokio::test(start_paused = true)]
async fn test_secret_written_on_one_node_read_on_another() {
    let store = Arc::new(MemoryKvStore::new());
    let writer = node(&store);
    let reader = node(&store);
    let key = keys::provider_api_key("hetzner");

    writer
        .service
        .set_secret(&account(), &key, &SecretString::new("hz_live_12345"))
        .await
        .unwrap();

    // The writer reads its own write straight from the temp cache.
    let gets = store.calls().get;
    let own = writer.service.get_secret(&account(), &key).await.unwrap();
    assert_eq!(own.expose_secret(), "hz_live_12345");
    assert_eq!(store.calls().get, gets);

    // The reader sees two stale reads before the value propagates.
    store.simulate_lag(2);
    let start = tokio::time::Instant::now();
    let seen = reader.service.get_secret(&account(), &key).await.unwrap();
    assert_eq!(seen.expose_secret(), "hz_live_12345");
    assert_eq!(store.calls().get - gets, 3);
    assert_eq!(start.elapsed(), Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn test_unconfigured_and_mismatched_token_are_distinct() {
    let store = Arc::new(MemoryKvStore::new());
    let a = node(&store);
    let b = node(&store);
    let key = keys::provider_api_key("hetzner");

    let err = b.service.get_secret(&account(), &key).await.unwrap_err();
    assert!(matches!(err, SecretError::NotConfigured { .. }));
    assert!(err.user_message().contains("first-time setup"));

    a.service
        .set_secret(&account(), &key, &SecretString::new("hz_live_12345"))
        .await
        .unwrap();

    let rotated = AccountContext::new("tok-new", "acct-1");
    let err = b.service.get_secret(&rotated, &key).await.unwrap_err();
    assert!(matches!(err, SecretError::DecryptionFailed(_)));
    assert!(err.user_message().contains("could not be decrypted"));
}

#[tokio::test]
async fn test_accounts_do_not_share_secrets() {
    let store = Arc::new(MemoryKvStore::new());
    let a = node(&store);
    let key = keys::provider_api_key("hetzner");

    a.service
        .set_secret(&account(), &key, &SecretString::new("hz_live_12345"))
        .await
        .unwrap();

    assert_eq!(store.namespaces("acct-1").len(), 1);
    assert!(store.namespaces("acct-2").is_empty());
    let other = AccountContext::new("tok-abc", "acct-2");
    assert!(a.service.cache().get(other.account_id(), &key).is_none());
}

#[tokio::test]
async fn test_ssh_key_shared_through_remote_store() {
    let store = Arc::new(MemoryKvStore::new());
    let first = node(&store);
    let second = node(&store);

    let created = first.service.get_or_create_ssh_key(&account()).await.unwrap();
    assert_eq!(created.source, KeySource::Generated);
    assert!(created.remote.is_persisted());
    assert!(created.local.is_persisted());
    assert!(created.key_pair.public_key.starts_with("ssh-ed25519 "));

    let fetched = second.service.get_or_create_ssh_key(&account()).await.unwrap();
    assert_eq!(fetched.source, KeySource::Remote);
    assert_eq!(fetched.key_pair, created.key_pair);
    assert!(fetched.local.is_persisted());
    assert!(second.home.path().join("ssh").join("id_ed25519").exists());

    let puts = store.calls().put;
    let again = second.service.get_or_create_ssh_key(&account()).await.unwrap();
    assert_eq!(again.source, KeySource::Local);
    assert_eq!(again.key_pair.fingerprint, created.key_pair.fingerprint);
    assert_eq!(store.calls().put, puts);
}

#[tokio::test]
async fn test_ssh_key_survives_remote_outage() {
    let store = Arc::new(MemoryKvStore::new());
    let offline = node(&store);
    store.fail_writes(true);

    let acquired = offline.service.get_or_create_ssh_key(&account()).await.unwrap();
    assert_eq!(acquired.source, KeySource::Generated);
    assert!(acquired.remote.is_failed());
    assert!(acquired.local.is_persisted());

    // The local copy serves later calls even though nothing reached the store.
    let again = offline.service.get_or_create_ssh_key(&account()).await.unwrap();
    assert_eq!(again.source, KeySource::Local);
    assert_eq!(again.key_pair, acquired.key_pair);
}

#[tokio::test]
async fn test_unreadable_remote_key_is_never_overwritten() {
    let store = Arc::new(MemoryKvStore::new());
    let owner = node(&store);
    owner.service.get_or_create_ssh_key(&account()).await.unwrap();
    let namespace_id = store.namespaces("acct-1")[0].id.clone();
    let before = store
        .peek("acct-1", &namespace_id, keys::SSH_PRIVATE_KEY)
        .unwrap();

    // A node holding a different token cannot decrypt the shared key.
    let stranger = node(&store);
    let ctx = AccountContext::new("tok-other", "acct-1");
    let acquired = stranger.service.get_or_create_ssh_key(&ctx).await.unwrap();

    assert_eq!(acquired.source, KeySource::Generated);
    assert!(!acquired.remote.is_persisted());
    assert!(!acquired.remote.is_failed());
    assert_eq!(
        store.peek("acct-1", &namespace_id, keys::SSH_PRIVATE_KEY),
        Some(before)
    );
}

#[tokio::test]
async fn test_logout_keeps_remote_records() {
    let store = Arc::new(MemoryKvStore::new());
    let n = node(&store);
    let key = keys::provider_api_key("hetzner");
    n.service
        .set_secret(&account(), &key, &SecretString::new("hz_live_12345"))
        .await
        .unwrap();
    let created = n.service.get_or_create_ssh_key(&account()).await.unwrap();

    n.service.logout(&account()).await.unwrap();
    assert!(n.service.cache().is_empty());

    let namespace_id = store.namespaces("acct-1")[0].id.clone();
    assert!(store.peek("acct-1", &namespace_id, &key).is_some());
    assert_eq!(store.calls().delete, 0);

    let restored = n.service.get_or_create_ssh_key(&account()).await.unwrap();
    assert_eq!(restored.source, KeySource::Remote);
    assert_eq!(restored.key_pair.fingerprint, created.key_pair.fingerprint);

    // Direct store access still works through the trait object.
    let dyn_store: Arc<dyn KvStore> = store.clone();
    let bytes = dyn_store
        .get(&account(), &namespace_id, keys::SSH_PUBLIC_KEY)
        .await
        .unwrap();
    assert!(!bytes.is_empty());
}

#[tokio::test]
async fn test_listing_outage_never_replaces_shared_ssh_key() {
    let store = Arc::new(MemoryKvStore::new());
    let first = node(&store);
    let created = first.service.get_or_create_ssh_key(&account()).await.unwrap();

    let second = node(&store);
    store.fail_lists(1);
    let acquired = second.service.get_or_create_ssh_key(&account()).await.unwrap();
    assert_eq!(acquired.source, KeySource::Generated);
    assert!(!acquired.remote.is_persisted());

    // Once the outage clears, a fresh node still receives the original key.
    let third = node(&store);
    let fetched = third.service.get_or_create_ssh_key(&account()).await.unwrap();
    assert_eq!(fetched.source, KeySource::Remote);
    assert_eq!(fetched.key_pair.fingerprint, created.key_pair.fingerprint);
}
