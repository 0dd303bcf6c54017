use super::*;
use hive_core::message::CredentialState;

fn sample_state() -> CredentialState {
    let mut state = CredentialState::new();
    state.insert("device", vec![1, 2, 3]);
    state.insert("identity/123@s.whatsapp.net", vec![9; 32]);
    state
}

#[tokio::test]
async fn test_load_missing_returns_empty_state() {
    let tmp = tempfile::tempdir().unwrap();
    let store = CredentialStore::new(tmp.path());
    let state = store.load("s1").await.unwrap();
    assert!(state.is_empty());
}

#[tokio::test]
async fn test_save_then_load() {
    let tmp = tempfile::tempdir().unwrap();
    let store = CredentialStore::new(tmp.path());
    store.save("s1", &sample_state()).await.unwrap();

    let loaded = store.load("s1").await.unwrap();
    assert_eq!(loaded, sample_state());
    assert!(tmp.path().join("s1").join("creds.bin").exists());
}

#[tokio::test]
async fn test_save_overwrites_and_leaves_no_temp_files() {
    let tmp = tempfile::tempdir().unwrap();
    let store = CredentialStore::new(tmp.path());
    store.save("s1", &sample_state()).await.unwrap();

    let mut newer = CredentialState::new();
    newer.insert("device", vec![7]);
    store.save("s1", &newer).await.unwrap();

    assert_eq!(store.load("s1").await.unwrap(), newer);

    let files: Vec<_> = std::fs::read_dir(tmp.path().join("s1"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(files, vec!["creds.bin".to_string()]);
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let tmp = tempfile::tempdir().unwrap();
    let store = CredentialStore::new(tmp.path());
    store.save("a", &sample_state()).await.unwrap();

    assert!(store.load("b").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_corrupt_file_is_store_error() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(tmp.path().join("s1")).unwrap();
    std::fs::write(tmp.path().join("s1").join("creds.bin"), [0xff; 3]).unwrap();

    let store = CredentialStore::new(tmp.path());
    let err = store.load("s1").await.unwrap_err();
    assert!(err.to_string().contains("corrupt credentials"));
}

#[tokio::test]
async fn test_clear_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let store = CredentialStore::new(tmp.path());
    store.save("s1", &sample_state()).await.unwrap();

    store.clear("s1").await.unwrap();
    assert!(store.load("s1").await.unwrap().is_empty());
    store.clear("s1").await.unwrap();
}

#[tokio::test]
async fn test_list_only_returns_sessions_with_credentials() {
    let tmp = tempfile::tempdir().unwrap();
    let store = CredentialStore::new(tmp.path());
    assert!(store.list().await.unwrap().is_empty());

    store.save("beta", &sample_state()).await.unwrap();
    store.save("alpha", &sample_state()).await.unwrap();
    std::fs::create_dir_all(tmp.path().join("empty-dir")).unwrap();
    std::fs::write(tmp.path().join("stray.txt"), "x").unwrap();

    assert_eq!(store.list().await.unwrap(), vec!["alpha", "beta"]);
}

#[tokio::test]
async fn test_list_missing_root_is_empty() {
    let store = CredentialStore::new("/nonexistent/__hive_sessions__");
    assert!(store.list().await.unwrap().is_empty());
}
