//! Integration tests for the sled-backed content cache.

use shepherd_storage::{CacheKey, ContentCache, Keyspace, SledContentCache};
use tempfile::TempDir;

#[test]
fn put_then_get_returns_bytes() {
    let temp_dir = TempDir::new().unwrap();
    let cache = SledContentCache::open(temp_dir.path()).unwrap();
    let key = CacheKey::new("jkl1abc", "docs/readme.md", Keyspace::Raw);

    cache.put(&key, b"# Hi").unwrap();

    assert_eq!(cache.get(&key).unwrap(), Some(b"# Hi".to_vec()));
}

#[test]
fn unused_key_is_a_miss() {
    let temp_dir = TempDir::new().unwrap();
    let cache = SledContentCache::open(temp_dir.path()).unwrap();

    let missing = CacheKey::new("jkl1abc", "nothing/here.txt", Keyspace::Raw);
    assert_eq!(cache.get(&missing).unwrap(), None);
    assert!(cache.is_empty().unwrap());
}

#[test]
fn last_write_wins() {
    let temp_dir = TempDir::new().unwrap();
    let cache = SledContentCache::open(temp_dir.path()).unwrap();
    let key = CacheKey::new("owner", "a.txt", Keyspace::Raw);

    cache.put(&key, b"first").unwrap();
    cache.put(&key, b"second").unwrap();

    assert_eq!(cache.get(&key).unwrap(), Some(b"second".to_vec()));
    assert_eq!(cache.len().unwrap(), 1);
}

#[test]
fn entries_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().to_path_buf();
    let site = CacheKey::new("myproject", "about", Keyspace::Alias);
    let rendered = CacheKey::new("myproject", "readme.md", Keyspace::Markdown);

    {
        let cache = SledContentCache::open(&path).unwrap();
        cache.put(&site, b"<html></html>").unwrap();
        cache.put(&rendered, b"<h1>Hi</h1>").unwrap();
        cache.flush().unwrap();
    }

    {
        let cache = SledContentCache::open(&path).unwrap();
        assert_eq!(cache.get(&site).unwrap(), Some(b"<html></html>".to_vec()));
        assert_eq!(cache.get(&rendered).unwrap(), Some(b"<h1>Hi</h1>".to_vec()));

        let mut keys: Vec<String> = cache.keys().unwrap().iter().map(|k| k.to_string()).collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "alias:myproject_about".to_string(),
                "markdown:myproject_readme.md".to_string(),
            ]
        );
        assert_eq!(cache.len().unwrap(), 2);
    }
}

#[test]
fn same_key_on_another_route_is_a_miss() {
    let temp_dir = TempDir::new().unwrap();
    let cache = SledContentCache::open(temp_dir.path()).unwrap();
    let raw = CacheKey::new("owner", "blog", Keyspace::Raw);
    let site = CacheKey::new("owner", "blog", Keyspace::Site);

    cache.put(&raw, b"blog file").unwrap();

    assert_eq!(cache.get(&site).unwrap(), None);
    assert_eq!(cache.get(&raw).unwrap(), Some(b"blog file".to_vec()));
}
