// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Capacity enforcement on a real directory

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use toy_transformer::storage::StorageGovernor;

async fn file_names(dir: &std::path::Path) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    let mut reader = tokio::fs::read_dir(dir).await.unwrap();
    while let Some(entry) = reader.next_entry().await.unwrap() {
        if entry.file_type().await.unwrap().is_file() {
            names.insert(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names
}

#[tokio::test]
async fn test_keeps_only_newest_files() {
    let dir = TempDir::new().unwrap();
    let governor = StorageGovernor::new(dir.path().join("outputs"), 3).await.unwrap();

    for i in 0..7 {
        governor
            .store(&format!("out_{}.png", i), format!("payload {}", i).as_bytes())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let names = file_names(governor.dir()).await;
    let expected: BTreeSet<String> = ["out_4.png", "out_5.png", "out_6.png"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(names, expected);
}

#[tokio::test]
async fn test_concurrent_writers_respect_capacity() {
    let dir = TempDir::new().unwrap();
    let governor = Arc::new(StorageGovernor::new(dir.path(), 4).await.unwrap());

    let writers = (0..16).map(|i| {
        let governor = Arc::clone(&governor);
        tokio::spawn(async move { governor.store(&format!("f{:02}.bin", i), b"x").await })
    });
    for result in futures::future::join_all(writers).await {
        result.unwrap().unwrap();
    }

    assert_eq!(file_names(dir.path()).await.len(), 4);
}

#[tokio::test]
async fn test_files_removed_behind_its_back_are_tolerated() {
    let dir = TempDir::new().unwrap();
    let governor = StorageGovernor::new(dir.path(), 2).await.unwrap();

    governor.store("a.png", b"a").await.unwrap();
    governor.store("b.png", b"b").await.unwrap();
    tokio::fs::remove_file(dir.path().join("a.png")).await.unwrap();
    tokio::fs::remove_file(dir.path().join("b.png")).await.unwrap();

    assert_eq!(governor.enforce().await.unwrap(), None);
    governor.store("c.png", b"c").await.unwrap();
    assert_eq!(file_names(dir.path()).await.len(), 1);
}
