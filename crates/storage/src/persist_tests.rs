// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde::{Deserialize, Serialize};
use std::io::Write;
use tempfile::tempdir;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Doc {
    name: String,
    count: u32,
}

#[test]
fn test_write_and_read_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("doc.json");

    let doc = Doc {
        name: "argo".to_string(),
        count: 3,
    };
    write_json_atomic(&path, &doc).unwrap();

    let loaded: Doc = read_json_tolerant(&path).unwrap().unwrap();
    assert_eq!(loaded, doc);
}

#[test]
fn test_write_creates_parent_and_leaves_no_tmp() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested/state/doc.json");

    write_json_atomic(&path, &Doc {
        name: "x".to_string(),
        count: 0,
    })
    .unwrap();

    assert!(path.exists());
    assert!(!path.with_extension("tmp").exists());
}

#[test]
fn test_read_missing_returns_none() {
    let dir = tempdir().unwrap();
    let result: Option<Doc> = read_json_tolerant(&dir.path().join("absent.json")).unwrap();
    assert!(result.is_none());
}

#[test]
fn test_read_corrupt_quarantines_to_bak() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("doc.json");

    let mut f = File::create(&path).unwrap();
    f.write_all(b"{\"name\": \"trunc").unwrap();
    drop(f);

    let result: Option<Doc> = read_json_tolerant(&path).unwrap();
    assert!(result.is_none());
    assert!(!path.exists());
    assert!(path.with_extension("bak").exists());
}

#[test]
fn test_bak_rotation_keeps_three() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("doc.json");

    for i in 1..=4u8 {
        let mut f = File::create(&path).unwrap();
        f.write_all(&[i; 4]).unwrap();
        drop(f);

        let result: Option<Doc> = read_json_tolerant(&path).unwrap();
        assert!(result.is_none());
    }

    assert_eq!(fs::read(path.with_extension("bak")).unwrap(), vec![4u8; 4]);
    assert_eq!(fs::read(path.with_extension("bak.2")).unwrap(), vec![3u8; 4]);
    assert_eq!(fs::read(path.with_extension("bak.3")).unwrap(), vec![2u8; 4]);
    assert!(!path.with_extension("bak.4").exists());
}
