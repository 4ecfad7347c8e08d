//! Concurrent adds against a real on-disk catalog.

use crate::common::machine;
use boxcache_cli::action::handle_box_url;
use boxcache_cli::catalog::BoxCollection;
use boxcache_cli::coordinator::{BoxCoordinator, BoxLockRegistry};
use boxcache_cli::environment::Environment;
use boxcache_cli::fetch::BoxAdder;
use boxcache_cli::manifest::Manifest;
use boxcache_cli::test_utils::{ManifestFixture, RecordingUi};
use boxcache_cli::ui::SilentUi;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn disk_coordinator(
    boxes: &Path,
    registry: Arc<BoxLockRegistry>,
) -> Arc<BoxCoordinator<BoxCollection, BoxAdder>> {
    let collection = BoxCollection::new(boxes);
    let ui = Arc::new(SilentUi);
    Arc::new(BoxCoordinator::with_registry(
        registry,
        collection.clone(),
        BoxAdder::new(collection, ui.clone()),
        ui,
    ))
}

fn staging_dirs(boxes: &Path) -> Vec<String> {
    std::fs::read_dir(boxes)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with('.'))
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_adds_register_one_box() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("base.box");
    let content = vec![7u8; 256 * 1024];
    std::fs::write(&source, &content).unwrap();
    let boxes = temp.path().join("boxes");
    let coordinator = disk_coordinator(&boxes, Arc::new(BoxLockRegistry::new()));

    let url = source.to_string_lossy().into_owned();
    let handles: Vec<_> = (0..6)
        .map(|i| {
            let coordinator = Arc::clone(&coordinator);
            let m = machine(&format!("m{i}"), "base", &url, "virtualbox");
            tokio::spawn(async move { coordinator.ensure_present(&m).await })
        })
        .collect();
    for handle in handles {
        assert!(handle.await.unwrap().unwrap());
    }

    let all = BoxCollection::new(&boxes).all().await.unwrap();
    assert_eq!(all.len(), 1);
    let entry = &all[0];
    assert_eq!((entry.name.as_str(), entry.provider.as_str()), ("base", "virtualbox"));
    assert_eq!(entry.metadata.size, content.len() as u64);
    assert_eq!(entry.metadata.sha256, hex::encode(Sha256::digest(&content)));
    assert!(staging_dirs(&boxes).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_independent_registries_race_is_absorbed() {
    // Separate registries stand in for separate processes sharing one catalog;
    // only the catalog's atomic registration keeps them consistent.
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("base.box");
    std::fs::write(&source, vec![1u8; 512 * 1024]).unwrap();
    let boxes = temp.path().join("boxes");
    let url = source.to_string_lossy().into_owned();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let coordinator = disk_coordinator(&boxes, Arc::new(BoxLockRegistry::new()));
            let m = machine(&format!("m{i}"), "base", &url, "virtualbox");
            tokio::spawn(async move { coordinator.ensure_present(&m).await })
        })
        .collect();
    for handle in handles {
        assert!(handle.await.unwrap().unwrap());
    }

    let all = BoxCollection::new(&boxes).all().await.unwrap();
    assert_eq!(all.len(), 1);
    assert!(staging_dirs(&boxes).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_machines_sharing_a_box_all_reload_with_it() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("base.box");
    std::fs::write(&source, b"shared").unwrap();
    let boxes = temp.path().join("boxes");

    let fixture =
        ManifestFixture::machines(&["web", "db", "cache"], "base", &source.to_string_lossy());
    let catalog = BoxCollection::new(&boxes);
    let env = Arc::new(Environment::new(
        temp.path(),
        Manifest::parse(&fixture.content).unwrap(),
        HashMap::new(),
        catalog.clone(),
    ));
    let ui = Arc::new(RecordingUi::default());
    let coordinator = Arc::new(BoxCoordinator::with_registry(
        Arc::new(BoxLockRegistry::new()),
        catalog.clone(),
        BoxAdder::new(catalog, ui.clone()),
        ui.clone(),
    ));

    let handles: Vec<_> = env
        .machine_names()
        .into_iter()
        .map(|name| {
            let env = Arc::clone(&env);
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                let m = env.machine(&name, None, false).await?;
                handle_box_url(&env, &coordinator, m).await
            })
        })
        .collect();

    for handle in handles {
        let m = handle.await.unwrap().unwrap();
        let entry = m.box_entry().expect("machine reloaded with its box");
        assert_eq!(entry.name, "base");
    }

    let not_found = ui
        .messages()
        .iter()
        .filter(|m| m.contains("could not be found"))
        .count();
    assert_eq!(not_found, 1, "only the fetching machine announces the download");
}
