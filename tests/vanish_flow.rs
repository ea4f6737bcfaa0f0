//! End-to-end vanish flow: observe -> enqueue -> batch -> verdict -> reappear.
//!
//! Drives the shared state exactly the way the kernel surface does
//! (create observes, release enqueues) and runs a real Courier against a
//! stub brain listening on a Unix socket, without mounting anything.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use magicfolder::core::Identity;
use magicfolder::{BrainClient, Courier, FolderState, SharedState};

fn new_state(backing: &TempDir) -> SharedState {
    FolderState::new(backing.path().to_path_buf(), Identity::capture())
}

fn category_by_extension(path: &str) -> Option<&'static str> {
    let ext = Path::new(path).extension()?.to_str()?;
    match ext {
        "txt" | "pdf" => Some("Documents"),
        "jpg" | "png" => Some("Images"),
        "py" => Some("Code"),
        _ => None,
    }
}

/// Stub brain: one reply per connection, categories chosen by extension.
/// Requests are counted so tests can assert on batching.
fn spawn_stub_brain(socket: PathBuf, requests: Arc<AtomicUsize>) {
    let listener = std::os::unix::net::UnixListener::bind(&socket).unwrap();
    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            let mut request = String::new();
            if stream.read_to_string(&mut request).is_err() {
                continue;
            }
            requests.fetch_add(1, Ordering::SeqCst);

            let value: serde_json::Value = match serde_json::from_str(request.trim()) {
                Ok(value) => value,
                Err(_) => continue,
            };
            let files = value["files"].as_array().cloned().unwrap_or_default();
            let results: Vec<serde_json::Value> = files
                .iter()
                .filter_map(|f| {
                    let path = f.as_str()?;
                    let category = category_by_extension(path)?;
                    Some(serde_json::json!({"path": path, "category": category}))
                })
                .collect();
            let reply = serde_json::json!({ "files": results }).to_string();
            let _ = stream.write_all(reply.as_bytes());
        }
    });
}

fn wait_until(timeout: Duration, mut pred: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if pred() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    pred()
}

/// Simulates what the Drive does for `echo hi > /mnt/<name>`.
fn write_and_release(state: &SharedState, name: &str, contents: &[u8]) {
    std::fs::write(state.backing_path(name), contents).unwrap();
    state.observe(name);
    state.enqueue_for_classification(name);
}

fn root_names(state: &SharedState) -> Vec<String> {
    state
        .visible_root_entries()
        .unwrap()
        .into_iter()
        .map(|(name, _)| name)
        .collect()
}

#[test]
fn single_file_vanishes_and_reappears_categorized() {
    let backing = TempDir::new().unwrap();
    let socket_dir = TempDir::new().unwrap();
    let socket = socket_dir.path().join("brain.ipc");
    spawn_stub_brain(socket.clone(), Arc::new(AtomicUsize::new(0)));

    let state = new_state(&backing);
    let mut courier = Courier::with_client(
        Arc::clone(&state),
        BrainClient::at(&socket),
        Duration::from_millis(50),
    )
    .unwrap();
    courier.start();

    write_and_release(&state, "doc1.txt", b"hi\n");

    // While pending the name is gone from the root.
    assert!(!root_names(&state).contains(&"doc1.txt".to_string()));

    let categorized = wait_until(Duration::from_secs(2), || {
        let registry = state.registry.lock().unwrap();
        registry.category_of("doc1.txt") == Some("Documents")
    });
    assert!(categorized, "classification never landed");

    let names = root_names(&state);
    assert!(names.contains(&"Documents".to_string()));
    assert!(!names.contains(&"doc1.txt".to_string()));
    assert_eq!(
        state.visible_category_entries("Documents").unwrap(),
        vec!["doc1.txt"]
    );

    // The bytes written at creation time read back verbatim through the
    // category path (same backing file).
    let bytes = std::fs::read(state.backing_path("doc1.txt")).unwrap();
    assert_eq!(bytes, b"hi\n");

    courier.stop();
}

#[test]
fn burst_of_files_rides_one_batch() {
    let backing = TempDir::new().unwrap();
    let socket_dir = TempDir::new().unwrap();
    let socket = socket_dir.path().join("brain.ipc");
    let requests = Arc::new(AtomicUsize::new(0));
    spawn_stub_brain(socket.clone(), Arc::clone(&requests));

    let state = new_state(&backing);
    let mut courier = Courier::with_client(
        Arc::clone(&state),
        BrainClient::at(&socket),
        Duration::from_millis(250),
    )
    .unwrap();
    courier.start();

    let files = ["doc1.txt", "doc2.txt", "img1.jpg", "img2.png", "code1.py"];
    for name in files {
        write_and_release(&state, name, b"x");
    }

    let all_landed = wait_until(Duration::from_secs(2), || {
        let registry = state.registry.lock().unwrap();
        files.iter().all(|name| registry.is_categorized(name))
    });
    assert!(all_landed, "not every file was categorized");

    {
        let registry = state.registry.lock().unwrap();
        assert_eq!(registry.category_of("doc1.txt"), Some("Documents"));
        assert_eq!(registry.category_of("doc2.txt"), Some("Documents"));
        assert_eq!(registry.category_of("img1.jpg"), Some("Images"));
        assert_eq!(registry.category_of("img2.png"), Some("Images"));
        assert_eq!(registry.category_of("code1.py"), Some("Code"));
    }

    let names = root_names(&state);
    assert_eq!(names.len(), 3);
    for category in ["Documents", "Images", "Code"] {
        assert!(names.contains(&category.to_string()));
    }

    // The debounce coalesced the burst into a single brain exchange.
    assert_eq!(requests.load(Ordering::SeqCst), 1);

    courier.stop();
}

#[test]
fn brain_down_leaves_file_hidden_but_driver_alive() {
    let backing = TempDir::new().unwrap();
    let socket_dir = TempDir::new().unwrap();
    let socket = socket_dir.path().join("nobody.ipc"); // never bound

    let state = new_state(&backing);
    let mut courier = Courier::with_client(
        Arc::clone(&state),
        BrainClient::at(&socket),
        Duration::from_millis(50),
    )
    .unwrap();
    courier.start();

    write_and_release(&state, "x.dat", b"payload");

    // The batch fails fast (no socket); the name must settle as rejected:
    // still hidden, never categorized, bytes intact.
    let settled = wait_until(Duration::from_secs(2), || {
        state.queue_is_empty()
            && !state
                .registry
                .lock()
                .unwrap()
                .record("x.dat")
                .map(|r| r.processing)
                .unwrap_or(false)
    });
    assert!(settled);

    {
        let registry = state.registry.lock().unwrap();
        assert!(registry.is_hidden("x.dat"));
        assert!(!registry.is_categorized("x.dat"));
    }
    assert!(!root_names(&state).contains(&"x.dat".to_string()));
    assert!(state.backing_path("x.dat").exists());

    courier.stop();

    // Rejected names are not retried automatically; a fresh release is the
    // way back in.
    state.enqueue_for_classification("x.dat");
    let batch = state.drain_batch();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].0, "x.dat");
}

#[test]
fn recreated_file_reclassifies_exactly_once() {
    let backing = TempDir::new().unwrap();
    let socket_dir = TempDir::new().unwrap();
    let socket = socket_dir.path().join("brain.ipc");
    spawn_stub_brain(socket.clone(), Arc::new(AtomicUsize::new(0)));

    let state = new_state(&backing);
    let mut courier = Courier::with_client(
        Arc::clone(&state),
        BrainClient::at(&socket),
        Duration::from_millis(50),
    )
    .unwrap();
    courier.start();

    write_and_release(&state, "doc1.txt", b"first");
    assert!(wait_until(Duration::from_secs(2), || {
        state.registry.lock().unwrap().is_categorized("doc1.txt")
    }));

    // Same basename written again: the binding drops while the new
    // verdict is pending.
    write_and_release(&state, "doc1.txt", b"second");
    {
        let registry = state.registry.lock().unwrap();
        assert!(registry.is_hidden("doc1.txt"));
        assert!(!registry.is_categorized("doc1.txt"));
    }
    assert!(state
        .visible_category_entries("Documents")
        .unwrap()
        .is_empty());

    assert!(wait_until(Duration::from_secs(2), || {
        state.registry.lock().unwrap().is_categorized("doc1.txt")
    }));
    assert_eq!(
        state.visible_category_entries("Documents").unwrap(),
        vec!["doc1.txt"]
    );

    courier.stop();
}

#[test]
fn pending_file_is_invisible_during_debounce() {
    let backing = TempDir::new().unwrap();
    let socket_dir = TempDir::new().unwrap();
    let socket = socket_dir.path().join("brain.ipc");
    spawn_stub_brain(socket.clone(), Arc::new(AtomicUsize::new(0)));

    let state = new_state(&backing);
    let mut courier = Courier::with_client(
        Arc::clone(&state),
        BrainClient::at(&socket),
        Duration::from_millis(500),
    )
    .unwrap();
    courier.start();

    write_and_release(&state, "a.txt", b"a");

    // Well inside the debounce window: listed nowhere.
    std::thread::sleep(Duration::from_millis(100));
    let names = root_names(&state);
    assert!(!names.contains(&"a.txt".to_string()));
    assert!(!names.contains(&"Documents".to_string()));

    courier.stop();
}

#[test]
fn shutdown_wakes_an_idle_courier() {
    let backing = TempDir::new().unwrap();
    let socket_dir = TempDir::new().unwrap();
    let socket = socket_dir.path().join("brain.ipc");

    let state = new_state(&backing);
    let mut courier = Courier::with_client(
        Arc::clone(&state),
        BrainClient::at(&socket),
        Duration::from_millis(50),
    )
    .unwrap();
    courier.start();

    // No work ever arrives; stop() must still return promptly.
    let started = Instant::now();
    courier.stop();
    assert!(started.elapsed() < Duration::from_secs(2));
}
