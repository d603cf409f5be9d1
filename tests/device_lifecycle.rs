// ============================================================================
// tests/device_lifecycle.rs - デバイス統合テスト
// ============================================================================

use std::sync::Arc;
use std::thread;

use hello_chrdev::{
    DeviceConfig, DeviceController, DeviceError, DeviceState, DynamicNamespace, NodeRegistry,
    UserArena,
};

struct Host {
    namespace: Arc<DynamicNamespace>,
    nodes: Arc<NodeRegistry>,
    user: Arc<UserArena>,
    dev: DeviceController,
}

fn host() -> Host {
    let namespace = Arc::new(DynamicNamespace::new());
    let nodes = Arc::new(NodeRegistry::new());
    let user = Arc::new(UserArena::new(64 * 1024));
    let dev = DeviceController::new(
        DeviceConfig::default(),
        namespace.clone(),
        nodes.clone(),
        user.clone(),
    )
    .unwrap();
    Host {
        namespace,
        nodes,
        user,
        dev,
    }
}

#[test]
fn full_module_lifecycle() {
    let h = host();
    assert_eq!(h.dev.open(), Err(DeviceError::NotPublished));

    h.dev.activate().unwrap();
    let identity = h.dev.identity().unwrap();
    assert_eq!(h.namespace.name_of(identity.major()).as_deref(), Some("hello"));
    assert_eq!(h.nodes.uevent("hello").unwrap(), vec!["DEVMODE=0666".to_string()]);

    let fd = h.dev.open().unwrap();
    assert_eq!(h.dev.control(fd, 0, 0), Ok(0));
    h.dev.release(fd).unwrap();

    h.dev.deactivate();
    assert_eq!(h.dev.state(), DeviceState::Unregistered);
    assert!(h.nodes.readdir().is_empty());
    assert_eq!(h.namespace.allocated(), 0);
}

#[test]
fn second_activate_is_rejected() {
    let h = host();
    h.dev.activate().unwrap();
    let err = h.dev.activate().unwrap_err();
    assert!(err.is_namespace());
    assert_eq!(h.namespace.allocated(), 1);
}

#[test]
fn buffer_is_shared_but_cursors_are_not() {
    let h = host();
    h.dev.activate().unwrap();

    let writer = h.dev.open().unwrap();
    let reader = h.dev.open().unwrap();
    let src = h.user.base();
    let dst = h.user.base().add(4096);

    let payload: Vec<u8> = (0..100u8).collect();
    h.user.poke(src, &payload).unwrap();
    assert_eq!(h.dev.write(writer, src, 100), Ok(100));
    assert_eq!(h.dev.position(writer), Ok(100));
    assert_eq!(h.dev.position(reader), Ok(0));

    assert_eq!(h.dev.read(reader, dst, 100), Ok(100));
    assert_eq!(h.user.peek(dst, 100).unwrap(), payload);
    assert_eq!(h.dev.position(writer), Ok(100));
    assert_eq!(h.dev.position(reader), Ok(100));
}

#[test]
fn released_handle_is_invalid() {
    let h = host();
    h.dev.activate().unwrap();
    let fd = h.dev.open().unwrap();
    h.dev.release(fd).unwrap();

    assert_eq!(h.dev.read(fd, h.user.base(), 4), Err(DeviceError::InvalidHandle));
    assert_eq!(h.dev.write(fd, h.user.base(), 4), Err(DeviceError::InvalidHandle));
    assert_eq!(h.dev.release(fd), Err(DeviceError::InvalidHandle));
}

#[test]
fn contents_persist_across_opens() {
    let h = host();
    h.dev.activate().unwrap();

    let fd = h.dev.open().unwrap();
    h.user.poke(h.user.base(), b"persist").unwrap();
    h.dev.write(fd, h.user.base(), 7).unwrap();
    h.dev.release(fd).unwrap();
    assert_eq!(h.dev.open_handles(), 0);

    let fd = h.dev.open().unwrap();
    let dst = h.user.base().add(100);
    assert_eq!(h.dev.read(fd, dst, 7), Ok(7));
    assert_eq!(h.user.peek(dst, 7).unwrap(), b"persist");
}

#[test]
fn concurrent_handles_stay_in_bounds() {
    let h = Arc::new(host());
    h.dev.activate().unwrap();

    let workers: Vec<_> = (0..4u8)
        .map(|i| {
            let h = Arc::clone(&h);
            thread::spawn(move || {
                let fd = h.dev.open().unwrap();
                let slot = h.user.base().add(8192 + i as usize * 2048);
                h.user.poke(slot, &[i + 1; 300]).unwrap();

                let mut total = 0;
                loop {
                    let n = h.dev.write(fd, slot, 300).unwrap();
                    if n == 0 {
                        break;
                    }
                    total += n;
                }
                assert_eq!(total, 1024);
                assert_eq!(h.dev.position(fd), Ok(1024));
                h.dev.release(fd).unwrap();
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    let fd = h.dev.open().unwrap();
    let dst = h.user.base();
    assert_eq!(h.dev.read(fd, dst, 4096), Ok(1024));
    assert_eq!(h.dev.read(fd, dst, 4096), Ok(0));
    let contents = h.user.peek(dst, 1024).unwrap();
    assert!(contents.iter().all(|&b| (1..=4).contains(&b)));
}

#[test]
fn try_deactivate_waits_for_handles() {
    let h = host();
    h.dev.activate().unwrap();
    let fd = h.dev.open().unwrap();

    assert_eq!(h.dev.try_deactivate(), Err(DeviceError::Busy));
    assert!(h.nodes.lookup("hello").is_some());

    h.dev.release(fd).unwrap();
    h.dev.try_deactivate().unwrap();
    assert!(h.nodes.lookup("hello").is_none());
    assert_eq!(DeviceError::Busy.errno(), -16);
}

#[test]
fn shared_handle_reads_are_serialized() {
    let h = Arc::new(host());
    h.dev.activate().unwrap();
    let fd = h.dev.open().unwrap();

    let workers: Vec<_> = (0..4usize)
        .map(|i| {
            let h = Arc::clone(&h);
            thread::spawn(move || {
                let slot = h.user.base().add(8192 + i * 1024);
                let mut total = 0;
                loop {
                    let n = h.dev.read(fd, slot, 100).unwrap();
                    if n == 0 {
                        break total;
                    }
                    total += n;
                }
            })
        })
        .collect();

    let total: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();
    assert_eq!(total, 1024);
    assert_eq!(h.dev.position(fd), Ok(1024));
}
