//! Kernel-queue behavior through the public API.
#![cfg(target_os = "linux")]

use std::sync::Arc;

use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, fork};
use pipevisor::{Message, Queue, QueueError, SpillSettings, SysvTransport, open_pair, queue_key};

fn unique_name() -> String {
    format!("pipevisor-test-{}", uuid::Uuid::new_v4())
}

#[test]
fn same_name_same_queues() {
    let dir = tempfile::tempdir().unwrap();
    let name = unique_name();
    assert_eq!(queue_key(&name), queue_key(&name));

    let (input, output) = open_pair(&name, dir.path(), 1024).unwrap();
    input.push(&Message::from("persisted")).unwrap();

    let (again, _) = open_pair(&name, dir.path(), 1024).unwrap();
    assert_eq!(again.len().unwrap(), 1);
    assert_eq!(again.pop().unwrap(), Some(Message::from("persisted")));
    assert!(output.is_empty().unwrap());

    input.destroy().unwrap();
    output.destroy().unwrap();
}

#[test]
fn large_payloads_spill_and_cross_processes() {
    let dir = tempfile::tempdir().unwrap();
    let transport = SysvTransport::open(queue_key(&unique_name())).unwrap();
    let queue = Queue::new(
        Arc::new(transport),
        SpillSettings {
            dir: dir.path().to_path_buf(),
            threshold: 256,
        },
    );
    let big = vec![7u8; 200_000];

    // SAFETY: the child only touches the queue and exits.
    match unsafe { fork() }.unwrap() {
        ForkResult::Child => {
            let code = match queue.push_wait(&Message::new(big.clone())) {
                Ok(()) => 0,
                Err(_) => 1,
            };
            std::process::exit(code);
        }
        ForkResult::Parent { child } => {
            assert_eq!(waitpid(child, None).unwrap(), WaitStatus::Exited(child, 0));
        }
    }

    let got = queue.pop().unwrap().unwrap();
    assert_eq!(got.as_bytes(), big.as_slice());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

    queue.push_empty().unwrap();
    assert_eq!(queue.pop().unwrap(), None);
    queue.destroy().unwrap();
}

#[test]
fn threshold_above_kernel_limit_still_spills() {
    let dir = tempfile::tempdir().unwrap();
    let (input, output) = open_pair(&unique_name(), dir.path(), 1 << 20).unwrap();
    let payload = vec![7u8; 100_000];

    input.push(&Message::new(payload.clone())).unwrap();
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    assert_eq!(input.pop().unwrap(), Some(Message::new(payload)));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

    input.destroy().unwrap();
    output.destroy().unwrap();
}

#[test]
fn destroyed_queue_rejects_operations() {
    let dir = tempfile::tempdir().unwrap();
    let (input, output) = open_pair(&unique_name(), dir.path(), 1024).unwrap();
    input.destroy().unwrap();
    output.destroy().unwrap();
    assert!(matches!(input.push(&Message::from("x")), Err(QueueError::Sys { .. })));
}
