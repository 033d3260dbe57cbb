//! Scheduler Tests
//!
//! Tests verify:
//! - Timer ordering, including equal deadlines
//! - Sleep always suspends, even for a zero duration
//! - The loop ends once nothing is ready, sleeping or waiting
//! - One waiter per handle and direction
//! - Socket I/O through the multiplexer

use std::cell::RefCell;
use std::net::SocketAddr;
use std::rc::Rc;
use std::time::{Duration, Instant};

use postvault::runtime::{TcpListener, TcpStream, TimerQueue};
use postvault::{Scheduler, VaultError};

fn loopback() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

// =============================================================================
// Timer Queue Tests
// =============================================================================

#[test]
fn test_timer_queue_orders_by_deadline() {
    let scheduler = Scheduler::new().unwrap();
    let first = scheduler.spawn(async {});
    let second = scheduler.spawn(async {});

    let now = Instant::now();
    let mut timers = TimerQueue::new();
    timers.push(now + Duration::from_millis(20), second);
    timers.push(now + Duration::from_millis(10), first);

    assert_eq!(timers.len(), 2);
    assert_eq!(timers.next_deadline(), Some(now + Duration::from_millis(10)));
    assert!(timers.pop_expired(now).is_empty());
    assert_eq!(timers.pop_expired(now + Duration::from_millis(30)), vec![first, second]);
    assert!(timers.is_empty());
}

#[test]
fn test_equal_deadlines_fire_in_registration_order() {
    let scheduler = Scheduler::new().unwrap();
    let a = scheduler.spawn(async {});
    let b = scheduler.spawn(async {});
    let c = scheduler.spawn(async {});

    let deadline = Instant::now();
    let mut timers = TimerQueue::new();
    timers.push(deadline, b);
    timers.push(deadline, a);
    timers.push(deadline, c);

    assert_eq!(timers.pop_expired(deadline), vec![b, a, c]);
}

// =============================================================================
// Task Tests
// =============================================================================

#[test]
fn test_block_on_returns_output() {
    let mut scheduler = Scheduler::new().unwrap();
    let value = scheduler.block_on(async { 40 + 2 }).unwrap();
    assert_eq!(value, 42);
}

#[test]
fn test_run_returns_when_idle() {
    let mut scheduler = Scheduler::new().unwrap();
    scheduler.run().unwrap();

    let counter = Rc::new(RefCell::new(0));
    for _ in 0..3 {
        let counter = Rc::clone(&counter);
        scheduler.spawn(async move {
            *counter.borrow_mut() += 1;
        });
    }
    scheduler.run().unwrap();

    assert_eq!(*counter.borrow(), 3);
    assert_eq!(scheduler.handle().task_count(), 0);
}

#[test]
fn test_spawned_task_runs_after_spawner_suspends() {
    let mut scheduler = Scheduler::new().unwrap();
    let handle = scheduler.handle();
    let log = Rc::new(RefCell::new(Vec::new()));

    let outer = Rc::clone(&log);
    scheduler.spawn(async move {
        let inner = Rc::clone(&outer);
        handle.spawn(async move {
            inner.borrow_mut().push("child");
        });
        outer.borrow_mut().push("parent");
    });
    scheduler.run().unwrap();

    assert_eq!(*log.borrow(), vec!["parent", "child"]);
}

// =============================================================================
// Sleep Tests
// =============================================================================

#[test]
fn test_zero_sleep_yields_to_other_tasks() {
    let mut scheduler = Scheduler::new().unwrap();
    let handle = scheduler.handle();
    let log = Rc::new(RefCell::new(Vec::new()));

    let a = Rc::clone(&log);
    scheduler.spawn(async move {
        a.borrow_mut().push("a-before");
        handle.sleep(Duration::ZERO).await.unwrap();
        a.borrow_mut().push("a-after");
    });
    let b = Rc::clone(&log);
    scheduler.spawn(async move {
        b.borrow_mut().push("b");
    });
    scheduler.run().unwrap();

    assert_eq!(*log.borrow(), vec!["a-before", "b", "a-after"]);
}

#[test]
fn test_sleep_waits_at_least_duration() {
    let mut scheduler = Scheduler::new().unwrap();
    let handle = scheduler.handle();

    let elapsed = scheduler
        .block_on(async move {
            let start = Instant::now();
            handle.sleep(Duration::from_millis(30)).await.unwrap();
            start.elapsed()
        })
        .unwrap();

    assert!(elapsed >= Duration::from_millis(30));
}

#[test]
fn test_shorter_sleep_wakes_first() {
    let mut scheduler = Scheduler::new().unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));

    for (name, millis) in [("slow", 40), ("fast", 5)] {
        let handle = scheduler.handle();
        let log = Rc::clone(&log);
        scheduler.spawn(async move {
            handle.sleep(Duration::from_millis(millis)).await.unwrap();
            log.borrow_mut().push(name);
        });
    }
    scheduler.run().unwrap();

    assert_eq!(*log.borrow(), vec!["fast", "slow"]);
}

// =============================================================================
// Readiness Tests
// =============================================================================

#[test]
fn test_second_waiter_on_same_handle_is_rejected() {
    let mut scheduler = Scheduler::new().unwrap();
    let handle = scheduler.handle();

    let mut listener = TcpListener::bind(&handle, loopback()).unwrap();
    let addr = listener.local_addr().unwrap();
    let token = listener.token();

    let accepted = Rc::new(RefCell::new(false));
    let flag = Rc::clone(&accepted);
    scheduler.spawn(async move {
        listener.accept().await.unwrap();
        *flag.borrow_mut() = true;
    });

    let conflict = scheduler
        .block_on(async move {
            let result = handle.readable(token).await;
            // Let the accepting task finish so the loop can end
            let _stream = TcpStream::connect(&handle, addr).await.unwrap();
            result
        })
        .unwrap();

    assert!(matches!(
        conflict,
        Err(VaultError::WaiterConflict { direction: "read", .. })
    ));
    assert!(*accepted.borrow());
}

#[test]
fn test_echo_over_loopback() {
    let mut scheduler = Scheduler::new().unwrap();
    let handle = scheduler.handle();

    let mut listener = TcpListener::bind(&handle, loopback()).unwrap();
    let addr = listener.local_addr().unwrap();

    scheduler.spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 64];
        loop {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            stream.write_all(&buf[..n]).await.unwrap();
        }
        stream.shutdown_write().unwrap();
    });

    let echoed = scheduler
        .block_on(async move {
            let mut stream = TcpStream::connect(&handle, addr).await.unwrap();
            stream.write_all(b"hello scheduler").await.unwrap();
            stream.shutdown_write().unwrap();

            let mut received = Vec::new();
            let mut buf = [0u8; 64];
            loop {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
            }
            received
        })
        .unwrap();

    assert_eq!(echoed, b"hello scheduler");
    assert_eq!(scheduler.handle().waiter_count(), 0);
}

#[test]
fn test_connect_to_closed_port_fails() {
    // Grab a free port, then close it again
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();

    let mut scheduler = Scheduler::new().unwrap();
    let handle = scheduler.handle();
    let result = scheduler
        .block_on(async move { TcpStream::connect(&handle, addr).await.map(|_| ()) })
        .unwrap();

    assert!(result.is_err());
}
