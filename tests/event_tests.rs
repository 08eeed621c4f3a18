//! Event Queue Tests
//!
//! FIFO ordering, bounded capacity with observable drop counting, and the
//! ISR-safe bus facade.

use heapless::Vec;
use hl78xx_modem::event::{EventBus, EventQueue};
use hl78xx_modem::types::ModemEvent;

// ============================================================================
// EventQueue
// ============================================================================

#[test]
fn test_queue_starts_empty() {
    let queue: EventQueue<4> = EventQueue::new();
    assert!(queue.is_empty());
    assert_eq!(queue.len(), 0);
    assert_eq!(queue.dropped(), 0);
}

#[test]
fn test_queue_fifo_order() {
    let mut queue: EventQueue<4> = EventQueue::new();
    assert!(queue.push(ModemEvent::Resume));
    assert!(queue.push(ModemEvent::BusOpened));
    assert!(queue.push(ModemEvent::ScriptSuccess));

    assert_eq!(queue.pop(), Some(ModemEvent::Resume));
    assert_eq!(queue.pop(), Some(ModemEvent::BusOpened));
    assert_eq!(queue.pop(), Some(ModemEvent::ScriptSuccess));
    assert_eq!(queue.pop(), None);
}

#[test]
fn test_queue_duplicates_are_legal() {
    let mut queue: EventQueue<4> = EventQueue::new();
    assert!(queue.push(ModemEvent::Timeout));
    assert!(queue.push(ModemEvent::Timeout));
    assert_eq!(queue.len(), 2);
}

#[test]
fn test_queue_full_drops_newest_and_counts() {
    let mut queue: EventQueue<2> = EventQueue::new();
    assert!(queue.push(ModemEvent::Resume));
    assert!(queue.push(ModemEvent::Suspend));
    // Full: the newest arrival is lost, not an older entry.
    assert!(!queue.push(ModemEvent::Timeout));
    assert_eq!(queue.dropped(), 1);
    assert_eq!(queue.pop(), Some(ModemEvent::Resume));
    assert_eq!(queue.pop(), Some(ModemEvent::Suspend));
    assert_eq!(queue.pop(), None);
}

#[test]
fn test_queue_drop_counter_accumulates() {
    let mut queue: EventQueue<1> = EventQueue::new();
    let _ = queue.push(ModemEvent::Resume);
    let _ = queue.push(ModemEvent::Resume);
    let _ = queue.push(ModemEvent::Resume);
    assert_eq!(queue.dropped(), 2);
}

// ============================================================================
// EventBus
// ============================================================================

#[test]
fn test_bus_delegate_and_drain_preserves_order() {
    let bus = EventBus::new();
    assert!(bus.delegate(ModemEvent::Resume));
    assert!(bus.delegate(ModemEvent::Registered));
    assert!(bus.delegate(ModemEvent::Deregistered));

    let mut out: Vec<ModemEvent, 16> = Vec::new();
    bus.drain(&mut out);
    assert_eq!(
        out.as_slice(),
        &[
            ModemEvent::Resume,
            ModemEvent::Registered,
            ModemEvent::Deregistered
        ]
    );
}

#[test]
fn test_bus_drain_empties_queue() {
    let bus = EventBus::new();
    let _ = bus.delegate(ModemEvent::Resume);

    let mut out: Vec<ModemEvent, 16> = Vec::new();
    bus.drain(&mut out);
    out.clear();
    bus.drain(&mut out);
    assert!(out.is_empty());
}

#[test]
fn test_bus_reports_drops() {
    let bus = EventBus::new();
    // Capacity is EVENT_QUEUE_SIZE (16); the 17th delegation drops.
    for _ in 0..16 {
        assert!(bus.delegate(ModemEvent::Timeout));
    }
    assert!(!bus.delegate(ModemEvent::Timeout));
    assert_eq!(bus.dropped(), 1);
}

#[test]
fn test_bus_wait_completes_after_delegate() {
    let bus = EventBus::new();
    let _ = bus.delegate(ModemEvent::Resume);
    // The pending signal is already set; the wait resolves immediately.
    embassy_futures::block_on(bus.wait());
}
