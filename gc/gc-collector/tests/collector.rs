use gc_collector::{Color, Gc};
use std::ptr::{NonNull, null_mut};

const MBYTE: usize = 1024 * 1024;

/// Payload bytes a `Node` occupies: 24 bytes rounds into the 32-byte class.
const NODE_CLASS_BYTES: usize = 32;

#[repr(C)]
struct Node {
    left: *mut Node,
    right: *mut Node,
    value: usize,
}

fn new_gc() -> Gc {
    Gc::with_heap_size(MBYTE).expect("arena")
}

unsafe fn alloc_node(gc: &mut Gc, value: usize) -> NonNull<Node> {
    let payload = gc.allocate(size_of::<Node>()).expect("node allocation");
    let node = payload.cast::<Node>();
    unsafe {
        node.as_ptr().write(Node {
            left: null_mut(),
            right: null_mut(),
            value,
        });
    }
    node
}

/// Build a balanced tree bottom-up under shadow-stack discipline: each
/// subtree stays rooted while its sibling and parent may allocate.
unsafe fn build_tree(gc: &mut Gc, depth: usize) -> NonNull<Node> {
    unsafe {
        if depth == 0 {
            return alloc_node(gc, 0);
        }
        let left = build_tree(gc, depth - 1);
        gc.push_root(left.cast());
        let right = build_tree(gc, depth - 1);
        gc.push_root(right.cast());
        let node = alloc_node(gc, depth);
        (*node.as_ptr()).left = left.as_ptr();
        (*node.as_ptr()).right = right.as_ptr();
        gc.pop_roots(2);
        node
    }
}

unsafe fn count_nodes(node: *const Node) -> usize {
    if node.is_null() {
        return 0;
    }
    unsafe { 1 + count_nodes((*node).left) + count_nodes((*node).right) }
}

#[test]
fn rooted_tree_survives_major_collection() {
    let mut gc = new_gc();
    let root = unsafe { build_tree(&mut gc, 10) };
    unsafe { gc.push_root(root.cast()) };

    gc.collect(true);

    // 2^11 - 1 nodes, each one 32-byte class block.
    assert_eq!(gc.allocated_bytes(), 2047 * NODE_CLASS_BYTES);
    assert_eq!(unsafe { count_nodes(root.as_ptr()) }, 2047);

    // The leftmost spine is still intact and 11 nodes deep.
    let mut cur = root.as_ptr().cast_const();
    let mut depth = 0;
    while !cur.is_null() {
        depth += 1;
        cur = unsafe { (*cur).left };
    }
    assert_eq!(depth, 11);
}

#[test]
fn unrooted_tree_is_fully_reclaimed() {
    let mut gc = new_gc();
    let root = unsafe { build_tree(&mut gc, 10) };
    unsafe { gc.push_root(root.cast()) };
    gc.collect(true);
    assert_eq!(gc.allocated_bytes(), 2047 * NODE_CLASS_BYTES);

    gc.pop_roots(1);
    gc.collect(true);
    assert_eq!(gc.allocated_bytes(), 0);
}

#[test]
fn write_barrier_keeps_new_child_of_black_container_alive() {
    let mut gc = new_gc();
    let container = unsafe { alloc_node(&mut gc, 1) };
    unsafe { gc.push_root(container.cast()) };
    gc.collect(true); // major: container survives, ends WHITE
    gc.collect(false); // minor: container re-marked BLACK
    assert_eq!(unsafe { gc.color_of(container.cast()) }, Color::Black);

    let child = unsafe { alloc_node(&mut gc, 2) };
    assert_eq!(unsafe { gc.color_of(child.cast()) }, Color::Gray);

    unsafe {
        (*container.as_ptr()).left = child.as_ptr();
        gc.write_barrier(container.cast());
    }
    // The container's field is now the only reference to the child.
    gc.collect(false);
    assert_eq!(unsafe { gc.color_of(child.cast()) }, Color::Black);
    assert_eq!(gc.allocated_bytes(), 2 * NODE_CLASS_BYTES);
}

#[test]
fn write_barrier_promotes_white_container_to_gray() {
    let mut gc = new_gc();
    let obj = unsafe { alloc_node(&mut gc, 1) };
    unsafe { gc.push_root(obj.cast()) };
    gc.collect(true);
    assert_eq!(unsafe { gc.color_of(obj.cast()) }, Color::White);

    unsafe { gc.write_barrier(obj.cast()) };
    assert_eq!(unsafe { gc.color_of(obj.cast()) }, Color::Gray);

    // Still rooted, so the next cycle marks it.
    gc.collect(false);
    assert_eq!(unsafe { gc.color_of(obj.cast()) }, Color::Black);
}

#[test]
fn unshaded_new_object_is_swept() {
    let mut gc = new_gc();
    let orphan = unsafe { alloc_node(&mut gc, 7) };
    let addr = orphan.as_ptr() as usize;

    gc.collect(false); // counter 0: runs major; orphan is still GRAY
    assert_eq!(gc.allocated_bytes(), 0);
    assert_eq!(gc.heap().resolve_candidate(addr), None);
}

#[test]
fn black_survivors_persist_minor_cycles_and_die_after_major() {
    let mut gc = new_gc();
    let first = unsafe { alloc_node(&mut gc, 1) };
    unsafe { gc.push_root(first.cast()) };
    gc.collect(true); // major; root cursor resets
    gc.collect(false); // minor; re-marks all roots
    assert_eq!(unsafe { gc.color_of(first.cast()) }, Color::Black);

    let second = unsafe { alloc_node(&mut gc, 2) };
    unsafe { gc.push_root(second.cast()) };
    gc.collect(false); // minor; shades only the root pushed since
    assert_eq!(unsafe { gc.color_of(first.cast()) }, Color::Black);
    assert_eq!(unsafe { gc.color_of(second.cast()) }, Color::Black);
    assert_eq!(gc.allocated_bytes(), 2 * NODE_CLASS_BYTES);

    gc.pop_roots(2);
    // A major cycle only downgrades the now-unreachable BLACK blocks to
    // WHITE; they float one more cycle before being reclaimed.
    gc.collect(true);
    assert_eq!(gc.allocated_bytes(), 2 * NODE_CLASS_BYTES);
    gc.collect(false);
    assert_eq!(gc.allocated_bytes(), 0);
}

#[test]
fn allocation_pressure_triggers_incremental_marking() {
    let mut gc = new_gc();
    let obj = gc.allocate(300 * 1024).expect("large object");
    unsafe { gc.push_root(obj) };
    assert!(!gc.is_marking());

    // 300 KiB since the last collection crosses the incremental threshold,
    // so the next allocation performs one bounded mark step.
    let _ = gc.allocate(64).expect("small object");
    assert!(gc.is_marking());

    gc.collect(true);
    assert!(!gc.is_marking());
}

#[test]
fn allocation_interval_triggers_collection() {
    let mut gc = new_gc();
    for _ in 0..=1000 {
        let _ = gc.allocate(16).expect("allocation");
    }
    // The 1001st allocation ran a full cycle first, sweeping the unrooted
    // blocks before serving its request.
    assert_eq!(gc.stats().cycles, 1);
    assert_eq!(gc.allocated_bytes(), 16);
}

#[test]
fn reallocate_preserves_payload_prefix() {
    let mut gc = new_gc();
    let p = gc.allocate(40).expect("allocation");
    unsafe {
        for i in 0..40 {
            p.as_ptr().add(i).write(i as u8);
        }
    }

    let same = unsafe { gc.reallocate(p, 64) }.expect("in place");
    assert_eq!(same, p);

    let grown = unsafe { gc.reallocate(p, 4096) }.expect("grown");
    assert_ne!(grown, p);
    unsafe {
        for i in 0..40 {
            assert_eq!(grown.as_ptr().add(i).read(), i as u8);
        }
    }
}

#[test]
fn exhaustion_yields_none_not_panic() {
    let mut gc = Gc::with_heap_size(64 * 1024).expect("arena");
    let mut held = Vec::new();
    while let Some(ptr) = gc.allocate(4096) {
        unsafe { gc.push_root(ptr) };
        held.push(ptr);
    }
    assert!(!held.is_empty());

    // Dropping the roots lets a collection reclaim the zone.
    gc.pop_roots(held.len());
    gc.collect(true);
    assert!(gc.allocate(4096).is_some());
}

#[test]
fn pop_roots_clamps_to_stack_depth() {
    let mut gc = new_gc();
    let a = gc.allocate(16).expect("allocation");
    unsafe { gc.push_root(a) };
    assert_eq!(gc.root_count(), 1);
    gc.pop_roots(10);
    assert_eq!(gc.root_count(), 0);
}

#[test]
fn stats_track_cycles_and_allocations() {
    let mut gc = new_gc();
    let fresh = gc.stats();
    assert_eq!(fresh.cycles, 0);
    assert_eq!(fresh.total_allocations, 0);
    assert_eq!(fresh.free_bytes, MBYTE);

    let _ = gc.allocate(64).expect("allocation");
    let stats = gc.stats();
    assert_eq!(stats.total_allocations, 1);
    assert_eq!(stats.bytes_since_collection, 64);
    assert_eq!(stats.allocated_bytes, 64);

    gc.collect(false);
    let stats = gc.stats();
    assert_eq!(stats.cycles, 1);
    assert_eq!(stats.bytes_since_collection, 0);
    assert_eq!(stats.allocated_bytes, 0);
}
