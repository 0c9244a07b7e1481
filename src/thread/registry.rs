use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::ThreadId;

/// The library-assigned identity of a thread (spec §3 "Thread descriptor").
/// `os_id` is the Rust-native stand-in for "whatever the platform offers
/// for native thread identity" (Design Notes §9): `std::thread::ThreadId`
/// doesn't expose the kernel TID, but it's the only stable, comparable
/// identity `std` gives us, and it's what every lookup in this module
/// keys on.
#[derive(Debug)]
pub struct ThreadDescriptor {
    pub library_id: u32,
    pub name: String,
    pub os_id: ThreadId,
}

/// Monotonic per-process counter for [`ThreadDescriptor::library_id`],
/// wrapping at `u32::MAX` back to 0 (spec §3, §4.3).
static NEXT_ID: AtomicU32 = AtomicU32::new(0);

/// The process-wide registry mapping OS thread identity to library thread
/// descriptor (spec §3 "Registry"). A `BTreeMap` keyed by `ThreadId` plays
/// the role of the sorted array the original keys by OS identity.
static REGISTRY: OnceLock<Mutex<BTreeMap<ThreadId, Arc<ThreadDescriptor>>>> = OnceLock::new();

fn registry() -> &'static Mutex<BTreeMap<ThreadId, Arc<ThreadDescriptor>>> {
    REGISTRY.get_or_init(|| {
        let mut map = BTreeMap::new();
        let main_id = std::thread::current().id();
        map.insert(
            main_id,
            Arc::new(ThreadDescriptor {
                library_id: next_library_id(),
                name: "main".to_string(),
                os_id: main_id,
            }),
        );
        Mutex::new(map)
    })
}

fn next_library_id() -> u32 { NEXT_ID.fetch_add(1, Ordering::SeqCst) }

/// Registers the calling thread under `name` (or `Thread-<id>` if `name`
/// is `None`), returning its descriptor. Called by [`super::handle::CmThread`]'s
/// trampoline on start; the main thread is registered the first time
/// anything touches the registry.
pub(super) fn register(name: Option<String>) -> Arc<ThreadDescriptor> {
    let mut map = registry().lock().unwrap_or_else(|e| e.into_inner());
    let id = std::thread::current().id();
    let library_id = next_library_id();
    let name = name.unwrap_or_else(|| format!("Thread-{library_id}"));
    let descriptor = Arc::new(ThreadDescriptor { library_id, name, os_id: id });
    map.insert(id, Arc::clone(&descriptor));
    descriptor
}

/// Deregisters the calling thread. Called as the last step of the
/// trampoline before the OS thread ends (spec §4.3).
pub(super) fn deregister(id: ThreadId) {
    registry().lock().unwrap_or_else(|e| e.into_inner()).remove(&id);
}

/// Resolves the descriptor for the calling thread, or `None` if it was
/// never registered (spec §8.6: "for non-registered threads, `Self`
/// returns null").
pub fn current_descriptor() -> Option<Arc<ThreadDescriptor>> {
    registered_descriptor(std::thread::current().id())
}

/// Resolves the descriptor for an arbitrary `ThreadId`.
pub fn registered_descriptor(id: ThreadId) -> Option<Arc<ThreadDescriptor>> {
    registry().lock().unwrap_or_else(|e| e.into_inner()).get(&id).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_thread_is_registered_as_main() {
        // Forces lazy init on whichever thread runs this test first; in a
        // real process this is the main thread, so assert the invariant
        // indirectly: this thread (test harness worker) is *not* main, but
        // the registry must contain an entry named "main" somewhere.
        let _ = current_descriptor();
        let map = registry().lock().unwrap();
        assert!(map.values().any(|d| d.name == "main"));
    }

    #[test]
    fn unregistered_thread_resolves_to_none() {
        let handle = std::thread::spawn(|| current_descriptor().is_none());
        assert!(handle.join().unwrap());
    }
}
