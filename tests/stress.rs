use bootpool::*;
use rand::Rng;
use rayon::prelude::*;
use std::{
    collections::HashSet,
    sync::atomic::{AtomicUsize, Ordering},
    thread,
};

#[derive(Default)]
struct Meta {
    links: PoolLinks<Meta>,
    /// Id of the thread holding the object, zero while free.
    owner: AtomicUsize,
}

impl Pooled for Meta {
    fn pool_links(&self) -> &PoolLinks<Self> {
        &self.links
    }
}

fn addr(obj: &Meta) -> usize {
    obj as *const Meta as usize
}

singleton_pool!(struct RandomPool: Meta, HeapBackend);
singleton_pool!(struct ParallelPool: Meta, HeapBackend);

fn take<S: PoolStateAccessor<Meta>>(owner: usize) -> &'static Meta {
    let obj = Pool::<Meta, S>::acquire();
    let previous = obj.owner.swap(owner, Ordering::AcqRel);
    assert_eq!(previous, 0, "object handed to {owner} while held by {previous}");
    obj
}

fn give_back<S: PoolStateAccessor<Meta>>(obj: &'static Meta) {
    obj.owner.store(0, Ordering::Release);
    Pool::<Meta, S>::release(obj);
}

#[test]
fn test_random_cycles_balance() {
    const THREADS: usize = 8;
    const ROUNDS: usize = 10_000;
    type P = Pool<Meta, RandomPool>;

    let held_at_end: usize = thread::scope(|s| {
        let workers: Vec<_> = (1..=THREADS)
            .map(|owner| {
                s.spawn(move || {
                    let mut rng = rand::rng();
                    let mut held = Vec::new();
                    for _ in 0..ROUNDS {
                        if held.is_empty() || (held.len() < 16 && rng.random_bool(0.5)) {
                            held.push(take::<RandomPool>(owner));
                        } else {
                            let idx = rng.random_range(0..held.len());
                            give_back::<RandomPool>(held.swap_remove(idx));
                        }
                    }
                    // Keep some objects so the in-use side of the sum is non-trivial.
                    let keep = held.len() / 2;
                    for obj in held.drain(keep..) {
                        give_back::<RandomPool>(obj);
                    }
                    held.len()
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).sum()
    });

    let registered: Vec<_> = P::iter().collect();
    let unique: HashSet<usize> = registered.iter().map(|o| addr(o)).collect();
    assert_eq!(unique.len(), registered.len(), "an object was registered twice");

    let in_use = registered.iter().filter(|o| o.is_in_use()).count();
    let free: Vec<_> = P::extract_all().collect();
    assert!(free.iter().all(|o| !o.is_in_use()));
    assert_eq!(in_use, held_at_end);
    assert_eq!(free.len() + in_use, registered.len());

    if let (Some(&first), Some(&last)) = (free.first(), free.last()) {
        P::restore(first, last);
    }
}

#[test]
fn test_parallel_acquire_release() {
    type P = Pool<Meta, ParallelPool>;

    (0..50_000usize).into_par_iter().for_each(|i| {
        let obj = take::<ParallelPool>(i + 1);
        give_back::<ParallelPool>(obj);
    });

    // Each worker holds at most one object at a time.
    let constructed = P::iter().count();
    assert!(constructed >= 1);
    assert!(constructed <= rayon::current_num_threads());
    assert_eq!(P::extract_all().count(), constructed);
}
