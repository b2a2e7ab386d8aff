use std::sync::Barrier;
use std::thread;

use strand_core::{SharedStr, StrPool};

const WORDS: [&str; 6] = ["alpha", "beta", "gamma", "delta", "epsilon", "zeta"];

const THREADS: usize = 8;
const ROUNDS: usize = 2000;

#[test]
fn churn_over_a_small_content_set() {
  let pool = StrPool::new();
  let mut handles = Vec::with_capacity(THREADS);

  for t in 0..THREADS {
    let pool = pool.clone();

    handles.push(thread::spawn(move || {
      for i in 0..ROUNDS {
        let word = WORDS[(i + t) % WORDS.len()];

        let a = pool.intern(word);
        let b = a.clone();

        assert_eq!(a.as_bytes(), word.as_bytes());
        assert!(a.ptr_eq(&b));

        drop(a);

        // b keeps the record alive, so a fresh intern must share it
        let c = pool.intern(word);
        assert!(b.ptr_eq(&c));
      }
    }));
  }

  for handle in handles {
    handle.join().unwrap();
  }

  assert_eq!(pool.len(), 0);
  assert_eq!(pool.allocated(), 0);
}

#[test]
fn last_out_races_first_in() {
  // every iteration crosses the count 1 boundary for the same content,
  // hammering the erase versus acquire window
  let pool = StrPool::new();
  let mut handles = Vec::with_capacity(4);

  for _ in 0..4 {
    let pool = pool.clone();

    handles.push(thread::spawn(move || {
      for _ in 0..5000 {
        let s = pool.intern("boundary");
        assert_eq!(s.len(), 8);
      }
    }));
  }

  for handle in handles {
    handle.join().unwrap();
  }

  assert_eq!(pool.len(), 0);
  assert_eq!(pool.allocated(), 0);
}

#[test]
fn live_records_match_held_handles() {
  let pool = StrPool::new();
  let barrier = Barrier::new(THREADS);

  thread::scope(|scope| {
    let mut workers = Vec::with_capacity(THREADS);

    for t in 0..THREADS {
      let pool = pool.clone();
      let barrier = &barrier;

      workers.push(scope.spawn(move || {
        // every thread holds the shared word plus one private word
        let shared = pool.intern("held by everyone");
        let private = pool.intern(format!("held by {t}"));

        barrier.wait();

        assert_eq!(pool.len(), THREADS + 1);
        assert_eq!(shared.ref_count(), Some(THREADS as u32));
        assert_eq!(private.ref_count(), Some(1));

        barrier.wait();

        drop(shared);
        drop(private);
      }));
    }

    for worker in workers {
      worker.join().unwrap();
    }
  });

  assert_eq!(pool.len(), 0);
  assert_eq!(pool.allocated(), 0);
}

#[test]
fn handles_cross_threads() {
  let pool = StrPool::new();
  let carried: SharedStr = pool.intern("crosses threads");

  let moved = thread::spawn(move || {
    assert_eq!(carried.as_bytes(), b"crosses threads");
    carried
  })
  .join()
  .unwrap();

  assert_eq!(moved.ref_count(), Some(1));
  assert!(pool.contains("crosses threads"));

  drop(moved);
  assert_eq!(pool.len(), 0);
}
