use std::{num::NonZeroUsize, panic, thread};

/// Fork-join parallel-for over contiguous slices.
///
/// Each worker owns one disjoint `&mut` chunk of the output and may read any shared input the
/// closure captures. Every call joins all workers before returning.
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    /// `0` picks one worker per available core.
    pub fn new(workers: usize) -> Self {
        let workers = match workers {
            0 => thread::available_parallelism().map_or(1, NonZeroUsize::get),
            n => n,
        };
        Self { workers }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Calls `f(first_index, chunk)` for every chunk of `items`. A panicking worker is
    /// re-raised on the calling thread once all workers have joined.
    pub fn for_each_chunk_mut<T, F>(&self, items: &mut [T], f: F)
    where
        T: Send,
        F: Fn(usize, &mut [T]) + Sync,
    {
        if items.is_empty() {
            return;
        }
        let chunk_len = items.len().div_ceil(self.workers);
        if self.workers == 1 || chunk_len == items.len() {
            f(0, items);
            return;
        }
        let f = &f;
        let joined = crossbeam::thread::scope(|scope| {
            let handles: Vec<_> = items
                .chunks_mut(chunk_len)
                .enumerate()
                .map(|(idx, chunk)| scope.spawn(move |_| f(idx * chunk_len, chunk)))
                .collect();
            // join explicitly so the first panic keeps its original payload
            handles
                .into_iter()
                .map(|handle| handle.join())
                .find_map(Result::err)
        });
        match joined {
            Ok(None) => {}
            Ok(Some(payload)) | Err(payload) => panic::resume_unwind(payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_item_is_visited_once_with_its_index() {
        let pool = WorkerPool::new(3);
        let mut items = vec![0usize; 10];
        pool.for_each_chunk_mut(&mut items, |first, chunk| {
            for (offset, item) in chunk.iter_mut().enumerate() {
                *item += first + offset;
            }
        });
        assert_eq!(items, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn more_workers_than_items() {
        let pool = WorkerPool::new(16);
        let mut items = vec![1, 2, 3];
        pool.for_each_chunk_mut(&mut items, |_, chunk| chunk.iter_mut().for_each(|x| *x *= 2));
        assert_eq!(items, vec![2, 4, 6]);
        assert!(WorkerPool::new(0).workers() >= 1);
    }

    #[test]
    #[should_panic(expected = "worker failed")]
    fn worker_panic_reaches_caller() {
        let pool = WorkerPool::new(2);
        let mut items = vec![0; 4];
        pool.for_each_chunk_mut(&mut items, |first, _| {
            if first > 0 {
                panic!("worker failed");
            }
        });
    }
}
