#![allow(dead_code)]

use std::alloc::Layout;
use std::cell::Cell;
use std::ptr::NonNull;
use std::rc::Rc;

use sboptr::{AllocError, Allocator, Global};

#[derive(Debug, Default)]
pub struct Stats {
    pub allocs: Cell<usize>,
    pub deallocs: Cell<usize>,
    /// Fail every allocation once this many have succeeded.
    pub fail_after: Cell<Option<usize>>,
}

impl Stats {
    pub fn live(&self) -> usize {
        self.allocs.get() - self.deallocs.get()
    }
}

/// Forwards to [`Global`] and counts what goes through it.
#[derive(Debug, Default, Clone)]
pub struct Counting(pub Rc<Stats>);

impl Counting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let alloc = Self::new();
        alloc.0.fail_after.set(Some(0));
        alloc
    }

    pub fn stats(&self) -> &Stats {
        &self.0
    }
}

unsafe impl Allocator for Counting {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if let Some(limit) = self.0.fail_after.get() {
            if self.0.allocs.get() >= limit {
                return Err(AllocError { layout });
            }
        }
        let ptr = Global.allocate(layout)?;
        self.0.allocs.set(self.0.allocs.get() + 1);
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.0.deallocs.set(self.0.deallocs.get() + 1);
        unsafe { Global.deallocate(ptr, layout) }
    }
}

/// Counts constructions and drops of a payload.
#[derive(Debug, Default)]
pub struct Lifecycle {
    pub created: Cell<usize>,
    pub dropped: Cell<usize>,
}

impl Lifecycle {
    pub fn alive(&self) -> usize {
        self.created.get() - self.dropped.get()
    }
}

#[derive(Debug)]
pub struct Tracked<const N: usize> {
    pub log: Rc<Lifecycle>,
    pub payload: [u8; N],
}

impl<const N: usize> Tracked<N> {
    pub fn new(log: &Rc<Lifecycle>, fill: u8) -> Self {
        log.created.set(log.created.get() + 1);
        Tracked {
            log: log.clone(),
            payload: [fill; N],
        }
    }
}

impl<const N: usize> Clone for Tracked<N> {
    fn clone(&self) -> Self {
        Tracked::new(&self.log, self.payload.first().copied().unwrap_or(0))
    }
}

impl<const N: usize> Drop for Tracked<N> {
    fn drop(&mut self) {
        self.log.dropped.set(self.log.dropped.get() + 1);
    }
}
