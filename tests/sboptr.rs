mod common;

use std::rc::Rc;

use common::{Counting, Lifecycle, Tracked};
use sboptr::space::{Bytes, S1, S2, S4};
use sboptr::{AllocError, EmplaceError, Error, Mode, Movable, SboPtr};

type Handle<S> = SboPtr<S, Movable, Counting>;

#[test]
fn inline_int_never_allocates() {
    let alloc = Counting::new();
    let mut p: Handle<Bytes<16>> = SboPtr::new_in(alloc.clone());
    p.emplace(42i32);

    assert_eq!(p.get::<i32>(), Ok(&42));
    assert_eq!(p.mode(), Mode::Inline);
    drop(p);
    assert_eq!(alloc.stats().allocs.get(), 0);
    assert_eq!(alloc.stats().deallocs.get(), 0);
}

#[test]
fn large_array_allocates_once() {
    let alloc = Counting::new();
    let mut p: Handle<Bytes<4>> = SboPtr::new_in(alloc.clone());
    p.emplace([0xabu8; 64]);

    assert!(p.is_heap());
    assert_eq!(p.get::<[u8; 64]>().map(|a| a[63]), Ok(0xab));
    assert_eq!(alloc.stats().allocs.get(), 1);
    assert_eq!(alloc.stats().deallocs.get(), 0);

    drop(p);
    assert_eq!(alloc.stats().allocs.get(), 1);
    assert_eq!(alloc.stats().deallocs.get(), 1);
}

#[test]
fn move_leaves_source_empty() {
    let mut a: SboPtr<Bytes<16>> = SboPtr::new();
    a.emplace(7i32);
    let mut b: SboPtr<Bytes<16>> = SboPtr::new();
    b.move_from(&mut a);

    assert!(!a.has_value());
    assert_eq!(b.get::<i32>(), Ok(&7));
    assert_eq!(a.get::<i32>(), Err(Error::EmptyAccess));
}

#[test]
fn moving_heap_value_does_not_allocate() {
    let alloc = Counting::new();
    let mut a: Handle<S1> = SboPtr::new_in(alloc.clone());
    a.emplace(String::from("lives on the heap"));
    assert!(a.is_heap());

    let mut b = a.take();
    let mut c: Handle<S1> = SboPtr::new_in(alloc.clone());
    c.move_from(&mut b);

    assert_eq!(alloc.stats().allocs.get(), 1);
    assert_eq!(c.get::<String>().map(String::as_str), Ok("lives on the heap"));
    drop((a, b, c));
    assert_eq!(alloc.stats().live(), 0);
}

#[test]
fn every_value_is_dropped_exactly_once() {
    let log = Rc::new(Lifecycle::default());
    let alloc = Counting::new();
    {
        let mut a: Handle<S2> = SboPtr::new_in(alloc.clone());
        let mut b: Handle<S2> = SboPtr::new_in(alloc.clone());

        a.emplace(Tracked::<1>::new(&log, 1));
        b.emplace(Tracked::<64>::new(&log, 2));
        a.swap(&mut b);
        b.emplace(Tracked::<64>::new(&log, 3));
        a.move_from(&mut b);
        let c = a.take();
        a.emplace(Tracked::<1>::new(&log, 4));
        a.reset();
        drop(c);
        b.emplace(Tracked::<1>::new(&log, 5));
    }
    assert_eq!(log.created.get(), 5);
    assert_eq!(log.alive(), 0);
    assert_eq!(alloc.stats().live(), 0);
    assert_eq!(Rc::strong_count(&log), 1);
}

#[test]
fn mode_follows_size_and_alignment() {
    #[repr(align(16))]
    struct Aligned(#[allow(dead_code)] u8);

    let mut p: SboPtr<S4> = SboPtr::new();
    assert_eq!(p.mode(), Mode::Empty);

    p.emplace([0usize; 4]);
    assert_eq!(p.mode(), Mode::Inline);
    p.emplace([0usize; 5]);
    assert_eq!(p.mode(), Mode::Heap);
    p.emplace(Aligned(1));
    assert_eq!(p.mode(), Mode::Heap);

    let mut p: SboPtr<Bytes<16, u128>> = SboPtr::new();
    p.emplace(Aligned(1));
    assert_eq!(p.mode(), Mode::Inline);
}

#[test]
fn wrong_type_is_reported() {
    let mut p: SboPtr<S2> = SboPtr::from_value(5u64);

    assert!(matches!(p.get::<u32>(), Err(Error::TypeMismatch { .. })));
    assert!(matches!(p.get::<i64>(), Err(Error::TypeMismatch { .. })));
    assert!(matches!(p.get::<String>(), Err(Error::TypeMismatch { .. })));
    assert!(matches!(p.get::<(u64,)>(), Err(Error::TypeMismatch { .. })));
    assert!(matches!(p.get_mut::<[u64; 1]>(), Err(Error::TypeMismatch { .. })));
    assert!(matches!(p.get_mut::<&'static u64>(), Err(Error::TypeMismatch { .. })));

    // Unchanged after failed accesses.
    *p.get_mut::<u64>().unwrap() += 1;
    assert_eq!(p.get::<u64>(), Ok(&6));
    assert_eq!(p.type_name(), Some("u64"));
}

#[test]
fn mismatch_names_both_types() {
    let p: SboPtr<S2> = SboPtr::from_value(1.5f32);
    let err = p.get::<Vec<u8>>().unwrap_err();
    assert_eq!(
        err.to_string(),
        "type mismatch: requested `alloc::vec::Vec<u8>`, handle holds `f32`"
    );
}

#[test]
fn failed_allocation_leaves_handle_unchanged() {
    let alloc = Counting::failing();
    let mut p: Handle<S1> = SboPtr::new_in(alloc.clone());
    p.emplace(9u32);

    let err = p.try_emplace([1u64; 8]).unwrap_err();
    assert_eq!(err, AllocError { layout: std::alloc::Layout::new::<[u64; 8]>() });
    assert_eq!(p.get::<u32>(), Ok(&9));

    let mut called = false;
    let res = p.try_emplace_with(|| {
        called = true;
        Ok::<_, ()>([1u64; 8])
    });
    assert!(matches!(res, Err(EmplaceError::Alloc(_))));
    assert!(!called);
    assert_eq!(p.get::<u32>(), Ok(&9));
    assert_eq!(alloc.stats().allocs.get(), 0);
}

#[test]
fn failed_construction_releases_block() {
    let log = Rc::new(Lifecycle::default());
    let alloc = Counting::new();
    let mut p: Handle<S1> = SboPtr::new_in(alloc.clone());
    p.emplace(Tracked::<1>::new(&log, 0));

    let res = p.try_emplace_with(|| Err::<Tracked<64>, _>("no"));
    assert_eq!(res.unwrap_err().into_construct(), Some("no"));

    assert!(!p.has_value());
    assert_eq!(log.alive(), 0);
    assert_eq!(alloc.stats().allocs.get(), 1);
    assert_eq!(alloc.stats().live(), 0);
}

#[test]
fn panicking_construction_releases_block() {
    let alloc = Counting::new();
    let mut p: Handle<S1> = SboPtr::new_in(alloc.clone());
    p.emplace(1u8);

    let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        p.emplace_with(|| -> [u64; 16] { panic!("constructor panicked") });
    }));
    assert!(res.is_err());
    assert!(!p.has_value());
    assert_eq!(alloc.stats().allocs.get(), 1);
    assert_eq!(alloc.stats().live(), 0);
}

#[test]
fn swap_all_mode_pairs() {
    fn fill(p: &mut SboPtr<S2>, mode: Mode, tag: u64) {
        match mode {
            Mode::Empty => p.reset(),
            Mode::Inline => {
                p.emplace(tag);
            }
            Mode::Heap => {
                p.emplace([tag; 8]);
            }
        }
    }

    fn tag_of(p: &SboPtr<S2>) -> Option<u64> {
        match p.mode() {
            Mode::Empty => None,
            Mode::Inline => p.get::<u64>().ok().copied(),
            Mode::Heap => p.get::<[u64; 8]>().ok().map(|a| a[0]),
        }
    }

    let modes = [Mode::Empty, Mode::Inline, Mode::Heap];
    for left in modes {
        for right in modes {
            let mut a = SboPtr::new();
            let mut b = SboPtr::new();
            fill(&mut a, left, 1);
            fill(&mut b, right, 2);
            let (ta, tb) = (tag_of(&a), tag_of(&b));

            a.swap(&mut b);
            assert_eq!((a.mode(), b.mode()), (right, left));
            assert_eq!((tag_of(&a), tag_of(&b)), (tb, ta));
        }
    }
}

#[test]
fn swap_exchanges_allocators() {
    let first = Counting::new();
    let second = Counting::new();
    let mut a: Handle<S1> = SboPtr::new_in(first.clone());
    let mut b: Handle<S1> = SboPtr::new_in(second.clone());
    a.emplace([1u32; 16]);

    a.swap(&mut b);
    drop(b);
    assert_eq!(first.stats().allocs.get(), 1);
    assert_eq!(first.stats().deallocs.get(), 1);
    assert_eq!(second.stats().deallocs.get(), 0);
    drop(a);
}

#[test]
fn self_move_through_take_keeps_value() {
    let mut p: SboPtr<S2> = SboPtr::from_value(vec![1, 2]);
    let mut taken = p.take();
    p.move_from(&mut taken);
    assert_eq!(p.get::<Vec<i32>>().map(Vec::as_slice), Ok(&[1, 2][..]));
    assert!(!taken.has_value());
}

#[test]
fn into_inner_frees_block() {
    let alloc = Counting::new();
    let p = Handle::<S1>::try_from_value_in(String::from("owned"), alloc.clone()).unwrap();
    assert!(p.is_heap());

    let p = p.into_inner::<Vec<u8>>().unwrap_err();
    assert_eq!(p.into_inner::<String>().unwrap(), "owned");
    assert_eq!(alloc.stats().live(), 0);
}

#[test]
fn resize_moves_between_spaces() {
    let alloc = Counting::new();
    let p = Handle::<S4>::try_from_value_in([3usize; 3], alloc.clone()).unwrap();
    assert!(p.is_inline());

    let p = p.resize::<S2>().ok().unwrap();
    assert!(p.is_heap());
    assert_eq!(alloc.stats().allocs.get(), 1);

    let p = p.resize::<S4>().ok().unwrap();
    assert!(p.is_heap());
    assert_eq!(p.get::<[usize; 3]>(), Ok(&[3; 3]));
    assert_eq!(alloc.stats().allocs.get(), 1);
    drop(p);
    assert_eq!(alloc.stats().live(), 0);
}

#[test]
fn closures_are_stored_inline() {
    let base = 40;
    let f = move |x: i32| x + base;
    let p: SboPtr<S1> = SboPtr::from_value(f);
    assert!(p.is_inline());
    assert_eq!(p.get::<fn(i32) -> i32>().ok(), None);
    assert!(p.type_name().is_some_and(|name| name.contains("closure")));
}
