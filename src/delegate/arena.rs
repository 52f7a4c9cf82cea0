use std::ptr::NonNull;

use super::Delegate;

trait Slot {}
impl<T> Slot for T {}

struct MethodProxy<T, A, R> {
    instance: NonNull<T>,
    method: fn(&T, A) -> R,
}

struct MutMethodProxy<T, A, R> {
    instance: NonNull<T>,
    method: fn(&mut T, A) -> R,
}

/// Owner of the closures and method proxies referenced by delegates.
///
/// Everything parked here lives until the arena is cleared or dropped, which bounds
/// the lifetime of captured state by the lifetime of whoever owns the arena (a loader,
/// or the resource registry).
#[derive(Default)]
pub struct DelegateArena {
    slots: Vec<Box<dyn Slot>>,
}

impl DelegateArena {
    /// Creates a new and empty `DelegateArena`.
    pub fn new() -> Self {
        DelegateArena { slots: Vec::new() }
    }

    /// Moves `func` into the arena and returns a delegate calling it.
    ///
    /// # Safety
    ///
    /// The returned delegate must not be invoked after the arena has been cleared or
    /// dropped.
    pub unsafe fn bind_closure<F, A, R>(&mut self, func: F) -> Delegate<A, R>
    where
        F: Fn(A) -> R + 'static,
    {
        let boxed = Box::new(func);
        let delegate = Delegate::from_closure(&*boxed);
        self.slots.push(boxed);
        delegate
    }

    /// Returns a delegate calling `method` on `instance`.
    ///
    /// # Safety
    ///
    /// `instance` must not be moved nor dropped, and the arena must not be cleared or
    /// dropped, while the returned delegate could still be invoked.
    pub unsafe fn bind_method<T, A, R>(
        &mut self,
        instance: &T,
        method: fn(&T, A) -> R,
    ) -> Delegate<A, R>
    where
        T: 'static,
        A: 'static,
        R: 'static,
    {
        let proxy = Box::new(MethodProxy {
            instance: NonNull::from(instance),
            method,
        });

        let delegate = Delegate::from_raw(NonNull::from(&*proxy).cast(), method_stub::<T, A, R>);
        self.slots.push(proxy);
        delegate
    }

    /// Returns a delegate calling `method` on a mutable `instance`.
    ///
    /// # Safety
    ///
    /// Same contract as `bind_method`. In addition no other reference to `instance`
    /// may be alive while the delegate is being invoked.
    pub unsafe fn bind_method_mut<T, A, R>(
        &mut self,
        instance: &mut T,
        method: fn(&mut T, A) -> R,
    ) -> Delegate<A, R>
    where
        T: 'static,
        A: 'static,
        R: 'static,
    {
        let proxy = Box::new(MutMethodProxy {
            instance: NonNull::from(instance),
            method,
        });

        let delegate =
            Delegate::from_raw(NonNull::from(&*proxy).cast(), method_mut_stub::<T, A, R>);
        self.slots.push(proxy);
        delegate
    }

    /// Number of closures and proxies held.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Frees everything held. Delegates produced by this arena become dangling.
    #[inline]
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

unsafe fn method_stub<T, A, R>(object: NonNull<()>, arg: A) -> R {
    let proxy = &*(object.as_ptr() as *const MethodProxy<T, A, R>);
    (proxy.method)(proxy.instance.as_ref(), arg)
}

unsafe fn method_mut_stub<T, A, R>(object: NonNull<()>, arg: A) -> R {
    let proxy = &*(object.as_ptr() as *const MutMethodProxy<T, A, R>);
    (proxy.method)(&mut *proxy.instance.as_ptr(), arg)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Counter {
        step: u32,
        total: u32,
    }

    impl Counter {
        fn peek(&self, v: u32) -> u32 {
            self.step * v
        }

        fn bump(&mut self, v: u32) -> u32 {
            self.total += self.step * v;
            self.total
        }
    }

    #[test]
    fn methods() {
        let mut counter = Box::new(Counter { step: 3, total: 0 });
        let mut arena = DelegateArena::new();

        let peek = unsafe { arena.bind_method(&*counter, Counter::peek) };
        assert_eq!(peek.invoke(2), 6);

        let bump = unsafe { arena.bind_method_mut(&mut *counter, Counter::bump) };
        assert_eq!(bump.invoke(1), 3);
        assert_eq!(bump.invoke(1), 6);
        assert_eq!(arena.len(), 2);

        // Each binding owns its own proxy.
        let other = unsafe { arena.bind_method(&*counter, Counter::peek) };
        assert_ne!(peek, other);
        assert_eq!(counter.total, 6);
    }

    #[test]
    fn owned_closures_are_released() {
        let witness = Rc::new(Cell::new(0));
        let mut arena = DelegateArena::new();

        let captured = witness.clone();
        let d = unsafe {
            arena.bind_closure(move |v: u32| {
                captured.set(v);
            })
        };

        d.invoke(5);
        assert_eq!(witness.get(), 5);
        assert_eq!(Rc::strong_count(&witness), 2);

        arena.clear();
        assert!(arena.is_empty());
        assert_eq!(Rc::strong_count(&witness), 1);
    }
}
