//! Copyable, comparable handles to "a function taking `A` and returning `R`".
//!
//! A `Delegate` references its target without sharing a common base type with it. The
//! target can be a free function, a closure or a method bound to an instance. In every
//! case the handle is made of an opaque object pointer plus a stub function that knows
//! how to re-derive the real call, so it stays two words large and `Copy`.
//!
//! # Ownership
//!
//! A delegate bound by address does **not** own its target and does not extend its
//! lifetime. Whoever creates such a delegate must guarantee that the target outlives
//! every call made through the handle (and every copy of it). That is the reason the
//! address binding constructors are `unsafe`.
//!
//! Closures and method proxies that need storage are usually parked in a
//! [`DelegateArena`](arena/struct.DelegateArena.html), which frees them when the arena is
//! dropped. The arena must be kept alive as long as the delegates it produced.

pub mod arena;
pub use self::arena::DelegateArena;

use std::fmt;
use std::ptr::NonNull;

pub(crate) type Stub<A, R> = unsafe fn(NonNull<()>, A) -> R;

enum Invocation<A, R> {
    Null,
    Function(fn(A) -> R),
    Bound { object: NonNull<()>, stub: Stub<A, R> },
}

impl<A, R> Clone for Invocation<A, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A, R> Copy for Invocation<A, R> {}

/// A type-erased, non-owning handle to a callable.
pub struct Delegate<A, R> {
    invocation: Invocation<A, R>,
}

impl<A, R> Delegate<A, R> {
    /// Creates a null delegate. Invoking it panics.
    #[inline]
    pub fn null() -> Self {
        Delegate {
            invocation: Invocation::Null,
        }
    }

    /// Creates a delegate from a free function.
    #[inline]
    pub fn from_fn(func: fn(A) -> R) -> Self {
        Delegate {
            invocation: Invocation::Function(func),
        }
    }

    /// Creates a delegate that calls `target` by address.
    ///
    /// # Safety
    ///
    /// `target` must not be moved nor dropped while this delegate, or any copy of it,
    /// could still be invoked.
    #[inline]
    pub unsafe fn from_closure<F>(target: &F) -> Self
    where
        F: Fn(A) -> R,
    {
        Self::from_raw(NonNull::from(target).cast(), closure_stub::<F, A, R>)
    }

    #[inline]
    pub(crate) unsafe fn from_raw(object: NonNull<()>, stub: Stub<A, R>) -> Self {
        Delegate {
            invocation: Invocation::Bound { object, stub },
        }
    }

    /// Returns true if this delegate does not reference anything.
    #[inline]
    pub fn is_null(&self) -> bool {
        match self.invocation {
            Invocation::Null => true,
            _ => false,
        }
    }

    /// Calls the referenced target with `arg`.
    ///
    /// Panics if the delegate is null.
    #[inline]
    pub fn invoke(&self, arg: A) -> R {
        match self.invocation {
            Invocation::Null => panic!("Invoked a null delegate."),
            Invocation::Function(func) => func(arg),
            Invocation::Bound { object, stub } => unsafe { stub(object, arg) },
        }
    }
}

unsafe fn closure_stub<F, A, R>(object: NonNull<()>, arg: A) -> R
where
    F: Fn(A) -> R,
{
    let target = &*(object.as_ptr() as *const F);
    target(arg)
}

impl<A, R> Clone for Delegate<A, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A, R> Copy for Delegate<A, R> {}

impl<A, R> Default for Delegate<A, R> {
    fn default() -> Self {
        Delegate::null()
    }
}

impl<A, R> From<fn(A) -> R> for Delegate<A, R> {
    fn from(func: fn(A) -> R) -> Self {
        Delegate::from_fn(func)
    }
}

// Delegates compare by (object pointer, stub pointer) pairs.
impl<A, R> PartialEq for Delegate<A, R> {
    fn eq(&self, rhs: &Self) -> bool {
        match (self.invocation, rhs.invocation) {
            (Invocation::Null, Invocation::Null) => true,
            (Invocation::Function(lhs), Invocation::Function(rhs)) => lhs as usize == rhs as usize,
            (
                Invocation::Bound {
                    object: lhs_object,
                    stub: lhs_stub,
                },
                Invocation::Bound {
                    object: rhs_object,
                    stub: rhs_stub,
                },
            ) => lhs_object == rhs_object && lhs_stub as usize == rhs_stub as usize,
            _ => false,
        }
    }
}

impl<A, R> Eq for Delegate<A, R> {}

impl<A, R> fmt::Debug for Delegate<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.invocation {
            Invocation::Null => write!(f, "Delegate(null)"),
            Invocation::Function(func) => write!(f, "Delegate(fn {:#x})", func as usize),
            Invocation::Bound { object, stub } => write!(
                f,
                "Delegate(object {:p}, stub {:#x})",
                object.as_ptr(),
                stub as usize
            ),
        }
    }
}

/// An ordered list of delegates invoked one after another.
pub struct MulticastDelegate<A> {
    delegates: Vec<Delegate<A, ()>>,
}

impl<A> MulticastDelegate<A> {
    /// Creates a new and empty `MulticastDelegate`.
    pub fn new() -> Self {
        MulticastDelegate {
            delegates: Vec::new(),
        }
    }

    /// Appends `delegate` to the invocation list.
    #[inline]
    pub fn add(&mut self, delegate: Delegate<A, ()>) {
        self.delegates.push(delegate);
    }

    /// Removes the first delegate equal to `delegate`. Returns false if there is
    /// no such delegate.
    pub fn remove(&mut self, delegate: &Delegate<A, ()>) -> bool {
        if let Some(index) = self.delegates.iter().position(|v| v == delegate) {
            self.delegates.remove(index);
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn contains(&self, delegate: &Delegate<A, ()>) -> bool {
        self.delegates.iter().any(|v| v == delegate)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.delegates.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.delegates.is_empty()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.delegates.clear();
    }
}

impl<A: Clone> MulticastDelegate<A> {
    /// Calls every delegate in insertion order.
    pub fn invoke(&self, arg: A) {
        if let Some((last, rest)) = self.delegates.split_last() {
            for v in rest {
                v.invoke(arg.clone());
            }

            last.invoke(arg);
        }
    }
}

impl<A> Default for MulticastDelegate<A> {
    fn default() -> Self {
        MulticastDelegate::new()
    }
}

impl<A> fmt::Debug for MulticastDelegate<A> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.delegates.iter()).finish()
    }
}
