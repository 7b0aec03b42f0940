//! Typed arena handles.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use super::{Command, Context, Message, Termination, Transaction};

/// Which arena a handle points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Store {
    /// Session-lifetime records (persistent mode).
    Persistent,
    /// Records of one transient message; the value is the scratch generation.
    Scratch(u32),
    /// The shared read-only `$` termination.
    Sentinel,
}

/// Index of a record of type `T` in a session arena.
pub struct Handle<T> {
    pub(crate) store: Store,
    pub(crate) index: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    pub(crate) fn new(store: Store, index: u32) -> Self {
        Self {
            store,
            index,
            _marker: PhantomData,
        }
    }

    /// Position of the record in its arena.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// True for records that live only as long as one transient message.
    pub fn is_transient(&self) -> bool {
        matches!(self.store, Store::Scratch(_))
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.store == other.store && self.index == other.index
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.store.hash(state);
        self.index.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = std::any::type_name::<T>()
            .rsplit("::")
            .next()
            .unwrap_or("Record");
        write!(f, "{kind}#{}({:?})", self.index, self.store)
    }
}

pub type MsgHandle = Handle<Message>;
pub type TrxRef = Handle<Transaction>;
pub type CtxRef = Handle<Context>;
pub type CmdRef = Handle<Command>;
pub type TermRef = Handle<Termination>;
