//! Method and setter interposition on host prototypes.
//!
//! Every installation returns an [`Undo`] that puts back the exact member
//! that was in place when it was installed. Wrapping an already wrapped
//! member stacks; undoing in reverse order unwinds the stack.

use crate::host::{Accessor, Member, Method, NativeFn, NativeGetter, NativeSetter, ObjectRef};
use crate::host::{ProtoRef, Prototype, Value};
use crate::queue::TaskQueue;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Idempotent restore handle.
pub struct Undo {
    restore: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl Undo {
    pub fn noop() -> Self {
        Self {
            restore: RefCell::new(None),
        }
    }

    fn restoring(target: &ProtoRef, name: &str, prior: Member) -> Self {
        let target: Weak<RefCell<Prototype>> = Rc::downgrade(target);
        let name = name.to_string();
        Self {
            restore: RefCell::new(Some(Box::new(move || {
                if let Some(proto) = target.upgrade() {
                    proto.borrow_mut().set_member(&name, prior);
                    log::trace!(target: "record.intercept", "restored {name}");
                }
            }))),
        }
    }

    /// Restore the prior member. Later calls do nothing.
    pub fn undo(&self) {
        let restore = self.restore.borrow_mut().take();
        if let Some(restore) = restore {
            restore();
        }
    }

    /// Whether calling [`Undo::undo`] would still change anything.
    pub fn is_armed(&self) -> bool {
        self.restore.borrow().is_some()
    }
}

impl std::fmt::Debug for Undo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Undo").field("armed", &self.is_armed()).finish()
    }
}

/// A set of installations restored together, newest first.
#[derive(Debug, Default)]
pub struct Handlers {
    undos: Vec<Undo>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, undo: Undo) {
        self.undos.push(undo);
    }

    pub fn extend(&mut self, other: Handlers) {
        self.undos.extend(other.undos);
    }

    pub fn len(&self) -> usize {
        self.undos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.undos.is_empty()
    }

    /// Number of installations that actually replaced a member.
    pub fn armed(&self) -> usize {
        self.undos.iter().filter(|u| u.is_armed()).count()
    }

    pub fn restore_all(&mut self) {
        while let Some(undo) = self.undos.pop() {
            undo.undo();
        }
    }
}

/// Replace the method `name` on `target`.
///
/// `make_replacement` receives the member currently installed and returns
/// the new call surface. A missing member, or one that is not a method,
/// leaves the prototype untouched and yields a no-op [`Undo`].
pub fn wrap(
    target: &ProtoRef,
    name: &str,
    make_replacement: impl FnOnce(Rc<Method>) -> NativeFn,
) -> Undo {
    let prior = match target.borrow().member(name) {
        Some(Member::Method(method)) => Rc::clone(method),
        Some(_) => {
            log::debug!(target: "record.intercept", "{name} is not a method, skipped");
            return Undo::noop();
        }
        None => {
            log::trace!(target: "record.intercept", "{name} absent, skipped");
            return Undo::noop();
        }
    };
    if prior.is_wrapped() {
        log::debug!(
            target: "record.intercept",
            "{name} already wrapped (depth {})",
            prior.wrap_depth()
        );
    }
    let replacement = make_replacement(Rc::clone(&prior));
    let installed = Method::wrapping(replacement, Rc::clone(&prior));
    target
        .borrow_mut()
        .set_member(name, Member::Method(installed));
    Undo::restoring(target, name, Member::Method(prior))
}

/// Work queued by a setter hook for the next turn.
pub type Deferred = Box<dyn FnOnce()>;

/// Replace the setter of `key` on `target`.
///
/// The new setter forwards to the prior one synchronously, so the value is
/// observable immediately, and queues `hook` for the next turn of `queue`.
/// A plain data member is forwarded to the instance slot of the same name.
/// Missing members, methods, and accessors without a setter are skipped.
pub fn wrap_setter(
    target: &ProtoRef,
    key: &str,
    hook: impl Fn(&ObjectRef, &Value) + 'static,
    queue: &TaskQueue,
) -> Undo {
    let hook = Rc::new(hook);
    wrap_setter_with(
        target,
        key,
        move |this, value| {
            let hook = Rc::clone(&hook);
            let this = Rc::clone(this);
            let value = value.clone();
            Some(Box::new(move || hook(&this, &value)) as Deferred)
        },
        queue,
    )
}

/// Like [`wrap_setter`], but `capture` runs synchronously right after the
/// value is stored and decides what, if anything, runs on the next turn.
pub fn wrap_setter_with(
    target: &ProtoRef,
    key: &str,
    capture: impl Fn(&ObjectRef, &Value) -> Option<Deferred> + 'static,
    queue: &TaskQueue,
) -> Undo {
    let prior = match target.borrow().member(key) {
        Some(member) => member.clone(),
        None => {
            log::trace!(target: "record.intercept", "setter {key} absent, skipped");
            return Undo::noop();
        }
    };

    let (getter, forward): (Option<NativeGetter>, NativeSetter) = match &prior {
        Member::Accessor(accessor) => match accessor.setter() {
            Some(set) => (accessor.getter().cloned(), Rc::clone(set)),
            None => {
                log::debug!(target: "record.intercept", "{key} has no setter, skipped");
                return Undo::noop();
            }
        },
        Member::Data(default) => {
            let slot = key.to_string();
            let default = default.clone();
            let get: NativeGetter = Rc::new(move |this: &ObjectRef| {
                this.slot(&slot).unwrap_or_else(|| default.clone())
            });
            let slot = key.to_string();
            let set: NativeSetter = Rc::new(move |this: &ObjectRef, value: Value| {
                this.set_slot(&slot, value);
            });
            (Some(get), set)
        }
        Member::Method(_) => {
            log::debug!(target: "record.intercept", "{key} is a method, not a setter");
            return Undo::noop();
        }
    };

    let queue = queue.clone();
    let set: NativeSetter = Rc::new(move |this: &ObjectRef, value: Value| {
        forward(this, value.clone());
        if let Some(task) = capture(this, &value) {
            queue.schedule(task);
        }
    });

    target.borrow_mut().set_member(
        key,
        Member::Accessor(Accessor::wrapping(getter, Some(set), prior.clone())),
    );
    Undo::restoring(target, key, prior)
}
