//! Host object model for observed native APIs.
//!
//! A [`Prototype`] holds the declared member table of one object kind and is
//! shared by every [`HostObject`] of that kind. Calls and assignments on an
//! object go through its prototype, so replacing a member on the prototype
//! changes behavior for all instances at once. This is the seam the call
//! interceptor installs its adapters on.

use bus::ElementType;
use dom::NodeKey;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

pub type ObjectRef = Rc<HostObject>;
pub type ProtoRef = Rc<RefCell<Prototype>>;
pub type NativeFn = Rc<dyn Fn(&ObjectRef, &[Value]) -> Value>;
pub type NativeGetter = Rc<dyn Fn(&ObjectRef) -> Value>;
pub type NativeSetter = Rc<dyn Fn(&ObjectRef, Value)>;

/// Stable opaque identity of a host object, never reused within a process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHandle(u64);

impl ObjectHandle {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ObjectHandle(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_raw(self) -> u64 {
        self.0
    }
}

/// Typed view over shared numeric storage; callers may keep mutating it
/// after passing it to a call.
#[derive(Clone, Debug)]
pub struct TypedArray {
    element: ElementType,
    values: Rc<RefCell<Vec<f64>>>,
}

impl TypedArray {
    pub fn new(element: ElementType, values: Vec<f64>) -> Self {
        Self {
            element,
            values: Rc::new(RefCell::new(values)),
        }
    }

    pub fn element(&self) -> ElementType {
        self.element
    }

    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }

    pub fn set(&self, index: usize, value: f64) {
        if let Some(slot) = self.values.borrow_mut().get_mut(index) {
            *slot = value;
        }
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> Vec<f64> {
        self.values.borrow().clone()
    }
}

#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Typed(TypedArray),
    ArrayBuffer(Rc<RefCell<Vec<u8>>>),
    Node(NodeKey),
    Object(ObjectRef),
    Function(NativeFn),
}

impl Value {
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Array(items) => f.debug_list().entries(items).finish(),
            Value::Typed(t) => write!(f, "{:?}Array(len={})", t.element(), t.len()),
            Value::ArrayBuffer(b) => write!(f, "ArrayBuffer(len={})", b.borrow().len()),
            Value::Node(key) => write!(f, "Node({key:?})"),
            Value::Object(obj) => write!(f, "{}#{}", obj.class(), obj.handle().as_raw()),
            Value::Function(_) => f.write_str("function"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Typed(a), Value::Typed(b)) => {
                a.element == b.element && *a.values.borrow() == *b.values.borrow()
            }
            (Value::ArrayBuffer(a), Value::ArrayBuffer(b)) => *a.borrow() == *b.borrow(),
            (Value::Node(a), Value::Node(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// A callable member. Wrappers keep the member they replaced so the native
/// implementation stays reachable and double wrapping is visible.
pub struct Method {
    call: NativeFn,
    original: Option<Rc<Method>>,
}

impl Method {
    pub fn native(call: impl Fn(&ObjectRef, &[Value]) -> Value + 'static) -> Rc<Self> {
        Rc::new(Self {
            call: Rc::new(call),
            original: None,
        })
    }

    pub(crate) fn wrapping(call: NativeFn, original: Rc<Method>) -> Rc<Self> {
        Rc::new(Self {
            call,
            original: Some(original),
        })
    }

    pub fn invoke(&self, this: &ObjectRef, args: &[Value]) -> Value {
        (self.call)(this, args)
    }

    pub fn original(&self) -> Option<&Rc<Method>> {
        self.original.as_ref()
    }

    pub fn is_wrapped(&self) -> bool {
        self.original.is_some()
    }

    /// Number of wrappers stacked on top of the native implementation.
    pub fn wrap_depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.original.as_ref();
        while let Some(method) = current {
            depth += 1;
            current = method.original.as_ref();
        }
        depth
    }
}

/// Getter/setter pair.
pub struct Accessor {
    get: Option<NativeGetter>,
    set: Option<NativeSetter>,
    original: Option<Member>,
}

impl Accessor {
    pub fn new(get: Option<NativeGetter>, set: Option<NativeSetter>) -> Rc<Self> {
        Rc::new(Self {
            get,
            set,
            original: None,
        })
    }

    pub(crate) fn wrapping(
        get: Option<NativeGetter>,
        set: Option<NativeSetter>,
        original: Member,
    ) -> Rc<Self> {
        Rc::new(Self {
            get,
            set,
            original: Some(original),
        })
    }

    pub fn getter(&self) -> Option<&NativeGetter> {
        self.get.as_ref()
    }

    pub fn setter(&self) -> Option<&NativeSetter> {
        self.set.as_ref()
    }

    pub fn original(&self) -> Option<&Member> {
        self.original.as_ref()
    }

    pub fn is_wrapped(&self) -> bool {
        self.original.is_some()
    }
}

#[derive(Clone)]
pub enum Member {
    Method(Rc<Method>),
    Accessor(Rc<Accessor>),
    /// Plain data property with a default value; instances shadow it.
    Data(Value),
}

impl Member {
    /// Identity comparison: the same installed method/accessor, or equal data.
    pub fn same(&self, other: &Member) -> bool {
        match (self, other) {
            (Member::Method(a), Member::Method(b)) => Rc::ptr_eq(a, b),
            (Member::Accessor(a), Member::Accessor(b)) => Rc::ptr_eq(a, b),
            (Member::Data(a), Member::Data(b)) => a == b,
            _ => false,
        }
    }
}

pub struct Prototype {
    name: String,
    members: HashMap<String, Member>,
}

impl Prototype {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            members: HashMap::new(),
        }
    }

    pub fn into_ref(self) -> ProtoRef {
        Rc::new(RefCell::new(self))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn define_method(
        &mut self,
        name: &str,
        call: impl Fn(&ObjectRef, &[Value]) -> Value + 'static,
    ) -> &mut Self {
        self.members
            .insert(name.to_string(), Member::Method(Method::native(call)));
        self
    }

    pub fn define_accessor(
        &mut self,
        name: &str,
        get: Option<NativeGetter>,
        set: Option<NativeSetter>,
    ) -> &mut Self {
        self.members
            .insert(name.to_string(), Member::Accessor(Accessor::new(get, set)));
        self
    }

    /// Accessor backed by the instance slot of the same name.
    pub fn define_slot_accessor(&mut self, name: &str, default: Value) -> &mut Self {
        let key = name.to_string();
        let get: NativeGetter = Rc::new(move |this: &ObjectRef| {
            this.slot(&key).unwrap_or_else(|| default.clone())
        });
        let key = name.to_string();
        let set: NativeSetter = Rc::new(move |this: &ObjectRef, value: Value| {
            this.set_slot(&key, value);
        });
        self.define_accessor(name, Some(get), Some(set))
    }

    pub fn define_data(&mut self, name: &str, value: Value) -> &mut Self {
        self.members.insert(name.to_string(), Member::Data(value));
        self
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    /// Replace a member, returning the previous one.
    pub fn set_member(&mut self, name: &str, member: Member) -> Option<Member> {
        self.members.insert(name.to_string(), member)
    }

    pub fn member_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.members.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    NoSuchMember { class: String, member: String },
    NotCallable { class: String, member: String },
    ReadOnly { class: String, member: String },
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::NoSuchMember { class, member } => {
                write!(f, "{class} has no member {member}")
            }
            HostError::NotCallable { class, member } => {
                write!(f, "{class}.{member} is not a function")
            }
            HostError::ReadOnly { class, member } => {
                write!(f, "{class}.{member} has no setter")
            }
        }
    }
}

impl std::error::Error for HostError {}

pub struct HostObject {
    handle: ObjectHandle,
    class: String,
    proto: ProtoRef,
    owner: Cell<Option<NodeKey>>,
    slots: RefCell<HashMap<String, Value>>,
}

impl HostObject {
    pub fn new(class: &str, proto: &ProtoRef) -> ObjectRef {
        Rc::new(Self {
            handle: ObjectHandle::next(),
            class: class.to_string(),
            proto: Rc::clone(proto),
            owner: Cell::new(None),
            slots: RefCell::new(HashMap::new()),
        })
    }

    /// Object with an empty prototype of its own, e.g. a buffer handle.
    pub fn plain(class: &str) -> ObjectRef {
        Self::new(class, &Prototype::new(class).into_ref())
    }

    pub fn handle(&self) -> ObjectHandle {
        self.handle
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn prototype(&self) -> &ProtoRef {
        &self.proto
    }

    /// Document node this object belongs to, e.g. the canvas of a context.
    pub fn owner(&self) -> Option<NodeKey> {
        self.owner.get()
    }

    pub fn set_owner(&self, owner: Option<NodeKey>) {
        self.owner.set(owner);
    }

    pub fn slot(&self, name: &str) -> Option<Value> {
        self.slots.borrow().get(name).cloned()
    }

    pub fn set_slot(&self, name: &str, value: Value) {
        self.slots.borrow_mut().insert(name.to_string(), value);
    }

    fn lookup(&self, name: &str) -> Option<Member> {
        self.proto.borrow().member(name).cloned()
    }

    pub fn call(self: &Rc<Self>, name: &str, args: &[Value]) -> Result<Value, HostError> {
        match self.lookup(name) {
            Some(Member::Method(method)) => Ok(method.invoke(self, args)),
            Some(_) => Err(HostError::NotCallable {
                class: self.class.clone(),
                member: name.to_string(),
            }),
            None => Err(HostError::NoSuchMember {
                class: self.class.clone(),
                member: name.to_string(),
            }),
        }
    }

    pub fn set(self: &Rc<Self>, name: &str, value: Value) -> Result<(), HostError> {
        match self.lookup(name) {
            Some(Member::Accessor(accessor)) => match accessor.setter() {
                Some(set) => {
                    set(self, value);
                    Ok(())
                }
                None => Err(HostError::ReadOnly {
                    class: self.class.clone(),
                    member: name.to_string(),
                }),
            },
            // Methods live on the prototype; a slot would never be read back.
            Some(Member::Method(_)) => Err(HostError::ReadOnly {
                class: self.class.clone(),
                member: name.to_string(),
            }),
            Some(Member::Data(_)) | None => {
                self.set_slot(name, value);
                Ok(())
            }
        }
    }

    pub fn get(self: &Rc<Self>, name: &str) -> Value {
        match self.lookup(name) {
            Some(Member::Accessor(accessor)) => accessor
                .getter()
                .map_or(Value::Undefined, |get| get(self)),
            Some(Member::Data(default)) => self.slot(name).unwrap_or(default),
            Some(Member::Method(method)) => {
                let call = Rc::clone(&method);
                Value::Function(Rc::new(move |this: &ObjectRef, args: &[Value]| {
                    call.invoke(this, args)
                }))
            }
            None => self.slot(name).unwrap_or(Value::Undefined),
        }
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostObject")
            .field("handle", &self.handle)
            .field("class", &self.class)
            .field("owner", &self.owner.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter_proto() -> ProtoRef {
        let mut proto = Prototype::new("Counter");
        proto
            .define_method("add", |this, args| {
                let current = this.slot("count").and_then(|v| v.as_number()).unwrap_or(0.0);
                let delta = args.first().and_then(Value::as_number).unwrap_or(1.0);
                this.set_slot("count", Value::Number(current + delta));
                Value::Number(current + delta)
            })
            .define_slot_accessor("label", Value::String("none".into()))
            .define_accessor("readonly", Some(Rc::new(|_: &ObjectRef| Value::Bool(true))), None)
            .define_data("kind", Value::String("counter".into()));
        proto.into_ref()
    }

    #[test]
    fn calls_go_through_the_prototype() {
        let proto = counter_proto();
        let a = HostObject::new("Counter", &proto);
        let b = HostObject::new("Counter", &proto);
        assert_eq!(a.call("add", &[Value::Number(2.0)]).unwrap(), Value::Number(2.0));
        assert_eq!(a.call("add", &[]).unwrap(), Value::Number(3.0));
        assert_eq!(b.call("add", &[]).unwrap(), Value::Number(1.0));
        assert_ne!(a.handle(), b.handle());
    }

    #[test]
    fn missing_and_mistyped_members() {
        let obj = HostObject::new("Counter", &counter_proto());
        assert!(matches!(obj.call("nope", &[]), Err(HostError::NoSuchMember { .. })));
        assert!(matches!(obj.call("label", &[]), Err(HostError::NotCallable { .. })));
        assert!(matches!(
            obj.set("readonly", Value::Null),
            Err(HostError::ReadOnly { .. })
        ));
        assert!(matches!(
            obj.set("add", Value::Number(1.0)),
            Err(HostError::ReadOnly { .. })
        ));
        assert!(matches!(obj.get("add"), Value::Function(_)));
        assert_eq!(obj.slot("add"), None);
    }

    #[test]
    fn accessors_data_and_slots() {
        let obj = HostObject::new("Counter", &counter_proto());
        assert_eq!(obj.get("label"), Value::String("none".into()));
        obj.set("label", Value::String("x".into())).unwrap();
        assert_eq!(obj.get("label"), Value::String("x".into()));
        assert_eq!(obj.get("kind"), Value::String("counter".into()));
        obj.set("kind", Value::String("other".into())).unwrap();
        assert_eq!(obj.get("kind"), Value::String("other".into()));
        assert_eq!(obj.get("unknown"), Value::Undefined);
        assert!(matches!(obj.get("add"), Value::Function(_)));
    }

    #[test]
    fn typed_arrays_share_storage() {
        let array = TypedArray::new(ElementType::Float32, vec![1.0, 2.0]);
        let alias = array.clone();
        alias.set(0, 9.0);
        assert_eq!(array.snapshot(), vec![9.0, 2.0]);
    }
}
