//! AMF value types.
//!
//! Arrays and objects are allocated in a [`ValueArena`] and referred to by
//! [`Handle`], so the same instance can be reachable from multiple points of
//! a value graph and graphs may contain cycles. Value identity is the handle;
//! the reference tables of both codecs key on it.

use std::collections::HashSet;

use indexmap::IndexMap;

/// A stable identity for an array or object inside a [`ValueArena`].
///
/// Two values carrying the same handle are the same instance. Handles are
/// only meaningful together with the arena that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(pub(crate) usize);

/// Represents any AMF value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// AMF Null.
    Null,
    /// AMF Undefined.
    Undefined,
    /// AMF Boolean.
    Boolean(bool),
    /// AMF Number (IEEE-754 double).
    Number(f64),
    /// AMF3 Integer. Logical range −2^28 … 2^28−1; values outside that range
    /// are widened to a double on the wire.
    Integer(i32),
    /// AMF Date, in milliseconds since the epoch.
    Date(f64),
    /// AMF String.
    String(String),
    /// AMF Array, by identity.
    Array(Handle),
    /// AMF Object, by identity.
    Object(Handle),
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

/// Represents any AMF object.
///
/// AMF0 objects are a degenerate case: dynamic, not externalizable, with no
/// sealed properties. Trait metadata lives in the struct fields; member keys
/// starting with `@` are reserved and rejected by both codecs.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    /// Class name. Empty means anonymous.
    pub name: String,
    /// If true, free-form members beyond the sealed list are allowed.
    pub dynamic: bool,
    /// If true, member encoding is replaced by a class-specific payload.
    pub externalizable: bool,
    /// Property names whose values are written positionally, without a key.
    pub sealed_properties: Vec<String>,
    /// Member values, keyed by name. Holds the sealed property values and,
    /// if the object is dynamic, any additional members. Insertion order is
    /// the encode order for dynamic members.
    pub members: IndexMap<String, Value>,
}

impl Default for Object {
    fn default() -> Self {
        Object {
            name: String::new(),
            dynamic: true,
            externalizable: false,
            sealed_properties: Vec::new(),
            members: IndexMap::new(),
        }
    }
}

/// An arena slot: the content of an array or object.
#[derive(Debug, Clone)]
pub enum Complex {
    /// An ordered sequence of values.
    Array(Vec<Value>),
    /// A keyed object.
    Object(Object),
}

/// A session-local arena owning every array and object of a value graph.
#[derive(Debug, Default, Clone)]
pub struct ValueArena {
    slots: Vec<Complex>,
}

impl ValueArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of allocated arrays and objects.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if nothing has been allocated.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Allocate an array and return its handle.
    pub fn alloc_array(&mut self, items: Vec<Value>) -> Handle {
        self.slots.push(Complex::Array(items));
        Handle(self.slots.len() - 1)
    }

    /// Allocate an object and return its handle.
    pub fn alloc_object(&mut self, object: Object) -> Handle {
        self.slots.push(Complex::Object(object));
        Handle(self.slots.len() - 1)
    }

    /// Access a slot.
    ///
    /// # Panics
    ///
    /// Panics if the handle does not belong to this arena.
    pub fn complex(&self, handle: Handle) -> &Complex {
        &self.slots[handle.0]
    }

    /// Access an array.
    ///
    /// # Panics
    ///
    /// Panics if the handle does not refer to an array of this arena.
    pub fn array(&self, handle: Handle) -> &Vec<Value> {
        match &self.slots[handle.0] {
            Complex::Array(items) => items,
            Complex::Object(_) => panic!("handle does not refer to an array"),
        }
    }

    /// Mutably access an array.
    ///
    /// # Panics
    ///
    /// Panics if the handle does not refer to an array of this arena.
    pub fn array_mut(&mut self, handle: Handle) -> &mut Vec<Value> {
        match &mut self.slots[handle.0] {
            Complex::Array(items) => items,
            Complex::Object(_) => panic!("handle does not refer to an array"),
        }
    }

    /// Access an object.
    ///
    /// # Panics
    ///
    /// Panics if the handle does not refer to an object of this arena.
    pub fn object(&self, handle: Handle) -> &Object {
        match &self.slots[handle.0] {
            Complex::Object(object) => object,
            Complex::Array(_) => panic!("handle does not refer to an object"),
        }
    }

    /// Mutably access an object.
    ///
    /// # Panics
    ///
    /// Panics if the handle does not refer to an object of this arena.
    pub fn object_mut(&mut self, handle: Handle) -> &mut Object {
        match &mut self.slots[handle.0] {
            Complex::Object(object) => object,
            Complex::Array(_) => panic!("handle does not refer to an object"),
        }
    }

    /// Structural equality between two value graphs, possibly across arenas.
    ///
    /// Back-references are compared by bisimulation: a pair of handles that
    /// is already under comparison is assumed equal, so cyclic graphs
    /// terminate. [`Value::Integer`] and [`Value::Number`] compare equal when
    /// they represent the same number, since the AMF3 encoder collapses exact
    /// integers into the integer marker.
    pub fn value_eq(&self, a: &Value, other: &ValueArena, b: &Value) -> bool {
        let mut visited = HashSet::new();
        self.value_eq_inner(a, other, b, &mut visited)
    }

    fn value_eq_inner(&self, a: &Value, other: &ValueArena, b: &Value, visited: &mut HashSet<(usize, usize)>) -> bool {
        match (a, b) {
            (Value::Null, Value::Null) | (Value::Undefined, Value::Undefined) => true,
            (Value::Boolean(x), Value::Boolean(y)) => x == y,
            (Value::Number(x), Value::Number(y)) => x == y,
            (Value::Integer(x), Value::Integer(y)) => x == y,
            (Value::Integer(x), Value::Number(y)) | (Value::Number(y), Value::Integer(x)) => *x as f64 == *y,
            (Value::Date(x), Value::Date(y)) => x == y,
            (Value::String(x), Value::String(y)) => x == y,
            (Value::Array(ha), Value::Array(hb)) => {
                if !visited.insert((ha.0, hb.0)) {
                    return true;
                }

                let xs = self.array(*ha);
                let ys = other.array(*hb);

                xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| self.value_eq_inner(x, other, y, visited))
            }
            (Value::Object(ha), Value::Object(hb)) => {
                if !visited.insert((ha.0, hb.0)) {
                    return true;
                }

                let x = self.object(*ha);
                let y = other.object(*hb);

                x.name == y.name
                    && x.dynamic == y.dynamic
                    && x.externalizable == y.externalizable
                    && x.sealed_properties == y.sealed_properties
                    && x.members.len() == y.members.len()
                    && x.members
                        .iter()
                        .all(|(key, value)| match y.members.get(key) {
                            Some(w) => self.value_eq_inner(value, other, w, visited),
                            None => false,
                        })
            }
            _ => false,
        }
    }
}
