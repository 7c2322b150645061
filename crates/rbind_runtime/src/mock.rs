use std::cell::{Cell, RefCell};
use std::ffi::c_void;
use std::ptr;

use crate::api::RApi;
use crate::error::BridgeError;
use crate::sexp::{Complex128, Sexp, SexpType};

/// Contents of one object on the mock heap.
#[derive(Clone, Debug, PartialEq)]
pub enum MockValue {
    Nil,
    Logical(Vec<i32>),
    Integer(Vec<i32>),
    Real(Vec<f64>),
    Complex(Vec<Complex128>),
    Character(Vec<Option<String>>),
    List(Vec<Sexp>),
    Raw(Vec<u8>),
}

impl MockValue {
    fn empty(kind: SexpType, len: usize) -> Self {
        match kind {
            SexpType::Nil => Self::Nil,
            SexpType::Logical => Self::Logical(vec![0; len]),
            SexpType::Integer => Self::Integer(vec![0; len]),
            SexpType::Real => Self::Real(vec![0.0; len]),
            SexpType::Complex => Self::Complex(vec![Complex128::default(); len]),
            SexpType::Character => Self::Character(vec![Some(String::new()); len]),
            SexpType::List => Self::List(vec![Sexp::from_raw(ptr::null_mut()); len]),
            SexpType::Raw => Self::Raw(vec![0; len]),
            SexpType::Other(code) => panic!("mock heap cannot allocate SEXPTYPE {code}"),
        }
    }

    fn kind(&self) -> SexpType {
        match self {
            Self::Nil => SexpType::Nil,
            Self::Logical(_) => SexpType::Logical,
            Self::Integer(_) => SexpType::Integer,
            Self::Real(_) => SexpType::Real,
            Self::Complex(_) => SexpType::Complex,
            Self::Character(_) => SexpType::Character,
            Self::List(_) => SexpType::List,
            Self::Raw(_) => SexpType::Raw,
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Nil => 0,
            Self::Logical(cells) | Self::Integer(cells) => cells.len(),
            Self::Real(cells) => cells.len(),
            Self::Complex(cells) => cells.len(),
            Self::Character(cells) => cells.len(),
            Self::List(cells) => cells.len(),
            Self::Raw(cells) => cells.len(),
        }
    }
}

struct MockNode {
    value: MockValue,
    names: Option<Sexp>,
    class: Option<Sexp>,
}

/// Single-threaded stand-in for the R heap.
///
/// Objects live in an arena and are addressed by index; `Sexp` handles carry
/// the index as their address, with index 0 reserved for `NULL`. The heap
/// tracks the protection stack the way R does and panics on underflow, so
/// tests can assert that generated routines leave it balanced.
pub struct MockHeap {
    nodes: RefCell<Vec<MockNode>>,
    protected: RefCell<Vec<Sexp>>,
    peak_depth: Cell<usize>,
    unprotect_calls: Cell<usize>,
}

impl Default for MockHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHeap {
    pub fn new() -> Self {
        Self {
            nodes: RefCell::new(vec![MockNode {
                value: MockValue::Nil,
                names: None,
                class: None,
            }]),
            protected: RefCell::new(Vec::new()),
            peak_depth: Cell::new(0),
            unprotect_calls: Cell::new(0),
        }
    }

    fn index(&self, value: Sexp) -> usize {
        let idx = value.as_raw().addr();
        assert!(
            idx < self.nodes.borrow().len(),
            "handle {idx} does not belong to this heap"
        );
        idx
    }

    fn handle(idx: usize) -> Sexp {
        Sexp::from_raw(ptr::without_provenance_mut::<c_void>(idx))
    }

    pub fn alloc(&self, value: MockValue) -> Sexp {
        if value == MockValue::Nil {
            return self.nil();
        }
        let mut nodes = self.nodes.borrow_mut();
        nodes.push(MockNode {
            value,
            names: None,
            class: None,
        });
        Self::handle(nodes.len() - 1)
    }

    /// Allocates `value` with a `names` attribute.
    pub fn named(&self, value: MockValue, names: &[&str]) -> Sexp {
        let target = self.alloc(value);
        let names = self.alloc(MockValue::Character(
            names.iter().map(|name| Some(name.to_string())).collect(),
        ));
        self.set_names(target, names);
        target
    }

    pub fn value(&self, value: Sexp) -> MockValue {
        self.nodes.borrow()[self.index(value)].value.clone()
    }

    /// Cells of a character vector; empty for anything else.
    pub fn strings(&self, value: Sexp) -> Vec<Option<String>> {
        match self.value(value) {
            MockValue::Character(cells) => cells,
            _ => Vec::new(),
        }
    }

    pub fn class_of(&self, value: Sexp) -> Sexp {
        let idx = self.index(value);
        self.nodes.borrow()[idx].class.unwrap_or_else(|| self.nil())
    }

    pub fn protect_depth(&self) -> usize {
        self.protected.borrow().len()
    }

    /// Deepest the protection stack has been since creation.
    pub fn peak_depth(&self) -> usize {
        self.peak_depth.get()
    }

    pub fn unprotect_calls(&self) -> usize {
        self.unprotect_calls.get()
    }
}

impl RApi for MockHeap {
    fn nil(&self) -> Sexp {
        Self::handle(0)
    }

    fn kind(&self, value: Sexp) -> SexpType {
        self.nodes.borrow()[self.index(value)].value.kind()
    }

    fn length(&self, value: Sexp) -> usize {
        self.nodes.borrow()[self.index(value)].value.len()
    }

    fn alloc_vector(&self, kind: SexpType, len: usize) -> Sexp {
        self.alloc(MockValue::empty(kind, len))
    }

    fn protect(&self, value: Sexp) -> Sexp {
        let mut protected = self.protected.borrow_mut();
        protected.push(value);
        self.peak_depth.set(self.peak_depth.get().max(protected.len()));
        value
    }

    fn unprotect(&self, count: usize) {
        let mut protected = self.protected.borrow_mut();
        let depth = protected.len();
        assert!(
            count <= depth,
            "unprotect({count}) with only {depth} protected values"
        );
        protected.truncate(depth - count);
        self.unprotect_calls.set(self.unprotect_calls.get() + 1);
    }

    fn data_ptr(&self, value: Sexp) -> *mut c_void {
        let idx = self.index(value);
        let mut nodes = self.nodes.borrow_mut();
        match &mut nodes[idx].value {
            MockValue::Logical(cells) | MockValue::Integer(cells) => cells.as_mut_ptr().cast(),
            MockValue::Real(cells) => cells.as_mut_ptr().cast(),
            MockValue::Complex(cells) => cells.as_mut_ptr().cast(),
            MockValue::Raw(cells) => cells.as_mut_ptr().cast(),
            other => panic!("data_ptr on non-atomic {}", other.kind()),
        }
    }

    fn string_elt(&self, value: Sexp, idx: usize) -> Result<Option<String>, BridgeError> {
        match &self.nodes.borrow()[self.index(value)].value {
            MockValue::Character(cells) => Ok(cells[idx].clone()),
            other => panic!("string_elt on {}", other.kind()),
        }
    }

    fn set_string_elt(&self, value: Sexp, idx: usize, text: Option<&str>) {
        let node = self.index(value);
        match &mut self.nodes.borrow_mut()[node].value {
            MockValue::Character(cells) => cells[idx] = text.map(str::to_string),
            other => panic!("set_string_elt on {}", other.kind()),
        }
    }

    fn vector_elt(&self, value: Sexp, idx: usize) -> Sexp {
        match &self.nodes.borrow()[self.index(value)].value {
            MockValue::List(cells) => cells[idx],
            other => panic!("vector_elt on {}", other.kind()),
        }
    }

    fn set_vector_elt(&self, value: Sexp, idx: usize, elt: Sexp) {
        let node = self.index(value);
        match &mut self.nodes.borrow_mut()[node].value {
            MockValue::List(cells) => cells[idx] = elt,
            other => panic!("set_vector_elt on {}", other.kind()),
        }
    }

    fn names(&self, value: Sexp) -> Sexp {
        let idx = self.index(value);
        self.nodes.borrow()[idx].names.unwrap_or_else(|| self.nil())
    }

    fn set_names(&self, value: Sexp, names: Sexp) {
        let idx = self.index(value);
        let names = (!self.is_null(names)).then_some(names);
        self.nodes.borrow_mut()[idx].names = names;
    }

    fn set_class(&self, value: Sexp, class: Sexp) {
        let idx = self.index(value);
        let class = (!self.is_null(class)).then_some(class);
        self.nodes.borrow_mut()[idx].class = class;
    }
}
