//! Lexical scopes.
//!
//! All bindings of a compilation live in one growable vector. A frame only
//! remembers where in that vector it started, so opening a scope is a push
//! and closing it is a truncate, however many names it declared. Frames
//! nest strictly: the last frame opened is the first one closed.

use crate::util::Name;
use crate::vm::FunctionId;

use super::CodegenError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeName {
    pub name: Name,
    pub register: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeFrame {
    /// Index into the binding vector where this frame's names begin.
    start: usize,
    /// Function whose registers hold this frame's names.
    owner: FunctionId,
}

impl ScopeFrame {
    pub fn owner(&self) -> FunctionId {
        self.owner
    }
}

/// Outcome of declaring a name in the innermost frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Declaration {
    /// New binding at the requested register.
    Fresh,
    /// The name was already bound in this frame; it keeps its register.
    Existing(u16),
}

/// Where a name was found by [`ScopeStack::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    /// Index of the frame holding the binding (0 = outermost).
    pub frame: usize,
    pub register: u16,
    pub owner: FunctionId,
}

#[derive(Debug, Default)]
pub struct ScopeStack {
    names: Vec<ScopeName>,
    frames: Vec<ScopeFrame>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a frame and returns its index. Without an explicit owner the
    /// frame belongs to the function of the frame it nests in.
    pub fn open(&mut self, owner: Option<FunctionId>) -> Result<usize, CodegenError> {
        let owner = match owner.or_else(|| self.frames.last().map(|f| f.owner)) {
            Some(owner) => owner,
            None => return Err(CodegenError::internal("scope opened without an owning function", 0)),
        };
        self.frames.push(ScopeFrame {
            start: self.names.len(),
            owner,
        });
        Ok(self.frames.len() - 1)
    }

    /// Closes frame `index`, dropping every name declared since it opened.
    pub fn close(&mut self, index: usize) {
        debug_assert_eq!(index + 1, self.frames.len(), "scope frames must close in LIFO order");
        if let Some(frame) = self.frames.pop() {
            self.names.truncate(frame.start);
        }
    }

    pub fn current(&self) -> Option<&ScopeFrame> {
        self.frames.last()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Total live bindings across all frames.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn frame_bindings(&self, index: usize) -> &[ScopeName] {
        let start = self.frames.get(index).map_or(self.names.len(), |f| f.start);
        let end = self
            .frames
            .get(index + 1)
            .map_or(self.names.len(), |next| next.start);
        &self.names[start..end]
    }

    /// Binds `name` to `register` in the innermost frame, unless that frame
    /// already binds it. Shadowing names of outer frames is allowed.
    pub fn declare(&mut self, name: Name, register: u16) -> Declaration {
        if let Some(existing) = self.lookup(name) {
            return Declaration::Existing(existing);
        }
        self.names.push(ScopeName { name, register });
        Declaration::Fresh
    }

    /// Register of `name` if the innermost frame declared it.
    pub fn lookup(&self, name: Name) -> Option<u16> {
        let start = self.frames.last().map_or(0, |f| f.start);
        self.names[start..]
            .iter()
            .find(|n| n.name == name)
            .map(|n| n.register)
    }

    /// Walks frames from innermost to outermost and reports the first frame
    /// binding `name`, with the function owning it.
    pub fn resolve(&self, name: Name) -> Option<Resolved> {
        (0..self.frames.len()).rev().find_map(|index| {
            self.frame_bindings(index)
                .iter()
                .find(|n| n.name == name)
                .map(|n| Resolved {
                    frame: index,
                    register: n.register,
                    owner: self.frames[index].owner,
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::Interner;
    use crate::vm::State;

    fn setup() -> (State, FunctionId, FunctionId) {
        let mut state = State::new();
        let outer = state.new_function(None);
        let inner = state.new_function(Some(outer));
        (state, outer, inner)
    }

    #[test]
    fn nested_names_vanish_on_close() {
        let (_state, f, _) = setup();
        let mut interner = Interner::new();
        let a = interner.intern("a");
        let b = interner.intern("b");
        let mut scopes = ScopeStack::new();

        let outer = scopes.open(Some(f)).unwrap();
        assert_eq!(scopes.declare(a, 0), Declaration::Fresh);
        let inner = scopes.open(None).unwrap();
        assert_eq!(scopes.declare(b, 1), Declaration::Fresh);
        assert!(scopes.resolve(a).is_some());
        assert!(scopes.resolve(b).is_some());

        scopes.close(inner);
        assert!(scopes.resolve(b).is_none());
        assert_eq!(scopes.resolve(a).map(|r| r.register), Some(0));
        assert_eq!(scopes.len(), 1);

        scopes.close(outer);
        assert!(scopes.is_empty());
        assert_eq!(scopes.depth(), 0);
    }

    #[test]
    fn redeclaration_in_same_frame_keeps_register() {
        let (_state, f, _) = setup();
        let mut interner = Interner::new();
        let x = interner.intern("x");
        let mut scopes = ScopeStack::new();
        scopes.open(Some(f)).unwrap();
        assert_eq!(scopes.declare(x, 3), Declaration::Fresh);
        assert_eq!(scopes.declare(x, 4), Declaration::Existing(3));
        assert_eq!(scopes.len(), 1, "failed declare leaves the stack unchanged");
    }

    #[test]
    fn shadowing_across_frames() {
        let (_state, f, _) = setup();
        let mut interner = Interner::new();
        let x = interner.intern("x");
        let mut scopes = ScopeStack::new();
        let outer = scopes.open(Some(f)).unwrap();
        scopes.declare(x, 0);
        let inner = scopes.open(None).unwrap();
        assert_eq!(scopes.lookup(x), None, "lookup only sees the innermost frame");
        assert_eq!(scopes.declare(x, 1), Declaration::Fresh);
        assert_eq!(scopes.resolve(x).map(|r| (r.frame, r.register)), Some((inner, 1)));
        scopes.close(inner);
        assert_eq!(scopes.resolve(x).map(|r| (r.frame, r.register)), Some((outer, 0)));
    }

    #[test]
    fn frames_inherit_owner_unless_given() {
        let (_state, outer_fn, inner_fn) = setup();
        let mut interner = Interner::new();
        let up = interner.intern("up");
        let own = interner.intern("own");
        let mut scopes = ScopeStack::new();

        scopes.open(Some(outer_fn)).unwrap();
        scopes.declare(up, 0);
        scopes.open(None).unwrap();
        assert_eq!(scopes.current().map(|f| f.owner()), Some(outer_fn));

        scopes.open(Some(inner_fn)).unwrap();
        scopes.declare(own, 0);
        assert_eq!(scopes.resolve(up).map(|r| r.owner), Some(outer_fn));
        assert_eq!(scopes.resolve(own).map(|r| r.owner), Some(inner_fn));
    }

    #[test]
    fn open_without_owner_or_parent_is_internal_error() {
        let mut scopes = ScopeStack::new();
        assert!(scopes.open(None).unwrap_err().is_internal());
    }

    #[test]
    fn unknown_names_do_not_resolve() {
        let (_state, f, _) = setup();
        let mut interner = Interner::new();
        let g = interner.intern("print");
        let mut scopes = ScopeStack::new();
        scopes.open(Some(f)).unwrap();
        assert_eq!(scopes.resolve(g), None);
    }
}
