//! Append-only string storage for tokens that outlive the reader.
//!
//! The reader hands out slices into a scratch line buffer that is
//! overwritten on every refill. Anything the model keeps (variable and
//! constraint names, number lexemes) is copied into this arena once and
//! addressed by a [`Sym`] handle from then on. Storage is bump-allocated
//! in fixed-size blocks; nothing is ever freed or deduplicated.

/// Handle to an interned string. Cheap to copy, valid for the lifetime
/// of the arena that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sym(u32);

impl Sym {
    /// The literal `"0"`, interned by [`StringArena::new`].
    pub const ZERO: Sym = Sym(0);
    /// The literal `"1"`, interned by [`StringArena::new`].
    pub const ONE: Sym = Sym(1);
}

const BLOCK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy)]
struct Span {
    block: u32,
    start: u32,
    len: u32,
}

/// Bump-allocated string arena.
///
/// A request that does not fit the current block opens a fresh block and
/// abandons the tail of the old one; with token-sized strings the waste
/// is bounded by one token per block.
#[derive(Debug)]
pub struct StringArena {
    blocks: Vec<String>,
    spans: Vec<Span>,
}

impl StringArena {
    pub fn new() -> Self {
        let mut arena = StringArena {
            blocks: vec![String::with_capacity(BLOCK_SIZE)],
            spans: Vec::new(),
        };
        // Reserved handles used all over the emitter.
        let zero = arena.intern("0");
        let one = arena.intern("1");
        debug_assert_eq!(zero, Sym::ZERO);
        debug_assert_eq!(one, Sym::ONE);
        arena
    }

    /// Copy `token` into stable storage and return its handle.
    pub fn intern(&mut self, token: &str) -> Sym {
        let needs_new_block = {
            let current = self.blocks.last().expect("arena always has a block");
            current.len() + token.len() > current.capacity()
        };
        if needs_new_block {
            let capacity = BLOCK_SIZE.max(token.len());
            self.blocks.push(String::with_capacity(capacity));
        }

        let block = self.blocks.len() - 1;
        let current = &mut self.blocks[block];
        let start = current.len();
        current.push_str(token);

        let sym = Sym(self.spans.len() as u32);
        self.spans.push(Span {
            block: block as u32,
            start: start as u32,
            len: token.len() as u32,
        });
        sym
    }

    /// Resolve a handle back to its text.
    pub fn resolve(&self, sym: Sym) -> &str {
        let span = self.spans[sym.0 as usize];
        let block = &self.blocks[span.block as usize];
        &block[span.start as usize..(span.start + span.len) as usize]
    }

    /// Number of interned strings (including the reserved `"0"`/`"1"`).
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

impl Default for StringArena {
    fn default() -> Self {
        Self::new()
    }
}
