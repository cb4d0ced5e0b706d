//! Hash-consed alias/fidx bit sets with tree-structured splitting.
//!
//! `Bits<Id>` is the canonical set-of-ids abstraction shared by memory alias
//! classes (`AliasId`) and function indices (`FidxId`). A value is either a
//! single-bit *constant* form or a bit-array form tagged with a `Polarity`:
//! `Meet` ("could be any of these, union grows downward") or `Join` ("could
//! be all of these, union grows upward"). Equality between two `Bits` values
//! is pointer identity, never structural comparison -- compare with `==`
//! (which forwards to `Rc::ptr_eq`), not by matching on the representation.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};

use crate::error::SeaError;

const WORD_BITS: u32 = 64;

/// Lattice polarity of a `Bits` bit-array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Polarity {
    /// Low in the lattice: more set bits means "could be any of these".
    Meet,
    /// High in the lattice: more set bits means a joined choice among these.
    Join,
}

impl Polarity {
    fn flip(self) -> Polarity {
        match self {
            Polarity::Meet => Polarity::Join,
            Polarity::Join => Polarity::Meet,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Repr {
    Const(u32),
    Array(Vec<u64>, Polarity),
}

impl Repr {
    fn test(&self, i: u32) -> bool {
        match self {
            Repr::Const(c) => *c == i,
            Repr::Array(words, _) => {
                let w = (i / WORD_BITS) as usize;
                w < words.len() && (words[w] >> (i % WORD_BITS)) & 1 == 1
            }
        }
    }

    fn iter_bits(&self) -> Vec<u32> {
        match self {
            Repr::Const(c) => vec![*c],
            Repr::Array(words, _) => {
                let mut out = Vec::new();
                for (w, word) in words.iter().enumerate() {
                    for b in 0..WORD_BITS {
                        if (word >> b) & 1 == 1 {
                            out.push(w as u32 * WORD_BITS + b);
                        }
                    }
                }
                out
            }
        }
    }
}

#[derive(Debug)]
struct BitsData {
    repr: Repr,
    hash: u64,
}

fn static_hash(repr: &Repr) -> u64 {
    let mut h = std::collections::hash_map::DefaultHasher::new();
    repr.hash(&mut h);
    h.finish()
}

/// An immutable, hash-consed set of non-negative integer ids.
///
/// `Id` is a marker type (`AliasId` or `FidxId`) identifying which split
/// tree this value's bits are drawn from; it carries no runtime data.
#[derive(Debug, Clone)]
pub struct Bits<Id> {
    data: Rc<BitsData>,
    _marker: PhantomData<Id>,
}

impl<Id> PartialEq for Bits<Id> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }
}
impl<Id> Eq for Bits<Id> {}

impl<Id> Hash for Bits<Id> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.data) as usize).hash(state);
    }
}

impl<Id> fmt::Display for Bits<Id> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data.repr {
            Repr::Const(c) => write!(f, "{{{c}}}"),
            Repr::Array(_, pol) => {
                let bits = self.data.repr.iter_bits();
                let sep = match pol {
                    Polarity::Meet => ",",
                    Polarity::Join => "&",
                };
                write!(f, "{{")?;
                for (i, b) in bits.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{sep}")?;
                    }
                    write!(f, "{b}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl<Id> Bits<Id> {
    pub fn is_con(&self) -> bool {
        matches!(self.data.repr, Repr::Const(_))
    }

    /// The single bit of a constant form, or `None` for a bit-array.
    pub fn abit(&self) -> Option<u32> {
        match self.data.repr {
            Repr::Const(c) => Some(c),
            Repr::Array(..) => None,
        }
    }

    pub fn test(&self, i: u32) -> bool {
        self.data.repr.test(i)
    }

    pub fn polarity(&self) -> Option<Polarity> {
        match self.data.repr {
            Repr::Array(_, p) => Some(p),
            Repr::Const(_) => None,
        }
    }

    /// True if this set is drawn from the high (`Join`) side of the lattice.
    pub fn above_center(&self) -> bool {
        matches!(self.data.repr, Repr::Array(_, Polarity::Join))
    }

    pub fn may_nil(&self) -> bool {
        self.test(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> {
        self.data.repr.iter_bits().into_iter()
    }
}

/// The alias/fidx split tree.
///
/// Global and shared for one compilation: grows via `split`, never shrinks.
/// Bit 0 is reserved for nil, bit 1 for "all" -- both pre-registered as
/// closed roots with no parent.
#[derive(Debug, Clone)]
pub struct SplitTree {
    parent: Vec<Option<u32>>,
    closed: Vec<bool>,
}

impl Default for SplitTree {
    fn default() -> Self {
        SplitTree {
            parent: vec![None, None],
            closed: vec![true, true],
        }
    }
}

impl SplitTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    pub fn parent_of(&self, id: u32) -> Option<u32> {
        self.parent.get(id as usize).copied().flatten()
    }

    pub fn is_closed(&self, id: u32) -> bool {
        self.closed.get(id as usize).copied().unwrap_or(false)
    }

    pub fn children_of(&self, id: u32) -> Vec<u32> {
        self.parent
            .iter()
            .enumerate()
            .filter_map(|(i, p)| (*p == Some(id)).then_some(i as u32))
            .collect()
    }

    /// Allocate a new id as a child of `parent`. "Splitting a bit":
    /// the caller is responsible for re-stamping existing `Bits` values so
    /// that a set containing `parent` is understood to still mean "could be
    /// either child".
    pub fn split(&mut self, parent: u32) -> u32 {
        let child = self.parent.len() as u32;
        self.parent.push(Some(parent));
        self.closed.push(false);
        child
    }
}

/// Hash-consing interner for one `Bits<Id>` id-space, paired with the
/// `SplitTree` its canonicalization rule consults.
///
/// Identity is `Rc` pointer equality; the bucket table holds only `Weak`
/// references so that a `Bits` value with no remaining owner is dropped on
/// its next hash collision, playing the role of the source's per-variant
/// free-list without requiring an arena index.
pub struct BitsInterner<Id> {
    buckets: HashMap<u64, Vec<Weak<BitsData>>>,
    tree: SplitTree,
    _marker: PhantomData<Id>,
}

impl<Id> Default for BitsInterner<Id> {
    fn default() -> Self {
        BitsInterner {
            buckets: HashMap::new(),
            tree: SplitTree::new(),
            _marker: PhantomData,
        }
    }
}

impl<Id> BitsInterner<Id> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tree(&self) -> &SplitTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut SplitTree {
        &mut self.tree
    }

    fn intern(&mut self, repr: Repr) -> Bits<Id> {
        let hash = static_hash(&repr);
        let bucket = self.buckets.entry(hash).or_default();
        bucket.retain(|w| w.strong_count() > 0);
        for weak in bucket.iter() {
            if let Some(existing) = weak.upgrade() {
                if existing.repr == repr {
                    return Bits {
                        data: existing,
                        _marker: PhantomData,
                    };
                }
            }
        }
        let data = Rc::new(BitsData { repr, hash });
        bucket.push(Rc::downgrade(&data));
        Bits {
            data,
            _marker: PhantomData,
        }
    }

    pub fn make_const(&mut self, bit: u32) -> Bits<Id> {
        self.intern(Repr::Const(bit))
    }

    /// Build a canonical bit-array from an explicit set of bits. `bits`
    /// need not be sorted or deduplicated.
    pub fn make(&mut self, bits: &[u32], polarity: Polarity) -> Result<Bits<Id>, SeaError> {
        let canon = self.canonicalize(bits, polarity)?;
        if let [only] = canon[..] {
            return Ok(self.make_const(only));
        }
        if canon.is_empty() {
            return Ok(self.make_const(0));
        }
        let words = Self::pack(&canon);
        Ok(self.intern(Repr::Array(words, polarity)))
    }

    fn pack(bits: &[u32]) -> Vec<u64> {
        let max = bits.iter().copied().max().unwrap_or(0);
        let mut words = vec![0u64; (max / WORD_BITS) as usize + 1];
        for &b in bits {
            words[(b / WORD_BITS) as usize] |= 1u64 << (b % WORD_BITS);
        }
        while words.len() > 1 && *words.last().unwrap() == 0 {
            words.pop();
        }
        words
    }

    /// Enforce: if a parent bit is set, clear all descendant bits; if a
    /// parent is clear, closed, and every child is set, collapse to the
    /// parent. The all-children-set collapse path is a documented
    /// precondition that is never reached in practice; it is implemented
    /// here as an explicit error rather than guessed at.
    fn canonicalize(&self, bits: &[u32], _polarity: Polarity) -> Result<Vec<u32>, SeaError> {
        let mut set: Vec<u32> = bits.to_vec();
        set.sort_unstable();
        set.dedup();

        set.retain(|&b| {
            let mut ancestor = self.tree.parent_of(b);
            while let Some(a) = ancestor {
                if set.contains(&a) {
                    return false;
                }
                ancestor = self.tree.parent_of(a);
            }
            true
        });

        for &b in &set {
            if self.tree.is_closed(b) {
                continue;
            }
            let children = self.tree.children_of(b);
            if !children.is_empty() && children.iter().all(|c| set.contains(c)) {
                return Err(SeaError::Unsupported {
                    reason: format!(
                        "Bits canonicalization: all children of {b} are set; \
                         collapse-to-parent is an unimplemented precondition"
                    ),
                });
            }
        }

        Ok(set)
    }

    /// Meet.
    pub fn meet(&mut self, a: &Bits<Id>, b: &Bits<Id>) -> Result<Bits<Id>, SeaError> {
        if a == b {
            return Ok(a.clone());
        }
        match (&a.data.repr, &b.data.repr) {
            (Repr::Const(x), Repr::Const(y)) => self.make(&[*x, *y], Polarity::Meet),
            (Repr::Const(c), Repr::Array(_, Polarity::Meet)) => {
                if b.test(*c) {
                    Ok(b.clone())
                } else {
                    let mut bits = b.iter().collect::<Vec<_>>();
                    bits.push(*c);
                    self.make(&bits, Polarity::Meet)
                }
            }
            (Repr::Array(_, Polarity::Meet), Repr::Const(c)) => {
                if a.test(*c) {
                    Ok(a.clone())
                } else {
                    let mut bits = a.iter().collect::<Vec<_>>();
                    bits.push(*c);
                    self.make(&bits, Polarity::Meet)
                }
            }
            (Repr::Const(c), Repr::Array(_, Polarity::Join)) => {
                if b.test(*c) {
                    self.make_const_ok(*c)
                } else {
                    let first = b.iter().next().unwrap_or(*c);
                    self.make(&[*c, first], Polarity::Meet)
                }
            }
            (Repr::Array(_, Polarity::Join), Repr::Const(c)) => {
                if a.test(*c) {
                    self.make_const_ok(*c)
                } else {
                    let first = a.iter().next().unwrap_or(*c);
                    self.make(&[*c, first], Polarity::Meet)
                }
            }
            (Repr::Array(_, Polarity::Meet), Repr::Array(_, Polarity::Meet)) => {
                let bits: Vec<u32> = a.iter().chain(b.iter()).collect();
                self.make(&bits, Polarity::Meet)
            }
            (Repr::Array(_, Polarity::Meet), Repr::Array(_, Polarity::Join)) => {
                // : "TODO: require one bit of the high set to appear
                // in the low set; for now, return the low set unchanged."
                // Preserved verbatim: monotonically sound, not ideal.
                Ok(a.clone())
            }
            (Repr::Array(_, Polarity::Join), Repr::Array(_, Polarity::Meet)) => Ok(b.clone()),
            (Repr::Array(_, Polarity::Join), Repr::Array(_, Polarity::Join)) => {
                let a_bits: Vec<u32> = a.iter().collect();
                let b_bits: Vec<u32> = b.iter().collect();
                if a_bits.iter().all(|x| b_bits.contains(x)) {
                    Ok(a.clone())
                } else if b_bits.iter().all(|x| a_bits.contains(x)) {
                    Ok(b.clone())
                } else {
                    let bits: Vec<u32> = a_bits.into_iter().chain(b_bits).collect();
                    self.make(&bits, Polarity::Join)
                }
            }
        }
    }

    fn make_const_ok(&mut self, bit: u32) -> Result<Bits<Id>, SeaError> {
        Ok(self.make_const(bit))
    }

    /// Join = dual(meet(dual(a), dual(b)))`).
    pub fn join(&mut self, a: &Bits<Id>, b: &Bits<Id>) -> Result<Bits<Id>, SeaError> {
        let da = self.dual(a);
        let db = self.dual(b);
        let m = self.meet(&da, &db)?;
        Ok(self.dual(&m))
    }

    /// Dual: a constant's dual is itself; otherwise flip the polarity,
    /// keeping the bit-array identical.
    pub fn dual(&mut self, a: &Bits<Id>) -> Bits<Id> {
        match &a.data.repr {
            Repr::Const(_) => a.clone(),
            Repr::Array(words, pol) => self.intern(Repr::Array(words.clone(), pol.flip())),
        }
    }

    pub fn clear(&mut self, a: &Bits<Id>, i: u32) -> Result<Bits<Id>, SeaError> {
        match &a.data.repr {
            Repr::Const(c) if *c == i => Ok(self.make_const(0)),
            Repr::Const(_) => Ok(a.clone()),
            Repr::Array(_, pol) => {
                let bits: Vec<u32> = a.iter().filter(|b| *b != i).collect();
                self.make(&bits, *pol)
            }
        }
    }
}

/// Alias-class flavored `Bits`.
pub type BitsAlias = Bits<crate::id::AliasId>;
/// Function-index flavored `Bits`.
pub type BitsFun = Bits<crate::id::FidxId>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::AliasId;

    fn interner() -> BitsInterner<AliasId> {
        BitsInterner::new()
    }

    #[test]
    fn make_const_identity() {
        let mut i = interner();
        let a = i.make_const(5);
        let b = i.make_const(5);
        assert_eq!(a, b, "equal content must intern to the same identity");
    }

    #[test]
    fn single_bit_array_collapses_to_constant() {
        let mut i = interner();
        let a = i.make(&[7], Polarity::Meet).unwrap();
        assert!(a.is_con());
        assert_eq!(a.abit(), Some(7));
    }

    #[test]
    fn meet_identity_and_idempotent() {
        let mut i = interner();
        let a = i.make(&[2, 3], Polarity::Meet).unwrap();
        let m = i.meet(&a, &a).unwrap();
        assert_eq!(m, a);
    }

    #[test]
    fn meet_low_low_is_union() {
        let mut i = interner();
        let a = i.make(&[2, 3], Polarity::Meet).unwrap();
        let b = i.make(&[3, 4], Polarity::Meet).unwrap();
        let m = i.meet(&a, &b).unwrap();
        let mut bits: Vec<u32> = m.iter().collect();
        bits.sort();
        assert_eq!(bits, vec![2, 3, 4]);
    }

    #[test]
    fn meet_low_high_returns_low_unchanged() {
        // Documented weaker-than-ideal behavior, preserved verbatim.
        let mut i = interner();
        let low = i.make(&[2, 3], Polarity::Meet).unwrap();
        let high = i.make(&[9, 10], Polarity::Join).unwrap();
        let m = i.meet(&low, &high).unwrap();
        assert_eq!(m, low);
    }

    #[test]
    fn meet_high_high_subset_is_subset() {
        let mut i = interner();
        let small = i.make(&[5, 6], Polarity::Join).unwrap();
        let big = i.make(&[5, 6, 7], Polarity::Join).unwrap();
        let m = i.meet(&small, &big).unwrap();
        assert_eq!(m, small);
    }

    #[test]
    fn dual_is_involution() {
        let mut i = interner();
        let a = i.make(&[2, 3], Polarity::Meet).unwrap();
        let d1 = i.dual(&a);
        let d2 = i.dual(&d1);
        assert_eq!(d2, a);
    }

    #[test]
    fn dual_flips_polarity_not_bits() {
        let mut i = interner();
        let a = i.make(&[4, 5], Polarity::Meet).unwrap();
        let d = i.dual(&a);
        assert_eq!(d.polarity(), Some(Polarity::Join));
        let mut bits: Vec<u32> = d.iter().collect();
        bits.sort();
        assert_eq!(bits, vec![4, 5]);
    }

    #[test]
    fn join_matches_demorgan_definition() {
        let mut i = interner();
        let a = i.make(&[2, 3], Polarity::Meet).unwrap();
        let b = i.make(&[3, 4], Polarity::Meet).unwrap();
        let joined = i.join(&a, &b).unwrap();
        let da = i.dual(&a);
        let db = i.dual(&b);
        let met = i.meet(&da, &db).unwrap();
        let expected = i.dual(&met);
        assert_eq!(joined, expected);
    }

    #[test]
    fn split_adds_child_with_parent_link() {
        let mut tree = SplitTree::new();
        let child = tree.split(5);
        assert_eq!(tree.parent_of(child), Some(5));
        assert_eq!(tree.children_of(5), vec![child]);
    }

    #[test]
    fn canonicalization_clears_child_when_parent_set() {
        let mut i = interner();
        let parent = 10u32;
        let child = i.tree_mut().split(parent);
        let set = i.make(&[parent, child], Polarity::Meet).unwrap();
        assert!(set.test(parent));
        assert!(!set.test(child));
    }

    #[test]
    fn clear_removes_a_bit() {
        let mut i = interner();
        let a = i.make(&[2, 3, 4], Polarity::Meet).unwrap();
        let cleared = i.clear(&a, 3).unwrap();
        assert!(!cleared.test(3));
        assert!(cleared.test(2));
        assert!(cleared.test(4));
    }
}
