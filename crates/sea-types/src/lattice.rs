//! Hash-consed meet-semilattice of flow types.
//!
//! Construction funnels through a [`TypeInterner`] keyed by a manual content
//! hash (not `#[derive(Hash)]`, because child `Type`s are compared and
//! hashed by `Rc` identity rather than structurally -- see the note on
//! `Type`'s `PartialEq`/`Hash` impls). Equality between two `Type` values is
//! pointer identity, matching the hash-consing invariant the rest of the
//! lattice relies on.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use sea_core::{BitsAlias, BitsFun, BitsInterner};
use serde::{Deserialize, Serialize};

/// Field mutability within a `Struct` type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Access {
    Read,
    ReadWrite,
}

/// One labeled field of a `Struct` type, in declaration order.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub access: Access,
    pub ty: Type,
}

#[derive(Debug, Clone)]
pub struct IntData {
    /// Bit width: 1 (bool), 8, 16, 32, or 64.
    pub size: u8,
    pub con: Option<i64>,
    /// High (above center, "could narrow to any of these constants") vs low.
    pub high: bool,
    /// "nil/nonnil" flag: true if zero is a legal value here.
    pub nil: bool,
}

#[derive(Debug, Clone)]
pub struct FltData {
    pub size: u8,
    pub con: Option<u64>, // f64::to_bits(), to keep Type structurally hashable
    pub high: bool,
}

#[derive(Debug, Clone)]
pub struct FunPtrData {
    pub fidxs: BitsFun,
    pub nargs: u16,
    pub dsp: Type,
    pub ret: Type,
}

#[derive(Debug, Clone)]
pub struct MemPtrData {
    pub aliases: BitsAlias,
    pub obj: Type,
}

#[derive(Debug, Clone)]
pub struct MemData {
    pub any: bool,
    /// Sparse alias id -> object type map; index 1 is the default ("unknown alias") slot.
    pub aliases: Vec<(u32, Type)>,
}

#[derive(Debug, Clone)]
pub struct StructData {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

#[derive(Debug, Clone)]
enum Repr {
    Any,
    All,
    Ctrl,
    XCtrl,
    Nil,
    XNil,
    Scalar,
    Int(IntData),
    Flt(FltData),
    FunPtr(FunPtrData),
    MemPtr(MemPtrData),
    Mem(MemData),
    Struct(StructData),
    Tuple(Vec<Type>),
}

struct TypeData {
    repr: Repr,
    hash: u64,
}

impl fmt::Debug for TypeData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeData").field("repr", &self.repr).finish()
    }
}

/// A hash-consed flow type. Compare with `==`, which is `Rc` pointer
/// equality -- never destructure and compare fields directly, or the
/// "equality is identity" invariant is
/// silently violated.
#[derive(Debug, Clone)]
pub struct Type(Rc<TypeData>);

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl Type {
    pub fn is_con(&self) -> bool {
        matches!(&self.0.repr, Repr::Int(d) if d.con.is_some())
            || matches!(&self.0.repr, Repr::Flt(d) if d.con.is_some())
    }

    pub fn above_center(&self) -> bool {
        match &self.0.repr {
            Repr::Any | Repr::XCtrl | Repr::XNil => true,
            Repr::All | Repr::Ctrl | Repr::Nil | Repr::Scalar => false,
            Repr::Int(d) => d.high,
            Repr::Flt(d) => d.high,
            Repr::FunPtr(d) => d.fidxs.above_center(),
            Repr::MemPtr(d) => d.aliases.above_center(),
            Repr::Mem(_) | Repr::Struct(_) | Repr::Tuple(_) => false,
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self.0.repr, Repr::Any)
    }

    pub fn is_all(&self) -> bool {
        matches!(self.0.repr, Repr::All)
    }

    /// The integer constant, if this is a constant `Int`.
    pub fn int_const(&self) -> Option<i64> {
        match &self.0.repr {
            Repr::Int(d) => d.con,
            _ => None,
        }
    }

    /// The candidate fidx set, if this is a `FunPtr` -- what
    /// `check_and_wire` reads to discover/sharpen a call site's callees.
    pub fn fidxs(&self) -> Option<&BitsFun> {
        match &self.0.repr {
            Repr::FunPtr(d) => Some(&d.fidxs),
            _ => None,
        }
    }

    fn variant_tag(&self) -> u8 {
        match &self.0.repr {
            Repr::Any => 0,
            Repr::All => 1,
            Repr::Ctrl => 2,
            Repr::XCtrl => 3,
            Repr::Nil => 4,
            Repr::XNil => 5,
            Repr::Scalar => 6,
            Repr::Int(_) => 7,
            Repr::Flt(_) => 8,
            Repr::FunPtr(_) => 9,
            Repr::MemPtr(_) => 10,
            Repr::Mem(_) => 11,
            Repr::Struct(_) => 12,
            Repr::Tuple(_) => 13,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.repr {
            Repr::Any => write!(f, "ANY"),
            Repr::All => write!(f, "ALL"),
            Repr::Ctrl => write!(f, "CTRL"),
            Repr::XCtrl => write!(f, "XCTRL"),
            Repr::Nil => write!(f, "NIL"),
            Repr::XNil => write!(f, "XNIL"),
            Repr::Scalar => write!(f, "SCALAR"),
            Repr::Int(d) => match d.con {
                Some(c) => write!(f, "{c}"),
                None => write!(f, "{}i{}", if d.high { "~" } else { "" }, d.size),
            },
            Repr::Flt(d) => match d.con {
                Some(bits) => write!(f, "{}", f64::from_bits(bits)),
                None => write!(f, "{}f{}", if d.high { "~" } else { "" }, d.size),
            },
            Repr::FunPtr(d) => write!(f, "{{{} -> {}}}", d.dsp, d.ret),
            Repr::MemPtr(d) => write!(f, "*{}", d.obj),
            Repr::Mem(_) => write!(f, "MEM"),
            Repr::Struct(d) => write!(f, "{}{{..}}", d.name),
            Repr::Tuple(items) => {
                write!(f, "(")?;
                for (i, t) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{t}")?;
                }
                write!(f, ")")
            }
        }
    }
}

fn const_bit_size(c: i64) -> u8 {
    if c == 0 || c == 1 {
        1
    } else {
        let bits = 64 - (c.unsigned_abs().leading_zeros() as u8).min(63);
        if bits <= 8 {
            8
        } else if bits <= 16 {
            16
        } else if bits <= 32 {
            32
        } else {
            64
        }
    }
}

/// Hash-consing interner for the flow type lattice.
///
/// Mirrors `sea_core::bits::BitsInterner`: weak-referenced buckets act as
/// the source's per-variant free-list, and identity is `Rc` pointer
/// equality rather than an arena index.
pub struct TypeInterner {
    buckets: HashMap<u64, Vec<Weak<TypeData>>>,
}

impl Default for TypeInterner {
    fn default() -> Self {
        TypeInterner {
            buckets: HashMap::new(),
        }
    }
}

impl TypeInterner {
    pub fn new() -> Self {
        Self::default()
    }

    fn intern(&mut self, repr: Repr) -> Type {
        let hash = content_hash(&repr);
        let bucket = self.buckets.entry(hash).or_default();
        bucket.retain(|w| w.strong_count() > 0);
        for weak in bucket.iter() {
            if let Some(existing) = weak.upgrade() {
                if repr_eq(&existing.repr, &repr) {
                    return Type(existing);
                }
            }
        }
        let data = Rc::new(TypeData { repr, hash });
        bucket.push(Rc::downgrade(&data));
        Type(data)
    }

    // -- top/bottom and scalar singletons --------------------------------

    pub fn any(&mut self) -> Type {
        self.intern(Repr::Any)
    }
    pub fn all(&mut self) -> Type {
        self.intern(Repr::All)
    }
    pub fn ctrl(&mut self) -> Type {
        self.intern(Repr::Ctrl)
    }
    pub fn xctrl(&mut self) -> Type {
        self.intern(Repr::XCtrl)
    }
    pub fn nil(&mut self) -> Type {
        self.intern(Repr::Nil)
    }
    pub fn xnil(&mut self) -> Type {
        self.intern(Repr::XNil)
    }
    pub fn scalar(&mut self) -> Type {
        self.intern(Repr::Scalar)
    }

    // -- Int ---------------------------------------------------------------

    pub fn int_top(&mut self, size: u8) -> Type {
        self.intern(Repr::Int(IntData {
            size,
            con: None,
            high: true,
            nil: true,
        }))
    }

    pub fn int_bot(&mut self, size: u8) -> Type {
        self.intern(Repr::Int(IntData {
            size,
            con: None,
            high: false,
            nil: true,
        }))
    }

    pub fn int_con(&mut self, c: i64) -> Type {
        self.intern(Repr::Int(IntData {
            size: const_bit_size(c),
            con: Some(c),
            high: false,
            nil: true,
        }))
    }

    // -- Flt -----------------------------------------------------------------

    pub fn flt_con(&mut self, size: u8, v: f64) -> Type {
        self.intern(Repr::Flt(FltData {
            size,
            con: Some(v.to_bits()),
            high: false,
        }))
    }

    pub fn flt_bot(&mut self, size: u8) -> Type {
        self.intern(Repr::Flt(FltData {
            size,
            con: None,
            high: false,
        }))
    }

    // -- FunPtr / MemPtr / Mem / Struct / Tuple -------------------------------

    pub fn fun_ptr(&mut self, fidxs: BitsFun, nargs: u16, dsp: Type, ret: Type) -> Type {
        self.intern(Repr::FunPtr(FunPtrData {
            fidxs,
            nargs,
            dsp,
            ret,
        }))
    }

    pub fn mem_ptr(&mut self, aliases: BitsAlias, obj: Type) -> Type {
        self.intern(Repr::MemPtr(MemPtrData { aliases, obj }))
    }

    pub fn mem(&mut self, any: bool, aliases: Vec<(u32, Type)>) -> Type {
        self.intern(Repr::Mem(MemData { any, aliases }))
    }

    pub fn struct_ty(&mut self, name: impl Into<String>, fields: Vec<FieldDef>) -> Type {
        self.intern(Repr::Struct(StructData {
            name: name.into(),
            fields,
        }))
    }

    pub fn tuple(&mut self, items: Vec<Type>) -> Type {
        self.intern(Repr::Tuple(items))
    }

    // -- lattice operations ----------------------------------------------------

    /// Meet: greatest lower bound.
    pub fn meet(&mut self, a: &Type, b: &Type, bits: &mut BitsInterner<sea_core::AliasId>, fidx_bits: &mut BitsInterner<sea_core::FidxId>) -> Type {
        if a == b {
            return a.clone();
        }
        if a.is_any() {
            return b.clone();
        }
        if b.is_any() {
            return a.clone();
        }
        if a.is_all() || b.is_all() {
            return self.all();
        }
        match (&a.0.repr, &b.0.repr) {
            (Repr::Ctrl, Repr::XCtrl) | (Repr::XCtrl, Repr::Ctrl) => self.ctrl(),
            (Repr::Nil, Repr::XNil) | (Repr::XNil, Repr::Nil) => self.nil(),
            (Repr::Int(x), Repr::Int(y)) => self.intern(Repr::Int(meet_int(x, y))),
            (Repr::Flt(x), Repr::Flt(y)) => self.intern(Repr::Flt(meet_flt(x, y))),
            (Repr::FunPtr(x), Repr::FunPtr(y)) => {
                let fidxs = fidx_bits.meet(&x.fidxs, &y.fidxs).unwrap_or_else(|_| x.fidxs.clone());
                let dsp = self.meet(&x.dsp, &y.dsp, bits, fidx_bits);
                let ret = self.meet(&x.ret, &y.ret, bits, fidx_bits);
                let nargs = meet_nargs(x.nargs, x.dsp.above_center(), y.nargs, y.dsp.above_center());
                self.intern(Repr::FunPtr(FunPtrData {
                    fidxs,
                    nargs,
                    dsp,
                    ret,
                }))
            }
            (Repr::MemPtr(x), Repr::MemPtr(y)) => {
                let aliases = bits.meet(&x.aliases, &y.aliases).unwrap_or_else(|_| x.aliases.clone());
                let obj = self.meet(&x.obj, &y.obj, bits, fidx_bits);
                self.intern(Repr::MemPtr(MemPtrData { aliases, obj }))
            }
            (Repr::Mem(x), Repr::Mem(y)) => {
                let merged = meet_mem_slots(&x.aliases, &y.aliases, self, bits, fidx_bits);
                self.intern(Repr::Mem(MemData {
                    any: x.any && y.any,
                    aliases: merged,
                }))
            }
            (Repr::Struct(x), Repr::Struct(y)) if x.name == y.name && x.fields.len() == y.fields.len() => {
                let fields = x
                    .fields
                    .iter()
                    .zip(y.fields.iter())
                    .map(|(fx, fy)| FieldDef {
                        name: fx.name.clone(),
                        access: if matches!(fx.access, Access::ReadWrite) && matches!(fy.access, Access::ReadWrite) {
                            Access::ReadWrite
                        } else {
                            Access::Read
                        },
                        ty: self.meet(&fx.ty, &fy.ty, bits, fidx_bits),
                    })
                    .collect();
                self.intern(Repr::Struct(StructData {
                    name: x.name.clone(),
                    fields,
                }))
            }
            (Repr::Tuple(x), Repr::Tuple(y)) if x.len() == y.len() => {
                let items = x.iter().zip(y.iter()).map(|(ix, iy)| self.meet(ix, iy, bits, fidx_bits)).collect();
                self.intern(Repr::Tuple(items))
            }
            // Unrelated variant families meet at the bottom of the lattice.
            _ => self.all(),
        }
    }

    /// Join: least upper bound, `dual(meet(dual(a), dual(b)))`.
    pub fn join(&mut self, a: &Type, b: &Type, bits: &mut BitsInterner<sea_core::AliasId>, fidx_bits: &mut BitsInterner<sea_core::FidxId>) -> Type {
        let da = self.dual(a, bits, fidx_bits);
        let db = self.dual(b, bits, fidx_bits);
        let m = self.meet(&da, &db, bits, fidx_bits);
        self.dual(&m, bits, fidx_bits)
    }

    /// Dual: the lattice involution. Constants are self-dual; everything
    /// else flips its high/low polarity recursively. Cyclic struct/pointer
    /// graphs are handled via a per-call memo keyed by pointer identity
    ///.
    pub fn dual(&mut self, a: &Type, bits: &mut BitsInterner<sea_core::AliasId>, fidx_bits: &mut BitsInterner<sea_core::FidxId>) -> Type {
        let mut memo = HashMap::new();
        self.dual_memo(a, bits, fidx_bits, &mut memo)
    }

    fn dual_memo(
        &mut self,
        a: &Type,
        bits: &mut BitsInterner<sea_core::AliasId>,
        fidx_bits: &mut BitsInterner<sea_core::FidxId>,
        memo: &mut HashMap<usize, Type>,
    ) -> Type {
        let key = Rc::as_ptr(&a.0) as usize;
        if let Some(cached) = memo.get(&key) {
            return cached.clone();
        }
        let result = match &a.0.repr {
            Repr::Any => self.all(),
            Repr::All => self.any(),
            Repr::Ctrl => self.xctrl(),
            Repr::XCtrl => self.ctrl(),
            Repr::Nil => self.xnil(),
            Repr::XNil => self.nil(),
            Repr::Scalar => a.clone(),
            Repr::Int(d) if d.con.is_some() => a.clone(),
            Repr::Int(d) => self.intern(Repr::Int(IntData {
                size: d.size,
                con: None,
                high: !d.high,
                nil: d.nil,
            })),
            Repr::Flt(d) if d.con.is_some() => a.clone(),
            Repr::Flt(d) => self.intern(Repr::Flt(FltData {
                size: d.size,
                con: None,
                high: !d.high,
            })),
            Repr::FunPtr(d) => {
                let fidxs = fidx_bits.dual(&d.fidxs);
                let dsp = self.dual_memo(&d.dsp, bits, fidx_bits, memo);
                let ret = self.dual_memo(&d.ret, bits, fidx_bits, memo);
                self.intern(Repr::FunPtr(FunPtrData {
                    fidxs,
                    nargs: d.nargs,
                    dsp,
                    ret,
                }))
            }
            Repr::MemPtr(d) => {
                let aliases = bits.dual(&d.aliases);
                let obj = self.dual_memo(&d.obj, bits, fidx_bits, memo);
                self.intern(Repr::MemPtr(MemPtrData { aliases, obj }))
            }
            Repr::Mem(d) => {
                let aliases = d
                    .aliases
                    .iter()
                    .map(|(id, ty)| (*id, self.dual_memo(ty, bits, fidx_bits, memo)))
                    .collect();
                self.intern(Repr::Mem(MemData {
                    any: !d.any,
                    aliases,
                }))
            }
            Repr::Struct(d) => {
                let fields = d
                    .fields
                    .iter()
                    .map(|field| FieldDef {
                        name: field.name.clone(),
                        access: field.access,
                        ty: self.dual_memo(&field.ty, bits, fidx_bits, memo),
                    })
                    .collect();
                self.intern(Repr::Struct(StructData {
                    name: d.name.clone(),
                    fields,
                }))
            }
            Repr::Tuple(items) => {
                let items = items.iter().map(|t| self.dual_memo(t, bits, fidx_bits, memo)).collect();
                self.intern(Repr::Tuple(items))
            }
        };
        memo.insert(key, result.clone());
        result
    }
}

fn meet_int(a: &IntData, b: &IntData) -> IntData {
    let a_size = a.con.map(const_bit_size).unwrap_or(a.size);
    let b_size = b.con.map(const_bit_size).unwrap_or(b.size);
    let nil = a.nil && b.nil;

    // A constant meeting a compatible high (above-center) type absorbs into
    // the constant: the high side already represents "narrowing towards a
    // constant", so this case takes priority over the generic high-narrowing
    // rule below.
    if let Some(ac) = a.con {
        if b.high && b.con.is_none() && b.nil == a.nil && a_size <= b_size {
            return IntData {
                size: a_size,
                con: Some(ac),
                high: false,
                nil,
            };
        }
    }
    if let Some(bc) = b.con {
        if a.high && a.con.is_none() && a.nil == b.nil && b_size <= a_size {
            return IntData {
                size: b_size,
                con: Some(bc),
                high: false,
                nil,
            };
        }
    }
    if (a.high && a.con.is_none()) || (b.high && b.con.is_none()) {
        return IntData {
            size: a_size.min(b_size),
            con: None,
            high: true,
            nil,
        };
    }
    IntData {
        size: a_size.max(b_size),
        con: None,
        high: false,
        nil,
    }
}

fn meet_flt(a: &FltData, b: &FltData) -> FltData {
    if a.high && a.con.is_none() {
        return FltData {
            size: a.size.min(b.size),
            con: None,
            high: true,
        };
    }
    if b.high && b.con.is_none() {
        return FltData {
            size: a.size.min(b.size),
            con: None,
            high: true,
        };
    }
    if let Some(ac) = a.con {
        if b.high {
            return FltData {
                size: a.size,
                con: Some(ac),
                high: false,
            };
        }
    }
    if let Some(bc) = b.con {
        if a.high {
            return FltData {
                size: b.size,
                con: Some(bc),
                high: false,
            };
        }
    }
    FltData {
        size: a.size.max(b.size),
        con: None,
        high: false,
    }
}

/// "FunPtr meet FunPtr" nargs rule: a low function with fewer
/// args is "smaller"; if the shorter side is high, the longer nargs wins.
fn meet_nargs(a_nargs: u16, a_high: bool, b_nargs: u16, b_high: bool) -> u16 {
    if a_nargs == b_nargs {
        return a_nargs;
    }
    let (shorter, shorter_high, longer) = if a_nargs < b_nargs {
        (a_nargs, a_high, b_nargs)
    } else {
        (b_nargs, b_high, a_nargs)
    };
    if shorter_high {
        longer
    } else {
        shorter
    }
}

fn meet_mem_slots(
    a: &[(u32, Type)],
    b: &[(u32, Type)],
    interner: &mut TypeInterner,
    bits: &mut BitsInterner<sea_core::AliasId>,
    fidx_bits: &mut BitsInterner<sea_core::FidxId>,
) -> Vec<(u32, Type)> {
    let mut ids: Vec<u32> = a.iter().map(|(i, _)| *i).chain(b.iter().map(|(i, _)| *i)).collect();
    ids.sort_unstable();
    ids.dedup();
    let default_a = a.iter().find(|(i, _)| *i == 1).map(|(_, t)| t.clone());
    let default_b = b.iter().find(|(i, _)| *i == 1).map(|(_, t)| t.clone());
    ids.into_iter()
        .filter_map(|id| {
            let ta = a.iter().find(|(i, _)| *i == id).map(|(_, t)| t.clone()).or_else(|| default_a.clone());
            let tb = b.iter().find(|(i, _)| *i == id).map(|(_, t)| t.clone()).or_else(|| default_b.clone());
            match (ta, tb) {
                (Some(ta), Some(tb)) => Some((id, interner.meet(&ta, &tb, bits, fidx_bits))),
                _ => None,
            }
        })
        .collect()
}

fn content_hash(repr: &Repr) -> u64 {
    let mut h = DefaultHasher::new();
    hash_repr(repr, &mut h);
    h.finish()
}

fn hash_repr<H: Hasher>(repr: &Repr, h: &mut H) {
    match repr {
        Repr::Any => 0u8.hash(h),
        Repr::All => 1u8.hash(h),
        Repr::Ctrl => 2u8.hash(h),
        Repr::XCtrl => 3u8.hash(h),
        Repr::Nil => 4u8.hash(h),
        Repr::XNil => 5u8.hash(h),
        Repr::Scalar => 6u8.hash(h),
        Repr::Int(d) => {
            7u8.hash(h);
            d.size.hash(h);
            d.con.hash(h);
            d.high.hash(h);
            d.nil.hash(h);
        }
        Repr::Flt(d) => {
            8u8.hash(h);
            d.size.hash(h);
            d.con.hash(h);
            d.high.hash(h);
        }
        Repr::FunPtr(d) => {
            9u8.hash(h);
            d.fidxs.hash(h);
            d.nargs.hash(h);
            d.dsp.hash(h);
            d.ret.hash(h);
        }
        Repr::MemPtr(d) => {
            10u8.hash(h);
            d.aliases.hash(h);
            d.obj.hash(h);
        }
        Repr::Mem(d) => {
            11u8.hash(h);
            d.any.hash(h);
            for (id, ty) in &d.aliases {
                id.hash(h);
                ty.hash(h);
            }
        }
        Repr::Struct(d) => {
            12u8.hash(h);
            d.name.hash(h);
            for f in &d.fields {
                f.name.hash(h);
                (f.access as u8).hash(h);
                f.ty.hash(h);
            }
        }
        Repr::Tuple(items) => {
            13u8.hash(h);
            for t in items {
                t.hash(h);
            }
        }
    }
}

fn repr_eq(a: &Repr, b: &Repr) -> bool {
    match (a, b) {
        (Repr::Any, Repr::Any)
        | (Repr::All, Repr::All)
        | (Repr::Ctrl, Repr::Ctrl)
        | (Repr::XCtrl, Repr::XCtrl)
        | (Repr::Nil, Repr::Nil)
        | (Repr::XNil, Repr::XNil)
        | (Repr::Scalar, Repr::Scalar) => true,
        (Repr::Int(x), Repr::Int(y)) => x.size == y.size && x.con == y.con && x.high == y.high && x.nil == y.nil,
        (Repr::Flt(x), Repr::Flt(y)) => x.size == y.size && x.con == y.con && x.high == y.high,
        (Repr::FunPtr(x), Repr::FunPtr(y)) => {
            x.fidxs == y.fidxs && x.nargs == y.nargs && x.dsp == y.dsp && x.ret == y.ret
        }
        (Repr::MemPtr(x), Repr::MemPtr(y)) => x.aliases == y.aliases && x.obj == y.obj,
        (Repr::Mem(x), Repr::Mem(y)) => x.any == y.any && x.aliases == y.aliases,
        (Repr::Struct(x), Repr::Struct(y)) => {
            x.name == y.name
                && x.fields.len() == y.fields.len()
                && x.fields.iter().zip(y.fields.iter()).all(|(fx, fy)| {
                    fx.name == fy.name && fx.access as u8 == fy.access as u8 && fx.ty == fy.ty
                })
        }
        (Repr::Tuple(x), Repr::Tuple(y)) => x == y,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn harness() -> (TypeInterner, BitsInterner<sea_core::AliasId>, BitsInterner<sea_core::FidxId>) {
        (TypeInterner::new(), BitsInterner::new(), BitsInterner::new())
    }

    #[test]
    fn intern_identity() {
        let (mut t, _, _) = harness();
        let a = t.int_con(5);
        let b = t.int_con(5);
        assert_eq!(a, b);
    }

    #[test]
    fn any_is_top_all_is_bottom() {
        let (mut t, mut b, mut f) = harness();
        let any = t.any();
        let all = t.all();
        let five = t.int_con(5);
        assert_eq!(t.meet(&five, &any, &mut b, &mut f), five);
        assert_eq!(t.meet(&five, &all, &mut b, &mut f), all);
    }

    #[test]
    fn meet_is_idempotent_and_commutative() {
        let (mut t, mut b, mut f) = harness();
        let a = t.int_bot(32);
        let c = t.int_top(32);
        let m1 = t.meet(&a, &c, &mut b, &mut f);
        let m2 = t.meet(&c, &a, &mut b, &mut f);
        assert_eq!(m1, m2);
        let self_meet = t.meet(&a, &a, &mut b, &mut f);
        assert_eq!(self_meet, a);
    }

    #[test]
    fn dual_is_involution() {
        let (mut t, mut b, mut f) = harness();
        let bot32 = t.int_bot(32);
        let d1 = t.dual(&bot32, &mut b, &mut f);
        let d2 = t.dual(&d1, &mut b, &mut f);
        assert_eq!(d2, bot32);

        let any = t.any();
        let all = t.all();
        assert_eq!(t.dual(&any, &mut b, &mut f), all);
        assert_eq!(t.dual(&all, &mut b, &mut f), any);
    }

    #[test]
    fn join_matches_demorgan_definition() {
        let (mut t, mut b, mut f) = harness();
        let a = t.int_bot(16);
        let c = t.int_bot(32);
        let joined = t.join(&a, &c, &mut b, &mut f);
        let da = t.dual(&a, &mut b, &mut f);
        let dc = t.dual(&c, &mut b, &mut f);
        let met = t.meet(&da, &dc, &mut b, &mut f);
        let expected = t.dual(&met, &mut b, &mut f);
        assert_eq!(joined, expected);
    }

    #[test]
    fn int_constant_widens_to_high_with_compatible_size() {
        let (mut t, mut b, mut f) = harness();
        let con = t.int_con(5);
        let top8 = t.int_top(8);
        let m = t.meet(&con, &top8, &mut b, &mut f);
        assert_eq!(m, con, "a compatible high type must not destroy the constant");
    }

    #[test]
    fn unrelated_variants_meet_at_bottom() {
        let (mut t, mut b, mut f) = harness();
        let i = t.int_con(1);
        let fl = t.flt_con(64, 1.0);
        let all = t.all();
        assert_eq!(t.meet(&i, &fl, &mut b, &mut f), all);
    }

    #[test]
    fn struct_meet_is_fieldwise() {
        let (mut t, mut b, mut f) = harness();
        let x5 = t.int_con(5);
        let x9 = t.int_con(9);
        let xbot = t.int_bot(8);
        let s1 = t.struct_ty(
            "Point",
            vec![FieldDef {
                name: "x".into(),
                access: Access::Read,
                ty: x5,
            }],
        );
        let s2 = t.struct_ty(
            "Point",
            vec![FieldDef {
                name: "x".into(),
                access: Access::Read,
                ty: x9,
            }],
        );
        let m = t.meet(&s1, &s2, &mut b, &mut f);
        match &m.0.repr {
            Repr::Struct(d) => assert_eq!(d.fields[0].ty, xbot),
            other => panic!("expected struct, got {other:?}"),
        }
    }
}
