pub mod lattice;

pub use lattice::{
    Access, FieldDef, FltData, FunPtrData, IntData, MemData, MemPtrData, StructData, Type,
    TypeInterner,
};
