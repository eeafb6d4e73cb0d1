//! Structured intermediate representation
//!
//! The front end translates each validated function body into a flat list of
//! [`Operation`]s in which WebAssembly's nested blocks have already been
//! resolved into [`Label`] definitions and branches that name them. Locals
//! live on the operand stack and are addressed by depth (`Pick`/`Swap`), so
//! there are no local instructions. This is the input to
//! [`crate::runtime::translator`].

pub mod operation;

pub use operation::{
    BranchTarget, BranchTargetDrop, Float, InclusiveRange, Label, LabelKind, MemoryArg, Operation, SignedInt,
    SignedType, UnsignedInt, UnsignedType,
};
