//! Analysis core of a 16-bit 8086 DOS decompiler.
//!
//! Given a raw code image with relocation metadata and a set of entry
//! points, the core produces, for each discovered procedure, a validated
//! low-level intermediate representation plus a reducible control-flow
//! graph suitable for high-level structuring: a table-driven instruction
//! decoder, a basic-block builder and simplifier, an inter-procedural call
//! tree, and register/stack argument recovery.

pub mod args;
pub mod bundle;
pub mod callgraph;
pub mod cfg;
pub mod consts;
pub mod error;
pub mod frame;
pub mod function;
pub mod icode;
pub mod image;
pub mod machine;
pub mod opcode;
pub mod scan;

pub mod prelude {
    //! Convenience re-exports of the public surface.

    pub use crate::args::adjust_act_arg_type;
    pub use crate::bundle::{indent_str, Bundle};
    pub use crate::callgraph::CallGraph;
    pub use crate::cfg::{BasicBlock, BbId, Edge, NodeKind};
    pub use crate::error::{FatalError, ScanError, ScanWarning};
    pub use crate::frame::{
        BinOp, Expr, HlType, IdKind, Ident, LocalIdTable, LocalIdx, MacroTag, StackFrame, StkSym,
    };
    pub use crate::function::{FuncFlags, FuncId, Function, Program};
    pub use crate::icode::{DefUse, HlIcode, Icode, IcodeBuf, LlFlags, LlOperand};
    pub use crate::image::{DataSym, Image, ImageKind};
    pub use crate::machine::{CondFlags, IndexMode, MachineState, Register, RegisterSet};
    pub use crate::opcode::{Opcode, RepKind};
    pub use crate::scan::{scan, Scanned};
}
