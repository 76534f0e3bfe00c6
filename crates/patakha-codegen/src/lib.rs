//! Code generation for the Patakha compiler: the three-address IR, the
//! AST-to-IR lowerer, the CFG-based optimizer, a reference interpreter,
//! and the two backends (portable C source and stack-machine assembly).
//!
//! The pipeline owns the ordering: [`lower::lower_program`] on a clean
//! semantic analysis, [`opt::optimize_program`] on the result, then either
//! [`c::emit`] or [`stack::emit`]. The `.raw.ir` artifact is the program
//! before optimization and `.ir` the program after.

pub mod c;
pub mod cfg;
pub mod interp;
pub mod ir;
pub mod lower;
pub mod opt;
pub mod stack;

pub use cfg::{dump_cfg, dump_cfg_dot, Cfg};
pub use ir::{dump_function, dump_program, Program};
pub use lower::lower_program;
pub use opt::{optimize_function, optimize_program};
