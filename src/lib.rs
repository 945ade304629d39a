//! `copykit`:
//! Synchronous file and directory copy utilities.
//!
//! Single-file copy runs same-file detection, then a hardlink fast path, then
//! falls back to a full content copy plus metadata propagation. Tree copy
//! consumes an ordered list of heterogeneous sources (file, byte buffer,
//! reader, directory) and reports the index of the first failing source.
//!
//! - `copy` : single-file copy and content-write primitives
//! - `tree` : copy sources and tree orchestration
//! - `spec` : options, destination spec and error types
//! - `util` : shared helper functions

pub mod copy;
pub mod spec;
pub mod tree;
mod util;

pub use copy::{
    copy_bytes, copy_file, copy_file_contents, copy_reader, copy_reader_with_stat, create_file,
    create_file_preserved, set_file_info,
};
pub use spec::{CopyError, EnumIgnorePatternMode, SpecDestination, SpecWriteOptions};
pub use tree::{
    Copier, IgnorePredicate, Sourcer, SrcBytes, SrcDir, SrcFile, SrcReader,
    compile_ignore_predicate, copy_tree,
};
