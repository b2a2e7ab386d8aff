#![deny(clippy::all)]

//! Shared, deduplicated, immutable strings.
//!
//! # What is a shared string?
//!
//! Imagine your program holds lots of string values, mostly the same
//! few contents repeated, and never mutates them. Storing each one in
//! its own `String` wastes memory on identical text and makes equality
//! checks walk the bytes every time.
//!
//! A shared string stores exactly one physical copy per distinct
//! content. Every [`SharedStr`] holding equal content points at the
//! same canonical record, records are reference counted, and a record
//! is reclaimed the moment the last handle bound to it goes away.
//! Copies bump a count instead of allocating, and equal handles can be
//! recognized by pointer identity.
//!
//! Records live in a [`StrPool`]. Pools are explicit values so tests
//! can use isolated, disposable pools; a lazily created process wide
//! pool backs the `From` constructors for everyday use. The empty
//! string is special cased: empty handles bind to nothing, so building
//! them costs no lock, no lookup and no allocation.
//!
//! ## Example
//! ```
//! use strand_core::StrPool;
//!
//! let pool = StrPool::new();
//!
//! let first = pool.intern("only stored once");
//! let second = pool.intern("only stored once");
//!
//! assert!(first.ptr_eq(&second));
//! assert_eq!(pool.len(), 1);
//!
//! drop(first);
//! drop(second);
//!
//! assert_eq!(pool.len(), 0);
//! assert_eq!(pool.allocated(), 0);
//! ```

mod pool;
mod record;
mod shared_str;
mod utils;

pub use pool::StrPool;
pub use shared_str::SharedStr;
