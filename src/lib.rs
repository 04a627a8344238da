//! A primordial-soup simulator: a population of randomly initialized bytes
//! interpreted as self-replicating BFF (two-head Brainfuck) programs,
//! under repeated random pairwise execution.
//!
//! Three layers compose bottom-up: [`interpreter`] (the stateless BFF
//! executor), [`soup`] (region/pair selection, splicing, write-back,
//! mutation), and [`pool`] (parallel dispatch across workers sharing the
//! soup buffer). [`driver`] is the thin glue a CLI or test harness drives.

pub mod config;
pub mod driver;
pub mod error;
pub mod interpreter;
pub mod observability;
pub mod pool;
pub mod soup;
