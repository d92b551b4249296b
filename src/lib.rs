//! Encoding of a small process calculus into port graphs, and exploration
//! of the states a process can reach by graph rewriting.
//!
//! ```
//! use epim::{ExploreConfig, Process, RecursiveProcessTable, ReductionEngine};
//!
//! let p = Process::new().input("x", "z")?.output("z", "w")?
//!     | Process::new().output("x", "y")?;
//! let table = RecursiveProcessTable::new();
//! let dg = ReductionEngine::new(&p, &table, ExploreConfig::default())?.calc()?;
//! assert_eq!(dg.transition_count(), 1);
//! # Ok::<(), epim::Error>(())
//! ```

pub mod engine;
pub mod render;

mod decode;
mod derivation;
mod encode;
mod error;
mod gadgets;
mod normalize;
mod port_graph;
mod recursive;
mod reduction;
mod term;

pub use decode::decode;
pub use derivation::{DerivationGraph, State, StateId, Transition, TransitionKind};
pub use encode::{Encoder, FreshNameAllocator, Scope, encode, encode_ports, externalize};
pub use engine::{Graph, Label, Rule};
pub use error::{Error, Result};
pub use normalize::{DEFAULT_STEP_BUDGET, Normalizer};
pub use port_graph::{PortGraph, PortId};
pub use recursive::RecursiveProcessTable;
pub use reduction::{ExploreConfig, ReductionEngine};
pub use term::{Definition, Name, Process, Program, Term, names, parse_program};
