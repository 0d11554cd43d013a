//! Coverage-guided fuzzing: the test case corpus, the MPMC work queue,
//! interval-seeded generation, mutation, and the worker-pool orchestrator
//! (spec.md §4.9, §4.10, §4.11).

pub mod corpus;
pub mod mutate;
pub mod orchestrator;
pub mod seed;
pub mod workqueue;
