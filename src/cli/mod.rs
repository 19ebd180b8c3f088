//! CLI command implementations.
//!
//! | Module   | Commands handled |
//! |----------|------------------|
//! | `run`    | `Run`            |
//! | `stages` | `Stages`         |

pub mod run;
pub mod stages;
