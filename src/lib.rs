//! An interactive job-control shell.
//!
//! A line is split into `;` segments and `&` units; each unit is then a
//! pipeline, a redirected command, a user function, a builtin or an external
//! program. External programs are started with `fork`/`execvp`, either waited
//! on in the foreground or registered in the [`jobs::JobTable`] as background
//! jobs. Signals are recorded asynchronously and acted upon by the main loop
//! (see [`signals`]).
//!
//! The main entry point is [`Shell`].

mod builtin;
pub mod command;
pub mod config;
pub mod env;
pub mod errors;
mod external;
pub mod history;
mod interpreter;
mod io_adapters;
pub mod jobs;
pub mod lexer;
pub mod logging;
pub mod parser;
mod pipeline;
pub mod rc;
pub mod signals;
pub mod tools;

pub use config::ShellConfig;
pub use errors::{Result, ShellError};
pub use interpreter::Shell;
