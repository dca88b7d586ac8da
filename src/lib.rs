#![doc = include_str!("../README.md")]

mod error;
pub use error::*;

mod bridge;
pub use bridge::*;

mod context;
pub use context::*;

mod descriptor;
pub use descriptor::*;

mod outcome;
pub use outcome::*;

mod timeout;
pub use timeout::*;

pub mod addr;
pub mod foreign;
pub mod nonblock;
pub mod poller;
pub mod random;
pub mod reactor;
pub mod syscall;
pub mod task;

mod timewheel;

pub use nonblock::make_listening;
pub use syscall::{Accepted, Received};
