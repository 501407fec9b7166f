//! `queue` crate — the durable job queue and its worker loop.
//!
//! `job_queue` is a plain Postgres table polled with `SELECT … FOR UPDATE
//! SKIP LOCKED` (see `db::repository::jobs`); this crate owns the polling
//! loop and the envelope that tells a worker which `Interpreter` entry
//! point to call for a given row.

pub mod error;
pub mod worker;

pub use error::QueueError;
pub use worker::{enqueue_resume, enqueue_signal, enqueue_start, Worker};
