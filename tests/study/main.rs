#![allow(clippy::cast_precision_loss)]

mod common;
mod concurrency;
mod export;
#[cfg(feature = "async")]
mod parallel;
mod persistence;
mod resume;
mod xval;
