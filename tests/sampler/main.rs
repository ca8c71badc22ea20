#![allow(clippy::cast_precision_loss)]

mod random;
mod tpe;
