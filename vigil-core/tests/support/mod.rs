#![allow(dead_code)]

pub mod bus;
pub mod inspection;
pub mod runtime;
