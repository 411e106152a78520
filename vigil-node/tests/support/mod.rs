#![allow(dead_code)]

pub mod rpc;
