#![allow(dead_code)]

pub mod register_testkit;
