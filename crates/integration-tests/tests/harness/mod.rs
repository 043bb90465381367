#![allow(dead_code)]

pub mod config;
pub mod listener;
pub mod mock_backend;
