#![allow(dead_code)]

pub mod audio;
pub mod config;
pub mod mock_provider;
pub mod server;
