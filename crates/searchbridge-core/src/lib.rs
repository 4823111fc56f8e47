#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod document;
pub mod error;
pub mod filter;
pub mod request;
pub mod response;
pub mod traits;
