pub mod client;
pub mod filters;
mod facade;
mod records;
pub mod types;

#[cfg(test)]
mod testing;

pub use client::DirectoryClient;
pub use facade::Directory;
pub use filters::ALL;
pub use types::{Restaurant, Review};
