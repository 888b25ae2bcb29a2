pub mod bridge;
pub mod client;
pub mod coordinator;
pub mod manager;

#[cfg(test)]
pub mod testutil;
