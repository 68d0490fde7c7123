pub mod config;
pub mod error;
pub mod inference;
pub mod routes;
pub mod state;
pub mod training;

#[cfg(test)]
mod test_support;
