pub mod api;
pub mod cache;
pub mod config;
pub mod feed;
pub mod form;
pub mod viewer;

#[cfg(test)]
mod tests;
