pub mod config;
pub mod control;
pub mod link;
pub mod listener;
pub mod sizing;
pub mod wire;

#[cfg(test)]
mod test;
