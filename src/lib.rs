pub mod app;
pub mod error;
pub mod net;
pub mod sched;
pub mod sim;
pub mod topo;

#[cfg(test)]
mod test;
