mod block_sink;
pub mod monitor;
pub mod shared;
