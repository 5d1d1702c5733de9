pub(crate) mod cluster;
pub(crate) mod proc;
pub(crate) mod reg_pool;
pub(crate) mod replay_queue;
pub(crate) mod rob;
pub(crate) mod stats;
