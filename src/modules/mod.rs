pub mod datafield;
pub mod logsevents;
pub mod transactions;
