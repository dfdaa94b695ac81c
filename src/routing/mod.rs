pub mod astar;
pub mod offline;
pub mod reroute;
