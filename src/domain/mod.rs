// Domain layer: remote item model and the ports between the adapter, the
// remote store client and the backup engine.

pub mod model;
pub mod ports;
