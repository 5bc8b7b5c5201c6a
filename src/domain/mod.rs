// Domain layer: data model, run report and ports. No filesystem access here.

pub mod model;
pub mod ports;
pub mod report;
