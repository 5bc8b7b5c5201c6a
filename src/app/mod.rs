// Application layer: turns a finished run into human and machine readable output.

pub mod report;
