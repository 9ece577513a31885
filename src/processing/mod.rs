pub mod assembler;
pub mod consensus;
pub mod detectors;
pub mod envelope;
pub mod filters;
pub mod interpolate;
pub mod intervals;
pub mod pipeline;
pub mod table;
