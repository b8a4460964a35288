//! File boundary: serialization of run artifacts.

pub mod export;
