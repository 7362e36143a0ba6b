//! Interchange with external ML frameworks.
//!
//! Each submodule carries the fitted-estimator descriptions of one source
//! framework together with its importer, exporter, and native reference
//! prediction routines.

pub mod sklearn;
