//! Audio-synchronized lighting for multi-zone light arrays.

pub mod analysis;
pub mod clock;
pub mod config;
pub mod device;
pub mod effects;
pub mod fade;
pub mod feed;
pub mod geometry;
pub mod host;
pub mod keys;
pub mod model;
pub mod refresh;
pub mod sacn_output;
pub mod service;
pub mod tracker;
