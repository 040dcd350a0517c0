//! # Tasklet Module
//!
//! This module provides the tasklets of the crate. Tasklets are single-task
//! operations run by a [`TaskletStep`](crate::core::step::TaskletStep).

/// Line ending conversion of files and folders
pub mod dos_to_unix;

/// Resolution of source folders into files
pub mod listing;
