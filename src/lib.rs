//! Catalog manager for embeddable mini tools, with an on-demand zip-backed
//! virtual file server for uploaded React build archives.

pub mod catalog;
pub mod storage;
pub mod vfs;
pub mod web;

/// URL prefix under which uploaded React apps are mounted.
pub const MOUNT_PREFIX: &str = "/mini-tools-react";
