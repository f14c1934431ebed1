//! HTTP request handlers.
//!
//! This module contains all HTTP handlers organized by domain.

pub mod login_link;
