//! HTTP request handlers.
//!
//! This module contains all the endpoint handlers for the gateway API.

pub mod control;
pub mod health;
pub mod sensors;
pub mod system;
