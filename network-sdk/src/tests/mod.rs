//! Unit tests for the Network SDK
//!
//! This module contains tests for the pipeline engine and its collaborators.

pub mod support;

pub mod event_tests;
pub mod interceptor_tests;
