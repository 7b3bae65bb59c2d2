//! Unit tests for the mirror module.

mod upload;
