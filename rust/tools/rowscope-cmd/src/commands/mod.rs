//! Command implementations for rowscope-cmd

pub mod view;
