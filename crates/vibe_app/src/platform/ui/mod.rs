//! Terminal surface: command parsing, side panels and text rendering.
pub mod commands;
pub mod panels;
pub mod render;
