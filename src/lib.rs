//! Winman - window positioning command server
//!
//! This library provides a small TCP server that lets a local caller move,
//! resize and focus the windows of running applications, addressed by
//! process id and optionally by window title.
//!
//! ## Protocol
//!
//! One request per connection: an ignored header section, `\r\n\r\n`, and a
//! JSON body naming the command:
//!
//! - `{"command":"setPosition","pid":..,"x":..,"y":..,"width":..,"height":..}`
//!   with optional `frontmostOnly` and `title`
//! - `{"command":"focus","pid":..,"title":..}`
//!
//! The reply is a bodiless `HTTP/1.1` status line: 200, 400 or 500.
//!
//! ## Supported Environments
//!
//! - X11 (native)
//! - XWayland (KDE Plasma on Wayland, raising through KWin)

pub mod backend;
pub mod config;
pub mod core;
pub mod server;
