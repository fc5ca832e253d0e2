// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod ansi;
pub mod args;
pub mod config;
pub mod detect;
pub mod driver;
pub mod locate;
pub mod pending;
pub mod pty;
pub mod server;
pub mod store;
