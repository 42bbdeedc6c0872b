// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Publish HOWTO branches.
//!
//! A HOWTO is a worked example kept as a patch against a base branch. This
//! crate turns each `<name>.diff` in a patch directory into a remote branch
//! `<name>` that holds the base branch with that patch applied, and removes
//! remote HOWTO branches whose patch no longer exists.
//!
//! # See Also
//!
//! 1. [`publish::Publisher`]
//! 2. [`config::PublishDefinition`]

pub mod config;
pub mod credential;
pub mod patch;
pub mod publish;
pub mod vcs;
