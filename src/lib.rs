// Copyright 2025 Chisomo Makombo Sakala
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Labberize
//!
//! `labberize` turns the node tree of a measurement instrument into a driver
//! configuration for the Labber measurement platform. Every node becomes a
//! quantity; a settings document then hides, reshapes, extends and adds
//! quantities per device family.
//!
//! This crate contains the main library logic for the `labberize` CLI, but
//! the generation engine (`node`, `quant`, `generator`, `settings`,
//! `labber_config`) performs no I/O and can be used on its own.
//!
//! ## Core Modules
//!
//! * [`labber_config`]: The `LabberConfig` pipeline that produces a
//!   `LabberDriver` from nodes and a settings document.
//! * [`settings`]: Loads the settings document and folds the `common` and
//!   family levels into a `LabberConfiguration`.
//! * [`generator`]: Expands wildcard templates against the device's nodes.
//! * [`quant`]: Quantity definitions, built from nodes (`NodeQuant`) or from
//!   the settings document alone (`Quant`).
//! * [`node`]: Node records and the `NodeProvider` trait.
//! * [`helpers`]: Path, tooltip and glob utilities.
//! * [`export`]: INI/JSON rendering and the files written per device.
//! * [`cli`]: Defines the `clap`-based command-line interface.
//! * [`config`]: Layers defaults, `labberize.toml`, environment and flags.
//! * [`error`]: Defines the custom error types for the library.
//! * [`logging`]: Provides the `setup_tracing` utility.

pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod generator;
pub mod helpers;
pub mod labber_config;
pub mod logging;
pub mod node;
pub mod quant;
pub mod settings;
