// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// Test code is allowed to unwrap and panic
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Flowdeploy
//!
//! Reconciles locally declared Prefect deployments with the control plane and
//! reports what changed.
//!
//! ## Overview
//!
//! Each run reads a declarative deploy file and, for every deployment in it:
//!
//! - Fetches the deployment currently registered on the Prefect server
//! - Merges parameters, schedules, and tags according to the CLI flags
//! - Pushes every merged deployment in one batch
//! - Fetches each deployment again and reports the changes
//!
//! Fields without a flag keep the server's value, so schedules toggled or
//! parameters tweaked in the UI survive a redeploy.
//!
//! ## Modules
//!
//! - [`config`]: Deploy file parsing, validation, and entrypoint resolution
//! - [`prefect`]: Prefect API client and deployment records
//! - [`repo`]: Repository root detection and working tree checks
//! - [`planner`]: Field merging and change reports
//! - [`reconciler`]: The deploy sequence
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! flow:
//!   name: etl
//!   module: flow.py
//!   function: main
//! work_pool: default-pool
//! deployments:
//!   - name: nightly
//!     version: 1.0.0
//!     schedules:
//!       - cron: "0 2 * * *"
//!         timezone: America/Chicago
//!     tags: [etl]
//!     parameters:
//!       dir: /data
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod error;
pub mod planner;
pub mod prefect;
pub mod reconciler;
pub mod repo;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, DeployConfig, DeploymentSpec};
pub use error::{FlowdeployError, Result};
pub use planner::{DeploymentReport, MergeField, MergeOptions, merge, render_diff};
pub use prefect::{ControlPlane, DeploymentName, PrefectClient, RemoteDeployment};
pub use reconciler::{DeployOutcome, DeploymentResult, Reconciler};
pub use repo::{RepoContext, WorkingTree};
