//! # CLI Module
//!
//! ## Commands
//!
//! ### `serve`
//!
//! Start the configured front-end, then serve `/manage-traffic`:
//!
//! ```bash
//! ARGOROLLOUTS_URL=https://rollouts.internal \
//! ARGOROLLOUTS_TOKEN=... \
//! PROXY_OPTION=reverse-proxy \
//! rollgate serve --addr 0.0.0.0:8080
//! ```
//!
//! Every flag has an environment fallback (see `rollgate serve --help`). An
//! unknown `PROXY_OPTION` or missing Argo Rollouts credentials end the process
//! with a non-zero status before the listener is bound.
//!
//! ### `applications`
//!
//! Print the names of the applications Argo CD knows about, one per line:
//!
//! ```bash
//! ARGOCD_URL=https://argocd.internal ARGOCD_TOKEN=... rollgate applications
//! ```

mod commands;


pub use commands::{run_cli, serve, ApplicationsArgs, Cli, Commands, ServeArgs};
