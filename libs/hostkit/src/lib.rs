//! # HostKit - Web-Module Test Harness Core
//!
//! Building blocks for running browser-based tests against compiled web
//! modules:
//!
//! - **Descriptors**: locate a module's XML descriptor across search roots
//!   and resolve its effective (possibly renamed) output name.
//! - **Host pages**: guarantee every module has a browser-loadable HTML
//!   host page, generated once and never overwritten.
//! - **Static server**: a lifecycle-managed static-file HTTP server with a
//!   one-shot readiness gate and idempotent shutdown.
//!
//! The materializer and the server are independent; an orchestrator (CLI,
//! build step) sequences them: ensure host pages, start the server, run
//! browser tests, close the server.
//!
//! ```rust,ignore
//! use hostkit::{ensure_host_pages, HostPagePlan, StaticServer};
//!
//! let plan = HostPagePlan::new(modules, search_roots, out_dir);
//! ensure_host_pages(&plan)?;
//!
//! let server = StaticServer::new(8080, out_dir);
//! server.start(Duration::from_secs(30)).await?;
//! // ... run tests against http://127.0.0.1:8080/ ...
//! server.close();
//! ```

pub mod descriptor;
pub mod hostpage;
pub mod lifecycle;
pub mod server;

pub use descriptor::{DescriptorError, ModuleDescriptor};
pub use hostpage::{ensure_host_pages, HostPage, HostPageError, HostPagePlan};
pub use lifecycle::{ReadySignal, SessionState};
pub use server::{ServerError, StaticServer};
