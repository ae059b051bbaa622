//! Request-and-stream orchestration kernel for a browser-extension chat
//! assistant.
//!
//! Mediates every chat/streaming request between an untrusted UI and three
//! LLM providers (DeepSeek, OpenAI, Anthropic) through six collaborating
//! components : a [`credential_vault`], a [`policy_gate`], a
//! [`provider_registry`], a [`storage_engine`], a [`dispatcher`] that wires
//! the other three together for one-shot exchanges, and a
//! [`stream_controller`] that manages long-lived streaming sessions on top
//! of the same dispatch steps. [`Kernel`] composes all six behind one handle.
//!
//! ```no_run
//! # async fn example() -> deepweb_kernel::error::Result< () >
//! # {
//! use deepweb_kernel::Kernel;
//! use deepweb_kernel::config::KernelConfig;
//!
//! let kernel = Kernel::new( KernelConfig::default() ).await?;
//! # let _ = kernel;
//! # Ok( () )
//! # }
//! ```

#![ cfg_attr( doc, doc = include_str!( concat!( env!( "CARGO_MANIFEST_DIR" ), "/", "readme.md" ) ) ) ]
#![ doc( html_root_url = "https://docs.rs/deepweb_kernel/latest/deepweb_kernel/" ) ]

#[ cfg( feature = "enabled" ) ]
use mod_interface::mod_interface;

mod private {}

#[ cfg( feature = "enabled" ) ]
crate::mod_interface!
{
  layer error;
  layer config;
  layer credential_vault;
  layer policy_gate;
  layer provider_registry;
  layer storage_engine;
  layer dispatcher;
  layer stream_controller;
  layer export_import;
  layer interfaces;
  layer kernel;
}
