// Worker binary library
//
// Wires the durable worker primitives to the HTTP transport and the
// environment: configuration, logging, the signed service client, the
// sample activities and the workflow starter.

pub mod activities;
pub mod client;
pub mod config;
pub mod signing;
pub mod starter;
pub mod telemetry;

pub use activities::{create_executor, TitleActivity};
pub use client::SwfHttpClient;
pub use config::WorkerConfig;
pub use signing::{AwsCredentials, SigV4Signer};
pub use starter::{start_workflow, StartedWorkflow};
