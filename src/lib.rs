//! OTLP exporter workspace - end-to-end tests for the export pipeline.
//!
//! This is a virtual package that provides workspace-level integration tests.
//! The actual functionality is provided by the workspace member crates:
//!
//! - `otlp-exporter-base`: export delegate, bounded queue, retrying and failover transports
//! - `otlp-exporter-http`: OTLP/HTTP protobuf transport, serializers and configuration
