// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod config;
pub mod errors;
pub mod telemetry;
pub mod events;
pub mod table;
pub mod network;
pub mod sync;
pub mod flusher;
pub mod api;
pub mod server;
