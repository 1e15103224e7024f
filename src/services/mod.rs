// src/services/mod.rs
pub mod auth_service;
pub mod dispatch_service;
pub mod firestore_store;
pub mod messaging_service;
pub mod realtime_store;
pub mod recipient_service;
