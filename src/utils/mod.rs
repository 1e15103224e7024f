pub mod firestore;
pub mod id_generator;
