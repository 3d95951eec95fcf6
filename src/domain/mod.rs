pub mod cdc;
pub mod constants;
pub mod crypto;
pub mod document; // normalized field mapping consumed by the DE builder
pub mod response;
pub mod submission;
pub mod types;
pub mod verification;
pub mod xml;
