pub mod result;
pub mod candidate;
pub mod signaling;
pub mod credentials;
pub mod report;
pub mod stun;
