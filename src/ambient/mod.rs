//! Things the sign does regardless of which plugin is active.

pub mod dim;
pub mod messages;
