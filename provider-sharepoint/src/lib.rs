//! # SharePoint Provider
//!
//! Team-site document libraries over the shared Graph request pipeline.
//! Each site exposes the same drive operations as OneDrive, rooted at
//! `/sites/{site}/drive`; the tenant root site is used when no site is given.

pub mod client;

pub use client::{SharepointClient, DEFAULT_SITE_ID, SHAREPOINT_SUBSCRIPTION_RESOURCE, SYSTEM_SITES};
