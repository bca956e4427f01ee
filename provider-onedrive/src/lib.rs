//! # OneDrive Provider
//!
//! Personal drive client over the shared Graph request pipeline.
//!
//! ## Overview
//!
//! This module provides:
//! - File, folder, preview and upload calls under `/me/drive`
//! - Sharing by email and anonymous link, and revoking either
//! - Delta sync bound to `/me/drive/root/delta`
//! - Webhook subscriptions on the drive root

pub mod client;

pub use client::{OneDriveClient, ONEDRIVE_SUBSCRIPTION_RESOURCE};
