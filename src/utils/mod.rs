//! # 通用工具模块

pub mod crypto;

pub use crypto::{hash_key, mask_key};
