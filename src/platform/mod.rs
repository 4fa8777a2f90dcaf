//! Remote platform client

pub mod wechat_api;

pub use wechat_api::WeChatApi;
