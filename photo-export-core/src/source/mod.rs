//! Source adapters: where photo listings come from.

pub mod instagram;
pub mod vk;

pub use instagram::InstagramSource;
pub use vk::VkSource;
