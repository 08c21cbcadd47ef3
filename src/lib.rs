pub mod config;
pub mod error;
pub mod feed;
pub mod logger;
pub mod new_post;
pub mod post;
pub mod post_list;
pub mod store;
pub mod sync;
pub mod text_utils;
#[cfg(test)]
mod test_data;
