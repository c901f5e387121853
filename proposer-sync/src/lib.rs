pub mod block;
pub mod bridge;
pub mod cfg;
pub mod codec;
pub mod crypto;
pub mod db;
pub mod engine;
pub mod error;
pub mod fork;
pub mod session;
pub mod summary;
#[cfg(any(test, feature = "test_util"))]
pub mod test_util;
pub mod translate;
