//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryStorage**: テスト・開発用（障害注入つき）
//! - **FileStorage**: ディレクトリ上のファイルに保存
//! - **FnExecutor**: async クロージャを executor として使う

pub mod file_storage;
pub mod fn_executor;
pub mod memory_storage;

pub use self::file_storage::FileStorage;
pub use self::fn_executor::{FnExecutor, executor_fn};
pub use self::memory_storage::InMemoryStorage;
