//! App - アプリケーション層
//!
//! ports と queue を組み合わせて使いやすくする部品です。
//!
//! # 主要コンポーネント
//! - **QueueBuilder**: キューの構築とワイヤリング
//! - **EntityRouter**: entity ごとの executor 振り分け
//! - **SyncLoop**: バックグラウンド drain

pub mod builder;
pub mod router;
pub mod sync_loop;

pub use self::builder::{BuildError, QueueBuilder};
pub use self::router::{EntityRouter, RouterError};
pub use self::sync_loop::SyncLoop;
