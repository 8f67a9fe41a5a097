//! Ports - 抽象化レイヤー
//!
//! キューの境界を越える協調者（ストレージ、executor）と、テストで差し替えたい
//! もの（時刻、ID 生成）を trait として定義します。

pub mod clock;
pub mod executor;
pub mod id_generator;
pub mod storage;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::executor::OperationExecutor;
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::storage::StorageAdapter;
