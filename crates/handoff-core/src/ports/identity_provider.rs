//! IdentityProvider port - 現在の identity を返すだけ
//!
//! 認証そのものは行いません。core は値を観測するだけです。

use crate::domain::Identity;

pub trait IdentityProvider: Send + Sync {
    fn current(&self) -> Identity;
}
