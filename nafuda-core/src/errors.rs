//! エラー型とエラーメッセージ定数

use thiserror::Error;

/// ブレークポイントが見つからない場合のエラーメッセージ
pub const ERR_BREAKPOINT_NOT_FOUND: &str = "Breakpoint not found";

/// モジュールが読み込まれていない場合のエラーメッセージ
pub const ERR_NO_MODULES: &str = "No modules loaded";

/// リゾルバ構築時のエラー
///
/// 指定が不正なリゾルバは作らない。検索時に見つからないことはエラーではなく、
/// ロケーション0個のブレークポイントになる。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolverError {
    /// 空の名前・空の配列・空の正規表現など、成立しない指定
    #[error("Invalid breakpoint specification: {0}")]
    InvalidSpecification(String),
}

impl ResolverError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        ResolverError::InvalidSpecification(msg.into())
    }
}
