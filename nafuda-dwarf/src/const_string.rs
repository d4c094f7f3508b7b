//! インターン化された文字列
//!
//! シンボル名は同じ文字列が何度も現れるため、プロセス全体で共有される
//! テーブルに一度だけ格納します。同じ内容の `ConstString` は同じポインタを
//! 指すので、比較はポインタ比較だけで済みます。

use lazy_static::lazy_static;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};

lazy_static! {
    /// プロセス全体の文字列テーブル（文字列はプロセス終了まで解放されない）
    static ref STRING_POOL: RwLock<HashSet<&'static str>> = RwLock::new(HashSet::new());
}

/// インターン化された不変文字列
#[derive(Clone, Copy)]
pub struct ConstString(&'static str);

impl ConstString {
    /// 文字列をインターン化する
    pub fn new(s: &str) -> Self {
        if s.is_empty() {
            return Self::empty();
        }

        // 大半は既に登録済みなので、まず読み取りロックで探す
        if let Some(interned) = STRING_POOL.read().get(s) {
            return Self(interned);
        }

        let mut pool = STRING_POOL.write();
        // ロックを取り直す間に他スレッドが登録している可能性がある
        if let Some(interned) = pool.get(s) {
            return Self(interned);
        }
        let leaked: &'static str = Box::leak(s.to_string().into_boxed_str());
        pool.insert(leaked);
        Self(leaked)
    }

    /// 空文字列
    pub const fn empty() -> Self {
        Self("")
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl PartialEq for ConstString {
    fn eq(&self, other: &Self) -> bool {
        // 空文字列はテーブルを経由しないため長さでも判定する
        (self.0.is_empty() && other.0.is_empty())
            || (std::ptr::eq(self.0.as_ptr(), other.0.as_ptr()) && self.0.len() == other.0.len())
    }
}

impl Eq for ConstString {}

impl Hash for ConstString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        if self.0.is_empty() {
            0usize.hash(state);
        } else {
            (self.0.as_ptr() as usize).hash(state);
        }
    }
}

impl PartialOrd for ConstString {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ConstString {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(other.0)
    }
}

impl Default for ConstString {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<&str> for ConstString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<&String> for ConstString {
    fn from(s: &String) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for ConstString {
    fn as_ref(&self) -> &str {
        self.0
    }
}

impl fmt::Display for ConstString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl fmt::Debug for ConstString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}
