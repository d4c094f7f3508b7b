//! 関数名の種別と名前の分解
//!
//! 1つの関数は複数の形で検索できる。完全名（`ns::Class::method(int)`）、
//! 基底名（`method`）、Objective-Cのセレクタ（`bar:`）、マングル名（`_ZN...`）。
//! ここではそれぞれの形を取り出す関数と、検索後の名前照合を提供する。

use crate::LanguageType;
use bitflags::bitflags;

bitflags! {
    /// 検索対象とする関数名の種別
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FunctionNameType: u32 {
        /// 名前の形から種別を自動判定する
        const AUTO     = 1 << 0;
        /// 完全名（引数リストを除いた修飾名）
        const FULL     = 1 << 1;
        /// 基底名（最後の `::` 以降）
        const BASE     = 1 << 2;
        /// Objective-Cのセレクタ
        const SELECTOR = 1 << 3;
        /// マングル名
        const MANGLED  = 1 << 4;
        /// インデックスが持つすべての種別
        const INDEXED  = Self::FULL.bits() | Self::BASE.bits() | Self::SELECTOR.bits() | Self::MANGLED.bits();
    }
}

impl FunctionNameType {
    /// 表示用の名前を列挙する
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if self.contains(Self::AUTO) {
            parts.push("auto");
        }
        if self.contains(Self::FULL) {
            parts.push("full");
        }
        if self.contains(Self::BASE) {
            parts.push("base");
        }
        if self.contains(Self::SELECTOR) {
            parts.push("selector");
        }
        if self.contains(Self::MANGLED) {
            parts.push("mangled");
        }
        if parts.is_empty() {
            return "none".to_string();
        }
        parts.join("|")
    }
}

/// Objective-Cのメソッド名（`-[Class(Category) selector]`）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjCMethodName<'a> {
    /// `+` ならクラスメソッド、`-` ならインスタンスメソッド、省略時はNone
    pub is_class_method: Option<bool>,
    pub class_name: &'a str,
    pub category: Option<&'a str>,
    pub selector: &'a str,
}

impl<'a> ObjCMethodName<'a> {
    /// `[-+]?[Class(Category)? selector]` 形式をパースする
    pub fn parse(name: &'a str) -> Option<Self> {
        let (is_class_method, rest) = match name.as_bytes().first()? {
            b'+' => (Some(true), &name[1..]),
            b'-' => (Some(false), &name[1..]),
            _ => (None, name),
        };

        let inner = rest.strip_prefix('[')?.strip_suffix(']')?;
        let (class_part, selector) = inner.split_once(' ')?;
        let selector = selector.trim();
        if class_part.is_empty() || selector.is_empty() || selector.contains(' ') {
            return None;
        }

        let (class_name, category) = match class_part.split_once('(') {
            Some((class, cat)) => (class, Some(cat.strip_suffix(')')?)),
            None => (class_part, None),
        };
        if class_name.is_empty() {
            return None;
        }

        Some(Self {
            is_class_method,
            class_name,
            category,
            selector,
        })
    }

    /// カテゴリと `+`/`-` を除いた `[Class selector]` 形式
    pub fn class_and_selector(&self) -> String {
        format_class_selector(self.class_name, self.selector)
    }
}

/// クラス名とセレクタから検索用の `[Class selector]` 形式を作る
pub fn format_class_selector(class_name: &str, selector: &str) -> String {
    format!("[{} {}]", class_name, selector)
}

/// 末尾の引数リストと修飾子を取り除く
///
/// 例: `ns::Foo::bar(int) const` -> `ns::Foo::bar`
pub fn strip_arguments(name: &str) -> &str {
    // Objective-Cのカテゴリ `(Category)` は引数リストではない
    if name.ends_with(']') {
        return name;
    }

    let mut angle_depth = 0usize;
    for (i, c) in name.char_indices() {
        match c {
            '<' => angle_depth += 1,
            '>' => angle_depth = angle_depth.saturating_sub(1),
            '(' if angle_depth == 0 && i > 0 => {
                if name[..i].ends_with("operator") {
                    continue;
                }
                return name[..i].trim_end();
            }
            _ => {}
        }
    }
    name
}

/// 修飾名を（文脈, 基底名）に分ける
///
/// 角括弧・丸括弧の内側にある `::` は区切りとみなさない。
/// 例: `<Foo as core::fmt::Debug>::fmt` -> (`<Foo as core::fmt::Debug>`, `fmt`)
pub fn split_qualified(name: &str) -> (&str, &str) {
    let name = strip_arguments(name);
    let bytes = name.as_bytes();
    let mut depth = 0usize;
    let mut split_at = None;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'<' | b'(' => depth += 1,
            b'>' | b')' => depth = depth.saturating_sub(1),
            b':' if depth == 0 && i + 1 < bytes.len() && bytes[i + 1] == b':' => {
                split_at = Some(i);
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }

    match split_at {
        Some(pos) => (&name[..pos], &name[pos + 2..]),
        None => ("", name),
    }
}

/// 関数名の基底名を得る（Objective-Cメソッドならセレクタ）
pub fn base_name(name: &str) -> &str {
    if let Some(method) = ObjCMethodName::parse(name) {
        return method.selector;
    }
    split_qualified(name).1
}

/// マングル名らしいかどうか
pub fn is_mangled(name: &str) -> bool {
    name.starts_with("_Z") || name.starts_with("_R") || name.starts_with("__Z")
}

/// 検索ヒットの名前が要求された名前と一致するか判定する
///
/// 基底名やセレクタでの検索は同名の別関数を拾うため、検索後にこの関数で
/// 完全名を確認する。`requested` は利用者が指定した名前、`candidate` は
/// ヒットした関数の表示名。
pub fn name_matches(requested: &str, candidate: &str, language: LanguageType) -> bool {
    let requested = strip_arguments(requested);
    let candidate_stripped = strip_arguments(candidate);

    if requested == candidate_stripped {
        return true;
    }

    if language.is_objc() || language == LanguageType::Unknown {
        if let Some(method) = ObjCMethodName::parse(candidate) {
            if method.selector == requested {
                return true;
            }
            if let Some(req) = ObjCMethodName::parse(requested) {
                let same_kind = match (req.is_class_method, method.is_class_method) {
                    (Some(a), Some(b)) => a == b,
                    _ => true,
                };
                return same_kind
                    && req.class_name == method.class_name
                    && req.selector == method.selector
                    && (req.category.is_none() || req.category == method.category);
            }
            return false;
        }
    }

    if language == LanguageType::C || language.is_objc() {
        return false;
    }

    // 修飾名の末尾が `::requested` で終わっていれば一致
    candidate_stripped.len() > requested.len() + 2
        && candidate_stripped.ends_with(requested)
        && candidate_stripped[..candidate_stripped.len() - requested.len()].ends_with("::")
}
