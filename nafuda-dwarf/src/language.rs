//! ソース言語の種別

use std::fmt;
use std::str::FromStr;

/// ソース言語
///
/// 名前の解釈（セレクタ、基底名の切り出し方など）を切り替えるためのヒントとして使う。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LanguageType {
    /// 不明（指定なし）
    #[default]
    Unknown,
    C,
    CPlusPlus,
    ObjC,
    ObjCPlusPlus,
    Rust,
}

impl LanguageType {
    /// DWARFの DW_AT_language から言語を決定する
    pub fn from_dw_lang(lang: gimli::DwLang) -> Self {
        match lang {
            gimli::DW_LANG_C
            | gimli::DW_LANG_C89
            | gimli::DW_LANG_C99
            | gimli::DW_LANG_C11 => LanguageType::C,
            gimli::DW_LANG_C_plus_plus
            | gimli::DW_LANG_C_plus_plus_03
            | gimli::DW_LANG_C_plus_plus_11
            | gimli::DW_LANG_C_plus_plus_14 => LanguageType::CPlusPlus,
            gimli::DW_LANG_ObjC => LanguageType::ObjC,
            gimli::DW_LANG_ObjC_plus_plus => LanguageType::ObjCPlusPlus,
            gimli::DW_LANG_Rust => LanguageType::Rust,
            // DWARF 6 の C++17 / C++20 / C17
            gimli::DwLang(0x2a) | gimli::DwLang(0x2b) => LanguageType::CPlusPlus,
            gimli::DwLang(0x2c) => LanguageType::C,
            _ => LanguageType::Unknown,
        }
    }

    /// マングル名の接頭辞から言語を推定する
    pub fn guess_from_mangled(name: &str) -> Self {
        if name.starts_with("_R") {
            return LanguageType::Rust;
        }
        if name.starts_with("_ZN") && has_rust_hash_suffix(name) && rustc_demangle::try_demangle(name).is_ok() {
            return LanguageType::Rust;
        }
        if name.starts_with("_Z") {
            return LanguageType::CPlusPlus;
        }
        if name.starts_with("-[") || name.starts_with("+[") {
            return LanguageType::ObjC;
        }
        LanguageType::Unknown
    }

    /// Objective-C系の言語かどうか
    pub fn is_objc(&self) -> bool {
        matches!(self, LanguageType::ObjC | LanguageType::ObjCPlusPlus)
    }

    /// 表示用の言語名
    pub fn name(&self) -> &'static str {
        match self {
            LanguageType::Unknown => "unknown",
            LanguageType::C => "c",
            LanguageType::CPlusPlus => "c++",
            LanguageType::ObjC => "objective-c",
            LanguageType::ObjCPlusPlus => "objective-c++",
            LanguageType::Rust => "rust",
        }
    }
}

/// レガシーなRustマングリングの末尾ハッシュ `17h` + 16桁の16進数 + `E` を持つか
fn has_rust_hash_suffix(name: &str) -> bool {
    let Some(body) = name.strip_suffix('E') else {
        return false;
    };
    let Some(hash) = body.len().checked_sub(19).and_then(|i| body.get(i..)) else {
        return false;
    };
    hash.starts_with("17h") && hash[3..].bytes().all(|b| b.is_ascii_hexdigit())
}

impl fmt::Display for LanguageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LanguageType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "c" => Ok(LanguageType::C),
            "c++" | "cpp" | "cplusplus" => Ok(LanguageType::CPlusPlus),
            "objc" | "objective-c" => Ok(LanguageType::ObjC),
            "objc++" | "objective-c++" => Ok(LanguageType::ObjCPlusPlus),
            "rust" | "rs" => Ok(LanguageType::Rust),
            "unknown" | "" => Ok(LanguageType::Unknown),
            other => Err(anyhow::anyhow!("Unknown language '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_from_mangled() {
        assert_eq!(
            LanguageType::guess_from_mangled("_ZN12simple_async6double17h7e292cfcb2965d2eE"),
            LanguageType::Rust
        );
        assert_eq!(
            LanguageType::guess_from_mangled("_ZN7MyClass9push_backEi"),
            LanguageType::CPlusPlus
        );
        // `17h` を名前の途中に含むC++の関数
        assert_eq!(
            LanguageType::guess_from_mangled("_ZN3foo17hashEv"),
            LanguageType::CPlusPlus
        );
        assert_eq!(LanguageType::guess_from_mangled("-[Foo bar:]"), LanguageType::ObjC);
        assert_eq!(LanguageType::guess_from_mangled("main"), LanguageType::Unknown);
    }

    #[test]
    fn test_parse_language() {
        assert_eq!("c++".parse::<LanguageType>().unwrap(), LanguageType::CPlusPlus);
        assert_eq!("ObjC".parse::<LanguageType>().unwrap(), LanguageType::ObjC);
        assert_eq!("rust".parse::<LanguageType>().unwrap(), LanguageType::Rust);
        assert!("cobol".parse::<LanguageType>().is_err());
    }
}
