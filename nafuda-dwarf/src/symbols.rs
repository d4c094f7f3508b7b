//! シンボル情報

use crate::{names, ConstString, LanguageType};

/// モジュール内のシンボルの番号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub usize);

/// コンパイルユニットの番号（モジュール内）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompileUnitId(pub usize);

/// シンボルの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// 関数（コード）
    Code,
    /// データ
    Data,
    /// 不明
    Unknown,
}

/// シンボルがどこから来たか
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolSource {
    /// ELFのシンボルテーブル
    SymbolTable,
    /// DWARFの DW_TAG_subprogram
    DebugInfo,
}

/// シンボル情報
#[derive(Debug, Clone)]
pub struct Symbol {
    /// マングルされたシンボル名（マングルされていない場合は表示名と同じ）
    pub name: ConstString,
    /// デマングルされたシンボル名（可読な形式）
    pub demangled_name: ConstString,
    /// ファイル上のアドレス。宣言のみ・未定義のシンボルはNone
    pub address: Option<u64>,
    pub size: u64,
    pub kind: SymbolKind,
    pub source: SymbolSource,
    /// 所属するコンパイルユニット（シンボルテーブル由来ならNone）
    pub compile_unit: Option<CompileUnitId>,
    pub language: LanguageType,
    /// プロローグのバイト数（行テーブルから分かる場合のみ）
    pub prologue_size: Option<u64>,
}

impl Symbol {
    /// シンボルを作成し、デマングルされた名前を設定する
    pub fn new(name: &str, address: Option<u64>, size: u64) -> Self {
        let demangled_name = demangle_symbol(name);
        let language = LanguageType::guess_from_mangled(name);
        Self {
            name: ConstString::new(name),
            demangled_name: ConstString::new(&demangled_name),
            address,
            size,
            kind: SymbolKind::Code,
            source: SymbolSource::SymbolTable,
            compile_unit: None,
            language,
            prologue_size: None,
        }
    }

    /// 表示用の名前を取得（デマングル可能ならデマングル後、できなければマングル名）
    pub fn display_name(&self) -> &'static str {
        self.demangled_name.as_str()
    }

    /// マングル名を持つかどうか
    pub fn is_mangled(&self) -> bool {
        names::is_mangled(self.name.as_str())
    }

    /// 引数リストを除いた完全名
    pub fn full_name(&self) -> &'static str {
        names::strip_arguments(self.display_name())
    }

    /// 基底名（Objective-Cメソッドならセレクタ）
    pub fn base_name(&self) -> &'static str {
        names::base_name(self.display_name())
    }

    /// Objective-Cメソッドならセレクタを返す
    pub fn selector(&self) -> Option<&'static str> {
        names::ObjCMethodName::parse(self.display_name()).map(|m| m.selector)
    }

    /// 関数として扱えるシンボルか
    pub fn is_function(&self) -> bool {
        self.kind == SymbolKind::Code
    }

    /// アドレスが関数範囲に含まれるか
    pub fn contains(&self, addr: u64) -> bool {
        match self.address {
            Some(start) if self.size > 0 => addr >= start && addr < start + self.size,
            Some(start) => addr == start,
            None => false,
        }
    }
}

/// シンボル名をデマングルする
pub fn demangle_symbol(name: &str) -> String {
    // Rustのシンボルをデマングル（{:#} でハッシュを省く）
    if let Ok(demangled) = rustc_demangle::try_demangle(name) {
        return format!("{:#}", demangled);
    }

    // C++（Itaniumマングリング）
    if names::is_mangled(name) {
        if let Some(demangled) = cpp_demangle::Symbol::new(name)
            .ok()
            .and_then(|sym| sym.demangle(&Default::default()).ok())
        {
            return demangled;
        }
    }

    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_symbol_demangled() {
        let sym = Symbol::new("_ZN12simple_async6double17h7e292cfcb2965d2eE", Some(0x1000), 16);
        assert_eq!(sym.display_name(), "simple_async::double");
        assert_eq!(sym.base_name(), "double");
        assert_eq!(sym.language, LanguageType::Rust);
        assert!(sym.is_mangled());
    }

    #[test]
    fn test_plain_symbol() {
        let sym = Symbol::new("main", Some(0x2000), 0);
        assert_eq!(sym.display_name(), "main");
        assert!(!sym.is_mangled());
        assert!(sym.contains(0x2000));
        assert!(!sym.contains(0x2001));
    }

    #[test]
    fn test_cpp_symbol_demangled() {
        let sym = Symbol::new("_ZN7MyClass9push_backEi", Some(0x1000), 16);
        assert_eq!(sym.display_name(), "MyClass::push_back(int)");
        assert_eq!(sym.full_name(), "MyClass::push_back");
        assert_eq!(sym.base_name(), "push_back");
        assert_eq!(sym.language, LanguageType::CPlusPlus);
        assert!(sym.is_mangled());

        let sym = Symbol::new("_ZNSt6vectorIiE9push_backERKi", Some(0x2000), 16);
        assert_eq!(sym.full_name(), "std::vector<int>::push_back");
    }

    #[test]
    fn test_objc_selector() {
        let sym = Symbol::new("-[Foo bar:]", Some(0x3000), 8);
        assert_eq!(sym.selector(), Some("bar:"));
        assert_eq!(sym.full_name(), "-[Foo bar:]");
    }
}
