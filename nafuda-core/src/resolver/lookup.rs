//! 名前検索の1要求（LookupInfo）と検索結果の刈り込み

use crate::errors::ResolverError;
use crate::search::SymbolContextList;
use nafuda_dwarf::names::{self, ObjCMethodName};
use nafuda_dwarf::{ConstString, FunctionNameType, LanguageType, ModuleId, Symbol};
use std::collections::HashSet;
use tracing::trace;

/// 正規化された名前検索の要求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupInfo {
    /// 利用者が指定した名前
    pub name: ConstString,
    /// インデックスに渡す名前
    pub lookup_name: ConstString,
    /// 検索するバケット
    pub name_type_mask: FunctionNameType,
    /// 検索後に名前を照合し直す必要があるか
    pub match_name_after_lookup: bool,
}

impl LookupInfo {
    /// 名前と種別から検索要求を作る
    ///
    /// `AUTO` が含まれていれば名前の形から種別を決める。
    pub fn new(
        name: &str,
        name_type_mask: FunctionNameType,
        language: LanguageType,
    ) -> Result<Self, ResolverError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ResolverError::invalid("empty function name"));
        }

        let info = if name_type_mask.contains(FunctionNameType::AUTO) {
            Self::detect(trimmed, language)
        } else {
            let mask = name_type_mask & FunctionNameType::INDEXED;
            if mask.is_empty() {
                return Err(ResolverError::invalid(format!(
                    "no name kind selected for '{}'",
                    trimmed
                )));
            }
            let name = ConstString::new(trimmed);
            Self {
                name,
                lookup_name: name,
                name_type_mask: mask,
                match_name_after_lookup: mask
                    .intersects(FunctionNameType::BASE | FunctionNameType::SELECTOR),
            }
        };

        if info.lookup_name.is_empty() {
            return Err(ResolverError::invalid(format!(
                "cannot derive a lookup name from '{}'",
                trimmed
            )));
        }
        Ok(info)
    }

    /// クラスとセレクタの組から検索要求を作る
    pub fn for_class_selector(class_name: &str, selector: &str) -> Result<Self, ResolverError> {
        let class_name = class_name.trim();
        let selector = selector.trim();
        if class_name.is_empty() || selector.is_empty() {
            return Err(ResolverError::invalid("class name and selector must not be empty"));
        }
        if class_name.contains(char::is_whitespace) || selector.contains(char::is_whitespace) {
            return Err(ResolverError::invalid(format!(
                "malformed class/selector pair '{}' '{}'",
                class_name, selector
            )));
        }

        let name = ConstString::new(&names::format_class_selector(class_name, selector));
        Ok(Self {
            name,
            lookup_name: name,
            name_type_mask: FunctionNameType::SELECTOR,
            match_name_after_lookup: false,
        })
    }

    /// 名前の形から検索種別を決める
    fn detect(name: &str, language: LanguageType) -> Self {
        let const_name = ConstString::new(name);

        if let Some(method) = ObjCMethodName::parse(name) {
            if method.is_class_method.is_none() {
                // `[Class selector]` はセレクタのバケットに同じ形で入っている
                return Self {
                    name: const_name,
                    lookup_name: ConstString::new(&method.class_and_selector()),
                    name_type_mask: FunctionNameType::SELECTOR,
                    match_name_after_lookup: method.category.is_some(),
                };
            }
            return Self::exact(const_name, FunctionNameType::FULL);
        }

        if names::is_mangled(name) {
            return Self::exact(const_name, FunctionNameType::MANGLED);
        }

        let (context, base) = names::split_qualified(name);
        if !context.is_empty() {
            return Self {
                name: const_name,
                lookup_name: ConstString::new(base),
                name_type_mask: FunctionNameType::BASE,
                match_name_after_lookup: true,
            };
        }

        if language.is_objc() && name.contains(':') {
            return Self {
                name: const_name,
                lookup_name: const_name,
                name_type_mask: FunctionNameType::SELECTOR,
                match_name_after_lookup: true,
            };
        }

        let mut mask = FunctionNameType::FULL | FunctionNameType::BASE;
        if language.is_objc() {
            mask |= FunctionNameType::SELECTOR;
        }
        Self {
            name: const_name,
            // `foo(int)` のような引数付きの名前は引数を除いて引く
            lookup_name: ConstString::new(base),
            name_type_mask: mask,
            match_name_after_lookup: true,
        }
    }

    fn exact(name: ConstString, mask: FunctionNameType) -> Self {
        Self {
            name,
            lookup_name: name,
            name_type_mask: mask,
            match_name_after_lookup: false,
        }
    }

    /// 検索でヒットしたシンボルが要求した名前に一致するか
    ///
    /// `language` が不明ならシンボル自身の言語の規則で照合する。
    pub fn matches(&self, symbol: &Symbol, language: LanguageType) -> bool {
        let language = if language == LanguageType::Unknown {
            symbol.language
        } else {
            language
        };
        let requested = self.name.as_str();
        let display = symbol.display_name();

        if names::name_matches(requested, display, language) {
            return true;
        }
        if self.name_type_mask.contains(FunctionNameType::SELECTOR)
            && names::name_matches(requested, display, LanguageType::ObjC)
        {
            return true;
        }
        self.name_type_mask.contains(FunctionNameType::MANGLED) && symbol.name == self.name
    }

    /// 検索結果を刈り込む
    ///
    /// `start_idx` 以降の要素のうち、ロードアドレスを持たないものと、
    /// それより前の要素と（モジュール, アドレス）が重複するものを取り除く。
    /// 残る要素の順序は変えず、`start_idx` より前には触れない。
    pub fn prune(sc_list: &mut SymbolContextList, start_idx: usize) {
        if start_idx >= sc_list.len() {
            return;
        }

        let mut seen: HashSet<(ModuleId, u64)> = sc_list[..start_idx]
            .iter()
            .filter_map(|sc| Some((sc.module_id(), sc.load_address()?)))
            .collect();

        let tail = sc_list.split_off(start_idx);
        for sc in tail {
            let Some(addr) = sc.load_address() else {
                trace!("pruned unresolvable symbol {:?}", sc.symbol().map(|s| s.display_name()));
                continue;
            };
            if seen.insert((sc.module_id(), addr)) {
                sc_list.push(sc);
            } else {
                trace!("pruned duplicate match at 0x{:x}", addr);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SymbolContext;
    use nafuda_dwarf::{ModuleBuilder, Symbol};
    use std::sync::Arc;

    #[test]
    fn test_full_name_is_exact() {
        let info = LookupInfo::new("foo", FunctionNameType::FULL, LanguageType::Unknown).unwrap();
        assert_eq!(info.lookup_name, info.name);
        assert!(!info.match_name_after_lookup);
    }

    #[test]
    fn test_base_name_rechecks() {
        let info = LookupInfo::new("push_back", FunctionNameType::BASE, LanguageType::Unknown).unwrap();
        assert_eq!(info.lookup_name.as_str(), "push_back");
        assert!(info.match_name_after_lookup);
    }

    #[test]
    fn test_auto_qualified_name() {
        let info = LookupInfo::new("Foo::bar", FunctionNameType::AUTO, LanguageType::CPlusPlus).unwrap();
        assert_eq!(info.name.as_str(), "Foo::bar");
        assert_eq!(info.lookup_name.as_str(), "bar");
        assert_eq!(info.name_type_mask, FunctionNameType::BASE);
        assert!(info.match_name_after_lookup);
    }

    #[test]
    fn test_auto_objc_and_mangled() {
        let info = LookupInfo::new("-[Foo bar:]", FunctionNameType::AUTO, LanguageType::Unknown).unwrap();
        assert_eq!(info.name_type_mask, FunctionNameType::FULL);
        assert!(!info.match_name_after_lookup);

        let info = LookupInfo::new("[Foo bar:]", FunctionNameType::AUTO, LanguageType::Unknown).unwrap();
        assert_eq!(info.name_type_mask, FunctionNameType::SELECTOR);

        let info = LookupInfo::new("_ZN3foo3barEv", FunctionNameType::AUTO, LanguageType::Unknown).unwrap();
        assert_eq!(info.name_type_mask, FunctionNameType::MANGLED);

        let info = LookupInfo::new("bar:", FunctionNameType::AUTO, LanguageType::ObjC).unwrap();
        assert_eq!(info.name_type_mask, FunctionNameType::SELECTOR);
    }

    #[test]
    fn test_auto_bare_name_strips_arguments() {
        let info = LookupInfo::new("foo(int)", FunctionNameType::AUTO, LanguageType::C).unwrap();
        assert_eq!(info.lookup_name.as_str(), "foo");
        assert_eq!(info.name_type_mask, FunctionNameType::FULL | FunctionNameType::BASE);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(LookupInfo::new("", FunctionNameType::FULL, LanguageType::Unknown).is_err());
        assert!(LookupInfo::new("foo", FunctionNameType::empty(), LanguageType::Unknown).is_err());
        assert!(LookupInfo::new("Foo::", FunctionNameType::AUTO, LanguageType::Unknown).is_err());
        assert!(LookupInfo::for_class_selector("", "bar:").is_err());
        assert!(LookupInfo::for_class_selector("Foo", "").is_err());
    }

    #[test]
    fn test_class_selector_lookup() {
        let info = LookupInfo::for_class_selector("Foo", "bar:").unwrap();
        assert_eq!(info.lookup_name.as_str(), "[Foo bar:]");
        assert_eq!(info.name_type_mask, FunctionNameType::SELECTOR);
    }

    fn contexts() -> SymbolContextList {
        let mut builder = ModuleBuilder::new("m");
        builder.add_function_symbol("a", 0x10, 4);
        builder.add_function_symbol("a_alias", 0x10, 4);
        builder.add_symbol(Symbol::new("undefined", None, 0));
        builder.add_function_symbol("b", 0x20, 4);
        let module = Arc::new(builder.build());
        let ctx = SymbolContext::for_module(module.clone());
        module.symbols().map(|(id, _)| ctx.with_symbol(id)).collect()
    }

    fn names(list: &SymbolContextList) -> Vec<&'static str> {
        list.iter().map(|sc| sc.symbol().unwrap().display_name()).collect()
    }

    #[test]
    fn test_prune_removes_duplicates_and_unresolvable() {
        let mut list = contexts();
        LookupInfo::prune(&mut list, 0);
        assert_eq!(names(&list), vec!["a", "b"]);
    }

    #[test]
    fn test_prune_keeps_same_address_in_other_module() {
        let module_at_0x10 = |name: &str| {
            let mut builder = ModuleBuilder::new(name);
            let id = builder.add_function_symbol("a", 0x10, 4);
            (Arc::new(builder.build()), id)
        };
        let (liba, a_in_liba) = module_at_0x10("liba.so");
        let (libb, a_in_libb) = module_at_0x10("libb.so");

        let in_liba = SymbolContext::for_module(liba.clone()).with_symbol(a_in_liba);
        let in_libb = SymbolContext::for_module(libb.clone()).with_symbol(a_in_libb);
        let mut list = vec![in_liba.clone(), in_libb, in_liba];
        LookupInfo::prune(&mut list, 0);

        let modules: Vec<_> = list.iter().map(|sc| sc.module_id()).collect();
        assert_eq!(modules, vec![liba.id(), libb.id()]);
    }

    #[test]
    fn test_prune_is_idempotent() {
        let mut once = contexts();
        LookupInfo::prune(&mut once, 0);
        let mut twice = once.clone();
        LookupInfo::prune(&mut twice, 0);
        assert_eq!(names(&once), names(&twice));
    }

    #[test]
    fn test_prune_leaves_prefix_untouched() {
        let mut list = contexts();
        // 先頭2つ（a と a_alias）は刈り込み対象外
        LookupInfo::prune(&mut list, 2);
        assert_eq!(names(&list), vec!["a", "a_alias", "b"]);

        let mut list = contexts();
        let b = list[3].clone();
        list.push(b);
        LookupInfo::prune(&mut list, 3);
        assert_eq!(names(&list), vec!["a", "a_alias", "undefined", "b"]);
    }
}
