//! 関数名によるブレークポイントリゾルバ
//!
//! 完全一致の名前（1つまたは複数）、クラスとセレクタの組、正規表現のいずれかで
//! 関数を探し、見つかった関数ごとにブレークポイントロケーションを作る。

use super::lookup::LookupInfo;
use super::{BreakpointOptions, LocationEmitter};
use crate::errors::ResolverError;
use crate::search::{CallbackReturn, SearchDepth, SearchFilter, Searcher, SymbolContext, SymbolContextList};
use crate::BreakpointId;
use nafuda_dwarf::{ConstString, FunctionNameType, LanguageType};
use regex::Regex;
use std::fmt::Write;
use tracing::{debug, trace};

/// 名前の照合方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    /// 名前の完全一致
    Exact,
    /// 正規表現
    Regex,
}

/// 関数名リゾルバ
#[derive(Debug, Clone)]
pub struct NameResolver {
    /// このリゾルバを持つブレークポイント
    owner: Option<BreakpointId>,
    lookups: Vec<LookupInfo>,
    /// クラスとセレクタの組で作った場合のみ空でない
    class_name: ConstString,
    regex: Option<Regex>,
    match_type: MatchType,
    language: LanguageType,
    offset: u64,
    skip_prologue: bool,
}

impl NameResolver {
    fn with_options(options: &BreakpointOptions, match_type: MatchType) -> Self {
        Self {
            owner: None,
            lookups: Vec::new(),
            class_name: ConstString::empty(),
            regex: None,
            match_type,
            language: options.language,
            offset: options.offset,
            skip_prologue: options.skip_prologue,
        }
    }

    /// 1つの名前から作る
    ///
    /// `match_type` が `Regex` の場合は `name` を正規表現としてコンパイルする。
    pub fn new(
        name: &str,
        name_type_mask: FunctionNameType,
        match_type: MatchType,
        options: &BreakpointOptions,
    ) -> Result<Self, ResolverError> {
        match match_type {
            MatchType::Regex => {
                if name.is_empty() {
                    return Err(ResolverError::invalid("empty regular expression"));
                }
                let regex = Regex::new(name).map_err(|e| {
                    ResolverError::invalid(format!("invalid regular expression '{}': {}", name, e))
                })?;
                Self::from_regex(regex, options)
            }
            MatchType::Exact => Self::from_names(&[name], name_type_mask, options),
        }
    }

    /// 複数の名前から作る（常に完全一致）
    ///
    /// 同じ名前が重複していてもそのまま要求を作る。重複したヒットは刈り込みで消える。
    pub fn from_names<S: AsRef<str>>(
        names: &[S],
        name_type_mask: FunctionNameType,
        options: &BreakpointOptions,
    ) -> Result<Self, ResolverError> {
        if names.is_empty() {
            return Err(ResolverError::invalid("empty list of function names"));
        }

        let mut resolver = Self::with_options(options, MatchType::Exact);
        for name in names {
            resolver.add_name_lookup(name.as_ref(), name_type_mask)?;
        }
        Ok(resolver)
    }

    /// 正規表現から作る
    ///
    /// 正規表現はこのリゾルバにムーブされる。
    pub fn from_regex(regex: Regex, options: &BreakpointOptions) -> Result<Self, ResolverError> {
        if regex.as_str().is_empty() {
            return Err(ResolverError::invalid("empty regular expression"));
        }
        let mut resolver = Self::with_options(options, MatchType::Regex);
        resolver.regex = Some(regex);
        Ok(resolver)
    }

    /// Objective-Cのクラスとセレクタの組から作る
    pub fn from_class_selector(
        class_name: &str,
        selector: &str,
        options: &BreakpointOptions,
    ) -> Result<Self, ResolverError> {
        let lookup = LookupInfo::for_class_selector(class_name, selector)?;
        let mut resolver = Self::with_options(options, MatchType::Exact);
        resolver.class_name = ConstString::new(class_name.trim());
        resolver.lookups.push(lookup);
        Ok(resolver)
    }

    fn add_name_lookup(
        &mut self,
        name: &str,
        name_type_mask: FunctionNameType,
    ) -> Result<(), ResolverError> {
        let lookup = LookupInfo::new(name, name_type_mask, self.language)?;
        trace!(
            "lookup '{}' -> '{}' ({}), recheck={}",
            lookup.name,
            lookup.lookup_name,
            lookup.name_type_mask.describe(),
            lookup.match_name_after_lookup
        );
        self.lookups.push(lookup);
        Ok(())
    }

    /// 別のブレークポイント用に独立したコピーを作る
    pub fn copy_for_breakpoint(&self, owner: BreakpointId) -> Self {
        let mut copy = self.clone();
        copy.owner = Some(owner);
        copy
    }

    pub(crate) fn set_owner(&mut self, owner: BreakpointId) {
        self.owner = Some(owner);
    }

    pub fn owner(&self) -> Option<BreakpointId> {
        self.owner
    }

    pub fn lookups(&self) -> &[LookupInfo] {
        &self.lookups
    }

    pub fn class_name(&self) -> Option<ConstString> {
        if self.class_name.is_empty() {
            None
        } else {
            Some(self.class_name)
        }
    }

    pub fn regex(&self) -> Option<&Regex> {
        self.regex.as_ref()
    }

    pub fn match_type(&self) -> MatchType {
        self.match_type
    }

    pub fn language(&self) -> LanguageType {
        self.language
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn skip_prologue(&self) -> bool {
        self.skip_prologue
    }

    /// 1単位分の一致を集め、刈り込んだ結果を返す
    pub fn find_matches(&self, context: &SymbolContext) -> SymbolContextList {
        let module = &context.module;
        let compile_unit = context.compile_unit;
        let mut sc_list = SymbolContextList::new();

        match self.match_type {
            MatchType::Exact => {
                for lookup in &self.lookups {
                    let start_idx = sc_list.len();
                    for id in module.find_by_name(lookup.lookup_name, lookup.name_type_mask, compile_unit) {
                        let Some(symbol) = module.symbol(id) else {
                            continue;
                        };
                        if lookup.match_name_after_lookup && !lookup.matches(symbol, self.language) {
                            trace!("'{}' rejected for '{}'", symbol.display_name(), lookup.name);
                            continue;
                        }
                        sc_list.push(context.with_symbol(id));
                    }
                    LookupInfo::prune(&mut sc_list, start_idx);
                }
            }
            MatchType::Regex => {
                if let Some(regex) = &self.regex {
                    for (id, symbol) in module.all_functions(compile_unit) {
                        if regex.is_match(symbol.display_name()) {
                            sc_list.push(context.with_symbol(id));
                        }
                    }
                }
            }
        }

        LookupInfo::prune(&mut sc_list, 0);
        sc_list
    }

    /// 表示用の説明
    pub fn description(&self) -> String {
        let mut s = String::new();
        match self.match_type {
            MatchType::Regex => {
                let pattern = self.regex.as_ref().map(|r| r.as_str()).unwrap_or("");
                let _ = write!(s, "regex = '{}'", pattern);
            }
            MatchType::Exact if !self.class_name.is_empty() => {
                let selector = self
                    .lookups
                    .first()
                    .and_then(|l| nafuda_dwarf::ObjCMethodName::parse(l.name.as_str()))
                    .map(|m| m.selector)
                    .unwrap_or("");
                let _ = write!(s, "class = '{}', selector = '{}'", self.class_name, selector);
            }
            MatchType::Exact => match self.lookups.as_slice() {
                [single] => {
                    let _ = write!(s, "name = '{}'", single.name);
                }
                many => {
                    let names: Vec<String> = many.iter().map(|l| format!("'{}'", l.name)).collect();
                    let _ = write!(s, "names = {{{}}}", names.join(", "));
                }
            },
        }

        if self.language != LanguageType::Unknown {
            let _ = write!(s, ", language = {}", self.language);
        }
        if self.offset != 0 {
            let _ = write!(s, ", offset = {}", self.offset);
        }
        s
    }

    /// デバッグ用の詳細表示
    pub fn dump(&self) -> String {
        let mut s = String::from("NameResolver:");
        let _ = write!(s, " mode = {:?}", self.match_type);
        for lookup in &self.lookups {
            let _ = write!(
                s,
                " [name = '{}', lookup = '{}', kinds = {}, recheck = {}]",
                lookup.name,
                lookup.lookup_name,
                lookup.name_type_mask.describe(),
                lookup.match_name_after_lookup
            );
        }
        if let Some(regex) = &self.regex {
            let _ = write!(s, " regex = '{}'", regex.as_str());
        }
        let _ = write!(
            s,
            " language = {}, offset = 0x{:x}, skip_prologue = {}",
            self.language, self.offset, self.skip_prologue
        );
        s
    }
}

impl Searcher for NameResolver {
    fn depth(&self) -> SearchDepth {
        // セレクタはコンパイルユニットの型情報に属するため、ユニット単位で引く
        if self.class_name.is_empty() {
            SearchDepth::Module
        } else {
            SearchDepth::CompileUnit
        }
    }

    fn search_callback(
        &self,
        filter: &SearchFilter,
        context: &SymbolContext,
        _addr: Option<u64>,
        _containing: bool,
        emitter: &mut dyn LocationEmitter,
    ) -> CallbackReturn {
        let matches = self.find_matches(context);
        let mut created = 0;

        for sc in &matches {
            if !filter.symbol_context_passes(sc) {
                continue;
            }
            if emitter
                .create_location(sc, self.offset, self.skip_prologue)
                .is_some()
            {
                created += 1;
            }
        }

        debug!(
            "{} in {}: {} matches, {} locations",
            self.description(),
            context.module.name(),
            matches.len(),
            created
        );

        // 同じ名前が別のモジュールやユニットにもあり得るので、常に続ける
        CallbackReturn::Continue
    }
}
