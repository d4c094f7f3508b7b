//! モジュール（読み込まれた実行ファイル・共有ライブラリ）とその名前インデックス

use crate::names::{self, FunctionNameType, ObjCMethodName};
use crate::symbols::{CompileUnitId, Symbol, SymbolId, SymbolKind, SymbolSource};
use crate::utils::FunctionFinder;
use crate::{ConstString, DwarfLoader, LanguageType, LineTable, Result};
use object::{Object, ObjectSymbol, SymbolKind as ObjSymbolKind};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

static NEXT_MODULE_ID: AtomicU64 = AtomicU64::new(1);

/// モジュールID（プロセス内で一意）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub u64);

impl ModuleId {
    fn next() -> Self {
        ModuleId(NEXT_MODULE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// コンパイルユニット
#[derive(Debug, Clone)]
pub struct CompileUnit {
    pub name: ConstString,
    pub language: LanguageType,
    /// このユニットに属する関数
    pub functions: Vec<SymbolId>,
}

/// 名前の種別ごとのバケット
#[derive(Debug, Default)]
struct NameIndex {
    full: HashMap<ConstString, Vec<SymbolId>>,
    base: HashMap<ConstString, Vec<SymbolId>>,
    selector: HashMap<ConstString, Vec<SymbolId>>,
    mangled: HashMap<ConstString, Vec<SymbolId>>,
}

impl NameIndex {
    fn insert(bucket: &mut HashMap<ConstString, Vec<SymbolId>>, key: &str, id: SymbolId) {
        if key.is_empty() {
            return;
        }
        bucket.entry(ConstString::new(key)).or_default().push(id);
    }

    fn build(symbols: &[Symbol]) -> Self {
        let mut index = Self::default();

        for (i, sym) in symbols.iter().enumerate() {
            if !sym.is_function() {
                continue;
            }
            let id = SymbolId(i);
            let display = sym.display_name();
            let full = sym.full_name();

            Self::insert(&mut index.full, full, id);
            if display != full {
                Self::insert(&mut index.full, display, id);
            }

            if let Some(method) = ObjCMethodName::parse(display) {
                // カテゴリ付きのメソッドはカテゴリを除いた完全名でも引ける
                if let (Some(class_method), Some(_)) = (method.is_class_method, method.category) {
                    let kind = if class_method { '+' } else { '-' };
                    Self::insert(
                        &mut index.full,
                        &format!("{}{}", kind, method.class_and_selector()),
                        id,
                    );
                }
                Self::insert(&mut index.selector, method.selector, id);
                Self::insert(&mut index.selector, &method.class_and_selector(), id);
            } else {
                Self::insert(&mut index.base, sym.base_name(), id);
            }

            if names::is_mangled(sym.name.as_str()) {
                Self::insert(&mut index.mangled, sym.name.as_str(), id);
            }
        }

        index
    }

    fn lookup(&self, name: ConstString, mask: FunctionNameType) -> Vec<SymbolId> {
        let buckets = [
            (FunctionNameType::FULL, &self.full),
            (FunctionNameType::BASE, &self.base),
            (FunctionNameType::SELECTOR, &self.selector),
            (FunctionNameType::MANGLED, &self.mangled),
        ];

        let mut hits: Vec<SymbolId> = buckets
            .iter()
            .filter(|(kind, _)| mask.contains(*kind))
            .filter_map(|(_, bucket)| bucket.get(&name))
            .flatten()
            .copied()
            .collect();

        // 同じシンボルが複数のバケットに入っている場合は1つにまとめる
        hits.sort();
        hits.dedup();
        hits
    }
}

/// 読み込まれたモジュール
///
/// 一度構築したら不変。`Arc<Module>` として検索フィルタとリゾルバで共有する。
#[derive(Debug)]
pub struct Module {
    id: ModuleId,
    name: ConstString,
    /// ロードアドレスとファイル上のアドレスの差
    slide: u64,
    symbols: Vec<Symbol>,
    /// アドレス順に並べたシンボル番号（アドレスを持つもののみ）
    by_address: Vec<SymbolId>,
    compile_units: Vec<CompileUnit>,
    index: NameIndex,
}

impl Module {
    /// ELFファイルを読み込んでモジュールを作る
    pub fn load<P: AsRef<Path>>(path: P, slide: u64) -> Result<Self> {
        let loader = DwarfLoader::load(path)?;
        Self::from_loader(&loader, slide)
    }

    /// DWARFローダーからモジュールを作る
    pub fn from_loader(loader: &DwarfLoader, slide: u64) -> Result<Self> {
        let name = loader.path().to_string_lossy().into_owned();
        let mut builder = ModuleBuilder::new(&name).slide(slide);

        // DWARFの関数をコンパイルユニットごとに登録する
        let units = FunctionFinder::collect(loader.dwarf())?;
        let lines = LineTable::from_dwarf(loader.dwarf())?;
        for unit in units {
            let cu = builder.add_compile_unit(&unit.name, unit.language);
            for func in unit.functions {
                let symbol_name = match (&func.linkage_name, &func.name) {
                    (Some(linkage), _) => linkage.clone(),
                    (None, Some(name)) => name.clone(),
                    (None, None) => continue,
                };
                let (address, size) = match func.range {
                    Some((start, end)) => (Some(start), end.saturating_sub(start)),
                    None => (None, 0),
                };

                let mut sym = Symbol::new(&symbol_name, address, size);
                // デマングルできない名前はDWARFのスコープから組み立てた修飾名で表示する
                if sym.name == sym.demangled_name {
                    if let Some(qualified) = &func.qualified_name {
                        sym.demangled_name = ConstString::new(qualified);
                    }
                }
                if let Some((start, end)) = func.range {
                    sym.prologue_size = lines.prologue_end(start, end).map(|p| p - start);
                }
                builder.add_function(cu, sym);
            }
        }

        // シンボルテーブルの関数を登録する
        for symbol in loader.object_file().symbols() {
            let name = match symbol.name() {
                Ok(name) if !name.is_empty() => name,
                _ => continue,
            };
            let kind = match symbol.kind() {
                ObjSymbolKind::Text => SymbolKind::Code,
                ObjSymbolKind::Data => SymbolKind::Data,
                _ => SymbolKind::Unknown,
            };
            let address = if symbol.is_undefined() {
                None
            } else {
                Some(symbol.address())
            };
            let mut sym = Symbol::new(name, address, symbol.size());
            sym.kind = kind;
            builder.add_symbol(sym);
        }

        let module = builder.build();
        debug!(
            "module {} loaded: {} symbols, {} compile units, slide 0x{:x}",
            module.name,
            module.symbols.len(),
            module.compile_units.len(),
            module.slide
        );
        Ok(module)
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn name(&self) -> ConstString {
        self.name
    }

    pub fn slide(&self) -> u64 {
        self.slide
    }

    /// シンボルを取得する
    pub fn symbol(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id.0)
    }

    pub fn symbols(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.symbols.iter().enumerate().map(|(i, s)| (SymbolId(i), s))
    }

    pub fn compile_units(&self) -> impl Iterator<Item = (CompileUnitId, &CompileUnit)> {
        self.compile_units
            .iter()
            .enumerate()
            .map(|(i, cu)| (CompileUnitId(i), cu))
    }

    pub fn compile_unit(&self, id: CompileUnitId) -> Option<&CompileUnit> {
        self.compile_units.get(id.0)
    }

    /// どのコンパイルユニットにも属さない関数があるか
    pub fn has_unattributed_functions(&self) -> bool {
        self.symbols
            .iter()
            .any(|s| s.is_function() && s.compile_unit.is_none())
    }

    /// シンボルのロードアドレス（ファイル上のアドレス + スライド）
    pub fn load_address(&self, id: SymbolId) -> Option<u64> {
        let sym = self.symbol(id)?;
        sym.address.map(|addr| addr.wrapping_add(self.slide))
    }

    /// 名前でシンボルを検索する
    ///
    /// `mask` で指定したバケットだけを引く。`compile_unit` が指定された場合は
    /// そのユニットに属するシンボルだけを返す。結果はシンボル番号順。
    pub fn find_by_name(
        &self,
        lookup_name: ConstString,
        mask: FunctionNameType,
        compile_unit: Option<CompileUnitId>,
    ) -> Vec<SymbolId> {
        let hits = self.index.lookup(lookup_name, mask);
        match compile_unit {
            Some(cu) => hits
                .into_iter()
                .filter(|id| self.symbols[id.0].compile_unit == Some(cu))
                .collect(),
            None => hits,
        }
    }

    /// 関数シンボルをすべて列挙する（正規表現検索用）
    pub fn all_functions(
        &self,
        compile_unit: Option<CompileUnitId>,
    ) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.symbols().filter(move |(_, s)| {
            s.is_function() && (compile_unit.is_none() || s.compile_unit == compile_unit)
        })
    }

    /// ロードアドレスからシンボルを解決する（最も近い関数を返す）
    pub fn symbol_at(&self, load_addr: u64) -> Option<(SymbolId, &Symbol)> {
        let addr = load_addr.checked_sub(self.slide)?;
        let idx = self
            .by_address
            .partition_point(|id| self.symbols[id.0].address.unwrap_or(0) <= addr);
        // 同じアドレスに複数ある場合はDWARF由来（先に登録）を優先する
        let candidate = *self.by_address[..idx].last()?;
        let start = self.symbols[candidate.0].address?;
        // サイズ0のシンボルは先頭アドレスだけを含む
        let mut group: Vec<SymbolId> = self.by_address[..idx]
            .iter()
            .rev()
            .take_while(|id| self.symbols[id.0].address == Some(start))
            .copied()
            .collect();
        group.reverse();
        group
            .into_iter()
            .find(|id| self.symbols[id.0].contains(addr))
            .map(|id| (id, &self.symbols[id.0]))
    }

    /// パターンを含むシンボルを検索する
    /// マングル名とデマングル名の両方で検索する
    pub fn find_symbols(&self, pattern: &str) -> Vec<&Symbol> {
        self.symbols
            .iter()
            .filter(|s| s.is_function())
            .filter(|s| s.name.as_str().contains(pattern) || s.display_name().contains(pattern))
            .collect()
    }
}

/// モジュールを組み立てる
///
/// ELFからの読み込みでもテスト用の合成モジュールでも、このビルダーを通す。
pub struct ModuleBuilder {
    name: String,
    slide: u64,
    symbols: Vec<Symbol>,
    compile_units: Vec<CompileUnit>,
}

impl ModuleBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            slide: 0,
            symbols: Vec::new(),
            compile_units: Vec::new(),
        }
    }

    /// ロードスライドを設定する
    pub fn slide(mut self, slide: u64) -> Self {
        self.slide = slide;
        self
    }

    /// コンパイルユニットを追加する
    pub fn add_compile_unit(&mut self, name: &str, language: LanguageType) -> CompileUnitId {
        let id = CompileUnitId(self.compile_units.len());
        self.compile_units.push(CompileUnit {
            name: ConstString::new(name),
            language,
            functions: Vec::new(),
        });
        id
    }

    /// コンパイルユニットに属する関数（DWARF由来）を追加する
    pub fn add_function(&mut self, cu: CompileUnitId, mut symbol: Symbol) -> SymbolId {
        let id = SymbolId(self.symbols.len());
        symbol.source = SymbolSource::DebugInfo;
        symbol.compile_unit = Some(cu);
        if let Some(unit) = self.compile_units.get_mut(cu.0) {
            if symbol.language == LanguageType::Unknown {
                symbol.language = unit.language;
            }
            unit.functions.push(id);
        }
        self.symbols.push(symbol);
        id
    }

    /// シンボルテーブル由来のシンボルを追加する
    pub fn add_symbol(&mut self, mut symbol: Symbol) -> SymbolId {
        let id = SymbolId(self.symbols.len());
        symbol.source = SymbolSource::SymbolTable;
        self.symbols.push(symbol);
        id
    }

    /// 名前とアドレスだけの関数シンボルを追加する
    pub fn add_function_symbol(&mut self, name: &str, address: u64, size: u64) -> SymbolId {
        self.add_symbol(Symbol::new(name, Some(address), size))
    }

    pub fn build(mut self) -> Module {
        // シンボルテーブルの関数を同じアドレスのDWARF関数のユニットに結び付ける
        let unit_by_address: HashMap<u64, (CompileUnitId, Option<u64>)> = self
            .symbols
            .iter()
            .filter(|s| s.source == SymbolSource::DebugInfo)
            .filter_map(|s| Some((s.address?, (s.compile_unit?, s.prologue_size))))
            .collect();
        for sym in self.symbols.iter_mut() {
            if sym.source != SymbolSource::SymbolTable || !sym.is_function() {
                continue;
            }
            if let Some(&(cu, prologue)) = sym.address.and_then(|a| unit_by_address.get(&a)) {
                sym.compile_unit = Some(cu);
                if sym.prologue_size.is_none() {
                    sym.prologue_size = prologue;
                }
            }
        }

        let mut by_address: Vec<SymbolId> = self
            .symbols
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_function() && s.address.is_some())
            .map(|(i, _)| SymbolId(i))
            .collect();
        by_address.sort_by_key(|id| (self.symbols[id.0].address, id.0));

        let index = NameIndex::build(&self.symbols);

        Module {
            id: ModuleId::next(),
            name: ConstString::new(&self.name),
            slide: self.slide,
            symbols: self.symbols,
            by_address,
            compile_units: self.compile_units,
            index,
        }
    }
}
