//! 検索フィルタとシンボルコンテキスト
//!
//! 検索フィルタは読み込まれたモジュールを列挙し、リゾルバが要求する粒度
//! （モジュール単位かコンパイルユニット単位か）でコールバックを呼び出す。

use crate::resolver::LocationEmitter;
use nafuda_dwarf::{CompileUnitId, Module, ModuleId, Symbol, SymbolId};
use std::sync::Arc;
use tracing::trace;

/// 検索の粒度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDepth {
    /// モジュールごとに1回
    Module,
    /// コンパイルユニットごとに1回
    CompileUnit,
}

/// コールバックの戻り値
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackReturn {
    /// 検索を続ける
    Continue,
    /// 検索を打ち切る
    Stop,
}

/// シンボルコンテキスト
///
/// モジュール、コンパイルユニット、シンボルのどこまでが決まっているかを表す。
#[derive(Debug, Clone)]
pub struct SymbolContext {
    pub module: Arc<Module>,
    pub compile_unit: Option<CompileUnitId>,
    pub symbol: Option<SymbolId>,
}

impl SymbolContext {
    /// モジュール全体を表すコンテキスト
    pub fn for_module(module: Arc<Module>) -> Self {
        Self {
            module,
            compile_unit: None,
            symbol: None,
        }
    }

    /// コンパイルユニットを表すコンテキスト
    pub fn for_compile_unit(module: Arc<Module>, compile_unit: CompileUnitId) -> Self {
        Self {
            module,
            compile_unit: Some(compile_unit),
            symbol: None,
        }
    }

    /// シンボルまで決まったコンテキストを作る
    pub fn with_symbol(&self, symbol: SymbolId) -> Self {
        let compile_unit = self
            .module
            .symbol(symbol)
            .and_then(|s| s.compile_unit)
            .or(self.compile_unit);
        Self {
            module: Arc::clone(&self.module),
            compile_unit,
            symbol: Some(symbol),
        }
    }

    pub fn module_id(&self) -> ModuleId {
        self.module.id()
    }

    pub fn symbol(&self) -> Option<&Symbol> {
        self.module.symbol(self.symbol?)
    }

    /// シンボルのロードアドレス。シンボルが未定義ならNone
    pub fn load_address(&self) -> Option<u64> {
        self.module.load_address(self.symbol?)
    }
}

/// シンボルコンテキストの列
pub type SymbolContextList = Vec<SymbolContext>;

/// 検索フィルタから呼び出される側
pub trait Searcher {
    /// 呼び出してほしい粒度
    fn depth(&self) -> SearchDepth;

    /// 1単位（モジュールまたはコンパイルユニット）ごとに呼ばれる
    ///
    /// `containing` はこの単位が `addr` を含むことが分かっている場合にtrue。
    fn search_callback(
        &self,
        filter: &SearchFilter,
        context: &SymbolContext,
        addr: Option<u64>,
        containing: bool,
        emitter: &mut dyn LocationEmitter,
    ) -> CallbackReturn;
}

/// 検索フィルタ
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    /// 対象モジュール。Noneならすべて
    modules: Option<Vec<ModuleId>>,
}

impl SearchFilter {
    /// すべてのモジュールを対象にする
    pub fn everything() -> Self {
        Self { modules: None }
    }

    /// 指定したモジュールだけを対象にする
    pub fn by_modules(modules: Vec<ModuleId>) -> Self {
        Self {
            modules: Some(modules),
        }
    }

    pub fn module_passes(&self, module: &Module) -> bool {
        match &self.modules {
            Some(ids) => ids.contains(&module.id()),
            None => true,
        }
    }

    pub fn symbol_context_passes(&self, context: &SymbolContext) -> bool {
        self.module_passes(&context.module)
    }

    /// モジュールを列挙してコールバックを呼び出す
    ///
    /// コンパイルユニット単位の場合、どのユニットにも属さない関数を持つ
    /// モジュールについては最後にモジュール全体でもう一度呼び出す。
    pub fn search(
        &self,
        searcher: &dyn Searcher,
        modules: &[Arc<Module>],
        emitter: &mut dyn LocationEmitter,
    ) {
        let depth = searcher.depth();

        for module in modules {
            if !self.module_passes(module) {
                continue;
            }
            trace!("searching module {} at {:?} depth", module.name(), depth);

            let result = match depth {
                SearchDepth::Module => {
                    let context = SymbolContext::for_module(Arc::clone(module));
                    searcher.search_callback(self, &context, None, false, emitter)
                }
                SearchDepth::CompileUnit => self.search_compile_units(searcher, module, emitter),
            };

            if result == CallbackReturn::Stop {
                return;
            }
        }
    }

    fn search_compile_units(
        &self,
        searcher: &dyn Searcher,
        module: &Arc<Module>,
        emitter: &mut dyn LocationEmitter,
    ) -> CallbackReturn {
        let mut units = 0;
        for (cu, _) in module.compile_units() {
            units += 1;
            let context = SymbolContext::for_compile_unit(Arc::clone(module), cu);
            match searcher.search_callback(self, &context, None, false, emitter) {
                CallbackReturn::Continue => {}
                other => return other,
            }
        }

        if units == 0 || module.has_unattributed_functions() {
            let context = SymbolContext::for_module(Arc::clone(module));
            return searcher.search_callback(self, &context, None, false, emitter);
        }
        CallbackReturn::Continue
    }
}
