//! nafuda のコア機能
//!
//! このクレートは、関数名・正規表現・クラスとセレクタ・アドレスによる
//! ブレークポイントの指定を、読み込まれたモジュール上のロケーションに解決します。
//! 検索フィルタ、リゾルバ、ブレークポイント管理、デバッガセッションを提供します。

pub mod breakpoint;
pub mod command;
pub mod debugger;
pub mod errors;
pub mod parse;
pub mod resolver;
pub mod search;

pub use breakpoint::{Breakpoint, BreakpointId, BreakpointLocation, BreakpointManager, LocationList};
pub use command::{BreakSpec, BreakTarget, Command};
pub use debugger::Debugger;
pub use errors::ResolverError;
pub use resolver::{
    AddressResolver, BreakpointOptions, BreakpointResolver, LocationEmitter, LookupInfo, MatchType,
    NameResolver, ResolverKind,
};
pub use search::{CallbackReturn, SearchDepth, SearchFilter, Searcher, SymbolContext, SymbolContextList};

// 他のクレートから使用するために再エクスポート
pub use nafuda_dwarf::{FunctionNameType, LanguageType, Module, ModuleBuilder, Symbol};

/// デバッガの結果型
pub type Result<T> = anyhow::Result<T>;
